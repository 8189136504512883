use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::feature::DEFAULT_FEATURE;

#[derive(Parser, Debug)]
#[command(name = "exelixi")]
#[command(about = "Exelixi, a distributed framework for genetic algorithms, based on Apache Mesos")]
#[command(override_usage = "exelixi [OPTIONS]  (one of the operational modes shown below)")]
#[command(version)]
pub struct Args {
    /// Location for one of the masters; prints the cluster's slave hosts
    #[arg(short = 'n', long, value_name = "HOST:PORT", help_heading = "Nodes")]
    pub nodes: Option<String>,

    /// Location for one of the masters; runs as a Framework on the cluster
    #[arg(short = 'm', long, value_name = "HOST:PORT", help_heading = "Mesos Framework")]
    pub master: Option<String>,

    /// Number of Executors to be launched
    #[arg(
        short = 'e',
        long,
        default_value_t = 1,
        value_name = "N",
        help_heading = "Mesos Framework"
    )]
    pub executors: u32,

    /// List of slaves on which to run Executors in standalone mode
    #[arg(
        short = 's',
        long,
        num_args = 1..,
        value_name = "HOST:PORT",
        help_heading = "Standalone Framework"
    )]
    pub slaves: Vec<String>,

    /// Port number to use for a standalone Executor service
    #[arg(short = 'p', long, value_name = "PORT", help_heading = "Standalone Executor")]
    pub port: Option<u16>,

    /// Feature factory for GA parameters and customizations (scheduler modes)
    #[arg(short = 'f', long, value_name = "PKG.CLASS", default_value = DEFAULT_FEATURE)]
    pub feature: String,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a YAML settings file (default: ~/.exelixi/config.yaml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a .env file to load before starting
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Deadline in seconds for each control-plane state request
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Bind address for the worker service
    #[arg(long, value_name = "ADDR")]
    pub bind_addr: Option<String>,
}

impl Args {
    /// Log filter selected by the -v count
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
