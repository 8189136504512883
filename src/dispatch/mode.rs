//! Invocation modes and their selection
//!
//! Exactly one mode is active per process. Selectors are checked in a fixed
//! precedence order and the first one present wins; extra selectors are
//! reported but not rejected.

use std::fmt;

use tracing::warn;

use crate::cli::Args;
use crate::cluster::ClusterAddress;
use crate::config::ConfigError;

/// A command-line option that selects a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Nodes,
    Master,
    Slaves,
    Port,
}

impl Selector {
    pub fn flag(&self) -> &'static str {
        match self {
            Selector::Nodes => "--nodes",
            Selector::Master => "--master",
            Selector::Slaves => "--slaves",
            Selector::Port => "--port",
        }
    }

    fn is_present(&self, args: &Args) -> bool {
        match self {
            Selector::Nodes => args.nodes.is_some(),
            Selector::Master => args.master.is_some(),
            Selector::Slaves => !args.slaves.is_empty(),
            Selector::Port => args.port.is_some(),
        }
    }
}

/// Selector precedence, highest first. With none present the process runs
/// as a managed executor.
pub const SELECTOR_PRIORITY: [Selector; 4] = [
    Selector::Nodes,
    Selector::Master,
    Selector::Slaves,
    Selector::Port,
];

/// Selectors present in `args`, in precedence order
pub fn present_selectors(args: &Args) -> Vec<Selector> {
    SELECTOR_PRIORITY
        .iter()
        .copied()
        .filter(|s| s.is_present(args))
        .collect()
}

/// The role this process assumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationMode {
    EnumerateNodes {
        master: ClusterAddress,
    },
    RunManagedScheduler {
        master: ClusterAddress,
        executors: u32,
    },
    RunStandaloneScheduler {
        slaves: Vec<ClusterAddress>,
    },
    RunStandaloneExecutor {
        port: u16,
    },
    RunManagedExecutor,
}

impl InvocationMode {
    /// Resolve the mode from parsed arguments
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let present = present_selectors(args);

        if present.len() > 1 {
            let ignored: Vec<_> = present[1..].iter().map(Selector::flag).collect();
            warn!(
                selected = present[0].flag(),
                ?ignored,
                "several mode selectors given, using the highest priority one"
            );
        }

        let Some(selector) = present.first() else {
            return Ok(InvocationMode::RunManagedExecutor);
        };

        match selector {
            Selector::Nodes => Ok(InvocationMode::EnumerateNodes {
                master: parse_flag(Selector::Nodes, args.nodes.as_deref().unwrap_or_default())?,
            }),
            Selector::Master => {
                if args.executors == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "--executors",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Ok(InvocationMode::RunManagedScheduler {
                    master: parse_flag(
                        Selector::Master,
                        args.master.as_deref().unwrap_or_default(),
                    )?,
                    executors: args.executors,
                })
            }
            Selector::Slaves => {
                let slaves = args
                    .slaves
                    .iter()
                    .map(|s| parse_flag(Selector::Slaves, s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(InvocationMode::RunStandaloneScheduler { slaves })
            }
            Selector::Port => match args.port {
                Some(0) | None => Err(ConfigError::InvalidValue {
                    field: "--port",
                    reason: "must be a non-zero port".to_string(),
                }),
                Some(port) => Ok(InvocationMode::RunStandaloneExecutor { port }),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InvocationMode::EnumerateNodes { .. } => "enumerate-nodes",
            InvocationMode::RunManagedScheduler { .. } => "managed-scheduler",
            InvocationMode::RunStandaloneScheduler { .. } => "standalone-scheduler",
            InvocationMode::RunStandaloneExecutor { .. } => "standalone-executor",
            InvocationMode::RunManagedExecutor => "managed-executor",
        }
    }

    /// Scheduler modes are the only ones that use a feature factory
    pub fn is_scheduler(&self) -> bool {
        matches!(
            self,
            InvocationMode::RunManagedScheduler { .. } | InvocationMode::RunStandaloneScheduler { .. }
        )
    }
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::EnumerateNodes { master } => {
                write!(f, "enumerating the slave nodes of the cluster at {}", master)
            }
            InvocationMode::RunManagedScheduler { master, executors } => write!(
                f,
                "running a Framework atop an Apache Mesos cluster with master {} and {} executor(s)",
                master, executors
            ),
            InvocationMode::RunStandaloneScheduler { slaves } => {
                let slaves: Vec<String> = slaves.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "running a Framework in standalone mode with slave(s) {}",
                    slaves.join(" ")
                )
            }
            InvocationMode::RunStandaloneExecutor { port } => {
                write!(f, "running an Executor service on port {}", port)
            }
            InvocationMode::RunManagedExecutor => {
                write!(f, "running an Executor atop an Apache Mesos cluster")
            }
        }
    }
}

fn parse_flag(selector: Selector, value: &str) -> Result<ClusterAddress, ConfigError> {
    value.parse().map_err(|source| ConfigError::InvalidAddress {
        flag: selector.flag(),
        source,
    })
}
