//! Exelixi: bootstrap a distributed genetic-algorithm framework onto a
//! Mesos-style cluster, or run one of its standalone roles.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod feature;
pub mod framework;
pub mod server;
pub mod telemetry;
