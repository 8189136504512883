//! # Cluster topology discovery
//!
//! Talks to the control plane's state endpoint to find out who leads the
//! cluster and which worker hosts are registered with it.
//!
//! ```text
//!   entry node ──GET /master/state.json──▶ "leader": "id@host:port"
//!                                                   │
//!   leader     ──GET /master/state.json──▶ "slaves": [{"pid": "id@host:port"}, ...]
//! ```
//!
//! All queries are sequential; each fetch yields a fresh [`StateDocument`]
//! that is dropped once the needed fields are extracted.

pub mod address;
pub mod discovery;
pub mod state;

pub use address::{parse_pid, parse_slave_pid, AddressError, ClusterAddress, SlaveEntry};
pub use discovery::{
    discover_slaves, format_host_list, leader_from_state, list_slaves, resolve_leader,
    slaves_from_state,
};
pub use state::{DiscoveryError, HttpStateClient, StateClient, StateDocument};

/// Path of the control-plane state endpoint
pub const STATE_PATH: &str = "/master/state.json";
