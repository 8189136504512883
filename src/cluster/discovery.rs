//! Leader resolution and slave enumeration
//!
//! Any control-plane node names the current leader in its state, so the
//! leader can be resolved from an arbitrary entry point in a single hop.
//! Slaves are then read from the leader's own state.

use serde_json::Value;
use tracing::{debug, info};

use super::address::{parse_pid, parse_slave_pid, ClusterAddress, SlaveEntry};
use super::state::{DiscoveryError, StateClient, StateDocument};

/// State field naming the elected leader (`id@host:port`)
pub const LEADER_FIELD: &str = "leader";

/// State field listing registered slaves
pub const SLAVES_FIELD: &str = "slaves";

/// Per-slave field carrying the slave process identifier
pub const PID_FIELD: &str = "pid";

// ============================================================================
// SBIO: Pure extraction (no I/O)
// ============================================================================

/// Read the leader address out of a state document
pub fn leader_from_state(state: &StateDocument) -> Result<ClusterAddress, DiscoveryError> {
    let leader = state
        .require(LEADER_FIELD)?
        .as_str()
        .ok_or_else(|| state.format_error(format!("'{}' is not a string", LEADER_FIELD)))?;

    parse_pid(leader)
        .map_err(|e| state.format_error(format!("bad '{}' field: {}", LEADER_FIELD, e)))
}

/// Read the slave hosts out of a state document, in document order.
///
/// A single malformed entry fails the whole extraction.
pub fn slaves_from_state(state: &StateDocument) -> Result<Vec<SlaveEntry>, DiscoveryError> {
    let entries = state
        .require(SLAVES_FIELD)?
        .as_array()
        .ok_or_else(|| state.format_error(format!("'{}' is not an array", SLAVES_FIELD)))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| slave_from_entry(state, index, entry))
        .collect()
}

fn slave_from_entry(
    state: &StateDocument,
    index: usize,
    entry: &Value,
) -> Result<SlaveEntry, DiscoveryError> {
    let pid = entry
        .get(PID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            state.format_error(format!(
                "{}[{}] has no string '{}' field",
                SLAVES_FIELD, index, PID_FIELD
            ))
        })?;

    parse_slave_pid(pid).map_err(|e| {
        state.format_error(format!("bad {}[{}].{}: {}", SLAVES_FIELD, index, PID_FIELD, e))
    })
}

/// Join slave hosts with single spaces, as printed by `--nodes`
pub fn format_host_list(slaves: &[SlaveEntry]) -> String {
    slaves
        .iter()
        .map(|s| s.host.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Resolve the current leader starting from any control-plane node.
///
/// Single hop: if the entry node reports a stale leader, that is what is
/// returned. Nothing is cached between calls.
pub async fn resolve_leader(
    client: &dyn StateClient,
    entry: &ClusterAddress,
) -> Result<ClusterAddress, DiscoveryError> {
    let state = client.fetch_state(entry).await?;
    let leader = leader_from_state(&state)?;
    info!(%entry, %leader, "resolved control plane leader");
    Ok(leader)
}

/// List the slaves registered with a leader
pub async fn list_slaves(
    client: &dyn StateClient,
    leader: &ClusterAddress,
) -> Result<Vec<SlaveEntry>, DiscoveryError> {
    let state = client.fetch_state(leader).await?;
    let slaves = slaves_from_state(&state)?;
    debug!(%leader, count = slaves.len(), "enumerated slaves");
    Ok(slaves)
}

/// Resolve the leader from `entry`, then list the leader's slaves
pub async fn discover_slaves(
    client: &dyn StateClient,
    entry: &ClusterAddress,
) -> Result<(ClusterAddress, Vec<SlaveEntry>), DiscoveryError> {
    let leader = resolve_leader(client, entry).await?;
    let slaves = list_slaves(client, &leader).await?;
    Ok((leader, slaves))
}
