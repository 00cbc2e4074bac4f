use thiserror::Error;

use crate::types::{Addr, HostId, NodeId};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invariant {invariant} violated at address {addr:#x}: {detail}")]
    InvariantViolation {
        invariant: &'static str,
        addr: Addr,
        detail: String,
    },

    #[error("capacity retry failed for address {addr:#x} on store {store}")]
    CapacityRetryFailure { addr: Addr, store: NodeId },

    #[error("host {host} evicted address {addr:#x} with no directory entry")]
    MissingDirectoryOnEviction { addr: Addr, host: HostId },

    #[error("unknown node id {0}")]
    UnknownNodeId(NodeId),

    #[error("malformed trace record at line {line}: {reason}")]
    MalformedTrace { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
