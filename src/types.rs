//! Shared identifier types for the simulated interconnect.
//!
//! Node ids are a flat `u32` space partitioned as hosts, then the single
//! device, then switches (see `Config::validate`). Keeping them integers
//! end to end — never string labels like `"H0"`/`"S3"` — is deliberate:
//! the original tool mixed both forms, which is exactly the ambiguity this
//! crate removes (see DESIGN.md).

use std::fmt;

pub type Addr = u64;
pub type HostId = u32;
pub type NodeId = u32;

/// Resolves a raw node id back to a human-readable label, purely for logs
/// and error messages. Carries no behavior.
#[derive(Debug, Clone, Copy)]
pub struct NodeLabel {
    pub id: NodeId,
    pub num_hosts: u32,
    pub device_id: NodeId,
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id < self.num_hosts {
            write!(f, "H{}", self.id)
        } else if self.id == self.device_id {
            write!(f, "D0")
        } else {
            write!(f, "S{}", self.id - self.device_id - 1)
        }
    }
}
