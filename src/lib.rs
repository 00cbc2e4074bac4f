mod cli;
mod config;
mod directory;
mod directory_index;
mod engine;
mod error;
mod flow;
mod host;
mod output;
mod policy;
mod store;
mod topology;
mod trace;
mod types;

pub use crate::cli::CliArgs;
pub use crate::config::SimConfig;
pub use crate::directory::{DirectoryEntry, DirectoryStore};
pub use crate::directory_index::DirectoryIndex;
pub use crate::engine::CoherenceEngine;
pub use crate::error::SimError;
pub use crate::flow::{FlowAccountant, FlowOutputEntry, FlowType};
pub use crate::host::HostCache;
pub use crate::output::write_flow_summary;
pub use crate::policy::{MigrationPolicy, PlacementPolicy};
pub use crate::store::SetAssociativeStore;
pub use crate::topology::{GraphTopology, Topology};
pub use crate::trace::{Op, TraceReader, TraceRecord};
pub use crate::types::{Addr, HostId, NodeId, NodeLabel};
