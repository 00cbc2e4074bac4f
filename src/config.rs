//! JSON configuration: a raw, directly-deserialized shape validated into
//! the typed `SimConfig` the rest of the crate works with.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::SimError;
use crate::policy::{MigrationPolicy, PlacementPolicy};
use crate::types::NodeId;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "Num hosts")]
    num_hosts: u32,
    #[serde(rename = "Host line size")]
    host_line_size: u64,
    #[serde(rename = "Host num lines")]
    host_num_lines: usize,
    #[serde(rename = "Host assoc")]
    host_assoc: usize,

    #[serde(rename = "Device line size")]
    device_line_size: u64,
    #[serde(rename = "Device num lines")]
    device_num_lines: usize,
    #[serde(rename = "Device assoc")]
    device_assoc: usize,

    #[serde(rename = "Num switches")]
    num_switches: u32,
    #[serde(rename = "Switch line size")]
    switch_line_size: u64,
    #[serde(rename = "Switch num lines")]
    switch_num_lines: usize,
    #[serde(rename = "Switch assoc")]
    switch_assoc: usize,

    #[serde(rename = "Intermediate switch")]
    intermediate_switch: NodeId,
    #[serde(rename = "Intermediate path")]
    intermediate_path: Vec<NodeId>,

    #[serde(rename = "Topology edges")]
    topology_edges: Vec<(NodeId, NodeId)>,

    #[serde(rename = "Placement policy", default = "default_placement")]
    placement_policy: PlacementPolicy,
    #[serde(rename = "Migration policy", default = "default_migration")]
    migration_policy: MigrationPolicy,

    #[serde(rename = "Invariant check interval", default = "default_interval")]
    invariant_check_interval: u64,

    #[serde(rename = "Output json")]
    output_json: PathBuf,
}

fn default_placement() -> PlacementPolicy {
    PlacementPolicy::Default
}

fn default_migration() -> MigrationPolicy {
    MigrationPolicy::None
}

fn default_interval() -> u64 {
    1
}

/// Fully validated, ready-to-run configuration. Node ids are laid out as
/// hosts `[0, num_hosts)`, then the device at `num_hosts`, then switches
/// `[num_hosts + 1, num_hosts + 1 + num_switches)`.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub num_hosts: u32,
    pub host_line_size: u64,
    pub host_num_sets: usize,
    pub host_assoc: usize,

    pub device_id: NodeId,
    pub device_line_size: u64,
    pub device_num_sets: usize,
    pub device_assoc: usize,

    pub switch_ids: Vec<NodeId>,
    pub switch_line_size: u64,
    pub switch_num_sets: usize,
    pub switch_assoc: usize,

    pub intermediate_switch: NodeId,
    pub intermediate_path: Vec<NodeId>,

    pub topology_edges: Vec<(NodeId, NodeId)>,
    pub num_nodes: usize,

    pub placement_policy: PlacementPolicy,
    pub migration_policy: MigrationPolicy,
    pub invariant_check_interval: u64,
    pub output_json: PathBuf,
}

impl SimConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("reading {}: {e}", path.display())))?;
        let raw: RawConfig = serde_json::from_str(&text)
            .map_err(|e| SimError::Config(format!("parsing {}: {e}", path.display())))?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, SimError> {
        fn line_size(label: &str, size: u64) -> Result<u64, SimError> {
            if size == 0 || !size.is_power_of_two() {
                return Err(SimError::Config(format!(
                    "{label} line size ({size}) must be a nonzero power of two"
                )));
            }
            Ok(size)
        }

        fn num_sets(label: &str, num_lines: usize, assoc: usize) -> Result<usize, SimError> {
            if assoc == 0 || num_lines == 0 {
                return Err(SimError::Config(format!("{label}: assoc and num lines must be nonzero")));
            }
            if !num_lines.is_multiple_of(assoc) {
                return Err(SimError::Config(format!(
                    "{label}: num lines ({num_lines}) must be a multiple of assoc ({assoc})"
                )));
            }
            Ok(num_lines / assoc)
        }

        if raw.num_hosts == 0 {
            return Err(SimError::Config("Num hosts must be nonzero".into()));
        }

        let device_id = raw.num_hosts;
        let switch_ids: Vec<NodeId> = (0..raw.num_switches).map(|i| device_id + 1 + i).collect();
        let num_nodes = raw.num_hosts as usize + 1 + raw.num_switches as usize;

        for &path_id in &raw.intermediate_path {
            if !switch_ids.contains(&path_id) {
                return Err(SimError::Config(format!(
                    "Intermediate path entry {path_id} is not a valid switch id"
                )));
            }
        }
        if !switch_ids.contains(&raw.intermediate_switch) {
            return Err(SimError::Config(format!(
                "Intermediate switch {} is not a valid switch id",
                raw.intermediate_switch
            )));
        }

        Ok(SimConfig {
            num_hosts: raw.num_hosts,
            host_line_size: line_size("Host", raw.host_line_size)?,
            host_num_sets: num_sets("Host", raw.host_num_lines, raw.host_assoc)?,
            host_assoc: raw.host_assoc,

            device_id,
            device_line_size: line_size("Device", raw.device_line_size)?,
            device_num_sets: num_sets("Device", raw.device_num_lines, raw.device_assoc)?,
            device_assoc: raw.device_assoc,

            switch_ids,
            switch_line_size: line_size("Switch", raw.switch_line_size)?,
            switch_num_sets: num_sets("Switch", raw.switch_num_lines, raw.switch_assoc)?,
            switch_assoc: raw.switch_assoc,

            intermediate_switch: raw.intermediate_switch,
            intermediate_path: raw.intermediate_path,

            topology_edges: raw.topology_edges,
            num_nodes,

            placement_policy: raw.placement_policy,
            migration_policy: raw.migration_policy,
            invariant_check_interval: raw.invariant_check_interval.max(1),
            output_json: raw.output_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "Num hosts": 2,
            "Host line size": 64,
            "Host num lines": 2,
            "Host assoc": 1,
            "Device line size": 64,
            "Device num lines": 4,
            "Device assoc": 1,
            "Num switches": 1,
            "Switch line size": 64,
            "Switch num lines": 2,
            "Switch assoc": 1,
            "Intermediate switch": 3,
            "Intermediate path": [3],
            "Topology edges": [[0, 3], [1, 3], [3, 2]],
            "Output json": "flow_summary.json"
        }"#
    }

    #[test]
    fn validates_node_layout_and_defaults() {
        let raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        let cfg = SimConfig::validate(raw).unwrap();
        assert_eq!(cfg.device_id, 2);
        assert_eq!(cfg.switch_ids, vec![3]);
        assert_eq!(cfg.host_num_sets, 2);
        assert_eq!(cfg.placement_policy, PlacementPolicy::Default);
        assert_eq!(cfg.migration_policy, MigrationPolicy::None);
        assert_eq!(cfg.invariant_check_interval, 1);
    }

    #[test]
    fn rejects_non_dividing_assoc() {
        let mut raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        raw.host_num_lines = 3;
        raw.host_assoc = 2;
        assert!(SimConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_intermediate_path_outside_switch_range() {
        let mut raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        raw.intermediate_path = vec![99];
        assert!(SimConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_line_size() {
        let mut raw: RawConfig = serde_json::from_str(sample_json()).unwrap();
        raw.host_line_size = 96;
        assert!(matches!(SimConfig::validate(raw), Err(SimError::Config(_))));
    }
}
