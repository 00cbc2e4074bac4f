//! Hop-cost accounting: for every transaction that moves data, we compare
//! the cost of the path actually taken (with the directory wherever
//! placement/migration put it) against a baseline where the directory is
//! always pinned at the device, and bucket the result into one of eleven
//! categorical flow types.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum FlowType {
    /// Host eviction of an exclusively-owned line.
    HostEvictExclusive = 1,
    /// Host eviction that empties the last sharer of a shared line.
    HostEvictSharedLast = 2,
    /// Host eviction that leaves other sharers behind.
    HostEvictSharedRemaining = 3,
    /// Directory eviction of an exclusively-owned line.
    DirEvictExclusive = 4,
    /// Directory eviction of a shared line.
    DirEvictShared = 5,
    /// Hit on an exclusive line, read by a non-owner (downgrade to shared).
    HitExclusiveReadDowngrade = 6,
    /// Hit on an exclusive line, write by a non-owner (ownership transfer).
    HitExclusiveWriteTransfer = 7,
    /// Hit on a shared line, read by a non-sharer (sharer added).
    HitSharedReadAddSharer = 8,
    /// Hit on a shared line, write by its sole sharer (silent upgrade).
    HitSharedWritePromote = 9,
    /// Hit on a shared line, write that invalidates other sharers.
    HitSharedWriteInvalidate = 10,
    /// Miss: a fresh directory entry is created.
    Miss = 11,
}

impl FlowType {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FlowStats {
    pub improved: u64,
    pub same: u64,
    pub deteriorated: u64,
    pub benefit: i64,
}

impl FlowStats {
    fn record(&mut self, cost_policy: u64, cost_baseline: u64) {
        match cost_policy.cmp(&cost_baseline) {
            std::cmp::Ordering::Less => self.improved += 1,
            std::cmp::Ordering::Equal => self.same += 1,
            std::cmp::Ordering::Greater => self.deteriorated += 1,
        }
        self.benefit += cost_baseline as i64 - cost_policy as i64;
    }

    fn entries(&self) -> u64 {
        self.improved + self.same + self.deteriorated
    }

    fn avg_benefit(&self) -> f64 {
        if self.entries() == 0 {
            0.0
        } else {
            self.benefit as f64 / self.entries() as f64
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlowOutputEntry {
    #[serde(rename = "Type")]
    pub flow_type: i32,
    #[serde(rename = "Improved")]
    pub improved: u64,
    #[serde(rename = "Same")]
    pub same: u64,
    #[serde(rename = "Deteriorated")]
    pub deteriorated: u64,
    #[serde(rename = "Benefit")]
    pub benefit: i64,
    #[serde(rename = "AVG Benefit")]
    pub avg_benefit: f64,
}

/// Aggregate key for the all-flow-types-combined summary row.
const AGGREGATE: i32 = -1;

#[derive(Debug, Default)]
pub struct FlowAccountant {
    per_flow: BTreeMap<i32, FlowStats>,
}

impl FlowAccountant {
    pub fn new() -> Self {
        FlowAccountant::default()
    }

    pub fn record(&mut self, flow: FlowType, cost_policy: u64, cost_baseline: u64) {
        self.per_flow
            .entry(flow.code())
            .or_default()
            .record(cost_policy, cost_baseline);
        self.per_flow
            .entry(AGGREGATE)
            .or_default()
            .record(cost_policy, cost_baseline);
    }

    pub fn to_output(&self) -> BTreeMap<String, FlowOutputEntry> {
        self.per_flow
            .iter()
            .map(|(&flow_type, stats)| {
                let entry = FlowOutputEntry {
                    flow_type,
                    improved: stats.improved,
                    same: stats.same,
                    deteriorated: stats.deteriorated,
                    benefit: stats.benefit,
                    avg_benefit: stats.avg_benefit(),
                };
                (flow_type.to_string(), entry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_improved_same_deteriorated() {
        let mut acc = FlowAccountant::new();
        acc.record(FlowType::Miss, 2, 5);
        acc.record(FlowType::Miss, 5, 5);
        acc.record(FlowType::Miss, 7, 5);
        let out = acc.to_output();
        let miss = &out[&FlowType::Miss.code().to_string()];
        assert_eq!(miss.improved, 1);
        assert_eq!(miss.same, 1);
        assert_eq!(miss.deteriorated, 1);
        assert_eq!(miss.benefit, 3 - 2);
    }

    #[test]
    fn aggregate_row_sums_across_flow_types() {
        let mut acc = FlowAccountant::new();
        acc.record(FlowType::Miss, 2, 5);
        acc.record(FlowType::HitExclusiveReadDowngrade, 10, 8);
        let out = acc.to_output();
        let aggregate = &out[&AGGREGATE.to_string()];
        assert_eq!(aggregate.improved, 1);
        assert_eq!(aggregate.deteriorated, 1);
    }
}
