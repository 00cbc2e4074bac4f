//! Serializes the flow accountant's summary to disk as JSON.

use std::path::Path;

use crate::engine::CoherenceEngine;
use crate::error::SimError;

pub fn write_flow_summary(engine: &CoherenceEngine, path: &Path) -> Result<(), SimError> {
    let summary = engine.flow_summary();
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| SimError::Config(format!("serializing flow summary: {e}")))?;
    std::fs::write(path, json).map_err(|e| SimError::Config(format!("writing {}: {e}", path.display())))
}
