//! Checkpoint state for a running schedule.
//!
//! The boundary table is a pure function of `total_steps` (and the ladder,
//! which lives in [`crate::ScheduleConfig`]), so a checkpoint only records two
//! integers.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Persisted schedule progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub total_steps: usize,
    /// Completed steps.
    pub step: usize,
}

impl ScheduleState {
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing schedule state to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading schedule state from {}", path.display()))?;
        let state: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing schedule state {}", path.display()))?;
        if state.total_steps == 0 {
            anyhow::bail!("schedule state in {} has total_steps = 0", path.display());
        }
        Ok(state)
    }
}
