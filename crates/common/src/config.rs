//! Schedule configuration.
//!
//! Serialised as JSON. Only `total_steps` is required; a minimal
//! `{"total_steps": 1000}` produces the tablet ladder with clamping.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use sexagesimal_core::{BoundaryTable, OutOfRangePolicy, SegmentLadder};

/// Configuration for one sexagesimal warm-restart schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Total optimiser steps the ladder is scaled onto.
    pub total_steps: usize,
    /// Steps already completed (resume point). The next query is step `resume_step + 1`.
    #[serde(default)]
    pub resume_step: usize,
    /// Relative segment lengths.
    #[serde(default)]
    pub ladder: SegmentLadder,
    /// Behaviour for steps past `total_steps`.
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
}

impl ScheduleConfig {
    /// Config with the default ladder and policy.
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            resume_step: 0,
            ladder: SegmentLadder::default(),
            out_of_range: OutOfRangePolicy::default(),
        }
    }

    /// Check the config can produce a schedule.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.total_steps == 0 {
            anyhow::bail!("total_steps must be positive");
        }
        if self.resume_step > self.total_steps && self.out_of_range == OutOfRangePolicy::Fail {
            anyhow::bail!(
                "resume_step ({}) is past total_steps ({}) and out_of_range is \"fail\"",
                self.resume_step,
                self.total_steps
            );
        }
        Ok(())
    }

    /// Build the boundary table this config describes.
    pub fn build_table(&self) -> anyhow::Result<BoundaryTable> {
        self.validate()?;
        Ok(BoundaryTable::build(self.total_steps, &self.ladder)?)
    }

    /// Save config to a JSON file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing schedule config to {}", path.display()))?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading schedule config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing schedule config {}", path.display()))?;
        config.validate()?;
        tracing::debug!(
            total_steps = config.total_steps,
            resume_step = config.resume_step,
            segments = config.ladder.len(),
            "Loaded schedule config"
        );
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
