//! Per-step evaluation: half-cosine decay inside the owning segment.
//!
//! Within segment `(t0, t1]` the multiplier is
//! `0.5 * (1 + cos(pi * (t - t0) / (t1 - t0)))`, which reaches exactly 0.0 on
//! the segment's last step and jumps back towards 1.0 on the next one.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryTable;
use crate::error::{Result, ScheduleError};

/// What to do with steps past the last boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Hold the final value of the last segment (0.0).
    #[default]
    Clamp,
    /// Return [`ScheduleError::OutOfRangeStep`].
    Fail,
}

impl OutOfRangePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "clamp" => Some(Self::Clamp),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Half-cosine decay for a local position in `[0, 1]`.
pub fn cosine_alpha(local_pos: f64) -> f64 {
    0.5 * (1.0 + (PI * local_pos).cos())
}

/// Multiplier at 1-based step `t`, clamping past the end of the table.
///
/// Degenerate segments yield 0.0. Steps past `table.total_steps()` also yield
/// 0.0, the value the schedule ends on.
pub fn evaluate(t: usize, table: &BoundaryTable, base_multiplier: f64) -> f64 {
    match table.locate(t) {
        Some(segment) => {
            let alpha = segment.local_position(t).map_or(0.0, cosine_alpha);
            base_multiplier * alpha
        }
        None => 0.0,
    }
}

/// Multiplier at 1-based step `t`, failing past the end of the table.
pub fn try_evaluate(t: usize, table: &BoundaryTable, base_multiplier: f64) -> Result<f64> {
    if t > table.total_steps() {
        return Err(ScheduleError::out_of_range(t, table.total_steps()));
    }
    Ok(evaluate(t, table, base_multiplier))
}

/// Multiplier at step `t` under an explicit out-of-range policy.
pub fn evaluate_with(
    t: usize,
    table: &BoundaryTable,
    base_multiplier: f64,
    policy: OutOfRangePolicy,
) -> Result<f64> {
    match policy {
        OutOfRangePolicy::Clamp => {
            if t > table.total_steps() {
                tracing::warn!(
                    step = t,
                    total_steps = table.total_steps(),
                    "Step past end of schedule; holding multiplier at 0"
                );
            }
            Ok(evaluate(t, table, base_multiplier))
        }
        OutOfRangePolicy::Fail => try_evaluate(t, table, base_multiplier),
    }
}
