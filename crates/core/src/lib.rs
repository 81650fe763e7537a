//! # sexagesimal-core — The Schedule Engine
//!
//! Pure, allocation-light math behind the sexagesimal warm-restart
//! learning-rate schedule:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ladder`] | `SegmentLadder`, the AO 6456 tablet proportions |
//! | [`boundary`] | `BoundaryTable`, `Segment`, `build_boundaries` |
//! | [`evaluate`] | half-cosine `evaluate`, `OutOfRangePolicy` |
//! | [`error`] | `ScheduleError` |
//!
//! ## Design principles
//!
//! 1. **Exact boundaries.** Scaling is done in integer arithmetic; the last
//!    boundary is always the requested step count.
//! 2. **Referentially transparent.** Tables are immutable values; evaluation
//!    is a function of `(step, table)` only.
//! 3. **No division by zero.** Collapsed segments evaluate to 0.0.

pub mod boundary;
pub mod error;
pub mod evaluate;
pub mod ladder;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use boundary::{build_boundaries, BoundaryTable, Segment};
pub use error::{Result, ScheduleError};
pub use evaluate::{cosine_alpha, evaluate, evaluate_with, try_evaluate, OutOfRangePolicy};
pub use ladder::{SegmentLadder, AO_6456, AO_6456_SEGMENTS};
