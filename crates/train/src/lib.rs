//! # sexagesimal-train — The Schedule Host
//!
//! Drives an optimiser with the sexagesimal warm-restart schedule:
//!
//! * **[`SexagesimalWarmRestart`]** — the schedule handle: boundary table plus
//!   step counter, with `current_multipliers` / `advance` / checkpoint state.
//! * **[`Trainer`]** — owns a candle `VarMap`, AdamW and the schedule. One call
//!   to [`Trainer::step`] sets the scheduled LR, back-propagates, clips
//!   gradients, steps AdamW and advances the schedule.

pub mod scheduler;
pub mod trainer;

pub use scheduler::SexagesimalWarmRestart;
pub use trainer::{Checkpoint, StepMetrics, Trainer, TrainerConfig};
