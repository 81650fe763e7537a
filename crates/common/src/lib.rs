//! # sexagesimal-common — Shared Primitives
//!
//! Types shared by every crate that hosts the schedule:
//!
//! * **[`ScheduleConfig`]** — schedule hyper-parameters (serialised as JSON).
//! * **[`ScheduleState`]** — the two integers a checkpoint needs to resume.

pub mod config;
pub mod state;

pub use config::ScheduleConfig;
pub use state::ScheduleState;
