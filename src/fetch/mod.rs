//! Concurrent fetching with per-source failure isolation.
//!
//! The orchestrator runs every task's remote call at once, waits for all of
//! them to settle, and replaces each failure with synthetic data from the
//! task's fallback so one unavailable source never blanks the dashboard.

pub mod fallback;
pub mod orchestrator;

pub use fallback::{FallbackConfig, FallbackGenerator};
pub use orchestrator::{FetchReport, FetchTask, Orchestrator, SourceFailure};
