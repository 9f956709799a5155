//! Role resolution.
//!
//! Turns the raw, possibly multi-valued role assignments reported by the
//! LMS into one canonical role, and maps that role to the set of dashboard
//! capabilities presentation code is allowed to show.

pub mod capabilities;
pub mod classifier;

pub use capabilities::{capabilities, Capability};
pub use classifier::{classify, map_role};
