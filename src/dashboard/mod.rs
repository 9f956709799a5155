//! Consumer-facing dashboard API.
//!
//! [`DashboardService`] ties the pieces together for one user: resolve the
//! role, fetch the role's sources, aggregate, and publish the outcome.
//! [`spawn_refresh`] re-runs that on an interval until stopped.

pub mod refresh;
pub mod service;

pub use refresh::{spawn_refresh, RefreshHandle};
pub use service::{
    sources_for, DashboardData, DashboardService, DashboardSettings, DashboardState,
};
