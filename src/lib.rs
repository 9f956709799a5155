//! edudash: role-aware dashboard data for Moodle-style learning platforms.
//!
//! A user's raw LMS role assignments are classified into one canonical
//! role, the collections that role may see are fetched concurrently with
//! per-source fallbacks and a TTL cache, and the results are folded into a
//! role-scoped [`models::ViewModel`]. Start from
//! [`dashboard::DashboardService`].

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod lms;
pub mod models;
pub mod report;
pub mod roles;
