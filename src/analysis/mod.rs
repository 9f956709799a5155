//! Aggregation of fetched collections into role-scoped view models.

pub mod aggregator;
pub mod metrics;

pub use aggregator::{aggregate, AggregationScope, Sources};
pub use metrics::{active_count, average, rate, weekly_trend};
