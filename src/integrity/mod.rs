//! Per-task integrity scoring and its roll-ups.

pub mod aggregate;
pub mod level;
pub mod metrics;
pub mod service;

pub use aggregate::{AggregatedIntegrityService, IntegritySummary, SystemIntegritySummary};
pub use level::IntegrityLevel;
pub use metrics::{calculate_full_integrity, IntegrityResult, Metric, MetricScore};
pub use service::{IntegrityUpdate, TaskIntegrityService};
