//! Operator-facing reports built from the integrity, graph and risk layers.
//!
//! Nothing in here introduces new scoring: it groups, filters and phrases
//! what the lower layers compute.

pub mod bottleneck;
pub mod briefing;
pub mod patterns;
pub mod report;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::db::timestamp;
use crate::models::Severity;

pub use bottleneck::{Bottleneck, BottleneckKind, ScanOutcome};
pub use briefing::{DailyBriefing, OverdueTask, PublishedBriefing, TaskBrief};
pub use patterns::DeviationPattern;
pub use report::{EmployeePerformanceContext, JobSituationReport, ResourceTension};

/// Which tasks a scan looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    System,
    Job(String),
}

impl Scope {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::Job(id) => Some(id),
        }
    }

    pub(crate) fn includes(&self, job_id: &str) -> bool {
        self.job_id().map_or(true, |id| id == job_id)
    }
}

/// Something a human should look at, ranked by priority.
#[derive(Debug, Clone, Serialize)]
pub struct AttentionItem {
    pub priority: Severity,
    pub category: &'static str,
    pub message: String,
    pub task_id: Option<String>,
}

/// Most urgent first; equal priorities keep their insertion order.
pub(crate) fn sort_attention(items: &mut [AttentionItem]) {
    items.sort_by(|a, b| b.priority.cmp(&a.priority));
}

pub struct OperatorTaskInterface<'a> {
    conn: &'a Connection,
    config: AnalyticsConfig,
    now: NaiveDateTime,
}

impl<'a> OperatorTaskInterface<'a> {
    pub fn new(conn: &'a Connection, config: AnalyticsConfig) -> Self {
        Self {
            conn,
            config,
            now: timestamp::now(),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }
}
