use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Ordered from least to most urgent; reports sort descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Persisted output of a bottleneck scan, unique per (type, subject, hour).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAlert {
    pub id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub job_id: Option<String>,
    pub subject_id: String,
    pub title: String,
    pub message: String,
    pub period: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBriefing {
    pub briefing_date: NaiveDate,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}
