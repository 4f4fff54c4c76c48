use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    Assigned,
    InProgress,
    Completed,
    Partial,
    Failed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        Self::Planned,
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::Partial,
        Self::Failed,
        Self::Blocked,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Work has ended with some outcome that evidence should document.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    /// No further scheduling is expected for the task.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::Planned | Self::Assigned)
    }

    /// Counts toward an employee's concurrent load.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub job_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub assigned_employee_id: Option<String>,
    pub integrity_score: f64,
    pub integrity_flags: Vec<String>,
    pub gps: Option<GeoPoint>,
    pub location_name: Option<String>,
    pub location_type: Option<String>,
    pub expected_outcome: Option<String>,
    pub workaround_used: bool,
    pub deviation_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    /// Planned end has passed while the task is still open.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.status.is_closed() && self.planned_end.is_some_and(|end| end < now)
    }
}

/// Fields accepted when a task is created; scoring fields start at their defaults.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub job_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub assigned_employee_id: Option<String>,
    pub gps: Option<GeoPoint>,
    pub location_name: Option<String>,
    pub location_type: Option<String>,
    pub expected_outcome: Option<String>,
}
