use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{DependencyStatus, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventType {
    Created,
    Started,
    Completed,
    StatusChanged,
    Blocked,
    Unblocked,
    IntegrityDropped,
    DelayPropagated,
    FailurePropagated,
    DependencySatisfied,
    DependencyViolated,
    MaterialDeviation,
    MaterialShortage,
    TimeDeviation,
    WeatherDelay,
    ProcessDeviation,
}

impl TaskEventType {
    pub const DEVIATIONS: [TaskEventType; 6] = [
        Self::Blocked,
        Self::MaterialDeviation,
        Self::MaterialShortage,
        Self::TimeDeviation,
        Self::WeatherDelay,
        Self::ProcessDeviation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::StatusChanged => "status_changed",
            Self::Blocked => "blocked",
            Self::Unblocked => "unblocked",
            Self::IntegrityDropped => "integrity_dropped",
            Self::DelayPropagated => "delay_propagated",
            Self::FailurePropagated => "failure_propagated",
            Self::DependencySatisfied => "dependency_satisfied",
            Self::DependencyViolated => "dependency_violated",
            Self::MaterialDeviation => "material_deviation",
            Self::MaterialShortage => "material_shortage",
            Self::TimeDeviation => "time_deviation",
            Self::WeatherDelay => "weather_delay",
            Self::ProcessDeviation => "process_deviation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "started" => Some(Self::Started),
            "completed" => Some(Self::Completed),
            "status_changed" => Some(Self::StatusChanged),
            "blocked" => Some(Self::Blocked),
            "unblocked" => Some(Self::Unblocked),
            "integrity_dropped" => Some(Self::IntegrityDropped),
            "delay_propagated" => Some(Self::DelayPropagated),
            "failure_propagated" => Some(Self::FailurePropagated),
            "dependency_satisfied" => Some(Self::DependencySatisfied),
            "dependency_violated" => Some(Self::DependencyViolated),
            "material_deviation" => Some(Self::MaterialDeviation),
            "material_shortage" => Some(Self::MaterialShortage),
            "time_deviation" => Some(Self::TimeDeviation),
            "weather_delay" => Some(Self::WeatherDelay),
            "process_deviation" => Some(Self::ProcessDeviation),
            _ => None,
        }
    }

    pub fn is_deviation(&self) -> bool {
        Self::DEVIATIONS.contains(self)
    }
}

/// Structured event body. Stored as JSON in `task_events.payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Empty,
    StatusChanged {
        from: TaskStatus,
        to: TaskStatus,
    },
    Blocked {
        reason: String,
        blocking_task_id: Option<String>,
    },
    Deviation {
        reason: String,
        notes: Option<String>,
    },
    IntegrityDropped {
        previous_score: f64,
        new_score: f64,
        level: String,
        flags: Vec<String>,
    },
    DelayPropagated {
        delay_minutes: f64,
        total_impact_hours: f64,
        affected_tasks: Vec<String>,
        critical_path_affected: bool,
        mitigations: Vec<String>,
    },
    FailurePropagated {
        violated_dependencies: Vec<String>,
        blocked_tasks: Vec<String>,
    },
    DependencyUpdated {
        dependency_id: String,
        status: DependencyStatus,
    },
    #[serde(other)]
    Unknown,
}

impl EventPayload {
    /// Free-text cause carried by blocker and deviation events.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Blocked { reason, .. } | Self::Deviation { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: String,
    pub task_id: String,
    pub job_id: String,
    pub event_type: TaskEventType,
    pub payload: EventPayload,
    pub occurred_at: NaiveDateTime,
    pub source: String,
    pub ai_processed: bool,
}

#[derive(Debug, Clone)]
pub struct NewTaskEvent {
    pub task_id: String,
    pub event_type: TaskEventType,
    pub payload: EventPayload,
    pub source: String,
}

impl NewTaskEvent {
    pub fn new(task_id: &str, event_type: TaskEventType, payload: EventPayload) -> Self {
        Self {
            task_id: task_id.to_string(),
            event_type,
            payload,
            source: "system".to_string(),
        }
    }

    pub fn from_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}
