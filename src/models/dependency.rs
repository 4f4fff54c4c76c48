use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    Temporal,
    Resource,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinishToStart => "finish_to_start",
            Self::StartToStart => "start_to_start",
            Self::FinishToFinish => "finish_to_finish",
            Self::Temporal => "temporal",
            Self::Resource => "resource",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "finish_to_start" => Some(Self::FinishToStart),
            "start_to_start" => Some(Self::StartToStart),
            "finish_to_finish" => Some(Self::FinishToFinish),
            "temporal" => Some(Self::Temporal),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Active,
    Satisfied,
    Violated,
}

impl DependencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Satisfied => "satisfied",
            Self::Violated => "violated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "satisfied" => Some(Self::Satisfied),
            "violated" => Some(Self::Violated),
            _ => None,
        }
    }
}

/// Ordered from least to most severe so levels compare with `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub id: String,
    pub predecessor_id: String,
    pub successor_id: String,
    pub dependency_type: DependencyType,
    pub is_critical: bool,
    /// Hard dependencies block the successor from starting; soft ones are advisory.
    pub is_hard: bool,
    pub status: DependencyStatus,
    pub risk_weight: f64,
    pub current_risk_level: RiskLevel,
    pub satisfied_at: Option<NaiveDateTime>,
    pub violated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDependency {
    pub predecessor_id: String,
    pub successor_id: String,
    pub dependency_type: DependencyType,
    pub is_critical: bool,
    pub is_hard: bool,
    pub risk_weight: f64,
}

impl NewDependency {
    pub fn finish_to_start(predecessor_id: &str, successor_id: &str) -> Self {
        Self {
            predecessor_id: predecessor_id.to_string(),
            successor_id: successor_id.to_string(),
            dependency_type: DependencyType::FinishToStart,
            is_critical: false,
            is_hard: true,
            risk_weight: 1.0,
        }
    }
}
