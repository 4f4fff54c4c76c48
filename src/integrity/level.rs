use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityLevel {
    Excellent,
    Good,
    Warning,
    Critical,
    Failed,
}

impl IntegrityLevel {
    /// Thresholds are inclusive lower bounds.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Warning
        } else if score >= 30.0 {
            Self::Critical
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Failed => "FAILED",
        }
    }

    /// How far automated decisions may rely on a task at this level.
    pub fn trust(&self) -> f64 {
        match self {
            Self::Excellent => 1.0,
            Self::Good => 0.8,
            Self::Warning => 0.5,
            Self::Critical => 0.2,
            Self::Failed => 0.0,
        }
    }

    pub fn is_critical_or_worse(&self) -> bool {
        matches!(self, Self::Critical | Self::Failed)
    }
}
