//! Knock-on effects of delays and failures, and the per-job risk score.

pub mod service;

pub use service::{
    AffectedTask, BlockedTask, DelayPropagation, FailurePropagation, JobRisk, RecoveryOption, RiskFactors,
    RiskPropagationService,
};

use crate::models::RiskLevel;

/// Level of an edge given the delay it passes on. Thresholds are exclusive.
pub fn risk_level_for_delay(impact_minutes: f64) -> RiskLevel {
    if impact_minutes > 120.0 {
        RiskLevel::Critical
    } else if impact_minutes > 60.0 {
        RiskLevel::High
    } else if impact_minutes > 30.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Level of a job's 0-100 risk score. Thresholds are inclusive.
pub fn risk_level_for_score(score: f64) -> RiskLevel {
    if score >= 70.0 {
        RiskLevel::Critical
    } else if score >= 50.0 {
        RiskLevel::High
    } else if score >= 30.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_thresholds() {
        assert_eq!(risk_level_for_delay(0.0), RiskLevel::Low);
        assert_eq!(risk_level_for_delay(30.0), RiskLevel::Low);
        assert_eq!(risk_level_for_delay(30.5), RiskLevel::Medium);
        assert_eq!(risk_level_for_delay(50.0), RiskLevel::Medium);
        assert_eq!(risk_level_for_delay(60.0), RiskLevel::Medium);
        assert_eq!(risk_level_for_delay(61.0), RiskLevel::High);
        assert_eq!(risk_level_for_delay(120.0), RiskLevel::High);
        assert_eq!(risk_level_for_delay(121.0), RiskLevel::Critical);
    }

    #[test]
    fn score_thresholds() {
        assert_eq!(risk_level_for_score(0.0), RiskLevel::Low);
        assert_eq!(risk_level_for_score(29.9), RiskLevel::Low);
        assert_eq!(risk_level_for_score(30.0), RiskLevel::Medium);
        assert_eq!(risk_level_for_score(50.0), RiskLevel::High);
        assert_eq!(risk_level_for_score(70.0), RiskLevel::Critical);
        assert_eq!(risk_level_for_score(100.0), RiskLevel::Critical);
    }
}
