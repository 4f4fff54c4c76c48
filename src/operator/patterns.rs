use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::db::event_repo;
use crate::error::SiteopsError;
use crate::models::{TaskEvent, TaskEventType};

use super::{OperatorTaskInterface, Scope};

const UNSPECIFIED_REASON: &str = "unspecified";

#[derive(Debug, Clone, Serialize)]
pub struct DeviationPattern {
    pub event_type: TaskEventType,
    pub reason: String,
    pub occurrences: usize,
    pub confidence: f64,
    pub affected_tasks: Vec<String>,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    pub hypothesis: &'static str,
    pub suggested_actions: Vec<&'static str>,
}

/// 0.5 for no evidence, +0.1 per occurrence, never above 0.95.
pub fn pattern_confidence(occurrences: usize) -> f64 {
    let raw = (0.5 + occurrences as f64 * 0.1).min(0.95);
    (raw * 100.0).round() / 100.0
}

/// Root-cause template keyed off the event type name.
fn explain(event_type: TaskEventType) -> (&'static str, Vec<&'static str>) {
    let name = event_type.as_str();
    if name.contains("material") {
        (
            "Material estimates or supply do not match what the site uses",
            vec![
                "Review material estimates for this kind of task",
                "Confirm supplier stock before scheduling",
            ],
        )
    } else if name.contains("time") {
        (
            "Durations for this kind of task are underestimated",
            vec![
                "Recalibrate duration estimates from recent actuals",
                "Add a buffer to similar tasks",
            ],
        )
    } else if name.contains("blocked") {
        (
            "Upstream work or site access regularly holds tasks up",
            vec![
                "Check predecessor readiness before dispatching crews",
                "Record the blocker as a tracked dependency",
            ],
        )
    } else if name.contains("weather") {
        (
            "Outdoor work is scheduled without weather slack",
            vec![
                "Check forecasts when planning outdoor work",
                "Keep indoor fallback tasks ready",
            ],
        )
    } else {
        (
            "The procedure is not followed the same way each time",
            vec!["Walk through the procedure with the crew"],
        )
    }
}

impl OperatorTaskInterface<'_> {
    /// Group recent deviation events by type and reason and keep the groups
    /// that recur at least `min_occurrences` times. Every event looked at is
    /// marked as processed.
    pub fn analyze_deviation_patterns(
        &self,
        scope: &Scope,
        min_occurrences: usize,
    ) -> Result<Vec<DeviationPattern>, SiteopsError> {
        let (patterns, analysed) = self.collect_deviation_patterns(scope, min_occurrences)?;
        let marked = event_repo::mark_processed(self.conn, &analysed)?;
        tracing::debug!(
            analysed = analysed.len(),
            marked,
            patterns = patterns.len(),
            "deviation patterns analysed"
        );
        Ok(patterns)
    }

    /// Same grouping as `analyze_deviation_patterns`, leaving events unmarked.
    pub fn preview_deviation_patterns(
        &self,
        scope: &Scope,
        min_occurrences: usize,
    ) -> Result<Vec<DeviationPattern>, SiteopsError> {
        Ok(self.collect_deviation_patterns(scope, min_occurrences)?.0)
    }

    /// Start of the analysis window. A window reaching past the calendar
    /// covers all history.
    fn pattern_cutoff(&self) -> NaiveDateTime {
        Duration::try_days(self.config.pattern_window_days)
            .and_then(|window| self.now.checked_sub_signed(window))
            .unwrap_or(NaiveDateTime::MIN)
    }

    fn collect_deviation_patterns(
        &self,
        scope: &Scope,
        min_occurrences: usize,
    ) -> Result<(Vec<DeviationPattern>, Vec<String>), SiteopsError> {
        let events: Vec<TaskEvent> = event_repo::list_since(self.conn, self.pattern_cutoff())?
            .into_iter()
            .filter(|e| e.event_type.is_deviation() && scope.includes(&e.job_id))
            .collect();

        let mut groups: BTreeMap<(TaskEventType, String), Vec<&TaskEvent>> = BTreeMap::new();
        for event in &events {
            let reason = event
                .payload
                .reason()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(UNSPECIFIED_REASON)
                .to_string();
            groups.entry((event.event_type, reason)).or_default().push(event);
        }

        let mut patterns: Vec<DeviationPattern> = groups
            .into_iter()
            .filter(|(_, group)| group.len() >= min_occurrences.max(1))
            .map(|((event_type, reason), group)| {
                let (hypothesis, suggested_actions) = explain(event_type);
                let mut affected_tasks: Vec<String> = group.iter().map(|e| e.task_id.clone()).collect();
                affected_tasks.sort();
                affected_tasks.dedup();
                DeviationPattern {
                    event_type,
                    reason,
                    occurrences: group.len(),
                    confidence: pattern_confidence(group.len()),
                    affected_tasks,
                    // events arrive oldest first
                    first_seen: group[0].occurred_at,
                    last_seen: group[group.len() - 1].occurred_at,
                    hypothesis,
                    suggested_actions,
                }
            })
            .collect();
        patterns.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

        let analysed = events.iter().map(|e| e.id.clone()).collect();
        Ok((patterns, analysed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::models::{EventPayload, TaskStatus};
    use crate::testing::Fixture;

    #[test]
    fn confidence_grows_and_caps() {
        assert_eq!(pattern_confidence(1), 0.6);
        assert_eq!(pattern_confidence(3), 0.8);
        assert_eq!(pattern_confidence(4), 0.9);
        assert_eq!(pattern_confidence(5), 0.95);
        assert_eq!(pattern_confidence(40), 0.95);
    }

    #[test]
    fn recurring_deviations_form_patterns() {
        let fx = Fixture::new();
        let job = fx.job("Orchard");
        let a = fx.task(&job, "Plant row A");
        let b = fx.task(&job, "Plant row B");
        fx.deviation(&a, TaskEventType::MaterialShortage, "Saplings late");
        fx.deviation(&b, TaskEventType::MaterialShortage, "Saplings late");
        fx.deviation(&a, TaskEventType::MaterialShortage, "Saplings late");
        fx.deviation(&a, TaskEventType::WeatherDelay, "Frost");
        fx.deviation(&b, TaskEventType::WeatherDelay, "Frost");
        fx.deviation(&b, TaskEventType::TimeDeviation, "Hard ground");
        fx.event_at(&a, TaskEventType::Started, EventPayload::Empty, fx.hours(-2));

        let operator = OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default()).with_now(fx.now);
        let patterns = operator.analyze_deviation_patterns(&Scope::System, 2).unwrap();

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].event_type, TaskEventType::MaterialShortage);
        assert_eq!(patterns[0].reason, "Saplings late");
        assert_eq!(patterns[0].occurrences, 3);
        assert_eq!(patterns[0].confidence, 0.8);
        assert_eq!(patterns[0].affected_tasks.len(), 2);
        assert!(patterns[0].hypothesis.contains("Material"));
        assert_eq!(patterns[1].event_type, TaskEventType::WeatherDelay);
        assert!(patterns[1].suggested_actions[0].contains("forecast"));

        let events = event_repo::list_for_task(&fx.conn, &b.id).unwrap();
        assert!(events.iter().all(|e| e.ai_processed));
        let started = event_repo::list_for_task(&fx.conn, &a.id)
            .unwrap()
            .into_iter()
            .find(|e| e.event_type == TaskEventType::Started)
            .unwrap();
        assert!(!started.ai_processed);
    }

    #[test]
    fn old_events_and_other_jobs_are_ignored() {
        let fx = Fixture::new();
        let job = fx.job("Orchard");
        let other = fx.job("Vineyard");
        let a = fx.task(&job, "Prune");
        let x = fx.task(&other, "Stake vines");
        fx.set_status(&a, TaskStatus::Blocked);

        let blocked = || EventPayload::Blocked {
            reason: "No access".into(),
            blocking_task_id: None,
        };
        fx.event_at(&a, TaskEventType::Blocked, blocked(), fx.hours(-24 * 100));
        fx.event_at(&a, TaskEventType::Blocked, blocked(), fx.hours(-24 * 100));
        fx.event_at(&a, TaskEventType::Blocked, blocked(), fx.hours(-1));
        fx.event_at(&x, TaskEventType::Blocked, blocked(), fx.hours(-1));
        fx.event_at(&x, TaskEventType::Blocked, blocked(), fx.hours(-1));

        let operator = OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default()).with_now(fx.now);
        let in_job = operator
            .analyze_deviation_patterns(&Scope::Job(job.id.clone()), 2)
            .unwrap();
        assert!(in_job.is_empty());

        let everywhere = operator.analyze_deviation_patterns(&Scope::System, 2).unwrap();
        assert_eq!(everywhere.len(), 1);
        assert_eq!(everywhere[0].occurrences, 3);
        assert!(everywhere[0].hypothesis.contains("Upstream"));
    }

    #[test]
    fn preview_leaves_events_unprocessed() {
        let fx = Fixture::new();
        let job = fx.job("Orchard");
        let a = fx.task(&job, "Plant row A");
        fx.deviation(&a, TaskEventType::MaterialShortage, "Saplings late");
        fx.deviation(&a, TaskEventType::MaterialShortage, "Saplings late");

        let operator = OperatorTaskInterface::new(&fx.conn, AnalyticsConfig::default()).with_now(fx.now);
        let patterns = operator.preview_deviation_patterns(&Scope::System, 2).unwrap();
        assert_eq!(patterns.len(), 1);
        let events = event_repo::list_for_task(&fx.conn, &a.id).unwrap();
        assert!(events.iter().all(|e| !e.ai_processed));
    }

    #[test]
    fn oversized_window_covers_all_history() {
        let fx = Fixture::new();
        let job = fx.job("Orchard");
        let a = fx.task(&job, "Prune");
        let blocked = || EventPayload::Blocked {
            reason: "No access".into(),
            blocking_task_id: None,
        };
        fx.event_at(&a, TaskEventType::Blocked, blocked(), fx.hours(-24 * 400));
        fx.event_at(&a, TaskEventType::Blocked, blocked(), fx.hours(-1));

        let config = AnalyticsConfig {
            pattern_window_days: 1_000_000_000,
            ..AnalyticsConfig::default()
        };
        let operator = OperatorTaskInterface::new(&fx.conn, config).with_now(fx.now);
        let patterns = operator.analyze_deviation_patterns(&Scope::System, 2).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 2);
    }
}
