use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{evidence_repo, material_repo, task_repo, timestamp};
use crate::error::SiteopsError;
use crate::events::{EventSink, Notification};
use crate::models::{EventPayload, NewTaskEvent, Task, TaskEventType};

use super::{calculate_full_integrity, IntegrityLevel, IntegrityResult};

/// Score drop that is reported as an event even without a level change.
const SIGNIFICANT_DROP: f64 = 10.0;

/// Owns the `integrity_score` and `integrity_flags` columns: it is the only
/// writer of either.
pub struct TaskIntegrityService<'a> {
    conn: &'a Connection,
    events: &'a dyn EventSink,
    now: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityUpdate {
    pub task: Task,
    pub previous_score: f64,
    pub result: IntegrityResult,
    pub notification: Notification,
}

impl<'a> TaskIntegrityService<'a> {
    pub fn new(conn: &'a Connection, events: &'a dyn EventSink) -> Self {
        Self {
            conn,
            events,
            now: timestamp::now(),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Score a task from its current rows without persisting anything.
    pub fn evaluate(&self, task_id: &str) -> Result<IntegrityResult, SiteopsError> {
        let task = task_repo::get_task_by_id(self.conn, task_id)?;
        self.evaluate_task(&task)
    }

    fn evaluate_task(&self, task: &Task) -> Result<IntegrityResult, SiteopsError> {
        let evidence = evidence_repo::list_for_task(self.conn, &task.id)?;
        let materials = material_repo::list_for_task(self.conn, &task.id)?;
        Ok(calculate_full_integrity(task, &evidence, &materials, self.now))
    }

    /// Recompute and persist a task's score. A significant drop is reported
    /// as an `integrity_dropped` event when `emit_events` is set; failing to
    /// write that event leaves the update in place.
    pub fn recalculate_and_update(&self, task_id: &str, emit_events: bool) -> Result<IntegrityUpdate, SiteopsError> {
        let task = task_repo::get_task_by_id(self.conn, task_id)?;
        let previous_score = task.integrity_score;
        let result = self.evaluate_task(&task)?;

        task_repo::update_integrity(self.conn, &task.id, result.score, &result.flags, self.now)?;
        tracing::debug!(
            task_id = %task.id,
            previous = previous_score,
            score = result.score,
            level = result.level.as_str(),
            "integrity recalculated"
        );

        let notification = if emit_events && is_significant_drop(previous_score, &result) {
            let payload = EventPayload::IntegrityDropped {
                previous_score,
                new_score: result.score,
                level: result.level.as_str().to_string(),
                flags: result.flags.clone(),
            };
            Notification::attempt(
                self.events,
                NewTaskEvent::new(&task.id, TaskEventType::IntegrityDropped, payload).from_source("integrity"),
            )
        } else {
            Notification::NotRequired
        };

        let task = task_repo::get_task_by_id(self.conn, &task.id)?;
        Ok(IntegrityUpdate {
            task,
            previous_score,
            result,
            notification,
        })
    }
}

fn is_significant_drop(previous_score: f64, result: &IntegrityResult) -> bool {
    let previous_level = IntegrityLevel::from_score(previous_score);
    previous_score - result.score >= SIGNIFICANT_DROP
        || (result.level.is_critical_or_worse() && !previous_level.is_critical_or_worse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::event_repo;
    use crate::error::ErrorCode;
    use crate::events::tests::FailingSink;
    use crate::events::TaskEventService;
    use crate::models::TaskStatus;
    use crate::testing::Fixture;

    #[test]
    fn recalculation_persists_score_and_flags() {
        let fx = Fixture::new();
        let job = fx.job("Garden");
        let task = fx.task(&job, "Plant hedge");
        let task = fx.complete_on_plan(&task);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = TaskIntegrityService::new(&fx.conn, &sink).with_now(fx.now);
        let update = service.recalculate_and_update(&task.id, true).unwrap();

        assert_eq!(update.previous_score, 100.0);
        assert_eq!(update.result.score, 85.0);
        assert_eq!(update.result.level, IntegrityLevel::Good);
        assert_eq!(update.task.integrity_score, 85.0);
        assert_eq!(update.task.integrity_flags, vec!["no_evidence"]);
        assert!(matches!(update.notification, Notification::Emitted { .. }));

        let events = event_repo::list_for_task(&fx.conn, &task.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, TaskEventType::IntegrityDropped);
    }

    #[test]
    fn recalculation_is_idempotent() {
        let fx = Fixture::new();
        let job = fx.job("Garden");
        let task = fx.task(&job, "Plant hedge");
        fx.set_status(&task, TaskStatus::Blocked);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = TaskIntegrityService::new(&fx.conn, &sink).with_now(fx.now);
        let first = service.recalculate_and_update(&task.id, true).unwrap();
        let second = service.recalculate_and_update(&task.id, true).unwrap();

        assert_eq!(first.result.score, second.result.score);
        assert_eq!(second.previous_score, first.result.score);
        assert_eq!(second.notification, Notification::NotRequired);
    }

    #[test]
    fn small_drop_emits_nothing() {
        let fx = Fixture::new();
        let job = fx.job("Garden");
        let task = fx.task(&job, "Plant hedge");
        fx.set_status(&task, TaskStatus::Blocked);

        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);
        let service = TaskIntegrityService::new(&fx.conn, &sink).with_now(fx.now);
        let update = service.recalculate_and_update(&task.id, true).unwrap();

        assert_eq!(update.result.score, 98.0);
        assert_eq!(update.notification, Notification::NotRequired);
        assert!(event_repo::list_for_task(&fx.conn, &task.id).unwrap().is_empty());
    }

    #[test]
    fn failed_emission_keeps_the_update() {
        let fx = Fixture::new();
        let job = fx.job("Garden");
        let task = fx.task(&job, "Plant hedge");
        let task = fx.complete_on_plan(&task);

        let service = TaskIntegrityService::new(&fx.conn, &FailingSink).with_now(fx.now);
        let update = service.recalculate_and_update(&task.id, true).unwrap();

        assert!(update.notification.is_failed());
        assert_eq!(fx.reload(&task).integrity_score, 85.0);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let fx = Fixture::new();
        let sink = TaskEventService::new(&fx.conn);
        let service = TaskIntegrityService::new(&fx.conn, &sink);
        let err = service.recalculate_and_update("missing", true).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn crossing_into_critical_counts_as_drop() {
        let result = |score: f64| IntegrityResult {
            score,
            level: IntegrityLevel::from_score(score),
            trust: 0.0,
            flags: Vec::new(),
            breakdown: Vec::new(),
        };
        assert!(is_significant_drop(52.0, &result(49.0)));
        assert!(!is_significant_drop(45.0, &result(40.0)));
        assert!(is_significant_drop(100.0, &result(90.0)));
        assert!(!is_significant_drop(100.0, &result(90.1)));
    }
}
