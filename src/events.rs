//! Append-only task event log and the best-effort notification outcome that
//! analytics operations report after trying to write to it.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{event_repo, task_repo, timestamp};
use crate::error::SiteopsError;
use crate::models::{NewTaskEvent, TaskEvent};

/// Destination for domain events.
pub trait EventSink {
    fn emit(&self, event: NewTaskEvent) -> Result<TaskEvent, SiteopsError>;
}

/// Writes events to the `task_events` table.
pub struct TaskEventService<'a> {
    conn: &'a Connection,
    now: Option<NaiveDateTime>,
}

impl<'a> TaskEventService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, now: None }
    }

    /// Stamp every emitted event with a fixed time instead of the wall clock.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }
}

impl EventSink for TaskEventService<'_> {
    fn emit(&self, event: NewTaskEvent) -> Result<TaskEvent, SiteopsError> {
        let task = task_repo::get_task_by_id(self.conn, &event.task_id)?;
        let occurred_at = self.now.unwrap_or_else(timestamp::now);
        let stored = event_repo::insert_event(self.conn, &event, &task.job_id, occurred_at)?;
        tracing::debug!(
            event_id = %stored.id,
            task_id = %stored.task_id,
            event_type = stored.event_type.as_str(),
            "event emitted"
        );
        Ok(stored)
    }
}

/// What happened to the side-effect event of an operation. The primary
/// result of the operation is valid whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Notification {
    NotRequired,
    Emitted { event_id: String },
    Failed { reason: String },
}

impl Notification {
    /// Try to emit, turning a failure into a logged diagnostic.
    pub fn attempt(sink: &dyn EventSink, event: NewTaskEvent) -> Self {
        let task_id = event.task_id.clone();
        let event_type = event.event_type;
        match sink.emit(event) {
            Ok(stored) => Self::Emitted { event_id: stored.id },
            Err(e) => {
                tracing::warn!(
                    task_id = %task_id,
                    event_type = event_type.as_str(),
                    "event emission failed: {}",
                    e.message
                );
                Self::Failed { reason: e.message }
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{EventPayload, TaskEventType};
    use crate::testing::Fixture;

    /// Sink that always fails, for exercising the best-effort paths.
    pub(crate) struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: NewTaskEvent) -> Result<TaskEvent, SiteopsError> {
            Err(SiteopsError::database("event log unavailable"))
        }
    }

    #[test]
    fn emit_resolves_job_and_persists() {
        let fx = Fixture::new();
        let job = fx.job("Patio");
        let task = fx.task(&job, "Lay pavers");
        let sink = TaskEventService::new(&fx.conn).with_now(fx.now);

        let event = sink
            .emit(NewTaskEvent::new(&task.id, TaskEventType::Started, EventPayload::Empty))
            .unwrap();

        assert_eq!(event.job_id, job.id);
        let stored = event_repo::list_for_task(&fx.conn, &task.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_type, TaskEventType::Started);
        assert_eq!(stored[0].payload, EventPayload::Empty);
    }

    #[test]
    fn emit_for_missing_task_is_not_found() {
        let fx = Fixture::new();
        let sink = TaskEventService::new(&fx.conn);
        let err = sink
            .emit(NewTaskEvent::new("nope", TaskEventType::Started, EventPayload::Empty))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn attempt_reports_failure_without_error() {
        let outcome = Notification::attempt(
            &FailingSink,
            NewTaskEvent::new("t", TaskEventType::Blocked, EventPayload::Empty),
        );
        assert!(outcome.is_failed());
    }
}
