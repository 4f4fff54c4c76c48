use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::{EventPayload, NewTaskEvent, TaskEvent, TaskEventType};

use super::timestamp;

const EVENT_COLUMNS: &str =
    "e.id, e.task_id, e.job_id, e.event_type, e.payload, e.occurred_at, e.source, e.ai_processed";

/// Append an event row. Events are never updated afterwards, except for the
/// `ai_processed` marker.
pub fn insert_event(
    conn: &Connection,
    event: &NewTaskEvent,
    job_id: &str,
    occurred_at: NaiveDateTime,
) -> Result<TaskEvent, SiteopsError> {
    let id = super::new_id();
    let payload = serde_json::to_string(&event.payload)?;
    conn.execute(
        "INSERT INTO task_events (id, task_id, job_id, event_type, payload, occurred_at, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            event.task_id,
            job_id,
            event.event_type.as_str(),
            payload,
            timestamp::to_db(&occurred_at),
            event.source,
        ],
    )?;
    Ok(TaskEvent {
        id,
        task_id: event.task_id.clone(),
        job_id: job_id.to_string(),
        event_type: event.event_type,
        payload: event.payload.clone(),
        occurred_at,
        source: event.source.clone(),
        ai_processed: false,
    })
}

/// Most recent events of a job, newest first.
pub fn list_for_job(conn: &Connection, job_id: &str, limit: usize) -> Result<Vec<TaskEvent>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM task_events e
         WHERE e.job_id = ?1 ORDER BY e.occurred_at DESC, e.id DESC LIMIT ?2"
    ))?;
    let events = stmt
        .query_map(params![job_id, limit as i64], row_to_event)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Full history of a task, oldest first.
pub fn list_for_task(conn: &Connection, task_id: &str) -> Result<Vec<TaskEvent>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM task_events e
         WHERE e.task_id = ?1 ORDER BY e.occurred_at ASC, e.id ASC"
    ))?;
    let events = stmt
        .query_map(params![task_id], row_to_event)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Recent events on tasks assigned to an employee, newest first.
pub fn list_for_employee(
    conn: &Connection,
    employee_id: &str,
    limit: usize,
) -> Result<Vec<TaskEvent>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM task_events e
         JOIN tasks t ON e.task_id = t.id
         WHERE t.assigned_employee_id = ?1
         ORDER BY e.occurred_at DESC, e.id DESC LIMIT ?2"
    ))?;
    let events = stmt
        .query_map(params![employee_id, limit as i64], row_to_event)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Events at or after `since`, oldest first.
pub fn list_since(conn: &Connection, since: NaiveDateTime) -> Result<Vec<TaskEvent>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM task_events e
         WHERE e.occurred_at >= ?1 ORDER BY e.occurred_at ASC, e.id ASC"
    ))?;
    let events = stmt
        .query_map(params![timestamp::to_db(&since)], row_to_event)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

pub fn mark_processed(conn: &Connection, ids: &[String]) -> Result<usize, SiteopsError> {
    let mut stmt = conn.prepare("UPDATE task_events SET ai_processed = 1 WHERE id = ?1")?;
    let mut changed = 0;
    for id in ids {
        changed += stmt.execute(params![id])?;
    }
    Ok(changed)
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<TaskEvent> {
    let payload: String = row.get(4)?;
    Ok(TaskEvent {
        id: row.get(0)?,
        task_id: row.get(1)?,
        job_id: row.get(2)?,
        event_type: TaskEventType::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(TaskEventType::StatusChanged),
        payload: serde_json::from_str(&payload).unwrap_or(EventPayload::Unknown),
        occurred_at: timestamp::required_column(row, 5)?,
        source: row.get(6)?,
        ai_processed: row.get(7)?,
    })
}
