use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::SiteopsError;
use crate::models::{GeoPoint, NewTask, Task, TaskStatus};

use super::timestamp;

const TASK_COLUMNS: &str = "id, job_id, title, description, status,
    planned_start, planned_end, actual_start, actual_end, assigned_employee_id,
    integrity_score, integrity_flags, gps_lat, gps_lng, location_name, location_type,
    expected_outcome, workaround_used, deviation_notes, created_at, updated_at";

pub fn create_task(conn: &Connection, task: &NewTask, now: NaiveDateTime) -> Result<Task, SiteopsError> {
    let id = super::new_id();
    let status = task.status.unwrap_or(if task.assigned_employee_id.is_some() {
        TaskStatus::Assigned
    } else {
        TaskStatus::Planned
    });
    let now_text = timestamp::to_db(&now);
    conn.execute(
        "INSERT INTO tasks (id, job_id, title, description, status, planned_start, planned_end,
                            assigned_employee_id, gps_lat, gps_lng, location_name, location_type,
                            expected_outcome, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            id,
            task.job_id,
            task.title,
            task.description,
            status.as_str(),
            timestamp::opt_to_db(task.planned_start),
            timestamp::opt_to_db(task.planned_end),
            task.assigned_employee_id,
            task.gps.map(|g| g.lat),
            task.gps.map(|g| g.lng),
            task.location_name,
            task.location_type,
            task.expected_outcome,
            now_text,
        ],
    )?;
    get_task_by_id(conn, &id)
}

pub fn get_task_by_id(conn: &Connection, id: &str) -> Result<Task, SiteopsError> {
    find_task(conn, id)?.ok_or_else(|| SiteopsError::task_not_found(id))
}

pub fn find_task(conn: &Connection, id: &str) -> Result<Option<Task>, SiteopsError> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

pub fn list_tasks_by_job(conn: &Connection, job_id: &str) -> Result<Vec<Task>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE job_id = ?1
         ORDER BY planned_start IS NULL, planned_start ASC, created_at ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![job_id], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn list_tasks_by_employee(conn: &Connection, employee_id: &str) -> Result<Vec<Task>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE assigned_employee_id = ?1
         ORDER BY planned_start IS NULL, planned_start ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![employee_id], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn list_all_tasks(conn: &Connection) -> Result<Vec<Task>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         ORDER BY planned_start IS NULL, planned_start ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map([], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Set a new status, stamping `actual_start`/`actual_end` the first time work
/// starts or ends.
pub fn update_task_status(
    conn: &Connection,
    id: &str,
    status: TaskStatus,
    at: NaiveDateTime,
) -> Result<(), SiteopsError> {
    let (started_clause, ended_clause) = match status {
        TaskStatus::InProgress => ("actual_start = COALESCE(actual_start, ?2),", ""),
        s if s.is_finished() => (
            "actual_start = COALESCE(actual_start, ?2),",
            "actual_end = COALESCE(actual_end, ?2),",
        ),
        _ => ("", ""),
    };

    let sql = format!(
        "UPDATE tasks SET status = ?1, {started_clause} {ended_clause}
         updated_at = ?2
         WHERE id = ?3"
    );
    let changed = conn.execute(&sql, params![status.as_str(), timestamp::to_db(&at), id])?;
    if changed == 0 {
        return Err(SiteopsError::task_not_found(id));
    }
    Ok(())
}

pub fn set_actual_times(
    conn: &Connection,
    id: &str,
    actual_start: Option<NaiveDateTime>,
    actual_end: Option<NaiveDateTime>,
) -> Result<(), SiteopsError> {
    let changed = conn.execute(
        "UPDATE tasks SET actual_start = ?1, actual_end = ?2 WHERE id = ?3",
        params![
            timestamp::opt_to_db(actual_start),
            timestamp::opt_to_db(actual_end),
            id
        ],
    )?;
    if changed == 0 {
        return Err(SiteopsError::task_not_found(id));
    }
    Ok(())
}

pub fn record_workaround(
    conn: &Connection,
    id: &str,
    deviation_notes: Option<&str>,
) -> Result<(), SiteopsError> {
    let changed = conn.execute(
        "UPDATE tasks SET workaround_used = 1, deviation_notes = COALESCE(?1, deviation_notes)
         WHERE id = ?2",
        params![deviation_notes, id],
    )?;
    if changed == 0 {
        return Err(SiteopsError::task_not_found(id));
    }
    Ok(())
}

/// Only the integrity service writes these columns.
pub(crate) fn update_integrity(
    conn: &Connection,
    id: &str,
    score: f64,
    flags: &[String],
    now: NaiveDateTime,
) -> Result<(), SiteopsError> {
    let flags_json = serde_json::to_string(flags)?;
    conn.execute(
        "UPDATE tasks SET integrity_score = ?1, integrity_flags = ?2, updated_at = ?3 WHERE id = ?4",
        params![score, flags_json, timestamp::to_db(&now), id],
    )?;
    Ok(())
}

/// Get task status counts for a job.
pub fn status_counts(conn: &Connection, job_id: &str) -> Result<StatusCounts, SiteopsError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks WHERE job_id = ?1 GROUP BY status")?;
    let mut counts = StatusCounts::default();
    let rows = stmt.query_map(params![job_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        match TaskStatus::from_str(&status) {
            Some(TaskStatus::Planned) => counts.planned = count,
            Some(TaskStatus::Assigned) => counts.assigned = count,
            Some(TaskStatus::InProgress) => counts.in_progress = count,
            Some(TaskStatus::Completed) => counts.completed = count,
            Some(TaskStatus::Partial) => counts.partial = count,
            Some(TaskStatus::Failed) => counts.failed = count,
            Some(TaskStatus::Blocked) => counts.blocked = count,
            Some(TaskStatus::Cancelled) => counts.cancelled = count,
            None => {}
        }
    }
    counts.total = counts.planned
        + counts.assigned
        + counts.in_progress
        + counts.completed
        + counts.partial
        + counts.failed
        + counts.blocked
        + counts.cancelled;
    counts.percentage = if counts.total > 0 {
        (counts.completed as f64 / counts.total as f64) * 100.0
    } else {
        0.0
    };
    Ok(counts)
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub planned: i64,
    pub assigned: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub partial: i64,
    pub failed: i64,
    pub blocked: i64,
    pub cancelled: i64,
    pub percentage: f64,
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let flags_json: String = row.get(11)?;
    let lat: Option<f64> = row.get(12)?;
    let lng: Option<f64> = row.get(13)?;
    Ok(Task {
        id: row.get(0)?,
        job_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: TaskStatus::from_str(&row.get::<_, String>(4)?).unwrap_or(TaskStatus::Planned),
        planned_start: timestamp::column(row, 5)?,
        planned_end: timestamp::column(row, 6)?,
        actual_start: timestamp::column(row, 7)?,
        actual_end: timestamp::column(row, 8)?,
        assigned_employee_id: row.get(9)?,
        integrity_score: row.get(10)?,
        integrity_flags: serde_json::from_str(&flags_json).unwrap_or_default(),
        gps: lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng }),
        location_name: row.get(14)?,
        location_type: row.get(15)?,
        expected_outcome: row.get(16)?,
        workaround_used: row.get(17)?,
        deviation_notes: row.get(18)?,
        created_at: timestamp::required_column(row, 19)?,
        updated_at: timestamp::required_column(row, 20)?,
    })
}
