use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::{DependencyStatus, DependencyType, NewDependency, RiskLevel, TaskDependency};

use super::timestamp;

const DEPENDENCY_COLUMNS: &str = "d.id, d.predecessor_id, d.successor_id, d.dependency_type,
    d.is_critical, d.is_hard, d.status, d.risk_weight, d.current_risk_level,
    d.satisfied_at, d.violated_at, d.created_at";

pub fn add_dependency(
    conn: &Connection,
    dep: &NewDependency,
    now: NaiveDateTime,
) -> Result<TaskDependency, SiteopsError> {
    let id = super::new_id();
    conn.execute(
        "INSERT INTO task_dependencies
            (id, predecessor_id, successor_id, dependency_type, is_critical, is_hard, risk_weight, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            dep.predecessor_id,
            dep.successor_id,
            dep.dependency_type.as_str(),
            dep.is_critical,
            dep.is_hard,
            dep.risk_weight,
            timestamp::to_db(&now),
        ],
    )?;
    get_dependency(conn, &id)
}

pub fn get_dependency(conn: &Connection, id: &str) -> Result<TaskDependency, SiteopsError> {
    conn.query_row(
        &format!("SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies d WHERE d.id = ?1"),
        params![id],
        row_to_dependency,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => SiteopsError::dependency_not_found(id),
        _ => SiteopsError::from(e),
    })
}

/// All dependency edges whose successor belongs to the job.
pub fn list_for_job(conn: &Connection, job_id: &str) -> Result<Vec<TaskDependency>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEPENDENCY_COLUMNS}
         FROM task_dependencies d
         JOIN tasks t ON d.successor_id = t.id
         WHERE t.job_id = ?1
         ORDER BY d.predecessor_id ASC, d.successor_id ASC"
    ))?;
    let deps = stmt
        .query_map(params![job_id], row_to_dependency)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deps)
}

/// Edges pointing at a task (its predecessors).
pub fn incoming(conn: &Connection, task_id: &str) -> Result<Vec<TaskDependency>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies d
         WHERE d.successor_id = ?1 ORDER BY d.predecessor_id ASC"
    ))?;
    let deps = stmt
        .query_map(params![task_id], row_to_dependency)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deps)
}

/// Edges leaving a task (its successors).
pub fn outgoing(conn: &Connection, task_id: &str) -> Result<Vec<TaskDependency>, SiteopsError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies d
         WHERE d.predecessor_id = ?1 ORDER BY d.successor_id ASC"
    ))?;
    let deps = stmt
        .query_map(params![task_id], row_to_dependency)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deps)
}

/// Persist a new status, stamping the transition time for satisfied/violated.
pub fn update_status(
    conn: &Connection,
    id: &str,
    status: DependencyStatus,
    now: NaiveDateTime,
) -> Result<(), SiteopsError> {
    let now_text = timestamp::to_db(&now);
    match status {
        DependencyStatus::Satisfied => conn.execute(
            "UPDATE task_dependencies SET status = ?1, satisfied_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_text, id],
        )?,
        DependencyStatus::Violated => conn.execute(
            "UPDATE task_dependencies SET status = ?1, violated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_text, id],
        )?,
        DependencyStatus::Active => conn.execute(
            "UPDATE task_dependencies SET status = ?1, satisfied_at = NULL, violated_at = NULL WHERE id = ?2",
            params![status.as_str(), id],
        )?,
    };
    Ok(())
}

pub fn update_risk_level(conn: &Connection, id: &str, level: RiskLevel) -> Result<(), SiteopsError> {
    conn.execute(
        "UPDATE task_dependencies SET current_risk_level = ?1 WHERE id = ?2",
        params![level.as_str(), id],
    )?;
    Ok(())
}

/// Mark an edge broken by a failed predecessor.
pub fn mark_violated(conn: &Connection, id: &str, now: NaiveDateTime) -> Result<(), SiteopsError> {
    conn.execute(
        "UPDATE task_dependencies
         SET status = 'violated', violated_at = ?1, current_risk_level = 'critical'
         WHERE id = ?2",
        params![timestamp::to_db(&now), id],
    )?;
    Ok(())
}

fn row_to_dependency(row: &rusqlite::Row) -> rusqlite::Result<TaskDependency> {
    Ok(TaskDependency {
        id: row.get(0)?,
        predecessor_id: row.get(1)?,
        successor_id: row.get(2)?,
        dependency_type: DependencyType::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(DependencyType::FinishToStart),
        is_critical: row.get(4)?,
        is_hard: row.get(5)?,
        status: DependencyStatus::from_str(&row.get::<_, String>(6)?).unwrap_or(DependencyStatus::Active),
        risk_weight: row.get(7)?,
        current_risk_level: RiskLevel::from_str(&row.get::<_, String>(8)?).unwrap_or(RiskLevel::Low),
        satisfied_at: timestamp::column(row, 9)?,
        violated_at: timestamp::column(row, 10)?,
        created_at: timestamp::required_column(row, 11)?,
    })
}
