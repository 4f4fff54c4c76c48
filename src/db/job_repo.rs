use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::{Job, JobStatus};

use super::timestamp;

pub fn create_job(conn: &Connection, title: &str, now: NaiveDateTime) -> Result<Job, SiteopsError> {
    let id = super::new_id();
    conn.execute(
        "INSERT INTO jobs (id, title, created_at) VALUES (?1, ?2, ?3)",
        params![id, title, timestamp::to_db(&now)],
    )?;
    get_job_by_id(conn, &id)
}

pub fn get_job_by_id(conn: &Connection, id: &str) -> Result<Job, SiteopsError> {
    conn.query_row(
        "SELECT id, title, status, created_at FROM jobs WHERE id = ?1",
        params![id],
        row_to_job,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => SiteopsError::job_not_found(id),
        _ => SiteopsError::from(e),
    })
}

pub fn list_jobs(conn: &Connection) -> Result<Vec<Job>, SiteopsError> {
    let mut stmt = conn.prepare("SELECT id, title, status, created_at FROM jobs ORDER BY created_at ASC, id ASC")?;
    let jobs = stmt
        .query_map([], row_to_job)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(jobs)
}

pub fn update_job_status(conn: &Connection, id: &str, status: JobStatus) -> Result<(), SiteopsError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(SiteopsError::job_not_found(id));
    }
    Ok(())
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        title: row.get(1)?,
        status: JobStatus::from_str(&row.get::<_, String>(2)?).unwrap_or(JobStatus::Active),
        created_at: timestamp::required_column(row, 3)?,
    })
}
