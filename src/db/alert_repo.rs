use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::SiteopsError;
use crate::models::{AiAlert, Severity, StoredBriefing};

use super::timestamp;

pub struct NewAlert<'a> {
    pub alert_type: &'a str,
    pub severity: Severity,
    pub job_id: Option<&'a str>,
    pub subject_id: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub period: &'a str,
}

/// Insert an alert unless one already exists for the same type, subject and
/// period. Returns the alert only when a row was written.
pub fn insert_alert_once(
    conn: &Connection,
    alert: &NewAlert,
    now: NaiveDateTime,
) -> Result<Option<AiAlert>, SiteopsError> {
    let id = super::new_id();
    let changed = conn.execute(
        "INSERT OR IGNORE INTO ai_alerts
            (id, alert_type, severity, job_id, subject_id, title, message, period, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            alert.alert_type,
            alert.severity.as_str(),
            alert.job_id,
            alert.subject_id,
            alert.title,
            alert.message,
            alert.period,
            timestamp::to_db(&now),
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(AiAlert {
        id,
        alert_type: alert.alert_type.to_string(),
        severity: alert.severity,
        job_id: alert.job_id.map(str::to_string),
        subject_id: alert.subject_id.to_string(),
        title: alert.title.to_string(),
        message: alert.message.to_string(),
        period: alert.period.to_string(),
        created_at: now,
    }))
}

pub fn list_alerts(conn: &Connection, limit: usize) -> Result<Vec<AiAlert>, SiteopsError> {
    let mut stmt = conn.prepare(
        "SELECT id, alert_type, severity, job_id, subject_id, title, message, period, created_at
         FROM ai_alerts ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;
    let alerts = stmt
        .query_map(params![limit as i64], |row| {
            Ok(AiAlert {
                id: row.get(0)?,
                alert_type: row.get(1)?,
                severity: Severity::from_str(&row.get::<_, String>(2)?).unwrap_or(Severity::Low),
                job_id: row.get(3)?,
                subject_id: row.get(4)?,
                title: row.get(5)?,
                message: row.get(6)?,
                period: row.get(7)?,
                created_at: timestamp::required_column(row, 8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(alerts)
}

pub fn get_briefing(conn: &Connection, date: NaiveDate) -> Result<Option<StoredBriefing>, SiteopsError> {
    let row = conn
        .query_row(
            "SELECT payload, created_at FROM daily_briefings WHERE briefing_date = ?1",
            params![date.format("%Y-%m-%d").to_string()],
            |row| Ok((row.get::<_, String>(0)?, timestamp::required_column(row, 1)?)),
        )
        .optional()?;
    match row {
        Some((payload, created_at)) => Ok(Some(StoredBriefing {
            briefing_date: date,
            payload: serde_json::from_str(&payload)?,
            created_at,
        })),
        None => Ok(None),
    }
}

/// Write-once: returns false when a briefing for the date already exists.
pub fn insert_briefing(
    conn: &Connection,
    date: NaiveDate,
    payload: &serde_json::Value,
    now: NaiveDateTime,
) -> Result<bool, SiteopsError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO daily_briefings (briefing_date, payload, created_at) VALUES (?1, ?2, ?3)",
        params![
            date.format("%Y-%m-%d").to_string(),
            serde_json::to_string(payload)?,
            timestamp::to_db(&now),
        ],
    )?;
    Ok(changed > 0)
}
