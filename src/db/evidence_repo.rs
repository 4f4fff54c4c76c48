use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::{EvidenceType, GeoPoint, NewEvidence, TaskEvidence};

use super::timestamp;

pub fn add_evidence(
    conn: &Connection,
    evidence: &NewEvidence,
    captured_at: NaiveDateTime,
) -> Result<TaskEvidence, SiteopsError> {
    let id = super::new_id();
    conn.execute(
        "INSERT INTO task_evidence
            (id, task_id, evidence_type, file_path, note_text, measurement_value,
             gps_lat, gps_lng, is_validated, captured_offline, captured_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            evidence.task_id,
            evidence.evidence_type.as_str(),
            evidence.file_path,
            evidence.note_text,
            evidence.measurement_value,
            evidence.gps.map(|g| g.lat),
            evidence.gps.map(|g| g.lng),
            evidence.is_validated,
            evidence.captured_offline,
            timestamp::to_db(&captured_at),
        ],
    )?;
    conn.query_row(
        "SELECT id, task_id, evidence_type, file_path, note_text, measurement_value,
                gps_lat, gps_lng, is_validated, captured_offline, captured_at
         FROM task_evidence WHERE id = ?1",
        params![id],
        row_to_evidence,
    )
    .map_err(SiteopsError::from)
}

pub fn list_for_task(conn: &Connection, task_id: &str) -> Result<Vec<TaskEvidence>, SiteopsError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, evidence_type, file_path, note_text, measurement_value,
                gps_lat, gps_lng, is_validated, captured_offline, captured_at
         FROM task_evidence WHERE task_id = ?1 ORDER BY captured_at ASC, id ASC",
    )?;
    let evidence = stmt
        .query_map(params![task_id], row_to_evidence)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(evidence)
}

fn row_to_evidence(row: &rusqlite::Row) -> rusqlite::Result<TaskEvidence> {
    let lat: Option<f64> = row.get(6)?;
    let lng: Option<f64> = row.get(7)?;
    Ok(TaskEvidence {
        id: row.get(0)?,
        task_id: row.get(1)?,
        evidence_type: EvidenceType::from_str(&row.get::<_, String>(2)?).unwrap_or(EvidenceType::Note),
        file_path: row.get(3)?,
        note_text: row.get(4)?,
        measurement_value: row.get(5)?,
        gps: lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng }),
        is_validated: row.get(8)?,
        captured_offline: row.get(9)?,
        captured_at: timestamp::required_column(row, 10)?,
    })
}
