use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::{NewMaterial, TaskMaterial};

pub fn add_material(conn: &Connection, material: &NewMaterial) -> Result<TaskMaterial, SiteopsError> {
    let id = super::new_id();
    conn.execute(
        "INSERT INTO task_materials
            (id, task_id, material_name, unit, planned_quantity, actual_quantity,
             is_substitute, substitute_notes, deviation_notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            material.task_id,
            material.material_name,
            material.unit,
            material.planned_quantity,
            material.actual_quantity,
            material.is_substitute,
            material.substitute_notes,
            material.deviation_notes,
        ],
    )?;
    conn.query_row(
        "SELECT id, task_id, material_name, unit, planned_quantity, actual_quantity,
                is_substitute, substitute_notes, deviation_notes
         FROM task_materials WHERE id = ?1",
        params![id],
        row_to_material,
    )
    .map_err(SiteopsError::from)
}

pub fn list_for_task(conn: &Connection, task_id: &str) -> Result<Vec<TaskMaterial>, SiteopsError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, material_name, unit, planned_quantity, actual_quantity,
                is_substitute, substitute_notes, deviation_notes
         FROM task_materials WHERE task_id = ?1 ORDER BY material_name ASC, id ASC",
    )?;
    let materials = stmt
        .query_map(params![task_id], row_to_material)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(materials)
}

fn row_to_material(row: &rusqlite::Row) -> rusqlite::Result<TaskMaterial> {
    Ok(TaskMaterial {
        id: row.get(0)?,
        task_id: row.get(1)?,
        material_name: row.get(2)?,
        unit: row.get(3)?,
        planned_quantity: row.get(4)?,
        actual_quantity: row.get(5)?,
        is_substitute: row.get(6)?,
        substitute_notes: row.get(7)?,
        deviation_notes: row.get(8)?,
    })
}
