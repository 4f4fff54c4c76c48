use rusqlite::{params, Connection};

use crate::error::SiteopsError;
use crate::models::Employee;

pub fn create_employee(conn: &Connection, name: &str, role: Option<&str>) -> Result<Employee, SiteopsError> {
    let id = super::new_id();
    conn.execute(
        "INSERT INTO employees (id, name, role) VALUES (?1, ?2, ?3)",
        params![id, name, role],
    )?;
    get_employee_by_id(conn, &id)
}

pub fn get_employee_by_id(conn: &Connection, id: &str) -> Result<Employee, SiteopsError> {
    conn.query_row(
        "SELECT id, name, role, active FROM employees WHERE id = ?1",
        params![id],
        row_to_employee,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => SiteopsError::employee_not_found(id),
        _ => SiteopsError::from(e),
    })
}

pub fn list_employees(conn: &Connection) -> Result<Vec<Employee>, SiteopsError> {
    let mut stmt = conn.prepare("SELECT id, name, role, active FROM employees ORDER BY name ASC")?;
    let employees = stmt
        .query_map([], row_to_employee)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(employees)
}

fn row_to_employee(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        active: row.get(3)?,
    })
}
