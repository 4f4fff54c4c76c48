pub mod alert_repo;
pub mod connection;
pub mod dependency_repo;
pub mod employee_repo;
pub mod event_repo;
pub mod evidence_repo;
pub mod job_repo;
pub mod material_repo;
pub mod migrations;
pub mod task_repo;
pub mod timestamp;

pub use connection::*;

/// Fresh ULID for a new row.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}
