use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::SiteopsError;

use super::migrations;

/// Default database location, relative to the working directory.
pub fn default_db_path() -> PathBuf {
    PathBuf::from(".siteops").join("siteops.db")
}

/// The analytics config lives next to the database file.
pub fn config_path(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(dir) => dir.join("config.json"),
        None => PathBuf::from("config.json"),
    }
}

/// Open a connection to the database. Returns error if not initialized.
pub fn open_db(path: &Path) -> Result<Connection, SiteopsError> {
    if !path.exists() {
        return Err(SiteopsError::not_initialized(&path.display().to_string()));
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Initialize the database: create directories, database, and run migrations.
pub fn init_db(path: &Path) -> Result<PathBuf, SiteopsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SiteopsError::database(e.to_string()))?;
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(path.to_path_buf())
}

/// Migrated in-memory database, used by embedders and tests.
pub fn open_in_memory() -> Result<Connection, SiteopsError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> Result<(), SiteopsError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}
