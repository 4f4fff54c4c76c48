pub mod commands;
pub mod dep;
pub mod employee;
pub mod init;
pub mod job;
pub mod ops;
pub mod risk;
pub mod task;

pub use commands::*;

use std::path::PathBuf;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::Value;

use crate::config::{self, AnalyticsConfig};
use crate::db::{connection, timestamp};
use crate::error::SiteopsError;
use crate::models::GeoPoint;
use crate::output;

/// Global flags shared by every command.
pub struct Context {
    pub json: bool,
    pub db_path: PathBuf,
}

impl Context {
    pub fn new(json: bool, db: Option<PathBuf>) -> Self {
        Self {
            json,
            db_path: db.unwrap_or_else(connection::default_db_path),
        }
    }

    pub fn open(&self) -> Result<Connection, SiteopsError> {
        connection::open_db(&self.db_path)
    }

    pub fn config(&self) -> Result<AnalyticsConfig, SiteopsError> {
        let path = connection::config_path(&self.db_path);
        config::load_config(&path).map_err(|e| SiteopsError::config(format!("{e:#}")))
    }

    /// Print the success envelope in JSON mode, otherwise run the text printer.
    pub fn respond(&self, data: Value, text: impl FnOnce()) -> Result<i32, SiteopsError> {
        if self.json {
            output::json::print(&output::json::success(data))?;
        } else {
            text();
        }
        Ok(0)
    }

    /// Turn a command result into an exit code, reporting the error.
    pub fn finish(&self, result: Result<i32, SiteopsError>) -> i32 {
        match result {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!(code = e.code.as_str(), "command failed: {}", e.message);
                if self.json {
                    // stdout may be closed; nothing left to report to
                    let _ = output::json::print(&output::json::error(&e));
                } else {
                    eprintln!("Error: {}", e.message);
                }
                1
            }
        }
    }
}

pub(crate) fn parse_time(value: Option<&str>, flag: &str) -> Result<Option<NaiveDateTime>, SiteopsError> {
    value
        .map(|raw| {
            timestamp::parse(raw)
                .ok_or_else(|| SiteopsError::validation(format!("--{flag}: cannot parse '{raw}' as a date/time")))
        })
        .transpose()
}

pub(crate) fn gps(args: &GpsArgs) -> Option<GeoPoint> {
    match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    }
}
