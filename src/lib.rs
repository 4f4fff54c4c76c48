//! Task integrity scoring and dependency analytics for field-work jobs.
//!
//! The library is organised around a SQLite store (`db`), typed records
//! (`models`), and four analytics layers built on top of each other:
//! integrity scoring, the dependency graph, risk propagation, and the
//! operator-facing reports.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod graph;
pub mod integrity;
pub mod models;
pub mod operator;
pub mod output;
pub mod risk;

#[cfg(test)]
pub(crate) mod testing;
