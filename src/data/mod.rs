//! Data storage and tabular I/O
//!
//! SQLite persistence for pitch events and feature rows, plus CSV readers
//! and writers for feeds, rosters and park tables.

pub mod database;
pub mod loader;

pub use database::Database;
