//! Infrastructure layer for Greenlight.
//!
//! Contains implementations of the repository traits defined in
//! `greenlight-core`: SQLite storage with split read/write pools, in-process
//! adapters for the organization directory and form registry, and the
//! engine configuration loader.

pub mod config;
pub mod directory;
pub mod forms;
pub mod sqlite;
