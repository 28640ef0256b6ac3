//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Every status transition the engine relies
//! on for mutual exclusion is a single conditional UPDATE here.

pub mod definition;
pub mod history;
pub mod instance;
pub mod pool;
pub mod stats;
pub mod task;
