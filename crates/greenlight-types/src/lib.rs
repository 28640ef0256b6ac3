//! Shared domain types for Greenlight.
//!
//! This crate contains the core domain types used across the Greenlight
//! approval engine: process definitions, instances, tasks, history entries,
//! events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod history;
pub mod id;
pub mod instance;
pub mod stats;
pub mod task;
