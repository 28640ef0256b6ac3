//! Business logic and repository trait definitions for Greenlight.
//!
//! This crate defines the "ports" (repository and collaborator traits) that
//! the infrastructure layer implements, plus the engine services built on
//! them. It depends only on `greenlight-types` -- never on
//! `greenlight-infra` or any database/IO crate.

pub mod directory;
pub mod engine;
pub mod event;
pub mod repository;
