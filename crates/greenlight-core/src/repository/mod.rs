//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (greenlight-infra) implements. The core crate never depends on any
//! specific storage technology.
//!
//! Methods whose names start with a condition (`close_if_pending`,
//! `advance_node`, `finish`) are one-shot conditional updates: the expected
//! state sits in the UPDATE's WHERE clause and the boolean result reports
//! whether this call performed the transition. They are the engine's only
//! mutual-exclusion primitive, so implementations must never replace them
//! with a read followed by a write.

pub mod definition;
pub mod history;
pub mod instance;
pub mod stats;
pub mod task;
