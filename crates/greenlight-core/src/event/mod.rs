//! Event bus for approval lifecycle notifications.
//!
//! Provides an `EventBus` that distributes `ApprovalEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
