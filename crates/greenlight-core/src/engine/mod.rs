//! The approval engine services.
//!
//! `graph` holds the pure routing functions; everything else coordinates
//! repositories, collaborator ports and the event bus around them.

pub mod approval;
pub mod definitions;
pub mod dispatch;
pub mod graph;
pub mod history;
pub mod stats;

pub use approval::ApprovalEngine;
pub use definitions::DefinitionService;
pub use dispatch::TaskDispatcher;
pub use history::HistoryRecorder;
pub use stats::StatsService;
