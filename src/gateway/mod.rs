//! Gateway module - Call orchestration and pool maintenance

pub mod ban_sweeper;
pub mod orchestrator;

pub use ban_sweeper::BanSweeper;
pub use orchestrator::{CallOrchestrator, CallOutcome};
