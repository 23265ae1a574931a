pub mod classify;
pub mod orchestrator;
pub mod staleness;
pub mod update;
