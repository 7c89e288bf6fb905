pub mod flatten;
pub mod plan;
pub mod ports;
pub mod reconciler;
pub mod run_state;
pub mod sync_service;
pub mod types;
