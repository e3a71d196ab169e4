//! Tick orchestration and the status HTTP surface

pub mod http;
pub mod orchestrator;

pub use http::{create_router, start_server, AppState, HealthStatus};
pub use orchestrator::{CycleOrchestrator, EngineStatus, SharedStatus, TickReport, TickStage};
