/// Runtime module - Gateway

mod lock;
mod orchestrator;
mod report;

pub use lock::{RunGuard, RunLocks};
pub use orchestrator::{AnalysisOrchestrator, ProgressCallback, RunOutcome, RunPhase, RunSummary};
pub use report::{ConsolidatedReport, TagCount};
