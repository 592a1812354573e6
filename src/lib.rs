pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod models;
pub mod runtime;
pub mod store;
pub mod utils;

pub use app::{load_config, Config, TenantDirectory};
pub use cache::{fingerprint, partition, AnalysisStats, CacheDocument, CacheEntry, CacheStore};
pub use models::{AnalysisModule, Analyzer, AnalyzerFactory, ConversationRecord, TenantId};
pub use runtime::{AnalysisOrchestrator, RunOutcome};
pub use utils::{AnalysisError, StoreError};
