// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod factory;
mod keyword;
mod remote;
mod traits;
mod types;

// Public re-exports - the ONLY way to access model functionality
pub use factory::AnalyzerFactory;
pub use keyword::KeywordAnalyzer;
pub use remote::RemoteAnalyzer;
pub use traits::Analyzer;
pub use types::{AnalysisModule, AnalysisResult, ConversationMessage, ConversationRecord, TenantId};
