use anyhow::Result;
use async_trait::async_trait;

use super::types::{AnalysisModule, AnalysisResult, ConversationRecord};

/// Core trait that all analysis backends must implement.
///
/// The cache treats implementations as opaque: any rule-based, local or remote
/// analyzer satisfying this signature is interchangeable.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one conversation in the context of a dashboard module
    async fn analyze(
        &self,
        conversation: &ConversationRecord,
        module: AnalysisModule,
    ) -> Result<AnalysisResult>;

    /// Get the name of the analyzer, recorded in consolidated reports
    fn name(&self) -> &str;
}
