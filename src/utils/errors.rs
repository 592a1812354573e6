use thiserror::Error;

use crate::models::{AnalysisModule, TenantId};

/// Errors raised while talking to a tenant's remote document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status} for {path}")]
    Status {
        status: reqwest::StatusCode,
        /// Request path without the credential-bearing query string
        path: String,
    },

    #[error("Cache document was modified concurrently")]
    Conflict,

    #[error("Invalid document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Main error type for an analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Authentication required: no tenant identity for this run")]
    Unauthenticated,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An analysis run for {tenant}/{module} is already in progress")]
    RunInProgress {
        tenant: TenantId,
        module: AnalysisModule,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Analysis of conversation {conversation_id} failed: {source}")]
    Analysis {
        conversation_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    /// Whether the failure happened before any remote I/O was attempted
    pub fn is_pre_io(&self) -> bool {
        matches!(
            self,
            AnalysisError::Unauthenticated
                | AnalysisError::Config(_)
                | AnalysisError::RunInProgress { .. }
        )
    }
}
