use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::keyword::KeywordAnalyzer;
use super::remote::RemoteAnalyzer;
use super::traits::Analyzer;
use crate::app::{AnalyzerKind, AnalyzerSettings};
use crate::utils::log_warn;

/// Factory for creating analyzer instances from configuration
pub struct AnalyzerFactory;

impl AnalyzerFactory {
    /// Create the analyzer selected by `settings.kind`
    pub fn create(settings: &AnalyzerSettings) -> Result<Arc<dyn Analyzer>> {
        match settings.kind {
            AnalyzerKind::Keyword => {
                debug!("Using keyword analyzer");
                Ok(Arc::new(KeywordAnalyzer::new()))
            }
            AnalyzerKind::Remote => {
                if !settings.endpoint.starts_with("http://") && !settings.endpoint.starts_with("https://") {
                    anyhow::bail!(
                        "Invalid analyzer endpoint '{}'. Expected an http(s) URL",
                        settings.endpoint
                    );
                }

                let api_key = std::env::var(&settings.api_key_env)
                    .ok()
                    .filter(|k| !k.is_empty());
                if api_key.is_none() {
                    log_warn(
                        "🔑",
                        format!(
                            "{} is not set; calling {} without an API key",
                            settings.api_key_env, settings.endpoint
                        ),
                    );
                }

                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(settings.timeout_secs))
                    .build()
                    .context("Failed to build analyzer HTTP client")?;

                debug!("Using remote analyzer {} at {}", settings.model, settings.endpoint);
                Ok(Arc::new(RemoteAnalyzer::new(
                    client,
                    &settings.endpoint,
                    &settings.model,
                    api_key,
                    settings.temperature,
                )))
            }
        }
    }
}
