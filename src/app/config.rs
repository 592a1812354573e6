use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{
    ANALYZER_REQUEST_TIMEOUT_SECS, DEFAULT_ANALYSIS_CONCURRENCY, DEFAULT_ANALYZER_API_KEY_ENV,
    DEFAULT_ANALYZER_ENDPOINT, DEFAULT_ANALYZER_MODEL, DEFAULT_TEMPERATURE, ENV_PREFIX,
    HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::store::StoreConnection;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Per-tenant remote store connections, keyed by tenant id
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantConfig>,

    /// Orchestration settings
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Which analyzer backs the runs
    #[serde(default)]
    pub analyzer: AnalyzerSettings,

    /// HTTP client settings for the document store
    #[serde(default)]
    pub http: HttpSettings,
}

/// Connection settings for one tenant's document store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Store root, e.g. https://acme-default-rtdb.firebaseio.com
    pub base_url: String,
    /// Access credential sent as the `auth` query parameter
    #[serde(default)]
    pub credential: Option<String>,
    /// Environment variable holding the credential (takes precedence)
    #[serde(default)]
    pub credential_env: Option<String>,
}

impl TenantConfig {
    /// Resolve the credential, reading the environment at call time
    pub fn credential(&self) -> Option<String> {
        self.credential_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
            .or_else(|| self.credential.clone())
    }

    /// Build the store connection, or `None` when no base URL is set
    pub fn connection(&self) -> Option<StoreConnection> {
        if self.base_url.trim().is_empty() {
            return None;
        }
        Some(StoreConnection::new(&self.base_url, self.credential()))
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Maximum conversations analyzed at the same time
    pub concurrency: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_ANALYSIS_CONCURRENCY,
        }
    }
}

/// Analyzer backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Local rule-based keyword matching
    Keyword,
    /// OpenAI-compatible chat-completions endpoint
    Remote,
}

/// Analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    pub kind: AnalyzerKind,
    /// Base URL of the chat-completions API (remote only)
    pub endpoint: String,
    /// Model identifier (remote only)
    pub model: String,
    /// Environment variable containing the API key (remote only)
    pub api_key_env: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout for a single analysis call
    pub timeout_secs: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            kind: AnalyzerKind::Keyword,
            endpoint: DEFAULT_ANALYZER_ENDPOINT.to_string(),
            model: DEFAULT_ANALYZER_MODEL.to_string(),
            api_key_env: DEFAULT_ANALYZER_API_KEY_ENV.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: ANALYZER_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout against the document store
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn base_figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

fn extract(figment: Figment) -> Result<Config> {
    // Add environment variables (CONVOLENS_ prefix, nested keys split on __)
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    let global_config = config_dir.join("config.toml");
    let local_config = PathBuf::from(".convolens/config.toml");

    let mut figment = base_figment();

    // Add global config if it exists
    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    // Add local config if it exists
    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    extract(figment)
}

/// Load configuration from an explicit file, still honoring env overrides
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    extract(base_figment().merge(Toml::file(path)))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "convolens") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("convolens");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        let mut config = Config::default();
        config.tenants.insert(
            "example".to_string(),
            TenantConfig {
                base_url: "https://example-default-rtdb.firebaseio.com".to_string(),
                credential: None,
                credential_env: Some("CONVOLENS_EXAMPLE_SECRET".to_string()),
            },
        );
        save_config(&config, Some(config_file.clone()))?;
    }

    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.tenants.is_empty());
        assert_eq!(config.analysis.concurrency, 1);
        assert_eq!(config.analyzer.kind, AnalyzerKind::Keyword);
        assert_eq!(config.http.timeout_secs, HTTP_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[tenants.acme]
base_url = "https://acme.example.com/"
credential = "s3cret"

[analyzer]
kind = "remote"
endpoint = "http://localhost:9000/v1"
model = "llama3"
api_key_env = "NONE"
temperature = 0.0
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        let acme = config.tenants.get("acme").unwrap();
        assert_eq!(acme.credential().as_deref(), Some("s3cret"));
        assert_eq!(config.analyzer.kind, AnalyzerKind::Remote);
        assert_eq!(config.analyzer.model, "llama3");

        let connection = acme.connection().unwrap();
        assert_eq!(connection.base_url(), "https://acme.example.com");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_config_from(&temp_dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_credential_env_takes_precedence() {
        std::env::set_var("CONVOLENS_TEST_ROTATED_SECRET", "rotated");
        let tenant = TenantConfig {
            base_url: "https://acme.example.com".to_string(),
            credential: Some("stale".to_string()),
            credential_env: Some("CONVOLENS_TEST_ROTATED_SECRET".to_string()),
        };
        assert_eq!(tenant.credential().as_deref(), Some("rotated"));

        let missing = TenantConfig {
            credential_env: Some("CONVOLENS_TEST_UNSET_SECRET".to_string()),
            ..tenant.clone()
        };
        assert_eq!(missing.credential().as_deref(), Some("stale"));
    }

    #[test]
    fn test_blank_base_url_has_no_connection() {
        let tenant = TenantConfig::default();
        assert!(tenant.connection().is_none());
    }
}
