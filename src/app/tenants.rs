use std::sync::Arc;
use tokio::sync::RwLock;

use crate::app::Config;
use crate::models::TenantId;
use crate::store::StoreConnection;

/// Live view of tenant store connections.
///
/// Connections are resolved from the current configuration on every call, so a
/// rotated credential (in the config or in its env var) applies to the next run.
#[derive(Clone)]
pub struct TenantDirectory {
    config: Arc<RwLock<Config>>,
}

impl TenantDirectory {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Resolve the store connection for a tenant, if one is configured
    pub async fn resolve(&self, tenant: &TenantId) -> Option<StoreConnection> {
        let config = self.config.read().await;
        config
            .tenants
            .get(tenant.as_str())
            .and_then(|t| t.connection())
    }

    /// Replace the configuration (e.g. after a reload)
    pub async fn update_config(&self, new_config: Config) {
        let mut config = self.config.write().await;
        *config = new_config;
    }

    /// Ids of all configured tenants
    pub async fn tenant_ids(&self) -> Vec<String> {
        self.config.read().await.tenants.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TenantConfig;

    fn config_with(credential: &str) -> Config {
        let mut config = Config::default();
        config.tenants.insert(
            "acme".to_string(),
            TenantConfig {
                base_url: "https://acme.example.com".to_string(),
                credential: Some(credential.to_string()),
                credential_env: None,
            },
        );
        config
    }

    #[tokio::test]
    async fn test_unknown_tenant_has_no_connection() {
        let directory = TenantDirectory::new(config_with("one"));
        let other = TenantId::new("globex").unwrap();
        assert!(directory.resolve(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_rotation_applies_to_next_resolve() {
        let directory = TenantDirectory::new(config_with("one"));
        let acme = TenantId::new("acme").unwrap();

        let before = directory.resolve(&acme).await.unwrap();
        assert_eq!(before.credential(), Some("one"));

        directory.update_config(config_with("two")).await;
        let after = directory.resolve(&acme).await.unwrap();
        assert_eq!(after.credential(), Some("two"));
        assert_eq!(directory.tenant_ids().await, vec!["acme".to_string()]);
    }
}
