use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{CacheDocument, CacheSnapshot};
use crate::constants::ETAG_REQUEST_HEADER;
use crate::models::AnalysisModule;
use crate::store::{cache_path, check_status, StoreConnection};
use crate::utils::StoreError;

/// Durable storage for per-(tenant, module) cache documents.
///
/// Reads fail soft (an empty cache is a valid starting state); writes fail loudly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the cache document, surfacing transport and decode failures
    async fn try_read(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<CacheSnapshot, StoreError>;

    /// Read the cache document; any failure yields an empty snapshot
    async fn read(&self, connection: &StoreConnection, module: AnalysisModule) -> CacheSnapshot {
        match self.try_read(connection, module).await {
            Ok(snapshot) => {
                debug!("Read {} cache entries for {}", snapshot.document.len(), module);
                snapshot
            }
            Err(e) => {
                warn!("Cache read for {} failed, treating as empty: {}", module, e);
                CacheSnapshot::empty()
            }
        }
    }

    /// Overwrite the whole cache document
    async fn write(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        document: &CacheDocument,
    ) -> Result<(), StoreError>;

    /// Overwrite the document only if it still carries `version`
    async fn write_if_match(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        document: &CacheDocument,
        version: &str,
    ) -> Result<(), StoreError>;

    /// Drop every entry of the module's cache
    async fn clear(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<(), StoreError> {
        self.write(connection, module, &CacheDocument::new()).await
    }
}

/// Read through an optional connection: no connection means an empty cache
pub async fn read_or_empty(
    store: &dyn CacheStore,
    connection: Option<&StoreConnection>,
    module: AnalysisModule,
) -> CacheSnapshot {
    match connection {
        Some(connection) => store.read(connection, module).await,
        None => {
            warn!("No store connection for {} cache; starting from an empty cache", module);
            CacheSnapshot::empty()
        }
    }
}

/// Cache gateway over the tenant's JSON document store
/// (`{base_url}/analysis_cache/{module}.json`)
#[derive(Debug, Clone)]
pub struct HttpCacheGateway {
    client: Client,
}

impl HttpCacheGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<CacheSnapshot, StoreError> {
        let path = cache_path(module);
        let response = connection
            .request(&self.client, Method::GET, &path)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CacheSnapshot::empty());
        }

        let response = check_status(response, &path)?;
        let version = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let document = match response.json::<Value>().await? {
            Value::Null => CacheDocument::new(),
            value => serde_json::from_value(value)?,
        };

        Ok(CacheSnapshot { document, version })
    }

    async fn put(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        document: &CacheDocument,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = cache_path(module);
        let mut request = connection
            .request(&self.client, Method::PUT, &path)
            .json(document);
        if let Some(version) = version {
            request = request.header(IF_MATCH, version);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(StoreError::Conflict);
        }
        check_status(response, &path)?;

        debug!("Wrote {} cache entries for {}", document.len(), module);
        Ok(())
    }
}

#[async_trait]
impl CacheStore for HttpCacheGateway {
    async fn try_read(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<CacheSnapshot, StoreError> {
        self.fetch(connection, module).await
    }

    async fn write(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        document: &CacheDocument,
    ) -> Result<(), StoreError> {
        self.put(connection, module, document, None).await
    }

    async fn write_if_match(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        document: &CacheDocument,
        version: &str,
    ) -> Result<(), StoreError> {
        self.put(connection, module, document, Some(version)).await
    }
}
