use reqwest::{Client, Method, RequestBuilder, Response};
use std::fmt;
use std::time::Duration;

use crate::constants::{
    AUTH_QUERY_PARAM, CACHE_COLLECTION, CONVERSATIONS_COLLECTION, REPORTS_COLLECTION,
};
use crate::models::AnalysisModule;
use crate::utils::StoreError;

/// Resolved connection to one tenant's remote document store.
///
/// Passed explicitly into every store call; nothing in the store layer reads
/// tenant configuration on its own.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConnection {
    base_url: String,
    credential: Option<String>,
}

impl StoreConnection {
    pub fn new(base_url: &str, credential: Option<String>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credential: credential.filter(|c| !c.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Full URL of a JSON document, without the credential
    pub fn document_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    /// Start a request against a document, attaching the credential as a query parameter
    pub(crate) fn request(&self, client: &Client, method: Method, path: &str) -> RequestBuilder {
        let request = client.request(method, self.document_url(path));
        match &self.credential {
            Some(credential) => request.query(&[(AUTH_QUERY_PARAM, credential)]),
            None => request,
        }
    }
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Path of the cache document for a module
pub fn cache_path(module: AnalysisModule) -> String {
    format!("{}/{}", CACHE_COLLECTION, module)
}

/// Path of the conversation collection for a module
pub fn conversations_path(module: AnalysisModule) -> String {
    format!("{}/{}", CONVERSATIONS_COLLECTION, module)
}

/// Path of a saved report for a module
pub fn report_path(module: AnalysisModule, key: &str) -> String {
    format!("{}/{}/{}", REPORTS_COLLECTION, module, key)
}

/// Build the shared HTTP client used for store calls
pub fn build_http_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Map non-success statuses to `StoreError::Status`, keeping the credential out of the message
pub(crate) fn check_status(response: Response, path: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status {
            status,
            path: format!("/{}.json", path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_urls() {
        let connection = StoreConnection::new("https://acme.example.com/ ", None);
        assert_eq!(
            connection.document_url(&cache_path(AnalysisModule::Observatory)),
            "https://acme.example.com/analysis_cache/observatory.json"
        );
        assert_eq!(
            report_path(AnalysisModule::Commercial, "consolidated"),
            "analysis_results/commercial/consolidated"
        );
        assert_eq!(conversations_path(AnalysisModule::Commercial), "conversations/commercial");
    }

    #[test]
    fn test_debug_redacts_credential() {
        let connection = StoreConnection::new("https://acme.example.com", Some("s3cret".into()));
        let debug = format!("{:?}", connection);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_empty_credential_is_none() {
        let connection = StoreConnection::new("https://acme.example.com", Some(String::new()));
        assert_eq!(connection.credential(), None);
    }
}
