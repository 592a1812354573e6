use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::connection::{check_status, conversations_path, report_path, StoreConnection};
use crate::models::{AnalysisModule, ConversationRecord};
use crate::utils::StoreError;

/// The external conversation store the orchestrator loads from and reports to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load every conversation of a module
    async fn load(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Save a report document under a fixed key
    async fn save_report(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        key: &str,
        report: &Value,
    ) -> Result<(), StoreError>;
}

/// Conversation store over the tenant's JSON document store
#[derive(Debug, Clone)]
pub struct HttpConversationStore {
    client: Client,
}

impl HttpConversationStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Decode a collection body: `null`, an array, or an object keyed by id
    fn decode_collection(body: Value) -> Vec<ConversationRecord> {
        let items: Vec<(String, Value)> = match body {
            Value::Null => Vec::new(),
            Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
            Value::Object(map) => map.into_iter().collect(),
            other => {
                warn!("Unexpected conversation collection shape: {}", other);
                Vec::new()
            }
        };

        items
            .into_iter()
            // Sparse arrays come back with null holes
            .filter(|(_, value)| !value.is_null())
            .filter_map(|(key, value)| match serde_json::from_value::<ConversationRecord>(value) {
                Ok(mut record) => {
                    if record.id.is_empty() {
                        record.id = key;
                    }
                    Some(record)
                }
                Err(e) => {
                    warn!("Skipping malformed conversation {}: {}", key, e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ConversationStore for HttpConversationStore {
    async fn load(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let path = conversations_path(module);
        let response = connection
            .request(&self.client, Method::GET, &path)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No conversations stored for {}", module);
            return Ok(Vec::new());
        }

        let body: Value = check_status(response, &path)?.json().await?;
        let conversations = Self::decode_collection(body);
        debug!("Loaded {} conversations for {}", conversations.len(), module);
        Ok(conversations)
    }

    async fn save_report(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        key: &str,
        report: &Value,
    ) -> Result<(), StoreError> {
        let path = report_path(module, key);
        let response = connection
            .request(&self.client, Method::PUT, &path)
            .json(report)
            .send()
            .await?;

        check_status(response, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(server: &MockServer) -> StoreConnection {
        StoreConnection::new(&server.uri(), Some("token".to_string()))
    }

    #[tokio::test]
    async fn test_load_object_fills_ids_from_keys() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/conversations/commercial.json"))
            .and(query_param("auth", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conv-a": { "messages": [{ "sender": "client", "text": "hola" }] },
                "conv-b": { "id": "explicit", "messages": [] },
                "conv-c": "not a conversation"
            })))
            .mount(&mock_server)
            .await;

        let store = HttpConversationStore::new(Client::new());
        let conversations = store
            .load(&connection(&mock_server), AnalysisModule::Commercial)
            .await
            .unwrap();

        let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["conv-a", "explicit"]);
        assert_eq!(conversations[0].message_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_collection_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/conversations/observatory.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Null))
            .mount(&mock_server)
            .await;

        let store = HttpConversationStore::new(Client::new());
        let conversations = store
            .load(&connection(&mock_server), AnalysisModule::Observatory)
            .await
            .unwrap();
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn test_load_propagates_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let store = HttpConversationStore::new(Client::new());
        let err = store
            .load(&connection(&mock_server), AnalysisModule::Observatory)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Status { status, .. } if status.as_u16() == 503));
        assert!(!err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn test_save_report_puts_document() {
        let mock_server = MockServer::start().await;
        let report = json!({ "total_analyzed": 3 });

        Mock::given(method("PUT"))
            .and(path("/analysis_results/observatory/consolidated.json"))
            .and(query_param("auth", "token"))
            .and(body_json(report.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(report.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = HttpConversationStore::new(Client::new());
        store
            .save_report(
                &connection(&mock_server),
                AnalysisModule::Observatory,
                "consolidated",
                &report,
            )
            .await
            .unwrap();
    }
}
