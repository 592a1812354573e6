use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::traits::Analyzer;
use super::types::{AnalysisModule, AnalysisResult, ConversationRecord};

/// Analyzer backed by an OpenAI-compatible chat-completions endpoint
/// (LiteLLM proxy, OpenAI, vLLM, Ollama's /v1 ...).
pub struct RemoteAnalyzer {
    client: Client,
    endpoint: String,
    model_name: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl RemoteAnalyzer {
    /// Create a new remote analyzer
    pub fn new(
        client: Client,
        endpoint: &str,
        model_name: &str,
        api_key: Option<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            api_key,
            temperature,
        }
    }

    fn system_prompt(module: AnalysisModule) -> &'static str {
        match module {
            AnalysisModule::Observatory => {
                "You analyze customer WhatsApp conversations for a service-quality observatory. \
                 Reply with a single JSON object with keys: category (complaint, support, praise or general), \
                 sentiment (positive, neutral or negative), score (0 to 1, customer satisfaction), \
                 tags (array of short keywords) and summary (one sentence)."
            }
            AnalysisModule::Commercial => {
                "You analyze customer WhatsApp conversations for a sales team. \
                 Reply with a single JSON object with keys: category (purchase_intent, pricing, churn_risk or general), \
                 sentiment (positive, neutral or negative), score (0 to 1, likelihood to buy), \
                 tags (array of short keywords) and summary (one sentence)."
            }
        }
    }

    /// Parse the model's reply, tolerating a fenced ```json block
    fn parse_reply(content: &str) -> Result<AnalysisResult> {
        let trimmed = content.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();

        serde_json::from_str(body).context("Analyzer reply was not a JSON analysis object")
    }
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    async fn analyze(
        &self,
        conversation: &ConversationRecord,
        module: AnalysisModule,
    ) -> Result<AnalysisResult> {
        let contact = conversation.contact_name.as_deref().unwrap_or("unknown");
        let request_body = json!({
            "model": self.model_name,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": Self::system_prompt(module) },
                {
                    "role": "user",
                    "content": format!("Contact: {}\n\n{}", contact, conversation.transcript())
                }
            ],
        });

        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(&request_body);

        // Add authentication header if a key is available
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach analyzer endpoint at {}", self.endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Analyzer endpoint returned {}: {}", status, error_text);
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Analyzer returned no choices")?;

        Self::parse_reply(&content)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn conversation() -> ConversationRecord {
        ConversationRecord::new("c1")
            .with_contact("Luis")
            .with_messages(vec![ConversationMessage::new("client", "Quiero comprar dos")])
    }

    #[tokio::test]
    async fn test_analyze_parses_json_reply() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"category":"purchase_intent","sentiment":"positive","score":0.9,"tags":["buy"]}"#,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let analyzer = RemoteAnalyzer::new(
            Client::new(),
            &mock_server.uri(),
            "gpt-test",
            Some("test-key".to_string()),
            0.2,
        );

        let result = analyzer
            .analyze(&conversation(), AnalysisModule::Commercial)
            .await
            .unwrap();

        assert_eq!(result.category.as_deref(), Some("purchase_intent"));
        assert_eq!(result.score, Some(0.9));
        assert_eq!(analyzer.name(), "gpt-test");
    }

    #[tokio::test]
    async fn test_analyze_surfaces_http_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
            .mount(&mock_server)
            .await;

        let analyzer = RemoteAnalyzer::new(Client::new(), &mock_server.uri(), "gpt-test", None, 0.2);
        let err = analyzer
            .analyze(&conversation(), AnalysisModule::Observatory)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let result =
            RemoteAnalyzer::parse_reply("```json\n{\"category\":\"support\"}\n```").unwrap();
        assert_eq!(result.category.as_deref(), Some("support"));
        assert!(RemoteAnalyzer::parse_reply("not json").is_err());
    }
}
