use crate::config::DEFAULT_MODEL;
use crate::error::{InsightsError, Result};
use crate::llm::types::*;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Answer shown when the model replies without any text.
pub const FALLBACK_ANSWER: &str = "Desculpe, não consegui processar sua solicitação.";

/// Anything that can turn a prompt into an answer.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn ask(&self, prompt: &str, api_key: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    model: String,
    base_url: String,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `prompt` once and returns the model's text answer.
    ///
    /// A transport failure, a non-success status or an undecodable body is a
    /// [`InsightsError::Request`]. A well-formed reply without text yields
    /// [`FALLBACK_ANSWER`].
    pub async fn generate(&self, prompt: &str, api_key: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let payload = GenerateContentRequest::from_prompt(prompt);

        info!("Sending {} character prompt to {}", prompt.len(), self.model);

        let res = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(InsightsError::Request(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;

        match body.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                debug!("Response carried no text part, using fallback answer");
                Ok(FALLBACK_ANSWER.to_string())
            }
        }
    }
}

#[async_trait]
impl InsightProvider for GeminiClient {
    async fn ask(&self, prompt: &str, api_key: &str) -> Result<String> {
        self.generate(prompt, api_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/models/gemini-2.0-flash-exp:generateContent";

    #[tokio::test]
    async fn test_ask_posts_prompt_and_extracts_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(query_param("key", "secret"))
            .and(body_json(json!({ "contents": [{ "parts": [{ "text": "Quanto vendemos?" }] }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "R$ 1.234,00" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new().with_base_url(server.uri());
        let answer = client.ask("Quanto vendemos?", "secret").await.unwrap();

        assert_eq!(answer, "R$ 1.234,00");
    }

    #[tokio::test]
    async fn test_missing_text_uses_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = GeminiClient::new().with_base_url(server.uri());
        let answer = client.ask("?", "k").await.unwrap();

        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_null_candidates_use_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": null })))
            .mount(&server)
            .await;

        let client = GeminiClient::new().with_base_url(server.uri());
        let answer = client.ask("?", "k").await.unwrap();

        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_error_status_is_request_error_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new().with_base_url(server.uri());
        let err = client.ask("?", "bad").await.unwrap_err();

        match err {
            InsightsError::Request(msg) => assert!(msg.contains("403")),
            other => panic!("Expected request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_request_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = GeminiClient::new().with_base_url(server.uri());
        let err = client.ask("?", "k").await.unwrap_err();

        assert!(matches!(err, InsightsError::Request(_)));
    }

    #[tokio::test]
    async fn test_custom_model_in_path() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new()
            .with_base_url(format!("{}/", server.uri()))
            .with_model("gemini-2.5-flash");

        assert_eq!(client.ask("?", "k").await.unwrap(), "ok");
    }
}
