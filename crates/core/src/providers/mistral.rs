use super::openai::{ChatMessage, ChatRequest, ChatResponse};
use super::{check_status, http_client, non_empty, DEFAULT_TIMEOUT};
use crate::error::ProviderError;
use crate::traits::CompletionProvider;
use async_trait::async_trait;
use reqwest::Client;

pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";
const NAME: &str = "mistral";

/// Mistral speaks the OpenAI chat-completions dialect.
pub struct MistralProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl MistralProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MISTRAL_MODEL.to_string(),
            base_url: MISTRAL_BASE_URL.to_string(),
            client: http_client(DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionProvider for MistralProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await?;
        let parsed: ChatResponse = check_status(NAME, response).await?.json().await?;

        non_empty(
            NAME,
            parsed
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn completion_uses_chat_endpoint_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer mistral-key"))
            .and(body_partial_json(json!({
                "model": "mistral-large-latest",
                "temperature": 0.0,
                "messages": [{ "role": "user", "content": "Describe the team" }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "A doxxed team of four." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MistralProvider::new(" mistral-key ")
            .expect("client builds")
            .with_model("mistral-large-latest")
            .with_base_url(server.uri());

        assert_eq!(provider.name(), "mistral");
        let answer = provider.complete("Describe the team").await.expect("completion");
        assert_eq!(answer, "A doxxed team of four.");
    }

    #[tokio::test]
    async fn server_errors_surface_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = MistralProvider::new("k")
            .expect("client builds")
            .with_base_url(server.uri());

        assert!(matches!(
            provider.complete("hi").await,
            Err(ProviderError::Status { status: 503, .. })
        ));
    }
}
