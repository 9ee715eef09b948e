//! HTTP clients for the completion and embedding services.

mod gemini;
mod mistral;
mod openai;

pub use gemini::GeminiProvider;
pub use mistral::MistralProvider;
pub use openai::{OpenAiEmbedder, OpenAiProvider};

use crate::error::ProviderError;
use reqwest::{Client, Response};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Passes successful responses through and turns the rest into
/// [`ProviderError::Status`] carrying the body.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ProviderError::Status {
        provider: provider.to_string(),
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn non_empty(provider: &str, content: Option<String>) -> Result<String, ProviderError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::EmptyResponse {
            provider: provider.to_string(),
        }),
    }
}
