use crate::error::CrawlError;
use crate::traits::PageFetcher;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; gemscout/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// A Browserless-style service answering `POST {base}/content` with the
/// rendered HTML of `{"url": ...}`.
#[derive(Debug, Clone)]
pub struct RenderEndpoint {
    pub base_url: String,
    pub token: Option<String>,
}

/// Fetches pages through the render endpoint when one is configured and
/// falls back to a plain GET.
pub struct HttpFetcher {
    client: Client,
    render: Option<RenderEndpoint>,
}

impl HttpFetcher {
    pub fn new(render: Option<RenderEndpoint>, timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, render })
    }

    async fn fetch_rendered(&self, endpoint: &RenderEndpoint, url: &str) -> Result<String, CrawlError> {
        let target = format!("{}/content", endpoint.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&target);
        if let Some(token) = &endpoint.token {
            request = request.query(&[("token", token)]);
        }

        let response = request
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|error| CrawlError::Render {
                url: url.to_string(),
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CrawlError::Render {
                url: url.to_string(),
                message: format!("status {status}: {message}"),
            });
        }

        Ok(response.text().await?)
    }

    async fn fetch_plain(&self, url: &str) -> Result<reqwest::Response, CrawlError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        if let Some(endpoint) = &self.render {
            match self.fetch_rendered(endpoint, url).await {
                Ok(html) => return Ok(html),
                Err(error) => warn!(%url, %error, "rendered fetch failed, falling back to plain http"),
            }
        }

        debug!(%url, "plain fetch");
        Ok(self.fetch_plain(url).await?.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        Ok(self.fetch_plain(url).await?.bytes().await?.to_vec())
    }
}
