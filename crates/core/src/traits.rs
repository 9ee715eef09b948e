use crate::error::{CrawlError, ProviderError, StoreError};
use crate::token::{Chain, OnChainToken};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type FieldMap = Map<String, Value>;

/// A text-completion service. Every failure is a single opaque signal.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// HTML of a page, rendered when the fetcher can render.
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CrawlError>;
}

#[async_trait]
pub trait TokenLookup: Send + Sync {
    /// `Ok(None)` when the address holds no token contract on `chain`.
    async fn lookup(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<OnChainToken>, ProviderError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Returns the existing id when `url` was already submitted.
    async fn create(&self, url: &str) -> Result<String, StoreError>;

    /// Merges `fields` into the record; fields not named are left untouched.
    async fn store(&self, id: &str, fields: FieldMap) -> Result<(), StoreError>;

    async fn exists(&self, id: &str) -> bool;

    async fn read(&self, id: &str) -> Option<FieldMap>;
}
