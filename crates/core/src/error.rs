use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("render endpoint failed for {url}: {message}")]
    Render { url: String, message: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("pdf parse error: {0}")]
    Pdf(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("malformed response from {provider}: {details}")]
    Malformed { provider: String, details: String },

    #[error("provider misconfigured: {0}")]
    Configuration(String),
}

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task store backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
