pub mod chunking;
pub mod crawler;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod extractor;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod selector;
pub mod store;
pub mod token;
pub mod traits;

pub use chunking::{chunk_documents, normalize_whitespace, split_text, ChunkingConfig, DEFAULT_CHUNK_CHARS};
pub use crawler::{CrawlConfig, Crawler};
pub use embeddings::{
    cosine_similarity, embed_corpus, CharacterNgramEmbedder, Embedder, EmbeddingOptions,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ChunkingError, CrawlError, PipelineError, ProviderError, StoreError};
pub use extraction::{
    Extraction, Field, IndustrySwot, ProjectCategory, ScoreResult, TeamMember, TeamProfile,
    TokenIdentity, Tokenomics,
};
pub use fetch::{HttpFetcher, RenderEndpoint};
pub use models::{CrawlReport, Document, EmbeddedCorpus, FetchFailure, Platform, SocialLinks, TextChunk};
pub use orchestrator::{
    ExtractionReport, Orchestrator, OrchestratorOptions, ProviderId, ProviderSet, ScoringReport,
    ScoringStrategy,
};
pub use pipeline::{JobCounter, JobGuard, Pipeline, PipelineConfig, TaskRecord};
pub use providers::{GeminiProvider, MistralProvider, OpenAiEmbedder, OpenAiProvider};
pub use retry::RetryPolicy;
pub use selector::{ContextSelector, CONTEXT_DELIMITER, NO_CONTEXT_FALLBACK};
pub use store::InMemoryTaskStore;
pub use token::{Chain, EvmRpcLookup, OnChainToken, TokenInfo, TokenSource};
pub use traits::{CompletionProvider, FieldMap, PageFetcher, TaskStore, TokenLookup};
