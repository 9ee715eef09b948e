use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use gemscout_core::{
    CharacterNgramEmbedder, Chain, ChunkingConfig, CrawlConfig, Crawler, Embedder, EmbeddingOptions,
    EvmRpcLookup, GeminiProvider, HttpFetcher, InMemoryTaskStore, MistralProvider, OpenAiEmbedder,
    OpenAiProvider, Orchestrator, OrchestratorOptions, Pipeline, PipelineConfig, ProviderId,
    ProviderSet, RenderEndpoint, RetryPolicy, TaskStore, DEFAULT_CHUNK_CHARS,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "gemscout", version, about = "Screen a crypto project from its website")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    mistral_api_key: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Ethereum JSON-RPC endpoint for contract lookups.
    #[arg(long, env = "EVM_ETH_RPC_URL")]
    eth_rpc_url: Option<String>,

    /// BSC JSON-RPC endpoint for contract lookups.
    #[arg(long, env = "EVM_BSC_RPC_URL")]
    bsc_rpc_url: Option<String>,

    /// Headless-browser service base URL (answers POST /content).
    #[arg(long, env = "RENDER_ENDPOINT")]
    render_endpoint: Option<String>,

    #[arg(long, env = "RENDER_TOKEN", hide_env_values = true)]
    render_token: Option<String>,

    /// Maximum characters per chunk; overlap is a fifth of it.
    #[arg(long, default_value_t = DEFAULT_CHUNK_CHARS)]
    chunk_size: usize,

    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Pause between two fetches of one crawl.
    #[arg(long, default_value_t = 1000)]
    request_delay_ms: u64,

    /// Fetch budget for one crawl, pages and documents together.
    #[arg(long, default_value_t = 60)]
    max_pages: usize,

    /// Score memecoins with the community-hype strategy as well.
    #[arg(long, default_value_t = false)]
    meme_season: bool,

    /// Skip strict scoring; only crawl and extract.
    #[arg(long, default_value_t = false)]
    no_ai_analysis: bool,

    /// Hash-based embeddings and no remote providers.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full screening job and print the stored record.
    Analyze {
        #[arg(long)]
        url: String,
    },
    /// Crawl only and print what was collected.
    Crawl {
        #[arg(long)]
        url: String,
    },
}

impl Cli {
    fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries.max(1), Duration::from_millis(self.retry_delay_ms))
    }

    fn crawler(&self) -> anyhow::Result<Crawler<HttpFetcher>> {
        let render = self.render_endpoint.clone().map(|base_url| RenderEndpoint {
            base_url,
            token: self.render_token.clone(),
        });
        if render.is_none() {
            info!("no render endpoint configured, pages are fetched without javascript");
        }

        let fetcher = HttpFetcher::new(render, FETCH_TIMEOUT).context("failed to build http fetcher")?;
        Ok(Crawler::new(
            fetcher,
            CrawlConfig {
                request_delay: Duration::from_millis(self.request_delay_ms),
                max_pages: self.max_pages,
            },
        ))
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        match (&self.openai_api_key, self.offline) {
            (Some(key), false) => Ok(Arc::new(
                OpenAiEmbedder::new(key.clone()).context("failed to build embedding client")?,
            )),
            (None, false) => {
                warn!("OPENAI_API_KEY not set, falling back to local hashed embeddings");
                Ok(Arc::new(CharacterNgramEmbedder::default()))
            }
            (_, true) => Ok(Arc::new(CharacterNgramEmbedder::default())),
        }
    }

    fn providers(&self) -> anyhow::Result<ProviderSet> {
        let mut providers = ProviderSet::new();
        if self.offline {
            return Ok(providers);
        }

        match &self.openai_api_key {
            Some(key) => {
                providers = providers.with(ProviderId::OpenAi, Arc::new(OpenAiProvider::new(key.clone())?));
            }
            None => warn!("OPENAI_API_KEY not set, extraction and summaries will degrade"),
        }
        match &self.mistral_api_key {
            Some(key) => {
                providers = providers.with(ProviderId::Mistral, Arc::new(MistralProvider::new(key.clone())?));
            }
            None => warn!("MISTRAL_API_KEY not set, mistral opinions will degrade"),
        }
        match &self.gemini_api_key {
            Some(key) => {
                providers = providers.with(ProviderId::Gemini, Arc::new(GeminiProvider::new(key.clone())?));
            }
            None => warn!("GEMINI_API_KEY not set, gemini opinions will degrade"),
        }
        Ok(providers)
    }

    fn token_lookup(&self) -> anyhow::Result<Option<EvmRpcLookup>> {
        if self.offline {
            return Ok(None);
        }

        let mut lookup = EvmRpcLookup::new(RPC_TIMEOUT).context("failed to build rpc client")?;
        if let Some(url) = &self.eth_rpc_url {
            lookup = lookup.with_endpoint(Chain::Ethereum, url.clone());
        }
        if let Some(url) = &self.bsc_rpc_url {
            lookup = lookup.with_endpoint(Chain::Bsc, url.clone());
        }
        Ok(lookup.has_endpoints().then_some(lookup))
    }

    fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let retry = self.retry();
        let orchestrator = Orchestrator::new(
            self.providers()?,
            self.embedder()?,
            OrchestratorOptions {
                retry,
                ..OrchestratorOptions::default()
            },
        );
        Ok(match self.token_lookup()? {
            Some(lookup) => orchestrator.with_token_lookup(Arc::new(lookup)),
            None => orchestrator,
        })
    }

    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let chunking = ChunkingConfig::with_budget(self.chunk_size);
        chunking.validate().context("invalid --chunk-size")?;
        Ok(PipelineConfig {
            chunking,
            embedding: EmbeddingOptions {
                retry: self.retry(),
                ..EmbeddingOptions::default()
            },
            meme_season: self.meme_season,
            ai_analysis: !self.no_ai_analysis,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        offline = cli.offline,
        "gemscout boot"
    );

    match &cli.command {
        Command::Crawl { url } => {
            let report = cli.crawler()?.crawl(url).await?;
            let documents: Vec<_> = report
                .documents
                .iter()
                .map(|document| json!({ "url": document.source_url, "chars": document.text.chars().count() }))
                .collect();

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "pagesVisited": report.pages_visited,
                    "documents": documents,
                    "socialLinks": report.social_links,
                    "failures": report.failures,
                }))?
            );
        }
        Command::Analyze { url } => {
            let store = Arc::new(InMemoryTaskStore::new());
            let pipeline = Pipeline::new(cli.crawler()?, cli.orchestrator()?, store.clone(), cli.pipeline_config()?);

            let task_id = pipeline.submit(url).await?;
            info!(%task_id, %url, "starting to process the project");
            pipeline.process(url, &task_id).await?;

            let record = store
                .read(&task_id)
                .await
                .with_context(|| format!("task {task_id} vanished from the store"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
