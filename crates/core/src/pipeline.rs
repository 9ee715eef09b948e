//! One screening job: crawl, chunk, embed, ask, score, store.

use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::crawler::Crawler;
use crate::embeddings::{embed_corpus, EmbeddingOptions};
use crate::error::{PipelineError, Result};
use crate::models::{CrawlReport, FetchFailure, Platform};
use crate::orchestrator::{Orchestrator, ScoringStrategy};
use crate::traits::{FieldMap, PageFetcher, TaskStore};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Fields written to the task store for one job.
pub type TaskRecord = FieldMap;

/// Number of jobs currently in flight.
#[derive(Debug, Clone, Default)]
pub struct JobCounter(Arc<AtomicUsize>);

impl JobCounter {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> JobGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        JobGuard(self.0.clone())
    }
}

/// Decrements the counter when the job ends, however it ends.
#[derive(Debug)]
pub struct JobGuard(Arc<AtomicUsize>);

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingOptions,
    pub meme_season: bool,
    pub ai_analysis: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingOptions::default(),
            meme_season: false,
            ai_analysis: true,
        }
    }
}

pub struct Pipeline<F>
where
    F: PageFetcher,
{
    crawler: Crawler<F>,
    orchestrator: Orchestrator,
    store: Arc<dyn TaskStore>,
    jobs: JobCounter,
    config: PipelineConfig,
}

impl<F> Pipeline<F>
where
    F: PageFetcher + 'static,
{
    pub fn new(crawler: Crawler<F>, orchestrator: Orchestrator, store: Arc<dyn TaskStore>, config: PipelineConfig) -> Self {
        Self {
            crawler,
            orchestrator,
            store,
            jobs: JobCounter::default(),
            config,
        }
    }

    pub fn jobs(&self) -> &JobCounter {
        &self.jobs
    }

    /// Registers `url` with the task store and returns its task id.
    pub async fn submit(&self, url: &str) -> Result<String> {
        validate_url(url)?;
        Ok(self.store.create(url.trim()).await?)
    }

    /// Runs the whole job and writes the record to the store once.
    /// Collaborator failures degrade fields; only structural problems
    /// are returned as errors.
    #[instrument(skip(self))]
    pub async fn process(&self, url: &str, task_id: &str) -> Result<TaskRecord> {
        let seed = validate_url(url)?;
        if task_id.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("task id is empty".to_string()));
        }
        let _job = self.jobs.start();

        info!(%seed, "crawl started");
        let crawl = match self.crawler.crawl(seed.as_str()).await {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, "crawl failed, continuing without documents");
                CrawlReport {
                    failures: vec![FetchFailure {
                        url: seed.to_string(),
                        reason: error.to_string(),
                    }],
                    ..CrawlReport::default()
                }
            }
        };
        info!(
            documents = crawl.documents.len(),
            pages = crawl.pages_visited,
            failures = crawl.failures.len(),
            "crawl finished"
        );

        let chunks = chunk_documents(&crawl.documents, self.config.chunking)?;
        let corpus = embed_corpus(self.orchestrator.embedder(), chunks, self.config.embedding).await;
        info!(chunks = corpus.len(), unindexed = corpus.unindexed, "documentation chunked and embedded");

        let extraction = self.orchestrator.extract(&corpus).await;

        let mut record = TaskRecord::new();
        let analyzed = self.config.ai_analysis;
        record.insert("iteration".into(), json!(if analyzed { 1 } else { 0 }));
        record.insert("analyzed".into(), json!(analyzed));
        for platform in Platform::ALL {
            record.insert(platform.record_key().into(), json!(crawl.social_links.get(platform)));
        }
        record.extend(extraction.record_fields());

        for strategy in ScoringStrategy::for_job(extraction.is_memecoin(), self.config.meme_season, analyzed) {
            info!(strategy = strategy.label(), "scoring project");
            record.extend(self.orchestrator.score(&corpus, strategy).await.record_fields());
        }

        record.insert("pagesCrawled".into(), json!(crawl.pages_visited));
        record.insert("crawlFailures".into(), json!(crawl.failures));
        record.insert("chunkCount".into(), json!(corpus.len()));
        record.insert("unindexedChunks".into(), json!(corpus.unindexed));
        record.insert("processedAt".into(), json!(Utc::now().to_rfc3339()));

        self.store.store(task_id, record.clone()).await?;
        info!(fields = record.len(), "results saved");
        Ok(record)
    }

    /// Runs [`Pipeline::process`] in the background. Errors are logged.
    pub fn spawn(self: &Arc<Self>, url: String, task_id: String) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = pipeline.process(&url, &task_id).await {
                error!(%task_id, %error, "processing job failed");
            }
        })
    }
}

fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidRequest("url is empty".to_string()));
    }
    let parsed = Url::parse(trimmed)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::InvalidRequest(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}
