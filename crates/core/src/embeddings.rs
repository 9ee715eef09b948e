use crate::error::ProviderError;
use crate::models::{EmbeddedCorpus, TextChunk};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use tracing::{info, warn};

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Batch embedding service. A batch either fully succeeds or fails.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

#[derive(Debug, Clone, Copy)]
pub struct EmbeddingOptions {
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            batch_size: 16,
            retry: RetryPolicy::default(),
        }
    }
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|input| self.embed(input)).collect())
    }
}

/// Embeds `chunks` batch by batch. A batch that still fails after the retry
/// budget is left out of the corpus entirely.
pub async fn embed_corpus(
    embedder: &dyn Embedder,
    chunks: Vec<TextChunk>,
    options: EmbeddingOptions,
) -> EmbeddedCorpus {
    let mut corpus = EmbeddedCorpus::default();
    let batch_size = options.batch_size.max(1);

    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        let inputs: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let result = options
            .retry
            .run("embedding batch", |_| embed_checked(embedder, &inputs))
            .await;

        match result {
            Ok(vectors) => {
                for (chunk, vector) in batch.iter().cloned().zip(vectors) {
                    corpus.push(chunk, vector);
                }
            }
            Err(exhausted) => {
                warn!(
                    batch_index,
                    chunks = batch.len(),
                    attempts = exhausted.attempts,
                    "embedding batch dropped"
                );
                corpus.unindexed += batch.len();
            }
        }
    }

    info!(
        indexed = corpus.len(),
        unindexed = corpus.unindexed,
        "corpus embedded"
    );
    corpus
}

/// Embeds a single query prompt through the same retry path as the corpus.
pub async fn embed_query(embedder: &dyn Embedder, text: &str, retry: RetryPolicy) -> Option<Vec<f32>> {
    let inputs = vec![text.to_string()];
    retry
        .run("query embedding", |_| embed_checked(embedder, &inputs))
        .await
        .ok()
        .and_then(|mut vectors| vectors.pop())
}

async fn embed_checked(
    embedder: &dyn Embedder,
    inputs: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let vectors = embedder.embed_batch(inputs).await?;
    if vectors.len() != inputs.len() {
        return Err(ProviderError::Malformed {
            provider: "embedder".to_string(),
            details: format!("{} vectors for {} inputs", vectors.len(), inputs.len()),
        });
    }
    let expected = embedder.dimensions();
    if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
        return Err(ProviderError::Malformed {
            provider: "embedder".to_string(),
            details: format!("vector of length {} where {expected} was expected", vector.len()),
        });
    }
    Ok(vectors)
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(index: usize) -> TextChunk {
        TextChunk {
            text: format!("chunk number {index}"),
            source_url: "https://project.io".to_string(),
            index,
        }
    }

    /// Fails every call whose batch contains the poisoned chunk text.
    struct PoisonedEmbedder {
        poisoned: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for PoisonedEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if inputs.iter().any(|input| input == &self.poisoned) {
                return Err(ProviderError::EmptyResponse {
                    provider: "fake".to_string(),
                });
            }
            Ok(inputs.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Decentralized lending protocol");
        let second = embedder.embed("Decentralized lending protocol");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn cosine_of_identical_and_orthogonal_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn failed_batches_are_excluded_not_zero_filled() {
        let embedder = PoisonedEmbedder {
            poisoned: "chunk number 2".to_string(),
            calls: AtomicUsize::new(0),
        };
        let chunks = (0..5).map(chunk).collect();
        let options = EmbeddingOptions {
            batch_size: 2,
            retry: RetryPolicy::immediate(2),
        };

        let corpus = embed_corpus(&embedder, chunks, options).await;

        let indices: Vec<usize> = corpus.chunks.iter().map(|chunk| chunk.index).collect();
        assert_eq!(indices, vec![0, 1, 4]);
        assert_eq!(corpus.embeddings.len(), corpus.chunks.len());
        assert_eq!(corpus.unindexed, 2);
        // three batches, the poisoned one tried twice
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_corpus() {
        let corpus = embed_corpus(
            &CharacterNgramEmbedder::default(),
            Vec::new(),
            EmbeddingOptions::default(),
        )
        .await;
        assert!(corpus.is_empty());
        assert_eq!(corpus.unindexed, 0);
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn vectors_of_the_wrong_length_are_rejected() {
        let corpus = embed_corpus(
            &ShortEmbedder,
            (0..3).map(chunk).collect(),
            EmbeddingOptions {
                batch_size: 2,
                retry: RetryPolicy::immediate(1),
            },
        )
        .await;

        assert!(corpus.is_empty());
        assert_eq!(corpus.unindexed, 3);
        assert_eq!(embed_query(&ShortEmbedder, "team", RetryPolicy::immediate(1)).await, None);
    }
}
