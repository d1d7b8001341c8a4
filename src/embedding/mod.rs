//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashingProvider`]**: deterministic feature hashing over word
//!   unigrams and bigrams. Offline, dependency-free, and the default.
//! - **`OllamaProvider`** / **`OpenAIProvider`**: remote HTTP models with
//!   retry and backoff (see [`remote`]).
//! - **`LocalProvider`**: sentence-transformer models run in-process via
//!   fastembed (feature `local-embeddings-fastembed`).
//!
//! Also provides the vector utilities the index relies on:
//! [`normalize_l2`] and [`dot`].
//!
//! # Provider Selection
//!
//! ```rust
//! # use analyst_harness::config::EmbeddingConfig;
//! # use analyst_harness::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "hash"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "feature-hash");
//! assert_eq!(provider.dims(), 384);
//! ```

#[cfg(feature = "local-embeddings-fastembed")]
mod local;
pub mod remote;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::text;

/// Trait for embedding providers.
///
/// Embedding is synchronous: callers on an async runtime must move the call
/// onto a blocking thread.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embeds a batch of texts, one vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embeds a single query text.
pub fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    provider
        .embed(&[text.to_string()])?
        .into_iter()
        .next()
        .ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
}

// ============ Hashing Provider ============

/// Feature-hashing embedder.
///
/// Each lowercased non-stop-word token contributes `±1.0` to one bucket,
/// each adjacent token pair `±0.5`, with bucket and sign taken from a
/// SHA-256 of the feature. Identical texts always produce identical
/// vectors, so a chunk queried with its own text scores cosine 1.
pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, input: &str) -> Vec<f32> {
        let all: Vec<String> = text::words(input).collect();
        let content: Vec<&String> = all.iter().filter(|w| !text::is_stop_word(w)).collect();
        let tokens: Vec<&String> = if content.is_empty() {
            all.iter().collect()
        } else {
            content
        };

        let mut v = vec![0.0f32; self.dims];
        for token in &tokens {
            self.add_feature(&mut v, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut v, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        normalize_l2(&mut v);
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "feature-hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"hash"` | [`HashingProvider`] |
/// | `"ollama"` | [`remote::OllamaProvider`] |
/// | `"openai"` | [`remote::OpenAIProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings-fastembed`) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashingProvider::new(config.dims_or_default()))),
        "ollama" => Ok(Box::new(remote::OllamaProvider::new(config)?)),
        "openai" => Ok(Box::new(remote::OpenAIProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(local::LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product; `0.0` when lengths differ.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
