//! In-process embeddings via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are made.

use anyhow::{anyhow, bail, Result};
use std::sync::Mutex;

use super::{normalize_l2, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    // `TextEmbedding::embed` takes `&mut self`.
    model: Mutex<fastembed::TextEmbedding>,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let (fastembed_model, default_dims) = resolve_model(&model_name)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
        )
        .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;

        tracing::info!(model = %model_name, "local embedding model ready");
        Ok(Self {
            model_name,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size.max(1),
            model: Mutex::new(model),
        })
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut model = self
            .model
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut vectors = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::Provider(format!("Local embedding failed: {}", e)))?;
        for v in vectors.iter_mut() {
            normalize_l2(v);
        }
        Ok(vectors)
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel::*;
    Ok(match name {
        "all-minilm-l6-v2" => (AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (BGESmallENV15, 384),
        "bge-base-en-v1.5" => (BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (NomicEmbedTextV15, 768),
        "multilingual-e5-small" => (MultilingualE5Small, 384),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    })
}
