pub mod similarity;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::json;

use crate::app_config::cfg;
use crate::error::AppResult;
use crate::HttpClient;

/// Seam to the embedding service. One vector per input text, in input
/// order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

#[async_trait]
impl<T: EmbeddingBackend + ?Sized> EmbeddingBackend for Arc<T> {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }
}

pub struct OpenAiEmbeddings {
    http_client: HttpClient,
}

impl OpenAiEmbeddings {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let resp = self
            .http_client
            .post(&cfg.api.embeddings_endpoint)
            .bearer_auth(&cfg.api.key)
            .json(&json!({
                "model": &cfg.api.embedding_model,
                "input": texts,
            }))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let data = resp["data"].as_array().context("No data array")?;
        let mut vectors = Vec::with_capacity(data.len());
        for entry in data {
            let embedding: Vec<f32> = serde_json::from_value(entry["embedding"].clone())
                .context("Failed to parse embedding as Vec<f32>")?;
            vectors.push(embedding);
        }

        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "embedding count mismatch: {} texts, {} vectors",
                texts.len(),
                vectors.len()
            )
            .into());
        }

        Ok(vectors)
    }
}

/// Cosine similarity in [-1, 1]. A missing (empty or zero-norm) vector on
/// either side scores 0 instead of failing the comparison.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
