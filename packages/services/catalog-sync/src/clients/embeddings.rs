use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::models::*;

/// Dimension produced by all-MiniLM-L6-v2, the model the catalog was built with.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Text-to-vector contract. Implementations may fail; callers decide the fallback.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// Vector that stands in for a failed embedding.
pub fn zero_vector(dimension: usize) -> Vec<f64> {
    vec![0.0; dimension]
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Generated(Vec<f64>),
    Fallback(Vec<f64>),
}

impl EmbeddingOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, EmbeddingOutcome::Fallback(_))
    }

    pub fn into_vector(self) -> Vec<f64> {
        match self {
            EmbeddingOutcome::Generated(v) | EmbeddingOutcome::Fallback(v) => v,
        }
    }
}

/// Embed `text`, substituting the zero vector on any provider error or on a
/// vector of the wrong dimension. Never fails.
pub async fn embed_or_zero<P>(provider: &P, text: &str) -> EmbeddingOutcome
where
    P: EmbeddingProvider + ?Sized,
{
    let dimension = provider.dimension();
    match provider.embed(text).await {
        Ok(v) if v.len() == dimension => EmbeddingOutcome::Generated(v),
        Ok(v) => {
            tracing::warn!(expected = dimension, actual = v.len(), "Embedding has unexpected dimension; using zero vector");
            EmbeddingOutcome::Fallback(zero_vector(dimension))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Embedding generation failed; using zero vector");
            EmbeddingOutcome::Fallback(zero_vector(dimension))
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingsServiceClient {
    client: Client,
    base_url: String,
    dimension: usize,
}

impl EmbeddingsServiceClient {
    pub fn new(base_url: String, timeout_ms: u64, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingsServiceClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mutation = r#"
            mutation BuildQueryEmbedding($input: QueryEmbeddingInput!) {
                buildQueryEmbedding(input: $input) {
                    vector
                    dimension
                }
            }
        "#;

        let variables = serde_json::json!({
            "input": {
                "weightedTexts": [{ "text": text, "weight": 1.0 }],
                "strategy": "WEIGHTED_SUM",
                "normalize": true
            }
        });

        let body = serde_json::json!({
            "query": mutation,
            "variables": variables
        });

        let response = self.client
            .post(format!("{}/graphql", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Embedding(format!(
                "Embeddings service error: status={} body={}",
                status, error_text
            )));
        }

        let result: Value = response.json().await?;

        if let Some(errors) = result.get("errors") {
            return Err(SyncError::Embedding(format!(
                "Embeddings service GraphQL errors: {}",
                errors
            )));
        }

        let vector = result
            .get("data")
            .and_then(|d| d.get("buildQueryEmbedding"))
            .and_then(|e| e.get("vector"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| SyncError::Embedding("Embeddings response has no vector".to_string()))?;

        let embedding: Vec<f64> = vector.iter().filter_map(|v| v.as_f64()).collect();
        if embedding.len() != vector.len() {
            return Err(SyncError::Embedding("Embeddings response has non-numeric components".to_string()));
        }

        tracing::debug!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }
}
