use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Embedder, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL};
use crate::errors::{RetrievalError, RetrievalResult};
use crate::providers::configs::OPENAI_HOST;

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
}

impl OpenAiEmbeddingConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbeddingConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbeddingConfig) -> RetrievalResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.config.host.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Upstream(format!(
                "embedding request failed with {}: {}",
                status, body
            )));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("malformed embedding response: {}", e)))?;

        let embedding = payload
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Decode("embedding response had no data".to_string()))?;

        if embedding.len() != self.config.dimension {
            return Err(RetrievalError::Decode(format!(
                "expected a {}-dimensional embedding, got {}",
                self.config.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(response: ResponseTemplate, dimension: usize) -> (MockServer, OpenAiEmbedder) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test_key"))
            .and(body_json(json!({
                "model": "text-embedding-3-small",
                "input": "How do I enrich a profile?"
            })))
            .respond_with(response)
            .mount(&server)
            .await;

        let config = OpenAiEmbeddingConfig {
            host: server.uri(),
            dimension,
            ..OpenAiEmbeddingConfig::new("test_key")
        };
        let embedder = OpenAiEmbedder::new(config).unwrap();
        (server, embedder)
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let (_server, embedder) = setup(
            ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small"
            })),
            3,
        )
        .await;

        let vector = embedder.embed("How do I enrich a profile?").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(embedder.dimension(), 3);
    }

    #[tokio::test]
    async fn test_embed_dimension_mismatch() {
        let (_server, embedder) = setup(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"embedding": [0.1, 0.2]}]})),
            3,
        )
        .await;

        let result = embedder.embed("How do I enrich a profile?").await;
        assert!(matches!(result, Err(RetrievalError::Decode(_))));
    }

    #[tokio::test]
    async fn test_embed_upstream_failure() {
        let (_server, embedder) = setup(
            ResponseTemplate::new(500).set_body_string("internal error"),
            3,
        )
        .await;

        match embedder.embed("How do I enrich a profile?").await {
            Err(RetrievalError::Upstream(msg)) => assert!(msg.contains("500")),
            other => panic!("Expected upstream error, got {:?}", other),
        }
    }
}
