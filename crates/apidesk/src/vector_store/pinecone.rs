use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{IndexHandle, IndexSpec, SimilarityMetric, VectorMatch, VectorRecord, VectorStore};
use crate::errors::{RetrievalError, RetrievalResult};

pub const PINECONE_CONTROLLER_HOST: &str = "https://api.pinecone.io";
const PINECONE_API_VERSION: &str = "2024-07";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub controller_host: String,
    /// How long to wait between readiness checks of a new index
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl PineconeConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            controller_host: PINECONE_CONTROLLER_HOST.to_string(),
            poll_interval: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: SimilarityMetric,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Debug, Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

/// Vector store backed by a serverless Pinecone index
pub struct PineconeStore {
    client: Client,
    config: PineconeConfig,
}

impl PineconeStore {
    pub fn new(config: PineconeConfig) -> RetrievalResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, config })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    fn controller_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.controller_host.trim_end_matches('/'),
            path
        )
    }

    fn data_url(index: &IndexHandle, path: &str) -> String {
        let host = index.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}{}", host, path)
        } else {
            format!("https://{}{}", host, path)
        }
    }

    async fn describe_index(&self, name: &str) -> RetrievalResult<Option<IndexDescription>> {
        let url = self.controller_url(&format!("/indexes/{}", name));
        let response = self.authorized(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| RetrievalError::Decode(format!("malformed index description: {}", e))),
            status => Err(upstream(status, response).await),
        }
    }

    async fn create_index(&self, spec: &IndexSpec) -> RetrievalResult<()> {
        let url = self.controller_url("/indexes");
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };

        let response = self
            .authorized(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            // someone else created it between our describe and create
            StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(upstream(status, response).await),
        }
    }

    async fn ensure_ready(&self, spec: &IndexSpec) -> RetrievalResult<IndexHandle> {
        let existing = self.describe_index(&spec.name).await?;
        if existing.is_none() {
            info!(index = %spec.name, dimension = spec.dimension, "creating index");
            self.create_index(spec).await?;
        }

        let deadline = Instant::now() + self.config.ready_timeout;
        let mut description = existing;
        loop {
            if let Some(current) = &description {
                if let Some(dimension) = current.dimension {
                    if dimension != spec.dimension {
                        return Err(RetrievalError::IndexUnavailable(format!(
                            "index {} has dimension {}, expected {}",
                            spec.name, dimension, spec.dimension
                        )));
                    }
                }
                if current.status.ready && !current.host.is_empty() {
                    return Ok(IndexHandle::new(spec.name.clone(), current.host.clone()));
                }
                debug!(
                    index = %spec.name,
                    state = current.status.state.as_deref().unwrap_or("unknown"),
                    "waiting for index"
                );
            }

            if Instant::now() >= deadline {
                return Err(RetrievalError::IndexUnavailable(format!(
                    "index {} was not ready after {:?}",
                    spec.name, self.config.ready_timeout
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
            description = self.describe_index(&spec.name).await?;
        }
    }
}

async fn upstream(status: StatusCode, response: reqwest::Response) -> RetrievalError {
    let body = response.text().await.unwrap_or_default();
    RetrievalError::Upstream(format!("pinecone returned {}: {}", status, body))
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn ensure_index(&self, spec: &IndexSpec) -> RetrievalResult<IndexHandle> {
        self.ensure_ready(spec).await.map_err(|e| match e {
            RetrievalError::IndexUnavailable(_) => e,
            other => RetrievalError::IndexUnavailable(other.to_string()),
        })
    }

    async fn upsert_batch(
        &self,
        index: &IndexHandle,
        records: &[VectorRecord],
    ) -> RetrievalResult<usize> {
        let url = Self::data_url(index, "/vectors/upsert");
        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "vectors": records }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream(status, response).await);
        }

        let payload: UpsertResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("malformed upsert response: {}", e)))?;
        Ok(payload.upserted_count)
    }

    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> RetrievalResult<Vec<VectorMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let url = Self::data_url(index, "/query");
        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream(status, response).await);
        }

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("malformed query response: {}", e)))?;

        let mut matches = payload.matches;
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> PineconeStore {
        let config = PineconeConfig {
            controller_host: server.uri(),
            poll_interval: Duration::from_millis(10),
            ready_timeout: Duration::from_millis(200),
            ..PineconeConfig::new("pc_key")
        };
        PineconeStore::new(config).unwrap()
    }

    fn description(host: &str, ready: bool) -> serde_json::Value {
        json!({
            "name": "openai-embeddings",
            "dimension": 1536,
            "metric": "cosine",
            "host": host,
            "status": {"ready": ready, "state": if ready { "Ready" } else { "Initializing" }}
        })
    }

    #[tokio::test]
    async fn test_ensure_index_existing_and_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .and(header("Api-Key", "pc_key"))
            .and(header("X-Pinecone-API-Version", PINECONE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(description("idx.example.io", true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let handle = store_for(&server)
            .ensure_index(&IndexSpec::new("openai-embeddings", 1536))
            .await
            .unwrap();
        assert_eq!(handle, IndexHandle::new("openai-embeddings", "idx.example.io"));
    }

    #[tokio::test]
    async fn test_ensure_index_creates_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(description("idx.example.io", true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_json(json!({
                "name": "openai-embeddings",
                "dimension": 1536,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let handle = store_for(&server)
            .ensure_index(&IndexSpec::new("openai-embeddings", 1536))
            .await
            .unwrap();
        assert_eq!(handle.host, "idx.example.io");
    }

    #[tokio::test]
    async fn test_ensure_index_tolerates_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(description("idx.example.io", true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .ensure_index(&IndexSpec::new("openai-embeddings", 1536))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_index_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(description("", false)))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .ensure_index(&IndexSpec::new("openai-embeddings", 1536))
            .await;
        assert!(matches!(result, Err(RetrievalError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_ensure_index_maps_upstream_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/openai-embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .ensure_index(&IndexSpec::new("openai-embeddings", 1536))
            .await;
        match result {
            Err(RetrievalError::IndexUnavailable(msg)) => assert!(msg.contains("401")),
            other => panic!("Expected IndexUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upsert_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc_key"))
            .and(body_json(json!({
                "vectors": [{"id": "chunk-0", "values": [0.5, 0.5], "metadata": {"text": "hello"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let handle = IndexHandle::new("openai-embeddings", server.uri());
        let count = store
            .upsert_batch(
                &handle,
                &[VectorRecord::text_chunk("chunk-0", vec![0.5, 0.5], "hello")],
            )
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_query_sorts_and_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_json(json!({"vector": [1.0, 0.0], "topK": 2, "includeMetadata": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "chunk-1", "score": 0.4, "metadata": {"text": "low"}},
                    {"id": "chunk-2", "score": 0.9, "metadata": {"text": "high"}},
                    {"id": "chunk-3", "score": 0.6}
                ],
                "namespace": ""
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let handle = IndexHandle::new("openai-embeddings", server.uri());
        let matches = store.query(&handle, &[1.0, 0.0], 2).await.unwrap();

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk-2", "chunk-3"]);
    }

    #[tokio::test]
    async fn test_query_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let handle = IndexHandle::new("openai-embeddings", server.uri());
        let result = store.query(&handle, &[1.0, 0.0], 2).await;
        assert!(matches!(result, Err(RetrievalError::Upstream(_))));
    }

    #[test]
    fn test_data_url_adds_scheme() {
        let bare = IndexHandle::new("docs", "docs-abc.svc.pinecone.io");
        assert_eq!(
            PineconeStore::data_url(&bare, "/query"),
            "https://docs-abc.svc.pinecone.io/query"
        );
        let local = IndexHandle::new("docs", "http://127.0.0.1:5080/");
        assert_eq!(
            PineconeStore::data_url(&local, "/query"),
            "http://127.0.0.1:5080/query"
        );
    }
}
