use crate::configuration::Settings;
use anyhow::Result;
use apidesk::{
    agent::Agent,
    catalog::Catalog,
    embeddings::OpenAiEmbedder,
    providers::openai::OpenAiProvider,
    retriever::Retriever,
    tools::ToolRegistry,
    vector_store::{IndexHandle, PineconeStore, VectorStore},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        let catalog = agent.tools().catalog().clone();
        Self {
            agent: Arc::new(agent),
            catalog,
        }
    }

    /// Wire the agent from configuration.
    ///
    /// An index that cannot be reached here leaves retrieval disabled until restart;
    /// the assistant still answers from tools alone.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let catalog = match &settings.catalog.path {
            Some(path) => {
                let catalog = Catalog::load(path)?;
                info!(path = %path.display(), endpoints = catalog.len(), "loaded catalog");
                Arc::new(catalog)
            }
            None => Catalog::builtin(),
        };

        let provider = OpenAiProvider::new(settings.provider_config())?;
        let retriever = build_retriever(settings).await?;

        Ok(Self::new(Agent::new(
            Box::new(provider),
            ToolRegistry::new(catalog),
            retriever,
            settings.agent_config(),
        )))
    }
}

async fn build_retriever(settings: &Settings) -> Result<Retriever> {
    let embedder = Arc::new(OpenAiEmbedder::new(settings.embedding_config())?);
    let store = Arc::new(PineconeStore::new(settings.pinecone_config())?);

    let index = match &settings.vector_store.host {
        Some(host) => IndexHandle::new(settings.vector_store.index.clone(), host.clone()),
        None => match store.ensure_index(&settings.index_spec()).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    index = %settings.vector_store.index,
                    error = %e,
                    "vector index unavailable, answering without retrieved context"
                );
                return Ok(Retriever::disabled());
            }
        },
    };

    info!(index = %index.name, host = %index.host, "retrieval enabled");
    Ok(Retriever::new(embedder, store, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("APIDESK_") {
                env::remove_var(&key);
            }
        }
    }

    fn settings_with_controller(uri: &str) -> Settings {
        clean_env();
        env::set_var("APIDESK_PROVIDER__API_KEY", "test-key");
        env::set_var("APIDESK_VECTOR_STORE__API_KEY", "pc-key");
        env::set_var("APIDESK_VECTOR_STORE__INDEX", "docs");
        env::set_var("APIDESK_VECTOR_STORE__CONTROLLER_HOST", uri);
        let settings = Settings::new().unwrap();
        clean_env();
        settings
    }

    #[tokio::test]
    #[serial]
    async fn test_unreachable_index_disables_retrieval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/docs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let state = AppState::from_settings(&settings_with_controller(&server.uri()))
            .await
            .unwrap();

        assert!(!state.agent.retriever().is_enabled());
        assert_eq!(state.catalog.len(), 3);
    }

    #[tokio::test]
    #[serial]
    async fn test_ready_index_enables_retrieval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "docs",
                "dimension": 1536,
                "metric": "cosine",
                "host": "docs-abc.svc.pinecone.io",
                "status": {"ready": true, "state": "Ready"}
            })))
            .mount(&server)
            .await;

        let state = AppState::from_settings(&settings_with_controller(&server.uri()))
            .await
            .unwrap();

        assert!(state.agent.retriever().is_enabled());
    }

    #[tokio::test]
    #[serial]
    async fn test_configured_host_skips_index_lookup() {
        // nothing is mounted, so any control plane call would fail
        let server = MockServer::start().await;
        clean_env();
        env::set_var("APIDESK_PROVIDER__API_KEY", "test-key");
        env::set_var("APIDESK_VECTOR_STORE__API_KEY", "pc-key");
        env::set_var("APIDESK_VECTOR_STORE__HOST", "docs-abc.svc.pinecone.io");
        env::set_var("APIDESK_VECTOR_STORE__CONTROLLER_HOST", server.uri());
        let settings = Settings::new().unwrap();
        clean_env();

        let state = AppState::from_settings(&settings).await.unwrap();

        assert!(state.agent.retriever().is_enabled());
        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }
}
