pub mod endpoints;
pub mod ingest;
pub mod search;

use crate::IndexArgs;
use anyhow::{Context, Result};
use apidesk::embeddings::{Embedder, OpenAiEmbedder, OpenAiEmbeddingConfig};
use apidesk::vector_store::{IndexHandle, IndexSpec, PineconeConfig, PineconeStore, VectorStore};
use cliclack::spinner;
use std::sync::Arc;

/// Everything a command needs to talk to the documentation index
pub struct IndexConnection {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub handle: IndexHandle,
}

/// Build the embedder and store, then find the index, creating it if it does not exist
pub async fn connect(args: &IndexArgs) -> Result<IndexConnection> {
    let openai_api_key = args.openai_api_key.clone().context(
        "API key must be provided via --openai-api-key or OPENAI_API_KEY environment variable",
    )?;
    let pinecone_api_key = args.pinecone_api_key.clone().context(
        "API key must be provided via --pinecone-api-key or PINECONE_API_KEY environment variable",
    )?;

    let embedder = Arc::new(OpenAiEmbedder::new(OpenAiEmbeddingConfig::new(
        openai_api_key,
    ))?);
    let store = Arc::new(PineconeStore::new(PineconeConfig::new(pinecone_api_key))?);

    let handle = match &args.host {
        Some(host) => IndexHandle::new(args.index.clone(), host.clone()),
        None => {
            let spin = spinner();
            spin.start(format!("Waiting for index {}", args.index));
            let spec = IndexSpec::new(args.index.clone(), embedder.dimension());
            match store.ensure_index(&spec).await {
                Ok(handle) => {
                    spin.stop(format!("Index {} is ready", handle.name));
                    handle
                }
                Err(e) => {
                    spin.error(format!("Index {} is unavailable", args.index));
                    return Err(e.into());
                }
            }
        }
    };
    tracing::debug!(index = %handle.name, host = %handle.host, "using index");

    Ok(IndexConnection {
        embedder,
        store,
        handle,
    })
}
