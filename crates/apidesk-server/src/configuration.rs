use crate::error::{to_env_var, ConfigError};
use apidesk::agent::{AgentConfig, DEFAULT_MAX_STEPS, DEFAULT_TOP_K};
use apidesk::embeddings::{
    OpenAiEmbeddingConfig, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
};
use apidesk::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use apidesk::vector_store::pinecone::PINECONE_CONTROLLER_HOST;
use apidesk::vector_store::{IndexSpec, PineconeConfig};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                env_var: to_env_var("server.host"),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Deserialize)]
pub struct VectorStoreSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_index")]
    pub index: String,
    /// Data plane host of the index. When unset it is looked up, and the index created
    /// if needed, at startup.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_controller_host")]
    pub controller_host: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogSettings {
    /// Declarative catalog document to serve instead of the built-in one
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub agent: AgentSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("embedding.model", default_embedding_model())?
            .set_default("embedding.dimension", default_embedding_dimension() as u64)?
            .set_default("vector_store.index", default_index())?
            .set_default("vector_store.controller_host", default_controller_host())?
            .set_default("vector_store.cloud", default_cloud())?
            .set_default("vector_store.region", default_region())?
            .set_default("retrieval.top_k", default_top_k() as u64)?
            .set_default("agent.max_steps", default_max_steps() as u64)?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("APIDESK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    /// Credentials have no usable default, so their absence is reported by name
    fn validate(&self) -> Result<(), ConfigError> {
        for (path, value) in [
            ("provider.api_key", &self.provider.api_key),
            ("vector_store.api_key", &self.vector_store.api_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(path),
                });
            }
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("embedding.dimension"),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn provider_config(&self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.provider.host.clone(),
            api_key: self.provider.api_key.clone(),
            model: self.provider.model.clone(),
            temperature: self.provider.temperature,
            max_tokens: self.provider.max_tokens,
        }
    }

    /// Embeddings are served by the same host, with the same credential, as the model
    pub fn embedding_config(&self) -> OpenAiEmbeddingConfig {
        OpenAiEmbeddingConfig {
            host: self.provider.host.clone(),
            api_key: self.provider.api_key.clone(),
            model: self.embedding.model.clone(),
            dimension: self.embedding.dimension,
        }
    }

    pub fn pinecone_config(&self) -> PineconeConfig {
        PineconeConfig {
            controller_host: self.vector_store.controller_host.clone(),
            ..PineconeConfig::new(self.vector_store.api_key.clone())
        }
    }

    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            cloud: self.vector_store.cloud.clone(),
            region: self.vector_store.region.clone(),
            ..IndexSpec::new(self.vector_store.index.clone(), self.embedding.dimension)
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_steps: self.agent.max_steps,
            top_k: self.retrieval.top_k,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_index() -> String {
    "openai-embeddings".to_string()
}

fn default_controller_host() -> String {
    PINECONE_CONTROLLER_HOST.to_string()
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}
