mod commands;

use anyhow::Result;
use apidesk::agent::DEFAULT_TOP_K;
use apidesk::chunker::DEFAULT_MAX_CHUNK_SIZE;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Credentials and index location shared by the commands that touch the vector index
#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// OpenAI API key, used for embeddings
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: Option<String>,

    /// Name of the index holding the documentation
    #[arg(long, env = "PINECONE_INDEX", default_value = "openai-embeddings")]
    pub index: String,

    /// Data plane host of the index; looked up when not given
    #[arg(long, env = "PINECONE_HOST")]
    pub host: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load a documentation file into the vector index
    Ingest {
        /// Plain text or markdown file to load
        file: PathBuf,

        /// Soft upper bound on the characters in one chunk
        #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
        max_chunk_size: usize,

        #[command(flatten)]
        index: IndexArgs,
    },

    /// Show the documentation snippets closest to a query
    Search {
        query: String,

        /// Number of matches to show
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        #[command(flatten)]
        index: IndexArgs,
    },

    /// List the APIs in the catalog, or show one of them
    Endpoints {
        /// Exact name of the API to show
        #[arg(long)]
        name: Option<String>,

        /// Catalog document to read instead of the built-in catalog
        #[arg(long, env = "APIDESK_CATALOG__PATH")]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest {
            file,
            max_chunk_size,
            index,
        } => commands::ingest::execute(&index, &file, max_chunk_size).await,
        Command::Search {
            query,
            top_k,
            index,
        } => commands::search::execute(&index, &query, top_k).await,
        Command::Endpoints { name, catalog } => {
            commands::endpoints::execute(catalog.as_deref(), name.as_deref())
        }
    }
}
