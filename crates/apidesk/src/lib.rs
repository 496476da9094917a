pub mod agent;
pub mod catalog;
pub mod chunker;
pub mod embeddings;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod retriever;
pub mod tools;
pub mod vector_store;
