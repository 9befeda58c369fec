pub mod cache;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod resolver;
pub mod traits;

use std::sync::Arc;

use semchunk_core::config::EmbeddingConfig;
use semchunk_core::ConfigError;

pub use cache::EmbeddingCache;
pub use gemini::GeminiEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use resolver::EmbeddingResolver;
pub use traits::{Embedder, EmbeddingError};

/// Build the embedding backend named by `config.provider`.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    let api_key = || {
        config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing(format!("API key for {} embeddings", config.provider)))
    };
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiEmbedder::new(
            api_key()?,
            config.model.clone(),
            config.base_url.clone(),
            config.dimensions,
        )),
        "openai" => Arc::new(OpenAiEmbedder::new(
            api_key()?,
            config.model.clone(),
            config.base_url.clone(),
            config.dimensions,
        )),
        "ollama" => Arc::new(OllamaEmbedder::new(
            config.base_url.clone(),
            config.model.clone(),
            config.dimensions,
        )),
        other => {
            return Err(ConfigError::Unknown {
                kind: "embedding provider",
                value: other.to_string(),
            })
        }
    };
    Ok(embedder)
}
