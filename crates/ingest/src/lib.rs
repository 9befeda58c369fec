//! Semantic chunking of extracted documents into embedded, retrievable chunks.

pub mod document;
pub mod embedding;
pub mod error;
pub mod pipeline;

pub use error::ChunkingError;
pub use pipeline::SemanticChunker;
