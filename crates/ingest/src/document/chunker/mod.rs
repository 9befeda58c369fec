//! Semantic chunking engine.
//!
//! Documents are split structurally into header sections, sections into
//! sentences, and oversized sections are grown back into sub-chunks guided by
//! sentence embeddings. Chunk vectors are pooled from sentence vectors, so no
//! merged text is ever re-embedded.

mod assembler;
mod helpers;
mod pooling;
mod sentences;
mod strategies;
mod structure;
mod types;

pub use assembler::{ChunkAssembler, SectionChunks};
pub use pooling::{cosine, weighted_mean};
pub use sentences::{SentenceSegmenter, Sentences, ThaiDictionary};
pub use strategies::ChunkingStrategy;
pub use structure::split_sections;
pub use types::{measure, Sentence, SubChunk};

#[cfg(test)]
mod tests;
