//! Document chunking engine: the full path from raw text to stamped chunks.
//!
//! ```text
//! text ─▶ structural split ─▶ sentences ─▶ resolve embeddings (one call)
//!      ─▶ header chunk | strategy sub-chunks ─▶ merge/index/stamp ─▶ chunks
//! ```

use std::sync::Arc;
use std::time::Instant;

use semchunk_core::config::ChunkingConfig;
use semchunk_core::{Chunk, Config, DocumentMeta, ParentType, Section};
use tracing::{debug, info};

use crate::document::chunker::{
    measure, split_sections, weighted_mean, ChunkAssembler, ChunkingStrategy, SectionChunks,
    Sentence, SentenceSegmenter, SubChunk,
};
use crate::embedding::{Embedder, EmbeddingCache, EmbeddingResolver};
use crate::error::ChunkingError;

/// Chunks documents with a fixed configuration, embedder and cache.
pub struct SemanticChunker {
    config: ChunkingConfig,
    segmenter: SentenceSegmenter,
    resolver: EmbeddingResolver,
    strategy: ChunkingStrategy,
    assembler: ChunkAssembler,
}

impl SemanticChunker {
    pub fn new(
        config: ChunkingConfig,
        segmenter: SentenceSegmenter,
        resolver: EmbeddingResolver,
    ) -> Result<Self, ChunkingError> {
        config.validate()?;
        Ok(Self {
            strategy: config.strategy.into(),
            assembler: ChunkAssembler::from_config(&config),
            config,
            segmenter,
            resolver,
        })
    }

    /// Wire the engine from a loaded [`Config`], opening the on-disk cache.
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self, ChunkingError> {
        config.embedding.validate()?;
        let segmenter = SentenceSegmenter::from_config(&config.chunking)?;
        let cache = EmbeddingCache::open(&config.cache.directory, config.cache.memory_entries)?;
        let resolver = EmbeddingResolver::new(
            embedder,
            Arc::new(cache),
            config.embedding.batch_size,
            config.embedding.concurrency,
        );
        Self::new(config.chunking.clone(), segmenter, resolver)
    }

    pub fn cache(&self) -> &EmbeddingCache {
        self.resolver.cache()
    }

    /// Chunk one document. Any error aborts the whole document; no partial
    /// chunk list is ever returned.
    pub async fn chunk_document(
        &self,
        text: &str,
        meta: &DocumentMeta,
    ) -> Result<Vec<Chunk>, ChunkingError> {
        validate_meta(meta)?;
        let started = Instant::now();

        let sections = split_sections(text, &self.config);
        let segmented = sections
            .into_iter()
            .map(|section| Ok((self.segmenter.split(&section.text)?, section)))
            .collect::<Result<Vec<(Vec<Sentence>, Section)>, ChunkingError>>()?;

        let texts: Vec<&str> = segmented
            .iter()
            .flat_map(|(sentences, _)| sentences.iter().map(|s| s.text.as_str()))
            .collect();
        let sentence_count = texts.len();
        let mut vectors = self.resolver.resolve(&texts).await?.into_iter();
        drop(texts);

        let mut per_section = Vec::with_capacity(segmented.len());
        for (sentences, section) in segmented {
            let section_vectors: Vec<_> = vectors.by_ref().take(sentences.len()).collect();
            if sentences.is_empty() {
                continue;
            }
            per_section.push(self.chunk_section(section, &sentences, &section_vectors)?);
        }

        let chunks = self.assembler.assemble(per_section, meta)?;
        info!(
            doc = %meta.doc_name,
            chunks = chunks.len(),
            sentences = sentence_count,
            dims = self.resolver.dimensions(),
            cache_hit_rate = self.resolver.cache().hit_rate(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chunked document"
        );
        Ok(chunks)
    }

    fn chunk_section(
        &self,
        section: Section,
        sentences: &[Sentence],
        vectors: &[Vec<f32>],
    ) -> Result<SectionChunks, ChunkingError> {
        let unit = self.config.size_unit;
        let sizes: Vec<usize> = sentences.iter().map(|s| s.size(unit)).collect();
        let size = measure(&section.text, unit);

        let (parent_type, sub_chunks) = if size <= self.config.max_chunk_size {
            let weights: Vec<f32> = sizes.iter().map(|&s| s as f32).collect();
            let vector = weighted_mean(vectors, &weights)?.unwrap_or_default();
            let whole = SubChunk {
                text: section.text,
                vector,
            };
            (ParentType::HeaderChunk, vec![whole])
        } else {
            let subs = self.strategy.split(sentences, &sizes, vectors, &self.config)?;
            debug!(
                section = section.order_index,
                size,
                sub_chunks = subs.len(),
                strategy = ?self.strategy,
                "split oversized section"
            );
            (ParentType::SemanticSubchunk, subs)
        };

        Ok(SectionChunks {
            section_index: section.order_index,
            header_path: section.header_path,
            parent_type,
            sub_chunks,
        })
    }
}

fn validate_meta(meta: &DocumentMeta) -> Result<(), ChunkingError> {
    if meta.doc_name.trim().is_empty() {
        return Err(ChunkingError::InvalidDocument("doc_name must not be empty".into()));
    }
    if meta.doc_hash.trim().is_empty() {
        return Err(ChunkingError::InvalidDocument("doc_hash must not be empty".into()));
    }
    Ok(())
}
