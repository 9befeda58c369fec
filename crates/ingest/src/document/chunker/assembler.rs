//! Chunk assembly: short-chunk merging, indexing and metadata stamping.

use semchunk_core::config::{ChunkingConfig, SizeUnit};
use semchunk_core::{content_hash, Chunk, ChunkMetadata, DocumentMeta, HeaderPath, ParentType};
use tracing::debug;

use super::pooling::weighted_mean;
use super::types::{join_cost, measure, SubChunk};
use crate::error::ChunkingError;

/// Raw sub-chunks of one section, in order.
#[derive(Debug, Clone)]
pub struct SectionChunks {
    pub section_index: usize,
    pub header_path: HeaderPath,
    pub parent_type: ParentType,
    pub sub_chunks: Vec<SubChunk>,
}

/// Flattens per-section sub-chunks into the final, globally indexed chunk list.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    size_unit: SizeUnit,
    min_chunk_size: usize,
    max_chunk_size: usize,
    drop_short_sections: bool,
}

impl ChunkAssembler {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            size_unit: config.size_unit,
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            drop_short_sections: config.drop_short_sections,
        }
    }

    /// Fold sub-chunks below the minimum size into their neighbours.
    ///
    /// A short piece is carried forward and prepended to the next one; a
    /// carry left at the end is appended to the last emitted piece. Merges
    /// that would break the size ceiling are skipped and the short piece is
    /// kept on its own.
    pub fn merge_small(&self, sub_chunks: Vec<SubChunk>) -> Result<Vec<SubChunk>, ChunkingError> {
        let mut kept: Vec<SubChunk> = Vec::new();
        let mut carry: Option<SubChunk> = None;

        for sub in sub_chunks {
            let text = sub.text.trim();
            if text.is_empty() {
                continue;
            }
            let mut current = SubChunk {
                text: text.to_string(),
                vector: sub.vector,
            };

            if let Some(short) = carry.take() {
                if self.fits(&short, &current) {
                    current = self.join(&short, &current)?;
                } else {
                    kept.push(short);
                }
            }

            if measure(&current.text, self.size_unit) < self.min_chunk_size {
                carry = Some(current);
            } else {
                kept.push(current);
            }
        }

        if let Some(short) = carry {
            match kept.pop() {
                Some(last) if self.fits(&last, &short) => kept.push(self.join(&last, &short)?),
                Some(last) => {
                    kept.push(last);
                    kept.push(short);
                }
                None if self.drop_short_sections => {
                    debug!(
                        size = measure(&short.text, self.size_unit),
                        min = self.min_chunk_size,
                        "dropping short section"
                    );
                }
                None => kept.push(short),
            }
        }
        Ok(kept)
    }

    fn fits(&self, a: &SubChunk, b: &SubChunk) -> bool {
        measure(&a.text, self.size_unit) + join_cost(self.size_unit) + measure(&b.text, self.size_unit)
            <= self.max_chunk_size
    }

    /// Concatenate `a` then `b`, pooling their vectors by size.
    fn join(&self, a: &SubChunk, b: &SubChunk) -> Result<SubChunk, ChunkingError> {
        let weights = [
            measure(&a.text, self.size_unit) as f32,
            measure(&b.text, self.size_unit) as f32,
        ];
        let vector = if a.vector.is_empty() {
            b.vector.clone()
        } else if b.vector.is_empty() {
            a.vector.clone()
        } else {
            weighted_mean(&[&a.vector, &b.vector], &weights)?.unwrap_or_default()
        };
        Ok(SubChunk {
            text: format!("{}\n{}", a.text, b.text),
            vector,
        })
    }

    /// Merge, index and stamp every section's sub-chunks.
    pub fn assemble(
        &self,
        sections: Vec<SectionChunks>,
        meta: &DocumentMeta,
    ) -> Result<Vec<Chunk>, ChunkingError> {
        let mut chunks = Vec::new();

        for section in sections {
            let merged = self.merge_small(section.sub_chunks)?;
            let semantic_total = merged.len();
            for (semantic_index, sub) in merged.into_iter().enumerate() {
                chunks.push(Chunk {
                    id: content_hash(&sub.text),
                    text: sub.text,
                    vector: sub.vector,
                    metadata: ChunkMetadata {
                        header_path: section.header_path.clone(),
                        parent_type: section.parent_type,
                        section_index: section.section_index,
                        semantic_chunk_index: semantic_index,
                        semantic_chunk_total: semantic_total,
                        chunk_index: 0,
                        chunk_total: 0,
                        doc_name: meta.doc_name.clone(),
                        doc_hash: meta.doc_hash.clone(),
                        source: meta.source.clone(),
                    },
                });
            }
        }

        let total = chunks.len();
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.metadata.chunk_index = index;
            chunk.metadata.chunk_total = total;
        }
        Ok(chunks)
    }
}
