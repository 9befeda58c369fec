use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Dense embedding vector. Dimension is fixed per embedding model.
pub type Vector = Vec<f32>;

/// SHA-256 hex digest of the UTF-8 bytes of `text`.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

/// Most recent H1/H2/H3 values in effect for a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h3: Option<String>,
}

impl HeaderPath {
    pub fn is_empty(&self) -> bool {
        self.h1.is_none() && self.h2.is_none() && self.h3.is_none()
    }

    /// Record a header at `level` (1..=3), clearing every deeper level.
    pub fn enter(&mut self, level: usize, title: String) {
        match level {
            1 => {
                self.h1 = Some(title);
                self.h2 = None;
                self.h3 = None;
            }
            2 => {
                self.h2 = Some(title);
                self.h3 = None;
            }
            3 => self.h3 = Some(title),
            _ => {}
        }
    }
}

/// A structural slice of a document, produced by the structural splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub text: String,
    pub header_path: HeaderPath,
    pub order_index: usize,
}

/// Document-level attribution stamped onto every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_name: String,
    pub doc_hash: String,
    pub source: String,
}

impl DocumentMeta {
    pub fn new(
        doc_name: impl Into<String>,
        doc_hash: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            doc_name: doc_name.into(),
            doc_hash: doc_hash.into(),
            source: source.into(),
        }
    }

    /// Build metadata whose `doc_hash` is the content hash of `text`.
    pub fn for_text(doc_name: impl Into<String>, source: impl Into<String>, text: &str) -> Self {
        Self::new(doc_name, content_hash(text), source)
    }
}

/// How a chunk relates to the section it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentType {
    /// The whole section fit under the size ceiling.
    HeaderChunk,
    /// One of several pieces of an oversized section.
    SemanticSubchunk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub header_path: HeaderPath,
    pub parent_type: ParentType,
    pub section_index: usize,
    pub semantic_chunk_index: usize,
    pub semantic_chunk_total: usize,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub doc_name: String,
    pub doc_hash: String,
    pub source: String,
}

/// Final output record: one retrievable span of text plus its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub vector: Vector,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_hex() {
        let a = content_hash("hello");
        assert_eq!(a, content_hash("hello"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash("hello "));
    }

    #[test]
    fn entering_header_clears_deeper_levels() {
        let mut path = HeaderPath::default();
        path.enter(1, "Guide".into());
        path.enter(2, "Install".into());
        path.enter(3, "Linux".into());
        path.enter(2, "Usage".into());
        assert_eq!(path.h1.as_deref(), Some("Guide"));
        assert_eq!(path.h2.as_deref(), Some("Usage"));
        assert!(path.h3.is_none());
    }

    #[test]
    fn metadata_serializes_flat_header_fields() {
        let meta = ChunkMetadata {
            header_path: HeaderPath {
                h1: Some("Intro".into()),
                h2: None,
                h3: None,
            },
            parent_type: ParentType::HeaderChunk,
            section_index: 0,
            semantic_chunk_index: 0,
            semantic_chunk_total: 1,
            chunk_index: 0,
            chunk_total: 1,
            doc_name: "a.md".into(),
            doc_hash: "abc".into(),
            source: "docs/a.md".into(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["h1"], "Intro");
        assert!(json.get("h2").is_none());
        assert_eq!(json["parent_type"], "header_chunk");
    }
}
