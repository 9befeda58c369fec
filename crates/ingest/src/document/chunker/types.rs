//! Sentence and sub-chunk types shared by the chunking stages.

use semchunk_core::config::SizeUnit;
use semchunk_core::Vector;

use super::helpers::{char_len, count_tokens};

// ── Sentence ────────────────────────────────────────────────────────────────

/// One segmented sentence with its size under both units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub char_length: usize,
    pub token_length: usize,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            char_length: char_len(&text),
            token_length: count_tokens(&text),
            text,
        }
    }

    pub fn size(&self, unit: SizeUnit) -> usize {
        match unit {
            SizeUnit::Chars => self.char_length,
            SizeUnit::Tokens => self.token_length,
        }
    }
}

/// Size of arbitrary text under `unit`.
pub fn measure(text: &str, unit: SizeUnit) -> usize {
    match unit {
        SizeUnit::Chars => char_len(text),
        SizeUnit::Tokens => count_tokens(text),
    }
}

/// Size added by the single space that joins two sentences.
pub(crate) fn join_cost(unit: SizeUnit) -> usize {
    match unit {
        SizeUnit::Chars => 1,
        SizeUnit::Tokens => 0,
    }
}

// ── Sub-chunk ───────────────────────────────────────────────────────────────

/// Raw output of a chunking strategy, before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SubChunk {
    pub text: String,
    pub vector: Vector,
}
