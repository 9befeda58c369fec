//! Cross-stage tests for the chunking engine, without an embedding backend.

use semchunk_core::config::{ChunkingConfig, SizeUnit};
use semchunk_core::{DocumentMeta, ParentType};

use super::assembler::{ChunkAssembler, SectionChunks};
use super::helpers::char_len;
use super::sentences::SentenceSegmenter;
use super::strategies::ChunkingStrategy;
use super::structure::split_sections;
use super::types::{Sentence, SubChunk};

/// Stand-in embedding: a one-hot vector chosen by the sentence's first letter.
fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; 26];
    let slot = text
        .bytes()
        .find(u8::is_ascii_alphabetic)
        .map(|b| (b.to_ascii_lowercase() - b'a') as usize)
        .unwrap_or(0);
    v[slot] = 1.0;
    v
}

fn prose(sentences: usize, words_each: usize) -> String {
    (0..sentences)
        .map(|i| {
            let body = (0..words_each).map(|w| format!("w{i}x{w}")).collect::<Vec<_>>();
            format!("Topic {}.", body.join(" "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_sections(text: &str, config: &ChunkingConfig) -> Vec<SectionChunks> {
    let segmenter = SentenceSegmenter::new();
    let strategy = ChunkingStrategy::from(config.strategy);
    split_sections(text, config)
        .into_iter()
        .map(|section| {
            let sentences: Vec<Sentence> = segmenter.split(&section.text).unwrap();
            let sizes: Vec<usize> = sentences.iter().map(|s| s.size(config.size_unit)).collect();
            let vectors: Vec<_> = sentences.iter().map(|s| letter_vector(&s.text)).collect();
            let (parent_type, sub_chunks) =
                if super::types::measure(&section.text, config.size_unit) <= config.max_chunk_size {
                    let text = section.text.clone();
                    (ParentType::HeaderChunk, vec![SubChunk { text, vector: vec![1.0] }])
                } else {
                    let subs = strategy.split(&sentences, &sizes, &vectors, config).unwrap();
                    (ParentType::SemanticSubchunk, subs)
                };
            SectionChunks {
                section_index: section.order_index,
                header_path: section.header_path,
                parent_type,
                sub_chunks,
            }
        })
        .collect()
}

// ── Structure ───────────────────────────────────────────────────────

#[test]
fn three_small_sections_need_no_fallback() {
    let text = "## One\nAlpha text here.\n\n## Two\nBravo text here.\n\n## Three\nCharlie text.";
    let sections = split_sections(text, &ChunkingConfig::default());
    assert_eq!(sections.len(), 3);
    assert!(sections.iter().all(|s| char_len(&s.text) < 200));
}

// ── End to end ──────────────────────────────────────────────────────

#[test]
fn long_section_respects_size_bound() {
    let body = prose(120, 8);
    assert!(char_len(&body) > 5000);
    let text = format!("# Manual\n{body}");
    let config = ChunkingConfig {
        presplit_chunk_size: 100_000,
        ..ChunkingConfig::default()
    };

    let sections = run_sections(&text, &config);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].parent_type, ParentType::SemanticSubchunk);

    let meta = DocumentMeta::for_text("manual.md", "docs/manual.md", &text);
    let chunks = ChunkAssembler::from_config(&config)
        .assemble(sections, &meta)
        .unwrap();
    assert!(chunks.len() >= 2);
    for c in &chunks {
        assert!(char_len(&c.text) <= config.max_chunk_size);
        assert_eq!(c.metadata.header_path.h1.as_deref(), Some("Manual"));
    }
}

#[test]
fn min_size_holds_except_last_remainder() {
    let text = format!("## Long\n{}", prose(200, 6));
    let config = ChunkingConfig {
        max_chunk_size: 900,
        min_chunk_size: 400,
        overlap_budget: 0,
        presplit_chunk_size: 100_000,
        ..ChunkingConfig::default()
    };
    let meta = DocumentMeta::for_text("long.md", "long.md", &text);
    let chunks = ChunkAssembler::from_config(&config)
        .assemble(run_sections(&text, &config), &meta)
        .unwrap();

    let (last, rest) = chunks.split_last().unwrap();
    for c in rest {
        assert!(char_len(&c.text) >= 400, "chunk of {} chars", char_len(&c.text));
        assert!(char_len(&c.text) <= 900);
    }
    assert!(char_len(&last.text) <= 900);
}

#[test]
fn token_unit_bounds_by_words() {
    let text = format!("## Words\n{}", prose(100, 10));
    let config = ChunkingConfig {
        size_unit: SizeUnit::Tokens,
        strategy: semchunk_core::config::StrategyKind::TokenBudgetOnly,
        max_chunk_size: 120,
        min_chunk_size: 30,
        overlap_budget: 20,
        presplit_chunk_size: 100_000,
        ..ChunkingConfig::default()
    };
    let meta = DocumentMeta::for_text("w.md", "w.md", &text);
    let chunks = ChunkAssembler::from_config(&config)
        .assemble(run_sections(&text, &config), &meta)
        .unwrap();
    assert!(chunks.len() > 5);
    for c in &chunks {
        assert!(c.text.split_whitespace().count() <= 120);
    }
}

#[test]
fn chunk_indices_are_global_and_sequential() {
    let text = format!(
        "# Doc\n## A\n{}\n## B\nShort section that still counts as content here.\n## C\n{}",
        prose(80, 8),
        prose(60, 8)
    );
    let config = ChunkingConfig {
        min_chunk_size: 20,
        presplit_chunk_size: 100_000,
        ..ChunkingConfig::default()
    };
    let meta = DocumentMeta::for_text("doc.md", "doc.md", &text);
    let chunks = ChunkAssembler::from_config(&config)
        .assemble(run_sections(&text, &config), &meta)
        .unwrap();

    let total = chunks.len();
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.metadata.chunk_index, i);
        assert_eq!(c.metadata.chunk_total, total);
        assert!(c.metadata.semantic_chunk_index < c.metadata.semantic_chunk_total);
    }
    let b = chunks
        .iter()
        .find(|c| c.metadata.header_path.h2.as_deref() == Some("B"))
        .unwrap();
    assert_eq!(b.metadata.parent_type, ParentType::HeaderChunk);
    assert_eq!(b.metadata.semantic_chunk_total, 1);
}

#[test]
fn chunking_is_deterministic() {
    let text = format!("## Repeat\n{}", prose(150, 7));
    let config = ChunkingConfig {
        presplit_chunk_size: 100_000,
        ..ChunkingConfig::default()
    };
    let meta = DocumentMeta::for_text("r.md", "r.md", &text);
    let assembler = ChunkAssembler::from_config(&config);
    let first = assembler.assemble(run_sections(&text, &config), &meta).unwrap();
    let second = assembler.assemble(run_sections(&text, &config), &meta).unwrap();
    assert_eq!(first, second);
}
