//! Text measuring and the size-bounded block splitter used as structural fallback.

use std::collections::VecDeque;

/// Approximate token count via whitespace splitting.
pub(crate) fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Length in Unicode scalar values.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Markdown-aware separators, coarsest first. The empty separator splits
/// between characters and always applies.
const BLOCK_SEPARATORS: &[&str] = &[
    "\n# ", "\n## ", "\n### ", "\n#### ", "\n##### ", "\n###### ", "```\n", "\n***\n",
    "\n---\n", "\n___\n", "\n\n", "\n", " ", "",
];

/// Split `text` into blocks of at most `chunk_size` characters with up to
/// `overlap` characters repeated between neighbours, preferring the coarsest
/// natural boundary (heading, code fence, rule, paragraph, line, word).
pub(crate) fn split_blocks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    split_recursive(text, BLOCK_SEPARATORS, chunk_size, overlap)
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let mut out = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in split_keep_separator(text, separator) {
        if char_len(piece) < chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            out.extend(merge_pieces(&fitting, chunk_size, overlap));
            fitting.clear();
        }
        if finer.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        } else {
            out.extend(split_recursive(piece, finer, chunk_size, overlap));
        }
    }
    if !fitting.is_empty() {
        out.extend(merge_pieces(&fitting, chunk_size, overlap));
    }
    out
}

/// Split on `separator`, keeping it at the start of the following piece.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Greedily join pieces into blocks under `chunk_size`, carrying a tail of
/// at most `overlap` characters into the next block.
fn merge_pieces(pieces: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            push_block(&mut blocks, &window);
            while total > overlap || (total + len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }
    push_block(&mut blocks, &window);
    blocks
}

fn push_block(blocks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        blocks.push(trimmed.to_string());
    }
}
