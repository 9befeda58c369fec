//! Structural splitter: markdown header sections with block-split fallback.

use semchunk_core::config::ChunkingConfig;
use semchunk_core::{HeaderPath, Section};
use tracing::debug;

use super::helpers::{char_len, split_blocks};

/// Deepest header level that opens a new section.
const MAX_SECTION_LEVEL: usize = 3;

/// Split `text` into ordered sections along H1–H3 headers.
///
/// Each section carries the most recent H1/H2/H3 seen before it. A document
/// without any such header, or a single section at or above
/// [`ChunkingConfig::presplit_threshold`] characters, is cut into overlapping
/// blocks along natural boundaries instead.
pub fn split_sections(text: &str, config: &ChunkingConfig) -> Vec<Section> {
    let raw = header_sections(text);
    let mut sections = Vec::new();

    if raw.iter().all(|(path, _)| path.is_empty()) {
        let blocks = split_blocks(text, config.presplit_chunk_size, config.presplit_overlap);
        debug!(blocks = blocks.len(), "no headers found, block-splitting whole document");
        for block in blocks {
            push_section(&mut sections, block, HeaderPath::default());
        }
        return sections;
    }

    let threshold = config.presplit_threshold();
    for (path, body) in raw {
        let len = char_len(&body);
        if len >= threshold {
            let blocks = split_blocks(&body, config.presplit_chunk_size, config.presplit_overlap);
            debug!(
                chars = len,
                threshold,
                blocks = blocks.len(),
                "oversized section, block-splitting"
            );
            for block in blocks {
                push_section(&mut sections, block, path.clone());
            }
        } else {
            push_section(&mut sections, body, path);
        }
    }
    sections
}

fn push_section(sections: &mut Vec<Section>, text: String, header_path: HeaderPath) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    sections.push(Section {
        text: text.to_string(),
        header_path,
        order_index: sections.len(),
    });
}

/// Group lines under the header path in effect, dropping header lines.
fn header_sections(text: &str) -> Vec<(HeaderPath, String)> {
    let mut out = Vec::new();
    let mut path = HeaderPath::default();
    let mut body: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            body.push(line);
            continue;
        }
        if let Some(marker) = fence_marker(trimmed) {
            fence = Some(marker);
            body.push(line);
            continue;
        }
        match parse_header(trimmed) {
            Some((level, title)) => {
                flush(&mut out, &path, &mut body);
                path.enter(level, title);
            }
            None => body.push(line),
        }
    }
    flush(&mut out, &path, &mut body);
    out
}

fn flush(out: &mut Vec<(HeaderPath, String)>, path: &HeaderPath, body: &mut Vec<&str>) {
    let joined = body.join("\n");
    body.clear();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push((path.clone(), trimmed.to_string()));
    }
}

fn fence_marker(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// `## Title ##` -> `(2, "Title")`. Deeper headers stay body text.
fn parse_header(line: &str) -> Option<(usize, String)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > MAX_SECTION_LEVEL {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim_end();
    Some((level, title.to_string()))
}
