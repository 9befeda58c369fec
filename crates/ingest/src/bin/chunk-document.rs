//! chunk-document: chunk one extracted markdown or text file into JSONL.
//!
//! Each output line is a chunk: `{id, text, vector, metadata}`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use semchunk_core::config::{load_dotenv, Config};
use semchunk_core::DocumentMeta;
use semchunk_ingest::document::decode_text;
use semchunk_ingest::embedding::build_embedder;
use semchunk_ingest::SemanticChunker;

// ── CLI ─────────────────────────────────────────────────────────────

/// Split a document into semantically coherent, embedded chunks.
#[derive(Parser, Debug)]
#[command(name = "chunk-document", version, about)]
struct Cli {
    /// Extracted markdown or plain-text document.
    input: PathBuf,

    /// Destination JSONL file.
    #[arg(long, short, default_value = "chunks.jsonl")]
    output: PathBuf,

    /// Document name stamped on every chunk (defaults to the input file name).
    #[arg(long)]
    doc_name: Option<String>,

    /// Source reference stamped on every chunk (defaults to the input path).
    #[arg(long)]
    source: Option<String>,

    /// Config profile; keys are read as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, env = "SEMCHUNK_PROFILE", default_value = "")]
    profile: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::for_profile(&cli.profile).context("invalid configuration")?;
    config.log_summary();

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let text = decode_text(&bytes);

    let doc_name = cli.doc_name.unwrap_or_else(|| {
        cli.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| cli.input.display().to_string())
    });
    let source = cli
        .source
        .unwrap_or_else(|| cli.input.display().to_string());
    let meta = DocumentMeta::for_text(doc_name, source, &text);

    let embedder = build_embedder(&config.embedding).context("failed to build embedder")?;
    let chunker = SemanticChunker::from_config(&config, embedder)?;

    info!(input = %cli.input.display(), chars = text.chars().count(), "chunking document");
    let chunks = chunker
        .chunk_document(&text, &meta)
        .await
        .with_context(|| format!("failed to chunk {}", cli.input.display()))?;

    let file = File::create(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    let mut out = BufWriter::new(file);
    for chunk in &chunks {
        serde_json::to_writer(&mut out, chunk)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        output = %cli.output.display(),
        chunks = chunks.len(),
        cache_dir = %chunker.cache().root().display(),
        cache_hits = chunker.cache().hits(),
        cache_misses = chunker.cache().misses(),
        "wrote chunks"
    );
    Ok(())
}
