//! Run command - check every backstory against its story

use anyhow::{Context, Result};
use std::path::PathBuf;

use canon::config::EmbeddingBackend;
use canon::embeddings::create_embedder;
use canon::pipeline::Pipeline;
use canon::records;

/// Options for a consistency run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub chunks: PathBuf,
    pub backstories: PathBuf,
    pub config: Option<PathBuf>,
    pub stub: bool,
    pub top_k: Option<usize>,
    pub threads: Option<usize>,
    pub results: Option<PathBuf>,
    pub json: bool,
}

pub fn execute(options: RunOptions) -> Result<()> {
    let mut config = super::load_config(options.config.as_deref())?;
    if options.stub {
        config.embeddings.backend = EmbeddingBackend::Stub;
    }
    if let Some(k) = options.top_k {
        config.retrieval.top_k = k;
    }
    if let Some(threads) = options.threads {
        config.run.threads = threads;
    }
    if let Some(results) = options.results {
        config.output.results_file = results;
    }
    config.validate().context("Invalid run options")?;

    let chunks = records::load_chunks(&options.chunks)?;
    let backstories = records::load_backstories(&options.backstories)?;
    if chunks.records.is_empty() {
        tracing::warn!("No chunks loaded from {}", options.chunks.display());
    }

    let embedder = create_embedder(&config.embeddings)?;
    let pipeline = Pipeline::new(config, embedder);
    let report = pipeline.run_loaded(&backstories, &chunks)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        return Ok(());
    }

    let summary = &report.summary;
    println!(
        "Checked {} backstories across {} stories with {}",
        summary.backstories, summary.stories, summary.model
    );
    println!(
        "  consistent: {}  contradictory: {}  (no claims: {})",
        summary.consistent, summary.contradictory, summary.no_claims
    );
    if !summary.missing_stories.is_empty() {
        println!("  stories without chunks: {}", summary.missing_stories.join(", "));
    }
    if !summary.index_failures.is_empty() {
        println!("  index failures: {}", summary.index_failures.join(", "));
    }
    if summary.failed_embeddings > 0 {
        println!("  chunks skipped (embedding failed): {}", summary.failed_embeddings);
    }
    if !summary.skipped.is_empty() {
        println!("  malformed input rows skipped: {}", summary.skipped.len());
    }
    println!(
        "Results appended to {}",
        pipeline.sink().results_path().display()
    );
    println!("Summary written to {}", report.summary_path.display());
    Ok(())
}
