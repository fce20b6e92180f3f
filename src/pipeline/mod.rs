//! Pipeline module - end-to-end consistency run
//!
//! For each distinct story referenced by the backstories:
//! 1. split every backstory of the story into claims
//! 2. build the story index once (only if some backstory has claims)
//! 3. retrieve top-K evidence per claim and aggregate per backstory
//! 4. decide one verdict per backstory
//!
//! Stories run in parallel on a rayon pool. The embedding engine is the only
//! shared mutable resource and sits behind a mutex. Verdicts are emitted in
//! backstory input order whatever the thread count.

mod output;

pub use output::{audit_key, OutputSink, AUDIT_SUFFIX, SUMMARY_FILE};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::claims::claims_for;
use crate::config::RunConfig;
use crate::embeddings::EmbeddingEngine;
use crate::error::CanonError;
use crate::evidence::aggregate;
use crate::index::StoryIndex;
use crate::records::{self, Backstory, Chunk, EvidenceRecord, Label, Loaded, SkipReason, Verdict};
use crate::retrieval::retrieve;
use crate::verdict::VerdictEngine;

/// Counters and context for one run, written as JSON next to the results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub model: String,
    pub top_k: usize,
    pub backstories: usize,
    pub stories: usize,
    pub verdicts: usize,
    pub consistent: usize,
    pub contradictory: usize,
    pub no_claims: usize,
    pub claims: usize,
    pub missing_stories: Vec<String>,
    pub index_failures: Vec<String>,
    pub failed_embeddings: usize,
    pub cancelled_stories: usize,
    pub skipped: Vec<SkipReason>,
    pub elapsed_ms: u64,
}

/// Verdicts in backstory input order plus the run summary
#[derive(Debug, Clone)]
pub struct RunReport {
    pub verdicts: Vec<Verdict>,
    pub summary: RunSummary,
    pub summary_path: PathBuf,
}

/// Outcome of one story group
#[derive(Debug, Default)]
struct StoryOutcome {
    /// (backstory position, verdict)
    verdicts: Vec<(usize, Verdict)>,
    claims: usize,
    no_claims: usize,
    failed_embeddings: usize,
    missing: bool,
    index_failed: bool,
    cancelled: bool,
}

pub struct Pipeline {
    config: RunConfig,
    embedder: Mutex<Box<dyn EmbeddingEngine>>,
    engine: VerdictEngine,
    sink: OutputSink,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: RunConfig, embedder: Box<dyn EmbeddingEngine>) -> Self {
        let engine = VerdictEngine::from_config(&config.verdict);
        let sink = OutputSink::new(config.output.clone());
        Self {
            config,
            embedder: Mutex::new(embedder),
            engine,
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Flag that stops stories from starting once raised
    ///
    /// Stories already in flight finish and keep their verdicts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run over loader output, carrying the loaders' skip ledger into the summary
    pub fn run_loaded(
        &self,
        backstories: &Loaded<Backstory>,
        chunks: &Loaded<Chunk>,
    ) -> Result<RunReport> {
        let skipped = backstories
            .skipped
            .iter()
            .chain(&chunks.skipped)
            .cloned()
            .collect();
        self.execute(&backstories.records, &chunks.records, skipped)
    }

    /// Decide every backstory and write results, claims, audit and summary
    pub fn run(&self, backstories: &[Backstory], chunks: &[Chunk]) -> Result<RunReport> {
        self.execute(backstories, chunks, Vec::new())
    }

    fn execute(
        &self,
        backstories: &[Backstory],
        chunks: &[Chunk],
        skipped: Vec<SkipReason>,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let groups = group_by_story(backstories);
        let keys = artifact_keys(backstories);

        tracing::info!(
            "Checking {} backstories across {} stories (top_k={}, {} chunks)",
            backstories.len(),
            groups.len(),
            self.config.retrieval.top_k,
            chunks.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.run.threads)
            .build()
            .context("Failed to build worker pool")?;

        let outcomes: Vec<StoryOutcome> = pool.install(|| {
            groups
                .par_iter()
                .map(|(story_id, members)| {
                    self.process_story(story_id, members, backstories, &keys, chunks)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut summary = RunSummary {
            started_at: Some(started_at),
            model: self.embedder.lock().model_name().to_string(),
            top_k: self.config.retrieval.top_k,
            backstories: backstories.len(),
            stories: groups.len(),
            skipped,
            ..Default::default()
        };

        let mut ordered: Vec<(usize, Verdict)> = Vec::with_capacity(backstories.len());
        for ((story_id, _), outcome) in groups.iter().zip(outcomes) {
            summary.claims += outcome.claims;
            summary.no_claims += outcome.no_claims;
            summary.failed_embeddings += outcome.failed_embeddings;
            if outcome.missing {
                summary.missing_stories.push(story_id.to_string());
            }
            if outcome.index_failed {
                summary.index_failures.push(story_id.to_string());
            }
            if outcome.cancelled {
                summary.cancelled_stories += 1;
            }
            ordered.extend(outcome.verdicts);
        }
        ordered.sort_by_key(|(position, _)| *position);
        let verdicts: Vec<Verdict> = ordered.into_iter().map(|(_, v)| v).collect();

        summary.verdicts = verdicts.len();
        summary.consistent = verdicts
            .iter()
            .filter(|v| v.label == Label::Consistent)
            .count();
        summary.contradictory = summary.verdicts - summary.consistent;

        self.sink.append_results(&verdicts)?;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        let summary_path = self.sink.write_summary(&summary)?;

        tracing::info!(
            "Wrote {} verdicts to {} ({} consistent, {} contradictory) in {}ms",
            summary.verdicts,
            self.sink.results_path().display(),
            summary.consistent,
            summary.contradictory,
            summary.elapsed_ms
        );

        Ok(RunReport {
            verdicts,
            summary,
            summary_path,
        })
    }

    /// Process every backstory of one story
    ///
    /// Contained failures become conservative verdicts; only output I/O errors
    /// propagate.
    fn process_story(
        &self,
        story_id: &str,
        members: &[usize],
        backstories: &[Backstory],
        keys: &[String],
        chunks: &[Chunk],
    ) -> Result<StoryOutcome> {
        let mut outcome = StoryOutcome::default();
        if self.cancel.load(Ordering::SeqCst) {
            tracing::info!("Cancelled before story {} started", story_id);
            outcome.cancelled = true;
            return Ok(outcome);
        }

        let min_chars = self.config.claims.min_claim_chars;
        let top_k = self.config.retrieval.top_k;
        let metric = self.config.retrieval.metric;
        let mut index: Option<std::result::Result<StoryIndex, String>> = None;

        for &position in members {
            let backstory = &backstories[position];
            let key = &keys[position];
            let claims = claims_for(backstory, min_chars);
            self.sink.write_claims(key, &claims)?;

            if claims.is_empty() {
                tracing::info!("Story {}: no claims extracted", story_id);
                outcome.no_claims += 1;
                outcome
                    .verdicts
                    .push((position, self.engine.no_claims(story_id)));
                continue;
            }
            outcome.claims += claims.len();

            let built = index.get_or_insert_with(|| {
                let mut embedder = self.embedder.lock();
                match StoryIndex::for_story(story_id, chunks, &mut **embedder, metric) {
                    Ok(index) => {
                        outcome.failed_embeddings += index.failed_embeddings();
                        Ok(index)
                    }
                    Err(CanonError::MissingStoryChunks { .. }) => {
                        tracing::warn!("Story {} has no chunks; no evidence available", story_id);
                        outcome.missing = true;
                        Ok(StoryIndex::empty(story_id, metric))
                    }
                    Err(e) => {
                        tracing::warn!("Index build failed for story {}: {}", story_id, e);
                        outcome.index_failed = true;
                        Err(e.to_string())
                    }
                }
            });

            let story_index = match built {
                Ok(story_index) => story_index,
                Err(reason) => {
                    outcome
                        .verdicts
                        .push((position, self.engine.index_failure(story_id, reason)));
                    continue;
                }
            };

            let mut records = Vec::new();
            for claim in &claims {
                let evidence = {
                    let mut embedder = self.embedder.lock();
                    retrieve(claim, story_index, top_k, &mut **embedder)
                };
                self.sink.write_audit(key, claim, &evidence)?;
                records.extend(evidence);
            }

            let mut sets = aggregate(records);
            let verdict = self.engine.decide(&sets.take(story_id));
            tracing::debug!(
                "Backstory {} of story {}: {} ({})",
                position + 1,
                story_id,
                verdict.label,
                verdict.rationale
            );
            outcome.verdicts.push((position, verdict));
        }

        Ok(outcome)
    }
}

/// Backstory positions grouped by story id, stories in sorted order
fn group_by_story(backstories: &[Backstory]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (position, backstory) in backstories.iter().enumerate() {
        groups
            .entry(backstory.story_id.as_str())
            .or_default()
            .push(position);
    }
    groups.into_iter().collect()
}

/// File name key for each backstory's claims and audit files, by position
///
/// A story checked against several backstories gets numbered keys
/// (`<story_id>_1`, `<story_id>_2`, ...) so their files do not overwrite each
/// other.
pub fn artifact_keys(backstories: &[Backstory]) -> Vec<String> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for backstory in backstories {
        *totals.entry(backstory.story_id.as_str()).or_default() += 1;
    }

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    backstories
        .iter()
        .map(|backstory| {
            let story_id = backstory.story_id.as_str();
            let occurrence = seen.entry(story_id).or_default();
            *occurrence += 1;
            if totals.get(story_id).copied().unwrap_or(0) > 1 {
                format!("{}_{}", story_id, occurrence)
            } else {
                story_id.to_string()
            }
        })
        .collect()
}

/// Re-decide saved retrieval audits, one verdict per artifact key
///
/// Rows are grouped by the key in each audit file name, so several backstories
/// of one story stay separate. Files named some other way are grouped by the
/// story id of their rows. Verdicts come out in key order.
pub fn decide_audits(
    engine: &VerdictEngine,
    files: &[PathBuf],
) -> Result<(Vec<Verdict>, Vec<SkipReason>)> {
    let mut groups: BTreeMap<String, Vec<EvidenceRecord>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for file in files {
        let loaded = records::load_evidence(file)?;
        skipped.extend(loaded.skipped);
        let key = audit_key(file);
        for record in loaded.records {
            let group = key.clone().unwrap_or_else(|| record.story_id.clone());
            groups.entry(group).or_default().push(record);
        }
    }
    tracing::info!(
        "Loaded evidence for {} backstories from {} files",
        groups.len(),
        files.len()
    );

    let verdicts = groups
        .into_values()
        .flat_map(|records| aggregate(records).into_iter().map(move |set| engine.decide(&set)))
        .collect();
    Ok((verdicts, skipped))
}
