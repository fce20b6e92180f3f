//! End-to-end runs of the consistency pipeline with table-driven embeddings

use anyhow::{anyhow, Result};
use canon::config::RunConfig;
use canon::embeddings::{EmbeddingEngine, StubEmbedder};
use canon::pipeline::{decide_audits, Pipeline};
use canon::verdict::VerdictEngine;
use canon::records::{self, csv::CsvTable, Backstory, Chunk, Label};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Embeds known texts from a lookup table and counts every call
struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl TableEmbedder {
    fn new(entries: &[(&str, &[f32])]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = entries
            .iter()
            .map(|(text, vector)| (text.to_string(), vector.to_vec()))
            .collect();
        (
            Self {
                table,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl EmbeddingEngine for TableEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no vector for '{}'", text))
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

fn config_in(dir: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.output.results_file = dir.join("outputs").join("results.csv");
    config.output.audit_dir = dir.join("retrieval");
    config.output.claims_dir = dir.join("claims");
    config
}

fn chunk(story: &str, n: u32, text: &str) -> Chunk {
    Chunk::new(story, Chunk::make_id(story, n), n, text).unwrap()
}

fn backstory(story: &str, content: &str) -> Backstory {
    Backstory::new(story, content).unwrap()
}

const SHIPWRECK: &str = "The fishing boat went down with both parents aboard";
const FESTIVAL: &str = "The harvest festival lasted a whole week";
const LEDGER: &str = "The harbour ledger confirms she sailed alone";
const DIARY: &str = "Her diary denies that she ever left the valley";

fn scenario_embedder() -> (TableEmbedder, Arc<AtomicUsize>) {
    TableEmbedder::new(&[
        (SHIPWRECK, &[1.0, 0.0]),
        (FESTIVAL, &[0.0, 1.0]),
        (LEDGER, &[1.0, 0.0]),
        (DIARY, &[0.0, 1.0]),
        ("Her parents died at sea", &[1.0, 0.0]),
        ("She sailed the coast as a girl", &[1.0, 1.0]),
        ("She grew up in the valley", &[0.0, 1.0]),
        ("She never saw the ocean", &[0.6, 0.8]),
    ])
}

fn scenario_chunks() -> Vec<Chunk> {
    vec![
        chunk("wreck", 1, SHIPWRECK),
        chunk("wreck", 2, FESTIVAL),
        chunk("harbour", 1, LEDGER),
        chunk("harbour", 2, FESTIVAL),
        chunk("valley", 1, SHIPWRECK),
        chunk("valley", 2, DIARY),
    ]
}

#[test]
fn test_cascade_outcomes_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let (embedder, _) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    let report = pipeline
        .run(
            &[
                backstory("wreck", "Her parents died at sea."),
                backstory("harbour", "She sailed the coast as a girl."),
                backstory("valley", "She grew up in the valley."),
                backstory("valley", ""),
                backstory("nowhere", "She never saw the ocean."),
            ],
            &scenario_chunks(),
        )
        .unwrap();

    let rationales: Vec<_> = report
        .verdicts
        .iter()
        .map(|v| (v.story_id.as_str(), v.label, v.rationale.as_str()))
        .collect();
    assert_eq!(
        rationales,
        vec![
            (
                "wreck",
                Label::Consistent,
                "strong supporting evidence (similarity=1.00) in chunk wreck_chunk1"
            ),
            (
                "harbour",
                Label::Consistent,
                "supportive language found in evidence chunk harbour_chunk1"
            ),
            (
                "valley",
                Label::Contradictory,
                "contradiction found in evidence chunk valley_chunk2"
            ),
            ("valley", Label::Contradictory, "no claims extracted"),
            ("nowhere", Label::Contradictory, "no supporting evidence found"),
        ]
    );
    assert_eq!(report.summary.missing_stories, vec!["nowhere".to_string()]);
    assert_eq!(report.summary.no_claims, 1);
    assert_eq!(report.summary.consistent, 2);
    assert_eq!(report.summary.contradictory, 3);
}

#[test]
fn test_outputs_are_written() {
    let tmp = TempDir::new().unwrap();
    let (embedder, _) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    pipeline
        .run(
            &[
                backstory("wreck", "Her parents died at sea."),
                backstory("valley", "She grew up in the valley."),
            ],
            &scenario_chunks(),
        )
        .unwrap();

    let results = CsvTable::read(&tmp.path().join("outputs").join("results.csv")).unwrap();
    assert_eq!(results.headers(), &["story_id", "prediction", "rationale"]);
    assert_eq!(results.len(), 2);

    let claims = CsvTable::read(&tmp.path().join("claims").join("wreck_claims.csv")).unwrap();
    assert_eq!(claims.len(), 1);

    let audit = records::load_evidence(
        &tmp.path()
            .join("retrieval")
            .join("valley_claim1_retrieval.csv"),
    )
    .unwrap();
    assert_eq!(audit.records.len(), 2);
    assert!(audit.records.iter().all(|r| r.story_id == "valley"));

    assert!(tmp.path().join("outputs").join("run_summary.json").exists());
}

#[test]
fn test_results_are_appended_across_runs() {
    let tmp = TempDir::new().unwrap();
    let backstories = [backstory("wreck", "Her parents died at sea.")];

    for _ in 0..2 {
        let (embedder, _) = scenario_embedder();
        let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));
        pipeline.run(&backstories, &scenario_chunks()).unwrap();
    }

    let contents =
        std::fs::read_to_string(tmp.path().join("outputs").join("results.csv")).unwrap();
    assert_eq!(contents.matches("story_id,prediction,rationale").count(), 1);
    assert_eq!(CsvTable::parse(&contents).unwrap().len(), 2);
}

#[test]
fn test_no_claims_makes_no_embedding_call() {
    let tmp = TempDir::new().unwrap();
    let (embedder, calls) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    let report = pipeline
        .run(&[backstory("wreck", "Too short. Tiny.")], &scenario_chunks())
        .unwrap();

    assert_eq!(report.verdicts[0].rationale, "no claims extracted");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_index_failure_is_contained_to_its_story() {
    let tmp = TempDir::new().unwrap();
    let (mut embedder, _) = scenario_embedder();
    embedder
        .table
        .insert("A three dimensional oddity".to_string(), vec![1.0, 0.0, 0.0]);
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    let mut chunks = scenario_chunks();
    chunks.push(chunk("broken", 1, SHIPWRECK));
    chunks.push(chunk("broken", 2, "A three dimensional oddity"));

    let report = pipeline
        .run(
            &[
                backstory("broken", "Her parents died at sea."),
                backstory("wreck", "Her parents died at sea."),
            ],
            &chunks,
        )
        .unwrap();

    assert_eq!(report.verdicts[0].label, Label::Contradictory);
    assert_eq!(
        report.verdicts[0].rationale,
        "index build failed: dimension mismatch: expected 2, got 3"
    );
    assert_eq!(report.verdicts[1].label, Label::Consistent);
    assert_eq!(report.summary.index_failures, vec!["broken".to_string()]);
}

#[test]
fn test_unembeddable_chunk_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let (embedder, _) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    let mut chunks = scenario_chunks();
    chunks.push(chunk("wreck", 3, "text the table has never seen"));

    let report = pipeline
        .run(&[backstory("wreck", "Her parents died at sea.")], &chunks)
        .unwrap();
    assert_eq!(report.verdicts[0].label, Label::Consistent);
    assert_eq!(report.summary.failed_embeddings, 1);
}

#[test]
fn test_cancelled_run_produces_no_verdicts() {
    let tmp = TempDir::new().unwrap();
    let (embedder, calls) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));
    pipeline.cancel_handle().store(true, Ordering::SeqCst);

    let report = pipeline
        .run(&[backstory("wreck", "Her parents died at sea.")], &scenario_chunks())
        .unwrap();

    assert!(report.verdicts.is_empty());
    assert_eq!(report.summary.cancelled_stories, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_thread_count_does_not_change_results() {
    let chunks: Vec<Chunk> = (1..=6)
        .flat_map(|story| {
            let id = format!("story{}", story);
            (1..=4).map(move |n| {
                chunk(
                    &id,
                    n,
                    &format!("chapter {} of {} where the crew sails north", n, id),
                )
            })
        })
        .collect();
    let backstories: Vec<Backstory> = (1..=6)
        .rev()
        .map(|story| {
            backstory(
                &format!("story{}", story),
                "The crew sails north in chapter two. Nobody contradicts the captain.",
            )
        })
        .collect();

    let mut runs = Vec::new();
    for threads in [1, 4] {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(tmp.path());
        config.run.threads = threads;
        let pipeline = Pipeline::new(config, Box::new(StubEmbedder::new()));
        runs.push(pipeline.run(&backstories, &chunks).unwrap().verdicts);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0][0].story_id, "story6");
}

#[test]
fn test_repeated_story_gets_separate_audit_files() {
    let tmp = TempDir::new().unwrap();
    let (embedder, _) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    pipeline
        .run(
            &[
                backstory("wreck", "Her parents died at sea."),
                backstory("wreck", "She grew up in the valley."),
            ],
            &scenario_chunks(),
        )
        .unwrap();

    let retrieval = tmp.path().join("retrieval");
    assert!(retrieval.join("wreck_1_claim1_retrieval.csv").exists());
    assert!(retrieval.join("wreck_2_claim1_retrieval.csv").exists());
}

#[test]
fn test_saved_audits_redecide_per_backstory() {
    let tmp = TempDir::new().unwrap();
    let (embedder, _) = scenario_embedder();
    let pipeline = Pipeline::new(config_in(tmp.path()), Box::new(embedder));

    let report = pipeline
        .run(
            &[
                backstory("wreck", "Her parents died at sea."),
                backstory("wreck", "She grew up in the valley."),
            ],
            &scenario_chunks(),
        )
        .unwrap();

    let mut files: Vec<_> = std::fs::read_dir(tmp.path().join("retrieval"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();

    let engine = VerdictEngine::from_config(&pipeline.config().verdict);
    let (verdicts, skipped) = decide_audits(&engine, &files).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(verdicts.len(), 2);
    assert_eq!(verdicts, report.verdicts);
}
