//! Records module - typed rows and their CSV boundary
//!
//! Loaders never fail on a bad row. Rows missing a required field are dropped
//! and reported as a `SkipReason`; only an unreadable or unparsable file is an
//! error.

pub mod csv;
mod types;

pub use types::{Backstory, Chunk, Claim, EvidenceRecord, Label, SkipReason, Verdict};

use anyhow::Result;
use std::path::Path;

use self::csv::{field, CsvTable};
use crate::error::CanonError;

pub const CHUNK_HEADER: [&str; 4] = ["story_id", "chunk_id", "chunk_number", "text"];
pub const CLAIM_HEADER: [&str; 3] = ["story_id", "claim_id", "claim"];
pub const RESULTS_HEADER: [&str; 3] = ["story_id", "prediction", "rationale"];
pub const EVIDENCE_HEADER: [&str; 7] = [
    "claim_id",
    "story_id",
    "claim",
    "chunk_id",
    "chunk_number",
    "similarity",
    "text",
];

/// Rows that survived validation plus the ones that did not
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkipReason>,
}

impl<T> Loaded<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn push(&mut self, source: &str, record: usize, row: std::result::Result<T, CanonError>) {
        match row {
            Ok(value) => self.records.push(value),
            Err(e) => {
                tracing::warn!("Skipping {} record {}: {}", source, record, e);
                self.skipped.push(SkipReason {
                    source: source.to_string(),
                    record,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Load chunk rows (`story_id,chunk_id,chunk_number,text`)
pub fn load_chunks(path: &Path) -> Result<Loaded<Chunk>> {
    let table = CsvTable::read(path)?;
    Ok(chunks_from_table(&table, &source_name(path)))
}

fn chunks_from_table(table: &CsvTable, source: &str) -> Loaded<Chunk> {
    let story_col = table.column(&["story_id"]);
    let id_col = table.column(&["chunk_id"]);
    let number_col = table.column(&["chunk_number"]);
    let text_col = table.column(&["text"]);

    let mut loaded = Loaded::new();
    for (n, row) in table.rows() {
        let parsed = (|| -> std::result::Result<_, CanonError> {
            let story_id = require(row, story_col, "chunk", "story_id")?;
            let chunk_id = require(row, id_col, "chunk", "chunk_id")?;
            let number = parse_number(require(row, number_col, "chunk", "chunk_number")?, "chunk")?;
            let text = field(row, text_col)
                .ok_or_else(|| CanonError::malformed("chunk", "missing text"))?;
            Chunk::new(story_id, chunk_id, number, text)
        })();
        loaded.push(source, n, parsed);
    }
    loaded
}

/// Load backstory rows
///
/// The identifier column may be named `story_id` or `id`; extra columns such
/// as a gold `label` are ignored.
pub fn load_backstories(path: &Path) -> Result<Loaded<Backstory>> {
    let table = CsvTable::read(path)?;
    Ok(backstories_from_table(&table, &source_name(path)))
}

fn backstories_from_table(table: &CsvTable, source: &str) -> Loaded<Backstory> {
    let id_col = table.column(&["story_id", "id"]);
    let content_col = table.column(&["content", "backstory"]);

    let mut loaded = Loaded::new();
    for (n, row) in table.rows() {
        let parsed = (|| -> std::result::Result<_, CanonError> {
            let story_id = require(row, id_col, "backstory", "story_id")?;
            let content = field(row, content_col)
                .ok_or_else(|| CanonError::malformed("backstory", "missing content"))?;
            Backstory::new(story_id, content)
        })();
        loaded.push(source, n, parsed);
    }
    loaded
}

/// Load evidence rows previously written as retrieval audit files
pub fn load_evidence(path: &Path) -> Result<Loaded<EvidenceRecord>> {
    let table = CsvTable::read(path)?;
    Ok(evidence_from_table(&table, &source_name(path)))
}

fn evidence_from_table(table: &CsvTable, source: &str) -> Loaded<EvidenceRecord> {
    let claim_col = table.column(&["claim_id"]);
    let story_col = table.column(&["story_id"]);
    let chunk_col = table.column(&["chunk_id"]);
    let number_col = table.column(&["chunk_number"]);
    let sim_col = table.column(&["similarity", "similarity_score"]);
    let text_col = table.column(&["text"]);

    let mut loaded = Loaded::new();
    for (n, row) in table.rows() {
        let parsed = (|| -> std::result::Result<_, CanonError> {
            let claim_id = parse_number(require(row, claim_col, "evidence", "claim_id")?, "evidence")?;
            let story_id = require(row, story_col, "evidence", "story_id")?;
            let chunk_id = require(row, chunk_col, "evidence", "chunk_id")?;
            let chunk_number =
                parse_number(require(row, number_col, "evidence", "chunk_number")?, "evidence")?;
            let raw = require(row, sim_col, "evidence", "similarity")?;
            let similarity = raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|s| s.is_finite())
                .ok_or_else(|| {
                    CanonError::malformed("evidence", format!("invalid similarity '{}'", raw))
                })?;
            Ok(EvidenceRecord {
                claim_id,
                story_id: story_id.to_string(),
                chunk_id: chunk_id.to_string(),
                chunk_number,
                similarity,
                text: field(row, text_col).unwrap_or_default().to_string(),
            })
        })();
        loaded.push(source, n, parsed);
    }
    loaded
}

/// Write the chunk CSV consumed by `load_chunks`
pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let rows: Vec<Vec<String>> = chunks
        .iter()
        .map(|c| {
            vec![
                c.story_id.clone(),
                c.chunk_id.clone(),
                c.chunk_number.to_string(),
                c.text.clone(),
            ]
        })
        .collect();
    csv::write_file(path, &CHUNK_HEADER, &rows)
}

fn require<'a>(
    row: &'a [String],
    column: Option<usize>,
    kind: &'static str,
    name: &str,
) -> std::result::Result<&'a str, CanonError> {
    match field(row, column) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CanonError::malformed(kind, format!("missing {}", name))),
    }
}

fn parse_number(raw: &str, kind: &'static str) -> std::result::Result<u32, CanonError> {
    let trimmed = raw.trim();
    // Numbers written by pandas may carry a trailing ".0"
    let integral = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    integral
        .parse()
        .map_err(|_| CanonError::malformed(kind, format!("invalid number '{}'", raw)))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
