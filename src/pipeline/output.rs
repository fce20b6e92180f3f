//! Output sink - claims, retrieval audit and results files
//!
//! Layout:
//! - `<claims_dir>/<key>_claims.csv`
//! - `<audit_dir>/<key>_claim<claim_id>_retrieval.csv`
//! - `<results_file>` (appended)
//! - `run_summary.json` next to the results file
//!
//! Keys come from story ids, so path separators and control characters are
//! replaced with `_` before they reach a file name.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RunSummary;
use crate::config::OutputSection;
use crate::records::{
    csv, Claim, EvidenceRecord, Verdict, CLAIM_HEADER, EVIDENCE_HEADER, RESULTS_HEADER,
};

pub const SUMMARY_FILE: &str = "run_summary.json";

/// File name suffix shared by every retrieval audit
pub const AUDIT_SUFFIX: &str = "_retrieval.csv";

/// Artifact key of an audit file, as written by `OutputSink::write_audit`
///
/// `None` for files not named `<key>_claim<id>_retrieval.csv`.
pub fn audit_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (key, claim_id) = name.strip_suffix(AUDIT_SUFFIX)?.rsplit_once("_claim")?;
    let numbered = !claim_id.is_empty() && claim_id.bytes().all(|b| b.is_ascii_digit());
    (numbered && !key.is_empty()).then(|| key.to_string())
}

fn file_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct OutputSink {
    section: OutputSection,
}

impl OutputSink {
    pub fn new(section: OutputSection) -> Self {
        Self { section }
    }

    pub fn claims_path(&self, key: &str) -> PathBuf {
        self.section
            .claims_dir
            .join(format!("{}_claims.csv", file_key(key)))
    }

    pub fn audit_path(&self, key: &str, claim_id: u32) -> PathBuf {
        self.section
            .audit_dir
            .join(format!("{}_claim{}{}", file_key(key), claim_id, AUDIT_SUFFIX))
    }

    pub fn results_path(&self) -> &Path {
        &self.section.results_file
    }

    pub fn summary_path(&self) -> PathBuf {
        match self.section.results_file.parent() {
            Some(dir) => dir.join(SUMMARY_FILE),
            None => PathBuf::from(SUMMARY_FILE),
        }
    }

    /// Write one backstory's claims, replacing an earlier file
    pub fn write_claims(&self, key: &str, claims: &[Claim]) -> Result<()> {
        let rows: Vec<Vec<String>> = claims
            .iter()
            .map(|c| vec![c.story_id.clone(), c.claim_id.to_string(), c.text.clone()])
            .collect();
        csv::write_file(&self.claims_path(key), &CLAIM_HEADER, &rows)
    }

    /// Write the retrieval audit for one claim
    ///
    /// A claim with no evidence still gets a header-only file so the audit
    /// trail shows it was searched.
    pub fn write_audit(&self, key: &str, claim: &Claim, records: &[EvidenceRecord]) -> Result<()> {
        if !self.section.write_audit {
            return Ok(());
        }
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|r| {
                vec![
                    r.claim_id.to_string(),
                    r.story_id.clone(),
                    claim.text.clone(),
                    r.chunk_id.clone(),
                    r.chunk_number.to_string(),
                    r.similarity.to_string(),
                    r.text.clone(),
                ]
            })
            .collect();
        csv::write_file(&self.audit_path(key, claim.claim_id), &EVIDENCE_HEADER, &rows)
    }

    /// Append verdict rows to the results file
    pub fn append_results(&self, verdicts: &[Verdict]) -> Result<()> {
        let rows: Vec<Vec<String>> = verdicts
            .iter()
            .map(|v| {
                vec![
                    v.story_id.clone(),
                    v.label.as_u8().to_string(),
                    v.rationale.clone(),
                ]
            })
            .collect();
        csv::append_rows(&self.section.results_file, &RESULTS_HEADER, &rows)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.summary_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;
        Ok(path)
    }
}
