//! Decide command - re-run the verdict cascade over saved retrieval audits
//!
//! Accepts audit CSV files or directories of them. Rows are grouped by the
//! backstory key in each file name, so a directory written by `canon run`
//! reproduces one verdict per backstory.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use canon::pipeline::{self, AUDIT_SUFFIX};
use canon::records::{self, csv};
use canon::verdict::VerdictEngine;

pub fn execute(evidence: &[PathBuf], config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let engine = VerdictEngine::from_config(&config.verdict);

    let files = audit_files(evidence)?;
    if files.is_empty() {
        anyhow::bail!("No retrieval audit files found");
    }

    let (verdicts, skipped) = pipeline::decide_audits(&engine, &files)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdicts)?);
    } else {
        println!("{}", csv::format_row(&records::RESULTS_HEADER));
        for v in &verdicts {
            println!(
                "{}",
                csv::format_row(&[v.story_id.clone(), v.label.as_u8().to_string(), v.rationale.clone()])
            );
        }
    }
    if !skipped.is_empty() {
        tracing::warn!("Skipped {} malformed evidence rows", skipped.len());
    }
    Ok(())
}

/// Expand directories into their audit files, sorted
fn audit_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| p.to_string_lossy().ends_with(AUDIT_SUFFIX)),
            );
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            anyhow::bail!("Evidence path not found: {}", input.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
