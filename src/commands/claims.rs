//! Claims command - write per-backstory claim files without running retrieval

use anyhow::Result;
use std::path::Path;

use canon::claims::claims_for;
use canon::config::OutputSection;
use canon::pipeline::{artifact_keys, OutputSink};
use canon::records;

pub fn execute(backstories: &Path, out_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let loaded = records::load_backstories(backstories)?;
    let sink = OutputSink::new(OutputSection {
        claims_dir: out_dir.to_path_buf(),
        ..config.output.clone()
    });

    let keys = artifact_keys(&loaded.records);
    let mut written = 0;
    for (backstory, key) in loaded.records.iter().zip(&keys) {
        let claims = claims_for(backstory, config.claims.min_claim_chars);
        sink.write_claims(key, &claims)?;
        written += claims.len();
    }

    println!(
        "Wrote {} claims for {} backstories to {}",
        written,
        loaded.records.len(),
        out_dir.display()
    );
    if !loaded.skipped.is_empty() {
        println!("Skipped {} malformed backstory rows", loaded.skipped.len());
    }
    Ok(())
}
