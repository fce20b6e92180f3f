//! Chunk command - split a books directory or zip archive into the chunk CSV

use anyhow::Result;
use std::path::Path;

use canon::chunking;
use canon::records;

pub fn execute(
    books: &Path,
    out: &Path,
    words: Option<usize>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let words = words.unwrap_or(config.chunking.words_per_chunk);
    if words == 0 {
        anyhow::bail!("--words must be a positive integer");
    }

    let chunks = chunking::chunk_books(books, words)?;
    records::write_chunks(out, &chunks)?;

    let stories: std::collections::BTreeSet<_> = chunks.iter().map(|c| &c.story_id).collect();
    println!(
        "Wrote {} chunks from {} stories to {}",
        chunks.len(),
        stories.len(),
        out.display()
    );
    Ok(())
}
