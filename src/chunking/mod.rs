//! Chunking module - split story texts into fixed-size word windows
//!
//! Each `.txt` file under a books directory, or inside a books `.zip`
//! archive, is one story; its file stem is the story id. Windows are
//! `words_per_chunk` whitespace-separated words joined by single spaces,
//! numbered from 1.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::records::Chunk;

pub const DEFAULT_WORDS_PER_CHUNK: usize = 350;

/// Split one story's text into chunks
///
/// Text with no words yields no chunks. A `words_per_chunk` of 0 is treated
/// as 1.
pub fn chunk_text(story_id: &str, text: &str, words_per_chunk: usize) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = words_per_chunk.max(1);

    words
        .chunks(size)
        .zip(1u32..)
        .map(|(window, number)| Chunk {
            story_id: story_id.to_string(),
            chunk_id: Chunk::make_id(story_id, number),
            chunk_number: number,
            text: window.join(" "),
        })
        .collect()
}

/// Read a story file as UTF-8, falling back to Latin-1
pub fn read_story_text(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read story: {}", path.display()))?;
    Ok(decode_story(bytes, &path.display().to_string()))
}

fn decode_story(bytes: Vec<u8>, name: &str) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("{} is not UTF-8, decoding as Latin-1", name);
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    }
}

fn is_story_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn story_id(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().trim().to_string();
    (!stem.is_empty()).then_some(stem)
}

/// Story files under `dir`, keyed by story id
///
/// When two files share a stem the first path in sorted order wins.
pub fn discover_stories(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Books directory not found: {}", dir.display());
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_story_file(p))
        .collect();
    paths.sort();

    let mut stories: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in paths {
        let Some(stem) = story_id(&path) else {
            continue;
        };
        if let Some(existing) = stories.get(&stem) {
            tracing::warn!(
                "Duplicate story id '{}': keeping {}, ignoring {}",
                stem,
                existing.display(),
                path.display()
            );
            continue;
        }
        stories.insert(stem, path);
    }
    Ok(stories)
}

/// Chunk every story under `dir`, stories in story id order
pub fn chunk_directory(dir: &Path, words_per_chunk: usize) -> Result<Vec<Chunk>> {
    let stories = discover_stories(dir)?;
    tracing::info!("Chunking {} stories from {}", stories.len(), dir.display());

    let mut chunks = Vec::new();
    for (story_id, path) in &stories {
        let text = read_story_text(path)?;
        chunks.extend(chunk_story(story_id, &text, words_per_chunk));
    }
    Ok(chunks)
}

/// Chunk every `.txt` entry of a zip archive, stories in story id order
///
/// Entries are read in memory, never extracted. When two entries share a stem
/// the first entry path in sorted order wins.
pub fn chunk_archive(archive_path: &Path, words_per_chunk: usize) -> Result<Vec<Chunk>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", archive_path.display()))?;

    let mut entries: Vec<(PathBuf, usize)> = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let Some(name) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        if entry.is_file() && is_story_file(&name) {
            entries.push((name, i));
        }
    }
    entries.sort();

    let mut stories: BTreeMap<String, usize> = BTreeMap::new();
    for (name, i) in &entries {
        let Some(stem) = story_id(name) else {
            continue;
        };
        if stories.contains_key(&stem) {
            tracing::warn!("Duplicate story id '{}': ignoring {}", stem, name.display());
            continue;
        }
        stories.insert(stem, *i);
    }
    tracing::info!(
        "Chunking {} stories from {}",
        stories.len(),
        archive_path.display()
    );

    let mut chunks = Vec::new();
    for (story_id, i) in stories {
        let mut entry = archive.by_index(i)?;
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read {} from archive", entry.name()))?;
        let text = decode_story(bytes, entry.name());
        chunks.extend(chunk_story(&story_id, &text, words_per_chunk));
    }
    Ok(chunks)
}

/// Chunk a books directory or a `.zip` archive of story files
pub fn chunk_books(books: &Path, words_per_chunk: usize) -> Result<Vec<Chunk>> {
    let is_zip = books
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip && books.is_file() {
        chunk_archive(books, words_per_chunk)
    } else {
        chunk_directory(books, words_per_chunk)
    }
}

fn chunk_story(story_id: &str, text: &str, words_per_chunk: usize) -> Vec<Chunk> {
    let story_chunks = chunk_text(story_id, text, words_per_chunk);
    if story_chunks.is_empty() {
        tracing::warn!("Story {} has no text", story_id);
    }
    tracing::debug!("Story {}: {} chunks", story_id, story_chunks.len());
    story_chunks
}
