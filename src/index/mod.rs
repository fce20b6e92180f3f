//! Story index - one vector store per story, built on demand
//!
//! An index is an explicit value owned by the caller. It only ever holds the
//! chunks of the story it was built for and is dropped once that story's
//! backstories have been decided.

use crate::embeddings::EmbeddingEngine;
use crate::error::{CanonError, Result};
use crate::records::Chunk;
use crate::store::{Metric, VectorStore};

/// Vector store plus the chunk metadata behind each stored row
#[derive(Debug, Clone)]
pub struct StoryIndex {
    story_id: String,
    /// Row `i` of the store is `chunks[i]`
    chunks: Vec<Chunk>,
    store: VectorStore,
    failed_embeddings: usize,
}

impl StoryIndex {
    /// Build the index for `story_id` from a mixed collection of chunks
    ///
    /// Chunks of other stories are ignored; the story's chunks keep their
    /// relative order as insertion order. Each chunk is embedded once, batched
    /// when the engine allows it. A chunk whose embedding fails is left out of
    /// the index rather than failing the story.
    ///
    /// # Errors
    /// - `MissingStoryChunks` when no chunk belongs to the story
    /// - `IndexBuildFailure` when the embeddings cannot form one store
    ///   (e.g. mixed dimensions)
    pub fn for_story(
        story_id: &str,
        all_chunks: &[Chunk],
        embedder: &mut dyn EmbeddingEngine,
        metric: Metric,
    ) -> Result<Self> {
        let story_chunks: Vec<&Chunk> = all_chunks
            .iter()
            .filter(|c| c.story_id == story_id)
            .collect();

        if story_chunks.is_empty() {
            return Err(CanonError::MissingStoryChunks {
                story_id: story_id.to_string(),
            });
        }

        let embeddings = embed_chunks(&story_chunks, embedder);

        let mut chunks = Vec::with_capacity(story_chunks.len());
        let mut vectors = Vec::with_capacity(story_chunks.len());
        let mut failed_embeddings = 0;

        for (chunk, embedding) in story_chunks.into_iter().zip(embeddings) {
            match embedding {
                Ok(vector) => {
                    vectors.push((chunk.chunk_id.clone(), vector));
                    chunks.push(chunk.clone());
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    failed_embeddings += 1;
                }
            }
        }

        let store =
            VectorStore::build(metric, vectors).map_err(|e| CanonError::IndexBuildFailure {
                story_id: story_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "Indexed story {}: {} chunks ({} failed embeddings)",
            story_id,
            store.len(),
            failed_embeddings
        );

        Ok(Self {
            story_id: story_id.to_string(),
            chunks,
            store,
            failed_embeddings,
        })
    }

    /// An index with no chunks, used when a story has nothing to search
    pub fn empty(story_id: &str, metric: Metric) -> Self {
        Self {
            story_id: story_id.to_string(),
            chunks: Vec::new(),
            store: VectorStore::empty(metric),
            failed_embeddings: 0,
        }
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Chunk stored at insertion index `index`
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks left out because their embedding failed
    pub fn failed_embeddings(&self) -> usize {
        self.failed_embeddings
    }
}

/// Embed chunk texts, one result per chunk in input order
///
/// Tries one batch call first. If the batch fails as a whole (or returns the
/// wrong number of vectors) every chunk is retried on its own so one bad chunk
/// only costs itself.
fn embed_chunks(
    chunks: &[&Chunk],
    embedder: &mut dyn EmbeddingEngine,
) -> Vec<Result<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    match embedder.embed_batch(&texts) {
        Ok(vectors) if vectors.len() == chunks.len() => chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| check_vector(&chunk.chunk_id, vector))
            .collect(),
        Ok(vectors) => {
            tracing::warn!(
                "Batch embedding returned {} vectors for {} chunks; retrying one by one",
                vectors.len(),
                chunks.len()
            );
            embed_individually(chunks, embedder)
        }
        Err(e) => {
            tracing::warn!("Batch embedding failed ({}); retrying one by one", e);
            embed_individually(chunks, embedder)
        }
    }
}

fn embed_individually(
    chunks: &[&Chunk],
    embedder: &mut dyn EmbeddingEngine,
) -> Vec<Result<Vec<f32>>> {
    chunks
        .iter()
        .map(|chunk| {
            embedder
                .embed_passage(&chunk.text)
                .map_err(|e| CanonError::embedding(format!("chunk {}", chunk.chunk_id), e))
                .and_then(|vector| check_vector(&chunk.chunk_id, vector))
        })
        .collect()
}

/// Reject vectors the store could never use
///
/// Dimension agreement is left to the store so a story with mixed dimensions
/// fails as a whole.
fn check_vector(chunk_id: &str, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(CanonError::embedding(
            format!("chunk {}", chunk_id),
            "empty vector",
        ));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(CanonError::embedding(
            format!("chunk {}", chunk_id),
            "non-finite components",
        ));
    }
    Ok(vector)
}
