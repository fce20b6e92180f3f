//! Retrieval module - top-K evidence chunks for one claim
//!
//! Public interface:
//! - `retrieve` never fails; problems are logged and yield no evidence
//! - `try_retrieve` reports why a claim produced nothing

use crate::embeddings::EmbeddingEngine;
use crate::error::{CanonError, Result};
use crate::index::StoryIndex;
use crate::records::{Claim, EvidenceRecord};

/// Retrieve up to `k` evidence records for `claim` from its story's index
///
/// An empty or unembeddable claim, or a claim that belongs to another story,
/// yields an empty sequence instead of failing the run.
pub fn retrieve(
    claim: &Claim,
    index: &StoryIndex,
    k: usize,
    embedder: &mut dyn EmbeddingEngine,
) -> Vec<EvidenceRecord> {
    match try_retrieve(claim, index, k, embedder) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(
                "No evidence for claim {} of story {}: {}",
                claim.claim_id,
                claim.story_id,
                e
            );
            Vec::new()
        }
    }
}

/// Like `retrieve`, but surfaces embedding and dimension errors
pub fn try_retrieve(
    claim: &Claim,
    index: &StoryIndex,
    k: usize,
    embedder: &mut dyn EmbeddingEngine,
) -> Result<Vec<EvidenceRecord>> {
    if claim.story_id != index.story_id() {
        tracing::warn!(
            "Claim {} belongs to story {}, not {}; refusing cross-story retrieval",
            claim.claim_id,
            claim.story_id,
            index.story_id()
        );
        return Ok(Vec::new());
    }
    if claim.text.trim().is_empty() || index.is_empty() {
        return Ok(Vec::new());
    }

    let target = format!("claim {} of story {}", claim.claim_id, claim.story_id);
    let embedding = embedder
        .embed_query(&claim.text)
        .map_err(|e| CanonError::embedding(target.clone(), e))?;

    let hits = index
        .store()
        .query(&embedding, k)
        .map_err(|e| CanonError::embedding(target, e))?;

    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(chunk) = index.chunk(hit.index) else {
            continue;
        };
        records.push(EvidenceRecord {
            claim_id: claim.claim_id,
            story_id: chunk.story_id.clone(),
            chunk_id: chunk.chunk_id.clone(),
            chunk_number: chunk.chunk_number,
            similarity: hit.similarity,
            text: chunk.text.clone(),
        });
    }

    tracing::debug!(
        "Claim {} of story {}: {} evidence chunks",
        claim.claim_id,
        claim.story_id,
        records.len()
    );
    Ok(records)
}
