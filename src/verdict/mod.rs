//! Verdict engine - conservative rule cascade over aggregated evidence
//!
//! Rules are tried in order and the first match wins:
//! 1. no evidence                         -> contradictory
//! 2. any contradiction keyword           -> contradictory
//! 3. max similarity >= strong threshold  -> consistent
//! 4. any support keyword                 -> consistent
//! 5. otherwise                           -> contradictory
//!
//! Contradiction is checked before any supporting signal and the fallback is
//! "contradictory", so an unverified backstory is rejected rather than accepted.

mod vocabulary;

pub use vocabulary::Vocabulary;

use crate::config::VerdictSection;
use crate::evidence::EvidenceSet;
use crate::records::{EvidenceRecord, Label, Verdict};

pub const DEFAULT_STRONG_THRESHOLD: f32 = 0.75;

pub const DEFAULT_SUPPORT_KEYWORDS: [&str; 7] = [
    "supports",
    "matches",
    "aligns",
    "consistent",
    "similar",
    "reinforces",
    "confirms",
];

pub const DEFAULT_CONTRADICTION_KEYWORDS: [&str; 7] = [
    "contradict",
    "conflicts",
    "denies",
    "inconsistent",
    "opposite",
    "breaks",
    "contradiction",
];

pub const NO_CLAIMS: &str = "no claims extracted";
pub const NO_EVIDENCE: &str = "no supporting evidence found";
pub const FALLBACK: &str = "insufficient supporting evidence; leaning contradict";

/// Deterministic, side-effect-free decision rule
#[derive(Debug, Clone)]
pub struct VerdictEngine {
    support: Vocabulary,
    contradiction: Vocabulary,
    strong_threshold: f32,
}

impl Default for VerdictEngine {
    fn default() -> Self {
        Self::new(
            Vocabulary::new(DEFAULT_SUPPORT_KEYWORDS),
            Vocabulary::new(DEFAULT_CONTRADICTION_KEYWORDS),
            DEFAULT_STRONG_THRESHOLD,
        )
    }
}

impl VerdictEngine {
    pub fn new(support: Vocabulary, contradiction: Vocabulary, strong_threshold: f32) -> Self {
        Self {
            support,
            contradiction,
            strong_threshold,
        }
    }

    pub fn from_config(section: &VerdictSection) -> Self {
        Self::new(
            Vocabulary::new(&section.support_keywords),
            Vocabulary::new(&section.contradiction_keywords),
            section.strong_threshold,
        )
    }

    pub fn strong_threshold(&self) -> f32 {
        self.strong_threshold
    }

    /// Decide one story's evidence
    pub fn decide(&self, evidence: &EvidenceSet) -> Verdict {
        let story_id = evidence.story_id();
        let (label, rationale) = self.cascade(evidence.records());
        tracing::debug!("Story {} -> {} ({})", story_id, label, rationale);
        Verdict::new(story_id, label, rationale)
    }

    fn cascade(&self, records: &[EvidenceRecord]) -> (Label, String) {
        if records.is_empty() {
            return (Label::Contradictory, NO_EVIDENCE.to_string());
        }

        if let Some(r) = records.iter().find(|r| self.contradiction.matches(&r.text)) {
            return (
                Label::Contradictory,
                format!("contradiction found in evidence chunk {}", r.chunk_id),
            );
        }

        // First occurrence wins among equal maxima
        let best = records
            .iter()
            .fold(None::<&EvidenceRecord>, |best, r| match best {
                Some(b) if b.similarity >= r.similarity => Some(b),
                _ => Some(r),
            });
        if let Some(best) = best {
            if best.similarity >= self.strong_threshold {
                return (
                    Label::Consistent,
                    format!(
                        "strong supporting evidence (similarity={:.2}) in chunk {}",
                        best.similarity, best.chunk_id
                    ),
                );
            }
        }

        if let Some(r) = records.iter().find(|r| self.support.matches(&r.text)) {
            return (
                Label::Consistent,
                format!("supportive language found in evidence chunk {}", r.chunk_id),
            );
        }

        (Label::Contradictory, FALLBACK.to_string())
    }

    /// Verdict for a backstory that produced no claims
    pub fn no_claims(&self, story_id: &str) -> Verdict {
        Verdict::new(story_id, Label::Contradictory, NO_CLAIMS)
    }

    /// Verdict for a story whose index could not be built
    pub fn index_failure(&self, story_id: &str, reason: &str) -> Verdict {
        Verdict::new(
            story_id,
            Label::Contradictory,
            format!("index build failed: {}", reason),
        )
    }
}
