//! Verdict cascade scenarios over aggregated evidence

use canon::evidence::aggregate;
use canon::records::{EvidenceRecord, Label};
use canon::verdict::{Vocabulary, VerdictEngine};

fn evidence(claim_id: u32, chunk: u32, similarity: f32, text: &str) -> EvidenceRecord {
    EvidenceRecord {
        claim_id,
        story_id: "castaways".to_string(),
        chunk_id: format!("castaways_chunk{}", chunk),
        chunk_number: chunk,
        similarity,
        text: text.to_string(),
    }
}

fn decide(records: Vec<EvidenceRecord>) -> (Label, String) {
    let mut sets = aggregate(records);
    let verdict = VerdictEngine::default().decide(&sets.take("castaways"));
    assert_eq!(verdict.story_id, "castaways");
    (verdict.label, verdict.rationale)
}

#[test]
fn test_empty_evidence_law() {
    assert_eq!(
        decide(Vec::new()),
        (Label::Contradictory, "no supporting evidence found".to_string())
    );
}

#[test]
fn test_contradiction_precedes_strong_similarity() {
    let (label, rationale) = decide(vec![
        evidence(1, 1, 0.99, "this aligns perfectly"),
        evidence(2, 2, 0.10, "this directly contradicts the claim"),
    ]);
    assert_eq!(label, Label::Contradictory);
    assert_eq!(rationale, "contradiction found in evidence chunk castaways_chunk2");
}

#[test]
fn test_threshold_boundary() {
    let (at, _) = decide(vec![evidence(1, 1, 0.75, "the ship left port")]);
    assert_eq!(at, Label::Consistent);

    let (below, rationale) = decide(vec![evidence(1, 1, 0.7499, "the ship left port")]);
    assert_eq!(below, Label::Contradictory);
    assert_eq!(rationale, "insufficient supporting evidence; leaning contradict");
}

#[test]
fn test_strong_match_rationale() {
    let (label, rationale) = decide(vec![
        evidence(1, 3, 0.42, "a storm gathered"),
        evidence(2, 7, 0.9, "she was raised by her uncle"),
    ]);
    assert_eq!(label, Label::Consistent);
    assert_eq!(
        rationale,
        "strong supporting evidence (similarity=0.90) in chunk castaways_chunk7"
    );
}

#[test]
fn test_keyword_only_support() {
    let (label, rationale) = decide(vec![
        evidence(1, 1, 0.31, "rain over the harbour"),
        evidence(1, 4, 0.52, "the ledger confirms the voyage"),
    ]);
    assert_eq!(label, Label::Consistent);
    assert_eq!(rationale, "supportive language found in evidence chunk castaways_chunk4");
}

#[test]
fn test_repeated_chunk_counts_per_claim() {
    let records = vec![
        evidence(1, 2, 0.4, "plain"),
        evidence(2, 2, 0.4, "plain"),
        evidence(3, 2, 0.4, "plain"),
    ];
    let sets = aggregate(records);
    assert_eq!(sets.get("castaways").map(|s| s.len()), Some(3));
}

#[test]
fn test_verdict_is_independent_of_claim_order() {
    let forward = vec![
        evidence(1, 1, 0.5, "plain text"),
        evidence(2, 2, 0.6, "more plain text"),
    ];
    let mut backward = forward.clone();
    backward.reverse();
    assert_eq!(decide(forward).0, decide(backward).0);
}

#[test]
fn test_configured_vocabulary_replaces_defaults() {
    let engine = VerdictEngine::new(
        Vocabulary::new(["corroborates"]),
        Vocabulary::new(["refutes"]),
        0.8,
    );
    let mut sets = aggregate(vec![evidence(1, 1, 0.2, "the log corroborates her story")]);
    let verdict = engine.decide(&sets.take("castaways"));
    assert_eq!(verdict.label, Label::Consistent);

    let mut sets = aggregate(vec![evidence(1, 1, 0.2, "this contradicts nothing we know")]);
    let verdict = engine.decide(&sets.take("castaways"));
    assert_eq!(
        verdict.rationale,
        "insufficient supporting evidence; leaning contradict"
    );
}
