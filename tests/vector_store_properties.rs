//! Vector store and story index properties: K-bound, ordering, ties, scope

use canon::embeddings::StubEmbedder;
use canon::index::StoryIndex;
use canon::records::{Chunk, Claim};
use canon::retrieval::retrieve;
use canon::store::{Metric, VectorStore};

fn chunk(story: &str, n: u32, text: &str) -> Chunk {
    Chunk::new(story, Chunk::make_id(story, n), n, text).unwrap()
}

fn library() -> Vec<Chunk> {
    vec![
        chunk("castaways", 1, "the ship struck the reef at night"),
        chunk("monte", 1, "the prisoner tunnelled out of the chateau"),
        chunk("castaways", 2, "the survivors built a hut from the wreck"),
        chunk("monte", 2, "treasure was hidden on the island"),
        chunk("castaways", 3, "the engineer made fire with a watch glass"),
    ]
}

#[test]
fn test_k_bound_holds_for_every_k() {
    let chunks = library();
    let mut embedder = StubEmbedder::new();
    let index = StoryIndex::for_story("castaways", &chunks, &mut embedder, Metric::Cosine).unwrap();
    let claim = Claim::new("castaways", 1, "The survivors were shipwrecked on a reef").unwrap();

    for k in 1..=6 {
        let records = retrieve(&claim, &index, k, &mut embedder);
        assert_eq!(records.len(), k.min(3), "k = {}", k);
    }
}

#[test]
fn test_evidence_never_leaves_its_story() {
    let chunks = library();
    let mut embedder = StubEmbedder::new();
    let index = StoryIndex::for_story("monte", &chunks, &mut embedder, Metric::Cosine).unwrap();
    // Worded to match a castaways chunk
    let claim = Claim::new("monte", 1, "the survivors built a hut from the wreck").unwrap();

    let records = retrieve(&claim, &index, 10, &mut embedder);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.story_id == "monte"));
    assert!(records.iter().all(|r| r.chunk_id.starts_with("monte_chunk")));
}

#[test]
fn test_results_are_best_first() {
    let chunks = library();
    let mut embedder = StubEmbedder::new();
    let index = StoryIndex::for_story("castaways", &chunks, &mut embedder, Metric::Cosine).unwrap();
    let claim = Claim::new("castaways", 1, "the engineer made fire").unwrap();

    let records = retrieve(&claim, &index, 3, &mut embedder);
    assert_eq!(records[0].chunk_id, "castaways_chunk3");
    assert!(records.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[test]
fn test_identical_vectors_tie_by_insertion_order() {
    let vectors = (0..5)
        .map(|i| (format!("dup{}", i), vec![0.3, 0.4, 0.5]))
        .collect();
    let store = VectorStore::build(Metric::Cosine, vectors).unwrap();

    let hits = store.query(&[0.3, 0.4, 0.5], 3).unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["dup0", "dup1", "dup2"]);
}

#[test]
fn test_repeated_queries_are_identical() {
    let chunks = library();
    let mut embedder = StubEmbedder::new();
    let index = StoryIndex::for_story("castaways", &chunks, &mut embedder, Metric::L2).unwrap();
    let claim = Claim::new("castaways", 1, "a fire on the island").unwrap();

    let first = retrieve(&claim, &index, 3, &mut embedder);
    let second = retrieve(&claim, &index, 3, &mut embedder);
    assert_eq!(first, second);
}

#[test]
fn test_similarity_stays_on_cosine_scale() {
    let vectors = vec![
        ("a".to_string(), vec![10.0, 0.0]),
        ("b".to_string(), vec![-3.0, 0.0]),
    ];
    for metric in [Metric::Cosine, Metric::L2] {
        let store = VectorStore::build(metric, vectors.clone()).unwrap();
        for hit in store.query(&[1.0, 0.0], 2).unwrap() {
            assert!((-1.0..=1.0).contains(&hit.similarity), "{:?}", metric);
        }
    }
}

#[test]
fn test_l2_returns_the_closest_raw_vector() {
    let vectors = vec![
        ("far".to_string(), vec![0.0, 0.0]),
        ("near".to_string(), vec![5.0, 0.0]),
    ];
    let store = VectorStore::build(Metric::L2, vectors).unwrap();

    let hits = store.query(&[10.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].id, "near");
}
