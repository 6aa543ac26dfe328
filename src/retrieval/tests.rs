use super::*;
use crate::ingestion::chunking::chunk_id;
use crate::session::SessionData;
use std::time::Duration;

fn chunk(index: usize) -> Chunk {
    Chunk {
        id: chunk_id(index * 10),
        text: format!("chunk number {index}"),
        start_offset: index * 10,
        end_offset: index * 10 + 10,
    }
}

fn engine_with(embeddings: Vec<Vec<f32>>) -> RetrievalEngine {
    let store = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    let chunks = (0..embeddings.len()).map(chunk).collect();
    store
        .put(
            "s1",
            SessionData {
                filename: "doc.pdf".to_string(),
                created_at: None,
                chunks,
                embeddings,
            },
        )
        .expect("session should store");
    RetrievalEngine::new(store)
}

#[test]
fn ranks_by_similarity() {
    let engine = engine_with(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]]);

    let results = engine.search(&[1.0, 0.0], "s1", 2);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_index, 0);
    assert_eq!(results[0].rank_index, 0);
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(results[1].chunk_index, 2);
    assert_eq!(results[1].rank_index, 1);
    assert!((results[1].similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
}

#[test]
fn ties_keep_chunk_order() {
    let engine = engine_with(vec![
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![0.0, 2.0],
        vec![2.0, 0.0],
    ]);

    let results = engine.search(&[1.0, 0.0], "s1", 4);
    let order: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();

    assert_eq!(order, vec![1, 3, 0, 2]);
}

#[test]
fn search_is_idempotent() {
    let engine = engine_with(vec![vec![0.3, 0.9], vec![0.5, 0.5], vec![0.9, 0.1]]);

    let first = engine.search(&[0.6, 0.4], "s1", 3);
    let second = engine.search(&[0.6, 0.4], "s1", 3);

    assert_eq!(first, second);
}

#[test]
fn top_k_larger_than_chunk_count_returns_all() {
    let engine = engine_with(vec![vec![1.0], vec![0.5]]);
    assert_eq!(engine.search(&[1.0], "s1", 10).len(), 2);
}

#[test]
fn top_k_zero_returns_nothing() {
    let engine = engine_with(vec![vec![1.0], vec![0.5]]);
    assert!(engine.search(&[1.0], "s1", 0).is_empty());
}

#[test]
fn missing_session_returns_nothing() {
    let engine = engine_with(vec![vec![1.0]]);
    assert!(engine.search(&[1.0], "nope", DEFAULT_TOP_K).is_empty());
}

#[test]
fn try_search_distinguishes_missing_from_empty() {
    let engine = engine_with(Vec::new());

    assert_eq!(engine.try_search(&[1.0, 0.0], "s1", 4), Some(Vec::new()));
    assert_eq!(engine.try_search(&[1.0, 0.0], "missing", 4), None);
}

#[test]
fn huge_components_rank_as_exact_match() {
    let engine = engine_with(vec![vec![0.0, 1.0], vec![1e20, 1.0], vec![1e20, 1e20]]);

    let ranked = engine.search(&[1e20, 1.0], "s1", 3);
    let order: Vec<usize> = ranked.iter().map(|r| r.chunk_index).collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert!(ranked.iter().all(|r| r.similarity.is_finite()));
}

#[test]
fn zero_vectors_rank_last_in_chunk_order() {
    let engine = engine_with(vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]]);

    let results = engine.search(&[0.0, 1.0], "s1", 3);
    let order: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();

    assert_eq!(order, vec![1, 0, 2]);
    assert!(results[1].similarity.abs() < f32::EPSILON);
}

#[test]
fn results_carry_chunk_text() {
    let engine = engine_with(vec![vec![1.0, 0.0]]);
    let results = engine.search(&[1.0, 0.0], "s1", 1);
    assert_eq!(results[0].chunk.id, "chunk_0");
    assert_eq!(results[0].chunk.text, "chunk number 0");
}
