use tempfile::TempDir;

use super::*;
use crate::types::ChunkInput;
use crate::types::ChunkKind;
use crate::types::content_hash;
use crate::types::stable_chunk_uid;

/// Chain D -> C -> B -> A, one edge each. Returns ids keyed a, b, c, d.
async fn chain(store: &Store) -> (i64, i64, i64, i64) {
    let file_id = store
        .upsert_file("src/chain.ts", "typescript", "h", 1)
        .await
        .unwrap();
    let chunks: Vec<ChunkInput> = ["a", "b", "c", "d"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let line = (i as i32) * 10 + 1;
            let text = format!("function {name}() {{}}");
            ChunkInput {
                kind: ChunkKind::Function,
                name: Some(name.to_string()),
                parent: None,
                line_start: line,
                line_end: line + 2,
                language: "typescript".to_string(),
                chunk_uid: stable_chunk_uid("src/chain.ts", line, line + 2),
                content_hash: content_hash(&text),
                text,
                imports: Vec::new(),
                exported: false,
            }
        })
        .collect();
    let ids = store.insert_chunks(file_id, &chunks).await.unwrap();
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    store.insert_dep(d, c, "imports").await.unwrap();
    store.insert_dep(c, b, "imports").await.unwrap();
    store.insert_dep(b, a, "imports").await.unwrap();
    (a, b, c, d)
}

#[tokio::test]
async fn test_depth_one_yields_direct_neighbors() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("index.db"), Some(4)).unwrap();
    let (_a, _b, c, d) = chain(&store).await;

    let results = dep_trace(&store, d, Direction::Imports, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, c);
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn test_deep_trace_has_decreasing_scores_in_bfs_order() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("index.db"), Some(4)).unwrap();
    let (a, b, c, d) = chain(&store).await;

    let results = dep_trace(&store, d, Direction::Imports, 3).await.unwrap();
    let ids: Vec<i64> = results.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![c, b, a]);

    let scores: Vec<f32> = results.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![1.0, 0.8, 0.6]);
    assert!(scores.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn test_imported_by_walks_reverse_edges() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("index.db"), Some(4)).unwrap();
    let (a, b, c, _d) = chain(&store).await;

    let results = dep_trace(&store, a, Direction::ImportedBy, 2).await.unwrap();
    let ids: Vec<i64> = results.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![b, c]);
}

#[tokio::test]
async fn test_cycles_terminate() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("index.db"), Some(4)).unwrap();
    let (a, b, _c, _d) = chain(&store).await;
    // Close a cycle: a -> b while b -> a already exists.
    store.insert_dep(a, b, "imports").await.unwrap();

    let results = dep_trace(&store, a, Direction::Imports, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, b);
}

#[tokio::test]
async fn test_early_termination_when_frontier_empties() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("index.db"), Some(4)).unwrap();
    let (a, _b, _c, _d) = chain(&store).await;

    // `a` has no outgoing edges at all.
    let results = dep_trace(&store, a, Direction::Imports, 5).await.unwrap();
    assert!(results.is_empty());
}
