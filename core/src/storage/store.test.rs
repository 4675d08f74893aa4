use tempfile::TempDir;

use super::*;
use crate::types::content_hash;
use crate::types::stable_chunk_uid;

fn open_store(dir: &TempDir, dimension: Option<i32>) -> Store {
    Store::open(&dir.path().join("index.db"), dimension).unwrap()
}

fn chunk_input(kind: ChunkKind, name: Option<&str>, line_start: i32, line_end: i32) -> ChunkInput {
    let text = format!("body of {}", name.unwrap_or("anon"));
    ChunkInput {
        kind,
        name: name.map(String::from),
        parent: None,
        line_start,
        line_end,
        language: "typescript".to_string(),
        text: text.clone(),
        imports: Vec::new(),
        exported: false,
        chunk_uid: stable_chunk_uid("src/a.ts", line_start, line_end),
        content_hash: content_hash(&text),
    }
}

async fn seed_file(store: &Store, path: &str, chunks: &[ChunkInput]) -> (i64, Vec<i64>) {
    let file_id = store
        .upsert_file(path, "typescript", "hash0", 100)
        .await
        .unwrap();
    let ids = store.insert_chunks(file_id, chunks).await.unwrap();
    (file_id, ids)
}

#[test]
fn test_parse_vec_dimension() {
    let sql = "CREATE VIRTUAL TABLE chunk_vectors USING vec0(chunk_id INTEGER PRIMARY KEY, embedding float[768])";
    assert_eq!(parse_vec_dimension(sql), Some(768));
    assert_eq!(parse_vec_dimension("CREATE TABLE t (x int)"), None);
}

#[tokio::test]
async fn test_open_records_dimension_and_rejects_mismatch() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir, Some(4));
        assert_eq!(store.dimension(), 4);
    }
    // Reopen without a dimension adopts the stored one.
    {
        let store = open_store(&dir, None);
        assert_eq!(store.dimension(), 4);
    }
    // Reopen with a different dimension fails before any write.
    let err = Store::open(&dir.path().join("index.db"), Some(8)).unwrap_err();
    match err {
        CtxErr::DimensionMismatch { stored, requested } => {
            assert_eq!(stored, 4);
            assert_eq!(requested, 8);
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upsert_file_is_idempotent_on_path() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));

    let id1 = store
        .upsert_file("src/a.ts", "typescript", "h1", 10)
        .await
        .unwrap();
    let id2 = store
        .upsert_file("src/a.ts", "typescript", "h2", 12)
        .await
        .unwrap();
    assert_eq!(id1, id2);

    let file = store.get_file("src/a.ts").await.unwrap().unwrap();
    assert_eq!(file.hash, "h2");
    assert_eq!(file.size, 12);
}

#[tokio::test]
async fn test_insert_chunks_preserves_order_and_joins_file() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Import, None, 1, 2),
        chunk_input(ChunkKind::Function, Some("validateToken"), 4, 10),
        chunk_input(ChunkKind::Function, Some("parseToken"), 12, 20),
    ];
    let (_, ids) = seed_file(&store, "src/a.ts", &chunks).await;
    assert_eq!(ids.len(), 3);

    let fetched = store.get_chunks_by_ids(&ids).await.unwrap();
    assert_eq!(fetched.len(), 3);
    assert_eq!(fetched[0].kind, ChunkKind::Import);
    assert_eq!(fetched[1].name.as_deref(), Some("validateToken"));
    assert_eq!(fetched[1].file_path, "src/a.ts");
    assert_eq!(fetched[1].language, "typescript");

    // Order of get_chunks_by_ids follows the id list.
    let reversed: Vec<i64> = ids.iter().rev().copied().collect();
    let fetched = store.get_chunks_by_ids(&reversed).await.unwrap();
    assert_eq!(fetched[0].name.as_deref(), Some("parseToken"));
}

#[tokio::test]
async fn test_fts_search_hits_chunk_text_and_name() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Function, Some("validateToken"), 1, 10),
        chunk_input(ChunkKind::Function, Some("renderPage"), 12, 20),
    ];
    let (_, ids) = seed_file(&store, "src/a.ts", &chunks).await;

    let hits = store.fts_search("validateToken", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, ids[0]);
    // FTS5 rank is negative (lower is better).
    assert!(hits[0].1 < 0.0);
}

#[tokio::test]
async fn test_knn_search_returns_nearest_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Function, Some("a"), 1, 5),
        chunk_input(ChunkKind::Function, Some("b"), 7, 12),
    ];
    let (_, ids) = seed_file(&store, "src/a.ts", &chunks).await;

    store
        .insert_vectors(&[
            (ids[0], vec![1.0, 0.0, 0.0, 0.0]),
            (ids[1], vec![0.0, 1.0, 0.0, 0.0]),
        ])
        .await
        .unwrap();

    let hits = store.knn_search(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, ids[0]);
    assert!(hits[0].1 < hits[1].1);

    // Empty table short-circuits instead of erroring.
    store.delete_vectors(&ids).await.unwrap();
    let hits = store.knn_search(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_insert_vector_rejects_wrong_dimension() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let (_, ids) = seed_file(
        &store,
        "src/a.ts",
        &[chunk_input(ChunkKind::Function, Some("a"), 1, 5)],
    )
    .await;

    let err = store.insert_vector(ids[0], &[1.0, 0.0]).await.unwrap_err();
    assert_eq!(err.code(), "store_failed");
}

#[tokio::test]
async fn test_delete_file_cascades_everywhere() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Function, Some("alpha"), 1, 5),
        chunk_input(ChunkKind::Function, Some("beta"), 7, 12),
    ];
    let (file_id, ids) = seed_file(&store, "src/a.ts", &chunks).await;
    store
        .insert_vector(ids[0], &[1.0, 0.0, 0.0, 0.0])
        .await
        .unwrap();
    store.insert_dep(ids[0], ids[1], "imports").await.unwrap();

    assert!(store.delete_file("src/a.ts").await.unwrap());

    assert!(store.get_file("src/a.ts").await.unwrap().is_none());
    assert!(store.get_chunks_by_file(file_id).await.unwrap().is_empty());
    assert!(store.fts_search("alpha", 10).await.unwrap().is_empty());
    assert!(store.outgoing(&[ids[0]]).await.unwrap().is_empty());
    assert_eq!(store.vector_count().await.unwrap(), 0);
    let hits = store.knn_search(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
    assert!(hits.is_empty());

    // Deleting a missing file reports false.
    assert!(!store.delete_file("src/a.ts").await.unwrap());
}

#[tokio::test]
async fn test_delete_chunks_by_file_keeps_file_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let (file_id, ids) = seed_file(
        &store,
        "src/a.ts",
        &[chunk_input(ChunkKind::Function, Some("alpha"), 1, 5)],
    )
    .await;
    store
        .insert_vector(ids[0], &[1.0, 0.0, 0.0, 0.0])
        .await
        .unwrap();

    let deleted = store.delete_chunks_by_file(file_id).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get_file("src/a.ts").await.unwrap().is_some());
    assert_eq!(store.vector_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_chunks_match_modes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Function, Some("validateToken"), 1, 5),
        chunk_input(ChunkKind::Function, Some("validateUser"), 7, 12),
        chunk_input(ChunkKind::Class, Some("Validator"), 14, 30),
    ];
    seed_file(&store, "src/a.ts", &chunks).await;

    let exact = store
        .search_chunks(
            &SymbolQuery {
                name: Some("validateToken".to_string()),
                name_match: Some(NameMatch::Exact),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);

    let prefix = store
        .search_chunks(
            &SymbolQuery {
                name: Some("validate".to_string()),
                name_match: Some(NameMatch::Prefix),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(prefix.len(), 2);

    let contains = store
        .search_chunks(
            &SymbolQuery {
                name: Some("alidat".to_string()),
                name_match: Some(NameMatch::Contains),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(contains.len(), 3);

    let classes = store
        .search_chunks(
            &SymbolQuery {
                kind: Some(ChunkKind::Class),
                ..Default::default()
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name.as_deref(), Some("Validator"));
}

#[tokio::test]
async fn test_dependency_edges() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let chunks = vec![
        chunk_input(ChunkKind::Function, Some("a"), 1, 5),
        chunk_input(ChunkKind::Function, Some("b"), 7, 12),
        chunk_input(ChunkKind::Function, Some("c"), 14, 20),
    ];
    let (_, ids) = seed_file(&store, "src/a.ts", &chunks).await;

    store.insert_dep(ids[0], ids[1], "imports").await.unwrap();
    store.insert_dep(ids[1], ids[2], "imports").await.unwrap();
    // Duplicate edges are ignored.
    store.insert_dep(ids[0], ids[1], "imports").await.unwrap();

    let out = store.outgoing(&[ids[0]]).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].target_chunk_id, ids[1]);

    let incoming = store.incoming(&[ids[2]]).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source_chunk_id, ids[1]);

    // Batched frontier query.
    let out = store.outgoing(&[ids[0], ids[1]]).await.unwrap();
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn test_embedder_gate() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));

    // Empty index: the configured embedder is claimed.
    store.ensure_embedder("openai/small/4").await.unwrap();
    assert_eq!(
        store.index_embedder().await.unwrap().as_deref(),
        Some("openai/small/4")
    );

    // Same signature passes, different one fails.
    store.ensure_embedder("openai/small/4").await.unwrap();
    let err = store.ensure_embedder("voyage/code-2/4").await.unwrap_err();
    assert_eq!(err.code(), "embedder_mismatch");
}

#[tokio::test]
async fn test_get_files_by_hash_returns_matching_subset() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    store
        .upsert_file("src/a.ts", "typescript", "h-a", 1)
        .await
        .unwrap();
    store
        .upsert_file("src/b.ts", "typescript", "h-b", 1)
        .await
        .unwrap();

    let mut candidates = HashMap::new();
    candidates.insert("src/a.ts".to_string(), "h-a".to_string());
    candidates.insert("src/b.ts".to_string(), "different".to_string());
    candidates.insert("src/c.ts".to_string(), "h-c".to_string());

    let matched = store.get_files_by_hash(&candidates).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert!(matched.contains_key("src/a.ts"));
}

#[tokio::test]
async fn test_stats_and_schema_version() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, Some(4));
    let (_, ids) = seed_file(
        &store,
        "src/a.ts",
        &[chunk_input(ChunkKind::Function, Some("a"), 1, 5)],
    )
    .await;
    store
        .upsert_file("src/b.py", "python", "h", 1)
        .await
        .unwrap();
    store
        .insert_vector(ids[0], &[0.5, 0.5, 0.5, 0.5])
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.vectors, 1);
    assert_eq!(stats.languages.get("python"), Some(&1));
    assert_eq!(stats.languages.get("typescript"), Some(&1));
    assert!(stats.last_indexed.is_some());

    assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
    assert_eq!(
        store.all_file_paths().await.unwrap(),
        vec!["src/a.ts".to_string(), "src/b.py".to_string()]
    );
}
