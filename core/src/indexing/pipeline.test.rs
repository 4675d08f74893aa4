use async_trait::async_trait;
use sha2::Digest;
use sha2::Sha256;
use tempfile::TempDir;

use super::*;
use crate::embeddings::normalize;

/// Deterministic unit-norm embedder: vectors derive from the text hash.
struct FakeEmbedder {
    dimensions: i32,
}

impl FakeEmbedder {
    fn new(dimensions: i32) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut v: Vec<f32> = digest
            .iter()
            .cycle()
            .take(self.dimensions as usize)
            .map(|b| *b as f32 + 1.0)
            .collect();
        normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn name(&self) -> &str {
        "fake"
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    async fn embed(
        &self,
        texts: &[String],
        progress: Option<ProgressFn>,
    ) -> Result<Vec<Vec<f32>>> {
        if let Some(progress) = &progress {
            progress(texts.len(), texts.len());
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }
}

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn sample_project(root: &std::path::Path) {
    write(
        root,
        "src/a.ts",
        "import { t } from \"./t\";\n\nexport function validateToken(t: string) {\n    return t.length > 0;\n}\n",
    );
    write(
        root,
        "src/b.ts",
        "import { validateToken } from \"./a\";\n\nexport function guard(t: string) {\n    return validateToken(t);\n}\n",
    );
}

async fn open_store(state: &TempDir) -> Store {
    Store::open(&state.path().join("index.db"), Some(8)).unwrap()
}

#[tokio::test]
async fn test_full_index_run() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;

    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(8));
    let stats = run_index(
        project.path(),
        &store,
        Some(embedder),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(stats.files_discovered, 2);
    assert_eq!(stats.files_added, 2);
    assert_eq!(stats.files_deleted, 0);
    // Each file has an import chunk and a function chunk.
    assert_eq!(stats.chunks_created, 4);
    assert_eq!(stats.vectors_created, 4);
    assert_eq!(stats.languages.get("typescript"), Some(&2));

    let store_stats = store.stats().await.unwrap();
    assert_eq!(store_stats.files, 2);
    assert_eq!(store_stats.chunks, 4);
    assert_eq!(store_stats.vectors, 4);
}

#[tokio::test]
async fn test_reindex_unchanged_is_a_noop() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(8));

    run_index(
        project.path(),
        &store,
        Some(Arc::clone(&embedder)),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    let stats = run_index(
        project.path(),
        &store,
        Some(embedder),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(stats.files_added, 0);
    assert_eq!(stats.files_modified, 0);
    assert_eq!(stats.files_deleted, 0);
    assert_eq!(stats.files_unchanged, 2);
    assert_eq!(stats.chunks_created, 0);
    assert_eq!(stats.vectors_created, 0);
}

#[tokio::test]
async fn test_modify_one_file_keeps_stable_chunk_ids() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;

    run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        ..Default::default()
    })
    .await
    .unwrap();

    let before = store.get_file("src/a.ts").await.unwrap().unwrap();
    let chunks_before = store.get_chunks_by_file(before.id).await.unwrap();
    let function_uid_before = chunks_before
        .iter()
        .find(|c| c.name.as_deref() == Some("validateToken"))
        .unwrap()
        .chunk_uid
        .clone();

    // One-character change inside the function body, same line layout.
    write(
        project.path(),
        "src/a.ts",
        "import { t } from \"./t\";\n\nexport function validateToken(t: string) {\n    return t.length > 1;\n}\n",
    );

    let stats = run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        ..Default::default()
    })
    .await
    .unwrap();

    assert_eq!(stats.files_modified, 1);
    assert_eq!(stats.files_unchanged, 1);
    assert_eq!(stats.files_added, 0);

    let after = store.get_file("src/a.ts").await.unwrap().unwrap();
    assert_eq!(after.id, before.id, "file id stable across re-index");
    let chunks_after = store.get_chunks_by_file(after.id).await.unwrap();
    let function_after = chunks_after
        .iter()
        .find(|c| c.name.as_deref() == Some("validateToken"))
        .unwrap();
    // Same path and line range: the stable chunk id is unchanged.
    assert_eq!(function_after.chunk_uid, function_uid_before);
    assert!(function_after.text.contains("t.length > 1"));
}

#[tokio::test]
async fn test_deleted_file_cascades() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;

    run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        ..Default::default()
    })
    .await
    .unwrap();

    std::fs::remove_file(project.path().join("src/b.ts")).unwrap();
    let stats = run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        ..Default::default()
    })
    .await
    .unwrap();

    assert_eq!(stats.files_deleted, 1);
    assert!(store.get_file("src/b.ts").await.unwrap().is_none());
    assert!(store.fts_search("guard", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skip_embedding_leaves_chunks_searchable() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;

    let stats = run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        ..Default::default()
    })
    .await
    .unwrap();

    assert!(stats.chunks_created > 0);
    assert_eq!(stats.vectors_created, 0);
    assert!(!store.fts_search("validateToken", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_aborts_cleanly() {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    sample_project(project.path());
    let store = open_store(&state).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = run_index(project.path(), &store, None, IndexOptions {
        skip_embedding: true,
        cancel: Some(cancel),
        ..Default::default()
    })
    .await
    .unwrap_err();

    assert_eq!(err.code(), "cancelled");
    // Nothing was half-written.
    assert_eq!(store.stats().await.unwrap().chunks, 0);
}
