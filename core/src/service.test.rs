use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use sha2::Digest;
use sha2::Sha256;
use tempfile::TempDir;

use super::*;
use crate::embeddings::ProgressFn;
use crate::embeddings::normalize;
use crate::types::ChunkKind;

/// Deterministic unit-norm embedder; records whether the query path used it.
struct FakeEmbedder {
    dimensions: i32,
    used: AtomicBool,
}

impl FakeEmbedder {
    fn new(dimensions: i32) -> Arc<Self> {
        Arc::new(Self {
            dimensions,
            used: AtomicBool::new(false),
        })
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
        _progress: Option<ProgressFn>,
    ) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.used.store(true, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }
}

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Service over a temp project with a fake embedder and 8-dim vectors.
async fn service_with_project() -> (TempDir, CtxService, Arc<FakeEmbedder>) {
    let dir = TempDir::new().unwrap();
    let embedder = FakeEmbedder::new(8);
    let service = CtxService::with_factory(
        dir.path(),
        Arc::new(FixedEmbedderFactory::new(embedder.clone())),
    );

    write(
        dir.path(),
        "src/a.ts",
        "import { t } from \"./t\";\n\nexport function validateToken(t: string) {\n    return t.length > 0;\n}\n",
    );
    write(
        dir.path(),
        "src/b.ts",
        "import { validateToken } from \"./a\";\n",
    );
    write(
        dir.path(),
        "src/indexer/walker.ts",
        "export function walk(root: string) {\n    return [root];\n}\n",
    );
    write(
        dir.path(),
        "src/indexer/chunker.ts",
        "export function chunk(nodes: unknown[]) {\n    return nodes;\n}\n",
    );

    // The store adopts the configured dimension on first creation, so the
    // config must exist before init opens the database.
    let mut config = ProjectConfig::default();
    config.embedder.dimensions = 8;
    config.save(dir.path()).unwrap();
    service.init().await.unwrap();
    (dir, service, embedder)
}

#[tokio::test]
async fn test_init_creates_state_layout() {
    let dir = TempDir::new().unwrap();
    let service = CtxService::new(dir.path());
    service.init().await.unwrap();

    assert!(dir.path().join(".ctx/config.json").is_file());
    assert!(dir.path().join(".ctx/index.db").is_file());
    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.lines().any(|l| l.trim() == ".ctx/"));

    // Re-running init does not duplicate the gitignore entry.
    service.init().await.unwrap();
    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert_eq!(
        gitignore.lines().filter(|l| l.trim() == ".ctx/").count(),
        1
    );
}

#[tokio::test]
async fn test_operations_require_initialization() {
    let dir = TempDir::new().unwrap();
    let service = CtxService::new(dir.path());

    let err = service.query("anything", QueryOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), "not_initialized");
    let err = service.status().await.unwrap_err();
    assert_eq!(err.code(), "not_initialized");
    assert!(service.config_read().is_err());
}

#[tokio::test]
async fn test_symbol_query_ranks_definition_over_import() {
    let (_dir, service, _embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    let results = service
        .query(
            "validateToken",
            QueryOptions {
                strategies: Some(vec![Strategy::Fts, Strategy::Ast]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.file_path, "src/a.ts");
    assert_eq!(top.name.as_deref(), Some("validateToken"));
    assert_eq!(top.score, 1.0);

    if let Some(import_hit) = results
        .iter()
        .find(|r| r.file_path == "src/b.ts" && r.kind == ChunkKind::Import)
    {
        assert!(import_hit.score < top.score);
    }
}

#[tokio::test]
async fn test_path_glob_query_returns_only_matching_files() {
    let (_dir, service, _embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    let results = service
        .query(
            "src/indexer/*",
            QueryOptions {
                strategies: Some(vec![Strategy::Path]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results
        .iter()
        .all(|r| r.file_path.starts_with("src/indexer/")));
}

#[tokio::test]
async fn test_path_keyword_query_prefers_directory_tier() {
    let (_dir, service, _embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    let results = service
        .query(
            "indexer",
            QueryOptions {
                strategies: Some(vec![Strategy::Path]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!results.is_empty());
    // Directory-segment matches come first.
    assert!(results[0].file_path.starts_with("src/indexer/"));
}

#[tokio::test]
async fn test_natural_language_query_pulls_in_vector_strategy() {
    let (_dir, service, embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    service
        .query("how does token validation work", QueryOptions::default())
        .await
        .unwrap();
    assert!(
        embedder.used.load(Ordering::SeqCst),
        "vector strategy should auto-engage for natural-language queries"
    );
}

#[tokio::test]
async fn test_explicit_strategies_do_not_gain_vector() {
    let (_dir, service, embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    service
        .query(
            "how does token validation work",
            QueryOptions {
                strategies: Some(vec![Strategy::Fts]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!embedder.used.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_status_reports_counts_and_embedder() {
    let (_dir, service, _embedder) = service_with_project().await;
    let stats = service.index(IndexOptions::default()).await.unwrap();
    assert!(stats.chunks_created > 0);
    assert_eq!(stats.vectors_created, stats.chunks_created);

    let status = service.status().await.unwrap();
    assert_eq!(status.store.files, 4);
    assert_eq!(status.store.chunks as usize, stats.chunks_created);
    assert_eq!(status.store.vectors as usize, stats.vectors_created);
    assert!(status.db_size_bytes > 0);
    assert_eq!(status.schema_version, 1);
    assert_eq!(status.embedder.as_deref(), Some("local/all-MiniLM-L6-v2/8"));
}

#[tokio::test]
async fn test_no_vectors_index_keeps_fts_usable() {
    let (_dir, service, _embedder) = service_with_project().await;
    let stats = service
        .index(IndexOptions {
            skip_embedding: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(stats.vectors_created, 0);

    let results = service
        .query(
            "validateToken",
            QueryOptions {
                strategies: Some(vec![Strategy::Fts]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!results.is_empty());
}

#[tokio::test]
async fn test_planner_executor_seam() {
    struct FtsOnlyPlanner;

    #[async_trait]
    impl QueryPlanner for FtsOnlyPlanner {
        async fn plan(
            &self,
            query: &str,
            executor: &dyn SearchExecutor,
        ) -> Result<Vec<SearchResult>> {
            // A real planner would come from an LLM adapter; this fake
            // fans one refined term out over a fixed strategy list.
            let refined = query.split_whitespace().last().unwrap_or(query);
            executor
                .execute(refined, &[Strategy::Fts, Strategy::Ast], 5)
                .await
        }
    }

    let (_dir, service, _embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    let results = service
        .natural_language_query("please find validateToken", &FtsOnlyPlanner)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].name.as_deref(), Some("validateToken"));
}

#[tokio::test]
async fn test_config_round_trip_via_service() {
    let (_dir, service, _embedder) = service_with_project().await;

    let mut config = service.config_read().unwrap();
    config.search.default_limit = 3;
    service.config_write(&config).unwrap();
    assert_eq!(service.config_read().unwrap().search.default_limit, 3);

    config.search.default_limit = 0;
    assert!(service.config_write(&config).is_err());
}

#[tokio::test]
async fn test_query_cancellation() {
    let (_dir, service, _embedder) = service_with_project().await;
    service.index(IndexOptions::default()).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = service
        .query(
            "validateToken",
            QueryOptions {
                cancel: Some(cancel),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "cancelled");
}
