//! Core façade.
//!
//! One [`CtxService`] per project root. Every operation acquires the
//! store for its own duration and releases it on all exit paths; the
//! embedder is cached process-wide by project and signature.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::CONFIG_FILE;
use crate::config::DB_FILE;
use crate::config::ProjectConfig;
use crate::config::STATE_DIR;
use crate::config::Strategy;
use crate::embeddings::DefaultEmbedderFactory;
use crate::embeddings::Embedder;
use crate::embeddings::EmbedderFactory;
use crate::embeddings::cached_embedder;
use crate::error::CtxErr;
use crate::error::Result;
use crate::indexing::IndexOptions;
use crate::indexing::run_index;
use crate::query::QueryKind;
use crate::query::classify;
use crate::search::AstQuery;
use crate::search::Direction;
use crate::search::MatchMode;
use crate::search::WeightedResults;
use crate::search::ast_search;
use crate::search::dep_trace;
use crate::search::fts_search;
use crate::search::fuse_and_rerank;
use crate::search::looks_like_glob;
use crate::search::path_glob;
use crate::search::path_keyword;
use crate::search::vector_search;
use crate::storage::Store;
use crate::types::IndexStats;
use crate::types::SearchResult;
use crate::types::StoreStats;

/// Executes a search for a caller-supplied planner. The service itself is
/// the only implementation in-core; LLM steering lives outside.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        strategies: &[Strategy],
        limit: i32,
    ) -> Result<Vec<SearchResult>>;
}

/// Plans and runs a natural-language query against a [`SearchExecutor`].
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(
        &self,
        query: &str,
        executor: &dyn SearchExecutor,
    ) -> Result<Vec<SearchResult>>;
}

/// Options for one `query` call.
#[derive(Default)]
pub struct QueryOptions {
    pub limit: Option<i32>,
    /// Explicit strategy set; `None` uses the configured default.
    pub strategies: Option<Vec<Strategy>>,
    pub language: Option<String>,
    /// Classifier-driven weight multipliers (on unless disabled).
    pub no_classifier: bool,
    pub cancel: Option<CancellationToken>,
}

/// Status report for a project index.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub store: StoreStats,
    pub embedder: Option<String>,
    pub schema_version: i32,
    pub db_size_bytes: u64,
}

/// The core façade.
pub struct CtxService {
    root: PathBuf,
    factory: Arc<dyn EmbedderFactory>,
}

impl CtxService {
    pub fn new(root: &Path) -> Self {
        Self::with_factory(root, Arc::new(DefaultEmbedderFactory))
    }

    /// Use a caller-supplied embedder factory (tests, custom providers).
    pub fn with_factory(root: &Path, factory: Arc<dyn EmbedderFactory>) -> Self {
        Self {
            root: root.to_path_buf(),
            factory,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn db_path(&self) -> PathBuf {
        self.state_dir().join(DB_FILE)
    }

    fn require_initialized(&self) -> Result<()> {
        if self.state_dir().is_dir() {
            Ok(())
        } else {
            Err(CtxErr::NotInitialized {
                root: self.root.clone(),
            })
        }
    }

    /// Initialize the project: state directory, default config, gitignore
    /// entry, and an empty store with the configured dimension.
    pub async fn init(&self) -> Result<ProjectConfig> {
        let config = self.ensure_state()?;
        // Creates the schema so a subsequent status/query has a database.
        let _store = self.open_store(&config)?;
        tracing::info!(root = %self.root.display(), "project initialized");
        Ok(config)
    }

    /// State-directory bootstrap shared by `init` and `index`.
    fn ensure_state(&self) -> Result<ProjectConfig> {
        std::fs::create_dir_all(self.state_dir())
            .map_err(|e| CtxErr::store("create state dir", e))?;

        let config_path = self.state_dir().join(CONFIG_FILE);
        let config = ProjectConfig::load(&self.root)?;
        if !config_path.exists() {
            config.save(&self.root)?;
        }
        config.validate()?;
        self.ensure_gitignore_entry()?;
        Ok(config)
    }

    /// Make sure `.gitignore` excludes the state directory.
    fn ensure_gitignore_entry(&self) -> Result<()> {
        let entry = format!("{STATE_DIR}/");
        let path = self.root.join(".gitignore");
        let existing = std::fs::read_to_string(&path).unwrap_or_default();
        if existing
            .lines()
            .any(|line| line.trim() == entry || line.trim() == STATE_DIR)
        {
            return Ok(());
        }
        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&entry);
        updated.push('\n');
        std::fs::write(&path, updated).map_err(|e| CtxErr::store("update .gitignore", e))?;
        Ok(())
    }

    fn open_store(&self, config: &ProjectConfig) -> Result<Store> {
        Store::open(&self.db_path(), Some(config.embedder.dimensions))
    }

    /// Incremental indexing: bootstraps state on first use, then runs the
    /// pipeline. The store handle lives for this call only.
    pub async fn index(&self, mut options: IndexOptions) -> Result<IndexStats> {
        let config = self.ensure_state()?;
        let store = self.open_store(&config)?;

        let embedder = if options.skip_embedding {
            None
        } else {
            store.ensure_embedder(&config.embedder.signature()).await?;
            Some(cached_embedder(
                &self.root,
                &config.embedder,
                self.factory.as_ref(),
            )?)
        };

        options
            .extra_ignore
            .extend(config.watch.ignored.iter().cloned());
        run_index(&self.root, &store, embedder, options).await
    }

    /// Multi-strategy query with fusion and re-ranking.
    pub async fn query(&self, query: &str, options: QueryOptions) -> Result<Vec<SearchResult>> {
        self.require_initialized()?;
        let config = ProjectConfig::load(&self.root)?;
        config.validate()?;
        let store = self.open_store(&config)?;

        let limit = options.limit.unwrap_or(config.search.default_limit).max(1);
        let classification = classify(query);

        let (strategies, using_default) = match &options.strategies {
            Some(list) => (list.clone(), false),
            None => (config.search.strategies.clone(), true),
        };
        let mut strategies = strategies;
        // Natural-language queries pull in vector search when the caller
        // left the strategy set at its default.
        if using_default
            && !options.no_classifier
            && classification.kind == QueryKind::NaturalLanguage
            && !strategies.contains(&Strategy::Vector)
        {
            strategies.push(Strategy::Vector);
        }

        let cancel = options.cancel.clone().unwrap_or_default();
        let language = options.language.as_deref();
        let fetch = limit * 3;
        let mut sources = Vec::new();

        for strategy in strategies {
            if cancel.is_cancelled() {
                return Err(CtxErr::Cancelled);
            }
            let results = match strategy {
                Strategy::Fts => fts_search(&store, query, fetch, language).await?,
                Strategy::Ast => {
                    let match_mode = if classification.kind == QueryKind::Symbol {
                        MatchMode::Exact
                    } else {
                        MatchMode::Fuzzy
                    };
                    let ast_query = AstQuery {
                        name: Some(query.trim().to_string()),
                        language: options.language.clone(),
                        match_mode,
                        ..Default::default()
                    };
                    ast_search(&store, &ast_query, fetch).await?
                }
                Strategy::Path => {
                    if looks_like_glob(query) {
                        path_glob(&store, query.trim(), fetch).await?
                    } else {
                        path_keyword(&store, query.trim(), fetch).await?
                    }
                }
                Strategy::Vector => {
                    match cached_embedder(&self.root, &config.embedder, self.factory.as_ref()) {
                        Ok(embedder) => {
                            match vector_search(&store, embedder.as_ref(), query, fetch, language)
                                .await
                            {
                                Ok(results) => results,
                                Err(e) => {
                                    tracing::warn!(error = %e, "vector strategy degraded");
                                    Vec::new()
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "vector strategy unavailable");
                            Vec::new()
                        }
                    }
                }
                // A raw query string has no start chunk; traversal runs
                // through `trace`.
                Strategy::Dependency => Vec::new(),
            };

            let weight = if options.no_classifier {
                config.search.weight(strategy)
            } else {
                config.search.weight(strategy) * classification.multiplier(strategy)
            };
            sources.push(WeightedResults {
                strategy,
                weight,
                results,
            });
        }

        Ok(fuse_and_rerank(&sources, query, limit as usize))
    }

    /// Dependency traversal from a chunk.
    pub async fn trace(
        &self,
        chunk_id: i64,
        direction: Direction,
        depth: usize,
    ) -> Result<Vec<SearchResult>> {
        self.require_initialized()?;
        let config = ProjectConfig::load(&self.root)?;
        let store = self.open_store(&config)?;
        dep_trace(&store, chunk_id, direction, depth).await
    }

    /// Run a natural-language query through a caller-supplied planner.
    pub async fn natural_language_query(
        &self,
        query: &str,
        planner: &dyn QueryPlanner,
    ) -> Result<Vec<SearchResult>> {
        self.require_initialized()?;
        planner.plan(query, self).await
    }

    /// Index status: counts, embedder signature, schema, database size.
    pub async fn status(&self) -> Result<StatusReport> {
        self.require_initialized()?;
        let config = ProjectConfig::load(&self.root)?;
        let store = self.open_store(&config)?;

        let db_size_bytes = std::fs::metadata(self.db_path())
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(StatusReport {
            store: store.stats().await?,
            embedder: store.index_embedder().await?,
            schema_version: store.schema_version().await?,
            db_size_bytes,
        })
    }

    /// Read the project configuration (defaults merged in).
    pub fn config_read(&self) -> Result<ProjectConfig> {
        self.require_initialized()?;
        ProjectConfig::load(&self.root)
    }

    /// Validate and persist configuration, preserving unknown keys.
    pub fn config_write(&self, config: &ProjectConfig) -> Result<()> {
        self.require_initialized()?;
        config.validate()?;
        config.save(&self.root)
    }

    /// Reclaim database space.
    pub async fn vacuum(&self) -> Result<()> {
        self.require_initialized()?;
        let config = ProjectConfig::load(&self.root)?;
        let store = self.open_store(&config)?;
        store.vacuum().await
    }
}

#[async_trait]
impl SearchExecutor for CtxService {
    async fn execute(
        &self,
        query: &str,
        strategies: &[Strategy],
        limit: i32,
    ) -> Result<Vec<SearchResult>> {
        self.query(
            query,
            QueryOptions {
                limit: Some(limit),
                strategies: Some(strategies.to_vec()),
                no_classifier: true,
                ..Default::default()
            },
        )
        .await
    }
}

/// Convenience used by tests and simple callers: embedders that reuse the
/// process cache but come from a fixed instance.
pub struct FixedEmbedderFactory {
    embedder: Arc<dyn Embedder>,
}

impl FixedEmbedderFactory {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

impl EmbedderFactory for FixedEmbedderFactory {
    fn create(&self, _config: &crate::config::EmbedderConfig) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::clone(&self.embedder))
    }
}

#[cfg(test)]
#[path = "service.test.rs"]
mod tests;
