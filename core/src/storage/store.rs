//! Single-file embedded store.
//!
//! One SQLite database holds everything: file and chunk metadata,
//! dependency edges, an FTS5 index over chunk text, and a sqlite-vec
//! virtual table for KNN search. Writes are serialized through one
//! connection; async callers go through `spawn_blocking`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::params;
use rusqlite::params_from_iter;
use tokio::task::spawn_blocking;
use zerocopy::AsBytes;

use crate::config::default_embedding_dimension;
use crate::error::CtxErr;
use crate::error::Result;
use crate::types::ChunkInput;
use crate::types::ChunkKind;
use crate::types::FileRecord;
use crate::types::StoredChunk;
use crate::types::StoreStats;

/// Current schema version.
const SCHEMA_VERSION: i32 = 1;

/// Meta keys.
const META_SCHEMA_VERSION: &str = "schema_version";
const META_VECTOR_DIMENSIONS: &str = "vector_dimensions";
const META_INDEX_EMBEDDER: &str = "index_embedder";

/// Name match mode for symbol lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Prefix,
    Contains,
}

/// Structured symbol query over chunk metadata.
#[derive(Debug, Clone, Default)]
pub struct SymbolQuery {
    pub name: Option<String>,
    pub name_match: Option<NameMatch>,
    pub kind: Option<ChunkKind>,
    pub parent: Option<String>,
    pub language: Option<String>,
}

/// A dependency edge between two chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub source_chunk_id: i64,
    pub target_chunk_id: i64,
    pub relation: String,
}

/// The embedded store.
///
/// `rusqlite::Connection` is not Sync, so the connection lives behind an
/// `Arc<Mutex<_>>` and every operation runs on the blocking pool.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    dimension: i32,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl Store {
    /// Open or create the store.
    ///
    /// `dimension` is the caller's expected vector dimension. When the
    /// store already has one (meta row, or the vec table DDL for legacy
    /// files) the two must agree; when the caller passes `None` the stored
    /// value is adopted. The dimension is immutable after first use.
    pub fn open(path: &Path, dimension: Option<i32>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CtxErr::store("create state dir", e))?;
        }

        // Register sqlite-vec before opening.
        //
        // SAFETY: `sqlite3_vec_init` is the extension entry point provided
        // by the sqlite-vec crate. `sqlite3_auto_extension` expects the
        // SQLite extension init signature; the transmute converts the
        // concrete fn pointer into the `Option<unsafe extern "C" fn()>`
        // the FFI boundary wants. This is the documented pattern from the
        // sqlite-vec crate README.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }

        let conn = Connection::open(path).map_err(|e| CtxErr::store("open database", e))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| CtxErr::store("pragma init", e))?;

        let stored = Self::stored_dimension(&conn)?;
        let dimension = match (stored, dimension) {
            (Some(stored), Some(requested)) if stored != requested => {
                return Err(CtxErr::DimensionMismatch { stored, requested });
            }
            (Some(stored), _) => stored,
            (None, Some(requested)) => requested,
            (None, None) => default_embedding_dimension(),
        };

        Self::init_schema(&conn, dimension)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            dimension,
        })
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Vector dimension this store was created with.
    pub fn dimension(&self) -> i32 {
        self.dimension
    }

    /// Read the dimension already recorded in the database, if any.
    ///
    /// Prefers the meta row; for legacy databases that predate it, the
    /// dimension is recovered from the vec table's CREATE statement.
    fn stored_dimension(conn: &Connection) -> Result<Option<i32>> {
        let has_meta: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta')",
                [],
                |r| r.get(0),
            )
            .map_err(|e| CtxErr::store("check meta table", e))?;

        if has_meta {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = ?1",
                    params![META_VECTOR_DIMENSIONS],
                    |r| r.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(CtxErr::store("read vector_dimensions", e)),
                })?;
            if let Some(value) = value {
                let parsed = value.parse::<i32>().map_err(|_| {
                    CtxErr::store("read vector_dimensions", format!("not a number: {value}"))
                })?;
                return Ok(Some(parsed));
            }
        }

        // Legacy fallback: parse "float[N]" out of the virtual table DDL.
        let create_sql: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name='chunk_vectors'",
                [],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(CtxErr::store("read chunk_vectors schema", e)),
            })?;

        Ok(create_sql.as_deref().and_then(parse_vec_dimension))
    }

    fn init_schema(conn: &Connection, dimension: i32) -> Result<()> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| CtxErr::store("schema init", e))?;

        let vec_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vectors USING vec0(
                chunk_id INTEGER PRIMARY KEY,
                embedding float[{dimension}]
            )"
        );
        conn.execute_batch(&vec_sql)
            .map_err(|e| CtxErr::store("vec table init", e))?;

        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
            params![META_SCHEMA_VERSION, SCHEMA_VERSION.to_string()],
        )
        .map_err(|e| CtxErr::store("record schema version", e))?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
            params![META_VECTOR_DIMENSIONS, dimension.to_string()],
        )
        .map_err(|e| CtxErr::store("record vector dimensions", e))?;

        Ok(())
    }

    /// Enforce the index-embedder gate.
    ///
    /// Fails with `EmbedderMismatch` when the stored signature differs
    /// from the configured one. When no signature is stored and no vectors
    /// exist yet, the configured signature is recorded.
    pub async fn ensure_embedder(&self, configured: &str) -> Result<()> {
        let configured = configured.to_string();
        self.query("embedder gate", move |conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = ?1",
                    params![META_INDEX_EMBEDDER],
                    |r| r.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(e),
                })?;

            match stored {
                Some(stored) if stored != configured => Err(CtxErr::EmbedderMismatch {
                    stored,
                    configured,
                }),
                Some(_) => Ok(()),
                None => {
                    let vectors: i64 =
                        conn.query_row("SELECT COUNT(*) FROM chunk_vectors", [], |r| r.get(0))?;
                    if vectors == 0 {
                        conn.execute(
                            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                            params![META_INDEX_EMBEDDER, configured],
                        )?;
                    }
                    Ok(())
                }
            }
        })
        .await
    }

    /// Stored embedder signature, if any.
    pub async fn index_embedder(&self) -> Result<Option<String>> {
        self.query("read index embedder", |conn| {
            conn.query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_INDEX_EMBEDDER],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e.into()),
            })
        })
        .await
    }

    /// Schema version recorded in the database.
    pub async fn schema_version(&self) -> Result<i32> {
        self.query("read schema version", |conn| {
            let value: String = conn.query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_SCHEMA_VERSION],
                |r| r.get(0),
            )?;
            Ok(value.parse::<i32>().unwrap_or(0))
        })
        .await
    }

    /// Run a read-only closure on the blocking pool.
    async fn query<F, T>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CtxErr::store(operation, "mutex poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| CtxErr::store(operation, format!("spawn_blocking failed: {e}")))?
    }

    /// Run a mutating closure inside one transaction on the blocking pool.
    ///
    /// All mutations inside are all-or-nothing.
    pub async fn transaction<F, T>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CtxErr::store(operation, "mutex poisoned"))?;
            let tx = guard
                .unchecked_transaction()
                .map_err(|e| CtxErr::store(operation, format!("begin: {e}")))?;
            let result = f(&tx)?;
            tx.commit()
                .map_err(|e| CtxErr::store(operation, format!("commit: {e}")))?;
            Ok(result)
        })
        .await
        .map_err(|e| CtxErr::store(operation, format!("spawn_blocking failed: {e}")))?
    }

    // ========== Files ==========

    /// Insert or update a file row, returning its id.
    ///
    /// Idempotent on path: the id stays stable across updates.
    pub async fn upsert_file(
        &self,
        path: &str,
        language: &str,
        hash: &str,
        size: i64,
    ) -> Result<i64> {
        let (path, language, hash) = (path.to_string(), language.to_string(), hash.to_string());
        self.transaction("upsert file", move |conn| {
            conn.execute(
                "INSERT INTO files (path, language, hash, size, last_indexed)
                 VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'))
                 ON CONFLICT(path) DO UPDATE SET
                     language = excluded.language,
                     hash = excluded.hash,
                     size = excluded.size,
                     last_indexed = excluded.last_indexed",
                params![path, language, hash, size],
            )?;
            let id: i64 =
                conn.query_row("SELECT id FROM files WHERE path = ?1", params![path], |r| {
                    r.get(0)
                })?;
            Ok(id)
        })
        .await
    }

    /// Look up one file by project-relative path.
    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let path = path.to_string();
        self.query("get file", move |conn| {
            conn.query_row(
                "SELECT id, path, language, hash, size, last_indexed
                 FROM files WHERE path = ?1",
                params![path],
                file_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e.into()),
            })
        })
        .await
    }

    /// All file rows.
    pub async fn all_files(&self) -> Result<Vec<FileRecord>> {
        self.query("list files", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, path, language, hash, size, last_indexed FROM files ORDER BY path",
            )?;
            let rows = stmt.query_map([], file_from_row)?;
            let mut files = Vec::new();
            for row in rows {
                files.push(row?);
            }
            Ok(files)
        })
        .await
    }

    /// All stored file paths, sorted.
    pub async fn all_file_paths(&self) -> Result<Vec<String>> {
        self.query("list file paths", |conn| {
            let mut stmt = conn.prepare("SELECT path FROM files ORDER BY path")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            let mut paths = Vec::new();
            for row in rows {
                paths.push(row?);
            }
            Ok(paths)
        })
        .await
    }

    /// Subset of `candidates` whose (path, hash) pair already exists.
    pub async fn get_files_by_hash(
        &self,
        candidates: &HashMap<String, String>,
    ) -> Result<HashMap<String, i64>> {
        let candidates = candidates.clone();
        self.query("match files by hash", move |conn| {
            let mut stmt = conn.prepare("SELECT id, path, hash FROM files")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
            })?;
            let mut matched = HashMap::new();
            for row in rows {
                let (id, path, hash) = row?;
                if candidates.get(&path) == Some(&hash) {
                    matched.insert(path, id);
                }
            }
            Ok(matched)
        })
        .await
    }

    /// Delete a file and everything hanging off it: chunks (FK cascade),
    /// dependency edges (FK cascade), FTS rows (triggers), and vectors
    /// (explicit — the vec table is outside foreign-key enforcement).
    pub async fn delete_file(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.transaction("delete file", move |conn| {
            conn.execute(
                "DELETE FROM chunk_vectors WHERE chunk_id IN
                 (SELECT c.id FROM chunks c JOIN files f ON f.id = c.file_id WHERE f.path = ?1)",
                params![path],
            )?;
            let deleted = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
            Ok(deleted > 0)
        })
        .await
    }

    // ========== Chunks ==========

    /// Insert chunks for a file, returning row ids in input order.
    pub async fn insert_chunks(&self, file_id: i64, chunks: &[ChunkInput]) -> Result<Vec<i64>> {
        let chunks = chunks.to_vec();
        self.transaction("insert chunks", move |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO chunks
                 (file_id, chunk_uid, kind, name, parent, line_start, line_end,
                  text, imports, exported, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            let mut ids = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let imports = serde_json::to_string(&chunk.imports)
                    .map_err(|e| CtxErr::store("encode imports", e))?;
                stmt.execute(params![
                    file_id,
                    chunk.chunk_uid,
                    chunk.kind.as_str(),
                    chunk.name,
                    chunk.parent,
                    chunk.line_start,
                    chunk.line_end,
                    chunk.text,
                    imports,
                    chunk.exported as i32,
                    chunk.content_hash,
                ])?;
                ids.push(conn.last_insert_rowid());
            }
            Ok(ids)
        })
        .await
    }

    /// Chunks of one file, in line order.
    pub async fn get_chunks_by_file(&self, file_id: i64) -> Result<Vec<StoredChunk>> {
        self.query("get chunks by file", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{CHUNK_SELECT} WHERE c.file_id = ?1 ORDER BY c.line_start"
            ))?;
            let rows = stmt.query_map(params![file_id], chunk_from_row)?;
            collect_chunks(rows)
        })
        .await
    }

    /// Chunks by row id, joined with the owning file. Order follows `ids`.
    pub async fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<StoredChunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.query("get chunks by ids", move |conn| {
            let placeholders = vec!["?"; ids.len()].join(",");
            let mut stmt = conn.prepare(&format!(
                "{CHUNK_SELECT} WHERE c.id IN ({placeholders})"
            ))?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), chunk_from_row)?;
            let mut by_id: HashMap<i64, StoredChunk> = HashMap::new();
            for row in rows {
                let chunk = row?;
                by_id.insert(chunk.id, chunk);
            }
            Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
        })
        .await
    }

    /// Delete all chunks of a file (vectors explicitly, edges and FTS rows
    /// through cascades/triggers). Returns the number of chunks removed.
    pub async fn delete_chunks_by_file(&self, file_id: i64) -> Result<usize> {
        self.transaction("delete chunks by file", move |conn| {
            conn.execute(
                "DELETE FROM chunk_vectors WHERE chunk_id IN
                 (SELECT id FROM chunks WHERE file_id = ?1)",
                params![file_id],
            )?;
            let deleted = conn.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;
            Ok(deleted)
        })
        .await
    }

    /// Structured lookup over chunk metadata.
    pub async fn search_chunks(&self, query: &SymbolQuery, limit: i32) -> Result<Vec<StoredChunk>> {
        let query = query.clone();
        self.query("search chunks", move |conn| {
            let mut sql = format!("{CHUNK_SELECT} WHERE 1=1");
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(name) = &query.name {
                match query.name_match.unwrap_or(NameMatch::Exact) {
                    NameMatch::Exact => {
                        sql.push_str(" AND c.name = ?");
                        args.push(Box::new(name.clone()));
                    }
                    NameMatch::Prefix => {
                        sql.push_str(" AND c.name LIKE ? ESCAPE '\\'");
                        args.push(Box::new(format!("{}%", escape_like(name))));
                    }
                    NameMatch::Contains => {
                        sql.push_str(" AND c.name LIKE ? ESCAPE '\\'");
                        args.push(Box::new(format!("%{}%", escape_like(name))));
                    }
                }
            }
            if let Some(kind) = query.kind {
                sql.push_str(" AND c.kind = ?");
                args.push(Box::new(kind.as_str().to_string()));
            }
            if let Some(parent) = &query.parent {
                sql.push_str(" AND c.parent = ?");
                args.push(Box::new(parent.clone()));
            }
            if let Some(language) = &query.language {
                sql.push_str(" AND f.language = ?");
                args.push(Box::new(language.clone()));
            }
            sql.push_str(" ORDER BY c.name, f.path, c.line_start LIMIT ?");
            args.push(Box::new(limit));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(args.iter().map(|a| a.as_ref())),
                chunk_from_row,
            )?;
            collect_chunks(rows)
        })
        .await
    }

    // ========== Vectors ==========

    /// Insert one embedding for a chunk.
    pub async fn insert_vector(&self, chunk_id: i64, embedding: &[f32]) -> Result<()> {
        self.insert_vectors(&[(chunk_id, embedding.to_vec())]).await
    }

    /// Insert embeddings inside a single transaction.
    ///
    /// Readers never observe a partially written batch.
    pub async fn insert_vectors(&self, vectors: &[(i64, Vec<f32>)]) -> Result<()> {
        let dimension = self.dimension;
        for (chunk_id, embedding) in vectors {
            if embedding.len() != dimension as usize {
                return Err(CtxErr::store(
                    "insert vector",
                    format!(
                        "chunk {chunk_id}: expected {dimension} dimensions, got {}",
                        embedding.len()
                    ),
                ));
            }
        }
        let vectors = vectors.to_vec();
        self.transaction("insert vectors", move |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT OR REPLACE INTO chunk_vectors (chunk_id, embedding) VALUES (?1, ?2)",
            )?;
            for (chunk_id, embedding) in &vectors {
                stmt.execute(params![chunk_id, embedding.as_bytes()])?;
            }
            Ok(())
        })
        .await
    }

    /// Delete vectors by chunk id.
    pub async fn delete_vectors(&self, chunk_ids: &[i64]) -> Result<usize> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let chunk_ids = chunk_ids.to_vec();
        self.transaction("delete vectors", move |conn| {
            let placeholders = vec!["?"; chunk_ids.len()].join(",");
            let deleted = conn.execute(
                &format!("DELETE FROM chunk_vectors WHERE chunk_id IN ({placeholders})"),
                params_from_iter(chunk_ids.iter()),
            )?;
            Ok(deleted)
        })
        .await
    }

    /// Count of stored vectors.
    pub async fn vector_count(&self) -> Result<i64> {
        self.query("count vectors", |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM chunk_vectors", [], |r| r.get(0))?)
        })
        .await
    }

    /// KNN search: `(chunk_id, distance)` pairs, nearest first.
    pub async fn knn_search(&self, embedding: &[f32], k: i32) -> Result<Vec<(i64, f32)>> {
        if embedding.len() != self.dimension as usize {
            return Err(CtxErr::store(
                "knn search",
                format!(
                    "expected {} dimensions, got {}",
                    self.dimension,
                    embedding.len()
                ),
            ));
        }
        let bytes: Vec<u8> = embedding.as_bytes().to_vec();
        self.query("knn search", move |conn| {
            // vec0 MATCH errors on an empty table.
            let has_vectors: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM chunk_vectors LIMIT 1)",
                [],
                |r| r.get(0),
            )?;
            if !has_vectors {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare(
                "SELECT chunk_id, distance FROM chunk_vectors
                 WHERE embedding MATCH ?1 AND k = ?2",
            )?;
            let rows = stmt.query_map(params![bytes, k], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)? as f32))
            })?;
            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    // ========== FTS ==========

    /// Full-text MATCH over `{name, text, parent}`.
    ///
    /// `query` must already be sanitized (see the FTS strategy); the rank
    /// is FTS5's bm25-based rank (negative, lower is better).
    pub async fn fts_search(&self, query: &str, limit: i32) -> Result<Vec<(i64, f32)>> {
        let query = query.to_string();
        self.query("fts search", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT rowid, rank FROM chunks_fts
                 WHERE chunks_fts MATCH ?1
                 ORDER BY rank LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, limit], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)? as f32))
            })?;
            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    // ========== Dependencies ==========

    /// Insert a dependency edge. Both endpoints must exist.
    pub async fn insert_dep(&self, source: i64, target: i64, relation: &str) -> Result<()> {
        let relation = relation.to_string();
        self.transaction("insert dependency", move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO dependencies
                 (source_chunk_id, target_chunk_id, relation)
                 VALUES (?1, ?2, ?3)",
                params![source, target, relation],
            )?;
            Ok(())
        })
        .await
    }

    /// Outgoing edges from any of `sources` (one frontier layer).
    pub async fn outgoing(&self, sources: &[i64]) -> Result<Vec<DepEdge>> {
        self.edges("outgoing edges", "source_chunk_id", sources).await
    }

    /// Incoming edges into any of `targets` (one frontier layer).
    pub async fn incoming(&self, targets: &[i64]) -> Result<Vec<DepEdge>> {
        self.edges("incoming edges", "target_chunk_id", targets).await
    }

    async fn edges(
        &self,
        operation: &'static str,
        column: &'static str,
        ids: &[i64],
    ) -> Result<Vec<DepEdge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.query(operation, move |conn| {
            let placeholders = vec!["?"; ids.len()].join(",");
            let mut stmt = conn.prepare(&format!(
                "SELECT source_chunk_id, target_chunk_id, relation
                 FROM dependencies WHERE {column} IN ({placeholders})
                 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), |r| {
                Ok(DepEdge {
                    source_chunk_id: r.get(0)?,
                    target_chunk_id: r.get(1)?,
                    relation: r.get(2)?,
                })
            })?;
            let mut edges = Vec::new();
            for row in rows {
                edges.push(row?);
            }
            Ok(edges)
        })
        .await
    }

    // ========== Stats & maintenance ==========

    /// Aggregate counts for `status`.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.query("stats", |conn| {
            let files: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
            let chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
            let vectors: i64 =
                conn.query_row("SELECT COUNT(*) FROM chunk_vectors", [], |r| r.get(0))?;
            let last_indexed: Option<i64> = conn
                .query_row("SELECT MAX(last_indexed) FROM files", [], |r| r.get(0))
                .unwrap_or(None);

            let mut stmt =
                conn.prepare("SELECT language, COUNT(*) FROM files GROUP BY language")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
            })?;
            let mut languages = std::collections::BTreeMap::new();
            for row in rows {
                let (language, count) = row?;
                languages.insert(language, count);
            }

            Ok(StoreStats {
                files,
                chunks,
                vectors,
                languages,
                last_indexed,
            })
        })
        .await
    }

    /// Reclaim free pages.
    pub async fn vacuum(&self) -> Result<()> {
        self.query("vacuum", |conn| {
            conn.execute_batch("VACUUM")?;
            Ok(())
        })
        .await
    }

    /// Close the store. The connection shuts down when the last handle
    /// drops; this makes the release point explicit for scoped callers.
    pub fn close(self) {
        drop(self.conn);
    }
}

/// Shared SELECT joining chunks with their owning file.
const CHUNK_SELECT: &str = "SELECT c.id, c.file_id, f.path, c.chunk_uid, c.kind, c.name,
        c.parent, c.line_start, c.line_end, f.language, c.text, c.exported
 FROM chunks c JOIN files f ON f.id = c.file_id";

fn chunk_from_row(row: &rusqlite::Row) -> rusqlite::Result<StoredChunk> {
    let kind: String = row.get(4)?;
    let exported: i32 = row.get(11)?;
    Ok(StoredChunk {
        id: row.get(0)?,
        file_id: row.get(1)?,
        file_path: row.get(2)?,
        chunk_uid: row.get(3)?,
        kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Constant),
        name: row.get(5)?,
        parent: row.get(6)?,
        line_start: row.get(7)?,
        line_end: row.get(8)?,
        language: row.get(9)?,
        text: row.get(10)?,
        exported: exported != 0,
    })
}

fn file_from_row(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        hash: row.get(3)?,
        size: row.get(4)?,
        last_indexed: row.get(5)?,
    })
}

fn collect_chunks(
    rows: impl Iterator<Item = rusqlite::Result<StoredChunk>>,
) -> Result<Vec<StoredChunk>> {
    let mut chunks = Vec::new();
    for row in rows {
        chunks.push(row?);
    }
    Ok(chunks)
}

/// Escape `%`, `_` and `\` for a LIKE pattern with `ESCAPE '\'`.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Parse the embedding dimension out of a vec0 CREATE TABLE statement.
///
/// Looks for the `float[N]` pattern in the SQL text.
fn parse_vec_dimension(create_sql: &str) -> Option<i32> {
    let start = create_sql.find("float[")?;
    let after = &create_sql[start + 6..];
    let end = after.find(']')?;
    after[..end].trim().parse::<i32>().ok()
}

/// Database schema. The vec0 table is created separately because its
/// dimension is interpolated.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    language TEXT NOT NULL,
    hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    last_indexed INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    chunk_uid TEXT NOT NULL,
    kind TEXT NOT NULL,
    name TEXT,
    parent TEXT,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    text TEXT NOT NULL,
    imports TEXT NOT NULL DEFAULT '[]',
    exported INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);
CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);
CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(kind);
CREATE INDEX IF NOT EXISTS idx_chunks_uid ON chunks(chunk_uid);

CREATE TABLE IF NOT EXISTS dependencies (
    id INTEGER PRIMARY KEY,
    source_chunk_id INTEGER NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
    target_chunk_id INTEGER NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
    relation TEXT NOT NULL,
    UNIQUE(source_chunk_id, target_chunk_id, relation)
);

CREATE INDEX IF NOT EXISTS idx_deps_source ON dependencies(source_chunk_id);
CREATE INDEX IF NOT EXISTS idx_deps_target ON dependencies(target_chunk_id);

-- FTS5 over chunk name/text/parent, kept in sync by triggers.
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    name,
    text,
    parent,
    content=chunks,
    content_rowid=id
);

CREATE TRIGGER IF NOT EXISTS chunks_fts_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, name, text, parent)
    VALUES (new.id, new.name, new.text, new.parent);
END;

CREATE TRIGGER IF NOT EXISTS chunks_fts_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, name, text, parent)
    VALUES ('delete', old.id, old.name, old.text, old.parent);
END;

CREATE TRIGGER IF NOT EXISTS chunks_fts_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, name, text, parent)
    VALUES ('delete', old.id, old.name, old.text, old.parent);
    INSERT INTO chunks_fts(rowid, name, text, parent)
    VALUES (new.id, new.name, new.text, new.parent);
END;
"#;

#[cfg(test)]
#[path = "store.test.rs"]
mod tests;
