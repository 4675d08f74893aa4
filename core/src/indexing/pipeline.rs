//! The indexing pipeline.
//!
//! Discovery → change detection → parse → chunk → store → embed. Each
//! changed file is replaced whole: old chunks (with their vectors, edges
//! and FTS rows) go first, then the fresh parse is inserted. Vector
//! writes for the run land in one transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::chunking::Chunker;
use crate::chunking::DEFAULT_MAX_TOKENS;
use crate::embeddings::Embedder;
use crate::embeddings::ProgressFn;
use crate::error::CtxErr;
use crate::error::Result;
use crate::indexing::Walker;
use crate::indexing::compute_changes;
use crate::parser::SourceParser;
use crate::storage::Store;
use crate::types::ChunkInput;
use crate::types::IndexStats;

/// Options for one indexing run.
pub struct IndexOptions {
    /// Parse and store chunks but skip the embedding phase.
    pub skip_embedding: bool,
    /// Token budget per chunk.
    pub max_tokens: usize,
    /// Extra ignore patterns on top of the built-ins and ignore files.
    pub extra_ignore: Vec<String>,
    /// Checked between files; cancelling aborts cleanly.
    pub cancel: Option<CancellationToken>,
    /// Embedding progress callback.
    pub progress: Option<ProgressFn>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            skip_embedding: false,
            max_tokens: DEFAULT_MAX_TOKENS,
            extra_ignore: Vec::new(),
            cancel: None,
            progress: None,
        }
    }
}

/// Run one incremental indexing pass against an open store.
///
/// The caller (the façade) owns store acquisition, configuration, and the
/// embedder gate; this function owns everything from discovery onwards.
pub async fn run_index(
    root: &Path,
    store: &Store,
    embedder: Option<Arc<dyn Embedder>>,
    options: IndexOptions,
) -> Result<IndexStats> {
    let started = Instant::now();
    let cancel = options.cancel.clone().unwrap_or_default();

    // Phase 1: discovery.
    let discovered = Walker::new(root)
        .with_extra_ignore(&options.extra_ignore)
        .discover()?;
    tracing::debug!(files = discovered.len(), "discovery complete");

    // Phase 2: change detection.
    let changes = compute_changes(&discovered, store).await?;
    tracing::info!(
        added = changes.added.len(),
        modified = changes.modified.len(),
        deleted = changes.deleted.len(),
        unchanged = changes.unchanged.len(),
        "change detection complete"
    );

    // Phase 3: deletions cascade through the store.
    for path in &changes.deleted {
        if cancel.is_cancelled() {
            return Err(CtxErr::Cancelled);
        }
        store.delete_file(path).await?;
    }

    // Phase 4: parse and chunk changed files, replacing them whole.
    let by_path: HashMap<&str, &crate::types::DiscoveredFile> = discovered
        .iter()
        .map(|f| (f.rel_path.as_str(), f))
        .collect();
    let mut parser = SourceParser::new();
    let chunker = Chunker::new(options.max_tokens);
    let mut chunks_created = 0usize;
    // (chunk row id, embedding input text) for the embedding phase.
    let mut pending_embeddings: Vec<(i64, String)> = Vec::new();

    for path in changes.to_index() {
        if cancel.is_cancelled() {
            return Err(CtxErr::Cancelled);
        }
        let Some(file) = by_path.get(path.as_str()) else {
            continue;
        };

        if let Some(existing) = store.get_file(&path).await? {
            store.delete_chunks_by_file(existing.id).await?;
        }

        let nodes = match parser.parse_file(&file.abs_path, &file.language) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "parse failed, file skipped");
                continue;
            }
        };
        let chunks = chunker.chunk(&nodes, &path);

        let file_id = store
            .upsert_file(&path, &file.language, &changes.hashes[&path], file.size as i64)
            .await?;
        let ids = store.insert_chunks(file_id, &chunks).await?;
        chunks_created += ids.len();
        pending_embeddings.extend(
            ids.into_iter()
                .zip(chunks.iter().map(|c| embedding_text(&path, c))),
        );
    }

    // Phase 5: embed new chunks and store vectors atomically.
    let mut vectors_created = 0usize;
    if !options.skip_embedding && !pending_embeddings.is_empty() {
        if let Some(embedder) = embedder {
            let texts: Vec<String> =
                pending_embeddings.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = embedder.embed(&texts, options.progress).await?;
            let rows: Vec<(i64, Vec<f32>)> = pending_embeddings
                .iter()
                .map(|(id, _)| *id)
                .zip(embeddings.into_iter())
                .collect();
            store.insert_vectors(&rows).await?;
            vectors_created = rows.len();
        }
    }

    let mut languages = std::collections::BTreeMap::new();
    for file in &discovered {
        *languages.entry(file.language.clone()).or_insert(0) += 1;
    }

    Ok(IndexStats {
        files_discovered: discovered.len(),
        files_added: changes.added.len(),
        files_modified: changes.modified.len(),
        files_deleted: changes.deleted.len(),
        files_unchanged: changes.unchanged.len(),
        chunks_created,
        vectors_created,
        duration_ms: started.elapsed().as_millis() as u64,
        languages,
    })
}

/// Text handed to the embedder for a chunk: path, optional parent, body.
/// The explicit path line gives directory context semantic weight.
fn embedding_text(rel_path: &str, chunk: &ChunkInput) -> String {
    match &chunk.parent {
        Some(parent) => format!("{rel_path}\n{parent}\n{}", chunk.text),
        None => format!("{rel_path}\n{}", chunk.text),
    }
}

#[cfg(test)]
#[path = "pipeline.test.rs"]
mod tests;
