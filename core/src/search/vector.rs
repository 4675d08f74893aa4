//! Vector KNN strategy.

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::storage::Store;
use crate::types::SearchResult;

/// Semantic search: embed the query, KNN over stored vectors, join with
/// chunk metadata. Scores are `1 / (1 + distance)`.
pub async fn vector_search(
    store: &Store,
    embedder: &dyn Embedder,
    query: &str,
    k: i32,
    language: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let embedding = embedder.embed_single(query).await?;

    // Over-fetch when a language filter will drop rows afterwards.
    let fetch = if language.is_some() { k * 3 } else { k };
    let neighbors = store.knn_search(&embedding, fetch).await?;
    if neighbors.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = neighbors.iter().map(|(id, _)| *id).collect();
    let chunks = store.get_chunks_by_ids(&ids).await?;
    let distance_by_id: std::collections::HashMap<i64, f32> = neighbors.into_iter().collect();

    let mut results: Vec<SearchResult> = chunks
        .into_iter()
        .filter(|chunk| language.map(|l| chunk.language == l).unwrap_or(true))
        .map(|chunk| {
            let distance = distance_by_id.get(&chunk.id).copied().unwrap_or(f32::MAX);
            SearchResult::from_chunk(&chunk, 1.0 / (1.0 + distance))
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k as usize);
    Ok(results)
}
