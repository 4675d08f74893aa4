//! Dependency-graph strategy: BFS over stored edges.

use std::collections::HashSet;

use crate::error::Result;
use crate::storage::Store;
use crate::types::SearchResult;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow outgoing edges: what the start chunk depends on.
    Imports,
    /// Follow incoming edges: what depends on the start chunk.
    ImportedBy,
}

/// BFS from `start_chunk` up to `depth` levels.
///
/// Neighbors at depth level `d` (0-based) score `max(0, 1 − 0.2·d)`.
/// Cycles are cut by a visited set; results come back in discovery order.
pub async fn dep_trace(
    store: &Store,
    start_chunk: i64,
    direction: Direction,
    depth: usize,
) -> Result<Vec<SearchResult>> {
    let mut visited: HashSet<i64> = HashSet::from([start_chunk]);
    let mut frontier = vec![start_chunk];
    // Discovery order with per-level scores.
    let mut discovered: Vec<(i64, f32)> = Vec::new();

    for level in 0..depth {
        if frontier.is_empty() {
            break;
        }
        let edges = match direction {
            Direction::Imports => store.outgoing(&frontier).await?,
            Direction::ImportedBy => store.incoming(&frontier).await?,
        };

        let score = (1.0 - 0.2 * level as f32).max(0.0);
        let mut next = Vec::new();
        for edge in edges {
            let neighbor = match direction {
                Direction::Imports => edge.target_chunk_id,
                Direction::ImportedBy => edge.source_chunk_id,
            };
            if visited.insert(neighbor) {
                discovered.push((neighbor, score));
                next.push(neighbor);
            }
        }
        frontier = next;
    }

    if discovered.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = discovered.iter().map(|(id, _)| *id).collect();
    let chunks = store.get_chunks_by_ids(&ids).await?;
    let by_id: std::collections::HashMap<i64, _> =
        chunks.into_iter().map(|c| (c.id, c)).collect();

    Ok(discovered
        .into_iter()
        .filter_map(|(id, score)| {
            by_id
                .get(&id)
                .map(|chunk| SearchResult::from_chunk(chunk, score))
        })
        .collect())
}

#[cfg(test)]
#[path = "dependency.test.rs"]
mod tests;
