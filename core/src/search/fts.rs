//! Full-text strategy and FTS query sanitization.

use crate::error::Result;
use crate::storage::Store;
use crate::types::SearchResult;

/// Characters FTS5 treats as operators; replaced with spaces.
const STRIP_CHARS: &[char] = &[
    '?', '(', ')', '"', ':', '^', '~', '{', '}', '!', '+', '-', '\\',
];

/// Sanitize a raw query for FTS5 MATCH.
///
/// Operator characters become spaces, a standalone `*` is dropped, a
/// trailing `*` on a word survives as a prefix query, underscores are
/// preserved, and whitespace collapses. Idempotent.
pub fn sanitize_fts_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut prev: Option<char> = None;
    for c in query.chars() {
        if STRIP_CHARS.contains(&c) {
            out.push(' ');
            prev = Some(' ');
            continue;
        }
        if c == '*' {
            // Keep only when attached to a word (prefix search).
            let attached = prev
                .map(|p| p.is_alphanumeric() || p == '_')
                .unwrap_or(false);
            if attached {
                out.push('*');
            } else {
                out.push(' ');
            }
            prev = Some(c);
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full-text search over chunk `{name, text, parent}`.
///
/// FTS5's rank is negative (lower is better); the strategy score is
/// `1 / (1 + |rank|)`.
pub async fn fts_search(
    store: &Store,
    query: &str,
    k: i32,
    language: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let sanitized = sanitize_fts_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }

    let fetch = if language.is_some() { k * 3 } else { k };
    let hits = store.fts_search(&sanitized, fetch).await?;
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
    let chunks = store.get_chunks_by_ids(&ids).await?;
    let rank_by_id: std::collections::HashMap<i64, f32> = hits.into_iter().collect();

    let mut results: Vec<SearchResult> = chunks
        .into_iter()
        .filter(|chunk| language.map(|l| chunk.language == l).unwrap_or(true))
        .map(|chunk| {
            let rank = rank_by_id.get(&chunk.id).copied().unwrap_or(0.0);
            SearchResult::from_chunk(&chunk, 1.0 / (1.0 + rank.abs()))
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k as usize);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_operator_characters() {
        assert_eq!(sanitize_fts_query("how? (does) \"it\" work:"), "how does it work");
        assert_eq!(sanitize_fts_query("a + b - c ^ d"), "a b c d");
        assert_eq!(sanitize_fts_query("path\\to{thing}"), "path to thing");
    }

    #[test]
    fn test_sanitize_star_handling() {
        // Trailing star on a word is a prefix query and survives.
        assert_eq!(sanitize_fts_query("index*"), "index*");
        assert_eq!(sanitize_fts_query("get_user*"), "get_user*");
        // Standalone stars vanish.
        assert_eq!(sanitize_fts_query("* index"), "index");
        assert_eq!(sanitize_fts_query("* * *"), "");
    }

    #[test]
    fn test_sanitize_preserves_underscores() {
        assert_eq!(sanitize_fts_query("compute_changes"), "compute_changes");
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize_fts_query("  a   b  "), "a b");
        assert_eq!(sanitize_fts_query("???"), "");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for query in ["how? (does) it work", "index*", "a - b", "  x  y  "] {
            let once = sanitize_fts_query(query);
            assert_eq!(sanitize_fts_query(&once), once);
        }
    }
}
