//! Reciprocal Rank Fusion and post-fusion re-ranking.
//!
//! RRF accumulates `weight / (K + rank)` per strategy with K = 60 and
//! 1-based ranks. The fused pipeline then applies multiplicative
//! adjustments: path boosts, import/test/small-snippet penalties, a
//! public-API boost, and per-file diminishing returns, before a final
//! normalization to [0, 1].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Strategy;
use crate::types::ChunkKind;
use crate::types::SearchResult;

/// RRF constant.
pub const RRF_K: f32 = 60.0;

/// Candidate multiplier applied to `limit` before fusion.
const OVERFETCH_FACTOR: usize = 3;

/// Re-ranking factors.
const DIR_SEGMENT_BOOST: f32 = 1.5;
const FILENAME_BOOST: f32 = 1.4;
const SUBSTRING_BOOST: f32 = 1.2;
const IMPORT_PENALTY: f32 = 0.5;
const TEST_FILE_PENALTY: f32 = 0.65;
const SMALL_SNIPPET_PENALTY: f32 = 0.75;
const PUBLIC_API_BOOST: f32 = 1.12;
/// Snippets at or under this many lines count as small.
const SMALL_SNIPPET_LINES: i32 = 3;
/// Diminishing returns for the n-th chunk of one file.
const FILE_DIVERSITY_FACTORS: [f32; 4] = [1.0, 0.9, 0.8, 0.7];

/// One strategy's ranked results with its effective weight.
#[derive(Debug, Clone)]
pub struct WeightedResults {
    pub strategy: Strategy,
    pub weight: f32,
    pub results: Vec<SearchResult>,
}

/// Merge ranked lists with Reciprocal Rank Fusion.
///
/// The first-seen record of a chunk is kept as its representative. The
/// output is sorted, optionally truncated, and re-normalized so the top
/// score is exactly 1.0 (all-zero scores stay zero).
pub fn rrf_merge(sources: &[WeightedResults], limit: Option<usize>) -> Vec<SearchResult> {
    let mut scores: HashMap<i64, f32> = HashMap::new();
    let mut representatives: HashMap<i64, SearchResult> = HashMap::new();

    for source in sources {
        for (index, result) in source.results.iter().enumerate() {
            let rank = index as f32 + 1.0;
            *scores.entry(result.chunk_id).or_insert(0.0) += source.weight / (RRF_K + rank);
            representatives
                .entry(result.chunk_id)
                .or_insert_with(|| result.clone());
        }
    }

    let mut merged: Vec<SearchResult> = representatives
        .into_values()
        .map(|mut result| {
            result.score = scores.get(&result.chunk_id).copied().unwrap_or(0.0);
            result
        })
        .collect();
    sort_by_score(&mut merged);
    if let Some(limit) = limit {
        merged.truncate(limit);
    }
    renormalize(&mut merged);
    merged
}

/// The full fused pipeline used by the query path: RRF with over-fetch,
/// boosts and penalties, diversity, then truncate + normalize.
pub fn fuse_and_rerank(
    sources: &[WeightedResults],
    query: &str,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results = rrf_merge(sources, Some(limit * OVERFETCH_FACTOR));
    let boost_terms = boost_terms(query);

    // Path boost: best matching tier wins, per result.
    for result in &mut results {
        result.score *= path_boost_factor(&result.file_path, &boost_terms);
    }

    // Import deprioritization, only when something better exists.
    let has_non_import = results
        .iter()
        .any(|r| r.kind != ChunkKind::Import && r.score > 0.0);
    if has_non_import {
        for result in &mut results {
            if result.kind == ChunkKind::Import {
                result.score *= IMPORT_PENALTY;
            }
        }
    }

    // Test-file deprioritization.
    let has_non_test = results
        .iter()
        .any(|r| !is_test_path(&r.file_path) && r.score > 0.0);
    if has_non_test {
        for result in &mut results {
            if is_test_path(&result.file_path) {
                result.score *= TEST_FILE_PENALTY;
            }
        }
    }

    // Small-snippet deprioritization.
    let has_non_small = results.iter().any(|r| !is_small(r) && r.score > 0.0);
    if has_non_small {
        for result in &mut results {
            if is_small(result) {
                result.score *= SMALL_SNIPPET_PENALTY;
            }
        }
    }

    // Public-API boost.
    for result in &mut results {
        let text_exported = result
            .text
            .trim_start()
            .get(..7)
            .map(|head| head.eq_ignore_ascii_case("export "))
            .unwrap_or(false);
        if result.exported == Some(true) || text_exported {
            result.score *= PUBLIC_API_BOOST;
        }
    }

    // Diminishing returns per file, walking the current ranking.
    sort_by_score(&mut results);
    let mut seen_per_file: HashMap<String, usize> = HashMap::new();
    for result in &mut results {
        let n = seen_per_file.entry(result.file_path.clone()).or_insert(0);
        let factor = FILE_DIVERSITY_FACTORS
            .get(*n)
            .copied()
            .unwrap_or(*FILE_DIVERSITY_FACTORS.last().expect("non-empty"));
        result.score *= factor;
        *n += 1;
    }

    sort_by_score(&mut results);
    results.truncate(limit);
    renormalize(&mut results);
    results
}

/// Query tokens used for path boosting: whitespace-split, length ≥ 2.
fn boost_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Max boost over the term set: directory segment 1.5, filename 1.4,
/// substring 1.2, otherwise neutral.
fn path_boost_factor(path: &str, terms: &[String]) -> f32 {
    let mut factor = 1.0f32;
    let path_lower = path.to_lowercase();
    let segments: Vec<&str> = path.split('/').collect();
    let (dirs, filename) = segments.split_at(segments.len().saturating_sub(1));
    let stem = filename
        .first()
        .map(|f| f.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(f));

    for term in terms {
        let tier = if dirs.iter().any(|segment| segment == term) {
            DIR_SEGMENT_BOOST
        } else if stem == Some(term.as_str()) {
            FILENAME_BOOST
        } else if path_lower.contains(&term.to_lowercase()) {
            SUBSTRING_BOOST
        } else {
            1.0
        };
        factor = factor.max(tier);
    }
    factor
}

/// Test-file convention: under a `tests`/`__tests__` directory, or named
/// `*.test.*` / `*.spec.*` with a JS-family extension.
pub fn is_test_path(path: &str) -> bool {
    static TEST_FILE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\.(test|spec)\.(js|mjs|cjs|ts|tsx|jsx)$").expect("static regex")
    });
    let segments: Vec<&str> = path.split('/').collect();
    let dirs = &segments[..segments.len().saturating_sub(1)];
    if dirs.iter().any(|d| *d == "tests" || *d == "__tests__") {
        return true;
    }
    segments
        .last()
        .map(|name| TEST_FILE.is_match(name))
        .unwrap_or(false)
}

fn is_small(result: &SearchResult) -> bool {
    result.line_end - result.line_start + 1 <= SMALL_SNIPPET_LINES
}

fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

/// Scale so the top score is exactly 1.0. All-zero inputs stay zero.
fn renormalize(results: &mut [SearchResult]) {
    let top = results.first().map(|r| r.score).unwrap_or(0.0);
    if top > 0.0 {
        for result in results.iter_mut() {
            result.score /= top;
        }
    }
}

#[cfg(test)]
#[path = "fusion.test.rs"]
mod tests;
