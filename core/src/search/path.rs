//! Path strategy: glob matching and path-keyword scoring.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CtxErr;
use crate::error::Result;
use crate::storage::Store;
use crate::types::SearchResult;

/// Translate a glob into an anchored regex.
///
/// `**` crosses path segments, `*` stays within one, `?` matches a single
/// non-separator character; every other regex metacharacter is escaped.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    out.push_str(".*");
                    i += 2;
                    continue;
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            c if "\\.+()[]{}^$|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Glob search: chunks of every stored file whose path matches.
pub async fn path_glob(store: &Store, pattern: &str, k: i32) -> Result<Vec<SearchResult>> {
    let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| CtxErr::SearchFailed {
        cause: format!("glob `{pattern}`: {e}"),
    })?;

    let mut results = Vec::new();
    for file in store.all_files().await? {
        if !regex.is_match(&file.path) {
            continue;
        }
        for chunk in store.get_chunks_by_file(file.id).await? {
            results.push(SearchResult::from_chunk(&chunk, 1.0));
            if results.len() >= k as usize {
                return Ok(results);
            }
        }
    }
    Ok(results)
}

/// Keyword search over paths: directory-segment exact match scores 1.0,
/// filename (sans extension) exact match 0.9, any case-insensitive
/// substring 0.7. Chunks inherit their path's score.
pub async fn path_keyword(store: &Store, term: &str, k: i32) -> Result<Vec<SearchResult>> {
    let term_lower = term.to_lowercase();

    let mut scored: Vec<(f32, i64, String)> = Vec::new();
    for file in store.all_files().await? {
        let Some(score) = path_keyword_score(&file.path, term, &term_lower) else {
            continue;
        };
        scored.push((score, file.id, file.path));
    }
    // Best tier first; path order within a tier.
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut results = Vec::new();
    for (score, file_id, _) in scored {
        for chunk in store.get_chunks_by_file(file_id).await? {
            results.push(SearchResult::from_chunk(&chunk, score));
            if results.len() >= k as usize {
                return Ok(results);
            }
        }
    }
    Ok(results)
}

/// Score one path against a keyword; `None` means no match.
fn path_keyword_score(path: &str, term: &str, term_lower: &str) -> Option<f32> {
    let segments: Vec<&str> = path.split('/').collect();
    let (dirs, filename) = segments.split_at(segments.len().saturating_sub(1));

    if dirs.iter().any(|segment| *segment == term) {
        return Some(1.0);
    }
    if let Some(filename) = filename.first() {
        let stem = filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(filename);
        if stem == term {
            return Some(0.9);
        }
    }
    if path.to_lowercase().contains(term_lower) {
        return Some(0.7);
    }
    None
}

/// Quick syntactic check: does a query look like a glob pattern?
pub fn looks_like_glob(query: &str) -> bool {
    static GLOB_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*?\[\]]").expect("static regex"));
    GLOB_CHARS.is_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        Regex::new(&glob_to_regex(pattern)).unwrap().is_match(path)
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("src/*.ts", "src/a.ts"));
        assert!(!matches("src/*.ts", "src/sub/a.ts"));
        assert!(matches("src/indexer/*", "src/indexer/walker.ts"));
        assert!(!matches("src/indexer/*", "src/indexer/sub/walker.ts"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(matches("src/**/*.ts", "src/a/b/c.ts"));
        assert!(matches("**/walker.ts", "src/indexing/walker.ts"));
        assert!(matches("src/**", "src/deep/nested/file.ts"));
    }

    #[test]
    fn test_question_mark_is_single_non_separator() {
        assert!(matches("src/?.ts", "src/a.ts"));
        assert!(!matches("src/?.ts", "src/ab.ts"));
        assert!(!matches("src?a.ts", "src/a.ts"));
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        assert!(matches("src/a.ts", "src/a.ts"));
        // `.` must not act as a regex wildcard.
        assert!(!matches("src/a.ts", "src/axts"));
        assert!(matches("pkg/(x)/y.ts", "pkg/(x)/y.ts"));
    }

    #[test]
    fn test_path_keyword_tiers() {
        assert_eq!(
            path_keyword_score("src/indexer/walker.ts", "indexer", "indexer"),
            Some(1.0)
        );
        assert_eq!(
            path_keyword_score("src/core/indexer.ts", "indexer", "indexer"),
            Some(0.9)
        );
        assert_eq!(
            path_keyword_score("src/core/reindexer_util.ts", "indexer", "indexer"),
            Some(0.7)
        );
        assert_eq!(path_keyword_score("src/core/other.ts", "indexer", "indexer"), None);
    }

    #[test]
    fn test_looks_like_glob() {
        assert!(looks_like_glob("src/*.ts"));
        assert!(looks_like_glob("src/**"));
        assert!(!looks_like_glob("src/indexer"));
    }
}
