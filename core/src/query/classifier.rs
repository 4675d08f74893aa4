//! Query classification.
//!
//! A pure function from a raw query string to a kind plus per-strategy
//! weight multipliers. Checked in order: path, symbol, natural language,
//! keyword fallback.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Strategy;

/// Kind of query, decided syntactically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Path,
    Symbol,
    NaturalLanguage,
    Keyword,
}

/// Classification result: kind plus strategy multipliers.
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: QueryKind,
    multipliers: HashMap<Strategy, f32>,
}

impl Classification {
    fn new(kind: QueryKind, entries: &[(Strategy, f32)]) -> Self {
        Self {
            kind,
            multipliers: entries.iter().copied().collect(),
        }
    }

    /// Multiplier for a strategy; unlisted strategies are neutral.
    pub fn multiplier(&self, strategy: Strategy) -> f32 {
        self.multipliers.get(&strategy).copied().unwrap_or(1.0)
    }
}

/// Looks like a file path: contains a separator or ends in a source
/// extension.
static SOURCE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\.(ts|tsx|js|jsx|mjs|cjs|py|rs|go|java|rb|php|c|h|cpp|hpp|cs|swift|kt|scala|lua|sh|sql|json|yaml|yml|toml|md|html|css)$",
    )
    .expect("static regex")
});

/// Identifier shapes: camelCase, PascalCase, snake_case, UPPER_SNAKE.
static CAMEL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:[A-Z][a-zA-Z0-9]*)+$").expect("static regex"));
static PASCAL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z][a-z0-9]*){2,}$").expect("static regex"));
static SNAKE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$").expect("static regex"));
static UPPER_SNAKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+$").expect("static regex"));

/// Question words that mark a natural-language query.
const QUESTION_WORDS: &[&str] = &[
    "how", "what", "where", "why", "when", "which", "show", "explain", "find", "list",
];

/// Stop words used by the multi-word natural-language heuristic.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "do", "does", "did", "to", "of", "in",
    "on", "for", "with", "and", "or", "that", "this", "it", "at", "by", "from",
];

/// Classify a query string.
pub fn classify(query: &str) -> Classification {
    let query = query.trim();

    if is_path_query(query) {
        return Classification::new(
            QueryKind::Path,
            &[(Strategy::Path, 2.0), (Strategy::Ast, 0.5)],
        );
    }

    if is_symbol_query(query) {
        return Classification::new(
            QueryKind::Symbol,
            &[(Strategy::Ast, 1.5), (Strategy::Vector, 0.5)],
        );
    }

    if is_natural_language_query(query) {
        return Classification::new(
            QueryKind::NaturalLanguage,
            &[
                (Strategy::Vector, 1.5),
                (Strategy::Path, 1.2),
                (Strategy::Ast, 0.7),
            ],
        );
    }

    Classification::new(QueryKind::Keyword, &[])
}

fn is_path_query(query: &str) -> bool {
    query.contains('/') || SOURCE_EXTENSION.is_match(query)
}

fn is_symbol_query(query: &str) -> bool {
    CAMEL_CASE.is_match(query)
        || PASCAL_CASE.is_match(query)
        || SNAKE_CASE.is_match(query)
        || UPPER_SNAKE.is_match(query)
}

fn is_natural_language_query(query: &str) -> bool {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();

    if words.iter().any(|w| QUESTION_WORDS.contains(&w.as_str())) {
        return true;
    }
    words.len() >= 4 && words.iter().any(|w| STOP_WORDS.contains(&w.as_str()))
}

#[cfg(test)]
#[path = "classifier.test.rs"]
mod tests;
