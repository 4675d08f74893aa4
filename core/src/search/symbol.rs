//! Symbol (AST metadata) strategy.

use crate::error::Result;
use crate::storage::NameMatch;
use crate::storage::Store;
use crate::storage::SymbolQuery;
use crate::types::ChunkKind;
use crate::types::SearchResult;

/// How a symbol name is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Exact,
    Prefix,
    /// Substring match.
    Fuzzy,
}

impl MatchMode {
    fn name_match(self) -> NameMatch {
        match self {
            Self::Exact => NameMatch::Exact,
            Self::Prefix => NameMatch::Prefix,
            Self::Fuzzy => NameMatch::Contains,
        }
    }

    /// Strategy-local score: looser matches rank lower.
    fn score(self) -> f32 {
        match self {
            Self::Exact => 1.0,
            Self::Prefix => 0.8,
            Self::Fuzzy => 0.5,
        }
    }
}

/// Structured symbol lookup.
#[derive(Debug, Clone, Default)]
pub struct AstQuery {
    pub name: Option<String>,
    pub kind: Option<ChunkKind>,
    pub parent: Option<String>,
    pub language: Option<String>,
    pub match_mode: MatchMode,
}

/// Search chunk metadata (name, kind, parent, language).
pub async fn ast_search(store: &Store, query: &AstQuery, k: i32) -> Result<Vec<SearchResult>> {
    let symbol_query = SymbolQuery {
        name: query.name.clone(),
        name_match: Some(query.match_mode.name_match()),
        kind: query.kind,
        parent: query.parent.clone(),
        language: query.language.clone(),
    };
    let chunks = store.search_chunks(&symbol_query, k).await?;
    let score = query.match_mode.score();
    Ok(chunks
        .iter()
        .map(|chunk| SearchResult::from_chunk(chunk, score))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_mode_scores() {
        assert_eq!(MatchMode::Exact.score(), 1.0);
        assert_eq!(MatchMode::Prefix.score(), 0.8);
        assert_eq!(MatchMode::Fuzzy.score(), 0.5);
    }
}
