use super::*;

#[test]
fn test_natural_language_question() {
    let c = classify("how does the indexer work");
    assert_eq!(c.kind, QueryKind::NaturalLanguage);
    assert_eq!(c.multiplier(Strategy::Vector), 1.5);
    assert_eq!(c.multiplier(Strategy::Path), 1.2);
    assert_eq!(c.multiplier(Strategy::Ast), 0.7);
    assert_eq!(c.multiplier(Strategy::Fts), 1.0);
    assert_eq!(c.multiplier(Strategy::Dependency), 1.0);
}

#[test]
fn test_symbol_camel_case() {
    let c = classify("computeChanges");
    assert_eq!(c.kind, QueryKind::Symbol);
    assert_eq!(c.multiplier(Strategy::Ast), 1.5);
    assert_eq!(c.multiplier(Strategy::Vector), 0.5);
    assert_eq!(c.multiplier(Strategy::Fts), 1.0);
}

#[test]
fn test_symbol_shapes() {
    assert_eq!(classify("snake_case_name").kind, QueryKind::Symbol);
    assert_eq!(classify("MAX_RETRY_COUNT").kind, QueryKind::Symbol);
    assert_eq!(classify("HybridSearcher").kind, QueryKind::Symbol);
    assert_eq!(classify("XMLParser").kind, QueryKind::Symbol);
}

#[test]
fn test_path_query() {
    let c = classify("src/indexer/incremental.ts");
    assert_eq!(c.kind, QueryKind::Path);
    assert_eq!(c.multiplier(Strategy::Path), 2.0);
    assert_eq!(c.multiplier(Strategy::Ast), 0.5);
    assert_eq!(c.multiplier(Strategy::Vector), 1.0);

    // An extension alone is enough.
    assert_eq!(classify("incremental.ts").kind, QueryKind::Path);
}

#[test]
fn test_keyword_fallback() {
    let c = classify("indexer chunker");
    assert_eq!(c.kind, QueryKind::Keyword);
    for strategy in Strategy::ALL {
        assert_eq!(c.multiplier(strategy), 1.0);
    }

    assert_eq!(classify("indexer").kind, QueryKind::Keyword);
}

#[test]
fn test_classification_order_path_wins_over_symbol() {
    // Contains a slash, so path classification runs before symbol.
    assert_eq!(classify("src/computeChanges").kind, QueryKind::Path);
}

#[test]
fn test_natural_language_by_length_and_stop_word() {
    // No question word, but four words and a stop word.
    assert_eq!(
        classify("parse errors in chunker").kind,
        QueryKind::NaturalLanguage
    );
    // Three words, no question word: stays keyword.
    assert_eq!(classify("parse chunker errors").kind, QueryKind::Keyword);
}

#[test]
fn test_symbol_multiplier_invariants() {
    let c = classify("computeChanges");
    assert!(c.multiplier(Strategy::Ast) > c.multiplier(Strategy::Fts));
    assert!(c.multiplier(Strategy::Ast) > c.multiplier(Strategy::Vector));

    let c = classify("how does caching work");
    assert!(c.multiplier(Strategy::Vector) > c.multiplier(Strategy::Fts));
    assert!(c.multiplier(Strategy::Vector) > c.multiplier(Strategy::Ast));
}

#[test]
fn test_trimming() {
    assert_eq!(classify("  computeChanges  ").kind, QueryKind::Symbol);
}
