use super::*;

fn make_result(
    chunk_id: i64,
    file_path: &str,
    kind: ChunkKind,
    line_start: i32,
    line_end: i32,
    text: &str,
) -> SearchResult {
    SearchResult {
        chunk_id,
        file_path: file_path.to_string(),
        line_start,
        line_end,
        name: None,
        kind,
        text: text.to_string(),
        score: 1.0,
        language: "typescript".to_string(),
        exported: Some(false),
    }
}

fn source(strategy: Strategy, weight: f32, results: Vec<SearchResult>) -> WeightedResults {
    WeightedResults {
        strategy,
        weight,
        results,
    }
}

#[test]
fn test_rrf_chunk_in_two_strategies_outranks_single() {
    let shared = make_result(1, "src/a.ts", ChunkKind::Function, 1, 10, "fn a");
    let only_fts = make_result(2, "src/b.ts", ChunkKind::Function, 1, 10, "fn b");

    let merged = rrf_merge(
        &[
            source(Strategy::Fts, 1.0, vec![shared.clone(), only_fts.clone()]),
            source(Strategy::Ast, 1.0, vec![shared.clone()]),
        ],
        None,
    );

    assert_eq!(merged[0].chunk_id, 1);
    // Two rank-1 contributions strictly exceed one: 2/(60+1) > 1/(60+1),
    // which survives normalization as a strict ordering.
    assert!(merged[0].score > merged[1].score);
    assert_eq!(merged[0].score, 1.0);
}

#[test]
fn test_rrf_scores_are_renormalized_to_unit_top() {
    let merged = rrf_merge(
        &[source(
            Strategy::Fts,
            0.3,
            vec![
                make_result(1, "src/a.ts", ChunkKind::Function, 1, 10, "a"),
                make_result(2, "src/b.ts", ChunkKind::Function, 1, 10, "b"),
            ],
        )],
        None,
    );
    assert_eq!(merged[0].score, 1.0);
    assert!(merged[1].score < 1.0);
    assert!(merged[1].score > 0.0);
}

#[test]
fn test_rrf_empty_sources() {
    assert!(rrf_merge(&[], None).is_empty());
    assert!(rrf_merge(&[source(Strategy::Fts, 1.0, vec![])], Some(5)).is_empty());
}

#[test]
fn test_rrf_first_seen_record_is_representative() {
    let mut from_fts = make_result(1, "src/a.ts", ChunkKind::Function, 1, 10, "fts text");
    from_fts.name = Some("fromFts".to_string());
    let mut from_ast = make_result(1, "src/a.ts", ChunkKind::Function, 1, 10, "ast text");
    from_ast.name = Some("fromAst".to_string());

    let merged = rrf_merge(
        &[
            source(Strategy::Fts, 1.0, vec![from_fts]),
            source(Strategy::Ast, 1.0, vec![from_ast]),
        ],
        None,
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].name.as_deref(), Some("fromFts"));
}

#[test]
fn test_weights_shift_ordering() {
    let a = make_result(1, "src/a.ts", ChunkKind::Function, 1, 10, "a");
    let b = make_result(2, "src/b.ts", ChunkKind::Function, 1, 10, "b");

    // Same ranks, but the vector list carries triple weight.
    let merged = rrf_merge(
        &[
            source(Strategy::Fts, 1.0, vec![a.clone()]),
            source(Strategy::Vector, 3.0, vec![b.clone()]),
        ],
        None,
    );
    assert_eq!(merged[0].chunk_id, 2);
}

#[test]
fn test_function_outranks_penalized_import_chunk() {
    // Spec scenario: a real function in src/indexer/chunker.ts against a
    // three-line import chunk in src/handler.ts for the query "indexer".
    let function = make_result(
        1,
        "src/indexer/chunker.ts",
        ChunkKind::Function,
        1,
        50,
        "export function chunk(nodes) { /* ... */ }",
    );
    let import = make_result(
        2,
        "src/handler.ts",
        ChunkKind::Import,
        1,
        3,
        "import { chunk } from \"./indexer/chunker\";",
    );

    let fused = fuse_and_rerank(
        &[
            source(Strategy::Fts, 1.0, vec![import.clone(), function.clone()]),
            source(Strategy::Path, 1.0, vec![function.clone()]),
        ],
        "indexer",
        10,
    );

    assert_eq!(fused[0].chunk_id, 1);
    assert_eq!(fused[0].score, 1.0);
    assert!(fused[1].score < fused[0].score);
}

#[test]
fn test_path_boost_tiers() {
    let terms = vec!["indexer".to_string()];
    assert_eq!(path_boost_factor("src/indexer/walker.ts", &terms), 1.5);
    assert_eq!(path_boost_factor("src/core/indexer.ts", &terms), 1.4);
    assert_eq!(path_boost_factor("src/core/reindexer_x.ts", &terms), 1.2);
    assert_eq!(path_boost_factor("src/core/other.ts", &terms), 1.0);

    // Short tokens are not boost terms.
    assert!(boost_terms("a b indexer").len() == 1);
}

#[test]
fn test_is_test_path() {
    assert!(is_test_path("src/__tests__/chunker.ts"));
    assert!(is_test_path("tests/integration.ts"));
    assert!(is_test_path("src/chunker.test.ts"));
    assert!(is_test_path("src/chunker.spec.tsx"));
    assert!(!is_test_path("src/chunker.ts"));
    assert!(!is_test_path("src/testing_utils.ts"));
    // A Rust-style test path is not matched by the JS-family filename rule
    // unless it sits under a tests directory.
    assert!(is_test_path("tests/store.rs"));
    assert!(!is_test_path("src/store_test.rs"));
}

#[test]
fn test_test_files_are_deprioritized() {
    let prod = make_result(1, "src/auth.ts", ChunkKind::Function, 1, 20, "fn auth");
    let test = make_result(2, "src/auth.test.ts", ChunkKind::Function, 1, 20, "fn test");

    let fused = fuse_and_rerank(
        &[source(Strategy::Fts, 1.0, vec![test, prod])],
        "auth",
        10,
    );
    // The test file entered at rank 1 but loses to the penalty.
    assert_eq!(fused[0].chunk_id, 1);
}

#[test]
fn test_public_api_boost_applies_to_exported_flag_and_text() {
    let mut flagged = make_result(1, "src/a.ts", ChunkKind::Function, 1, 20, "function a() {}");
    flagged.exported = Some(true);
    let textual = make_result(
        2,
        "src/b.ts",
        ChunkKind::Function,
        1,
        20,
        "  export function b() {}",
    );
    let private = make_result(3, "src/c.ts", ChunkKind::Function, 1, 20, "function c() {}");

    let fused = fuse_and_rerank(
        &[source(
            Strategy::Fts,
            1.0,
            vec![private.clone(), flagged.clone(), textual.clone()],
        )],
        "zz",
        10,
    );
    // Both exported chunks overtake the rank-1 private chunk.
    let private_position = fused.iter().position(|r| r.chunk_id == 3).unwrap();
    assert_eq!(private_position, 2);
}

#[test]
fn test_file_diversity_diminishing_returns() {
    let results: Vec<SearchResult> = (1..=5)
        .map(|i| make_result(i, "src/same.ts", ChunkKind::Function, 1, 20, "fn"))
        .collect();
    let other = make_result(9, "src/other.ts", ChunkKind::Function, 1, 20, "fn");

    let mut all = results;
    all.push(other);
    let fused = fuse_and_rerank(&[source(Strategy::Fts, 1.0, all)], "zz", 10);

    // The single chunk from the other file climbs past the deep repeats
    // of the first file.
    let other_position = fused.iter().position(|r| r.chunk_id == 9).unwrap();
    assert!(other_position < 4, "diversity should lift src/other.ts, got {other_position}");
}

#[test]
fn test_fused_scores_within_unit_interval() {
    let results: Vec<SearchResult> = (1..=6)
        .map(|i| {
            make_result(
                i,
                &format!("src/file{i}.ts"),
                ChunkKind::Function,
                1,
                20,
                "fn",
            )
        })
        .collect();
    let fused = fuse_and_rerank(&[source(Strategy::Fts, 1.0, results)], "query terms", 4);

    assert_eq!(fused.len(), 4);
    assert_eq!(fused[0].score, 1.0);
    for result in &fused {
        assert!(result.score > 0.0 && result.score <= 1.0);
    }
}
