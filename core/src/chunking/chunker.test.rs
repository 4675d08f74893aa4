use super::*;

fn node(
    kind: AstNodeKind,
    name: Option<&str>,
    parent: Option<&str>,
    line_start: i32,
    line_end: i32,
    text: &str,
) -> AstNode {
    AstNode {
        kind,
        name: name.map(String::from),
        parent: parent.map(String::from),
        line_start,
        line_end,
        language: "typescript".to_string(),
        text: text.to_string(),
        params: None,
        return_type: None,
        docstring: None,
        exported: false,
    }
}

#[test]
fn test_empty_nodes_yield_empty_chunks() {
    let chunker = Chunker::default();
    assert!(chunker.chunk(&[], "src/a.ts").is_empty());
}

#[test]
fn test_imports_collapse_into_one_chunk() {
    let chunker = Chunker::default();
    let nodes = vec![
        node(AstNodeKind::Import, None, None, 1, 1, "import a from \"a\";"),
        node(AstNodeKind::Import, None, None, 2, 2, "import b from \"b\";"),
        node(AstNodeKind::Import, None, None, 4, 4, "import c from \"c\";"),
    ];
    let chunks = chunker.chunk(&nodes, "src/a.ts");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Import);
    assert_eq!(chunks[0].line_start, 1);
    assert_eq!(chunks[0].line_end, 4);
    assert_eq!(
        chunks[0].text,
        "import a from \"a\";\nimport b from \"b\";\nimport c from \"c\";"
    );
    // The import chunk itself carries no import context.
    assert!(chunks[0].imports.is_empty());
}

#[test]
fn test_class_suppressed_when_methods_present() {
    let chunker = Chunker::default();
    let nodes = vec![
        node(
            AstNodeKind::Class,
            Some("UserService"),
            None,
            1,
            10,
            "class UserService { ... }",
        ),
        node(
            AstNodeKind::Method,
            Some("find"),
            Some("UserService"),
            2,
            5,
            "find(id) { return 1; }",
        ),
        node(
            AstNodeKind::Method,
            Some("save"),
            Some("UserService"),
            6,
            9,
            "save(u) { return 2; }",
        ),
    ];
    let chunks = chunker.chunk(&nodes, "src/users.ts");

    let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChunkKind::Method, ChunkKind::Method]);
    assert!(chunks.iter().all(|c| c.parent.as_deref() == Some("UserService")));
}

#[test]
fn test_class_without_methods_is_emitted() {
    let chunker = Chunker::default();
    let nodes = vec![node(
        AstNodeKind::Class,
        Some("Marker"),
        None,
        1,
        3,
        "class Marker {}",
    )];
    let chunks = chunker.chunk(&nodes, "src/marker.ts");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Class);
}

#[test]
fn test_oversized_node_splits_contiguously() {
    // 40 lines of 20 words each is roughly 1040 estimated tokens.
    let line = "word ".repeat(20);
    let text = vec![line.trim_end(); 40].join("\n");
    let chunker = Chunker::new(500);
    let nodes = vec![node(
        AstNodeKind::Function,
        Some("big"),
        None,
        10,
        49,
        &text,
    )];
    let chunks = chunker.chunk(&nodes, "src/big.ts");

    assert!(chunks.len() > 1, "expected a split, got {}", chunks.len());
    // Sub-chunks inherit identity and tile the original range.
    assert_eq!(chunks[0].line_start, 10);
    assert_eq!(chunks.last().unwrap().line_end, 49);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].line_start, pair[0].line_end + 1);
        assert_eq!(pair[1].kind, ChunkKind::Function);
        assert_eq!(pair[1].name.as_deref(), Some("big"));
    }
    for chunk in &chunks {
        assert!(estimate_tokens(&chunk.text) <= 500 || chunk.text.lines().count() <= 2);
    }
}

#[test]
fn test_adjacent_small_constants_merge() {
    let chunker = Chunker::default();
    let nodes = vec![
        node(AstNodeKind::Constant, Some("A"), None, 1, 1, "const A = 1;"),
        node(AstNodeKind::Constant, Some("B"), None, 2, 2, "const B = 2;"),
        node(AstNodeKind::Constant, Some("C"), None, 3, 3, "const C = 3;"),
    ];
    let chunks = chunker.chunk(&nodes, "src/consts.ts");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Constant);
    assert_eq!(chunks[0].name.as_deref(), Some("A"));
    assert_eq!(chunks[0].line_start, 1);
    assert_eq!(chunks[0].line_end, 3);
    assert_eq!(chunks[0].text, "const A = 1;\nconst B = 2;\nconst C = 3;");
    // The merged hash covers the combined text and range.
    assert_eq!(chunks[0].content_hash, content_hash(&chunks[0].text));
    assert_eq!(chunks[0].chunk_uid, stable_chunk_uid("src/consts.ts", 1, 3));
}

#[test]
fn test_functions_never_merge() {
    let chunker = Chunker::default();
    let nodes = vec![
        node(AstNodeKind::Function, Some("a"), None, 1, 1, "function a() {}"),
        node(AstNodeKind::Function, Some("b"), None, 2, 2, "function b() {}"),
    ];
    let chunks = chunker.chunk(&nodes, "src/f.ts");
    assert_eq!(chunks.len(), 2);
}

#[test]
fn test_imports_attached_to_non_import_chunks() {
    let chunker = Chunker::default();
    let nodes = vec![
        node(AstNodeKind::Import, None, None, 1, 1, "import x from \"x\";"),
        node(
            AstNodeKind::Function,
            Some("useX"),
            None,
            3,
            5,
            "function useX() { return x; }",
        ),
    ];
    let chunks = chunker.chunk(&nodes, "src/a.ts");

    assert_eq!(chunks.len(), 2);
    let function = chunks.iter().find(|c| c.kind == ChunkKind::Function).unwrap();
    assert_eq!(function.imports, vec!["import x from \"x\";".to_string()]);
}

#[test]
fn test_export_node_chunks_as_constant() {
    let chunker = Chunker::default();
    let nodes = vec![AstNode {
        exported: true,
        ..node(AstNodeKind::Export, None, None, 1, 1, "export { a } from \"./a\";")
    }];
    let chunks = chunker.chunk(&nodes, "src/a.ts");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Constant);
    assert!(chunks[0].exported);
}

#[test]
fn test_config_language_constant_becomes_config_chunk() {
    let chunker = Chunker::default();
    let mut cfg = node(AstNodeKind::Constant, None, None, 1, 3, "{\n  \"a\": 1\n}");
    cfg.language = "json".to_string();
    let chunks = chunker.chunk(&[cfg], "package.json");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Config);
}

#[test]
fn test_token_estimate() {
    assert_eq!(estimate_tokens(""), 0);
    // 10 words * 1.3 = 13.
    assert_eq!(estimate_tokens(&"w ".repeat(10)), 13);
    // 3 words * 1.3 = 3.9, rounded up.
    assert_eq!(estimate_tokens("a b c"), 4);
}
