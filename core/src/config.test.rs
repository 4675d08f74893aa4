use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::*;

#[test]
fn test_defaults() {
    let config = ProjectConfig::default();
    assert_eq!(config.embedder.provider, "local");
    assert_eq!(config.embedder.dimensions, 384);
    assert_eq!(config.search.default_limit, 10);
    assert_eq!(
        config.search.strategies,
        vec![Strategy::Fts, Strategy::Ast, Strategy::Path]
    );
    assert_eq!(config.llm.provider, "null");
    config.validate().unwrap();
}

#[test]
fn test_missing_subtrees_merge_with_defaults() {
    let config = ProjectConfig::from_json(r#"{"search": {"defaultLimit": 25}}"#).unwrap();
    assert_eq!(config.search.default_limit, 25);
    // Untouched subtrees fall back to defaults.
    assert_eq!(config.embedder.provider, "local");
    assert_eq!(config.watch.debounce_ms, 500);
}

#[test]
fn test_weights_parse_by_strategy_name() {
    let config =
        ProjectConfig::from_json(r#"{"search": {"weights": {"vector": 1.5, "ast": 0.5}}}"#)
            .unwrap();
    assert_eq!(config.search.weight(Strategy::Vector), 1.5);
    assert_eq!(config.search.weight(Strategy::Ast), 0.5);
    // Unset strategies default to 1.0.
    assert_eq!(config.search.weight(Strategy::Fts), 1.0);
}

#[test]
fn test_save_preserves_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let path = ProjectConfig::path_for(root);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"editorPlugin": {"theme": "dark"}, "search": {"defaultLimit": 3}}"#,
    )
    .unwrap();

    let mut config = ProjectConfig::load(root).unwrap();
    assert_eq!(config.search.default_limit, 3);
    config.search.default_limit = 7;
    config.save(root).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["editorPlugin"]["theme"], "dark");
    assert_eq!(written["search"]["defaultLimit"], 7);
}

#[test]
fn test_load_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ProjectConfig::load(dir.path()).unwrap();
    assert_eq!(config, ProjectConfig::default());
}

#[test]
fn test_validate_rejects_unknown_provider() {
    let mut config = ProjectConfig::default();
    config.embedder.provider = "skynet".to_string();
    let err = config.validate().unwrap_err();
    assert_eq!(err.code(), "config_invalid");
    assert!(err.to_string().contains("embedder.provider"));
}

#[test]
fn test_validate_rejects_bad_numbers() {
    let mut config = ProjectConfig::default();
    config.embedder.dimensions = 0;
    assert!(config.validate().is_err());

    let mut config = ProjectConfig::default();
    config.search.default_limit = -1;
    assert!(config.validate().is_err());

    let mut config = ProjectConfig::default();
    config.watch.debounce_ms = 0;
    assert!(config.validate().is_err());

    let mut config = ProjectConfig::default();
    config.search.weights.insert(Strategy::Vector, -0.5);
    assert!(config.validate().is_err());
}

#[test]
fn test_strategy_round_trip() {
    for strategy in Strategy::ALL {
        assert_eq!(Strategy::parse(strategy.as_str()), Some(strategy));
    }
    assert_eq!(Strategy::parse("grep"), None);
}

#[test]
fn test_embedder_signature() {
    let config = EmbedderConfig {
        provider: "openai".to_string(),
        model: "text-embedding-3-small".to_string(),
        dimensions: 1536,
    };
    assert_eq!(config.signature(), "openai/text-embedding-3-small/1536");
}
