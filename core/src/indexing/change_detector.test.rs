use tempfile::TempDir;

use super::*;
use crate::indexing::Walker;

async fn setup() -> (TempDir, TempDir, Store) {
    let project = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    let store = Store::open(&state.path().join("index.db"), Some(4)).unwrap();
    (project, state, store)
}

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_fresh_tree_is_all_added() {
    let (project, _state, store) = setup().await;
    write(project.path(), "src/a.ts", "const a = 1;");
    write(project.path(), "src/b.ts", "const b = 2;");

    let discovered = Walker::new(project.path()).discover().unwrap();
    let changes = compute_changes(&discovered, &store).await.unwrap();

    assert_eq!(changes.added, vec!["src/a.ts", "src/b.ts"]);
    assert!(changes.modified.is_empty());
    assert!(changes.deleted.is_empty());
    assert!(changes.unchanged.is_empty());
    assert_eq!(changes.hashes.len(), 2);
    // Full-content SHA-256 hex.
    assert_eq!(changes.hashes["src/a.ts"].len(), 64);
}

#[tokio::test]
async fn test_one_character_change_is_modified() {
    let (project, _state, store) = setup().await;
    write(project.path(), "src/a.ts", "const a = 1;");
    write(project.path(), "src/b.ts", "const b = 2;");

    let discovered = Walker::new(project.path()).discover().unwrap();
    let changes = compute_changes(&discovered, &store).await.unwrap();
    for path in changes.to_index() {
        store
            .upsert_file(&path, "typescript", &changes.hashes[&path], 12)
            .await
            .unwrap();
    }

    write(project.path(), "src/a.ts", "const a = 2;");
    let discovered = Walker::new(project.path()).discover().unwrap();
    let changes = compute_changes(&discovered, &store).await.unwrap();

    assert_eq!(changes.modified, vec!["src/a.ts"]);
    assert_eq!(changes.unchanged, vec!["src/b.ts"]);
    assert!(changes.added.is_empty());
    assert!(changes.deleted.is_empty());
}

#[tokio::test]
async fn test_removed_path_is_deleted() {
    let (project, _state, store) = setup().await;
    write(project.path(), "src/a.ts", "const a = 1;");
    store
        .upsert_file("src/gone.ts", "typescript", "stale", 1)
        .await
        .unwrap();

    let discovered = Walker::new(project.path()).discover().unwrap();
    let changes = compute_changes(&discovered, &store).await.unwrap();

    assert_eq!(changes.added, vec!["src/a.ts"]);
    assert_eq!(changes.deleted, vec!["src/gone.ts"]);
}

#[tokio::test]
async fn test_unchanged_tree_reports_all_unchanged() {
    let (project, _state, store) = setup().await;
    write(project.path(), "src/a.ts", "const a = 1;");

    let discovered = Walker::new(project.path()).discover().unwrap();
    let changes = compute_changes(&discovered, &store).await.unwrap();
    for path in changes.to_index() {
        store
            .upsert_file(&path, "typescript", &changes.hashes[&path], 12)
            .await
            .unwrap();
    }

    let changes = compute_changes(&discovered, &store).await.unwrap();
    assert!(changes.added.is_empty());
    assert!(changes.modified.is_empty());
    assert!(changes.deleted.is_empty());
    assert_eq!(changes.unchanged, vec!["src/a.ts"]);
}
