use tempfile::TempDir;

use super::*;

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn rel_paths(files: &[DiscoveredFile]) -> Vec<&str> {
    files.iter().map(|f| f.rel_path.as_str()).collect()
}

#[test]
fn test_discovers_known_files_sorted() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/b.ts", "export const b = 1;");
    write(dir.path(), "src/a.ts", "export const a = 1;");
    write(dir.path(), "main.py", "x = 1");

    let files = Walker::new(dir.path()).discover().unwrap();
    assert_eq!(rel_paths(&files), vec!["main.py", "src/a.ts", "src/b.ts"]);
    assert_eq!(files[0].language, "python");
    assert_eq!(files[1].language, "typescript");
    assert!(files[1].size > 0);
}

#[test]
fn test_unknown_extensions_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/a.ts", "const a = 1;");
    write(dir.path(), "notes.xyz", "???");
    write(dir.path(), "Makefile", "all:");

    let files = Walker::new(dir.path()).discover().unwrap();
    assert_eq!(rel_paths(&files), vec!["src/a.ts"]);
}

#[test]
fn test_builtin_ignores() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/a.ts", "const a = 1;");
    write(dir.path(), "node_modules/pkg/index.js", "module.exports = 1;");
    write(dir.path(), ".git/config", "[core]");
    write(dir.path(), ".ctx/config.json", "{}");
    write(dir.path(), "package-lock.json", "{}");
    write(dir.path(), "logo.png", "\u{89}PNG");

    let files = Walker::new(dir.path()).discover().unwrap();
    assert_eq!(rel_paths(&files), vec!["src/a.ts"]);
}

#[test]
fn test_gitignore_and_ctxignore_are_respected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".gitignore", "generated/\n# a comment\n\n*.snap.ts\n");
    write(dir.path(), ".ctxignore", "scratch/\n");
    write(dir.path(), "src/a.ts", "const a = 1;");
    write(dir.path(), "generated/gen.ts", "const g = 1;");
    write(dir.path(), "scratch/tmp.ts", "const t = 1;");
    write(dir.path(), "src/ui.snap.ts", "const s = 1;");

    let files = Walker::new(dir.path()).discover().unwrap();
    assert_eq!(rel_paths(&files), vec!["src/a.ts"]);
}

#[test]
fn test_extra_ignore_patterns() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/a.ts", "const a = 1;");
    write(dir.path(), "src/legacy/old.ts", "const o = 1;");

    let files = Walker::new(dir.path())
        .with_extra_ignore(&["legacy/".to_string()])
        .discover()
        .unwrap();
    assert_eq!(rel_paths(&files), vec!["src/a.ts"]);
}

#[test]
fn test_dotfile_language_fallback() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".env", "KEY=value");
    write(dir.path(), "src/a.ts", "const a = 1;");

    let files = Walker::new(dir.path()).discover().unwrap();
    assert_eq!(rel_paths(&files), vec![".env", "src/a.ts"]);
    assert_eq!(files[0].language, "env");
}
