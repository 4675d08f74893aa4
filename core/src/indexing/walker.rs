//! Project discovery.
//!
//! Walks a project root applying, in order: a built-in ignore set (VCS
//! directories, lock files, build artifacts, binary media), the root
//! `.gitignore` and `.ctxignore` (gitignore semantics), and any extra
//! patterns from the caller. Files with unknown extensions are skipped.

use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::error::CtxErr;
use crate::error::Result;
use crate::parser::detect_language;
use crate::types::DiscoveredFile;

/// Name of the project-local ignore file.
pub const CTXIGNORE_FILE: &str = ".ctxignore";

/// Built-in ignore patterns, gitignore syntax.
const BUILTIN_IGNORES: &[&str] = &[
    // Version control and state
    ".git/",
    ".svn/",
    ".hg/",
    ".ctx/",
    // Dependency and build output directories
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    "out/",
    "__pycache__/",
    ".venv/",
    "venv/",
    ".next/",
    ".nuxt/",
    "coverage/",
    ".cache/",
    ".idea/",
    // Lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    // Binary and media extensions
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.svg",
    "*.pdf",
    "*.zip",
    "*.tar",
    "*.gz",
    "*.tgz",
    "*.bz2",
    "*.7z",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.a",
    "*.o",
    "*.class",
    "*.jar",
    "*.pyc",
    "*.wasm",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.eot",
    "*.otf",
    "*.mp3",
    "*.mp4",
    "*.avi",
    "*.mov",
    "*.webm",
    "*.db",
    "*.sqlite",
    "*.min.js",
    "*.min.css",
    "*.map",
];

/// Project walker.
pub struct Walker {
    root: PathBuf,
    extra_ignore: Vec<String>,
    follow_symlinks: bool,
}

impl Walker {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            extra_ignore: Vec::new(),
            follow_symlinks: true,
        }
    }

    pub fn with_extra_ignore(mut self, patterns: &[String]) -> Self {
        self.extra_ignore = patterns.to_vec();
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Walk the root and classify files. Ignore files are re-read on every
    /// call so edits take effect without restarting.
    pub fn discover(&self) -> Result<Vec<DiscoveredFile>> {
        let matcher = self.build_matcher()?;
        let root = self.root.clone();

        let walk = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(self.follow_symlinks)
            .filter_entry(move |entry| {
                let Ok(rel) = entry.path().strip_prefix(&root) else {
                    return true;
                };
                if rel.as_os_str().is_empty() {
                    return true;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !matcher.matched(rel, is_dir).is_ignore()
            })
            .build();

        let mut files = Vec::new();
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                // Unreadable entries are skipped silently.
                Err(_) => continue,
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let Some(language) = detect_language(path) else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let rel_path = match path.strip_prefix(&self.root) {
                Ok(rel) => slash_path(rel),
                Err(_) => continue,
            };
            let last_modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64);

            files.push(DiscoveredFile {
                rel_path,
                abs_path: path.to_path_buf(),
                language,
                size: metadata.len(),
                last_modified,
            });
        }

        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(files)
    }

    fn build_matcher(&self) -> Result<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in BUILTIN_IGNORES {
            builder
                .add_line(None, pattern)
                .map_err(|e| CtxErr::store("discovery ignore set", e))?;
        }
        // Project ignore files; a parse error in one is reported, a missing
        // one is fine.
        for name in [".gitignore", CTXIGNORE_FILE] {
            let path = self.root.join(name);
            if path.is_file() {
                if let Some(err) = builder.add(&path) {
                    tracing::warn!(file = %path.display(), error = %err, "ignore file skipped");
                }
            }
        }
        for pattern in &self.extra_ignore {
            builder
                .add_line(None, pattern)
                .map_err(|e| CtxErr::ConfigInvalid {
                    field: "ignore pattern".to_string(),
                    cause: format!("{pattern}: {e}"),
                })?;
        }
        builder
            .build()
            .map_err(|e| CtxErr::store("discovery ignore set", e))
    }
}

/// Relative path with forward slashes, platform-independent.
fn slash_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.to_string()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
#[path = "walker.test.rs"]
mod tests;
