//! Core data types for indexing and search.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Kind of a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Type,
    Import,
    Constant,
    Config,
}

impl ChunkKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Type => "type",
            Self::Import => "import",
            Self::Constant => "constant",
            Self::Config => "config",
        }
    }

    /// Parse the storage representation back.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "method" => Some(Self::Method),
            "type" => Some(Self::Type),
            "import" => Some(Self::Import),
            "constant" => Some(Self::Constant),
            "config" => Some(Self::Config),
            _ => None,
        }
    }

    /// Kinds that are semantically distinct and never merged with neighbors.
    pub fn is_mergeable(&self) -> bool {
        matches!(self, Self::Constant | Self::Config)
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a syntax node emitted by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstNodeKind {
    Function,
    Class,
    Method,
    Import,
    Export,
    Type,
    Constant,
}

impl AstNodeKind {
    /// Map a node kind onto the chunk kind it produces.
    ///
    /// `Export` nodes that survive unwrapping are chunked as constants.
    pub fn chunk_kind(&self) -> ChunkKind {
        match self {
            Self::Function => ChunkKind::Function,
            Self::Class => ChunkKind::Class,
            Self::Method => ChunkKind::Method,
            Self::Import => ChunkKind::Import,
            Self::Export | Self::Constant => ChunkKind::Constant,
            Self::Type => ChunkKind::Type,
        }
    }
}

/// A syntax node extracted from one source file.
///
/// Lines are 1-based inclusive; `text` is the exact source span.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: AstNodeKind,
    pub name: Option<String>,
    /// Enclosing declaration name (e.g. the class a method belongs to).
    pub parent: Option<String>,
    pub line_start: i32,
    pub line_end: i32,
    pub language: String,
    pub text: String,
    pub params: Option<String>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    /// Whether the declaration was wrapped in an export.
    pub exported: bool,
}

/// A chunk ready for insertion into the store.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub line_start: i32,
    pub line_end: i32,
    pub language: String,
    pub text: String,
    /// Raw text of every import in the owning file (embedding context).
    pub imports: Vec<String>,
    pub exported: bool,
    /// Stable content-addressed id: sha256("path:ls:le") prefix.
    pub chunk_uid: String,
    /// sha256(text) prefix.
    pub content_hash: String,
}

/// A chunk row read back from the store, joined with its owning file.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Store row id. Valid within one index generation; use `chunk_uid`
    /// for identity that survives re-indexing.
    pub id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub chunk_uid: String,
    pub kind: ChunkKind,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub line_start: i32,
    pub line_end: i32,
    pub language: String,
    pub text: String,
    pub exported: bool,
}

/// A file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the project root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: String,
    pub size: u64,
    pub last_modified: Option<i64>,
}

/// A file row in the store.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub language: String,
    pub hash: String,
    pub size: i64,
    pub last_indexed: i64,
}

/// Search result returned to callers. Stable across strategies and fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub file_path: String,
    pub line_start: i32,
    pub line_end: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub text: String,
    /// Relevance in [0, 1]; strategy-local before fusion, fused after.
    pub score: f32,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<bool>,
}

impl SearchResult {
    /// Build a result from a stored chunk with a strategy-local score.
    pub fn from_chunk(chunk: &StoredChunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            file_path: chunk.file_path.clone(),
            line_start: chunk.line_start,
            line_end: chunk.line_end,
            name: chunk.name.clone(),
            kind: chunk.kind,
            text: chunk.text.clone(),
            score,
            language: chunk.language.clone(),
            exported: Some(chunk.exported),
        }
    }
}

/// Statistics reported by one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub files_discovered: usize,
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub files_unchanged: usize,
    pub chunks_created: usize,
    pub vectors_created: usize,
    pub duration_ms: u64,
    /// Files per language among the discovered set.
    pub languages: std::collections::BTreeMap<String, usize>,
}

/// Aggregate counts reported by `status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub files: i64,
    pub chunks: i64,
    pub vectors: i64,
    pub languages: std::collections::BTreeMap<String, i64>,
    pub last_indexed: Option<i64>,
}

/// Length of the hex prefix used for chunk and content hashes.
const HASH_PREFIX_LEN: usize = 16;

/// Stable chunk identity derived from path and line range.
///
/// Identical content at the same path and lines hashes identically across
/// re-indexes, which keeps external references valid.
pub fn stable_chunk_uid(rel_path: &str, line_start: i32, line_end: i32) -> String {
    let digest = Sha256::digest(format!("{rel_path}:{line_start}:{line_end}").as_bytes());
    hex::encode(digest)[..HASH_PREFIX_LEN].to_string()
}

/// Content hash of a chunk body.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)[..HASH_PREFIX_LEN].to_string()
}

/// Full-content SHA-256 of a file on disk, as lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_kind_round_trip() {
        for kind in [
            ChunkKind::Function,
            ChunkKind::Class,
            ChunkKind::Method,
            ChunkKind::Type,
            ChunkKind::Import,
            ChunkKind::Constant,
            ChunkKind::Config,
        ] {
            assert_eq!(ChunkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChunkKind::parse("widget"), None);
    }

    #[test]
    fn test_unmergeable_kinds() {
        assert!(!ChunkKind::Function.is_mergeable());
        assert!(!ChunkKind::Method.is_mergeable());
        assert!(!ChunkKind::Class.is_mergeable());
        assert!(!ChunkKind::Type.is_mergeable());
        assert!(!ChunkKind::Import.is_mergeable());
        assert!(ChunkKind::Constant.is_mergeable());
        assert!(ChunkKind::Config.is_mergeable());
    }

    #[test]
    fn test_export_maps_to_constant_chunk() {
        assert_eq!(AstNodeKind::Export.chunk_kind(), ChunkKind::Constant);
        assert_eq!(AstNodeKind::Constant.chunk_kind(), ChunkKind::Constant);
    }

    #[test]
    fn test_stable_chunk_uid_is_deterministic() {
        let a = stable_chunk_uid("src/a.ts", 1, 10);
        let b = stable_chunk_uid("src/a.ts", 1, 10);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        // Any coordinate change produces a different id.
        assert_ne!(a, stable_chunk_uid("src/b.ts", 1, 10));
        assert_ne!(a, stable_chunk_uid("src/a.ts", 2, 10));
        assert_ne!(a, stable_chunk_uid("src/a.ts", 1, 11));
    }

    #[test]
    fn test_content_hash_tracks_text_only() {
        let h1 = content_hash("fn main() {}");
        let h2 = content_hash("fn main() {}");
        let h3 = content_hash("fn main() { }");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 16);
    }
}
