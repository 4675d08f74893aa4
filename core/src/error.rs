//! Error types for the context engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CtxErr>;

/// Errors surfaced by the context engine core.
#[derive(Debug, Error)]
pub enum CtxErr {
    /// The project has no `.ctx` state directory yet.
    #[error("project not initialized at {root} (run `ctx init` first)")]
    NotInitialized { root: PathBuf },

    /// A configuration value failed validation.
    #[error("invalid config value for `{field}`: {cause}")]
    ConfigInvalid { field: String, cause: String },

    /// The store was created with a different vector dimension.
    #[error(
        "index built with {stored} vector dimensions, configured for {requested}; \
         delete .ctx/index.db and re-index to change dimensions"
    )]
    DimensionMismatch { stored: i32, requested: i32 },

    /// The store was built with a different embedder.
    #[error(
        "index built with embedder `{stored}`, configured embedder is `{configured}`; \
         delete .ctx/index.db and re-index to switch embedders"
    )]
    EmbedderMismatch { stored: String, configured: String },

    /// A single file failed to parse. Non-fatal: the indexer logs and skips.
    #[error("failed to parse {path}: {cause}")]
    ParseFailed { path: PathBuf, cause: String },

    /// A file could not be read during indexing. Non-fatal per file.
    #[error("failed to read {path}: {cause}")]
    FileReadFailed { path: PathBuf, cause: String },

    /// An embedding request exhausted its retries.
    #[error("embedding failed: {cause}")]
    EmbedderFailed { cause: String },

    /// An underlying store operation failed.
    #[error("store operation `{operation}` failed: {cause}")]
    StoreFailed { operation: String, cause: String },

    /// Wrap-all for unexpected search-path errors.
    #[error("search failed: {cause}")]
    SearchFailed { cause: String },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl CtxErr {
    /// Helper for store errors with an operation label.
    pub fn store(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized { .. } => "not_initialized",
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmbedderMismatch { .. } => "embedder_mismatch",
            Self::ParseFailed { .. } => "parse_failed",
            Self::FileReadFailed { .. } => "file_read_failed",
            Self::EmbedderFailed { .. } => "embedder_failed",
            Self::StoreFailed { .. } => "store_failed",
            Self::SearchFailed { .. } => "search_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Exit code for the CLI: all typed errors are "expected" failures.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<rusqlite::Error> for CtxErr {
    fn from(e: rusqlite::Error) -> Self {
        CtxErr::StoreFailed {
            operation: "sqlite".to_string(),
            cause: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = CtxErr::DimensionMismatch {
            stored: 768,
            requested: 1536,
        };
        assert_eq!(err.code(), "dimension_mismatch");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_dimension_mismatch_message_mentions_rebuild() {
        let err = CtxErr::DimensionMismatch {
            stored: 768,
            requested: 384,
        };
        let msg = err.to_string();
        assert!(msg.contains("768"));
        assert!(msg.contains("384"));
        assert!(msg.contains("re-index"));
    }

    #[test]
    fn test_store_helper() {
        let err = CtxErr::store("insert chunk", "disk full");
        assert!(matches!(err, CtxErr::StoreFailed { .. }));
        assert!(err.to_string().contains("insert chunk"));
    }
}
