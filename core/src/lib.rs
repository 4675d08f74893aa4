//! ctx core — local code-context engine.
//!
//! Builds a persistent, incremental index of a source repository and
//! answers multi-strategy search queries over it, returning ranked code
//! locations.
//!
//! ## Pipeline
//!
//! | Phase | Module | Description |
//! |-------|--------|-------------|
//! | Discovery | `indexing::walker` | Ignore-aware walk + language map |
//! | Change detection | `indexing::change_detector` | SHA-256 diffing |
//! | Parsing | `parser` | tree-sitter CST → `AstNode` stream |
//! | Chunking | `chunking` | logical, size-bounded chunks |
//! | Embedding | `embeddings` | pluggable provider contract |
//! | Storage | `storage` | single SQLite file: FTS5 + sqlite-vec |
//!
//! Search runs five strategies (vector, FTS, AST, path, dependency) over
//! the store and fuses them with Reciprocal Rank Fusion plus re-ranking.
//! Everything is wired behind [`CtxService`].

// Core modules
pub mod config;
pub mod error;
pub mod service;
pub mod types;

// Subsystems
pub mod chunking;
pub mod embeddings;
pub mod indexing;
pub mod parser;
pub mod query;
pub mod search;
pub mod storage;

// Re-exports
pub use config::ProjectConfig;
pub use config::Strategy;
pub use error::CtxErr;
pub use error::Result;
pub use service::CtxService;
pub use service::FixedEmbedderFactory;
pub use service::QueryOptions;
pub use service::QueryPlanner;
pub use service::SearchExecutor;
pub use service::StatusReport;
pub use types::ChunkKind;
pub use types::IndexStats;
pub use types::SearchResult;

// Indexing exports
pub use indexing::IndexOptions;
pub use search::Direction;
pub use search::MatchMode;
