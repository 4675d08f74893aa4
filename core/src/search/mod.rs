//! Search strategies and rank fusion.

mod dependency;
mod fts;
mod fusion;
mod path;
mod symbol;
mod vector;

pub use dependency::Direction;
pub use dependency::dep_trace;
pub use fts::fts_search;
pub use fts::sanitize_fts_query;
pub use fusion::RRF_K;
pub use fusion::WeightedResults;
pub use fusion::fuse_and_rerank;
pub use fusion::is_test_path;
pub use fusion::rrf_merge;
pub use path::glob_to_regex;
pub use path::looks_like_glob;
pub use path::path_glob;
pub use path::path_keyword;
pub use symbol::AstQuery;
pub use symbol::MatchMode;
pub use symbol::ast_search;
pub use vector::vector_search;
