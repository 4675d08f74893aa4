//! Syntax parsing.
//!
//! Wraps tree-sitter behind a uniform [`AstNode`] stream per file. One
//! grammar per supported language; languages without a grammar yield an
//! empty node list and are indexed as files without chunks.

mod extractor;
mod languages;

pub use extractor::SourceParser;
pub use languages::detect_language;
pub use languages::grammar_for;
pub use languages::is_config_language;

pub use crate::types::AstNode;
pub use crate::types::AstNodeKind;
