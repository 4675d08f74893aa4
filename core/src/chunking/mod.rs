//! Logical chunking.

mod chunker;

pub use chunker::Chunker;
pub use chunker::DEFAULT_MAX_TOKENS;
pub use chunker::estimate_tokens;
