//! Indexing: discovery, change detection, and the pipeline tying them to
//! the parser, chunker, embedder, and store.

mod change_detector;
mod pipeline;
mod walker;

pub use change_detector::ChangeSet;
pub use change_detector::compute_changes;
pub use pipeline::IndexOptions;
pub use pipeline::run_index;
pub use walker::Walker;
