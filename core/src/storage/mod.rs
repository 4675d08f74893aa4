//! Embedded storage.

mod store;

pub use store::DepEdge;
pub use store::NameMatch;
pub use store::Store;
pub use store::SymbolQuery;
