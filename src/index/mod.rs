pub mod models;
pub mod snapshot;
pub mod symbol_index;

pub use models::*;
pub use snapshot::SnapshotStore;
pub use symbol_index::SymbolIndex;
