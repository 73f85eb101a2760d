//! Local menu database.
//!
//! Implements the [`LocalStore`](crate::sync::engine::LocalStore) transaction
//! primitive the sync engine commits through, and the live projections the
//! join engine reads from.

/// Transactional store with snapshot persistence
pub mod menu_store;
/// Table set and scope-replacing mutations
pub mod tables;

pub use menu_store::MenuStore;
pub use tables::MenuTables;
