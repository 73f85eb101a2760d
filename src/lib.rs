//! Offline-first data layer for a cafeteria menu app.
//!
//! [`sync`] keeps a local [`store`] consistent with the remote menu [`api`],
//! skipping resources whose digest has not changed. [`join`] turns store
//! changes into a live, grouped menu view.

pub mod api;
pub mod config;
pub mod join;
pub mod menu;
pub mod store;
pub mod sync;
