//! Persistence for completed research runs.

pub mod store;

pub use store::{FileRunStore, MemoryRunStore, RunStore};
