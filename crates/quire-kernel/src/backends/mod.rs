//! Collaborator backends.
//!
//! Backends implement the traits in [`collab`](crate::collab) for different
//! storage types.

mod db;
mod local;
mod memory;

pub use db::{DocumentDb, EventRecord};
pub use local::LocalFileStorage;
pub use memory::{MemoryDirectory, MemoryFileStorage, MemoryPersistence, SaveFailure};
