//! Persistence store implementations.
//!
//! - [`DirStore`] - Directory-backed store for hosts with a file system
//! - [`MemoryStore`] - In-memory store for tests and diskless hosts

mod fs;
mod memory;

pub use fs::DirStore;
pub use memory::MemoryStore;
