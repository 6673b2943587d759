//! Storage engine
//!
//! Holds file bytes addressed by content handle: locally on disk, in memory,
//! or behind a storage server.

pub mod disk;
pub mod engine;
pub mod memory;
pub mod remote;
pub mod server;
pub mod wire;

pub use disk::DiskStorage;
pub use engine::{APPEND_SENTINEL, ByteRange, ContentHandle, StorageEngine, WriteOffset};
pub use memory::MemoryStorage;
pub use remote::RemoteStorage;
pub use server::StorageServer;
