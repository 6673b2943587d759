//! In-memory storage engine

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::engine::{ByteRange, ContentHandle, StorageEngine, WriteOffset, apply_write};
use crate::error::NfsError;

#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<ContentHandle, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(handle: ContentHandle) -> NfsError {
    NfsError::NotFound(format!("content {handle} not found"))
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    async fn create(&self, handle: ContentHandle, initial: &[u8]) -> Result<u64, NfsError> {
        match self.blobs.write().entry(handle) {
            Entry::Occupied(_) => Err(NfsError::AlreadyExists(format!("content {handle}"))),
            Entry::Vacant(slot) => {
                slot.insert(initial.to_vec());
                Ok(initial.len() as u64)
            }
        }
    }

    async fn read(&self, handle: ContentHandle, range: ByteRange) -> Result<Vec<u8>, NfsError> {
        let blobs = self.blobs.read();
        let data = blobs.get(&handle).ok_or_else(|| missing(handle))?;
        Ok(range.slice(data).to_vec())
    }

    async fn write(
        &self,
        handle: ContentHandle,
        offset: WriteOffset,
        bytes: &[u8],
    ) -> Result<u64, NfsError> {
        let mut blobs = self.blobs.write();
        let data = blobs.get_mut(&handle).ok_or_else(|| missing(handle))?;
        apply_write(data, offset, bytes)
    }

    async fn duplicate(&self, src: ContentHandle) -> Result<ContentHandle, NfsError> {
        let mut blobs = self.blobs.write();
        let copy = blobs.get(&src).ok_or_else(|| missing(src))?.clone();
        let handle = ContentHandle::new();
        blobs.insert(handle, copy);
        Ok(handle)
    }

    async fn delete(&self, handle: ContentHandle) -> Result<(), NfsError> {
        self.blobs
            .write()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| missing(handle))
    }

    async fn size(&self, handle: ContentHandle) -> Result<u64, NfsError> {
        let blobs = self.blobs.read();
        blobs
            .get(&handle)
            .map(|data| data.len() as u64)
            .ok_or_else(|| missing(handle))
    }

    async fn list(&self) -> Result<Vec<ContentHandle>, NfsError> {
        Ok(self.blobs.read().keys().copied().collect())
    }
}
