//! On-disk storage engine
//!
//! Each handle is one file under the storage root. Writes past the end rely
//! on the filesystem reading unwritten gaps back as zeros.

use async_trait::async_trait;
use log::{info, warn};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::engine::{ByteRange, ContentHandle, StorageEngine, WriteOffset};
use crate::error::NfsError;

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Opens (creating if needed) a storage root directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, NfsError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        info!("Storage root directory: {}", root.display());
        Ok(Self { root })
    }

    fn blob_path(&self, handle: ContentHandle) -> PathBuf {
        self.root.join(format!("{handle}{BLOB_SUFFIX}"))
    }
}

const BLOB_SUFFIX: &str = ".blob";

/// Handle named by a blob file, if `name` is one.
fn blob_handle(name: &str) -> Option<ContentHandle> {
    name.strip_suffix(BLOB_SUFFIX)?.parse().ok()
}

fn io_error(handle: ContentHandle, error: io::Error) -> NfsError {
    match error.kind() {
        io::ErrorKind::NotFound => NfsError::NotFound(format!("content {handle} not found")),
        io::ErrorKind::AlreadyExists => NfsError::AlreadyExists(format!("content {handle}")),
        _ => {
            warn!("Storage I/O failure on {}: {}", handle, error);
            NfsError::Internal(format!("storage I/O on {handle}: {error}"))
        }
    }
}

#[async_trait]
impl StorageEngine for DiskStorage {
    async fn create(&self, handle: ContentHandle, initial: &[u8]) -> Result<u64, NfsError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.blob_path(handle))
            .await
            .map_err(|e| io_error(handle, e))?;
        file.write_all(initial).await.map_err(|e| io_error(handle, e))?;
        file.flush().await.map_err(|e| io_error(handle, e))?;
        Ok(initial.len() as u64)
    }

    async fn read(&self, handle: ContentHandle, range: ByteRange) -> Result<Vec<u8>, NfsError> {
        let mut file = File::open(self.blob_path(handle))
            .await
            .map_err(|e| io_error(handle, e))?;
        file.seek(SeekFrom::Start(range.offset))
            .await
            .map_err(|e| io_error(handle, e))?;

        let mut data = Vec::new();
        match range.length {
            Some(length) => file.take(length).read_to_end(&mut data).await,
            None => file.read_to_end(&mut data).await,
        }
        .map_err(|e| io_error(handle, e))?;
        Ok(data)
    }

    async fn write(
        &self,
        handle: ContentHandle,
        offset: WriteOffset,
        bytes: &[u8],
    ) -> Result<u64, NfsError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.blob_path(handle))
            .await
            .map_err(|e| io_error(handle, e))?;
        let position = match offset {
            WriteOffset::Append => SeekFrom::End(0),
            WriteOffset::At(at) => SeekFrom::Start(at),
        };
        file.seek(position).await.map_err(|e| io_error(handle, e))?;
        file.write_all(bytes).await.map_err(|e| io_error(handle, e))?;
        file.flush().await.map_err(|e| io_error(handle, e))?;

        let metadata = file.metadata().await.map_err(|e| io_error(handle, e))?;
        Ok(metadata.len())
    }

    async fn duplicate(&self, src: ContentHandle) -> Result<ContentHandle, NfsError> {
        let handle = ContentHandle::new();
        fs::copy(self.blob_path(src), self.blob_path(handle))
            .await
            .map_err(|e| io_error(src, e))?;
        Ok(handle)
    }

    async fn delete(&self, handle: ContentHandle) -> Result<(), NfsError> {
        fs::remove_file(self.blob_path(handle))
            .await
            .map_err(|e| io_error(handle, e))
    }

    async fn size(&self, handle: ContentHandle) -> Result<u64, NfsError> {
        let metadata = fs::metadata(self.blob_path(handle))
            .await
            .map_err(|e| io_error(handle, e))?;
        Ok(metadata.len())
    }

    async fn list(&self) -> Result<Vec<ContentHandle>, NfsError> {
        let mut handles = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(handle) = entry.file_name().to_str().and_then(blob_handle) {
                handles.push(handle);
            }
        }
        Ok(handles)
    }
}
