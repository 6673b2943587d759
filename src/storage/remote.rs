//! Storage engine reached over the storage channel
//!
//! Each call opens a connection to the storage server, sends one request
//! line and reads one response line. Only a failure to connect is
//! transient: once the request is on the wire the server may have applied
//! it, so any later channel failure is reported as internal.

use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::engine::{ByteRange, ContentHandle, StorageEngine, WriteOffset};
use super::wire::{StorageRequest, StorageResponse};
use crate::error::NfsError;

pub struct RemoteStorage {
    addr: String,
    timeout: Duration,
}

impl RemoteStorage {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn call(&self, request: StorageRequest) -> Result<StorageResponse, NfsError> {
        let op = request.name();
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| NfsError::Transient(format!("storage server {} timed out", self.addr)))??;

        let channel_lost = |e: std::io::Error| {
            warn!("Storage channel to {} lost during {}: {}", self.addr, op, e);
            NfsError::Internal(format!("storage channel lost during {op}: {e}"))
        };
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(line.as_bytes()).await.map_err(channel_lost)?;
        write_half.flush().await.map_err(channel_lost)?;

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await.map_err(channel_lost)? == 0 {
            return Err(NfsError::Internal(format!(
                "storage server closed the channel during {op}"
            )));
        }
        debug!("Storage {} -> {} bytes of reply", op, reply.len());

        match serde_json::from_str::<StorageResponse>(reply.trim_end())? {
            StorageResponse::Error { kind, message } => Err(NfsError::from_kind(kind, message)),
            response => Ok(response),
        }
    }
}

fn unexpected(op: &str, response: StorageResponse) -> NfsError {
    NfsError::Internal(format!("unexpected storage reply to {op}: {response:?}"))
}

#[async_trait]
impl StorageEngine for RemoteStorage {
    async fn create(&self, handle: ContentHandle, initial: &[u8]) -> Result<u64, NfsError> {
        let request = StorageRequest::Create {
            handle,
            data: initial.to_vec(),
        };
        match self.call(request).await? {
            StorageResponse::Size { size } => Ok(size),
            other => Err(unexpected("create", other)),
        }
    }

    async fn read(&self, handle: ContentHandle, range: ByteRange) -> Result<Vec<u8>, NfsError> {
        match self.call(StorageRequest::Read { handle, range }).await? {
            StorageResponse::Bytes { data } => Ok(data),
            other => Err(unexpected("read", other)),
        }
    }

    async fn write(
        &self,
        handle: ContentHandle,
        offset: WriteOffset,
        bytes: &[u8],
    ) -> Result<u64, NfsError> {
        let request = StorageRequest::Write {
            handle,
            offset,
            data: bytes.to_vec(),
        };
        match self.call(request).await? {
            StorageResponse::Size { size } => Ok(size),
            other => Err(unexpected("write", other)),
        }
    }

    async fn duplicate(&self, src: ContentHandle) -> Result<ContentHandle, NfsError> {
        match self.call(StorageRequest::Duplicate { handle: src }).await? {
            StorageResponse::Handle { handle } => Ok(handle),
            other => Err(unexpected("duplicate", other)),
        }
    }

    async fn delete(&self, handle: ContentHandle) -> Result<(), NfsError> {
        match self.call(StorageRequest::Delete { handle }).await? {
            StorageResponse::Done => Ok(()),
            other => Err(unexpected("delete", other)),
        }
    }

    async fn size(&self, handle: ContentHandle) -> Result<u64, NfsError> {
        match self.call(StorageRequest::Size { handle }).await? {
            StorageResponse::Size { size } => Ok(size),
            other => Err(unexpected("size", other)),
        }
    }

    async fn list(&self) -> Result<Vec<ContentHandle>, NfsError> {
        match self.call(StorageRequest::List).await? {
            StorageResponse::Handles { handles } => Ok(handles),
            other => Err(unexpected("list", other)),
        }
    }
}
