//! Storage channel messages
//!
//! One JSON object per line in each direction between the naming server and
//! a storage server.

use serde::{Deserialize, Serialize};

use super::engine::{ByteRange, ContentHandle, StorageEngine, WriteOffset};
use crate::error::{ErrorKind, NfsError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StorageRequest {
    Create {
        handle: ContentHandle,
        data: Vec<u8>,
    },
    Read {
        handle: ContentHandle,
        range: ByteRange,
    },
    Write {
        handle: ContentHandle,
        offset: WriteOffset,
        data: Vec<u8>,
    },
    Duplicate {
        handle: ContentHandle,
    },
    Delete {
        handle: ContentHandle,
    },
    Size {
        handle: ContentHandle,
    },
    List,
}

impl StorageRequest {
    pub fn name(&self) -> &'static str {
        match self {
            StorageRequest::Create { .. } => "create",
            StorageRequest::Read { .. } => "read",
            StorageRequest::Write { .. } => "write",
            StorageRequest::Duplicate { .. } => "duplicate",
            StorageRequest::Delete { .. } => "delete",
            StorageRequest::Size { .. } => "size",
            StorageRequest::List => "list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StorageResponse {
    Size { size: u64 },
    Bytes { data: Vec<u8> },
    Handle { handle: ContentHandle },
    Handles { handles: Vec<ContentHandle> },
    Done,
    Error { kind: ErrorKind, message: String },
}

impl From<NfsError> for StorageResponse {
    fn from(err: NfsError) -> Self {
        StorageResponse::Error {
            kind: err.kind(),
            message: err.detail().to_string(),
        }
    }
}

/// Runs one request against a local engine.
pub async fn execute(engine: &dyn StorageEngine, request: StorageRequest) -> StorageResponse {
    let outcome = match request {
        StorageRequest::Create { handle, data } => engine
            .create(handle, &data)
            .await
            .map(|size| StorageResponse::Size { size }),
        StorageRequest::Read { handle, range } => engine
            .read(handle, range)
            .await
            .map(|data| StorageResponse::Bytes { data }),
        StorageRequest::Write {
            handle,
            offset,
            data,
        } => engine
            .write(handle, offset, &data)
            .await
            .map(|size| StorageResponse::Size { size }),
        StorageRequest::Duplicate { handle } => engine
            .duplicate(handle)
            .await
            .map(|handle| StorageResponse::Handle { handle }),
        StorageRequest::Delete { handle } => {
            engine.delete(handle).await.map(|_| StorageResponse::Done)
        }
        StorageRequest::Size { handle } => engine
            .size(handle)
            .await
            .map(|size| StorageResponse::Size { size }),
        StorageRequest::List => engine
            .list()
            .await
            .map(|handles| StorageResponse::Handles { handles }),
    };
    outcome.unwrap_or_else(StorageResponse::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn request_lines_are_tagged_json() {
        let request = StorageRequest::Delete {
            handle: ContentHandle::new(),
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(line.contains("\"op\":\"delete\""));
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn errors_keep_their_kind() {
        let engine = MemoryStorage::new();
        let response = execute(
            &engine,
            StorageRequest::Size {
                handle: ContentHandle::new(),
            },
        )
        .await;
        match response {
            StorageResponse::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
