//! Storage engine contract
//!
//! Byte content addressed by a [`ContentHandle`]. The engine trusts its
//! caller: the naming server has already authorized the request and holds
//! the path lock, so an append simply lands at the current end of the data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::NfsError;

/// Wire value of the append offset.
pub const APPEND_SENTINEL: i64 = -1;

/// Stable reference to one file's bytes, independent of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHandle(Uuid);

impl ContentHandle {
    pub fn new() -> Self {
        ContentHandle(Uuid::new_v4())
    }
}

impl Default for ContentHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ContentHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ContentHandle)
    }
}

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOffset {
    At(u64),
    Append,
}

impl WriteOffset {
    pub fn from_wire(raw: i64) -> Result<Self, NfsError> {
        match raw {
            APPEND_SENTINEL => Ok(WriteOffset::Append),
            n if n >= 0 => Ok(WriteOffset::At(n as u64)),
            n => Err(NfsError::InvalidArgument(format!(
                "invalid offset {n}: use a non-negative offset or {APPEND_SENTINEL} to append"
            ))),
        }
    }

    /// End of the written bytes for a file currently `size` bytes long;
    /// `None` if it cannot be represented.
    pub fn end(&self, size: u64, len: usize) -> Option<u64> {
        let start = match self {
            WriteOffset::Append => size,
            WriteOffset::At(at) => *at,
        };
        start.checked_add(u64::try_from(len).ok()?)
    }
}

/// Bytes `[offset, offset + length)`; `length: None` reads to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub const ALL: ByteRange = ByteRange {
        offset: 0,
        length: None,
    };

    /// Clamps the range to `data`; past-the-end ranges are empty.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let len = data.len() as u64;
        let start = self.offset.min(len);
        let end = match self.length {
            Some(length) => start.saturating_add(length).min(len),
            None => len,
        };
        &data[start as usize..end as usize]
    }
}

/// Applies a write to an in-memory buffer, zero-filling any gap between the
/// current end and `offset`. Returns the new length.
pub fn apply_write(buffer: &mut Vec<u8>, offset: WriteOffset, bytes: &[u8]) -> Result<u64, NfsError> {
    let end = offset
        .end(buffer.len() as u64, bytes.len())
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(|| NfsError::InvalidArgument(format!("write at {offset:?} is out of range")))?;
    let start = end - bytes.len();
    if buffer.len() < end {
        buffer.resize(end, 0);
    }
    buffer[start..end].copy_from_slice(bytes);
    Ok(buffer.len() as u64)
}

#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Stores `initial` under a fresh `handle`; returns the size.
    async fn create(&self, handle: ContentHandle, initial: &[u8]) -> Result<u64, NfsError>;

    async fn read(&self, handle: ContentHandle, range: ByteRange) -> Result<Vec<u8>, NfsError>;

    /// Returns the size after the write.
    async fn write(
        &self,
        handle: ContentHandle,
        offset: WriteOffset,
        bytes: &[u8],
    ) -> Result<u64, NfsError>;

    /// Copies the bytes of `src` into new, unshared storage.
    async fn duplicate(&self, src: ContentHandle) -> Result<ContentHandle, NfsError>;

    async fn delete(&self, handle: ContentHandle) -> Result<(), NfsError>;

    async fn size(&self, handle: ContentHandle) -> Result<u64, NfsError>;

    /// Every handle currently stored, in no particular order.
    async fn list(&self) -> Result<Vec<ContentHandle>, NfsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn offsets_from_the_wire() {
        assert_eq!(WriteOffset::from_wire(-1).unwrap(), WriteOffset::Append);
        assert_eq!(WriteOffset::from_wire(7).unwrap(), WriteOffset::At(7));
        assert_eq!(
            WriteOffset::from_wire(-2).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn writes_overwrite_extend_and_zero_fill() {
        let mut buffer = b"Initial content".to_vec();
        assert_eq!(apply_write(&mut buffer, WriteOffset::At(0), b"Updated").unwrap(), 15);
        assert_eq!(buffer, b"Updated content");

        apply_write(&mut buffer, WriteOffset::Append, b"!").unwrap();
        assert_eq!(buffer, b"Updated content!");

        let mut short = b"ab".to_vec();
        assert_eq!(apply_write(&mut short, WriteOffset::At(4), b"cd").unwrap(), 6);
        assert_eq!(short, b"ab\0\0cd");
    }

    #[test]
    fn overflowing_offsets_are_refused_without_growing() {
        let mut buffer = b"abc".to_vec();
        let err = apply_write(&mut buffer, WriteOffset::At(u64::MAX), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(buffer, b"abc");

        assert_eq!(WriteOffset::At(u64::MAX).end(0, 1), None);
        assert_eq!(WriteOffset::Append.end(10, 5), Some(15));
        assert_eq!(WriteOffset::At(3).end(10, 2), Some(5));
    }

    #[test]
    fn ranges_clamp_to_data() {
        let data = b"hello world";
        assert_eq!(ByteRange::ALL.slice(data), data);
        let mid = ByteRange {
            offset: 6,
            length: Some(3),
        };
        assert_eq!(mid.slice(data), b"wor");
        let past = ByteRange {
            offset: 50,
            length: None,
        };
        assert!(past.slice(data).is_empty());
    }
}
