//! Namespace paths
//!
//! Client paths are normalized once into an [`NsPath`]: no leading or
//! trailing `/`, no empty, `.` or `..` segments. The root is the empty path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NfsError;

const MAX_SEGMENT_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NsPath(String);

impl NsPath {
    pub fn root() -> Self {
        NsPath(String::new())
    }

    /// Normalizes a client-supplied path. `/` and `.` name the root.
    pub fn parse(raw: &str, max_depth: usize) -> Result<Self, NfsError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NfsError::InvalidArgument("empty path".into()));
        }
        if trimmed == "/" || trimmed == "." {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.trim_matches('/').split('/') {
            match segment {
                "" => continue,
                "." | ".." => {
                    return Err(NfsError::InvalidArgument(format!(
                        "invalid path (relative segment): {raw}"
                    )));
                }
                s if s.len() > MAX_SEGMENT_LENGTH || s.chars().any(char::is_control) => {
                    return Err(NfsError::InvalidArgument(format!("invalid path segment: {raw}")));
                }
                s => segments.push(s),
            }
        }

        if segments.len() > max_depth {
            return Err(NfsError::InvalidArgument(format!(
                "invalid path (deeper than {max_depth}): {raw}"
            )));
        }

        Ok(NsPath(segments.join("/")))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment; empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn parent(&self) -> Option<NsPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => NsPath(self.0[..idx].to_string()),
            None => NsPath::root(),
        })
    }

    pub fn join(&self, name: &str) -> NsPath {
        if self.is_root() {
            NsPath(name.to_string())
        } else {
            NsPath(format!("{}/{}", self.0, name))
        }
    }

    /// Proper ancestors from the top down, root excluded.
    pub fn ancestors(&self) -> Vec<NsPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            out.push(path);
        }
        out.reverse();
        out
    }

    /// True when `self` lies strictly beneath `other`.
    pub fn is_descendant_of(&self, other: &NsPath) -> bool {
        if other.is_root() {
            return !self.is_root();
        }
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0.as_bytes()[other.0.len()] == b'/'
    }

    /// Rewrites the `from` prefix of this path to `to`.
    pub fn rebase(&self, from: &NsPath, to: &NsPath) -> NsPath {
        if self == from {
            return to.clone();
        }
        let suffix = &self.0[from.0.len()..];
        let suffix = suffix.trim_start_matches('/');
        to.join(suffix)
    }
}

/// Stored form: the normalized path, empty for the root.
impl From<NsPath> for String {
    fn from(path: NsPath) -> Self {
        path.0
    }
}

impl TryFrom<String> for NsPath {
    type Error = NfsError;

    fn try_from(stored: String) -> Result<Self, Self::Error> {
        if stored.is_empty() {
            return Ok(NsPath::root());
        }
        NsPath::parse(&stored, usize::MAX)
    }
}

impl fmt::Display for NsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}
