//! Namespace nodes and access control
//!
//! A node's owner implicitly holds every permission; other users need an
//! ACL entry. WRITE implies READ. The root directory is owned by the system
//! user and open to everyone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::auth::UserId;
use crate::error::NfsError;
use crate::storage::ContentHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn parse(raw: &str) -> Result<Self, NfsError> {
        match raw.to_ascii_uppercase().as_str() {
            "READ" | "R" | "-R" => Ok(Permission::Read),
            "WRITE" | "W" | "-W" => Ok(Permission::Write),
            _ => Err(NfsError::InvalidArgument(format!(
                "invalid permission {raw:?}, expected READ or WRITE"
            ))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("READ"),
            Permission::Write => f.write_str("WRITE"),
        }
    }
}

/// Subset of {READ, WRITE} granted to one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    read: bool,
    write: bool,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
        }
    }

    pub fn insert(&mut self, permission: Permission) {
        match permission {
            Permission::Read => self.read = true,
            Permission::Write => self.write = true,
        }
    }

    pub fn allows(&self, required: Permission) -> bool {
        match required {
            Permission::Read => self.read || self.write,
            Permission::Write => self.write,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.read { "R" } else { "" };
        let w = if self.write { "W" } else { "" };
        write!(f, "{r}{w}")
    }
}

/// Metadata shared by files and directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMeta {
    pub owner: UserId,
    pub acl: BTreeMap<UserId, PermissionSet>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Access asked of the owner and not yet approved or denied
    #[serde(default)]
    pub requests: BTreeMap<UserId, Permission>,
}

impl NodeMeta {
    pub fn new(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            acl: BTreeMap::new(),
            created: now,
            modified: now,
            requests: BTreeMap::new(),
        }
    }

    pub fn allows(&self, user: &UserId, required: Permission) -> bool {
        if &self.owner == user || self.owner == UserId::system() {
            return true;
        }
        self.acl
            .get(user)
            .is_some_and(|granted| granted.allows(required))
    }
}

/// Named copy of a file's content at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub handle: ContentHandle,
    pub created: DateTime<Utc>,
}

const MAX_TAG_LENGTH: usize = 64;

impl Checkpoint {
    /// Tags are short names of letters, digits, `-`, `_` and `.`.
    pub fn validate_tag(tag: &str) -> Result<(), NfsError> {
        let valid = !tag.is_empty()
            && tag.len() <= MAX_TAG_LENGTH
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(NfsError::InvalidArgument(format!(
                "invalid checkpoint tag {tag:?}"
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub meta: NodeMeta,
    pub size: u64,
    pub handle: ContentHandle,
    /// Content as it was before the last WRITE, UNDO or REVERT
    #[serde(default)]
    pub undo: Option<ContentHandle>,
    #[serde(default)]
    pub checkpoints: BTreeMap<String, Checkpoint>,
}

impl FileNode {
    pub fn new(meta: NodeMeta, size: u64, handle: ContentHandle) -> Self {
        Self {
            meta,
            size,
            handle,
            undo: None,
            checkpoints: BTreeMap::new(),
        }
    }

    /// Every piece of storage this file keeps alive, current content first.
    pub fn handles(&self) -> impl Iterator<Item = ContentHandle> + '_ {
        std::iter::once(self.handle)
            .chain(self.undo)
            .chain(self.checkpoints.values().map(|c| c.handle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub meta: NodeMeta,
    pub children: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Node::File(file) => &file.meta,
            Node::Directory(dir) => &dir.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Node::File(file) => &mut file.meta,
            Node::Directory(dir) => &mut dir.meta,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    pub fn allows(&self, user: &UserId, required: Permission) -> bool {
        self.meta().allows(user, required)
    }
}
