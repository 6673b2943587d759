//! Namespace tree
//!
//! The hierarchical metadata store owned by the naming server. Every method
//! is a single synchronous step on the in-memory tree, so each one is atomic
//! with respect to the lock the naming server wraps around the tree.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::node::{Checkpoint, DirectoryNode, FileNode, Node, NodeMeta, Permission, PermissionSet};
use super::path::NsPath;
use super::results::FileInfo;
use crate::auth::UserId;
use crate::error::NfsError;
use crate::storage::ContentHandle;

#[derive(Debug, Serialize, Deserialize)]
pub struct NamespaceTree {
    nodes: HashMap<NsPath, Node>,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NsPath::root(),
            Node::Directory(DirectoryNode {
                meta: NodeMeta::new(UserId::system(), Utc::now()),
                children: BTreeSet::new(),
            }),
        );
        Self { nodes }
    }

    pub fn resolve(&self, path: &NsPath) -> Result<&Node, NfsError> {
        self.nodes
            .get(path)
            .ok_or_else(|| NfsError::NotFound(format!("{path} not found")))
    }

    pub fn resolve_file(&self, path: &NsPath) -> Result<&FileNode, NfsError> {
        match self.resolve(path)? {
            Node::File(file) => Ok(file),
            Node::Directory(_) => Err(NfsError::InvalidArgument(format!(
                "{path} is a directory"
            ))),
        }
    }

    pub fn contains(&self, path: &NsPath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn insert_file(
        &mut self,
        path: &NsPath,
        owner: UserId,
        handle: ContentHandle,
        size: u64,
        now: DateTime<Utc>,
    ) -> Result<&FileNode, NfsError> {
        let node = Node::File(FileNode::new(NodeMeta::new(owner, now), size, handle));
        match self.attach(path, node)? {
            Node::File(file) => Ok(file),
            Node::Directory(_) => Err(NfsError::Internal(format!("{path} changed type"))),
        }
    }

    pub fn insert_directory(
        &mut self,
        path: &NsPath,
        owner: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), NfsError> {
        let node = Node::Directory(DirectoryNode {
            meta: NodeMeta::new(owner, now),
            children: BTreeSet::new(),
        });
        self.attach(path, node).map(|_| ())
    }

    /// Links a new node under its existing parent directory.
    fn attach(&mut self, path: &NsPath, node: Node) -> Result<&Node, NfsError> {
        let parent_path = path
            .parent()
            .ok_or_else(|| NfsError::AlreadyExists("/ already exists".into()))?;
        self.check_parent_directory(&parent_path)?;
        if self.nodes.contains_key(path) {
            return Err(NfsError::AlreadyExists(format!("{path} already exists")));
        }

        if let Some(Node::Directory(parent)) = self.nodes.get_mut(&parent_path) {
            parent.children.insert(path.name().to_string());
        }
        debug!("Namespace: attached {}", path);
        self.nodes.insert(path.clone(), node);
        self.resolve(path)
    }

    fn check_parent_directory(&self, parent: &NsPath) -> Result<(), NfsError> {
        match self.nodes.get(parent) {
            Some(Node::Directory(_)) => Ok(()),
            Some(Node::File(_)) => Err(NfsError::InvalidArgument(format!(
                "{parent} is not a directory"
            ))),
            None => Err(NfsError::NotFound(format!("directory {parent} not found"))),
        }
    }

    /// Removes a file or an empty directory and returns it.
    pub fn remove(&mut self, path: &NsPath) -> Result<Node, NfsError> {
        if path.is_root() {
            return Err(NfsError::InvalidArgument("cannot remove /".into()));
        }
        match self.resolve(path)? {
            Node::Directory(dir) if !dir.children.is_empty() => {
                return Err(NfsError::NotEmpty(format!(
                    "{path} has {} entries",
                    dir.children.len()
                )));
            }
            _ => {}
        }

        self.detach_from_parent(path);
        self.nodes
            .remove(path)
            .ok_or_else(|| NfsError::NotFound(format!("{path} not found")))
    }

    fn detach_from_parent(&mut self, path: &NsPath) {
        if let Some(parent) = path.parent() {
            if let Some(Node::Directory(dir)) = self.nodes.get_mut(&parent) {
                dir.children.remove(path.name());
            }
        }
    }

    /// Atomic rename of a file or directory subtree.
    pub fn move_node(&mut self, src: &NsPath, dst: &NsPath) -> Result<(), NfsError> {
        if src.is_root() {
            return Err(NfsError::InvalidArgument("cannot move /".into()));
        }
        self.resolve(src)?;
        if dst.is_descendant_of(src) {
            return Err(NfsError::InvalidArgument(format!(
                "cannot move {src} inside itself ({dst})"
            )));
        }
        if self.nodes.contains_key(dst) {
            return Err(NfsError::AlreadyExists(format!("{dst} already exists")));
        }
        let dst_parent = dst
            .parent()
            .ok_or_else(|| NfsError::AlreadyExists("/ already exists".into()))?;
        self.check_parent_directory(&dst_parent)?;

        let moved: Vec<NsPath> = self
            .nodes
            .keys()
            .filter(|p| *p == src || p.is_descendant_of(src))
            .cloned()
            .collect();

        self.detach_from_parent(src);
        for old in moved {
            if let Some(node) = self.nodes.remove(&old) {
                self.nodes.insert(old.rebase(src, dst), node);
            }
        }
        if let Some(Node::Directory(parent)) = self.nodes.get_mut(&dst_parent) {
            parent.children.insert(dst.name().to_string());
        }

        debug!("Namespace: moved {} -> {}", src, dst);
        Ok(())
    }

    /// Registers `dst` as an independent copy of file `src` backed by
    /// `handle`. The copy belongs to `owner` and starts with no grants, no
    /// history and no checkpoints.
    pub fn copy_file(
        &mut self,
        src: &NsPath,
        dst: &NsPath,
        owner: UserId,
        handle: ContentHandle,
        now: DateTime<Utc>,
    ) -> Result<&FileNode, NfsError> {
        let size = self.resolve_file(src)?.size;
        let node = Node::File(FileNode::new(NodeMeta::new(owner, now), size, handle));
        match self.attach(dst, node)? {
            Node::File(file) => Ok(file),
            Node::Directory(_) => Err(NfsError::Internal(format!("{dst} changed type"))),
        }
    }

    /// Child names of a directory, in sorted order.
    pub fn list(&self, dir: &NsPath) -> Result<Vec<String>, NfsError> {
        match self.resolve(dir)? {
            Node::Directory(node) => Ok(node.children.iter().cloned().collect()),
            Node::File(_) => Err(NfsError::InvalidArgument(format!(
                "{dir} is not a directory"
            ))),
        }
    }

    fn file_mut(&mut self, path: &NsPath) -> Result<&mut FileNode, NfsError> {
        match self.nodes.get_mut(path) {
            Some(Node::File(file)) => Ok(file),
            Some(Node::Directory(_)) => Err(NfsError::InvalidArgument(format!(
                "{path} is a directory"
            ))),
            None => Err(NfsError::NotFound(format!("{path} not found"))),
        }
    }

    pub fn set_metadata_on_write(
        &mut self,
        path: &NsPath,
        new_size: u64,
        now: DateTime<Utc>,
    ) -> Result<(), NfsError> {
        let file = self.file_mut(path)?;
        file.size = new_size;
        file.meta.modified = now;
        Ok(())
    }

    /// Makes `snapshot` the content UNDO restores; returns the one it replaces.
    pub fn replace_undo(
        &mut self,
        path: &NsPath,
        snapshot: ContentHandle,
    ) -> Result<Option<ContentHandle>, NfsError> {
        Ok(self.file_mut(path)?.undo.replace(snapshot))
    }

    /// Swaps current content with the undo content, which is `undo_size`
    /// bytes long. Undoing twice restores the original.
    pub fn swap_undo(
        &mut self,
        path: &NsPath,
        undo_size: u64,
        now: DateTime<Utc>,
    ) -> Result<(), NfsError> {
        let file = self.file_mut(path)?;
        let previous = file
            .undo
            .ok_or_else(|| NfsError::InvalidArgument(format!("no undo history for {path}")))?;
        file.undo = Some(file.handle);
        file.handle = previous;
        file.size = undo_size;
        file.meta.modified = now;
        debug!("Namespace: undo on {}", path);
        Ok(())
    }

    pub fn add_checkpoint(
        &mut self,
        path: &NsPath,
        tag: &str,
        handle: ContentHandle,
        now: DateTime<Utc>,
    ) -> Result<(), NfsError> {
        let file = self.file_mut(path)?;
        if file.checkpoints.contains_key(tag) {
            return Err(NfsError::AlreadyExists(format!(
                "checkpoint {tag} of {path} already exists"
            )));
        }
        file.checkpoints.insert(
            tag.to_string(),
            Checkpoint {
                handle,
                created: now,
            },
        );
        Ok(())
    }

    pub fn checkpoint(&self, path: &NsPath, tag: &str) -> Result<&Checkpoint, NfsError> {
        self.resolve_file(path)?
            .checkpoints
            .get(tag)
            .ok_or_else(|| NfsError::NotFound(format!("checkpoint {tag} of {path} not found")))
    }

    /// Replaces the content with `restored` (a copy of a checkpoint). The
    /// replaced content becomes the undo content; the old undo content is
    /// returned for disposal.
    pub fn revert(
        &mut self,
        path: &NsPath,
        restored: ContentHandle,
        size: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<ContentHandle>, NfsError> {
        let file = self.file_mut(path)?;
        let stale = file.undo.replace(file.handle);
        file.handle = restored;
        file.size = size;
        file.meta.modified = now;
        Ok(stale)
    }

    /// Idempotently adds `permission` to `grantee`'s entry. Owner only.
    pub fn grant_access(
        &mut self,
        path: &NsPath,
        caller: &UserId,
        grantee: &UserId,
        permission: Permission,
    ) -> Result<(), NfsError> {
        let meta = self.owned_meta_mut(path, caller)?;
        if &meta.owner == grantee {
            return Ok(());
        }
        meta.acl
            .entry(grantee.clone())
            .or_insert_with(PermissionSet::default)
            .insert(permission);
        Ok(())
    }

    /// Removes every permission held by `grantee`. Owner only.
    pub fn revoke_access(
        &mut self,
        path: &NsPath,
        caller: &UserId,
        grantee: &UserId,
    ) -> Result<(), NfsError> {
        let meta = self.owned_meta_mut(path, caller)?;
        if &meta.owner == grantee {
            return Err(NfsError::InvalidArgument(format!(
                "cannot revoke the owner's access to {path}"
            )));
        }
        meta.acl.remove(grantee);
        Ok(())
    }

    /// Files a request by `requester` for `permission` on `path`; returns the
    /// owner who has to answer it. A newer request replaces an older one.
    pub fn request_access(
        &mut self,
        path: &NsPath,
        requester: &UserId,
        permission: Permission,
    ) -> Result<UserId, NfsError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| NfsError::NotFound(format!("{path} not found")))?;
        if node.allows(requester, permission) {
            return Err(NfsError::AlreadyExists(format!(
                "{requester} already has {permission} access to {path}"
            )));
        }
        let meta = node.meta_mut();
        meta.requests.insert(requester.clone(), permission);
        Ok(meta.owner.clone())
    }

    /// Pending requests on everything `owner` owns, sorted by path.
    pub fn pending_requests(&self, owner: &UserId) -> Vec<(NsPath, UserId, Permission)> {
        let mut pending: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, node)| &node.meta().owner == owner)
            .flat_map(|(path, node)| {
                node.meta()
                    .requests
                    .iter()
                    .map(move |(user, permission)| (path.clone(), user.clone(), *permission))
            })
            .collect();
        pending.sort();
        pending
    }

    /// Approves (granting what was asked) or denies a pending request.
    /// Owner only. Returns the permission that was requested.
    pub fn answer_request(
        &mut self,
        path: &NsPath,
        caller: &UserId,
        requester: &UserId,
        approve: bool,
    ) -> Result<Permission, NfsError> {
        let meta = self.owned_meta_mut(path, caller)?;
        let permission = meta.requests.remove(requester).ok_or_else(|| {
            NfsError::NotFound(format!("no access request from {requester} for {path}"))
        })?;
        if approve {
            meta.acl
                .entry(requester.clone())
                .or_insert_with(PermissionSet::default)
                .insert(permission);
        }
        Ok(permission)
    }

    fn owned_meta_mut(&mut self, path: &NsPath, caller: &UserId) -> Result<&mut NodeMeta, NfsError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| NfsError::NotFound(format!("{path} not found")))?;
        let meta = node.meta_mut();
        if &meta.owner != caller {
            return Err(NfsError::PermissionDenied(format!(
                "only the owner of {path} can change its access"
            )));
        }
        Ok(meta)
    }

    pub fn info(&self, path: &NsPath) -> Result<FileInfo, NfsError> {
        let node = self.resolve(path)?;
        Ok(FileInfo::from_node(path, node))
    }

    /// Storage handles referenced anywhere in the tree.
    pub fn content_handles(&self) -> HashSet<ContentHandle> {
        self.nodes
            .values()
            .filter_map(|node| match node {
                Node::File(file) => Some(file),
                Node::Directory(_) => None,
            })
            .flat_map(FileNode::handles)
            .collect()
    }

    /// Every file `user` may read, sorted by path.
    pub fn readable_files(&self, user: &UserId) -> Vec<NsPath> {
        let mut paths: Vec<NsPath> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.is_directory() && node.allows(user, Permission::Read))
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }
}
