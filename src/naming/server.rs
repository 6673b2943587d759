//! Naming server
//!
//! The authority for every command: it owns the identity store, the
//! namespace tree and the path locks, and reaches file bytes only through
//! the storage engine. Each command is authenticated, resolved and
//! authorized before any lock is taken, so a refused command leaves no
//! trace. Under the locks the checks are repeated against the current tree,
//! then storage and metadata are updated and the locks are released when
//! the guard drops.

use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use super::registry::{self, RegistryFile};
use super::request::{RequestPhase, RequestTrace};
use crate::auth::{IdentityStore, UserId};
use crate::client::Session;
use crate::config::NamingConfig;
use crate::error::NfsError;
use crate::locks::{LockSet, PathGuard, PathLockManager};
use crate::namespace::{Checkpoint, FileNode, NamespaceTree, Node, NsPath, Permission};
use crate::protocol::{Command, Reply};
use crate::storage::{ByteRange, ContentHandle, StorageEngine, WriteOffset};

pub struct NamingServer {
    identities: IdentityStore,
    tree: RwLock<NamespaceTree>,
    locks: PathLockManager,
    storage: Arc<dyn StorageEngine>,
    registry: Option<RegistryFile>,
    max_path_depth: usize,
    max_file_size: u64,
    lock_timeout: Option<Duration>,
}

fn check(node: &Node, user: &UserId, path: &NsPath, required: Permission) -> Result<(), NfsError> {
    if node.allows(user, required) {
        Ok(())
    } else {
        Err(NfsError::PermissionDenied(format!(
            "{user} has no {required} access to {path}"
        )))
    }
}

impl NamingServer {
    /// A naming server that keeps its state in memory only.
    pub fn new(
        config: &NamingConfig,
        identities: IdentityStore,
        storage: Arc<dyn StorageEngine>,
    ) -> Self {
        Self {
            identities,
            tree: RwLock::new(NamespaceTree::new()),
            locks: PathLockManager::new(),
            storage,
            registry: None,
            max_path_depth: config.max_path_depth,
            max_file_size: config.max_file_size,
            lock_timeout: config.lock_timeout(),
        }
    }

    /// A naming server that restores users and the namespace from
    /// `registry` and saves them back after every change. Content that no
    /// restored file refers to is deleted from storage.
    pub async fn open(
        config: &NamingConfig,
        identities: IdentityStore,
        storage: Arc<dyn StorageEngine>,
        registry: RegistryFile,
    ) -> Result<Self, NfsError> {
        let mut server = Self::new(config, identities, storage);
        match registry.load().await? {
            Some(saved) => {
                server.identities.import(saved.users);
                server.tree = RwLock::new(saved.tree);
                server.sweep_orphans().await?;
            }
            None => {
                let stored = server.storage.list().await?.len();
                if stored > 0 {
                    warn!(
                        "No registry at {}; leaving {} stored blobs untouched",
                        registry.path().display(),
                        stored
                    );
                }
            }
        }
        server.registry = Some(registry);
        Ok(server)
    }

    /// Deletes stored content that no file, undo record or checkpoint uses.
    async fn sweep_orphans(&self) -> Result<usize, NfsError> {
        let live = self.tree.read().content_handles();
        let mut swept = 0;
        for handle in self.storage.list().await? {
            if !live.contains(&handle) {
                self.discard(handle).await;
                swept += 1;
            }
        }
        if swept > 0 {
            info!("Removed {} orphaned blobs from storage", swept);
        }
        Ok(swept)
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    pub fn locks(&self) -> &PathLockManager {
        &self.locks
    }

    /// Runs one command on behalf of `session`.
    pub async fn execute(&self, session: &mut Session, command: Command) -> Result<Reply, NfsError> {
        let mut trace = RequestTrace::new(command.keyword());
        let mutates = command.mutates();
        let result = self.dispatch(&mut trace, session, command).await;
        if mutates && result.is_ok() {
            self.persist().await;
        }
        trace.finish(&result);
        if let Err(err) = &result {
            debug!("Request {} failed: {}", trace.id(), err);
        }
        result
    }

    /// Saves users and the namespace when a registry is attached. A failed
    /// save is logged; the change itself has already happened.
    async fn persist(&self) {
        let Some(file) = &self.registry else {
            return;
        };
        let saved = file
            .save_with(|| registry::encode(self.identities.export(), &self.tree.read()))
            .await;
        if let Err(e) = saved {
            warn!("Failed to save registry {}: {}", file.path().display(), e);
        }
    }

    async fn dispatch(
        &self,
        trace: &mut RequestTrace,
        session: &mut Session,
        command: Command,
    ) -> Result<Reply, NfsError> {
        let user = match &command {
            Command::Register { username, password } => {
                let user = self.identities.register(username, password)?;
                return self.bind_session(trace, session, user, "registered");
            }
            Command::Login { username, password } => {
                let user = self.identities.authenticate(username, password)?;
                return self.bind_session(trace, session, user, "logged in");
            }
            Command::Quit => {
                session.logout();
                return Ok(Reply::message("Goodbye"));
            }
            _ => session.user().cloned().ok_or_else(|| {
                NfsError::Unauthenticated("log in or register before issuing commands".into())
            })?,
        };
        trace.advance(RequestPhase::Authenticated)?;

        match command {
            Command::Create { path, content } => {
                self.create(trace, &user, &path, content.as_bytes()).await
            }
            Command::Read { path } => self.read(trace, &user, &path).await,
            Command::Write {
                path,
                offset,
                content,
            } => self.write(trace, &user, &path, offset, content.as_bytes()).await,
            Command::Delete { path } => self.delete(trace, &user, &path).await,
            Command::Info { path } => self.info(trace, &user, &path).await,
            Command::Copy { src, dst } => self.copy(trace, &user, &src, &dst).await,
            Command::Move { src, dst } => self.rename(trace, &user, &src, &dst).await,
            Command::CreateFolder { path } => self.create_folder(trace, &user, &path).await,
            Command::ViewFolder { path } => self.view_folder(trace, &user, &path).await,
            Command::AddAccess {
                path,
                grantee,
                permission,
            } => self.add_access(trace, &user, &path, &grantee, permission).await,
            Command::RemAccess { path, grantee } => {
                self.rem_access(trace, &user, &path, &grantee).await
            }
            Command::RequestAccess { path, permission } => {
                self.request_access(trace, &user, &path, permission).await
            }
            Command::ViewRequests => {
                trace.advance(RequestPhase::Authorized)?;
                let lines: Vec<String> = self
                    .tree
                    .read()
                    .pending_requests(&user)
                    .into_iter()
                    .map(|(path, requester, permission)| {
                        format!("{requester} requested {permission} access to {path}")
                    })
                    .collect();
                trace.advance(RequestPhase::Executed)?;
                Ok(Reply::with_data(
                    format!("{} pending access requests", lines.len()),
                    lines.join("\n"),
                ))
            }
            Command::ApproveRequest { path, requester } => {
                self.answer_request(trace, &user, &path, &requester, true).await
            }
            Command::DenyRequest { path, requester } => {
                self.answer_request(trace, &user, &path, &requester, false).await
            }
            Command::Undo { path } => self.undo(trace, &user, &path).await,
            Command::Checkpoint { path, tag } => self.checkpoint(trace, &user, &path, &tag).await,
            Command::ViewCheckpoint { path, tag } => {
                self.view_checkpoint(trace, &user, &path, &tag).await
            }
            Command::Revert { path, tag } => self.revert(trace, &user, &path, &tag).await,
            Command::ListCheckpoints { path } => self.list_checkpoints(trace, &user, &path).await,
            Command::List => {
                trace.advance(RequestPhase::Authorized)?;
                let names = self.identities.usernames();
                trace.advance(RequestPhase::Executed)?;
                Ok(Reply::with_data(
                    format!("{} registered users", names.len()),
                    names.join("\n"),
                ))
            }
            Command::View => {
                trace.advance(RequestPhase::Authorized)?;
                let files: Vec<String> = self
                    .tree
                    .read()
                    .readable_files(&user)
                    .iter()
                    .map(|p| p.to_string())
                    .collect();
                trace.advance(RequestPhase::Executed)?;
                Ok(Reply::with_data(
                    format!("{} readable files", files.len()),
                    files.join("\n"),
                ))
            }
            Command::Register { .. } | Command::Login { .. } | Command::Quit => Err(
                NfsError::Internal("session command reached the namespace dispatcher".into()),
            ),
        }
    }

    fn bind_session(
        &self,
        trace: &mut RequestTrace,
        session: &mut Session,
        user: UserId,
        verb: &str,
    ) -> Result<Reply, NfsError> {
        trace.advance(RequestPhase::Authenticated)?;
        trace.advance(RequestPhase::Authorized)?;
        info!("User {} {} from {}", user, verb, session.label());
        session.login(user.clone());
        trace.advance(RequestPhase::Executed)?;
        Ok(Reply::message(format!("User {user} {verb} successfully")))
    }

    fn parse(&self, raw: &str) -> Result<NsPath, NfsError> {
        NsPath::parse(raw, self.max_path_depth)
    }

    /// Refuses a file that would end past `end` bytes.
    fn check_size(&self, path: &NsPath, end: Option<u64>) -> Result<(), NfsError> {
        match end {
            Some(end) if end <= self.max_file_size => Ok(()),
            _ => Err(NfsError::InvalidArgument(format!(
                "{path} would exceed the {} byte file size limit",
                self.max_file_size
            ))),
        }
    }

    async fn lock(&self, trace: &mut RequestTrace, set: LockSet) -> Result<PathGuard, NfsError> {
        let guard = match self.lock_timeout {
            Some(limit) => self.locks.acquire_within(set, limit).await?,
            None => self.locks.acquire(set).await,
        };
        trace.advance(RequestPhase::Locked)?;
        Ok(guard)
    }

    fn authorize(&self, user: &UserId, path: &NsPath, required: Permission) -> Result<(), NfsError> {
        let tree = self.tree.read();
        check(tree.resolve(path)?, user, path, required)
    }

    /// Authorizes access to a regular file and extracts what the caller
    /// needs from it.
    fn with_file<T>(
        &self,
        user: &UserId,
        path: &NsPath,
        required: Permission,
        view: impl FnOnce(&FileNode) -> Result<T, NfsError>,
    ) -> Result<T, NfsError> {
        let tree = self.tree.read();
        let node = tree.resolve(path)?;
        check(node, user, path, required)?;
        match node {
            Node::File(file) => view(file),
            Node::Directory(_) => Err(NfsError::InvalidArgument(format!(
                "{path} is a directory"
            ))),
        }
    }

    fn authorize_file(
        &self,
        user: &UserId,
        path: &NsPath,
        required: Permission,
    ) -> Result<ContentHandle, NfsError> {
        self.with_file(user, path, required, |file| Ok(file.handle))
    }

    /// `path` must be vacant and its parent a directory `user` may write.
    fn authorize_insert(&self, user: &UserId, path: &NsPath) -> Result<(), NfsError> {
        let parent = path
            .parent()
            .ok_or_else(|| NfsError::AlreadyExists("/ already exists".into()))?;
        let tree = self.tree.read();
        let dir = tree.resolve(&parent)?;
        if !dir.is_directory() {
            return Err(NfsError::InvalidArgument(format!(
                "{parent} is not a directory"
            )));
        }
        check(dir, user, &parent, Permission::Write)?;
        if tree.contains(path) {
            return Err(NfsError::AlreadyExists(format!("{path} already exists")));
        }
        Ok(())
    }

    fn authorize_owner(&self, user: &UserId, path: &NsPath) -> Result<(), NfsError> {
        let tree = self.tree.read();
        if &tree.resolve(path)?.meta().owner != user {
            return Err(NfsError::PermissionDenied(format!(
                "only the owner of {path} can change its access"
            )));
        }
        Ok(())
    }

    /// Drops content that is not, or is no longer, referenced by the namespace.
    async fn discard(&self, handle: ContentHandle) {
        if let Err(e) = self.storage.delete(handle).await {
            warn!("Failed to discard orphaned content {}: {}", handle, e);
        }
    }

    async fn create(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        content: &[u8],
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.check_size(&path, u64::try_from(content.len()).ok())?;
        self.authorize_insert(user, &path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        self.authorize_insert(user, &path)?;

        let handle = ContentHandle::new();
        let size = match self.storage.create(handle, content).await {
            Ok(size) => size,
            Err(err) => {
                // The engine may have stored the bytes before failing
                self.discard(handle).await;
                return Err(err);
            }
        };
        let inserted = self
            .tree
            .write()
            .insert_file(&path, user.clone(), handle, size, Utc::now())
            .map(|_| ());
        if let Err(err) = inserted {
            self.discard(handle).await;
            return Err(err);
        }
        trace.advance(RequestPhase::Executed)?;

        info!("Created {} ({} bytes) for {}", path, size, user);
        Ok(Reply::message(format!("File {path} created successfully")))
    }

    async fn read(&self, trace: &mut RequestTrace, user: &UserId, raw: &str) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_file(user, &path, Permission::Read)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().shared(&path)).await?;
        let handle = self.authorize_file(user, &path, Permission::Read)?;
        let data = self.storage.read(handle, ByteRange::ALL).await?;
        trace.advance(RequestPhase::Executed)?;

        Ok(Reply::with_data(
            format!("Read {} bytes from {path}", data.len()),
            data,
        ))
    }

    async fn write(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        offset: i64,
        content: &[u8],
    ) -> Result<Reply, NfsError> {
        let offset = WriteOffset::from_wire(offset)?;
        let path = self.parse(raw)?;
        if let WriteOffset::At(_) = offset {
            self.check_size(&path, offset.end(0, content.len()))?;
        }
        self.authorize_file(user, &path, Permission::Write)?;
        trace.advance(RequestPhase::Authorized)?;

        // Appends resolve the end of file only once this lock is held
        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let handle = self.with_file(user, &path, Permission::Write, |file| {
            self.check_size(&path, offset.end(file.size, content.len()))?;
            Ok(file.handle)
        })?;

        let snapshot = self.storage.duplicate(handle).await?;
        let size = match self.storage.write(handle, offset, content).await {
            Ok(size) => size,
            Err(err) => {
                self.discard(snapshot).await;
                return Err(err);
            }
        };
        let recorded = {
            let mut tree = self.tree.write();
            tree.set_metadata_on_write(&path, size, Utc::now())
                .and_then(|_| tree.replace_undo(&path, snapshot))
        };
        match recorded {
            Ok(Some(stale)) => self.discard(stale).await,
            Ok(None) => {}
            Err(err) => {
                self.discard(snapshot).await;
                return Err(err);
            }
        }
        trace.advance(RequestPhase::Executed)?;

        info!("Wrote {} bytes to {} (now {} bytes)", content.len(), path, size);
        Ok(Reply::message(format!(
            "Wrote {} bytes to {path}, size is now {size} bytes",
            content.len()
        )))
    }

    async fn delete(&self, trace: &mut RequestTrace, user: &UserId, raw: &str) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize(user, &path, Permission::Write)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let handles: Vec<ContentHandle> = {
            let tree = self.tree.read();
            let node = tree.resolve(&path)?;
            check(node, user, &path, Permission::Write)?;
            match node {
                Node::File(file) => file.handles().collect(),
                Node::Directory(_) => Vec::new(),
            }
        };

        // Bytes go first: if storage refuses, the file is still intact
        if let Some((current, history)) = handles.split_first() {
            self.storage.delete(*current).await?;
            self.tree.write().remove(&path)?;
            for handle in history {
                self.discard(*handle).await;
            }
        } else {
            self.tree.write().remove(&path)?;
        }
        trace.advance(RequestPhase::Executed)?;

        info!("Deleted {} for {}", path, user);
        Ok(Reply::message(format!("{path} deleted successfully")))
    }

    async fn info(&self, trace: &mut RequestTrace, user: &UserId, raw: &str) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize(user, &path, Permission::Read)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().shared(&path)).await?;
        let info = {
            let tree = self.tree.read();
            check(tree.resolve(&path)?, user, &path, Permission::Read)?;
            tree.info(&path)?
        };
        trace.advance(RequestPhase::Executed)?;

        Ok(Reply::with_data(format!("Info for {path}"), info.to_string()))
    }

    async fn copy(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        src: &str,
        dst: &str,
    ) -> Result<Reply, NfsError> {
        let (src, dst) = (self.parse(src)?, self.parse(dst)?);
        self.authorize_file(user, &src, Permission::Read)?;
        self.authorize_insert(user, &dst)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self
            .lock(trace, LockSet::new().shared(&src).exclusive(&dst))
            .await?;
        let handle = self.authorize_file(user, &src, Permission::Read)?;
        self.authorize_insert(user, &dst)?;

        let duplicate = self.storage.duplicate(handle).await?;
        let inserted = self
            .tree
            .write()
            .copy_file(&src, &dst, user.clone(), duplicate, Utc::now())
            .map(|_| ());
        if let Err(err) = inserted {
            self.discard(duplicate).await;
            return Err(err);
        }
        trace.advance(RequestPhase::Executed)?;

        info!("Copied {} -> {} for {}", src, dst, user);
        Ok(Reply::message(format!("Copied {src} to {dst}")))
    }

    async fn rename(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        src: &str,
        dst: &str,
    ) -> Result<Reply, NfsError> {
        let (src, dst) = (self.parse(src)?, self.parse(dst)?);
        if src.is_root() {
            return Err(NfsError::InvalidArgument("cannot move /".into()));
        }
        if dst.is_descendant_of(&src) {
            return Err(NfsError::InvalidArgument(format!(
                "cannot move {src} inside itself ({dst})"
            )));
        }
        self.authorize(user, &src, Permission::Write)?;
        self.authorize_insert(user, &dst)?;
        trace.advance(RequestPhase::Authorized)?;

        // A directory's exclusive lock waits out everything in flight below it
        let _guard = self
            .lock(trace, LockSet::new().exclusive(&src).exclusive(&dst))
            .await?;
        self.authorize(user, &src, Permission::Write)?;
        self.authorize_insert(user, &dst)?;
        self.tree.write().move_node(&src, &dst)?;
        trace.advance(RequestPhase::Executed)?;

        info!("Moved {} -> {} for {}", src, dst, user);
        Ok(Reply::message(format!("Moved {src} to {dst}")))
    }

    async fn create_folder(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_insert(user, &path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        self.authorize_insert(user, &path)?;
        self.tree
            .write()
            .insert_directory(&path, user.clone(), Utc::now())?;
        trace.advance(RequestPhase::Executed)?;

        info!("Created folder {} for {}", path, user);
        Ok(Reply::message(format!("Folder {path} created successfully")))
    }

    async fn view_folder(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize(user, &path, Permission::Read)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().shared(&path)).await?;
        let entries: Vec<String> = {
            let tree = self.tree.read();
            check(tree.resolve(&path)?, user, &path, Permission::Read)?;
            tree.list(&path)?
                .into_iter()
                .map(|name| {
                    let is_dir = tree
                        .resolve(&path.join(&name))
                        .is_ok_and(|node| node.is_directory());
                    if is_dir { format!("{name}/") } else { name }
                })
                .collect()
        };
        trace.advance(RequestPhase::Executed)?;

        Ok(Reply::with_data(
            format!("{} entries in {path}", entries.len()),
            entries.join("\n"),
        ))
    }

    async fn add_access(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        grantee: &str,
        permission: Permission,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        let grantee = self.identities.lookup(grantee)?;
        self.authorize_owner(user, &path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        self.tree
            .write()
            .grant_access(&path, user, &grantee, permission)?;
        trace.advance(RequestPhase::Executed)?;

        info!("{} granted {} on {} to {}", user, permission, path, grantee);
        Ok(Reply::message(format!(
            "Granted {permission} access on {path} to {grantee}"
        )))
    }

    async fn rem_access(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        grantee: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        let grantee = self.identities.lookup(grantee)?;
        self.authorize_owner(user, &path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        self.tree.write().revoke_access(&path, user, &grantee)?;
        trace.advance(RequestPhase::Executed)?;

        info!("{} revoked access on {} from {}", user, path, grantee);
        Ok(Reply::message(format!(
            "Revoked access on {path} from {grantee}"
        )))
    }

    /// Anyone logged in may ask; only the path has to exist.
    async fn request_access(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        permission: Permission,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.tree.read().resolve(&path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let owner = self.tree.write().request_access(&path, user, permission)?;
        trace.advance(RequestPhase::Executed)?;

        info!("{} requested {} on {} from {}", user, permission, path, owner);
        Ok(Reply::message(format!("Access request sent to {owner}")))
    }

    async fn answer_request(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        requester: &str,
        approve: bool,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        let requester = self.identities.lookup(requester)?;
        self.authorize_owner(user, &path)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let permission = self
            .tree
            .write()
            .answer_request(&path, user, &requester, approve)?;
        trace.advance(RequestPhase::Executed)?;

        if approve {
            info!("{} approved {} on {} for {}", user, permission, path, requester);
            Ok(Reply::message(format!(
                "Access granted to {requester}: {permission} on {path}"
            )))
        } else {
            info!("{} denied {} on {} for {}", user, permission, path, requester);
            Ok(Reply::message(format!(
                "Access denied to {requester}: {permission} on {path}"
            )))
        }
    }

    async fn undo(&self, trace: &mut RequestTrace, user: &UserId, raw: &str) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_file(user, &path, Permission::Write)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let previous = self.with_file(user, &path, Permission::Write, |file| {
            file.undo
                .ok_or_else(|| NfsError::InvalidArgument(format!("no undo history for {path}")))
        })?;
        let size = self.storage.size(previous).await?;
        self.tree.write().swap_undo(&path, size, Utc::now())?;
        trace.advance(RequestPhase::Executed)?;

        info!("Undo on {} for {} (now {} bytes)", path, user, size);
        Ok(Reply::message(format!("Undo successful on {path}")))
    }

    async fn checkpoint(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        tag: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        Checkpoint::validate_tag(tag)?;
        self.authorize_file(user, &path, Permission::Write)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        let handle = self.with_file(user, &path, Permission::Write, |file| {
            if file.checkpoints.contains_key(tag) {
                return Err(NfsError::AlreadyExists(format!(
                    "checkpoint {tag} of {path} already exists"
                )));
            }
            Ok(file.handle)
        })?;
        let saved = self.storage.duplicate(handle).await?;
        let added = self
            .tree
            .write()
            .add_checkpoint(&path, tag, saved, Utc::now());
        if let Err(err) = added {
            self.discard(saved).await;
            return Err(err);
        }
        trace.advance(RequestPhase::Executed)?;

        info!("Checkpoint {} of {} for {}", tag, path, user);
        Ok(Reply::message(format!("Checkpoint created: {tag}")))
    }

    async fn view_checkpoint(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        tag: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_file(user, &path, Permission::Read)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().shared(&path)).await?;
        self.authorize_file(user, &path, Permission::Read)?;
        let saved = self.tree.read().checkpoint(&path, tag)?.handle;
        let data = self.storage.read(saved, ByteRange::ALL).await?;
        trace.advance(RequestPhase::Executed)?;

        Ok(Reply::with_data(
            format!("Checkpoint {tag} of {path}: {} bytes", data.len()),
            data,
        ))
    }

    /// Restores a checkpoint into a fresh copy, so the checkpoint itself
    /// survives later writes and the replaced content stays undoable.
    async fn revert(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
        tag: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_file(user, &path, Permission::Write)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().exclusive(&path)).await?;
        self.authorize_file(user, &path, Permission::Write)?;
        let saved = self.tree.read().checkpoint(&path, tag)?.handle;

        let restored = self.storage.duplicate(saved).await?;
        let reverted = match self.storage.size(restored).await {
            Ok(size) => self
                .tree
                .write()
                .revert(&path, restored, size, Utc::now())
                .map(|stale| (size, stale)),
            Err(err) => Err(err),
        };
        let size = match reverted {
            Ok((size, stale)) => {
                if let Some(stale) = stale {
                    self.discard(stale).await;
                }
                size
            }
            Err(err) => {
                self.discard(restored).await;
                return Err(err);
            }
        };
        trace.advance(RequestPhase::Executed)?;

        info!("Reverted {} to {} for {} ({} bytes)", path, tag, user, size);
        Ok(Reply::message(format!("Reverted to checkpoint: {tag}")))
    }

    async fn list_checkpoints(
        &self,
        trace: &mut RequestTrace,
        user: &UserId,
        raw: &str,
    ) -> Result<Reply, NfsError> {
        let path = self.parse(raw)?;
        self.authorize_file(user, &path, Permission::Read)?;
        trace.advance(RequestPhase::Authorized)?;

        let _guard = self.lock(trace, LockSet::new().shared(&path)).await?;
        let lines: Vec<String> = self.with_file(user, &path, Permission::Read, |file| {
            Ok(file
                .checkpoints
                .iter()
                .map(|(tag, saved)| {
                    format!(
                        "{tag} {}",
                        saved.created.to_rfc3339_opts(SecondsFormat::Secs, true)
                    )
                })
                .collect())
        })?;
        trace.advance(RequestPhase::Executed)?;

        Ok(Reply::with_data(
            format!("{} checkpoints of {path}", lines.len()),
            lines.join("\n"),
        ))
    }
}
