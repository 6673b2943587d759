//! Registry snapshot
//!
//! Registered users and the namespace tree are saved as one JSON document
//! after every change and read back when the naming server starts. The
//! document is written to a sibling temporary file and renamed over the old
//! one, so a crash leaves either the previous or the new snapshot.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::auth::StoredCredential;
use crate::error::NfsError;
use crate::namespace::{NamespaceTree, NsPath};

/// Saved state of a naming server.
#[derive(Debug, Deserialize)]
pub struct Registry {
    pub users: BTreeMap<String, StoredCredential>,
    pub tree: NamespaceTree,
}

#[derive(Serialize)]
struct RegistryView<'a> {
    users: BTreeMap<String, StoredCredential>,
    tree: &'a NamespaceTree,
}

/// Encodes the current state without copying the tree.
pub fn encode(
    users: BTreeMap<String, StoredCredential>,
    tree: &NamespaceTree,
) -> Result<Vec<u8>, NfsError> {
    Ok(serde_json::to_vec(&RegistryView { users, tree })?)
}

pub struct RegistryFile {
    path: PathBuf,
    // Saves take turns so an older snapshot never lands after a newer one
    turn: Mutex<()>,
}

impl RegistryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            turn: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved registry; `None` if nothing was saved yet.
    pub async fn load(&self) -> Result<Option<Registry>, NfsError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let registry: Registry = serde_json::from_slice(&bytes)?;
        if !registry.tree.contains(&NsPath::root()) {
            return Err(NfsError::Internal(format!(
                "registry {} has no root directory",
                self.path.display()
            )));
        }
        info!(
            "Loaded registry {} ({} users)",
            self.path.display(),
            registry.users.len()
        );
        Ok(Some(registry))
    }

    /// Encodes a snapshot with `snapshot` and replaces the saved one.
    /// The snapshot is taken only once it is this call's turn to write.
    pub async fn save_with<F>(&self, snapshot: F) -> Result<(), NfsError>
    where
        F: FnOnce() -> Result<Vec<u8>, NfsError>,
    {
        let _turn = self.turn.lock().await;
        let bytes = snapshot()?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, &bytes).await?;
        fs::rename(&staging, &self.path).await?;
        debug!("Saved registry {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialVerifier, Sha256Verifier, UserId};
    use crate::namespace::Permission;
    use crate::storage::ContentHandle;
    use chrono::Utc;

    fn p(raw: &str) -> NsPath {
        NsPath::parse(raw, 32).unwrap()
    }

    #[tokio::test]
    async fn missing_file_loads_as_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = RegistryFile::new(dir.path().join("registry.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_tree_and_users_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = RegistryFile::new(dir.path().join("nested/registry.json"));

        let mut tree = NamespaceTree::new();
        let alice = UserId::named("alice");
        let handle = ContentHandle::new();
        tree.insert_directory(&p("docs"), alice.clone(), Utc::now()).unwrap();
        tree.insert_file(&p("docs/a.txt"), alice.clone(), handle, 4, Utc::now())
            .unwrap();
        tree.grant_access(&p("docs/a.txt"), &alice, &UserId::named("bob"), Permission::Read)
            .unwrap();
        let mut users = BTreeMap::new();
        users.insert("alice".to_string(), Sha256Verifier.seal("pw"));

        file.save_with(|| encode(users.clone(), &tree)).await.unwrap();
        let loaded = file.load().await.unwrap().unwrap();

        assert_eq!(loaded.users, users);
        let restored = loaded.tree.resolve_file(&p("docs/a.txt")).unwrap();
        assert_eq!(restored.handle, handle);
        assert_eq!(restored.size, 4);
        assert!(
            loaded
                .tree
                .resolve(&p("docs/a.txt"))
                .unwrap()
                .allows(&UserId::named("bob"), Permission::Read)
        );
        assert_eq!(loaded.tree.list(&NsPath::root()).unwrap(), vec!["docs".to_string()]);
        assert!(!dir.path().join("nested/registry.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_registry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, b"{\"users\":{},\"tree\":{\"nodes\":{}}}").unwrap();
        let err = RegistryFile::new(&path).load().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
