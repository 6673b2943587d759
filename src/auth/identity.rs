//! Identity store
//!
//! Registered users and credential checks. Users are never deleted, so a
//! [`UserId`] stays valid for the lifetime of the store.

use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use super::credentials::{CredentialVerifier, StoredCredential};
use super::validator::{validate_secret, validate_username};
use crate::error::NfsError;

/// Owner of the namespace root; can never be registered or logged into.
const SYSTEM_USER: &str = "system";

/// Identity of a registered user (usernames are unique and immutable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn system() -> Self {
        UserId(SYSTEM_USER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn named(name: &str) -> Self {
        UserId(name.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct IdentityStore {
    users: RwLock<HashMap<String, StoredCredential>>,
    verifier: Arc<dyn CredentialVerifier>,
    max_username_length: usize,
}

impl IdentityStore {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, max_username_length: usize) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            verifier,
            max_username_length,
        }
    }

    /// Registers a new user; the name is claimed atomically.
    pub fn register(&self, username: &str, secret: &str) -> Result<UserId, NfsError> {
        validate_username(username, self.max_username_length)?;
        validate_secret(secret, self.max_username_length)?;

        if username == SYSTEM_USER {
            return Err(NfsError::AlreadyExists(format!("user {username}")));
        }

        let sealed = self.verifier.seal(secret);
        let mut users = self.users.write();
        match users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(NfsError::AlreadyExists(format!("user {username}"))),
            Entry::Vacant(slot) => {
                slot.insert(sealed);
                info!("Registered user {}", username);
                Ok(UserId(username.to_string()))
            }
        }
    }

    pub fn authenticate(&self, username: &str, secret: &str) -> Result<UserId, NfsError> {
        let users = self.users.read();
        match users.get(username) {
            Some(stored) if self.verifier.verify(secret, stored) => {
                Ok(UserId(username.to_string()))
            }
            _ => Err(NfsError::Unauthenticated(format!(
                "invalid credentials for {username}"
            ))),
        }
    }

    /// Looks up a registered user by name.
    pub fn lookup(&self, username: &str) -> Result<UserId, NfsError> {
        if self.users.read().contains_key(username) {
            Ok(UserId(username.to_string()))
        } else {
            Err(NfsError::NotFound(format!("user {username}")))
        }
    }

    /// Stored credentials of every user, for persisting the store.
    pub fn export(&self) -> BTreeMap<String, StoredCredential> {
        self.users
            .read()
            .iter()
            .map(|(name, credential)| (name.clone(), credential.clone()))
            .collect()
    }

    /// Adds previously exported users; names already present keep their
    /// current credentials.
    pub fn import(&self, users: BTreeMap<String, StoredCredential>) {
        let mut table = self.users.write();
        for (name, credential) in users {
            table.entry(name).or_insert(credential);
        }
    }

    /// All registered usernames, sorted.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.read().keys().cloned().collect();
        names.sort();
        names
    }
}
