//! Credential storage and verification
//!
//! Secrets are never stored; a [`CredentialVerifier`] turns them into an
//! opaque [`StoredCredential`] at registration and checks them at login.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hashed form of a user's secret as kept by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub salt: String,
    pub digest: String,
}

/// Pluggable secret hashing scheme.
pub trait CredentialVerifier: Send + Sync {
    fn seal(&self, secret: &str) -> StoredCredential;
    fn verify(&self, secret: &str, stored: &StoredCredential) -> bool;
}

/// Salted SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Verifier;

impl Sha256Verifier {
    fn digest(salt: &str, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl CredentialVerifier for Sha256Verifier {
    fn seal(&self, secret: &str) -> StoredCredential {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let digest = Self::digest(&salt, secret);
        StoredCredential { salt, digest }
    }

    fn verify(&self, secret: &str, stored: &StoredCredential) -> bool {
        let candidate = Self::digest(&stored.salt, secret);
        // Compare every byte regardless of where the first mismatch is
        candidate.len() == stored.digest.len()
            && candidate
                .bytes()
                .zip(stored.digest.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
