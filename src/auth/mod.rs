//! Authentication system
//!
//! Handles user registration, credential verification and input validation.

pub mod credentials;
pub mod identity;
pub mod validator;

pub use credentials::{CredentialVerifier, Sha256Verifier, StoredCredential};
pub use identity::{IdentityStore, UserId};
