use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::config::AuthConfig;

/// Subject whose credential unlocks administrator operations.
pub const ADMIN_SUBJECT: &str = "admin";

/// Authentication collaborator consulted before privileged operations.
pub trait CredentialVerifier: Send + Sync {
    fn verify_credential(&self, subject: &str, secret: &str) -> bool;
}

/// Credential store that only retains SHA-256 digests of the secrets it was
/// given.
#[derive(Clone, Default)]
pub struct DigestCredentialStore {
    digests: HashMap<String, Vec<u8>>,
}

impl DigestCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let mut store = Self::new();
        if let Some(secret) = config.admin_secret.as_deref() {
            store.insert(ADMIN_SUBJECT, secret);
        }
        for (operator, pin) in &config.operator_pins {
            if operator == ADMIN_SUBJECT {
                continue;
            }
            store.insert(operator, pin);
        }
        store
    }

    pub fn with_secret(mut self, subject: &str, secret: &str) -> Self {
        self.insert(subject, secret);
        self
    }

    /// Registers `secret` for `subject`. Empty secrets are ignored.
    pub fn insert(&mut self, subject: &str, secret: &str) {
        if secret.is_empty() {
            return;
        }
        self.digests.insert(subject.to_string(), digest(secret));
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl std::fmt::Debug for DigestCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestCredentialStore")
            .field("subjects", &self.digests.len())
            .finish()
    }
}

impl CredentialVerifier for DigestCredentialStore {
    fn verify_credential(&self, subject: &str, secret: &str) -> bool {
        if secret.is_empty() {
            return false;
        }
        match self.digests.get(subject) {
            Some(stored) => digests_equal(stored, &digest(secret)),
            None => false,
        }
    }
}

fn digest(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}

fn digests_equal(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
