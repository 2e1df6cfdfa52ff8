//! Report endpoint authorization
//!
//! Validates a caller-supplied key against the configured key set. Every
//! denial is logged at info level for audit; there is no rate limiting or
//! lockout.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

/// Authorization failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header not present")]
    MissingCredential,

    #[error("Invalid authentication key")]
    InvalidCredential,
}

/// Key-set authorization gate
///
/// Maps each authorized key to the identity label it was issued to.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    keys: HashMap<String, String>,
}

impl AuthorizationGate {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    /// Check a supplied key, returning the identity label on success
    pub fn check(&self, provided: Option<&str>) -> Result<&str, AuthError> {
        let Some(key) = provided else {
            info!("Denied access to client with no auth key");
            return Err(AuthError::MissingCredential);
        };

        match self.keys.get(key) {
            Some(label) => {
                debug!(label = %label, "Authorized report access");
                Ok(label.as_str())
            }
            None => {
                info!(key = %key, "Denied access to key");
                Err(AuthError::InvalidCredential)
            }
        }
    }

    /// Identity label for a key, without logging a denial
    pub fn identify(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Number of configured keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(String, String)> for AuthorizationGate {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
