//! [`CredentialStore`] – the single username/password check behind
//! `POST /login`.
//!
//! Credentials come from a JSON object mapping usernames to plaintext
//! passwords, e.g. `{"alice": "hunter2"}`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use teleop_types::RelayError;

#[derive(Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// An empty store; every login fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(username, password)` pairs.
    pub fn from_pairs<I, U, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            users: pairs
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    /// Load the users file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Credentials`] if the file cannot be read or is
    /// not a JSON object of strings.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Credentials(format!("failed to read {}: {e}", path.display()))
        })?;
        let users: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            RelayError::Credentials(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Self { users })
    }

    /// `true` when `username` exists with a non-empty password equal to
    /// `password`.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| !expected.is_empty() && expected == password)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.users.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CredentialStore")
            .field("users", &names)
            .field("passwords", &"<redacted>")
            .finish()
    }
}
