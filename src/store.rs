//! Shared key/value stores: default variables and aliases.
//!
//! Both are plain string maps behind a `RwLock`, created with the engine and
//! shared by every session that holds it. Locks are held only for the single
//! map operation, never across command execution.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Prefix marking a substitution token in the input language.
pub const TOKEN_PREFIX: &str = "@";

/// A concurrent string-to-string map with an optional key prefix.
#[derive(Debug, Default)]
pub struct Store {
    prefix: &'static str,
    entries: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Store for default variables, keyed `@name`.
    pub fn variables() -> Self {
        Self::with_prefix(TOKEN_PREFIX)
    }

    /// Store for aliases, keyed by the literal alias text.
    pub fn aliases() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Full key for a bare name, e.g. `user` → `@user`. Names that already
    /// carry the prefix are returned unchanged.
    pub fn key_for(&self, name: &str) -> String {
        if name.starts_with(self.prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Insert or overwrite. Last write wins.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Copy of all entries, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
