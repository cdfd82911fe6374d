//! Logical storage keys, the central key registry, and native-key derivation.
//!
//! A [`StorageKey`] names a class of persisted records (`"customers"`,
//! `"orders"`, `"user-settings"`). Keys are validated on construction so
//! that the `:` separator used by [`native_key`] can never appear inside a
//! key component.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scope::UserScope;

/// Prefix reserved for disposable diagnostic probe keys.
///
/// The [`KeyRegistry`] refuses to register keys with this prefix, so probe
/// data can never be picked up by a migration sweep.
pub const PROBE_KEY_PREFIX: &str = "__probe";

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_][a-z0-9_.-]*$").expect("storage key pattern is valid")
});

/// Errors from constructing or registering a [`StorageKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("storage key must not be empty")]
    Empty,
    #[error("invalid storage key {key:?}: expected lowercase alphanumerics, '_', '.', '-'")]
    InvalidCharacters { key: String },
    #[error("storage key {key:?} uses the reserved probe prefix")]
    Reserved { key: String },
}

/// Logical name for a class of persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Validates and wraps a key name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Empty`] for an empty string and
    /// [`KeyError::InvalidCharacters`] when the name contains anything other
    /// than lowercase ASCII alphanumerics, `_`, `.` or `-`.
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::Empty);
        }
        if !KEY_PATTERN.is_match(&name) {
            return Err(KeyError::InvalidCharacters { key: name });
        }
        Ok(Self(name))
    }

    /// Builds a key in the probe namespace: `__probe-<suffix>`.
    ///
    /// Characters outside the key alphabet are replaced with `-`, so any
    /// suffix (a UUID, a timestamp) yields a valid key.
    #[must_use]
    pub fn probe(suffix: &str) -> Self {
        let suffix: String = suffix
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(format!("{PROBE_KEY_PREFIX}-{suffix}"))
    }

    /// Returns the key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key belongs to the diagnostic probe namespace.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.0.starts_with(PROBE_KEY_PREFIX)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StorageKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the Local Cache key for a `(key, scope)` pair.
///
/// Format: `<app-prefix>:<key>:<scope-or-"guest">`.
#[must_use]
pub fn native_key(app_prefix: &str, key: &StorageKey, scope: &UserScope) -> String {
    format!("{app_prefix}:{key}:{scope}")
}

/// Central, enumerable set of storage keys known to the application.
///
/// Preserves registration order so migration sweeps visit keys
/// deterministically. Duplicate registrations are ignored.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: Vec<StorageKey>,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of key names.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn from_names<I, S>(names: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(StorageKey::new(name)?)?;
        }
        Ok(registry)
    }

    /// Adds a key. Returns `Ok(false)` if it was already registered.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Reserved`] for keys in the probe namespace.
    pub fn register(&mut self, key: StorageKey) -> Result<bool, KeyError> {
        if key.is_probe() {
            return Err(KeyError::Reserved { key: key.0 });
        }
        if self.keys.contains(&key) {
            return Ok(false);
        }
        self.keys.push(key);
        Ok(true)
    }

    /// Whether the key is registered.
    #[must_use]
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.keys.contains(key)
    }

    /// Iterates keys in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &StorageKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
