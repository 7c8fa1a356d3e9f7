//! Slot identifiers

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when building a slot key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotKeyError {
    /// The key was empty or only whitespace
    #[error("slot key must not be empty")]
    Empty,

    /// The key contains a character that is not safe as a cookie or file name
    #[error("slot key '{key}' contains invalid character '{ch}'")]
    InvalidChar { key: String, ch: char },
}

/// Name of one cache slot
///
/// A slot names one logical query (e.g. `stats`). Keys are restricted to ASCII
/// letters, digits, `_`, `-` and `.` so they can be used unchanged as cookie
/// names and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey(String);

impl SlotKey {
    /// Creates a slot key, validating that it is non-empty and well-formed
    pub fn new(name: impl Into<String>) -> Result<Self, SlotKeyError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SlotKeyError::Empty);
        }
        if let Some(ch) = name.chars().find(|c| !is_slot_char(*c)) {
            return Err(SlotKeyError::InvalidChar { key: name, ch });
        }
        Ok(Self(name))
    }

    /// Creates a slot key from a name known at compile time
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(!name.is_empty() && name.chars().all(is_slot_char));
        Self(name.to_string())
    }

    /// Creates a slot key for a query narrowed to one scope, such as a guild ID
    ///
    /// `SlotKey::scoped("stats", 1234)` yields `stats_1234`.
    pub fn scoped(name: &str, scope: impl fmt::Display) -> Result<Self, SlotKeyError> {
        Self::new(format!("{}_{}", name, scope))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true if `c` may appear in a slot key or key prefix
pub fn is_slot_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SlotKey {
    type Err = SlotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
