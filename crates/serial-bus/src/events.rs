//! # Event Identity
//!
//! Registry keys for the serial bus. Identity is the only thing that matters
//! here: identifiers are hashed and compared for equality, never ordered or
//! inspected.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

/// Opaque key under which listeners are registered.
///
/// `Named` identifiers share a caller-managed namespace, so two callers using
/// the same name address the same listeners. `Unique` identifiers are random
/// UUIDs and never collide with any other identifier produced in this
/// process; they are what the channel facade hands out to keep unrelated
/// channels isolated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventId {
    /// Caller-chosen name.
    Named(Cow<'static, str>),

    /// Process-unique token.
    Unique(Uuid),
}

impl EventId {
    /// Create a named identifier.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }

    /// Create an identifier guaranteed not to equal any identifier produced
    /// before or after it.
    #[must_use]
    pub fn unique() -> Self {
        Self::Unique(Uuid::new_v4())
    }
}

impl From<&'static str> for EventId {
    fn from(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }
}

impl From<String> for EventId {
    fn from(name: String) -> Self {
        Self::Named(Cow::Owned(name))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Unique(id) => write!(f, "unique:{id}"),
        }
    }
}
