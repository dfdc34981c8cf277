//! Access Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of access being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may access the objects of a group for one access mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    /// Only members of the group.
    #[default]
    Group,
    /// Everyone.
    All,
}

impl AccessScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::All => "all",
        }
    }

    /// Whether this scope restricts access to group members.
    pub const fn is_restrictive(self) -> bool {
        matches!(self, Self::Group)
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is neither `"group"` nor `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid access value: {0} (expected \"group\" or \"all\")")]
pub struct ParseScopeError(pub String);

impl FromStr for AccessScope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "all" => Ok(Self::All),
            other => Err(ParseScopeError(other.to_string())),
        }
    }
}
