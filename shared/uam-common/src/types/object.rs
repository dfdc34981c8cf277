//! Object Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of object an access group can be associated with.
///
/// Content objects (`Post`, `Page`, `File`, `Category`) are locked by groups,
/// identity objects (`Role`, `User`) grant membership in them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Post,
    Page,
    File,
    Category,
    Role,
    User,
}

impl ObjectType {
    /// Every supported object type, in storage order.
    pub const ALL: [Self; 6] = [
        Self::Post,
        Self::Page,
        Self::File,
        Self::Category,
        Self::Role,
        Self::User,
    ];

    /// Tag used in storage and on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
            Self::File => "file",
            Self::Category => "category",
            Self::Role => "role",
            Self::User => "user",
        }
    }

    /// Whether objects of this type can have a structural parent.
    pub const fn has_hierarchy(self) -> bool {
        matches!(self, Self::Post | Self::Page | Self::Category)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known object type tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown object type: {0}")]
pub struct ParseObjectTypeError(pub String);

impl FromStr for ObjectType {
    type Err = ParseObjectTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseObjectTypeError(s.to_string()))
    }
}

/// Reference to a single object: its type and identifier.
///
/// Role identifiers are role names, all other identifiers are numeric ids
/// carried as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub id: String,
}

impl ObjectRef {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
        }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(ObjectType::Post, id)
    }

    pub fn page(id: impl Into<String>) -> Self {
        Self::new(ObjectType::Page, id)
    }

    pub fn file(id: impl Into<String>) -> Self {
        Self::new(ObjectType::File, id)
    }

    pub fn category(id: impl Into<String>) -> Self {
        Self::new(ObjectType::Category, id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_parse_roundtrip() {
        for ty in ObjectType::ALL {
            assert_eq!(ty.as_str().parse::<ObjectType>(), Ok(ty));
        }
    }

    #[test]
    fn test_object_type_rejects_unknown_tag() {
        let err = "comment".parse::<ObjectType>().unwrap_err();
        assert_eq!(err, ParseObjectTypeError("comment".into()));
        assert!(err.to_string().contains("comment"));
        // Tags are case sensitive
        assert!("Post".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_hierarchy_support() {
        assert!(ObjectType::Post.has_hierarchy());
        assert!(ObjectType::Page.has_hierarchy());
        assert!(ObjectType::Category.has_hierarchy());
        assert!(!ObjectType::File.has_hierarchy());
        assert!(!ObjectType::Role.has_hierarchy());
        assert!(!ObjectType::User.has_hierarchy());
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::page("12").to_string(), "page:12");
        assert_eq!(
            ObjectRef::new(ObjectType::Role, "editor").to_string(),
            "role:editor"
        );
    }

    #[test]
    fn test_object_type_serde_lowercase() {
        let json = serde_json::to_string(&ObjectType::Category).unwrap();
        assert_eq!(json, "\"category\"");
        let back: ObjectType = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(back, ObjectType::File);
    }
}
