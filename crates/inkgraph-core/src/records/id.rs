//! Branded record identifiers.
//!
//! Every id is a string of the form `<kind>:<key>`. The typed wrappers
//! ([`ShapeId`], [`BindingId`], ...) only accept strings carrying their own
//! prefix, so ids of different kinds can never be confused.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Discriminator of a record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    Shape,
    Binding,
    Page,
    Camera,
    Instance,
}

/// Whether a record belongs to the shared document or to one editor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Persisted, synced and undoable.
    Document,
    /// Per-instance view state, never undone.
    Session,
}

impl TypeName {
    pub const ALL: [TypeName; 5] = [
        TypeName::Shape,
        TypeName::Binding,
        TypeName::Page,
        TypeName::Camera,
        TypeName::Instance,
    ];

    /// Id prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            TypeName::Shape => "shape",
            TypeName::Binding => "binding",
            TypeName::Page => "page",
            TypeName::Camera => "camera",
            TypeName::Instance => "instance",
        }
    }

    pub fn scope(self) -> RecordScope {
        match self {
            TypeName::Shape | TypeName::Binding | TypeName::Page => RecordScope::Document,
            TypeName::Camera | TypeName::Instance => RecordScope::Session,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        TypeName::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Untyped record id, the key of the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Parse an id, checking that its prefix names a known kind.
    pub fn parse(raw: &str) -> Result<Self, crate::EditorError> {
        match raw.split_once(':') {
            Some((prefix, key)) if !key.is_empty() && TypeName::from_prefix(prefix).is_some() => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(crate::EditorError::InvalidId(raw.to_string())),
        }
    }

    /// Kind encoded in the id prefix.
    pub fn type_name(&self) -> TypeName {
        self.0
            .split_once(':')
            .and_then(|(prefix, _)| TypeName::from_prefix(prefix))
            .unwrap_or(TypeName::Shape)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = crate::EditorError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> String {
        id.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! record_id {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a fresh random id.
            pub fn new() -> Self {
                Self::from_key(&Uuid::new_v4().to_string())
            }

            /// Create an id with a known key (`<kind>:<key>`).
            pub fn from_key(key: &str) -> Self {
                Self(format!("{}:{}", $kind.prefix(), key))
            }

            /// The part after the prefix.
            pub fn key(&self) -> &str {
                &self.0[$kind.prefix().len() + 1..]
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Narrow an untyped id, failing when it names another kind.
            pub fn from_record_id(id: &RecordId) -> Result<Self, crate::EditorError> {
                if id.type_name() == $kind {
                    Ok(Self(id.as_str().to_string()))
                } else {
                    Err(crate::EditorError::WrongKind {
                        id: id.clone(),
                        expected: $kind,
                    })
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::EditorError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                match raw.split_once(':') {
                    Some((prefix, key)) if prefix == $kind.prefix() && !key.is_empty() => Ok(Self(raw)),
                    _ => Err(crate::EditorError::InvalidId(raw)),
                }
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl From<$name> for RecordId {
            fn from(id: $name) -> RecordId {
                RecordId(id.0)
            }
        }

        impl From<&$name> for RecordId {
            fn from(id: &$name) -> RecordId {
                RecordId(id.0.clone())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Id of a shape record.
    ShapeId,
    TypeName::Shape
);
record_id!(
    /// Id of a binding record.
    BindingId,
    TypeName::Binding
);
record_id!(
    /// Id of a page record.
    PageId,
    TypeName::Page
);
record_id!(
    /// Id of a camera record. There is exactly one camera per page.
    CameraId,
    TypeName::Camera
);
record_id!(
    /// Id of an editor instance record.
    InstanceId,
    TypeName::Instance
);

impl CameraId {
    /// The camera belonging to `page`.
    pub fn for_page(page: &PageId) -> Self {
        Self::from_key(page.as_str())
    }

    /// The page this camera belongs to.
    pub fn page_id(&self) -> Result<PageId, crate::EditorError> {
        PageId::try_from(self.key().to_string())
    }
}
