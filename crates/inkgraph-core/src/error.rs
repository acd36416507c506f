//! Editor error types.

use crate::records::{RecordId, TypeName};
use crate::store::{HandlerId, Operation};
use thiserror::Error;

/// Broad class of an [`EditorError`], used by callers to decide whether a
/// failure is something to surface to the user or a bug in handler code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A mutation referenced a missing record or one of the wrong kind.
    Referential,
    /// A handler or the editor refused the mutation.
    Validation,
    /// Side effects re-entered themselves or cascaded too deep.
    Reentrancy,
    /// The API was used incorrectly (unknown state path, bad snapshot...).
    Usage,
}

/// Errors produced by the store, history, state chart and editor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("record already exists: {0}")]
    AlreadyExists(RecordId),
    #[error("record {id} is not a {expected}")]
    WrongKind { id: RecordId, expected: TypeName },
    #[error("{from}.{field} points at missing {expected} {to}")]
    DanglingReference {
        from: RecordId,
        field: &'static str,
        to: RecordId,
        expected: TypeName,
    },
    #[error("shape {0} is its own ancestor")]
    ParentCycle(RecordId),
    #[error("unknown shape type `{0}`")]
    UnknownShapeType(String),
    #[error("unknown binding type `{0}`")]
    UnknownBindingType(String),
    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: RecordId, reason: String },
    #[error("invalid record id `{0}`")]
    InvalidId(String),
    #[error("transaction aborted: {0}")]
    Aborted(String),
    #[error("editor is read-only")]
    ReadOnly,
    #[error("cyclic side effect: {operation:?} handler #{handler} re-entered on {id}")]
    CascadeCycle {
        id: RecordId,
        operation: Operation,
        handler: HandlerId,
    },
    #[error("side effect cascade exceeded depth {0}")]
    CascadeTooDeep(usize),
    #[error("no state at path `{0}`")]
    UnknownState(String),
    #[error("no behavior registered for state kind `{0}`")]
    MissingBehavior(String),
    #[error("invalid state chart: {0}")]
    InvalidChart(String),
    #[error("cannot delete the last page")]
    LastPage,
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshot { found: u32, expected: u32 },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EditorError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EditorError::NotFound(_)
            | EditorError::AlreadyExists(_)
            | EditorError::WrongKind { .. }
            | EditorError::DanglingReference { .. }
            | EditorError::ParentCycle(_) => ErrorCategory::Referential,
            EditorError::UnknownShapeType(_)
            | EditorError::UnknownBindingType(_)
            | EditorError::InvalidRecord { .. }
            | EditorError::InvalidId(_)
            | EditorError::Aborted(_)
            | EditorError::ReadOnly
            | EditorError::LastPage => ErrorCategory::Validation,
            EditorError::CascadeCycle { .. } | EditorError::CascadeTooDeep(_) => {
                ErrorCategory::Reentrancy
            }
            EditorError::UnknownState(_)
            | EditorError::MissingBehavior(_)
            | EditorError::InvalidChart(_)
            | EditorError::UnsupportedSnapshot { .. }
            | EditorError::Serialization(_) => ErrorCategory::Usage,
        }
    }

    /// Shorthand for an [`EditorError::Aborted`] raised by handler code.
    pub fn aborted(reason: impl Into<String>) -> Self {
        EditorError::Aborted(reason.into())
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(err: serde_json::Error) -> Self {
        EditorError::Serialization(err.to_string())
    }
}

/// Result type for editor operations.
pub type Result<T, E = EditorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ShapeId;

    #[test]
    fn test_categories() {
        let id: RecordId = ShapeId::from_key("a").into();
        assert_eq!(
            EditorError::NotFound(id.clone()).category(),
            ErrorCategory::Referential
        );
        assert_eq!(
            EditorError::CascadeTooDeep(64).category(),
            ErrorCategory::Reentrancy
        );
        assert_eq!(EditorError::ReadOnly.category(), ErrorCategory::Validation);
        assert_eq!(
            EditorError::UnknownState("root.nope".into()).category(),
            ErrorCategory::Usage
        );
    }

    #[test]
    fn test_display_mentions_record() {
        let id: RecordId = ShapeId::from_key("box").into();
        let err = EditorError::NotFound(id);
        assert_eq!(err.to_string(), "record not found: shape:box");
    }
}
