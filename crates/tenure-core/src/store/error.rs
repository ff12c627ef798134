//! Store error types.

use super::ObjectKind;
use thiserror::Error;

/// Errors returned by [`ObjectStore`](super::ObjectStore) implementations.
///
/// `NotFound` and `AlreadyExists` are part of the store's contract: the
/// election engine uses them as its only concurrency signals. Everything else
/// is surfaced to the caller as-is.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object.
        kind: ObjectKind,
        /// Name of the missing object.
        name: String,
    },

    /// An object with the same key already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the conflicting object.
        kind: ObjectKind,
        /// Name of the conflicting object.
        name: String,
    },

    /// The stored object no longer matches what the caller observed.
    #[error("Conflict on {kind} '{name}': {message}")]
    Conflict {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    /// The stored object is of a different kind than requested.
    #[error("Expected a {expected} object but found a {found}")]
    UnexpectedKind {
        expected: ObjectKind,
        found: ObjectKind,
    },

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// The store could not be reached.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// An unknown error occurred.
    #[error("{0}")]
    Unknown(String),
}

impl StoreError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(kind: ObjectKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_kind(expected: ObjectKind, found: ObjectKind) -> Self {
        Self::UnexpectedKind { expected, found }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    /// Returns `true` if the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a create lost the race to an existing object.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if a precondition on the stored object failed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = StoreError::not_found(ObjectKind::Lock, "scheduler");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
        assert_eq!(err.to_string(), "Lock 'scheduler' not found");
    }

    #[test]
    fn test_already_exists_error() {
        let err = StoreError::already_exists(ObjectKind::Lock, "scheduler");
        assert!(err.is_already_exists());
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_conflict_error() {
        let err = StoreError::conflict(ObjectKind::Lock, "scheduler", "uid mismatch");
        assert!(err.is_conflict());
        assert!(err.to_string().contains("uid mismatch"));
    }

    #[test]
    fn test_unknown_error_displays_message_verbatim() {
        let err = StoreError::unknown("random error");
        assert_eq!(err.to_string(), "random error");
        assert!(!err.is_not_found());
        assert!(!err.is_already_exists());
        assert!(!err.is_conflict());
    }
}
