//! Error types for the meta-type runtime.
//!
//! Every fallible operation returns [`MetaResult`]. Multi-step operations
//! (registration, class and instance construction, casts) stop at the first
//! failure and hand that exact error back to the caller.

use thiserror::Error;

/// Result alias used across the crate.
pub type MetaResult<T> = Result<T, MetaError>;

/// Categories of runtime errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidType,
    TypeMismatch,
    InvalidOperation,
    InvalidArg,
    InvalidPointer,
    MemAlloc,
    MemRealloc,
}

/// Errors raised by the registry, class and instance lifecycles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// Unregistered handle, or a type description that fails validation.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// A cast or class/type pairing is incompatible.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The operation is not allowed in the object's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("failed to allocate {size} bytes for {tag}")]
    MemAlloc { size: usize, tag: &'static str },

    #[error("failed to reallocate {size} bytes for {tag}")]
    MemRealloc { size: usize, tag: &'static str },
}

impl MetaError {
    pub fn invalid_type(msg: impl Into<String>) -> Self {
        MetaError::InvalidType(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        MetaError::TypeMismatch(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        MetaError::InvalidOperation(msg.into())
    }

    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        MetaError::InvalidArg(msg.into())
    }

    pub fn invalid_pointer(msg: impl Into<String>) -> Self {
        MetaError::InvalidPointer(msg.into())
    }

    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetaError::InvalidType(_) => ErrorKind::InvalidType,
            MetaError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            MetaError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            MetaError::InvalidArg(_) => ErrorKind::InvalidArg,
            MetaError::InvalidPointer(_) => ErrorKind::InvalidPointer,
            MetaError::MemAlloc { .. } => ErrorKind::MemAlloc,
            MetaError::MemRealloc { .. } => ErrorKind::MemRealloc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(MetaError::invalid_type("x").kind(), ErrorKind::InvalidType);
        assert_eq!(MetaError::type_mismatch("x").kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            MetaError::MemAlloc { size: 8, tag: "class" }.kind(),
            ErrorKind::MemAlloc
        );
    }

    #[test]
    fn display_carries_message() {
        let err = MetaError::invalid_operation("cannot destroy a default class");
        assert_eq!(
            err.to_string(),
            "invalid operation: cannot destroy a default class"
        );
        let err = MetaError::MemAlloc { size: 64, tag: "instance" };
        assert_eq!(err.to_string(), "failed to allocate 64 bytes for instance");
    }
}
