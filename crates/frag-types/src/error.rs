use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid fragment name {name:?}: {reason}")]
    InvalidFragmentName { name: String, reason: &'static str },

    #[error("invalid type tag {tag:?}: {reason}")]
    InvalidTypeTag { tag: String, reason: &'static str },

    #[error("invalid managed object: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
