use frag_types::TypeError;

/// Errors from encoding or decoding fragments.
///
/// `UnresolvedType`, `TypeMismatch` and `MalformedPayload` are permanent:
/// retrying the same payload gives the same result.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The type tag is absent, unregistered, or not admitted in this mode.
    #[error("unresolved type {tag:?}: {reason}")]
    UnresolvedType {
        tag: Option<String>,
        reason: &'static str,
    },

    /// The tag resolved to a type incompatible with the expected one.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The payload could not be decoded into the resolved type.
    #[error("malformed payload for {tag}: {reason}")]
    MalformedPayload { tag: String, reason: String },

    /// The named fragment is absent from the record.
    #[error("fragment not found: {0}")]
    FragmentNotFound(String),

    /// The value cannot be written as a tagged payload.
    #[error("cannot encode {tag}: {reason}")]
    Unencodable { tag: String, reason: String },

    /// A fragment name or tag violates the naming rules.
    #[error(transparent)]
    InvalidName(#[from] TypeError),
}

impl CodecError {
    pub(crate) fn unresolved(tag: Option<&str>, reason: &'static str) -> Self {
        Self::UnresolvedType {
            tag: tag.map(str::to_string),
            reason,
        }
    }

    pub(crate) fn malformed(tag: &str, err: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            tag: tag.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
