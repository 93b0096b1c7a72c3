use frag_types::TypeError;

/// Errors from type registration and resolution.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No type was registered under this tag.
    #[error("type tag not registered: {0}")]
    NotRegistered(String),

    /// Two different Rust types were registered under one tag.
    #[error("type tag {tag} already registered for {existing}, cannot register {attempted}")]
    DuplicateTag {
        tag: String,
        existing: &'static str,
        attempted: &'static str,
    },

    /// The tag is registered but is not a member of the requested family.
    #[error("type tag {tag} is not a member of family {family}")]
    NotMember { family: &'static str, tag: String },

    /// The tag itself is unusable.
    #[error("invalid tag: {0}")]
    InvalidTag(#[from] TypeError),

    /// A process-wide registry was already installed.
    #[error("a global type registry is already installed")]
    AlreadyInstalled,
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
