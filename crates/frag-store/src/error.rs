use frag_tenant::TenantError;
use frag_types::{ManagedObjectId, TypeError};

/// Errors from managed-object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A store operation was attempted outside any tenant scope.
    #[error("no active tenant scope")]
    NoActiveTenantScope,

    #[error("managed object not found: {0}")]
    NotFound(ManagedObjectId),

    /// `update` needs the id of the object to change.
    #[error("managed object has no id")]
    MissingId,

    /// The remote side rejected the request, e.g. a malformed query.
    #[error("remote error: {0}")]
    Remote(String),

    /// The storage backend failed or is unavailable.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] TypeError),

    #[error("tenant error: {0}")]
    Tenant(TenantError),
}

impl From<TenantError> for StoreError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NoActiveTenantScope => Self::NoActiveTenantScope,
            other => Self::Tenant(other),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
