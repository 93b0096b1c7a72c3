use frag_types::TenantId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantError {
    /// No subscription is known for this tenant.
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),

    /// Tenant-bound work was attempted with no tenant bound.
    #[error("no active tenant scope")]
    NoActiveTenantScope,

    #[error("missing role: {0}")]
    MissingRole(String),

    #[error("subscriptions already initialized")]
    AlreadyInitialized,
}

pub type TenantResult<T> = Result<T, TenantError>;
