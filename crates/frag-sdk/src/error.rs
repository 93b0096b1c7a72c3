use frag_tenant::TenantError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Tenant-bound work was attempted with no tenant bound.
    #[error("no active tenant scope")]
    NoActiveTenantScope,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("codec error: {0}")]
    Codec(#[from] frag_codec::CodecError),

    #[error("store error: {0}")]
    Store(frag_store::StoreError),

    #[error("tenant error: {0}")]
    Tenant(TenantError),

    #[error("registry error: {0}")]
    Registry(#[from] frag_registry::RegistryError),

    #[error("invalid name: {0}")]
    Type(#[from] frag_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TenantError> for PlatformError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NoActiveTenantScope => Self::NoActiveTenantScope,
            other => Self::Tenant(other),
        }
    }
}

impl From<frag_store::StoreError> for PlatformError {
    fn from(err: frag_store::StoreError) -> Self {
        match err {
            frag_store::StoreError::NoActiveTenantScope => Self::NoActiveTenantScope,
            other => Self::Store(other),
        }
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;
