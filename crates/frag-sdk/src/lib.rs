//! High-level SDK for typed fragments on multi-tenant managed objects.
//!
//! [`Platform`] is the main entry point for applications. It owns the
//! configuration, the subscribed tenants, the store backend and the codec,
//! and hands out a typed [`Inventory`] for each tenant scope.

pub mod config;
pub mod error;
pub mod inventory;
pub mod platform;

pub use config::{PlatformConfig, TenantConfig};
pub use error::{PlatformError, PlatformResult};
pub use inventory::Inventory;
pub use platform::Platform;

// Re-export key types
pub use frag_codec::{CodecError, CodecMode, FragmentCodec, Poly};
pub use frag_registry::{family_members, Family, Fragment, MemberOf, Tagged, TypeRegistry};
pub use frag_store::{InventoryFilter, ObjectQuery, StoreError};
pub use frag_tenant::{current_tenant, RoleChecker, TenantContext, TenantReport, TenantScope};
pub use frag_types::{ManagedObject, ManagedObjectId, TenantId, TenantIdentity};
