//! Client facade for the remote managed-object store.
//!
//! The store is generic and schemaless: it persists [`ManagedObject`]s whose
//! fragments are opaque JSON values, partitioned by tenant. This crate never
//! interprets fragment payloads or their type tags; typed access lives one
//! layer up.
//!
//! # Key Types
//!
//! - [`ManagedObjectStore`] — Backend trait: CRUD plus paged fetch, per tenant
//! - [`InMemoryInventory`] — Reference backend with per-tenant partitions
//! - [`TenantInventory`] — Facade bound to an explicit [`TenantScope`]
//! - [`InventoryApi`] — Facade resolving the tenant from the ambient binding
//! - [`InventoryFilter`] — Fragment type, `type` attribute and query expression
//! - [`ObjectQuery`] — Lazily paginated result sequence
//!
//! [`ManagedObject`]: frag_types::ManagedObject
//! [`TenantScope`]: frag_tenant::TenantScope

pub mod error;
mod expression;
pub mod filter;
pub mod inventory;
pub mod memory;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filter::{InventoryFilter, DEFAULT_PAGE_SIZE};
pub use inventory::{InventoryApi, TenantInventory};
pub use memory::InMemoryInventory;
pub use query::ObjectQuery;
pub use traits::{ManagedObjectStore, Page};
