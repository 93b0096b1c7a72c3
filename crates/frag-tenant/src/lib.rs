//! Tenant execution context.
//!
//! Work against the managed-object store always runs on behalf of one tenant.
//! This crate binds that tenant to the unit of work (a thread's synchronous
//! call or a tokio task), tracks which tenants are subscribed, and fans work
//! out over all of them with per-tenant fault isolation.
//!
//! # Key Types
//!
//! - [`TenantScope`] — Handle to the tenant a callback runs for
//! - [`TenantContext`] — `run_for_tenant` / `call_for_tenant` / `run_for_each_tenant`
//! - [`TenantReport`] — Per-tenant outcomes of a fan-out
//! - [`SubscriptionService`] — Subscribed tenant set with lifecycle callbacks
//! - [`RoleChecker`] — Role check for a bound scope
//!
//! # Design Rules
//!
//! 1. There is no process-wide current tenant. Bindings belong to a unit of work.
//! 2. A binding is released on every exit path, panics included.
//! 3. A fan-out attempts every tenant and reports each one; nothing short-circuits.

pub mod context;
pub mod error;
pub mod roles;
pub mod scope;
pub mod subscription;

pub use context::{TenantContext, TenantFailure, TenantOutcome, TenantReport};
pub use error::{TenantError, TenantResult};
pub use roles::RoleChecker;
pub use scope::{current_scope, current_tenant, require_scope, ScopeGuard, TenantScope};
pub use subscription::{
    CredentialResolver, EventLog, SubscriptionEvent, SubscriptionListener, SubscriptionService,
    TenantDirectory,
};
