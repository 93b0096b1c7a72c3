//! Foundation types for typed fragments.
//!
//! Every other `frag` crate depends on `frag-types`. It defines the generic,
//! schemaless record the remote store owns, the rules for naming fragments on
//! that record, and the identity of the tenant whose partition is addressed.
//!
//! # Key Types
//!
//! - [`ManagedObject`] — Generic record: store-owned attributes plus named fragments
//! - [`ManagedObjectId`] — Opaque, store-assigned identifier
//! - [`TenantId`] / [`TenantIdentity`] — Tenant identifier plus connection material
//! - [`fragment`] — Default fragment-name derivation and name validation

pub mod error;
pub mod fragment;
pub mod object;
pub mod tenant;

pub use error::TypeError;
pub use fragment::{
    default_fragment_name, tag_for_fragment_name, validate_custom_fragment_name,
    validate_fragment_name, validate_type_tag, TYPE_TAG_KEY,
};
pub use object::{ManagedObject, ManagedObjectId};
pub use tenant::{Credentials, TenantId, TenantIdentity};
