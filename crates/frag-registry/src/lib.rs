//! Closed type registry for typed fragments.
//!
//! A fragment payload carries a type tag naming the concrete type that
//! produced it. On decode the tag is looked up here, and only types that were
//! registered at startup can be built. Nothing is ever loaded or instantiated
//! by name.
//!
//! # Key Types
//!
//! - [`Fragment`] — A concrete payload type, optionally carrying a declared tag
//! - [`Tagged`] — Object-safe view of a fragment used by polymorphic values
//! - [`Family`] — An abstract polymorphic role such as `dyn Sensor`
//! - [`MemberOf`] — Membership of a concrete type in a family
//! - [`TypeRegistry`] — Sealed, shareable tag → type mapping
//!
//! # Design Rules
//!
//! 1. Registration happens on a [`TypeRegistryBuilder`]; `build()` seals it.
//! 2. A sealed registry is immutable and safe to share across threads.
//! 3. One tag maps to exactly one Rust type.
//! 4. Unknown tags are errors, never an untyped fallback.

pub mod error;
pub mod fragment;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use fragment::{conventional_tag, Family, Fragment, MemberOf, Origin, Tagged};
pub use registry::{global, install_global, MemberDecoder, TypeEntry, TypeRegistry, TypeRegistryBuilder};
