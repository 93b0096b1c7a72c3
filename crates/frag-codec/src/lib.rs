//! Typed fragment codec.
//!
//! Converts strongly typed values into the generic JSON attributes a managed
//! object stores, and back, without losing the concrete type of polymorphic
//! values. Every encoded object carries a type tag under the reserved key
//! `"@type"`; on decode the tag is resolved through a sealed
//! [`TypeRegistry`](frag_registry::TypeRegistry) and checked against the type
//! the caller expects.
//!
//! Polymorphic fields are declared as [`Poly<dyn Family>`](Poly). Each `Poly`
//! writes its own tag, so a `Vec<Poly<dyn Sensor>>` holding different sensor
//! types tags every element individually.
//!
//! # Modes
//!
//! - [`CodecMode::Annotated`]: only types with a declared tag can be decoded.
//!   Safe for input from any source.
//! - [`CodecMode::TrustedSource`]: tags derived from Rust type paths are
//!   honoured too. Only for data this system wrote itself; never for
//!   attacker-controlled input.

pub mod codec;
mod context;
mod envelope;
pub mod error;
pub mod mode;
pub mod poly;

pub use codec::{EncodedFragment, FragmentCodec};
pub use error::{CodecError, CodecResult};
pub use mode::CodecMode;
pub use poly::Poly;
