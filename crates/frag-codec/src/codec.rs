use std::sync::Arc;

use frag_registry::{Family, Fragment, Tagged, TypeRegistry};
use frag_types::{default_fragment_name, validate_custom_fragment_name, ManagedObject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::context::DecodeScope;
use crate::envelope;
use crate::error::{CodecError, CodecResult};
use crate::mode::CodecMode;

/// A fragment ready to be set on a managed object.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedFragment {
    pub name: String,
    pub payload: Value,
}

/// Encodes typed values as fragment payloads and decodes them back.
///
/// Encoding is a pure function of the value and the registry. Decoding
/// resolves the payload's tag through the registry, checks it against the
/// expected type, and only then decodes the structure. Failures are never
/// downgraded to an untyped value.
#[derive(Clone, Debug)]
pub struct FragmentCodec {
    registry: Arc<TypeRegistry>,
    mode: CodecMode,
}

impl FragmentCodec {
    pub fn new(registry: Arc<TypeRegistry>, mode: CodecMode) -> Self {
        Self { registry, mode }
    }

    /// A codec that only decodes types with declared tags.
    pub fn annotated(registry: Arc<TypeRegistry>) -> Self {
        Self::new(registry, CodecMode::Annotated)
    }

    /// A codec that also honours conventional tags.
    ///
    /// Only use this for data written by this same system.
    pub fn trusted_source(registry: Arc<TypeRegistry>) -> Self {
        Self::new(registry, CodecMode::TrustedSource)
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The name `T` is stored under when no name is given.
    pub fn default_fragment_name<T: Fragment>() -> CodecResult<String> {
        Ok(default_fragment_name(&T::type_tag())?)
    }

    fn fragment_name<T: Fragment>(name: Option<&str>) -> CodecResult<String> {
        match name {
            Some(name) => {
                validate_custom_fragment_name(name)?;
                Ok(name.to_string())
            }
            None => Self::default_fragment_name::<T>(),
        }
    }

    // ---- Encoding ----

    /// Encode a concrete value with its type tag.
    pub fn encode<T: Fragment>(&self, object: &T, name: Option<&str>) -> CodecResult<EncodedFragment> {
        let tag = T::type_tag();
        let structure = serde_json::to_value(object).map_err(|err| CodecError::Unencodable {
            tag: tag.to_string(),
            reason: err.to_string(),
        })?;
        Ok(EncodedFragment {
            name: Self::fragment_name::<T>(name)?,
            payload: envelope::embed_tag(structure, &tag)?,
        })
    }

    /// Encode a family member behind a trait object.
    ///
    /// The tag and the default name come from the concrete member.
    pub fn encode_member<F: ?Sized + Family>(
        &self,
        object: &F,
        name: Option<&str>,
    ) -> CodecResult<EncodedFragment> {
        let tag = Tagged::tag(object);
        let structure = Tagged::to_structure(object).map_err(|err| CodecError::Unencodable {
            tag: tag.to_string(),
            reason: err.to_string(),
        })?;
        let name = match name {
            Some(name) => {
                validate_custom_fragment_name(name)?;
                name.to_string()
            }
            None => default_fragment_name(&tag)?,
        };
        Ok(EncodedFragment {
            name,
            payload: envelope::embed_tag(structure, &tag)?,
        })
    }

    /// Encode an untagged container, e.g. `Vec<Poly<dyn Sensor>>`.
    ///
    /// Containers have no type of their own to derive a name from, so the
    /// name is required. Polymorphic elements still carry their own tags.
    pub fn encode_value<V: Serialize>(&self, value: &V, name: &str) -> CodecResult<EncodedFragment> {
        validate_custom_fragment_name(name)?;
        let payload = serde_json::to_value(value).map_err(|err| CodecError::Unencodable {
            tag: name.to_string(),
            reason: err.to_string(),
        })?;
        Ok(EncodedFragment {
            name: name.to_string(),
            payload,
        })
    }

    // ---- Decoding ----

    /// Decode a payload that must hold exactly a `T`.
    pub fn decode<T: Fragment>(&self, payload: &Value) -> CodecResult<T> {
        let (tag, structure) = envelope::split_tag(payload.clone())?;
        let entry = envelope::resolve(&self.registry, self.mode, &tag)?;
        if !entry.is::<T>() {
            return Err(CodecError::TypeMismatch {
                expected: T::type_tag().into_owned(),
                found: tag,
            });
        }
        self.structural(&tag, structure)
    }

    /// Decode a payload holding any registered member of family `F`.
    pub fn decode_member<F: ?Sized + Family>(&self, payload: &Value) -> CodecResult<Box<F>> {
        let scope = DecodeScope::enter(Arc::clone(&self.registry), self.mode);
        envelope::decode_member::<F>(&self.registry, self.mode, payload.clone()).map_err(|err| {
            let nested = match &err {
                CodecError::MalformedPayload { reason, .. } => scope.take_failure(reason),
                _ => None,
            };
            nested.unwrap_or(err)
        })
    }

    /// Decode an untagged container whose polymorphic parts are `Poly` values.
    pub fn decode_value<V: DeserializeOwned>(&self, payload: &Value) -> CodecResult<V> {
        self.structural(std::any::type_name::<V>(), payload.clone())
    }

    fn structural<V: DeserializeOwned>(&self, tag: &str, structure: Value) -> CodecResult<V> {
        let scope = DecodeScope::enter(Arc::clone(&self.registry), self.mode);
        serde_json::from_value(structure).map_err(|err| {
            scope
                .take_failure(&err.to_string())
                .unwrap_or_else(|| CodecError::malformed(tag, err))
        })
    }

    // ---- Managed objects ----

    /// Encode `object` and set it on `target`, replacing any fragment of
    /// the same name. Returns the name used.
    pub fn write_into<T: Fragment>(
        &self,
        target: &mut ManagedObject,
        object: &T,
        name: Option<&str>,
    ) -> CodecResult<String> {
        let fragment = self.encode(object, name)?;
        self.set(target, fragment)
    }

    pub fn write_member_into<F: ?Sized + Family>(
        &self,
        target: &mut ManagedObject,
        object: &F,
        name: Option<&str>,
    ) -> CodecResult<String> {
        let fragment = self.encode_member(object, name)?;
        self.set(target, fragment)
    }

    pub fn write_value_into<V: Serialize>(
        &self,
        target: &mut ManagedObject,
        value: &V,
        name: &str,
    ) -> CodecResult<String> {
        let fragment = self.encode_value(value, name)?;
        self.set(target, fragment)
    }

    fn set(&self, target: &mut ManagedObject, fragment: EncodedFragment) -> CodecResult<String> {
        let replaced = target.set(&fragment.name, fragment.payload)?.is_some();
        debug!(fragment = %fragment.name, replaced, "fragment written");
        Ok(fragment.name)
    }

    /// Read the fragment holding a `T`, by default under `T`'s derived name.
    pub fn read_from<T: Fragment>(&self, source: &ManagedObject, name: Option<&str>) -> CodecResult<T> {
        let name = Self::fragment_name::<T>(name)?;
        let payload = source
            .get(&name)
            .ok_or(CodecError::FragmentNotFound(name))?;
        self.decode(payload)
    }

    pub fn read_member_from<F: ?Sized + Family>(
        &self,
        source: &ManagedObject,
        name: &str,
    ) -> CodecResult<Box<F>> {
        let payload = source
            .get(name)
            .ok_or_else(|| CodecError::FragmentNotFound(name.to_string()))?;
        self.decode_member(payload)
    }

    pub fn read_value_from<V: DeserializeOwned>(&self, source: &ManagedObject, name: &str) -> CodecResult<V> {
        let payload = source
            .get(name)
            .ok_or_else(|| CodecError::FragmentNotFound(name.to_string()))?;
        self.decode_value(payload)
    }

    /// Read a fragment from a raw JSON record, e.g. a REST response body.
    pub fn read_from_record<T: Fragment>(&self, record: &Value, name: Option<&str>) -> CodecResult<T> {
        let name = Self::fragment_name::<T>(name)?;
        let payload = record
            .get(&name)
            .ok_or(CodecError::FragmentNotFound(name))?;
        self.decode(payload)
    }
}
