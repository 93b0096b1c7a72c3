//! Tagged payload envelope: `{ "@type": <tag>, ...structure }`.

use frag_registry::{Family, TypeEntry, TypeRegistry};
use frag_types::TYPE_TAG_KEY;
use serde_json::Value;

use crate::error::{CodecError, CodecResult};
use crate::mode::CodecMode;

/// Add the type tag to a structural encoding.
pub(crate) fn embed_tag(structure: Value, tag: &str) -> CodecResult<Value> {
    let Value::Object(mut map) = structure else {
        return Err(CodecError::Unencodable {
            tag: tag.to_string(),
            reason: "structural encoding is not a JSON object".into(),
        });
    };
    if map.contains_key(TYPE_TAG_KEY) {
        return Err(CodecError::Unencodable {
            tag: tag.to_string(),
            reason: format!("field {TYPE_TAG_KEY:?} is reserved for the type tag"),
        });
    }
    map.insert(TYPE_TAG_KEY.to_string(), Value::String(tag.to_string()));
    Ok(Value::Object(map))
}

/// Remove the type tag, returning it with the remaining structure.
pub(crate) fn split_tag(payload: Value) -> CodecResult<(String, Value)> {
    let Value::Object(mut map) = payload else {
        return Err(CodecError::unresolved(None, "payload is not an object, no type tag"));
    };
    match map.remove(TYPE_TAG_KEY) {
        Some(Value::String(tag)) => Ok((tag, Value::Object(map))),
        Some(other) => Err(CodecError::MalformedPayload {
            tag: other.to_string(),
            reason: "type tag is not a string".into(),
        }),
        None => Err(CodecError::unresolved(None, "payload carries no type tag")),
    }
}

/// Resolve `tag`, honouring the codec mode.
pub(crate) fn resolve<'r>(
    registry: &'r TypeRegistry,
    mode: CodecMode,
    tag: &str,
) -> CodecResult<&'r TypeEntry> {
    let entry = registry
        .resolve(tag)
        .map_err(|_| CodecError::unresolved(Some(tag), "not registered"))?;
    if !mode.admits(entry.origin()) {
        return Err(CodecError::unresolved(
            Some(tag),
            "conventional tags are only honoured from a trusted source",
        ));
    }
    Ok(entry)
}

/// Decode a tagged payload as a member of family `F`.
pub(crate) fn decode_member<F: ?Sized + Family>(
    registry: &TypeRegistry,
    mode: CodecMode,
    payload: Value,
) -> CodecResult<Box<F>> {
    let (tag, structure) = split_tag(payload)?;
    resolve(registry, mode, &tag)?;
    let decode = registry
        .member_decoder::<F>(&tag)
        .map_err(|_| CodecError::TypeMismatch {
            expected: F::NAME.to_string(),
            found: tag.clone(),
        })?;
    decode(structure).map_err(|err| CodecError::malformed(&tag, err))
}
