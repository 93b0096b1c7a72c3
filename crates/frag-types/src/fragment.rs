//! Fragment naming rules.
//!
//! A fragment is a named top-level attribute on a [`ManagedObject`]. When the
//! caller does not pick a name, one is derived from the payload's type tag:
//!
//! | tag character        | encoded as      |
//! |----------------------|-----------------|
//! | `[A-Za-z0-9]`        | itself          |
//! | `.` (not before a digit) | `_`         |
//! | `_`                  | `_0`            |
//! | `::`                 | `_2`            |
//! | anything else        | `_1<hex>_`      |
//!
//! The result is prefixed with `@`. Every escape starts with `_` followed by a
//! digit, and a bare `_` is only ever followed by a non-digit, so the mapping
//! is reversible ([`tag_for_fragment_name`]) and therefore injective.
//! Caller-chosen names may not start with `@`, which keeps them disjoint from
//! derived names.
//!
//! [`ManagedObject`]: crate::ManagedObject

use std::fmt::Write;

use crate::error::TypeError;

/// Reserved payload key holding the type tag.
pub const TYPE_TAG_KEY: &str = "@type";

/// Prefix of every derived fragment name.
pub const DERIVED_NAME_PREFIX: char = '@';

/// Top-level attributes owned by the store. They are never fragments.
pub const RESERVED_ATTRIBUTES: &[&str] = &["id", "self", "creationTime", "lastUpdated"];

/// Check that `tag` can be embedded in a payload and turned into a name.
pub fn validate_type_tag(tag: &str) -> Result<(), TypeError> {
    if tag.is_empty() {
        return Err(TypeError::InvalidTypeTag {
            tag: tag.to_string(),
            reason: "must not be empty",
        });
    }
    // "type" would derive to "@type", the reserved payload key.
    if tag == "type" {
        return Err(TypeError::InvalidTypeTag {
            tag: tag.to_string(),
            reason: "collides with the reserved type-tag key",
        });
    }
    Ok(())
}

/// Derive the default fragment name for a type tag.
pub fn default_fragment_name(tag: &str) -> Result<String, TypeError> {
    validate_type_tag(tag)?;

    let mut out = String::with_capacity(tag.len() + 1);
    out.push(DERIVED_NAME_PREFIX);

    let mut chars = tag.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' if !chars.peek().is_some_and(|n| n.is_ascii_digit()) => out.push('_'),
            '_' => out.push_str("_0"),
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.push_str("_2");
            }
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => {
                // Writing to a String cannot fail.
                let _ = write!(out, "_1{:x}_", c as u32);
            }
        }
    }
    Ok(out)
}

/// Recover the type tag a derived fragment name was built from.
///
/// Returns `None` for names that no tag derives to, including every
/// caller-chosen name.
pub fn tag_for_fragment_name(name: &str) -> Option<String> {
    let body = name.strip_prefix(DERIVED_NAME_PREFIX)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '_' {
            if !c.is_ascii_alphanumeric() {
                return None;
            }
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('0') => {
                chars.next();
                out.push('_');
            }
            Some('1') => {
                chars.next();
                let mut hex = String::new();
                loop {
                    match chars.next()? {
                        '_' => break,
                        h if h.is_ascii_hexdigit() => hex.push(h),
                        _ => return None,
                    }
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            Some('2') => {
                chars.next();
                out.push_str("::");
            }
            Some(d) if d.is_ascii_digit() => return None,
            _ => out.push('.'),
        }
    }

    if validate_type_tag(&out).is_err() {
        return None;
    }
    Some(out)
}

/// Check that `name` may be used as a fragment key on a managed object.
pub fn validate_fragment_name(name: &str) -> Result<(), TypeError> {
    let reject = |reason| {
        Err(TypeError::InvalidFragmentName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject("must not be empty");
    }
    if name == TYPE_TAG_KEY {
        return reject("reserved for the type tag");
    }
    if RESERVED_ATTRIBUTES.contains(&name) {
        return reject("reserved for store-owned attributes");
    }
    Ok(())
}

/// Check a caller-chosen fragment name (a name override).
pub fn validate_custom_fragment_name(name: &str) -> Result<(), TypeError> {
    validate_fragment_name(name)?;
    if name.starts_with(DERIVED_NAME_PREFIX) {
        return Err(TypeError::InvalidFragmentName {
            name: name.to_string(),
            reason: "the '@' prefix is reserved for derived names",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dotted_tag_uses_underscores() {
        let name = default_fragment_name("cookbook.business.CustomDevice").unwrap();
        assert_eq!(name, "@cookbook_business_CustomDevice");
    }

    #[test]
    fn rust_path_separator_is_distinct_from_dot() {
        let dotted = default_fragment_name("a.b").unwrap();
        let pathed = default_fragment_name("a::b").unwrap();
        assert_eq!(pathed, "@a_2b");
        assert_ne!(dotted, pathed);
    }

    #[test]
    fn underscores_do_not_collide_with_separators() {
        let a = default_fragment_name("a_b.c").unwrap();
        let b = default_fragment_name("a.b_c").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dot_before_digit_is_escaped() {
        let a = default_fragment_name("a.0b").unwrap();
        let b = default_fragment_name("a_b").unwrap();
        assert_ne!(a, b);
        assert_eq!(tag_for_fragment_name(&a).as_deref(), Some("a.0b"));
    }

    #[test]
    fn generic_types_are_escaped() {
        let name = default_fragment_name("alloc.vec.Vec<app.Sensor>").unwrap();
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@'));
        assert_eq!(
            tag_for_fragment_name(&name).as_deref(),
            Some("alloc.vec.Vec<app.Sensor>")
        );
    }

    #[test]
    fn reserved_tags_are_rejected() {
        assert!(default_fragment_name("").is_err());
        assert!(default_fragment_name("type").is_err());
    }

    #[test]
    fn custom_names_are_not_decoded_as_tags() {
        assert_eq!(tag_for_fragment_name("sensors"), None);
        assert_eq!(tag_for_fragment_name(TYPE_TAG_KEY), None);
    }

    #[test]
    fn fragment_name_validation() {
        assert!(validate_fragment_name("sensors").is_ok());
        assert!(validate_fragment_name("@cookbook_Device").is_ok());
        assert!(validate_fragment_name("").is_err());
        assert!(validate_fragment_name("@type").is_err());
        assert!(validate_fragment_name("id").is_err());
        assert!(validate_fragment_name("lastUpdated").is_err());
    }

    #[test]
    fn custom_names_may_not_use_derived_prefix() {
        assert!(validate_custom_fragment_name("sensors").is_ok());
        let err = validate_custom_fragment_name("@sensors").unwrap_err();
        assert!(matches!(err, TypeError::InvalidFragmentName { .. }));
    }

    proptest! {
        #[test]
        fn derivation_is_reversible(tag in "\\PC{1,40}") {
            prop_assume!(tag != "type");
            let name = default_fragment_name(&tag).unwrap();
            prop_assert_eq!(tag_for_fragment_name(&name), Some(tag));
        }

        #[test]
        fn derived_names_are_wire_safe(tag in "[a-zA-Z0-9_.:<>, ]{1,40}") {
            prop_assume!(tag != "type");
            let name = default_fragment_name(&tag).unwrap();
            prop_assert!(name.starts_with('@'));
            prop_assert!(name[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert_ne!(name.as_str(), TYPE_TAG_KEY);
        }
    }
}
