use frag_registry::Origin;
use serde::{Deserialize, Serialize};

/// Trust mode of a [`FragmentCodec`](crate::FragmentCodec).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecMode {
    /// Only declared tags are resolved.
    #[default]
    Annotated,
    /// Declared and conventional tags are resolved.
    ///
    /// Unsafe on attacker-controlled input: the sender picks which registered
    /// type gets built, including types that never opted in with a declared tag.
    TrustedSource,
}

impl CodecMode {
    /// Whether a registry entry of the given origin may be decoded.
    pub fn admits(self, origin: Origin) -> bool {
        match self {
            Self::Annotated => origin == Origin::Declared,
            Self::TrustedSource => true,
        }
    }
}

impl std::fmt::Display for CodecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Annotated => f.write_str("annotated"),
            Self::TrustedSource => f.write_str("trusted_source"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotated_admits_only_declared() {
        assert!(CodecMode::Annotated.admits(Origin::Declared));
        assert!(!CodecMode::Annotated.admits(Origin::Conventional));
    }

    #[test]
    fn trusted_admits_everything() {
        assert!(CodecMode::TrustedSource.admits(Origin::Declared));
        assert!(CodecMode::TrustedSource.admits(Origin::Conventional));
    }

    #[test]
    fn serde_names() {
        let mode: CodecMode = serde_json::from_str("\"trusted_source\"").unwrap();
        assert_eq!(mode, CodecMode::TrustedSource);
        assert_eq!(CodecMode::default(), CodecMode::Annotated);
        assert_eq!(CodecMode::TrustedSource.to_string(), "trusted_source");
    }
}
