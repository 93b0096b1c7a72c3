//! Polymorphic values that keep their concrete type across encoding.

use std::fmt;
use std::ops::Deref;

use frag_registry::{Family, MemberOf, Tagged};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::context;
use crate::envelope;

/// A value of some registered member of family `F`.
///
/// Serializes as the member's structure plus its `"@type"` tag. Deserializing
/// is only possible inside a [`FragmentCodec`](crate::FragmentCodec) decode,
/// which supplies the registry that resolves the tag.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SensorArray {
///     sensors: Vec<Poly<dyn Sensor>>,
/// }
/// ```
pub struct Poly<F: ?Sized>(Box<F>);

impl<F: ?Sized> Poly<F> {
    pub fn from_box(inner: Box<F>) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> Box<F> {
        self.0
    }
}

impl<F: ?Sized + Family> Poly<F> {
    /// Wrap a concrete member.
    pub fn new<T: MemberOf<F>>(member: T) -> Self {
        Self(Box::new(member).upcast())
    }

    /// Tag of the concrete member.
    pub fn type_tag(&self) -> String {
        (*self.0).tag().into_owned()
    }

    /// Borrow the concrete member if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

impl<F: ?Sized> Deref for Poly<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

impl<F: ?Sized + fmt::Debug> fmt::Debug for Poly<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<F: ?Sized + Tagged> Serialize for Poly<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let structure = (*self.0).to_structure().map_err(S::Error::custom)?;
        let payload = envelope::embed_tag(structure, &(*self.0).tag()).map_err(S::Error::custom)?;
        payload.serialize(serializer)
    }
}

impl<'de, F: ?Sized + Family> Deserialize<'de> for Poly<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = Value::deserialize(deserializer)?;
        let Some((registry, mode)) = context::active() else {
            return Err(D::Error::custom(
                "polymorphic value decoded outside a fragment codec",
            ));
        };
        envelope::decode_member::<F>(&registry, mode, payload)
            .map(Poly)
            .map_err(|err| {
                let message = err.to_string();
                context::record_failure(err, &message);
                D::Error::custom(message)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frag_registry::{family_members, Fragment};
    use serde_json::json;

    trait Vehicle: Tagged + fmt::Debug {
        fn wheels(&self) -> u8;
    }

    impl Family for dyn Vehicle {
        const NAME: &'static str = "vehicle";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Bike {
        gears: u8,
    }

    impl Fragment for Bike {
        const TYPE_TAG: Option<&'static str> = Some("garage.Bike");
    }

    impl Vehicle for Bike {
        fn wheels(&self) -> u8 {
            2
        }
    }

    family_members!(dyn Vehicle => Bike);

    #[test]
    fn serializes_with_tag() {
        let poly: Poly<dyn Vehicle> = Poly::new(Bike { gears: 21 });
        let value = serde_json::to_value(&poly).unwrap();
        assert_eq!(value, json!({"@type": "garage.Bike", "gears": 21}));
    }

    #[test]
    fn deref_and_downcast() {
        let poly: Poly<dyn Vehicle> = Poly::new(Bike { gears: 3 });
        assert_eq!(poly.wheels(), 2);
        assert_eq!(poly.type_tag(), "garage.Bike");
        assert!(poly.is::<Bike>());
        assert_eq!(poly.downcast_ref::<Bike>().unwrap().gears, 3);
    }

    #[test]
    fn deserializing_outside_codec_fails() {
        let result: Result<Poly<dyn Vehicle>, _> =
            serde_json::from_value(json!({"@type": "garage.Bike", "gears": 1}));
        assert!(result.is_err());
    }
}
