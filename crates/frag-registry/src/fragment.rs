use std::any::Any;
use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a type's tag came to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The type declares an explicit [`Fragment::TYPE_TAG`].
    Declared,
    /// The tag was derived from the Rust type path.
    Conventional,
}

/// A concrete type that can be stored as a fragment payload.
///
/// Types that set [`TYPE_TAG`](Fragment::TYPE_TAG) carry an explicit, stable
/// marker and are eligible for decoding from any source. Types that leave it
/// unset get a tag derived from their Rust path by convention; such tags
/// change when the type moves, and they are only honoured by a codec that
/// trusts its source.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct TemperatureSensor { reading: f64 }
///
/// impl Fragment for TemperatureSensor {
///     const TYPE_TAG: Option<&'static str> = Some("cookbook.TemperatureSensor");
/// }
/// ```
pub trait Fragment: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Declared type tag. `None` means "derive one from the type path".
    const TYPE_TAG: Option<&'static str> = None;

    /// The tag embedded in this type's payloads.
    fn type_tag() -> Cow<'static, str> {
        match Self::TYPE_TAG {
            Some(tag) => Cow::Borrowed(tag),
            None => Cow::Owned(conventional_tag::<Self>()),
        }
    }

    fn origin() -> Origin {
        if Self::TYPE_TAG.is_some() {
            Origin::Declared
        } else {
            Origin::Conventional
        }
    }
}

/// Tag derived from the Rust type path, with `::` written as `.`.
pub fn conventional_tag<T: ?Sized>() -> String {
    std::any::type_name::<T>().replace("::", ".")
}

/// Object-safe view of a fragment value.
///
/// Every [`Fragment`] is `Tagged`. Family traits list `Tagged` as a supertrait
/// so that a `Box<dyn Family>` can still report its concrete tag and produce
/// its structural encoding.
pub trait Tagged: Send + Sync {
    /// Tag of the concrete type behind this value.
    fn tag(&self) -> Cow<'static, str>;

    /// Structural encoding without the type tag.
    fn to_structure(&self) -> Result<Value, serde_json::Error>;

    /// Access the concrete value, e.g. for `downcast_ref`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Fragment> Tagged for T {
    fn tag(&self) -> Cow<'static, str> {
        T::type_tag()
    }

    fn to_structure(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An abstract polymorphic role, implemented on a trait object type.
///
/// ```ignore
/// pub trait Sensor: Tagged + std::fmt::Debug {
///     fn reading(&self) -> f64;
/// }
///
/// impl Family for dyn Sensor {
///     const NAME: &'static str = "sensor";
/// }
/// ```
pub trait Family: Tagged + 'static {
    const NAME: &'static str;
}

/// Membership of a concrete fragment type in a family.
///
/// Usually implemented through [`family_members!`](crate::family_members).
pub trait MemberOf<F: ?Sized + Family>: Fragment {
    fn upcast(self: Box<Self>) -> Box<F>;
}

/// Implement [`MemberOf`] for each listed type.
///
/// ```ignore
/// family_members!(dyn Sensor => TemperatureSensor, HumiditySensor);
/// ```
#[macro_export]
macro_rules! family_members {
    ($family:ty => $($member:ty),+ $(,)?) => {
        $(
            impl $crate::MemberOf<$family> for $member {
                fn upcast(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<$family> {
                    self
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Declared {
        value: u32,
    }

    impl Fragment for Declared {
        const TYPE_TAG: Option<&'static str> = Some("test.Declared");
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Plain {
        value: u32,
    }

    impl Fragment for Plain {}

    trait Shape: Tagged + std::fmt::Debug {
        fn area(&self) -> f64;
    }

    impl Family for dyn Shape {
        const NAME: &'static str = "shape";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Square {
        side: f64,
    }

    impl Fragment for Square {
        const TYPE_TAG: Option<&'static str> = Some("test.Square");
    }

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.side * self.side
        }
    }

    family_members!(dyn Shape => Square);

    #[test]
    fn declared_tag_is_used() {
        assert_eq!(Declared::type_tag(), "test.Declared");
        assert_eq!(Declared::origin(), Origin::Declared);
    }

    #[test]
    fn conventional_tag_uses_type_path() {
        let tag = Plain::type_tag();
        assert!(tag.ends_with(".Plain"), "unexpected tag {tag}");
        assert!(!tag.contains("::"));
        assert_eq!(Plain::origin(), Origin::Conventional);
    }

    #[test]
    fn tagged_view_of_fragment() {
        let value = Declared { value: 7 };
        assert_eq!(value.tag(), "test.Declared");
        assert_eq!(value.to_structure().unwrap(), serde_json::json!({"value": 7}));
        assert!(value.as_any().downcast_ref::<Declared>().is_some());
    }

    #[test]
    fn upcast_keeps_concrete_type() {
        let shape: Box<dyn Shape> = Box::new(Square { side: 2.0 }).upcast();
        assert_eq!(shape.tag(), "test.Square");
        assert_eq!(shape.area(), 4.0);
        let square = shape.as_any().downcast_ref::<Square>().unwrap();
        assert_eq!(square.side, 2.0);
    }
}
