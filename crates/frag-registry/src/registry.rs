//! The sealed tag → type mapping.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use frag_types::validate_type_tag;
use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::fragment::{Family, Fragment, MemberOf, Origin};

/// Builds a family member from its structural encoding (tag already removed).
pub type MemberDecoder<F> = fn(Value) -> Result<Box<F>, serde_json::Error>;

fn decode_member<F, T>(value: Value) -> Result<Box<F>, serde_json::Error>
where
    F: ?Sized + Family,
    T: MemberOf<F>,
{
    let concrete: T = serde_json::from_value(value)?;
    Ok(Box::new(concrete).upcast())
}

/// A registered concrete type.
#[derive(Clone, Debug)]
pub struct TypeEntry {
    tag: String,
    type_name: &'static str,
    rust_type: TypeId,
    origin: Origin,
    families: Vec<&'static str>,
}

impl TypeEntry {
    /// The tag this entry is registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Rust type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the tag was declared or derived from the type path.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Names of the families this type is a member of.
    pub fn families(&self) -> &[&'static str] {
        &self.families
    }

    /// Whether this entry denotes the Rust type `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.rust_type == TypeId::of::<T>()
    }
}

struct FamilyEntry {
    name: &'static str,
    // Each value is a `MemberDecoder<F>` for the family's `F`.
    members: HashMap<String, Box<dyn Any + Send + Sync>>,
}

/// Collects registrations during startup.
///
/// ```ignore
/// let registry = TypeRegistry::builder()
///     .register::<CustomDevice>()?
///     .register_member::<dyn Sensor, TemperatureSensor>()?
///     .register_member::<dyn Sensor, HumiditySensor>()?
///     .build();
/// ```
#[derive(Default)]
pub struct TypeRegistryBuilder {
    entries: HashMap<String, TypeEntry>,
    families: HashMap<TypeId, FamilyEntry>,
}

impl TypeRegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete fragment type under its own tag.
    ///
    /// Registering the same type twice is a no-op. Registering a different
    /// type under an already used tag fails.
    pub fn register<T: Fragment>(mut self) -> RegistryResult<Self> {
        self.insert::<T>()?;
        Ok(self)
    }

    /// Register `T` and make it a member of family `F`.
    pub fn register_member<F, T>(mut self) -> RegistryResult<Self>
    where
        F: ?Sized + Family,
        T: MemberOf<F>,
    {
        let tag = self.insert::<T>()?;

        let family = self
            .families
            .entry(TypeId::of::<F>())
            .or_insert_with(|| FamilyEntry {
                name: F::NAME,
                members: HashMap::new(),
            });
        let decoder: MemberDecoder<F> = decode_member::<F, T>;
        family.members.insert(tag.clone(), Box::new(decoder));

        if let Some(entry) = self.entries.get_mut(&tag) {
            if !entry.families.contains(&F::NAME) {
                entry.families.push(F::NAME);
            }
        }
        debug!(%tag, family = F::NAME, "registered family member");
        Ok(self)
    }

    fn insert<T: Fragment>(&mut self) -> RegistryResult<String> {
        let tag = T::type_tag().into_owned();
        validate_type_tag(&tag)?;

        if let Some(existing) = self.entries.get(&tag) {
            if existing.is::<T>() {
                return Ok(tag);
            }
            return Err(RegistryError::DuplicateTag {
                tag,
                existing: existing.type_name,
                attempted: std::any::type_name::<T>(),
            });
        }

        self.entries.insert(
            tag.clone(),
            TypeEntry {
                tag: tag.clone(),
                type_name: std::any::type_name::<T>(),
                rust_type: TypeId::of::<T>(),
                origin: T::origin(),
                families: Vec::new(),
            },
        );
        debug!(%tag, origin = ?T::origin(), "registered fragment type");
        Ok(tag)
    }

    /// Seal the registry. No registration is possible afterwards.
    pub fn build(self) -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry {
            entries: self.entries,
            families: self.families,
        })
    }
}

/// Sealed mapping from type tags to registered Rust types.
///
/// Immutable once built; share it as `Arc<TypeRegistry>`. Lookups are
/// deterministic and never fall back to an untyped value.
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
    families: HashMap<TypeId, FamilyEntry>,
}

impl TypeRegistry {
    /// Start collecting registrations.
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    /// An empty, sealed registry.
    pub fn empty() -> Arc<Self> {
        TypeRegistryBuilder::new().build()
    }

    /// Look up the entry registered under `tag`.
    pub fn resolve(&self, tag: &str) -> RegistryResult<&TypeEntry> {
        self.entries
            .get(tag)
            .ok_or_else(|| RegistryError::NotRegistered(tag.to_string()))
    }

    /// The tag `T` is written with. Does not require registration.
    pub fn identifier_for<T: Fragment>(&self) -> Cow<'static, str> {
        T::type_tag()
    }

    /// Whether `T` itself is registered under its tag.
    pub fn is_registered<T: Fragment>(&self) -> bool {
        self.entries
            .get(T::type_tag().as_ref())
            .is_some_and(|entry| entry.is::<T>())
    }

    /// Decoder for member `tag` of family `F`.
    pub fn member_decoder<F: ?Sized + Family>(&self, tag: &str) -> RegistryResult<MemberDecoder<F>> {
        self.families
            .get(&TypeId::of::<F>())
            .and_then(|family| family.members.get(tag))
            .and_then(|decoder| decoder.downcast_ref::<MemberDecoder<F>>())
            .copied()
            .ok_or_else(|| RegistryError::NotMember {
                family: F::NAME,
                tag: tag.to_string(),
            })
    }

    /// Sorted tags of the members of family `F`.
    pub fn members_of<F: ?Sized + Family>(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .families
            .get(&TypeId::of::<F>())
            .map(|family| family.members.keys().map(String::as_str).collect())
            .unwrap_or_default();
        tags.sort_unstable();
        tags
    }

    /// All registered entries, sorted by tag.
    pub fn entries(&self) -> Vec<&TypeEntry> {
        let mut entries: Vec<&TypeEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.tag.cmp(&b.tag));
        entries
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TypeRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families: Vec<&str> = self.families.values().map(|family| family.name).collect();
        f.debug_struct("TypeRegistryBuilder")
            .field("types", &self.entries.len())
            .field("families", &families)
            .finish()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let families: Vec<&str> = self.families.values().map(|family| family.name).collect();
        f.debug_struct("TypeRegistry")
            .field("types", &self.entries.len())
            .field("families", &families)
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

/// Install the process-wide registry. Succeeds at most once.
pub fn install_global(registry: Arc<TypeRegistry>) -> RegistryResult<()> {
    GLOBAL
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInstalled)
}

/// The process-wide registry, if one was installed.
pub fn global() -> Option<Arc<TypeRegistry>> {
    GLOBAL.get().cloned()
}
