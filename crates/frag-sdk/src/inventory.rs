use frag_codec::FragmentCodec;
use frag_registry::{Family, Fragment};
use frag_store::{InventoryFilter, ObjectQuery, TenantInventory};
use frag_tenant::TenantScope;
use frag_types::{ManagedObject, ManagedObjectId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::PlatformResult;
use crate::platform::Platform;

/// Typed inventory access for one tenant.
///
/// Combines the tenant-bound store facade with the platform's codec, so
/// callers read and write typed fragments instead of raw JSON.
#[derive(Clone, Debug)]
pub struct Inventory {
    objects: TenantInventory,
    codec: FragmentCodec,
    page_size: usize,
}

impl Inventory {
    pub(crate) fn new(objects: TenantInventory, codec: FragmentCodec, page_size: usize) -> Self {
        Self {
            objects,
            codec,
            page_size,
        }
    }

    /// Inventory for the tenant bound to the calling unit of work.
    ///
    /// Fails with `NoActiveTenantScope` outside any scope.
    pub fn current(platform: &Platform) -> PlatformResult<Self> {
        platform.current_inventory()
    }

    pub fn scope(&self) -> &TenantScope {
        self.objects.scope()
    }

    pub fn codec(&self) -> &FragmentCodec {
        &self.codec
    }

    // ---- Raw records ----

    pub fn create(&self, object: ManagedObject) -> PlatformResult<ManagedObject> {
        Ok(self.objects.create(object)?)
    }

    pub fn get(&self, id: &ManagedObjectId) -> PlatformResult<ManagedObject> {
        Ok(self.objects.get(id)?)
    }

    pub fn update(&self, object: ManagedObject) -> PlatformResult<ManagedObject> {
        Ok(self.objects.update(object)?)
    }

    pub fn delete(&self, id: &ManagedObjectId) -> PlatformResult<()> {
        Ok(self.objects.delete(id)?)
    }

    /// Lazily paginated query. Filters without a page size get the
    /// configured default.
    pub fn query(&self, mut filter: InventoryFilter) -> ObjectQuery {
        if filter.page_size.is_none() {
            filter.page_size = Some(self.page_size);
        }
        self.objects.query(filter)
    }

    /// Objects carrying a `T` under its default name, optionally narrowed by
    /// a query expression.
    pub fn find<T: Fragment>(&self, query: Option<&str>) -> PlatformResult<ObjectQuery> {
        let mut filter = InventoryFilter::by_fragment::<T>()?;
        filter.query = query.map(str::to_string);
        Ok(self.query(filter))
    }

    // ---- Typed fragments ----

    /// Create a new object holding `fragment` under its default name.
    pub fn create_with<T: Fragment>(&self, fragment: &T) -> PlatformResult<ManagedObject> {
        let mut object = ManagedObject::new();
        self.codec.write_into(&mut object, fragment, None)?;
        let created = self.objects.create(object)?;
        debug!(tenant = %self.scope().tenant(), tag = %T::type_tag(), "typed object created");
        Ok(created)
    }

    /// Read the `T` stored on object `id` under its default name.
    pub fn read<T: Fragment>(&self, id: &ManagedObjectId) -> PlatformResult<T> {
        let object = self.objects.get(id)?;
        Ok(self.codec.read_from(&object, None)?)
    }

    pub fn read_member<F: ?Sized + Family>(&self, id: &ManagedObjectId, name: &str) -> PlatformResult<Box<F>> {
        let object = self.objects.get(id)?;
        Ok(self.codec.read_member_from(&object, name)?)
    }

    pub fn read_value<V: DeserializeOwned>(&self, id: &ManagedObjectId, name: &str) -> PlatformResult<V> {
        let object = self.objects.get(id)?;
        Ok(self.codec.read_value_from(&object, name)?)
    }

    /// Replace the `T` fragment on object `id`, leaving other fragments alone.
    pub fn write<T: Fragment>(&self, id: &ManagedObjectId, fragment: &T) -> PlatformResult<ManagedObject> {
        let mut patch = ManagedObject::with_id(id.clone());
        self.codec.write_into(&mut patch, fragment, None)?;
        Ok(self.objects.update(patch)?)
    }

    /// Replace the untagged container fragment `name` on object `id`.
    pub fn write_value<V: Serialize>(
        &self,
        id: &ManagedObjectId,
        value: &V,
        name: &str,
    ) -> PlatformResult<ManagedObject> {
        let mut patch = ManagedObject::with_id(id.clone());
        self.codec.write_value_into(&mut patch, value, name)?;
        Ok(self.objects.update(patch)?)
    }
}
