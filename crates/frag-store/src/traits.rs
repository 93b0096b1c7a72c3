use frag_types::{ManagedObject, ManagedObjectId, TenantIdentity};

use crate::error::StoreResult;
use crate::filter::InventoryFilter;

/// One page of query results.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub objects: Vec<ManagedObject>,
    /// 1-based page number.
    pub number: usize,
    /// Whether a further page may hold results.
    pub has_next: bool,
}

/// Client-side view of the remote managed-object store.
///
/// Every call addresses the partition of exactly one tenant, named by the
/// identity passed in. Implementations must satisfy these invariants:
/// - Fragment payloads are opaque. The store never interprets type tags.
/// - The store owns `id`, `creationTime` and `lastUpdated`.
/// - `update` merges at the top level: fragments in the update replace
///   stored ones of the same name, other stored fragments are kept.
/// - Errors are propagated, never retried.
pub trait ManagedObjectStore: Send + Sync {
    /// Persist a new object and return it with its assigned id.
    fn create(&self, tenant: &TenantIdentity, object: ManagedObject) -> StoreResult<ManagedObject>;

    fn get(&self, tenant: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<ManagedObject>;

    /// Merge `object`'s fragments into the stored object with the same id.
    fn update(&self, tenant: &TenantIdentity, object: ManagedObject) -> StoreResult<ManagedObject>;

    fn delete(&self, tenant: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<()>;

    /// Fetch page `number` (1-based) of the objects matching `filter`.
    fn fetch_page(
        &self,
        tenant: &TenantIdentity,
        filter: &InventoryFilter,
        number: usize,
    ) -> StoreResult<Page>;
}
