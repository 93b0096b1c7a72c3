use std::sync::Arc;

use frag_tenant::{require_scope, TenantScope};
use frag_types::{ManagedObject, ManagedObjectId, TenantIdentity};

use crate::error::StoreResult;
use crate::filter::InventoryFilter;
use crate::query::ObjectQuery;
use crate::traits::ManagedObjectStore;

/// Store facade bound to one tenant scope.
///
/// Obtained inside a tenant callback; every call addresses that tenant's
/// partition.
#[derive(Clone)]
pub struct TenantInventory {
    store: Arc<dyn ManagedObjectStore>,
    scope: TenantScope,
}

impl TenantInventory {
    pub fn new(store: Arc<dyn ManagedObjectStore>, scope: &TenantScope) -> Self {
        Self {
            store,
            scope: scope.clone(),
        }
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    fn identity(&self) -> &TenantIdentity {
        self.scope.identity()
    }

    pub fn create(&self, object: ManagedObject) -> StoreResult<ManagedObject> {
        self.store.create(self.identity(), object)
    }

    pub fn get(&self, id: &ManagedObjectId) -> StoreResult<ManagedObject> {
        self.store.get(self.identity(), id)
    }

    pub fn update(&self, object: ManagedObject) -> StoreResult<ManagedObject> {
        self.store.update(self.identity(), object)
    }

    pub fn delete(&self, id: &ManagedObjectId) -> StoreResult<()> {
        self.store.delete(self.identity(), id)
    }

    /// Start a lazily paginated query. Nothing is fetched until iteration.
    pub fn query(&self, filter: InventoryFilter) -> ObjectQuery {
        ObjectQuery::new(Arc::clone(&self.store), self.identity().clone(), filter)
    }
}

impl std::fmt::Debug for TenantInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantInventory")
            .field("tenant", self.scope.tenant())
            .finish()
    }
}

/// Store facade that resolves the tenant from the ambient binding on every
/// call.
///
/// For code that cannot be handed a [`TenantScope`]. Outside any bound
/// scope every operation fails with
/// [`StoreError::NoActiveTenantScope`](crate::StoreError::NoActiveTenantScope).
#[derive(Clone)]
pub struct InventoryApi {
    store: Arc<dyn ManagedObjectStore>,
}

impl InventoryApi {
    pub fn new(store: Arc<dyn ManagedObjectStore>) -> Self {
        Self { store }
    }

    fn bound(&self) -> StoreResult<TenantInventory> {
        let scope = require_scope()?;
        Ok(TenantInventory::new(Arc::clone(&self.store), &scope))
    }

    pub fn create(&self, object: ManagedObject) -> StoreResult<ManagedObject> {
        self.bound()?.create(object)
    }

    pub fn get(&self, id: &ManagedObjectId) -> StoreResult<ManagedObject> {
        self.bound()?.get(id)
    }

    pub fn update(&self, object: ManagedObject) -> StoreResult<ManagedObject> {
        self.bound()?.update(object)
    }

    pub fn delete(&self, id: &ManagedObjectId) -> StoreResult<()> {
        self.bound()?.delete(id)
    }

    /// The query keeps the tenant bound when it was issued, even if the
    /// iterator outlives the scope.
    pub fn query(&self, filter: InventoryFilter) -> StoreResult<ObjectQuery> {
        Ok(self.bound()?.query(filter))
    }
}

impl std::fmt::Debug for InventoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryApi").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::InMemoryInventory;
    use crate::traits::Page;
    use frag_tenant::{SubscriptionService, TenantContext};
    use frag_types::{Credentials, TenantId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity(tenant: &str) -> TenantIdentity {
        TenantIdentity::new(
            TenantId::new(tenant),
            format!("https://{tenant}.example.com"),
            Credentials::new("service", "pw"),
        )
    }

    fn context(tenants: &[&str]) -> TenantContext {
        let service = SubscriptionService::new();
        service
            .initialize(tenants.iter().map(|t| identity(t)))
            .unwrap();
        TenantContext::new(Arc::new(service))
    }

    fn device(n: usize) -> ManagedObject {
        let mut mo = ManagedObject::new();
        mo.set("c8y_IsDevice", json!({})).unwrap();
        mo.set("name", json!(format!("device-{n}"))).unwrap();
        mo
    }

    /// Counts page fetches to observe laziness.
    struct CountingStore {
        inner: InMemoryInventory,
        fetches: AtomicUsize,
    }

    impl ManagedObjectStore for CountingStore {
        fn create(&self, t: &TenantIdentity, o: ManagedObject) -> StoreResult<ManagedObject> {
            self.inner.create(t, o)
        }
        fn get(&self, t: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<ManagedObject> {
            self.inner.get(t, id)
        }
        fn update(&self, t: &TenantIdentity, o: ManagedObject) -> StoreResult<ManagedObject> {
            self.inner.update(t, o)
        }
        fn delete(&self, t: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<()> {
            self.inner.delete(t, id)
        }
        fn fetch_page(&self, t: &TenantIdentity, f: &InventoryFilter, n: usize) -> StoreResult<Page> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_page(t, f, n)
        }
    }

    fn counting_store() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: InMemoryInventory::new(),
            fetches: AtomicUsize::new(0),
        })
    }

    #[test]
    fn ambient_api_requires_scope() {
        let api = InventoryApi::new(Arc::new(InMemoryInventory::new()));
        assert!(matches!(api.create(device(0)), Err(StoreError::NoActiveTenantScope)));
        assert!(matches!(
            api.query(InventoryFilter::all()),
            Err(StoreError::NoActiveTenantScope)
        ));
    }

    #[test]
    fn ambient_api_inside_scope() {
        let ctx = context(&["a", "b"]);
        let api = InventoryApi::new(Arc::new(InMemoryInventory::new()));

        let created = ctx
            .call_for_tenant(&TenantId::new("a"), |_| api.create(device(1)))
            .unwrap();
        let id = created.id().unwrap().clone();

        let in_a = ctx.call_for_tenant(&TenantId::new("a"), |_| api.get(&id));
        let in_b = ctx.call_for_tenant(&TenantId::new("b"), |_| api.get(&id));
        assert!(in_a.is_ok());
        assert!(matches!(in_b, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn query_is_lazy() {
        let store = counting_store();
        let ctx = context(&["a"]);
        ctx.run_for_tenant(&TenantId::new("a"), |scope| {
            let inventory = TenantInventory::new(store.clone(), scope);
            for n in 0..7 {
                inventory.create(device(n))?;
            }

            let query = inventory.query(InventoryFilter::by_fragment_type("c8y_IsDevice").page_size(3));
            assert_eq!(store.fetches.load(Ordering::SeqCst), 0);

            let first = query.elements(1)?;
            assert_eq!(first.len(), 1);
            assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

            let all = inventory
                .query(InventoryFilter::by_fragment_type("c8y_IsDevice").page_size(3))
                .all_pages()?;
            assert_eq!(all.len(), 7);
            assert_eq!(store.fetches.load(Ordering::SeqCst), 4);
            Ok::<_, StoreError>(())
        })
        .unwrap();
    }

    #[test]
    fn elements_stops_at_available() {
        let store = Arc::new(InMemoryInventory::new());
        let scope = TenantScope::new(identity("a"));
        let inventory = TenantInventory::new(store, &scope);
        inventory.create(device(0)).unwrap();
        inventory.create(device(1)).unwrap();
        let found = inventory.query(InventoryFilter::all()).elements(10).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn query_error_surfaces_on_iteration() {
        let scope = TenantScope::new(identity("a"));
        let inventory = TenantInventory::new(Arc::new(InMemoryInventory::new()), &scope);
        let mut query = inventory.query(InventoryFilter::by_query("name gt 'x'"));
        assert!(matches!(query.next(), Some(Err(StoreError::Remote(_)))));
        assert!(query.next().is_none());
    }
}
