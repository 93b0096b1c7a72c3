use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use frag_types::{ManagedObject, ManagedObjectId, TenantId, TenantIdentity};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::expression::Expression;
use crate::filter::InventoryFilter;
use crate::traits::{ManagedObjectStore, Page};

type Partitions = HashMap<TenantId, BTreeMap<u64, ManagedObject>>;

/// In-memory managed-object store with one partition per tenant.
///
/// Intended for tests, demos and embedding. Ids are numeric strings, unique
/// across tenants and never reused. Query expressions support `eq` and `ne`
/// joined by `and`; anything else is rejected as a remote error.
pub struct InMemoryInventory {
    partitions: RwLock<Partitions>,
    next_id: AtomicU64,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of objects stored for `tenant`.
    pub fn len(&self, tenant: &TenantId) -> StoreResult<usize> {
        Ok(self.read()?.get(tenant).map_or(0, BTreeMap::len))
    }

    pub fn is_empty(&self, tenant: &TenantId) -> StoreResult<bool> {
        Ok(self.len(tenant)? == 0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Partitions>> {
        self.partitions
            .read()
            .map_err(|_| StoreError::Backend("inventory lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Partitions>> {
        self.partitions
            .write()
            .map_err(|_| StoreError::Backend("inventory lock poisoned".into()))
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(id: &ManagedObjectId) -> StoreResult<u64> {
    id.as_str()
        .parse()
        .map_err(|_| StoreError::NotFound(id.clone()))
}

fn matches(filter: &InventoryFilter, expression: Option<&Expression>, object: &ManagedObject) -> bool {
    if let Some(name) = &filter.fragment_type {
        if !object.contains(name) {
            return false;
        }
    }
    if let Some(type_) = &filter.type_ {
        if object.get("type").and_then(|v| v.as_str()) != Some(type_.as_str()) {
            return false;
        }
    }
    expression.map_or(true, |expr| expr.matches(object))
}

impl ManagedObjectStore for InMemoryInventory {
    fn create(&self, tenant: &TenantIdentity, mut object: ManagedObject) -> StoreResult<ManagedObject> {
        if let Some(id) = object.id() {
            return Err(StoreError::Remote(format!(
                "cannot create an object that already has id {id}"
            )));
        }
        let key = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        object.set_id(ManagedObjectId::new(key.to_string()));
        object.stamp(now, now);

        self.write()?
            .entry(tenant.tenant.clone())
            .or_default()
            .insert(key, object.clone());
        debug!(tenant = %tenant.tenant, id = key, fragments = object.len(), "managed object created");
        Ok(object)
    }

    fn get(&self, tenant: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<ManagedObject> {
        let key = parse_id(id)?;
        self.read()?
            .get(&tenant.tenant)
            .and_then(|partition| partition.get(&key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn update(&self, tenant: &TenantIdentity, object: ManagedObject) -> StoreResult<ManagedObject> {
        let id = object.id().cloned().ok_or(StoreError::MissingId)?;
        let key = parse_id(&id)?;

        let mut partitions = self.write()?;
        let stored = partitions
            .get_mut(&tenant.tenant)
            .and_then(|partition| partition.get_mut(&key))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        stored.merge_from(&object);
        let created = stored.creation_time().unwrap_or_else(Utc::now);
        stored.stamp(created, Utc::now());
        debug!(tenant = %tenant.tenant, id = key, fragments = object.len(), "managed object updated");
        Ok(stored.clone())
    }

    fn delete(&self, tenant: &TenantIdentity, id: &ManagedObjectId) -> StoreResult<()> {
        let key = parse_id(id)?;
        self.write()?
            .get_mut(&tenant.tenant)
            .and_then(|partition| partition.remove(&key))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        debug!(tenant = %tenant.tenant, id = key, "managed object deleted");
        Ok(())
    }

    fn fetch_page(
        &self,
        tenant: &TenantIdentity,
        filter: &InventoryFilter,
        number: usize,
    ) -> StoreResult<Page> {
        let size = filter.effective_page_size();
        if size == 0 || number == 0 {
            return Err(StoreError::Remote(
                "page size and page number must be positive".into(),
            ));
        }
        let offset = (number - 1)
            .checked_mul(size)
            .ok_or_else(|| StoreError::Remote(format!("page {number} of size {size} is out of range")))?;
        let expression = filter.query.as_deref().map(Expression::parse).transpose()?;

        let partitions = self.read()?;
        let Some(partition) = partitions.get(&tenant.tenant) else {
            return Ok(Page {
                objects: Vec::new(),
                number,
                has_next: false,
            });
        };

        let mut matching = partition
            .values()
            .filter(|object| matches(filter, expression.as_ref(), object))
            .skip(offset);
        let objects: Vec<ManagedObject> = matching.by_ref().take(size).cloned().collect();
        let has_next = matching.next().is_some();
        Ok(Page {
            objects,
            number,
            has_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frag_types::Credentials;
    use serde_json::json;

    fn tenant(id: &str) -> TenantIdentity {
        TenantIdentity::new(
            TenantId::new(id),
            format!("https://{id}.example.com"),
            Credentials::new("service", "pw"),
        )
    }

    fn device(manufacturer: &str) -> ManagedObject {
        let mut mo = ManagedObject::new();
        mo.set("c8y_IsDevice", json!({})).unwrap();
        mo.set("device", json!({"manufacturer": manufacturer})).unwrap();
        mo
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let store = InMemoryInventory::new();
        let created = store.create(&tenant("a"), device("Acme")).unwrap();
        assert!(created.id().is_some());
        assert!(created.creation_time().is_some());
        assert_eq!(created.creation_time(), created.last_updated());

        let fetched = store.get(&tenant("a"), created.id().unwrap()).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn create_rejects_existing_id() {
        let store = InMemoryInventory::new();
        let object = ManagedObject::with_id("7".into());
        assert!(matches!(store.create(&tenant("a"), object), Err(StoreError::Remote(_))));
    }

    #[test]
    fn tenants_are_partitioned() {
        let store = InMemoryInventory::new();
        let created = store.create(&tenant("a"), device("Acme")).unwrap();
        let id = created.id().unwrap();
        assert!(matches!(store.get(&tenant("b"), id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(&tenant("b"), id), Err(StoreError::NotFound(_))));
        assert_eq!(store.len(&TenantId::new("a")).unwrap(), 1);
        assert!(store.is_empty(&TenantId::new("b")).unwrap());
    }

    #[test]
    fn update_merges_fragments() {
        let store = InMemoryInventory::new();
        let created = store.create(&tenant("a"), device("Acme")).unwrap();

        let mut patch = ManagedObject::with_id(created.id().unwrap().clone());
        patch.set("device", json!({"manufacturer": "Globex"})).unwrap();
        patch.set("c8y_Notes", json!("moved")).unwrap();
        let updated = store.update(&tenant("a"), patch).unwrap();

        assert_eq!(updated.get("device"), Some(&json!({"manufacturer": "Globex"})));
        assert_eq!(updated.get("c8y_Notes"), Some(&json!("moved")));
        assert!(updated.contains("c8y_IsDevice"));
        assert_eq!(updated.creation_time(), created.creation_time());
        assert!(updated.last_updated() >= created.last_updated());
    }

    #[test]
    fn update_requires_existing_id() {
        let store = InMemoryInventory::new();
        assert!(matches!(
            store.update(&tenant("a"), ManagedObject::new()),
            Err(StoreError::MissingId)
        ));
        assert!(matches!(
            store.update(&tenant("a"), ManagedObject::with_id("99".into())),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get(&tenant("a"), &"not-a-number".into()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes() {
        let store = InMemoryInventory::new();
        let created = store.create(&tenant("a"), device("Acme")).unwrap();
        let id = created.id().unwrap();
        store.delete(&tenant("a"), id).unwrap();
        assert!(matches!(store.get(&tenant("a"), id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn pages_split_results() {
        let store = InMemoryInventory::new();
        for i in 0..5 {
            store.create(&tenant("a"), device(&format!("m{i}"))).unwrap();
        }
        let filter = InventoryFilter::by_fragment_type("c8y_IsDevice").page_size(2);
        let first = store.fetch_page(&tenant("a"), &filter, 1).unwrap();
        let third = store.fetch_page(&tenant("a"), &filter, 3).unwrap();
        assert_eq!(first.objects.len(), 2);
        assert!(first.has_next);
        assert_eq!(third.objects.len(), 1);
        assert!(!third.has_next);
    }

    #[test]
    fn filter_by_fragment_type_and_query() {
        let store = InMemoryInventory::new();
        store.create(&tenant("a"), device("Acme Corp")).unwrap();
        store.create(&tenant("a"), device("Globex")).unwrap();
        let mut other = ManagedObject::new();
        other.set("type", json!("sensor")).unwrap();
        store.create(&tenant("a"), other).unwrap();

        let filter = InventoryFilter::by_fragment_type("device")
            .with_query("device.manufacturer eq 'Acme Corp'")
            .page_size(10);
        let page = store.fetch_page(&tenant("a"), &filter, 1).unwrap();
        assert_eq!(page.objects.len(), 1);

        let by_type = store
            .fetch_page(&tenant("a"), &InventoryFilter::by_type("sensor"), 1)
            .unwrap();
        assert_eq!(by_type.objects.len(), 1);
    }

    #[test]
    fn malformed_query_is_remote_error() {
        let store = InMemoryInventory::new();
        let filter = InventoryFilter::by_query("device.manufacturer like 'A%'");
        assert!(matches!(
            store.fetch_page(&tenant("a"), &filter, 1),
            Err(StoreError::Remote(_))
        ));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let store = InMemoryInventory::new();
        let filter = InventoryFilter::all().page_size(0);
        assert!(store.fetch_page(&tenant("a"), &filter, 1).is_err());
    }

    #[test]
    fn out_of_range_page_is_remote_error() {
        let store = InMemoryInventory::new();
        store.create(&tenant("a"), device("Acme")).unwrap();
        let filter = InventoryFilter::all().page_size(usize::MAX);
        assert_eq!(store.fetch_page(&tenant("a"), &filter, 1).unwrap().objects.len(), 1);
        assert!(matches!(
            store.fetch_page(&tenant("a"), &filter, 2),
            Err(StoreError::Remote(_))
        ));
    }
}
