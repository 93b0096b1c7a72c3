use std::collections::VecDeque;
use std::sync::Arc;

use frag_types::{ManagedObject, TenantIdentity};
use tracing::trace;

use crate::error::StoreResult;
use crate::filter::InventoryFilter;
use crate::traits::ManagedObjectStore;

/// Lazily paginated query results.
///
/// Pages are fetched on demand as the iterator advances. The sequence is
/// finite; iterating again means issuing the query again. After an error
/// the iterator yields nothing more.
pub struct ObjectQuery {
    store: Arc<dyn ManagedObjectStore>,
    tenant: TenantIdentity,
    filter: InventoryFilter,
    buffer: VecDeque<ManagedObject>,
    next_page: Option<usize>,
}

impl ObjectQuery {
    pub(crate) fn new(
        store: Arc<dyn ManagedObjectStore>,
        tenant: TenantIdentity,
        filter: InventoryFilter,
    ) -> Self {
        Self {
            store,
            tenant,
            filter,
            buffer: VecDeque::new(),
            next_page: Some(1),
        }
    }

    pub fn filter(&self) -> &InventoryFilter {
        &self.filter
    }

    /// Take at most `n` results, fetching only the pages needed.
    pub fn elements(self, n: usize) -> StoreResult<Vec<ManagedObject>> {
        self.take(n).collect()
    }

    /// Drain every page.
    pub fn all_pages(self) -> StoreResult<Vec<ManagedObject>> {
        self.collect()
    }

    fn fetch_next(&mut self, number: usize) -> StoreResult<()> {
        let page = self.store.fetch_page(&self.tenant, &self.filter, number)?;
        trace!(
            tenant = %self.tenant.tenant,
            page = number,
            count = page.objects.len(),
            "fetched page"
        );
        self.next_page = (page.has_next && !page.objects.is_empty()).then_some(number + 1);
        self.buffer.extend(page.objects);
        Ok(())
    }
}

impl Iterator for ObjectQuery {
    type Item = StoreResult<ManagedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(object) = self.buffer.pop_front() {
                return Some(Ok(object));
            }
            let number = self.next_page.take()?;
            if let Err(err) = self.fetch_next(number) {
                return Some(Err(err));
            }
        }
    }
}

impl std::fmt::Debug for ObjectQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectQuery")
            .field("tenant", &self.tenant.tenant)
            .field("filter", &self.filter)
            .field("buffered", &self.buffer.len())
            .field("next_page", &self.next_page)
            .finish()
    }
}
