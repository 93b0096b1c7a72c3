use std::collections::BTreeMap;
use std::sync::Arc;

use frag_codec::FragmentCodec;
use frag_registry::TypeRegistry;
use frag_store::{InMemoryInventory, InventoryApi, ManagedObjectStore, TenantInventory};
use frag_tenant::{require_scope, SubscriptionService, TenantContext, TenantScope};
use tracing::info;

use crate::config::PlatformConfig;
use crate::error::PlatformResult;
use crate::inventory::Inventory;

/// Entry point for applications: configuration, subscribed tenants, the
/// store backend and the fragment codec in one place.
pub struct Platform {
    config: PlatformConfig,
    subscriptions: Arc<SubscriptionService>,
    tenants: TenantContext,
    store: Arc<dyn ManagedObjectStore>,
    codec: FragmentCodec,
}

impl Platform {
    /// Build a platform and subscribe the tenants listed in `config`.
    pub fn new(
        config: PlatformConfig,
        registry: Arc<TypeRegistry>,
        store: Arc<dyn ManagedObjectStore>,
    ) -> PlatformResult<Self> {
        config.validate()?;
        let subscriptions = Arc::new(SubscriptionService::new());
        subscriptions.initialize(config.identities())?;
        let tenants = TenantContext::new(subscriptions.clone());
        let codec = FragmentCodec::new(registry, config.codec_mode);
        info!(
            base_url = %config.base_url,
            tenants = config.tenants.len(),
            mode = %config.codec_mode,
            "platform ready"
        );
        Ok(Self {
            config,
            subscriptions,
            tenants,
            store,
            codec,
        })
    }

    /// A platform backed by a fresh in-memory store.
    pub fn in_memory(config: PlatformConfig, registry: Arc<TypeRegistry>) -> PlatformResult<Self> {
        Self::new(config, registry, Arc::new(InMemoryInventory::new()))
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionService> {
        &self.subscriptions
    }

    pub fn tenants(&self) -> &TenantContext {
        &self.tenants
    }

    pub fn codec(&self) -> &FragmentCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn ManagedObjectStore> {
        &self.store
    }

    /// Typed inventory bound to `scope`.
    pub fn inventory(&self, scope: &TenantScope) -> Inventory {
        Inventory::new(
            TenantInventory::new(Arc::clone(&self.store), scope),
            self.codec.clone(),
            self.config.page_size,
        )
    }

    /// Typed inventory for the ambient binding.
    pub fn current_inventory(&self) -> PlatformResult<Inventory> {
        let scope = require_scope()?;
        Ok(self.inventory(&scope))
    }

    /// Raw inventory that looks up the ambient binding on every call.
    pub fn inventory_api(&self) -> InventoryApi {
        InventoryApi::new(Arc::clone(&self.store))
    }

    pub fn setting(&self, name: &str) -> Option<&str> {
        self.config.options.get(name).map(String::as_str)
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.config.options
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("base_url", &self.config.base_url)
            .field("tenants", &self.config.tenants.len())
            .field("codec", &self.codec)
            .finish()
    }
}
