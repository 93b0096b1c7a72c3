use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use frag_types::{TenantId, TenantIdentity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TenantError, TenantResult};
use crate::scope;

/// A change in the set of subscribed tenants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Added { tenant: TenantId },
    Removed { tenant: TenantId },
    Initialized { tenants: Vec<TenantId> },
}

/// Callbacks for subscription changes. All methods default to no-ops.
pub trait SubscriptionListener: Send + Sync {
    fn on_added(&self, _identity: &TenantIdentity) {}

    fn on_removed(&self, _tenant: &TenantId) {}

    /// Called once, after the initial tenant set is known.
    fn on_initialized(&self, _tenants: &[TenantId]) {}
}

/// Maps a tenant to the identity used to address its partition.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, tenant: &TenantId) -> Option<TenantIdentity>;
}

/// Source of the current tenant set.
pub trait TenantDirectory: CredentialResolver {
    fn list_tenants(&self) -> Vec<TenantIdentity>;
}

#[derive(Default)]
struct State {
    tenants: BTreeMap<TenantId, TenantIdentity>,
    initialized: bool,
}

/// In-process subscription lifecycle.
///
/// Keeps the set of subscribed tenants and notifies listeners when it
/// changes. Listeners run on the caller's thread, after the set is updated
/// and outside any lock.
#[derive(Default)]
pub struct SubscriptionService {
    state: RwLock<State>,
    listeners: RwLock<Vec<Arc<dyn SubscriptionListener>>>,
}

impl SubscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn SubscriptionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Seed the tenant set and emit `Initialized`. Only allowed once.
    pub fn initialize(&self, identities: impl IntoIterator<Item = TenantIdentity>) -> TenantResult<Vec<TenantId>> {
        let tenants = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.initialized {
                return Err(TenantError::AlreadyInitialized);
            }
            for identity in identities {
                state.tenants.insert(identity.tenant.clone(), identity);
            }
            state.initialized = true;
            state.tenants.keys().cloned().collect::<Vec<_>>()
        };
        info!(count = tenants.len(), "subscriptions initialized");
        self.notify(|listener| listener.on_initialized(&tenants));
        Ok(tenants)
    }

    /// Add or refresh a tenant. Returns `true` if the tenant is new.
    ///
    /// `Added` is only emitted for new tenants; a refresh replaces the
    /// stored identity silently.
    pub fn subscribe(&self, identity: TenantIdentity) -> bool {
        let added = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tenants
            .insert(identity.tenant.clone(), identity.clone())
            .is_none();
        if added {
            info!(tenant = %identity.tenant, "tenant subscribed");
            self.notify(|listener| listener.on_added(&identity));
        } else {
            debug!(tenant = %identity.tenant, "tenant identity refreshed");
        }
        added
    }

    pub fn unsubscribe(&self, tenant: &TenantId) -> TenantResult<TenantIdentity> {
        let removed = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tenants
            .remove(tenant)
            .ok_or_else(|| TenantError::UnknownTenant(tenant.clone()))?;
        info!(tenant = %tenant, "tenant unsubscribed");
        self.notify(|listener| listener.on_removed(tenant));
        Ok(removed)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).initialized
    }

    /// The tenant bound to the calling unit of work, if any.
    pub fn tenant(&self) -> Option<TenantId> {
        scope::current_tenant()
    }

    fn notify(&self, event: impl Fn(&dyn SubscriptionListener)) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }
}

impl CredentialResolver for SubscriptionService {
    fn resolve(&self, tenant: &TenantId) -> Option<TenantIdentity> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tenants
            .get(tenant)
            .cloned()
    }
}

impl TenantDirectory for SubscriptionService {
    fn list_tenants(&self) -> Vec<TenantIdentity> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tenants
            .values()
            .cloned()
            .collect()
    }
}

/// Records every event it sees, in order.
#[derive(Default)]
pub struct EventLog {
    events: RwLock<Vec<SubscriptionEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SubscriptionEvent> {
        self.events.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, event: SubscriptionEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl SubscriptionListener for EventLog {
    fn on_added(&self, identity: &TenantIdentity) {
        self.push(SubscriptionEvent::Added {
            tenant: identity.tenant.clone(),
        });
    }

    fn on_removed(&self, tenant: &TenantId) {
        self.push(SubscriptionEvent::Removed {
            tenant: tenant.clone(),
        });
    }

    fn on_initialized(&self, tenants: &[TenantId]) {
        self.push(SubscriptionEvent::Initialized {
            tenants: tenants.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frag_types::Credentials;

    fn identity(tenant: &str) -> TenantIdentity {
        TenantIdentity::new(
            TenantId::new(tenant),
            "https://example.com",
            Credentials::new("service", "pw"),
        )
    }

    fn service_with_log() -> (SubscriptionService, Arc<EventLog>) {
        let service = SubscriptionService::new();
        let log = Arc::new(EventLog::new());
        service.add_listener(log.clone());
        (service, log)
    }

    #[test]
    fn lifecycle_events() {
        let (service, log) = service_with_log();
        service.initialize([identity("a"), identity("b")]).unwrap();
        assert!(service.subscribe(identity("c")));
        service.unsubscribe(&TenantId::new("a")).unwrap();

        assert_eq!(
            log.events(),
            vec![
                SubscriptionEvent::Initialized {
                    tenants: vec![TenantId::new("a"), TenantId::new("b")]
                },
                SubscriptionEvent::Added {
                    tenant: TenantId::new("c")
                },
                SubscriptionEvent::Removed {
                    tenant: TenantId::new("a")
                },
            ]
        );
        let listed: Vec<_> = service.list_tenants().into_iter().map(|i| i.tenant).collect();
        assert_eq!(listed, vec![TenantId::new("b"), TenantId::new("c")]);
    }

    #[test]
    fn initialize_only_once() {
        let service = SubscriptionService::new();
        assert!(!service.is_initialized());
        service.initialize(Vec::new()).unwrap();
        assert!(service.is_initialized());
        assert!(matches!(
            service.initialize(Vec::new()),
            Err(TenantError::AlreadyInitialized)
        ));
    }

    #[test]
    fn refresh_does_not_emit() {
        let (service, log) = service_with_log();
        assert!(service.subscribe(identity("a")));
        let refreshed = identity("a").with_role("ROLE_INVENTORY_ADMIN");
        assert!(!service.subscribe(refreshed));
        assert_eq!(log.events().len(), 1);
        assert!(service
            .resolve(&TenantId::new("a"))
            .unwrap()
            .has_role("ROLE_INVENTORY_ADMIN"));
    }

    #[test]
    fn unsubscribe_unknown() {
        let service = SubscriptionService::new();
        assert!(matches!(
            service.unsubscribe(&TenantId::new("ghost")),
            Err(TenantError::UnknownTenant(_))
        ));
    }

    #[test]
    fn tenant_reports_bound_scope() {
        let service = SubscriptionService::new();
        assert!(service.tenant().is_none());
        let scope = crate::TenantScope::new(identity("a"));
        let _guard = scope.enter();
        assert_eq!(service.tenant(), Some(TenantId::new("a")));
    }

    #[test]
    fn event_serializes_with_kind() {
        let event = SubscriptionEvent::Added {
            tenant: TenantId::new("a"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"event": "added", "tenant": "a"}));
    }
}
