use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use frag_types::TenantId;
use tracing::{debug, warn};

use crate::error::{TenantError, TenantResult};
use crate::scope::TenantScope;
use crate::subscription::TenantDirectory;

/// Why one tenant's unit of work did not succeed.
#[derive(Debug)]
pub enum TenantFailure<E> {
    /// The work returned an error.
    Failed(E),
    /// The work panicked. Holds the panic message when there is one.
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for TenantFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "{err}"),
            Self::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

#[derive(Debug)]
pub struct TenantOutcome<E> {
    pub tenant: TenantId,
    pub result: Result<(), TenantFailure<E>>,
}

impl<E> TenantOutcome<E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-tenant results of a fan-out, one entry per tenant attempted.
#[derive(Debug)]
pub struct TenantReport<E> {
    outcomes: Vec<TenantOutcome<E>>,
}

impl<E> TenantReport<E> {
    pub fn outcomes(&self) -> &[TenantOutcome<E>] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<TenantOutcome<E>> {
        self.outcomes
    }

    pub fn outcome(&self, tenant: &TenantId) -> Option<&TenantOutcome<E>> {
        self.outcomes.iter().find(|outcome| &outcome.tenant == tenant)
    }

    pub fn succeeded(&self) -> Vec<&TenantId> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| &outcome.tenant)
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TenantOutcome<E>> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// `true` if every tenant succeeded, including when there were none.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TenantOutcome::is_success)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs units of work bound to a tenant.
///
/// Each unit of work gets its own [`TenantScope`]; the binding is released on
/// every exit path, panics included. Fan-out over all tenants isolates
/// failures: every tenant is attempted and reported, nothing short-circuits.
#[derive(Clone)]
pub struct TenantContext {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantContext {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    /// Resolve `tenant` into a scope without binding it.
    pub fn scope_for(&self, tenant: &TenantId) -> TenantResult<TenantScope> {
        self.directory
            .resolve(tenant)
            .map(TenantScope::new)
            .ok_or_else(|| TenantError::UnknownTenant(tenant.clone()))
    }

    /// Bind `tenant`, run `work` and return its result.
    ///
    /// Errors from `work` propagate after the binding is released.
    pub fn call_for_tenant<T, E, F>(&self, tenant: &TenantId, work: F) -> Result<T, E>
    where
        F: FnOnce(&TenantScope) -> Result<T, E>,
        E: From<TenantError>,
    {
        let scope = self.scope_for(tenant)?;
        let _guard = scope.enter();
        debug!(tenant = %tenant, "running for tenant");
        work(&scope)
    }

    pub fn run_for_tenant<E, F>(&self, tenant: &TenantId, work: F) -> Result<(), E>
    where
        F: FnOnce(&TenantScope) -> Result<(), E>,
        E: From<TenantError>,
    {
        self.call_for_tenant(tenant, work)
    }

    /// Run `work` once per subscribed tenant, one after another.
    pub fn run_for_each_tenant<E, F>(&self, mut work: F) -> TenantReport<E>
    where
        F: FnMut(&TenantScope) -> Result<(), E>,
        E: fmt::Display,
    {
        let outcomes = self
            .directory
            .list_tenants()
            .into_iter()
            .map(|identity| {
                let scope = TenantScope::new(identity);
                let result = {
                    let _guard = scope.enter();
                    panic::catch_unwind(AssertUnwindSafe(|| work(&scope)))
                };
                record(scope.tenant().clone(), flatten(result))
            })
            .collect();
        TenantReport { outcomes }
    }

    /// Like [`run_for_each_tenant`](Self::run_for_each_tenant), with one
    /// thread per tenant.
    pub fn run_for_each_tenant_parallel<E, F>(&self, work: F) -> TenantReport<E>
    where
        F: Fn(&TenantScope) -> Result<(), E> + Sync,
        E: fmt::Display + Send,
    {
        let scopes: Vec<TenantScope> = self
            .directory
            .list_tenants()
            .into_iter()
            .map(TenantScope::new)
            .collect();
        let work = &work;
        let outcomes: Vec<TenantOutcome<E>> = std::thread::scope(|threads| {
            let handles: Vec<_> = scopes
                .iter()
                .map(|scope| {
                    threads.spawn(move || {
                        let _guard = scope.enter();
                        work(scope)
                    })
                })
                .collect();
            scopes
                .iter()
                .zip(handles)
                .map(|(scope, handle)| record(scope.tenant().clone(), flatten(handle.join())))
                .collect()
        });
        TenantReport { outcomes }
    }

    /// Async form of [`call_for_tenant`](Self::call_for_tenant). The tenant
    /// stays bound across every await point of the returned future.
    pub async fn call_for_tenant_async<T, E, F, Fut>(&self, tenant: &TenantId, work: F) -> Result<T, E>
    where
        F: FnOnce(TenantScope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TenantError>,
    {
        let scope = self.scope_for(tenant)?;
        debug!(tenant = %tenant, "running for tenant");
        scope.clone().bind(work(scope)).await
    }

    /// Run `work` for every subscribed tenant as concurrent tokio tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run_for_each_tenant_async<E, F, Fut>(&self, work: F) -> TenantReport<E>
    where
        F: Fn(TenantScope) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let handles: Vec<_> = self
            .directory
            .list_tenants()
            .into_iter()
            .map(|identity| {
                let scope = TenantScope::new(identity);
                let tenant = scope.tenant().clone();
                let task = tokio::spawn(scope.clone().bind(work(scope)));
                (tenant, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (tenant, task) in handles {
            let result = match task.await {
                Ok(result) => result.map_err(TenantFailure::Failed),
                Err(err) if err.is_panic() => {
                    Err(TenantFailure::Panicked(panic_message(&*err.into_panic())))
                }
                Err(err) => Err(TenantFailure::Panicked(err.to_string())),
            };
            outcomes.push(record(tenant, result));
        }
        TenantReport { outcomes }
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenants", &self.directory.list_tenants().len())
            .finish()
    }
}

fn flatten<E>(result: std::thread::Result<Result<(), E>>) -> Result<(), TenantFailure<E>> {
    match result {
        Ok(result) => result.map_err(TenantFailure::Failed),
        Err(payload) => Err(TenantFailure::Panicked(panic_message(&*payload))),
    }
}

fn record<E: fmt::Display>(tenant: TenantId, result: Result<(), TenantFailure<E>>) -> TenantOutcome<E> {
    match &result {
        Ok(()) => debug!(tenant = %tenant, "tenant work succeeded"),
        Err(failure) => warn!(tenant = %tenant, error = %failure, "tenant work failed"),
    }
    TenantOutcome { tenant, result }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
