//! Per-unit-of-work tenant binding.
//!
//! Synchronous work binds its tenant on a thread-local stack; asynchronous
//! work binds it in a tokio task-local. There is no process-wide "current
//! tenant": two units of work running at the same time never observe each
//! other's binding.
//!
//! A bound task owns its own synchronous stack. While the task is polled the
//! thread's stack is swapped out, so bindings made by whatever else runs on
//! that thread stay invisible to the task, and the other way round.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use frag_types::{TenantId, TenantIdentity};
use tracing::trace;

use crate::error::{TenantError, TenantResult};

/// One synchronous binding, tagged with the guard that owns it.
type Entry = (u64, TenantScope);

thread_local! {
    /// Tenants bound by synchronous work on this thread, innermost last.
    static BOUND: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
}

static NEXT_ENTRY: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    static TASK_SCOPE: TenantScope;
}

/// Handle to the tenant a unit of work runs for.
///
/// Passed into every tenant callback. Cloning is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantScope {
    identity: Arc<TenantIdentity>,
}

impl TenantScope {
    pub fn new(identity: TenantIdentity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    /// The bound tenant's id.
    pub fn tenant(&self) -> &TenantId {
        &self.identity.tenant
    }

    pub fn identity(&self) -> &TenantIdentity {
        &self.identity
    }

    /// Bind this scope for synchronous work on the current thread until the
    /// returned guard drops.
    pub fn enter(&self) -> ScopeGuard {
        let entry = NEXT_ENTRY.fetch_add(1, Ordering::Relaxed);
        BOUND.with(|bound| bound.borrow_mut().push((entry, self.clone())));
        trace!(tenant = %self.tenant(), "scope entered");
        ScopeGuard {
            entry,
            tenant: self.tenant().clone(),
            _not_send: PhantomData,
        }
    }

    /// Run `fut` with this scope bound for the whole task.
    ///
    /// Synchronous bindings of the polling thread are hidden from `fut`.
    pub async fn bind<F: Future>(self, fut: F) -> F::Output {
        let isolated = Isolated {
            fut: Box::pin(fut),
            stack: Vec::new(),
        };
        TASK_SCOPE.scope(self, isolated).await
    }
}

/// Unbinds its scope on drop, including during unwinding.
///
/// Guards may drop in any order; each removes only its own binding.
#[must_use = "the scope is unbound as soon as the guard drops"]
pub struct ScopeGuard {
    entry: u64,
    tenant: TenantId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        BOUND.with(|bound| {
            let mut bound = bound.borrow_mut();
            if let Some(index) = bound.iter().rposition(|(entry, _)| *entry == self.entry) {
                bound.remove(index);
            }
        });
        trace!(tenant = %self.tenant, "scope exited");
    }
}

/// Polls a task's future against the task's own synchronous stack.
struct Isolated<F> {
    fut: Pin<Box<F>>,
    stack: Vec<Entry>,
}

impl<F: Future> Future for Isolated<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = &mut *self;
        let outer = BOUND.with(|bound| std::mem::replace(&mut *bound.borrow_mut(), std::mem::take(&mut this.stack)));
        let _restore = Restore {
            outer,
            stack: &mut this.stack,
        };
        this.fut.as_mut().poll(cx)
    }
}

/// Hands the thread its own stack back after a poll, even one that panics.
struct Restore<'a> {
    outer: Vec<Entry>,
    stack: &'a mut Vec<Entry>,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        let outer = std::mem::take(&mut self.outer);
        *self.stack = BOUND.with(|bound| std::mem::replace(&mut *bound.borrow_mut(), outer));
    }
}

/// The scope bound for the current unit of work, if any.
///
/// Synchronous work nested inside a bound task wins over the task's own
/// binding. Bindings made outside the task are never visible inside it.
pub fn current_scope() -> Option<TenantScope> {
    BOUND
        .with(|bound| bound.borrow().last().map(|(_, scope)| scope.clone()))
        .or_else(|| TASK_SCOPE.try_with(TenantScope::clone).ok())
}

/// The tenant bound for the current unit of work, if any.
pub fn current_tenant() -> Option<TenantId> {
    current_scope().map(|scope| scope.tenant().clone())
}

/// Like [`current_scope`], but an absent binding is an error.
pub fn require_scope() -> TenantResult<TenantScope> {
    current_scope().ok_or(TenantError::NoActiveTenantScope)
}
