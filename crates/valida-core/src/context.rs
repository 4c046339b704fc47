//! Isolation contexts
//!
//! An isolation context is the boundary that decides which provider
//! registrations are visible to a discovery pass. Each thread may have a
//! current context (see [`enter`]); the module context is the one that owns
//! the registrations compiled into this binary.
//!
//! Copyright (c) 2025 Valida Team
//! Licensed under the Apache-2.0 license

use crate::registry::{InventoryRegistry, ServiceRegistry};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

static MODULE_CONTEXT: OnceLock<Arc<IsolationContext>> = OnceLock::new();

thread_local! {
    static CURRENT: RefCell<Option<Arc<IsolationContext>>> = const { RefCell::new(None) };
}

/// Process-unique identity of an isolation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A loading boundary with its own provider registry
///
/// Contexts compare by identity. Two contexts built from the same registry
/// are still distinct, so dropping one never lets its cache entry leak into
/// the other.
pub struct IsolationContext {
    id: ContextId,
    name: String,
    registry: Arc<dyn ServiceRegistry>,
}

impl IsolationContext {
    /// Create a new context over `registry`
    pub fn new(name: impl Into<String>, registry: Arc<dyn ServiceRegistry>) -> Arc<Self> {
        Arc::new(Self {
            id: ContextId::next(),
            name: name.into(),
            registry,
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }
}

impl PartialEq for IsolationContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IsolationContext {}

impl fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The context owning the providers compiled into this binary
pub fn module_context() -> Arc<IsolationContext> {
    MODULE_CONTEXT
        .get_or_init(|| IsolationContext::new(env!("CARGO_PKG_NAME"), Arc::new(InventoryRegistry)))
        .clone()
}

/// The calling thread's current context, if one was entered
pub fn current() -> Option<Arc<IsolationContext>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Replace the calling thread's current context, returning the previous one
pub fn set_current(context: Option<Arc<IsolationContext>>) -> Option<Arc<IsolationContext>> {
    CURRENT.with(|current| current.replace(context))
}

/// Make `context` current for this thread until the guard is dropped
pub fn enter(context: Arc<IsolationContext>) -> ContextGuard {
    let previous = set_current(Some(context));
    ContextGuard { previous }
}

/// Restores the previously current context on drop
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Arc<IsolationContext>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        set_current(self.previous.take());
    }
}

/// Where the resolver finds its primary and secondary contexts
pub trait ContextAccessor: Send + Sync {
    /// The context most specific to the calling thread
    fn thread_context(&self) -> Option<Arc<IsolationContext>>;

    /// The context that loaded the resolver itself
    fn module_context(&self) -> Arc<IsolationContext>;
}

/// Reads the thread-local current context; falls back to a fixed module context
pub struct ThreadContextAccessor {
    module: Arc<IsolationContext>,
}

impl ThreadContextAccessor {
    /// Use `module` as the secondary context
    pub fn new(module: Arc<IsolationContext>) -> Self {
        Self { module }
    }
}

impl Default for ThreadContextAccessor {
    fn default() -> Self {
        Self::new(module_context())
    }
}

impl ContextAccessor for ThreadContextAccessor {
    fn thread_context(&self) -> Option<Arc<IsolationContext>> {
        current()
    }

    fn module_context(&self) -> Arc<IsolationContext> {
        self.module.clone()
    }
}

/// Always reports the same pair of contexts
pub struct FixedContextAccessor {
    thread: Option<Arc<IsolationContext>>,
    module: Arc<IsolationContext>,
}

impl FixedContextAccessor {
    pub fn new(thread: Option<Arc<IsolationContext>>, module: Arc<IsolationContext>) -> Self {
        Self { thread, module }
    }
}

impl ContextAccessor for FixedContextAccessor {
    fn thread_context(&self) -> Option<Arc<IsolationContext>> {
        self.thread.clone()
    }

    fn module_context(&self) -> Arc<IsolationContext> {
        self.module.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;

    fn context(name: &str) -> Arc<IsolationContext> {
        IsolationContext::new(name, Arc::new(StaticRegistry::new()))
    }

    #[test]
    fn test_ids_are_unique() {
        let a = context("a");
        let b = context("a");
        assert_ne!(a.id(), b.id());
        assert_ne!(*a, *b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_enter_restores_previous() {
        let outer = context("outer");
        let inner = context("inner");

        assert!(current().is_none());
        let outer_guard = enter(outer.clone());
        {
            let _inner_guard = enter(inner.clone());
            assert_eq!(current().map(|c| c.id()), Some(inner.id()));
        }
        assert_eq!(current().map(|c| c.id()), Some(outer.id()));
        drop(outer_guard);
        assert!(current().is_none());
    }

    #[test]
    fn test_current_is_thread_local() {
        let ctx = context("main");
        let _guard = enter(ctx);
        let seen = std::thread::spawn(|| current().is_some()).join().unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_module_context_is_stable() {
        assert_eq!(module_context().id(), module_context().id());
        assert_eq!(module_context().name(), "valida-core");
    }

    #[test]
    fn test_guard_releases_strong_reference() {
        let ctx = context("short-lived");
        let weak = Arc::downgrade(&ctx);
        let guard = enter(ctx);
        drop(guard);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_fixed_accessor() {
        let thread = context("thread");
        let module = context("module");
        let accessor = FixedContextAccessor::new(Some(thread.clone()), module.clone());
        assert_eq!(accessor.thread_context().map(|c| c.id()), Some(thread.id()));
        assert_eq!(accessor.module_context().id(), module.id());
    }
}
