//! Core Scope implementation

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Stack of scopes currently inside `run`, innermost last
    static ACTIVE_SCOPES: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

type Hook = Box<dyn FnOnce()>;

struct ScopeInner {
    id: u64,
    detached: bool,
    active: Cell<bool>,
    hooks: RefCell<Vec<Hook>>,
    children: RefCell<Vec<Scope>>,
}

/// A container of teardown hooks
///
/// `Scope` is a cheap handle; clones refer to the same scope. Dropping a
/// handle never stops the scope, only [`Scope::stop`] (or a [`ScopeGuard`])
/// does.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// Create an active scope
    ///
    /// If another scope is running on this thread, the new scope is collected
    /// by it and stopped when it stops.
    pub fn new() -> Self {
        let scope = Self::build(false);
        if let Some(parent) = current_scope()
            && parent.is_active()
        {
            trace!(scope_id = scope.id(), parent_id = parent.id(), "Scope::new: collected by parent");
            let mut children = parent.inner.children.borrow_mut();
            children.retain(Scope::is_active);
            children.push(scope.clone());
        }
        scope
    }

    /// Create an active scope that is never collected by a parent
    pub fn detached() -> Self {
        Self::build(true)
    }

    /// Create a detached scope and run `f` inside it
    pub fn isolated<R>(f: impl FnOnce() -> R) -> (Self, R) {
        let scope = Self::detached();
        let result = scope.enter(f);
        (scope, result)
    }

    fn build(detached: bool) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(scope_id = id, detached, "Scope::build: creating scope");
        Self {
            inner: Rc::new(ScopeInner {
                id,
                detached,
                active: Cell::new(true),
                hooks: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Process-unique scope id (for logs)
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether the scope has not been stopped yet
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached
    }

    /// Whether both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of teardown hooks waiting for `stop`
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.borrow().len()
    }

    /// Run `f` with this scope as the active scope
    ///
    /// Returns `None` without calling `f` if the scope was already stopped.
    /// The previously active scope is restored afterwards, including when `f`
    /// panics.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            warn!(scope_id = self.id(), "Scope::run: scope is stopped, not running");
            return None;
        }
        Some(self.enter(f))
    }

    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        ACTIVE_SCOPES.with(|stack| stack.borrow_mut().push(self.clone()));
        let _restore = RestoreActive;
        f()
    }

    /// Register a teardown hook
    ///
    /// Hooks run in registration order when the scope stops. A hook
    /// registered on a stopped scope runs immediately.
    pub fn on_dispose(&self, hook: impl FnOnce() + 'static) {
        if self.is_active() {
            self.inner.hooks.borrow_mut().push(Box::new(hook));
        } else {
            debug!(scope_id = self.id(), "Scope::on_dispose: scope already stopped, running hook now");
            hook();
        }
    }

    /// Stop the scope: run its hooks, then stop collected child scopes
    ///
    /// Stopping twice is a no-op.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            trace!(scope_id = self.id(), "Scope::stop: already stopped");
            return;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks.borrow_mut());
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        debug!(
            scope_id = self.id(),
            hooks = hooks.len(),
            children = children.len(),
            "Scope::stop"
        );
        for hook in hooks {
            hook();
        }
        for child in children {
            child.stop();
        }
    }

    /// Wrap the scope in a guard that stops it on drop
    pub fn guard(self) -> ScopeGuard {
        ScopeGuard { scope: self }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("detached", &self.is_detached())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

/// Pops the active scope stack when `enter` unwinds or returns
struct RestoreActive;

impl Drop for RestoreActive {
    fn drop(&mut self) {
        // Drop the popped handle outside the borrow: it may be the last one
        let popped = ACTIVE_SCOPES.try_with(|stack| stack.borrow_mut().pop());
        drop(popped);
    }
}

/// Owns a scope and stops it when dropped
#[must_use = "dropping the guard stops the scope immediately"]
#[derive(Debug)]
pub struct ScopeGuard {
    scope: Scope,
}

impl ScopeGuard {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.stop();
    }
}

/// The scope currently inside `run` on this thread, if any
pub fn current_scope() -> Option<Scope> {
    ACTIVE_SCOPES.with(|stack| stack.borrow().last().cloned())
}

/// Register a teardown hook with the active scope
///
/// Returns `false` when no scope is active; the hook is dropped without
/// running.
pub fn on_scope_dispose(hook: impl FnOnce() + 'static) -> bool {
    match current_scope() {
        Some(scope) => {
            scope.on_dispose(hook);
            true
        }
        None => {
            trace!("on_scope_dispose: no active scope, hook dropped");
            false
        }
    }
}
