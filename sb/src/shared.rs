//! Shared composables - reference-counted singletons scoped to their consumers
//!
//! [`create_shared_composable`] wraps a factory so that every consumer gets
//! the same instance while at least one consumer is alive. Each consumer that
//! calls [`SharedComposable::get`] inside a running scope holds one reference;
//! when the last such scope stops, the instance is dropped and its internal
//! scope is stopped, so the next `get` builds a fresh one.
//!
//! # Usage contract
//!
//! A `get` outside any scope still counts as a consumer but never releases
//! its reference. The instance then outlives every scoped consumer, and a
//! later teardown that drives the count to zero drops it while that caller
//! may still hold it. Call `get` from inside a scope, or pass one explicitly
//! with [`SharedComposable::get_in`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use effectscope::{Scope, current_scope};
use tracing::{debug, trace};

struct SharedState<T> {
    subscribers: i64,
    value: Option<Rc<T>>,
    scope: Option<Scope>,
}

/// Factory wrapped into a reference-counted singleton
///
/// Clones share the same instance and counter.
pub struct SharedComposable<T> {
    factory: Rc<dyn Fn() -> T>,
    state: Rc<RefCell<SharedState<T>>>,
}

/// Wrap `factory` so that concurrent consumers share one instance
pub fn create_shared_composable<T: 'static>(factory: impl Fn() -> T + 'static) -> SharedComposable<T> {
    SharedComposable {
        factory: Rc::new(factory),
        state: Rc::new(RefCell::new(SharedState {
            subscribers: 0,
            value: None,
            scope: None,
        })),
    }
}

impl<T: 'static> SharedComposable<T> {
    /// The shared instance, released when the active scope stops
    ///
    /// Builds the instance (inside its own detached scope) if no live one
    /// exists.
    pub fn get(&self) -> Rc<T> {
        self.acquire(current_scope())
    }

    /// The shared instance, released when `scope` stops
    pub fn get_in(&self, scope: &Scope) -> Rc<T> {
        self.acquire(Some(scope.clone()))
    }

    fn acquire(&self, consumer: Option<Scope>) -> Rc<T> {
        let existing = {
            let mut state = self.state.borrow_mut();
            state.subscribers += 1;
            state.value.clone()
        };

        let value = match existing {
            Some(value) => value,
            None => {
                // The factory runs without the state borrowed: it may acquire
                // other shared composables or subscribe to buses
                let (scope, value) = Scope::isolated(|| (self.factory)());
                let value = Rc::new(value);
                debug!(scope_id = scope.id(), "SharedComposable: created instance");
                let mut state = self.state.borrow_mut();
                state.value = Some(value.clone());
                state.scope = Some(scope);
                value
            }
        };

        match consumer {
            Some(consumer) => {
                let state = Rc::downgrade(&self.state);
                consumer.on_dispose(move || release(&state));
            }
            None => trace!("SharedComposable::get: no active scope, reference is never released"),
        }
        value
    }

    /// Current consumer count (may be negative after unbalanced releases)
    pub fn subscribers(&self) -> i64 {
        self.state.borrow().subscribers
    }

    /// Whether an instance currently exists
    pub fn is_live(&self) -> bool {
        self.state.borrow().value.is_some()
    }
}

fn release<T>(state: &Weak<RefCell<SharedState<T>>>) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let torn_down = {
        let mut state = state.borrow_mut();
        state.subscribers -= 1;
        trace!(subscribers = state.subscribers, "SharedComposable: consumer released");
        if state.subscribers <= 0 && state.scope.is_some() {
            Some((state.scope.take(), state.value.take()))
        } else {
            None
        }
    };
    if let Some((scope, value)) = torn_down {
        if let Some(scope) = scope {
            debug!(scope_id = scope.id(), "SharedComposable: last consumer gone, stopping instance");
            scope.stop();
        }
        drop(value);
    }
}

impl<T> Clone for SharedComposable<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for SharedComposable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SharedComposable")
            .field("subscribers", &state.subscribers)
            .field("live", &state.value.is_some())
            .finish()
    }
}
