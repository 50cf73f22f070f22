//! Event Bus - per-identifier pub/sub handle
//!
//! An [`EventBus`] is a view onto one registry entry. Subscribing inside a
//! running [`Scope`] ties the subscription to that scope: when the host stops
//! the scope (component unmount), the listener is removed without any
//! explicit cleanup by the subscriber.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use effectscope::{Scope, on_scope_dispose};
use tracing::{debug, trace, warn};

use super::registry::{Registry, Slot};
use super::types::Identifier;

/// Callback invoked on dispatch with the optional event and payload
///
/// Cloning a `Listener` shares the callable. Removal compares identity, so
/// keep the `Listener` you subscribed (or a clone of it) to call
/// [`EventBus::off`].
pub struct Listener<E, P = ()> {
    callback: Rc<dyn Fn(Option<&E>, Option<&P>)>,
}

impl<E, P> Listener<E, P> {
    pub fn new(callback: impl Fn(Option<&E>, Option<&P>) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn call(&self, event: Option<&E>, payload: Option<&P>) {
        (self.callback)(event, payload)
    }

    /// Whether both listeners share the same callable
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.callback) as *const () as usize
    }
}

impl<E, P> Clone for Listener<E, P> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<E, P> fmt::Debug for Listener<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:#x})", self.addr())
    }
}

/// Handle that removes one subscription
///
/// Returned by [`EventBus::on`] and friends. Calling
/// [`unsubscribe`](Self::unsubscribe) is equivalent to `off(listener)`;
/// the same handle is registered as the scope's teardown hook. Only the
/// first call across all clones removes anything, and it releases the
/// listener so a scope hook left behind holds nothing.
#[derive(Clone)]
pub struct Unsubscribe {
    off: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Unsubscribe {
    fn new(off: impl FnOnce() + 'static) -> Self {
        Self {
            off: Rc::new(RefCell::new(Some(Box::new(off)))),
        }
    }

    pub fn unsubscribe(&self) {
        let off = self.off.borrow_mut().take();
        if let Some(off) = off {
            off();
        }
    }

    /// Whether this subscription was already removed through the handle
    pub fn is_done(&self) -> bool {
        self.off.borrow().is_none()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("done", &self.is_done()).finish()
    }
}

/// Pub/sub handle for one identifier
///
/// Cheap to clone; every clone (and every bus built for an equal identifier
/// on the same registry) shares the same listener list.
pub struct EventBus<E, P = ()> {
    id: Identifier,
    registry: Registry,
    _types: PhantomData<fn() -> (E, P)>,
}

impl<E: 'static, P: 'static> EventBus<E, P> {
    pub fn new(registry: &Registry, id: impl Into<Identifier>) -> Self {
        let id = id.into();
        trace!(identifier = %id, "EventBus::new");
        Self {
            id,
            registry: registry.clone(),
            _types: PhantomData,
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.id
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Subscribe `listener`
    ///
    /// When called while a scope is running, the subscription is removed
    /// when that scope stops. Outside any scope nothing is registered for
    /// cleanup; use the returned handle or [`off`](Self::off).
    pub fn on(&self, listener: Listener<E, P>) -> Unsubscribe {
        let unsubscribe = self.attach(listener);
        let hook = unsubscribe.clone();
        if !on_scope_dispose(move || hook.unsubscribe()) {
            trace!(identifier = %self.id, "EventBus::on: no active scope, auto-cleanup skipped");
        }
        unsubscribe
    }

    /// Subscribe `listener`, removing it when `scope` stops
    pub fn on_in(&self, scope: &Scope, listener: Listener<E, P>) -> Unsubscribe {
        let unsubscribe = self.attach(listener);
        let hook = unsubscribe.clone();
        scope.on_dispose(move || hook.unsubscribe());
        unsubscribe
    }

    /// Subscribe a closure; see [`on`](Self::on)
    pub fn subscribe(&self, callback: impl Fn(Option<&E>, Option<&P>) + 'static) -> Unsubscribe {
        self.on(Listener::new(callback))
    }

    /// Subscribe `listener` for the next dispatch only
    ///
    /// The listener is removed before it is invoked, and fires at most once
    /// even if a dispatch re-enters the bus.
    pub fn once(&self, listener: Listener<E, P>) -> Unsubscribe {
        let fired = Cell::new(false);
        let own_addr = Rc::new(Cell::new(0usize));
        let registry = self.registry.downgrade();
        let id = self.id.clone();

        let addr = own_addr.clone();
        let adapter = Listener::new(move |event, payload| {
            if fired.replace(true) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                registry.remove(&id, addr.get());
            }
            listener.call(event, payload);
        });
        own_addr.set(adapter.addr());
        self.on(adapter)
    }

    fn attach(&self, listener: Listener<E, P>) -> Unsubscribe {
        let erased: Rc<dyn Any> = Rc::new(listener.clone());
        let count = self.registry.insert(&self.id, Slot::new(listener.addr(), erased));
        debug!(identifier = %self.id, listeners = count, "EventBus::on: listener added");

        let bus = self.clone();
        Unsubscribe::new(move || bus.off(&listener))
    }

    /// Remove the first registration of `listener`
    ///
    /// No-op when it is not subscribed. Removing the last listener deletes
    /// the identifier's entry from the registry.
    pub fn off(&self, listener: &Listener<E, P>) {
        let removed = self.registry.remove(&self.id, listener.addr());
        trace!(identifier = %self.id, removed, "EventBus::off");
    }

    /// Invoke every subscribed listener, in subscription order
    ///
    /// The listener list is copied first: listeners subscribed during this
    /// dispatch are not called by it, and listeners removed during it by
    /// another listener still are.
    pub fn dispatch(&self, event: Option<E>, payload: Option<P>) {
        let listeners = self.registry.snapshot(&self.id);
        debug!(identifier = %self.id, listeners = listeners.len(), "EventBus::dispatch");
        for erased in listeners {
            match (*erased).downcast_ref::<Listener<E, P>>() {
                Some(listener) => listener.call(event.as_ref(), payload.as_ref()),
                None => warn!(
                    identifier = %self.id,
                    event_type = std::any::type_name::<E>(),
                    "EventBus::dispatch: listener was subscribed with another event type, skipping"
                ),
            }
        }
    }

    /// Dispatch `event` without a payload
    pub fn emit(&self, event: E) {
        self.dispatch(Some(event), None);
    }

    /// Dispatch `event` with `payload`
    pub fn emit_with(&self, event: E, payload: P) {
        self.dispatch(Some(event), Some(payload));
    }

    /// Drop every listener of this identifier without invoking them
    pub fn reset(&self) {
        let dropped = self.registry.remove_all(&self.id);
        debug!(identifier = %self.id, dropped, "EventBus::reset");
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listener_count(&self.id)
    }
}

impl<E, P> Clone for EventBus<E, P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            registry: self.registry.clone(),
            _types: PhantomData,
        }
    }
}

impl<E, P> fmt::Debug for EventBus<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("identifier", &self.id)
            .field("listeners", &self.registry.listener_count(&self.id))
            .finish()
    }
}

/// Bus for `id` on the per-thread shared registry
pub fn use_event_bus<E: 'static, P: 'static>(id: impl Into<Identifier>) -> EventBus<E, P> {
    Registry::shared().bus(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging(log: &Log, name: &'static str) -> Listener<String, u32> {
        let log = log.clone();
        Listener::new(move |event: Option<&String>, payload: Option<&u32>| {
            log.borrow_mut().push(format!("{}:{:?}:{:?}", name, event, payload));
        })
    }

    #[test]
    fn test_dispatch_without_listeners_is_noop() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("nobody");
        bus.dispatch(Some("hello".to_string()), Some(1));
        bus.dispatch(None, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        bus.on(logging(&log, "a"));
        bus.on(logging(&log, "b"));

        bus.emit_with("msg".to_string(), 7);
        assert_eq!(
            *log.borrow(),
            vec![r#"a:Some("msg"):Some(7)"#, r#"b:Some("msg"):Some(7)"#]
        );
    }

    #[test]
    fn test_dispatch_with_no_event_or_payload() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        bus.on(logging(&log, "a"));
        bus.dispatch(None, None);
        bus.emit("only".to_string());
        assert_eq!(*log.borrow(), vec!["a:None:None", r#"a:Some("only"):None"#]);
    }

    #[test]
    fn test_off_removes_listener() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let a = logging(&log, "a");
        bus.on(a.clone());
        bus.on(logging(&log, "b"));

        bus.off(&a);
        bus.emit("msg".to_string());
        assert_eq!(*log.borrow(), vec![r#"b:Some("msg"):None"#]);
    }

    #[test]
    fn test_off_unknown_listener_is_noop() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        bus.off(&logging(&log, "stranger"));
        bus.on(logging(&log, "a"));
        bus.off(&logging(&log, "stranger"));
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_off_removes_only_first_duplicate() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let a = logging(&log, "a");
        bus.on(a.clone());
        bus.on(a.clone());

        bus.off(&a);
        assert_eq!(bus.listener_count(), 1);
        bus.emit("x".to_string());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_removing_last_listener_deletes_entry() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let a = logging(&log, "a");
        bus.on(a.clone());
        assert!(registry.contains(bus.identifier()));

        bus.off(&a);
        assert!(!registry.contains(bus.identifier()));

        bus.on(logging(&log, "b"));
        assert_eq!(bus.listener_count(), 1);
        bus.emit("fresh".to_string());
        assert_eq!(*log.borrow(), vec![r#"b:Some("fresh"):None"#]);
    }

    #[test]
    fn test_unsubscribe_handle() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let unsubscribe = bus.on(logging(&log, "a"));
        unsubscribe.unsubscribe();
        unsubscribe.unsubscribe();
        bus.emit("msg".to_string());
        assert!(log.borrow().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsubscribe_releases_listener_before_scope_stops() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let token = Rc::new(());
        let scope = Scope::new();

        let held = token.clone();
        let unsubscribe = scope
            .run(|| {
                bus.subscribe(move |_, _| {
                    let _ = &held;
                })
            })
            .unwrap();
        assert_eq!(Rc::strong_count(&token), 2);

        unsubscribe.unsubscribe();
        assert!(unsubscribe.is_done());
        assert_eq!(Rc::strong_count(&token), 1);
        assert_eq!(scope.hook_count(), 1);

        scope.stop();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_scope_hook_leaves_resubscribed_listener() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let listener = logging(&log, "a");
        let scope = Scope::new();

        let first = scope.run(|| bus.on(listener.clone())).unwrap();
        first.unsubscribe();
        bus.on(listener.clone());

        scope.stop();
        bus.emit("msg".to_string());
        assert_eq!(*log.borrow(), vec![r#"a:Some("msg"):None"#]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        bus.once(logging(&log, "a"));

        bus.emit("first".to_string());
        bus.emit("second".to_string());
        assert_eq!(*log.borrow(), vec![r#"a:Some("first"):None"#]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_once_can_be_cancelled() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let unsubscribe = bus.once(logging(&log, "a"));
        unsubscribe.unsubscribe();
        bus.emit("first".to_string());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_once_under_reentrant_dispatch() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let count = Rc::new(Cell::new(0));

        let inner_bus = bus.clone();
        let counter = count.clone();
        // Re-dispatches before the counting listener is reached by the outer dispatch
        bus.once(Listener::new(move |_, _| inner_bus.emit("nested".to_string())));
        bus.once(Listener::new(move |_, _| {
            counter.set(counter.get() + 1);
        }));

        bus.emit("outer".to_string());
        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_reset_drops_listeners_without_calling_them() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        bus.on(logging(&log, "a"));
        bus.on(logging(&log, "b"));

        bus.reset();
        assert_eq!(bus.listener_count(), 0);
        bus.emit("msg".to_string());
        assert!(log.borrow().is_empty());
        bus.reset();
    }

    #[test]
    fn test_scope_stop_unsubscribes() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let scope = Scope::new();
        scope.run(|| {
            bus.on(logging(&log, "scoped"));
        });
        bus.on(logging(&log, "global"));
        assert_eq!(bus.listener_count(), 2);

        scope.stop();
        bus.emit("msg".to_string());
        assert_eq!(*log.borrow(), vec![r#"global:Some("msg"):None"#]);
    }

    #[test]
    fn test_on_in_explicit_scope() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let scope = Scope::detached();
        bus.on_in(&scope, logging(&log, "a"));
        assert_eq!(scope.hook_count(), 1);

        scope.stop();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();

        let late = logging(&log, "late");
        let inner_bus = bus.clone();
        let sink = log.clone();
        bus.subscribe(move |_, _| {
            sink.borrow_mut().push("first".to_string());
            inner_bus.on(late.clone());
        });

        bus.emit("one".to_string());
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_listener_removed_during_dispatch_still_called() {
        let registry = Registry::new();
        let bus: EventBus<String, u32> = registry.bus("chat");
        let log = Log::default();
        let second = logging(&log, "second");

        let inner_bus = bus.clone();
        let victim = second.clone();
        bus.subscribe(move |_, _| inner_bus.off(&victim));
        bus.on(second);

        bus.emit("one".to_string());
        assert_eq!(log.borrow().len(), 1);
        bus.emit("two".to_string());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_mismatched_event_type_is_skipped() {
        let registry = Registry::new();
        let strings: EventBus<String, u32> = registry.bus("shared-name");
        let numbers: EventBus<i64> = registry.bus("shared-name");
        let log = Log::default();
        strings.on(logging(&log, "s"));

        numbers.emit(5);
        assert!(log.borrow().is_empty());
        strings.emit("ok".to_string());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_distinct_identifiers_do_not_collide() {
        let registry = Registry::new();
        let chat: EventBus<String, u32> = registry.bus("chat");
        let numbered: EventBus<String, u32> = registry.bus(1i64);
        let log = Log::default();
        chat.on(logging(&log, "chat"));
        numbered.on(logging(&log, "numbered"));

        numbered.emit("x".to_string());
        assert_eq!(*log.borrow(), vec![r#"numbered:Some("x"):None"#]);
    }

    #[test]
    fn test_listener_identity() {
        let a: Listener<String> = Listener::new(|_, _| {});
        let b: Listener<String> = Listener::new(|_, _| {});
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }
}
