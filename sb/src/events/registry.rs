//! Registry - identifier to listener list storage
//!
//! The registry only stores listeners; buses ([`EventBus`]) are handles that
//! read and write one entry. Listeners are stored type-erased so one registry
//! can hold buses of any event type.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::bus::EventBus;
use super::types::Identifier;

thread_local! {
    static SHARED_REGISTRY: Registry = Registry::new();
}

/// One registered listener: its identity plus the type-erased `Listener`
pub(crate) struct Slot {
    addr: usize,
    listener: Rc<dyn Any>,
}

impl Slot {
    pub(crate) fn new(addr: usize, listener: Rc<dyn Any>) -> Self {
        Self { addr, listener }
    }
}

type Entries = HashMap<Identifier, Vec<Slot>>;

/// Store of listener lists keyed by [`Identifier`]
///
/// `Registry` is a cheap handle: clones share the same store. Use
/// [`Registry::new`] for an isolated store (tests, embedded hosts) or
/// [`Registry::shared`] for the per-thread process registry.
///
/// Invariant: no identifier maps to an empty list.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Rc<RefCell<Entries>>,
}

/// Non-owning registry handle, held by listeners that live inside the registry
#[derive(Clone)]
pub(crate) struct WeakRegistry {
    entries: Weak<RefCell<Entries>>,
}

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<Registry> {
        self.entries.upgrade().map(|entries| Registry { entries })
    }
}

impl Registry {
    /// Create an empty, isolated registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by everything running on this thread
    pub fn shared() -> Self {
        SHARED_REGISTRY.with(Registry::clone)
    }

    /// Bus handle for `id` backed by this registry
    pub fn bus<E: 'static, P: 'static>(&self, id: impl Into<Identifier>) -> EventBus<E, P> {
        EventBus::new(self, id)
    }

    /// Whether both handles refer to the same store
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    /// Whether `id` currently has any listener
    pub fn contains(&self, id: &Identifier) -> bool {
        self.entries.borrow().contains_key(id)
    }

    /// Number of listeners registered for `id`
    pub fn listener_count(&self, id: &Identifier) -> usize {
        self.entries.borrow().get(id).map(Vec::len).unwrap_or(0)
    }

    /// Number of identifiers with at least one listener
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Identifiers with at least one listener, in no particular order
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Drop every listener of every identifier without invoking them
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        trace!(identifiers = entries.len(), "Registry::clear");
        drop(entries);
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            entries: Rc::downgrade(&self.entries),
        }
    }

    /// Append a listener to the list for `id`, creating the list if absent
    pub(crate) fn insert(&self, id: &Identifier, slot: Slot) -> usize {
        let mut entries = self.entries.borrow_mut();
        let list = entries.entry(id.clone()).or_default();
        list.push(slot);
        list.len()
    }

    /// Remove the first listener with identity `addr` from the list for `id`
    ///
    /// Deletes the entry when the list becomes empty. Returns whether a
    /// listener was removed.
    pub(crate) fn remove(&self, id: &Identifier, addr: usize) -> bool {
        // Removed listeners are dropped after the borrow ends: their captures
        // may reach back into the registry
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let Some(list) = entries.get_mut(id) else {
                return false;
            };
            let index = list.iter().position(|slot| slot.addr == addr);
            let removed = index.map(|index| list.remove(index));
            if list.is_empty() {
                entries.remove(id);
            }
            removed
        };
        removed.is_some()
    }

    /// Delete the entry for `id`, returning how many listeners it held
    pub(crate) fn remove_all(&self, id: &Identifier) -> usize {
        let removed = self.entries.borrow_mut().remove(id);
        removed.map(|list| list.len()).unwrap_or(0)
    }

    /// Copy of the listener list for `id`, in insertion order
    pub(crate) fn snapshot(&self, id: &Identifier) -> Vec<Rc<dyn Any>> {
        self.entries
            .borrow()
            .get(id)
            .map(|list| list.iter().map(|slot| slot.listener.clone()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        f.debug_map()
            .entries(entries.iter().map(|(id, list)| (id.to_string(), list.len())))
            .finish()
    }
}
