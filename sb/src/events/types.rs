//! Identifier types for event buses
//!
//! A bus is addressed by an [`Identifier`]. Identifiers are plain map keys:
//! equal identifiers share one listener list, distinct ones never collide.
//! [`EventKey`] is the typed flavour, a unique [`Symbol`] that also carries
//! the event and payload types of the bus it names.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use uuid::Uuid;

/// Unique token with a human-readable description
///
/// Two symbols created separately never compare equal, even with the same
/// description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: Uuid,
    description: &'static str,
}

impl Symbol {
    pub fn new(description: &'static str) -> Self {
        Self {
            id: Uuid::now_v7(),
            description,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Key of one listener list in a [`Registry`](super::Registry)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Symbol(Symbol),
    Name(String),
    Number(i64),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Symbol(symbol) => write!(f, "{}", symbol),
            Identifier::Name(name) => write!(f, "{}", name),
            Identifier::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<Symbol> for Identifier {
    fn from(symbol: Symbol) -> Self {
        Identifier::Symbol(symbol)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}

impl From<i64> for Identifier {
    fn from(number: i64) -> Self {
        Identifier::Number(number)
    }
}

impl<E, P> From<EventKey<E, P>> for Identifier {
    fn from(key: EventKey<E, P>) -> Self {
        Identifier::Symbol(key.symbol)
    }
}

impl<E, P> From<&EventKey<E, P>> for Identifier {
    fn from(key: &EventKey<E, P>) -> Self {
        Identifier::Symbol(key.symbol)
    }
}

/// Typed symbol naming a bus of events `E` with payloads `P`
///
/// The types are only a convention at the call site: the registry stores
/// listeners by identifier alone.
pub struct EventKey<E, P = ()> {
    symbol: Symbol,
    _types: PhantomData<fn() -> (E, P)>,
}

impl<E, P> EventKey<E, P> {
    pub fn new(description: &'static str) -> Self {
        Self {
            symbol: Symbol::new(description),
            _types: PhantomData,
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn identifier(&self) -> Identifier {
        Identifier::Symbol(self.symbol)
    }
}

impl<E, P> Clone for EventKey<E, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, P> Copy for EventKey<E, P> {}

impl<E, P> PartialEq for EventKey<E, P> {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl<E, P> Eq for EventKey<E, P> {}

impl<E, P> Hash for EventKey<E, P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl<E, P> fmt::Debug for EventKey<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventKey")
            .field("symbol", &self.symbol)
            .field("event", &std::any::type_name::<E>())
            .finish()
    }
}
