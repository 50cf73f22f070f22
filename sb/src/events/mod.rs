//! Event bus: identifiers, registry and per-identifier pub/sub handles
//!
//! # Architecture
//!
//! ```text
//!        component A            component B            component C
//!        (scope A)              (scope B)              (no scope)
//!           │ on(l1)               │ on(l2)               │ dispatch(e, p)
//!           ▼                      ▼                      ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                EventBus<E, P> handles for "chat"             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Registry   "chat" ─► [l1, l2]      Symbol(modal) ─► [l3]     │
//! └──────────────────────────────────────────────────────────────┘
//!
//!  scope A stops ─► off(l1)         last listener removed ─► entry deleted
//! ```
//!
//! # Usage
//!
//! ```
//! use sharedbus::events::{EventBus, Registry};
//! use sharedbus::Scope;
//!
//! let registry = Registry::new();
//! let bus: EventBus<String, u32> = registry.bus("chat");
//!
//! let component = Scope::new();
//! component.run(|| {
//!     bus.subscribe(|event, payload| println!("{:?} {:?}", event, payload));
//! });
//!
//! bus.emit_with("msg".to_string(), 1);
//! component.stop();
//! assert_eq!(bus.listener_count(), 0);
//! ```

mod bus;
mod modal_display;
mod registry;
mod types;

pub use bus::{EventBus, Listener, Unsubscribe, use_event_bus};
pub use modal_display::{ModalDisplayEvent, modal_display_key, use_modal_display_event};
pub use registry::Registry;
pub use types::{EventKey, Identifier, Symbol};
