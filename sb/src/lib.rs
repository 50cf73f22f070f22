//! sharedbus - Scope-aware event bus and shared composables
//!
//! Components subscribe to buses keyed by an identifier. Subscriptions made
//! while a [`Scope`] is active are removed when that scope stops, so a
//! component never has to clean up its own listeners. A
//! [`SharedComposable`] hands every component the same lazily built
//! instance and tears it down when the last of them goes away.
//!
//! # Modules
//!
//! - [`events`] - Registry, typed event buses, and the modal display bus
//! - [`shared`] - Reference-counted shared composables
//! - [`host`] - Named component mounting on top of scopes
//! - [`scenario`] - YAML-scripted component lifecycles
//! - [`demo`] - Built-in modal display walkthrough
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod demo;
pub mod events;
pub mod host;
pub mod scenario;
pub mod shared;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use effectscope::{Scope, ScopeGuard, current_scope, on_scope_dispose};
pub use events::{
    EventBus, EventKey, Identifier, Listener, ModalDisplayEvent, Registry, Symbol, Unsubscribe, use_event_bus,
    use_modal_display_event,
};
pub use host::{Host, HostError};
pub use scenario::{Delivery, Report, Scenario, ScenarioError, ScenarioRunner, Step};
pub use shared::{SharedComposable, create_shared_composable};
