//! EffectScope - disposal scopes for component lifecycles
//!
//! A [`Scope`] collects teardown hooks. While a scope is running (see
//! [`Scope::run`]) it is the *active* scope for the current thread, and code
//! that wants cleanup at teardown registers a hook with [`on_scope_dispose`]
//! without being handed the scope explicitly. The host that owns the scope
//! decides when teardown happens by calling [`Scope::stop`].
//!
//! # Architecture
//!
//! ```text
//!  host (component mount)          library code (inside setup)
//!  ──────────────────────          ───────────────────────────
//!  let scope = Scope::new();
//!  scope.run(|| {            ───►  on_scope_dispose(|| cleanup());
//!      setup()                     current_scope() == Some(scope)
//!  });
//!  ...
//!  scope.stop();             ───►  cleanup() runs, children stop
//! ```
//!
//! Scopes created while another scope is running are collected by it and
//! stopped with it, unless created with [`Scope::detached`].
//!
//! # Example
//!
//! ```
//! use effectscope::{Scope, on_scope_dispose};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let disposed = Rc::new(Cell::new(false));
//! let scope = Scope::new();
//! let flag = disposed.clone();
//! scope.run(|| {
//!     on_scope_dispose(move || flag.set(true));
//! });
//! assert!(!disposed.get());
//! scope.stop();
//! assert!(disposed.get());
//! ```

mod scope;

pub use scope::{Scope, ScopeGuard, current_scope, on_scope_dispose};
