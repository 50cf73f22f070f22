//! Host - minimal component lifecycle driver
//!
//! Stands in for the UI runtime: every mounted component owns a scope, setup
//! code runs inside it, and unmounting stops it. Anything the component
//! subscribed or acquired during setup is released at unmount.

use std::collections::BTreeMap;

use effectscope::Scope;
use thiserror::Error;
use tracing::debug;

/// Errors from component lifecycle operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Component already mounted: {0}")]
    AlreadyMounted(String),

    #[error("Component not mounted: {0}")]
    NotMounted(String),
}

/// Set of mounted components, each with its own scope
#[derive(Debug, Default)]
pub struct Host {
    components: BTreeMap<String, Scope>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `name`, running `setup` inside its fresh scope
    pub fn mount<R>(&mut self, name: &str, setup: impl FnOnce() -> R) -> Result<R, HostError> {
        if self.components.contains_key(name) {
            return Err(HostError::AlreadyMounted(name.to_string()));
        }
        let scope = Scope::detached();
        debug!(component = name, scope_id = scope.id(), "Host::mount");
        self.components.insert(name.to_string(), scope.clone());
        self.enter(name, &scope, setup)
    }

    /// Run `f` inside the scope of mounted component `name`
    pub fn within<R>(&self, name: &str, f: impl FnOnce() -> R) -> Result<R, HostError> {
        let scope = self
            .components
            .get(name)
            .ok_or_else(|| HostError::NotMounted(name.to_string()))?;
        self.enter(name, scope, f)
    }

    fn enter<R>(&self, name: &str, scope: &Scope, f: impl FnOnce() -> R) -> Result<R, HostError> {
        scope.run(f).ok_or_else(|| HostError::NotMounted(name.to_string()))
    }

    /// Unmount `name`, stopping its scope
    pub fn unmount(&mut self, name: &str) -> Result<(), HostError> {
        let scope = self
            .components
            .remove(name)
            .ok_or_else(|| HostError::NotMounted(name.to_string()))?;
        debug!(component = name, scope_id = scope.id(), hooks = scope.hook_count(), "Host::unmount");
        scope.stop();
        Ok(())
    }

    /// Unmount every component, in name order
    pub fn unmount_all(&mut self) {
        for (name, scope) in std::mem::take(&mut self.components) {
            debug!(component = %name, "Host::unmount_all");
            scope.stop();
        }
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Names of mounted components, sorted
    pub fn mounted(&self) -> Vec<&str> {
        self.components.keys().map(String::as_str).collect()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if !self.components.is_empty() {
            debug!(components = self.components.len(), "Host::drop: unmounting remaining components");
        }
        self.unmount_all();
    }
}
