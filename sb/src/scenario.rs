//! Scenario runner - scripted component lifecycles against a fresh registry
//!
//! A scenario is a YAML list of steps. Components are mounted and unmounted
//! through a [`Host`], subscribe by name-keyed buses carrying JSON values, and
//! every listener invocation is recorded as a [`Delivery`].
//!
//! ```yaml
//! name: chat
//! steps:
//!   - op: mount
//!     component: header
//!   - op: on
//!     component: header
//!     key: chat
//!   - op: dispatch
//!     key: chat
//!     event: msg
//!     payload: { text: hi }
//!   - op: unmount
//!     component: header
//!   - op: expect
//!     key: chat
//!     listeners: 0
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::events::{EventBus, Identifier, Listener, Registry};
use crate::host::{Host, HostError};
use crate::shared::{SharedComposable, create_shared_composable};

type JsonBus = EventBus<Value, Value>;
type JsonListener = Listener<Value, Value>;

/// Errors from loading or running a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Step {step}: {source}")]
    Host {
        step: usize,
        #[source]
        source: HostError,
    },

    #[error("Step {step}: component {component} has no listener on {key} to remove")]
    NothingToRemove { step: usize, component: String, key: String },

    #[error("Step {step}: expected {expected} listeners on {key}, found {found}")]
    Expectation {
        step: usize,
        key: String,
        expected: usize,
        found: usize,
    },
}

/// A named list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mount {
        component: String,
    },
    Unmount {
        component: String,
    },
    /// Subscribe from inside the component's scope
    On {
        component: String,
        key: String,
    },
    /// Subscribe for one dispatch; not tracked for `off`
    Once {
        component: String,
        key: String,
    },
    /// Remove the component's most recent `on`/`shared` listener for `key`
    Off {
        component: String,
        key: String,
    },
    /// Subscribe through the shared bus instance for `key`
    Shared {
        component: String,
        key: String,
    },
    Dispatch {
        key: String,
        #[serde(default)]
        event: Option<Value>,
        #[serde(default)]
        payload: Option<Value>,
    },
    Reset {
        key: String,
    },
    /// Fail unless `key` has exactly `listeners` listeners
    Expect {
        key: String,
        listeners: usize,
    },
}

/// One listener invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// 1-based index of the dispatching step
    pub step: usize,
    pub component: String,
    pub key: String,
    pub event: Option<Value>,
    pub payload: Option<Value>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: Option<String>,
    pub steps: usize,
    pub deliveries: Vec<Delivery>,
    /// How many times a shared bus instance was (re)created
    pub shared_instances: usize,
    /// Listeners still registered after the last step, before teardown
    pub remaining_listeners: usize,
}

/// Executes scenarios against its own registry and host
pub struct ScenarioRunner {
    registry: Registry,
    host: Host,
    shared: HashMap<String, SharedComposable<JsonBus>>,
    listeners: HashMap<(String, String), Vec<JsonListener>>,
    deliveries: Rc<RefCell<Vec<Delivery>>>,
    shared_instances: Rc<Cell<usize>>,
    current_step: Rc<Cell<usize>>,
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioRunner {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            host: Host::new(),
            shared: HashMap::new(),
            listeners: HashMap::new(),
            deliveries: Rc::new(RefCell::new(Vec::new())),
            shared_instances: Rc::new(Cell::new(0)),
            current_step: Rc::new(Cell::new(0)),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every step, then unmount whatever is still mounted
    ///
    /// Each run starts from a fresh registry and fresh shared buses, so a
    /// runner can be reused without earlier runs leaking into the report.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Report, ScenarioError> {
        info!(name = ?scenario.name, steps = scenario.steps.len(), "ScenarioRunner::run");
        self.reset();
        let result = self.execute(scenario);
        self.host.unmount_all();
        self.listeners.clear();
        result
    }

    fn reset(&mut self) {
        self.host.unmount_all();
        self.registry = Registry::new();
        self.shared.clear();
        self.listeners.clear();
        self.deliveries.borrow_mut().clear();
        self.shared_instances.set(0);
        self.current_step.set(0);
    }

    fn execute(&mut self, scenario: &Scenario) -> Result<Report, ScenarioError> {
        for (index, step) in scenario.steps.iter().enumerate() {
            self.current_step.set(index + 1);
            self.apply(index + 1, step)?;
        }

        let remaining_listeners: usize = self
            .registry
            .identifiers()
            .iter()
            .map(|id| self.registry.listener_count(id))
            .sum();

        Ok(Report {
            name: scenario.name.clone(),
            steps: scenario.steps.len(),
            deliveries: std::mem::take(&mut *self.deliveries.borrow_mut()),
            shared_instances: self.shared_instances.get(),
            remaining_listeners,
        })
    }

    fn apply(&mut self, step: usize, action: &Step) -> Result<(), ScenarioError> {
        debug!(step, ?action, "ScenarioRunner::apply");
        let host_error = |source| ScenarioError::Host { step, source };
        match action {
            Step::Mount { component } => {
                self.host.mount(component, || ()).map_err(host_error)?;
            }
            Step::Unmount { component } => {
                self.host.unmount(component).map_err(host_error)?;
                self.listeners.retain(|(owner, _), _| owner != component);
            }
            Step::On { component, key } => {
                let bus: JsonBus = self.registry.bus(key.as_str());
                let listener = self.recorder(component, key);
                self.host
                    .within(component, || bus.on(listener.clone()))
                    .map_err(host_error)?;
                self.track(component, key, listener);
            }
            Step::Once { component, key } => {
                let bus: JsonBus = self.registry.bus(key.as_str());
                let listener = self.recorder(component, key);
                self.host.within(component, || bus.once(listener)).map_err(host_error)?;
            }
            Step::Off { component, key } => {
                let listener = self
                    .listeners
                    .get_mut(&(component.clone(), key.clone()))
                    .and_then(Vec::pop)
                    .ok_or_else(|| ScenarioError::NothingToRemove {
                        step,
                        component: component.clone(),
                        key: key.clone(),
                    })?;
                let bus: JsonBus = self.registry.bus(key.as_str());
                bus.off(&listener);
            }
            Step::Shared { component, key } => {
                let composable = self.shared_bus(key);
                let listener = self.recorder(component, key);
                self.host
                    .within(component, || composable.get().on(listener.clone()))
                    .map_err(host_error)?;
                self.track(component, key, listener);
            }
            Step::Dispatch { key, event, payload } => {
                let bus: JsonBus = self.registry.bus(key.as_str());
                bus.dispatch(event.clone(), payload.clone());
            }
            Step::Reset { key } => {
                let bus: JsonBus = self.registry.bus(key.as_str());
                bus.reset();
                self.listeners.retain(|(_, tracked), _| tracked != key);
            }
            Step::Expect { key, listeners } => {
                let found = self.registry.listener_count(&Identifier::from(key.as_str()));
                if found != *listeners {
                    return Err(ScenarioError::Expectation {
                        step,
                        key: key.clone(),
                        expected: *listeners,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    fn recorder(&self, component: &str, key: &str) -> JsonListener {
        let deliveries = self.deliveries.clone();
        let current_step = self.current_step.clone();
        let component = component.to_string();
        let key = key.to_string();
        Listener::new(move |event: Option<&Value>, payload: Option<&Value>| {
            deliveries.borrow_mut().push(Delivery {
                step: current_step.get(),
                component: component.clone(),
                key: key.clone(),
                event: event.cloned(),
                payload: payload.cloned(),
            });
        })
    }

    fn track(&mut self, component: &str, key: &str, listener: JsonListener) {
        self.listeners
            .entry((component.to_string(), key.to_string()))
            .or_default()
            .push(listener);
    }

    fn shared_bus(&mut self, key: &str) -> SharedComposable<JsonBus> {
        let registry = self.registry.clone();
        let created = self.shared_instances.clone();
        self.shared
            .entry(key.to_string())
            .or_insert_with(|| {
                let key = key.to_string();
                create_shared_composable(move || {
                    created.set(created.get() + 1);
                    registry.bus(key.as_str())
                })
            })
            .clone()
    }
}
