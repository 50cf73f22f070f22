//! Modal display events
//!
//! Components ask the application shell to open or close its modal through
//! one shared bus. Every mounted component gets the same bus instance from
//! [`use_modal_display_event`]; the bus (and anything its factory set up) is
//! released once the last of those components unmounts.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::bus::{EventBus, use_event_bus};
use super::types::EventKey;
use crate::shared::{SharedComposable, create_shared_composable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModalDisplayEvent {
    OpenModal,
    CloseModal,
}

impl ModalDisplayEvent {
    /// Wire name of the action, as serialized
    pub fn action(&self) -> &'static str {
        match self {
            ModalDisplayEvent::OpenModal => "OPEN_MODAL",
            ModalDisplayEvent::CloseModal => "CLOSE_MODAL",
        }
    }
}

thread_local! {
    static MODAL_DISPLAY_KEY: EventKey<ModalDisplayEvent> = EventKey::new("ModalDisplayEvent");

    static MODAL_DISPLAY_BUS: SharedComposable<EventBus<ModalDisplayEvent>> =
        create_shared_composable(|| use_event_bus(modal_display_key()));
}

/// Key of the modal display bus on this thread
pub fn modal_display_key() -> EventKey<ModalDisplayEvent> {
    MODAL_DISPLAY_KEY.with(|key| *key)
}

/// Shared modal display bus, released when the calling scope stops
pub fn use_modal_display_event() -> Rc<EventBus<ModalDisplayEvent>> {
    MODAL_DISPLAY_BUS.with(SharedComposable::get)
}
