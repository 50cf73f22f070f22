//! Built-in modal display walkthrough
//!
//! Mounts an application shell and two buttons that share the modal display
//! bus, then unmounts and remounts them to show subscriptions being released
//! and the shared bus being rebuilt.

use std::cell::RefCell;
use std::rc::Rc;

use crate::events::{ModalDisplayEvent, use_modal_display_event};
use crate::host::{Host, HostError};

/// Run the walkthrough, returning one line per observation
pub fn run_modal_demo() -> Result<Vec<String>, HostError> {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let note = |line: String| lines.borrow_mut().push(line);
    let mut host = Host::new();

    let sink = lines.clone();
    let shell_bus = host.mount("shell", || {
        let bus = use_modal_display_event();
        bus.subscribe(move |event: Option<&ModalDisplayEvent>, _| {
            let action = event.map(ModalDisplayEvent::action).unwrap_or("<none>");
            sink.borrow_mut().push(format!("shell received {}", action));
        });
        bus
    })?;
    note("mounted shell".to_string());

    let open_bus = host.mount("open-button", use_modal_display_event)?;
    let close_bus = host.mount("close-button", use_modal_display_event)?;
    note(format!(
        "buttons share the shell bus: {}",
        Rc::ptr_eq(&shell_bus, &open_bus) && Rc::ptr_eq(&open_bus, &close_bus)
    ));

    open_bus.emit(ModalDisplayEvent::OpenModal);
    close_bus.emit(ModalDisplayEvent::CloseModal);

    host.unmount("shell")?;
    note(format!("unmounted shell, listeners left: {}", open_bus.listener_count()));
    open_bus.emit(ModalDisplayEvent::OpenModal);

    host.unmount("open-button")?;
    host.unmount("close-button")?;
    note("unmounted buttons".to_string());

    let remounted = host.mount("shell", use_modal_display_event)?;
    note(format!("remounted shell gets a fresh bus: {}", !Rc::ptr_eq(&remounted, &shell_bus)));
    host.unmount_all();

    let lines = lines.borrow().clone();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_demo_transcript() {
        let lines = run_modal_demo().unwrap();
        assert_eq!(
            lines,
            vec![
                "mounted shell",
                "buttons share the shell bus: true",
                "shell received OPEN_MODAL",
                "shell received CLOSE_MODAL",
                "unmounted shell, listeners left: 0",
                "unmounted buttons",
                "remounted shell gets a fresh bus: true",
            ]
        );
    }
}
