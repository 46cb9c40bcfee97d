//! Observable connection state and status text.

use horizon_socket_core::logging::targets;
use horizon_socket_core::{ObservableProperty, Signal};

use crate::state::ConnectionState;

/// The framework-visible face of a connection: its state and a
/// human-readable status line, each published on a signal.
///
/// Shared between the controller (which writes it) and the device (which
/// exposes it), so observers can read it without waiting on an in-flight
/// command.
#[derive(Debug)]
pub struct StatusBoard {
    state: ObservableProperty<ConnectionState>,
    status: ObservableProperty<String>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// A board in the `Closed` state with the default status text.
    pub fn new() -> Self {
        Self {
            state: ObservableProperty::new(ConnectionState::Closed),
            status: ObservableProperty::new(ConnectionState::Closed.status_text()),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Current status text.
    pub fn status(&self) -> String {
        self.status.get()
    }

    /// Signal emitted on every state transition, including re-entering the
    /// same state.
    pub fn state_changed(&self) -> &Signal<ConnectionState> {
        self.state.changed()
    }

    /// Signal emitted whenever the status text is replaced.
    pub fn status_changed(&self) -> &Signal<String> {
        self.status.changed()
    }

    pub(crate) fn set_status(&self, text: impl Into<String>) {
        self.status.set_if_changed(text.into());
    }

    pub(crate) fn transition(&self, next: ConnectionState) {
        let previous = self.state.with(|state| *state);
        tracing::info!(target: targets::CONTROLLER, "{previous} => {next}");
        self.state.publish(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_initial_state() {
        let board = StatusBoard::new();
        assert_eq!(board.state(), ConnectionState::Closed);
        assert_eq!(board.status(), "The device is in Closed state.");
    }

    #[test]
    fn test_transition_notifies_every_time() {
        let board = StatusBoard::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        board
            .state_changed()
            .connect(move |&state| seen_clone.lock().push(state));

        board.transition(ConnectionState::Fault);
        board.transition(ConnectionState::Fault);
        board.transition(ConnectionState::Closed);

        assert_eq!(
            *seen.lock(),
            vec![
                ConnectionState::Fault,
                ConnectionState::Fault,
                ConnectionState::Closed
            ]
        );
        assert_eq!(board.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_status_only_notifies_on_change() {
        let board = StatusBoard::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = count.clone();
        board.status_changed().connect(move |_| *count_clone.lock() += 1);

        board.set_status("socket closed on server side?");
        board.set_status("socket closed on server side?");
        assert_eq!(*count.lock(), 1);
    }
}
