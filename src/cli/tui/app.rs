//! TUI application state and logic.

use crate::core::{ControllerHandle, Intent, Snapshot};

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Select,
    Erase,
    Confirm,
    Cancel,
    Refresh,
}

/// Main TUI application state.
///
/// The workflow itself lives in the controller; this only keeps the latest
/// snapshot plus purely visual state such as the cursor.
pub struct TuiApp {
    handle: ControllerHandle,
    pub snapshot: Snapshot,
    pub cursor: usize,
    pub simulation: bool,
    pub running: bool,
    /// Transient message from the TUI itself, shown next to the status.
    pub hint: Option<String>,
}

impl TuiApp {
    pub fn new(handle: ControllerHandle, simulation: bool) -> Self {
        let snapshot = handle.snapshot();
        Self {
            handle,
            snapshot,
            cursor: 0,
            simulation,
            running: true,
            hint: None,
        }
    }

    /// Pick up the latest snapshot published by the controller.
    pub fn sync(&mut self) {
        self.snapshot = self.handle.snapshot();
        self.clamp_cursor();
    }

    /// Handle an action and update state accordingly.
    pub async fn handle_action(&mut self, action: Action) {
        self.hint = None;

        let intent = match action {
            Action::Quit => {
                if self.snapshot.is_erasing() {
                    self.hint = Some("Erase in progress, wait for it to finish".to_string());
                } else {
                    self.running = false;
                }
                return;
            }
            Action::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                return;
            }
            Action::Down => {
                if self.cursor + 1 < self.snapshot.devices.len() {
                    self.cursor += 1;
                }
                return;
            }
            Action::Select => match self.snapshot.devices.get(self.cursor) {
                Some(device) => Intent::Select(device.device_name.clone()),
                None => return,
            },
            Action::Erase => Intent::RequestConfirm,
            Action::Confirm => Intent::Confirm,
            Action::Cancel => Intent::Cancel,
            Action::Refresh => Intent::Refresh,
        };

        if let Err(e) = self.handle.send(intent).await {
            self.hint = Some(e.to_string());
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.snapshot.devices.len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::adapters::{sample_devices, simulated};
    use crate::core::{Controller, DeviceSet, EpisodeId, WorkflowState};

    fn app() -> TuiApp {
        let (enumerator, backend, _sim) = simulated(sample_devices());
        let (_controller, handle) = Controller::new(Arc::new(enumerator), Arc::new(backend));
        let mut app = TuiApp::new(handle, true);
        app.snapshot.devices = sample_devices();
        app
    }

    #[tokio::test]
    async fn cursor_stays_within_device_list() {
        let mut app = app();

        app.handle_action(Action::Up).await;
        assert_eq!(app.cursor, 0);

        for _ in 0..5 {
            app.handle_action(Action::Down).await;
        }
        assert_eq!(app.cursor, 2);
    }

    #[test]
    fn cursor_is_pulled_back_when_list_shrinks() {
        let mut app = app();
        app.cursor = 2;
        app.snapshot.devices.truncate(1);

        app.clamp_cursor();

        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn quit_is_refused_while_erasing() {
        let mut app = app();
        app.snapshot.state = WorkflowState::Erasing {
            episode: EpisodeId::new(),
            devices: DeviceSet::single("/dev/sda"),
            started_at: Utc::now(),
        };

        app.handle_action(Action::Quit).await;

        assert!(app.running);
        assert!(app.hint.is_some());
    }

    #[tokio::test]
    async fn quit_while_browsing_stops_the_loop() {
        let mut app = app();

        app.handle_action(Action::Quit).await;

        assert!(!app.running);
    }
}
