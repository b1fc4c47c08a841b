//! The erase workflow state machine.
//!
//! `Workflow::handle` is the only place the device list, the selection and
//! the workflow state change. It performs no I/O: side effects are returned
//! as a [`Command`] for the controller to execute, and their results come
//! back in as further [`Event`]s.

use chrono::Utc;

use super::error::{EnumerationError, ErasureError, WorkflowError};
use super::models::{
    DeviceDescriptor, DeviceSet, EpisodeId, EpisodeReport, Snapshot, Status, WorkflowState,
};

/// User intents forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Select(String),
    Refresh,
    RequestConfirm,
    Cancel,
    Confirm,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Refresh => "refresh",
            Self::RequestConfirm => "request_confirm",
            Self::Cancel => "cancel",
            Self::Confirm => "confirm",
        }
    }
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    Intent(Intent),
    DevicesLoaded(Result<Vec<DeviceDescriptor>, EnumerationError>),
    EraseFinished {
        episode: EpisodeId,
        result: Result<String, ErasureError>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Intent(intent) => intent.name(),
            Self::DevicesLoaded(_) => "devices_loaded",
            Self::EraseFinished { .. } => "erase_finished",
        }
    }
}

impl From<Intent> for Event {
    fn from(intent: Intent) -> Self {
        Self::Intent(intent)
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Call the device enumerator and feed back `DevicesLoaded`.
    Enumerate,
    /// Call the erase backend exactly once and feed back `EraseFinished`.
    Erase {
        episode: EpisodeId,
        devices: DeviceSet,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    devices: Vec<DeviceDescriptor>,
    selection: Option<String>,
    state: WorkflowState,
    status: Option<Status>,
    last_episode: Option<EpisodeReport>,
}

impl Workflow {
    /// Empty device list, no selection, browsing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            devices: self.devices.clone(),
            selection: self.selection.clone(),
            status: self.status.clone(),
            last_episode: self.last_episode.clone(),
        }
    }

    /// Apply one event. On `Err` nothing changed except, where noted, the
    /// status line.
    pub fn handle(&mut self, event: Event) -> Result<Option<Command>, WorkflowError> {
        match event {
            Event::Intent(intent) => self.handle_intent(intent),
            Event::DevicesLoaded(result) => self.devices_loaded(result),
            Event::EraseFinished { episode, result } => self.erase_finished(episode, result),
        }
    }

    fn handle_intent(&mut self, intent: Intent) -> Result<Option<Command>, WorkflowError> {
        match intent {
            Intent::Select(name) if self.state.is_browsing() => self.select(name),
            Intent::Refresh if self.state.is_browsing() => Ok(Some(Command::Enumerate)),
            Intent::RequestConfirm if self.state.is_browsing() => self.request_confirm(),
            Intent::Cancel if self.state.is_confirming() => {
                self.state = WorkflowState::Browsing;
                self.status = None;
                Ok(None)
            }
            Intent::Confirm if self.state.is_confirming() => self.confirm(),
            intent => Err(WorkflowError::NotAllowed {
                event: intent.name(),
                state: self.state.name(),
            }),
        }
    }

    fn select(&mut self, name: String) -> Result<Option<Command>, WorkflowError> {
        if !self.devices.iter().any(|d| d.device_name == name) {
            return Err(WorkflowError::UnknownDevice(name));
        }

        self.selection = Some(name);
        self.status = None;
        Ok(None)
    }

    fn request_confirm(&mut self) -> Result<Option<Command>, WorkflowError> {
        if self.selection.is_none() {
            let err = WorkflowError::SelectionMissing;
            self.status = Some(Status::Error(err.to_string()));
            return Err(err);
        }

        self.state = WorkflowState::Confirming;
        self.status = None;
        Ok(None)
    }

    fn confirm(&mut self) -> Result<Option<Command>, WorkflowError> {
        let Some(name) = self.selection.clone() else {
            let err = WorkflowError::SelectionMissing;
            self.state = WorkflowState::Browsing;
            self.status = Some(Status::Error(err.to_string()));
            return Err(err);
        };

        let episode = EpisodeId::new();
        let devices = DeviceSet::single(name);

        self.status = Some(Status::Info(format!("Erasing {devices}...")));
        self.state = WorkflowState::Erasing {
            episode,
            devices: devices.clone(),
            started_at: Utc::now(),
        };

        Ok(Some(Command::Erase { episode, devices }))
    }

    fn devices_loaded(
        &mut self,
        result: Result<Vec<DeviceDescriptor>, EnumerationError>,
    ) -> Result<Option<Command>, WorkflowError> {
        if !self.state.is_browsing() {
            return Err(WorkflowError::NotAllowed {
                event: "devices_loaded",
                state: self.state.name(),
            });
        }

        match result {
            Ok(devices) => {
                self.devices = devices;
                self.status = None;

                let stale = self
                    .selection
                    .as_deref()
                    .is_some_and(|name| !self.devices.iter().any(|d| d.device_name == name));

                if stale {
                    if let Some(name) = self.selection.take() {
                        self.status = Some(Status::Notice(format!(
                            "{name} is no longer present; selection cleared"
                        )));
                    }
                }
            }
            Err(e) => {
                self.status = Some(Status::Error(format!("Failed to enumerate devices: {e}")));
            }
        }

        Ok(None)
    }

    fn erase_finished(
        &mut self,
        episode: EpisodeId,
        result: Result<String, ErasureError>,
    ) -> Result<Option<Command>, WorkflowError> {
        match std::mem::take(&mut self.state) {
            WorkflowState::Erasing {
                episode: current,
                devices,
                started_at,
            } if current == episode => {
                let (succeeded, message, status) = match result {
                    Ok(message) => (true, message.clone(), Status::Info(message)),
                    Err(e) => (false, e.to_string(), Status::Error(e.to_string())),
                };

                // The selection is kept so a failed erase can be retried.
                self.status = Some(status);
                self.last_episode = Some(EpisodeReport {
                    episode,
                    devices,
                    succeeded,
                    message,
                    started_at,
                    finished_at: Utc::now(),
                });

                Ok(None)
            }
            other => {
                let err = if other.is_erasing() {
                    WorkflowError::StaleEpisode(episode)
                } else {
                    WorkflowError::NotAllowed {
                        event: "erase_finished",
                        state: other.name(),
                    }
                };
                self.state = other;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::DeviceType;

    fn sda() -> DeviceDescriptor {
        DeviceDescriptor::new("sda", "X", DeviceType::Hdd, "SATA")
    }

    fn sdb() -> DeviceDescriptor {
        DeviceDescriptor::new("sdb", "Y", DeviceType::Ssd, "SATA")
    }

    fn loaded(devices: Vec<DeviceDescriptor>) -> Workflow {
        let mut wf = Workflow::new();
        wf.handle(Event::DevicesLoaded(Ok(devices))).unwrap();
        wf
    }

    fn confirming() -> Workflow {
        let mut wf = loaded(vec![sda()]);
        wf.handle(Intent::Select("sda".into()).into()).unwrap();
        wf.handle(Intent::RequestConfirm.into()).unwrap();
        wf
    }

    fn erasing() -> (Workflow, EpisodeId) {
        let mut wf = confirming();
        match wf.handle(Intent::Confirm.into()).unwrap() {
            Some(Command::Erase { episode, .. }) => (wf, episode),
            other => panic!("expected erase command, got {other:?}"),
        }
    }

    #[test]
    fn starts_empty_and_browsing() {
        let snapshot = Workflow::new().snapshot();
        assert_eq!(snapshot, Snapshot::default());
        assert!(snapshot.state.is_browsing());
    }

    #[test]
    fn select_sets_selection_and_clears_status() {
        let mut wf = loaded(vec![sda()]);
        wf.status = Some(Status::Info("old".into()));

        assert_eq!(wf.handle(Intent::Select("sda".into()).into()), Ok(None));

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.selection.as_deref(), Some("sda"));
        assert_eq!(snapshot.status, None);
    }

    #[test]
    fn select_unknown_device_is_rejected() {
        let mut wf = loaded(vec![sda()]);

        let err = wf.handle(Intent::Select("sdz".into()).into()).unwrap_err();

        assert_eq!(err, WorkflowError::UnknownDevice("sdz".into()));
        assert_eq!(wf.snapshot().selection, None);
    }

    #[test]
    fn refresh_requests_enumeration_only_while_browsing() {
        let mut wf = loaded(vec![sda()]);
        assert_eq!(
            wf.handle(Intent::Refresh.into()),
            Ok(Some(Command::Enumerate))
        );

        let mut wf = confirming();
        assert!(matches!(
            wf.handle(Intent::Refresh.into()),
            Err(WorkflowError::NotAllowed { event: "refresh", state: "confirming" })
        ));
    }

    #[test]
    fn request_confirm_without_selection_sets_error() {
        let mut wf = Workflow::new();

        let err = wf.handle(Intent::RequestConfirm.into()).unwrap_err();

        assert_eq!(err, WorkflowError::SelectionMissing);
        let snapshot = wf.snapshot();
        assert!(snapshot.state.is_browsing());
        assert!(snapshot.devices.is_empty());
        assert_eq!(snapshot.status, Some(Status::Error("No device selected".into())));
    }

    #[test]
    fn request_confirm_with_selection_enters_confirming() {
        let wf = confirming();
        assert!(wf.state().is_confirming());
    }

    #[test]
    fn cancel_returns_to_browsing_and_keeps_selection() {
        let mut wf = confirming();

        assert_eq!(wf.handle(Intent::Cancel.into()), Ok(None));

        let snapshot = wf.snapshot();
        assert!(snapshot.state.is_browsing());
        assert_eq!(snapshot.selection.as_deref(), Some("sda"));
        assert_eq!(snapshot.status, None);
    }

    #[test]
    fn confirm_from_browsing_is_rejected() {
        let mut wf = loaded(vec![sda()]);
        wf.handle(Intent::Select("sda".into()).into()).unwrap();

        let err = wf.handle(Intent::Confirm.into()).unwrap_err();

        assert_eq!(
            err,
            WorkflowError::NotAllowed {
                event: "confirm",
                state: "browsing"
            }
        );
        assert!(wf.state().is_browsing());
    }

    #[test]
    fn confirm_enters_erasing_with_one_erase_command() {
        let (wf, episode) = erasing();

        match wf.state() {
            WorkflowState::Erasing {
                episode: current,
                devices,
                ..
            } => {
                assert_eq!(*current, episode);
                assert_eq!(devices.names(), ["sda"]);
            }
            other => panic!("expected erasing, got {other:?}"),
        }
        assert_eq!(wf.snapshot().status, Some(Status::Info("Erasing sda...".into())));
    }

    #[test]
    fn intents_during_erase_are_not_allowed() {
        let (mut wf, _) = erasing();
        let before = wf.snapshot();

        for intent in [
            Intent::Confirm,
            Intent::Refresh,
            Intent::Select("sda".into()),
            Intent::RequestConfirm,
            Intent::Cancel,
        ] {
            assert!(matches!(
                wf.handle(intent.into()),
                Err(WorkflowError::NotAllowed { state: "erasing", .. })
            ));
        }

        assert_eq!(wf.snapshot(), before);
    }

    #[test]
    fn erase_success_returns_to_browsing_with_message() {
        let (mut wf, episode) = erasing();

        wf.handle(Event::EraseFinished {
            episode,
            result: Ok("sda erased".into()),
        })
        .unwrap();

        let snapshot = wf.snapshot();
        assert!(snapshot.state.is_browsing());
        assert_eq!(snapshot.status, Some(Status::Info("sda erased".into())));
        assert_eq!(snapshot.selection.as_deref(), Some("sda"));

        let report = snapshot.last_episode.unwrap();
        assert!(report.succeeded);
        assert_eq!(report.episode, episode);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn erase_failure_keeps_selection_for_retry() {
        let (mut wf, episode) = erasing();

        wf.handle(Event::EraseFinished {
            episode,
            result: Err(ErasureError::Failed("device busy".into())),
        })
        .unwrap();

        let snapshot = wf.snapshot();
        assert!(snapshot.state.is_browsing());
        assert_eq!(snapshot.status, Some(Status::Error("device busy".into())));
        assert_eq!(snapshot.selection.as_deref(), Some("sda"));
        assert!(!snapshot.last_episode.unwrap().succeeded);
    }

    #[test]
    fn completion_for_another_episode_is_ignored() {
        let (mut wf, _) = erasing();

        let stray = EpisodeId::new();
        let err = wf
            .handle(Event::EraseFinished {
                episode: stray,
                result: Ok("done".into()),
            })
            .unwrap_err();

        assert_eq!(err, WorkflowError::StaleEpisode(stray));
        assert!(wf.state().is_erasing());
    }

    #[test]
    fn completion_while_browsing_is_ignored() {
        let mut wf = loaded(vec![sda()]);

        assert!(matches!(
            wf.handle(Event::EraseFinished {
                episode: EpisodeId::new(),
                result: Ok("done".into()),
            }),
            Err(WorkflowError::NotAllowed { state: "browsing", .. })
        ));
        assert!(wf.snapshot().last_episode.is_none());
    }

    #[test]
    fn refresh_replaces_list_and_clears_status() {
        let mut wf = loaded(vec![sda()]);
        wf.status = Some(Status::Info("sda erased".into()));

        wf.handle(Event::DevicesLoaded(Ok(vec![sda(), sdb()]))).unwrap();

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.devices, vec![sda(), sdb()]);
        assert_eq!(snapshot.status, None);
    }

    #[test]
    fn refresh_keeps_selection_still_present() {
        let mut wf = loaded(vec![sda(), sdb()]);
        wf.handle(Intent::Select("sdb".into()).into()).unwrap();

        wf.handle(Event::DevicesLoaded(Ok(vec![sdb()]))).unwrap();

        assert_eq!(wf.snapshot().selection.as_deref(), Some("sdb"));
    }

    #[test]
    fn refresh_clears_vanished_selection_with_notice() {
        let mut wf = loaded(vec![sda(), sdb()]);
        wf.handle(Intent::Select("sda".into()).into()).unwrap();

        wf.handle(Event::DevicesLoaded(Ok(vec![sdb()]))).unwrap();

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.selection, None);
        assert!(matches!(snapshot.status, Some(Status::Notice(ref text)) if text.contains("sda")));
    }

    #[test]
    fn failed_refresh_keeps_previous_list() {
        let mut wf = loaded(vec![sda()]);
        wf.handle(Intent::Select("sda".into()).into()).unwrap();

        wf.handle(Event::DevicesLoaded(Err(EnumerationError::Unavailable(
            "permission denied".into(),
        ))))
        .unwrap();

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.devices, vec![sda()]);
        assert_eq!(snapshot.selection.as_deref(), Some("sda"));
        assert_eq!(
            snapshot.status,
            Some(Status::Error(
                "Failed to enumerate devices: permission denied".into()
            ))
        );
    }

    #[test]
    fn device_list_is_frozen_outside_browsing() {
        let (mut wf, _) = erasing();

        let err = wf.handle(Event::DevicesLoaded(Ok(vec![]))).unwrap_err();

        assert!(matches!(err, WorkflowError::NotAllowed { event: "devices_loaded", .. }));
        assert_eq!(wf.snapshot().devices, vec![sda()]);
    }
}
