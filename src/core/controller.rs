//! Runtime driver for the erase workflow.
//!
//! The controller is a single task that owns the [`Workflow`]. Intents from
//! the presentation layer and completions from the erase backend are fed to
//! it one at a time; after each event a fresh [`Snapshot`] is published on a
//! watch channel for renderers to pick up.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::backend::EraseBackend;
use super::enumerator::DeviceEnumerator;
use super::error::{ErasureError, WorkflowError};
use super::models::{DeviceSet, EpisodeId, Snapshot};
use super::workflow::{Command, Event, Intent, Workflow};

const INTENT_QUEUE_DEPTH: usize = 32;

pub struct Controller {
    workflow: Workflow,
    enumerator: Arc<dyn DeviceEnumerator>,
    backend: Arc<dyn EraseBackend>,
    intents: mpsc::Receiver<Intent>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions: mpsc::UnboundedReceiver<Event>,
    snapshots: watch::Sender<Snapshot>,
}

/// Cloneable front door to a running [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<Snapshot>,
}

impl Controller {
    pub fn new(
        enumerator: Arc<dyn DeviceEnumerator>,
        backend: Arc<dyn EraseBackend>,
    ) -> (Self, ControllerHandle) {
        let workflow = Workflow::new();
        let (intents_tx, intents) = mpsc::channel(INTENT_QUEUE_DEPTH);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(workflow.snapshot());

        let controller = Self {
            workflow,
            enumerator,
            backend,
            intents,
            completions_tx,
            completions,
            snapshots,
        };

        let handle = ControllerHandle {
            intents: intents_tx,
            snapshots: snapshots_rx,
        };

        (controller, handle)
    }

    /// Process events until every [`ControllerHandle`] has been dropped.
    ///
    /// Performs an initial refresh first. If the handles go away while an
    /// erase is in flight, keeps running until its outcome is published.
    pub async fn run(mut self) {
        info!("Erase workflow controller starting");

        self.dispatch(Intent::Refresh.into()).await;

        let mut intents_open = true;

        loop {
            tokio::select! {
                intent = self.intents.recv(), if intents_open => match intent {
                    Some(intent) => self.dispatch(intent.into()).await,
                    None => {
                        debug!("All controller handles dropped");
                        intents_open = false;
                    }
                },
                Some(event) = self.completions.recv() => self.dispatch(event).await,
            }

            if !intents_open {
                if self.workflow.state().is_erasing() {
                    info!("Waiting for in-flight erase before stopping");
                } else {
                    break;
                }
            }
        }

        info!("Erase workflow controller stopped");
    }

    async fn dispatch(&mut self, event: Event) {
        let mut next = Some(event);

        while let Some(event) = next.take() {
            let name = event.name();

            match self.workflow.handle(event) {
                Ok(Some(Command::Enumerate)) => {
                    let result = self.enumerator.refresh().await;
                    match &result {
                        Ok(devices) => debug!(count = devices.len(), "Device list refreshed"),
                        Err(e) => warn!(error = %e, "Device enumeration failed"),
                    }
                    next = Some(Event::DevicesLoaded(result));
                }
                Ok(Some(Command::Erase { episode, devices })) => {
                    self.spawn_erase(episode, devices);
                }
                Ok(None) => debug!(event = name, state = self.workflow.state().name(), "Event applied"),
                Err(e @ WorkflowError::NotAllowed { .. }) | Err(e @ WorkflowError::StaleEpisode(_)) => {
                    debug!(event = name, reason = %e, "Event ignored");
                }
                Err(e) => warn!(event = name, error = %e, "Event rejected"),
            }

            self.publish();
        }
    }

    fn spawn_erase(&self, episode: EpisodeId, devices: DeviceSet) {
        let backend = self.backend.clone();
        let completions = self.completions_tx.clone();
        let span = info_span!("erase_episode", episode = %episode, devices = %devices);

        tokio::spawn(
            async move {
                info!("Erase started");

                // Run the backend in its own task so a panic still produces a
                // completion and the workflow can leave `Erasing`.
                let call = tokio::spawn(
                    async move { backend.erase(&devices).await }.in_current_span(),
                );
                let result = match call.await {
                    Ok(result) => result,
                    Err(e) => Err(ErasureError::Failed(format!("erase task aborted: {e}"))),
                };

                match &result {
                    Ok(message) => info!(message = %message, "Erase finished"),
                    Err(e) => error!(error = %e, "Erase failed"),
                }

                if completions
                    .send(Event::EraseFinished { episode, result })
                    .is_err()
                {
                    warn!("Controller gone before erase completion was delivered");
                }
            }
            .instrument(span),
        );
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.workflow.snapshot());
    }
}

impl ControllerHandle {
    /// Queue an intent for the controller.
    pub async fn send(&self, intent: Intent) -> Result<()> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| anyhow!("erase controller has stopped"))
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&Snapshot) -> bool) -> Result<Snapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| anyhow!("erase controller has stopped"))?;
        Ok(snapshot.clone())
    }
}
