//! Wiring of the acquisition components and the intent loop that drives
//! them until the session closes.

use crate::common::logging_setup::LogSink;
use crate::config_loader::MasterConfig;
use crate::core::acquisition::{AcquisitionOrchestrator, AcquisitionParts, SessionEvent};
use crate::core::capture_writer::{CaptureSettings, CaptureWriter};
use crate::core::frame_store::FrameStore;
use crate::core::lifecycle::{LifecycleController, SensorMode, ToggleOutcome};
use crate::core::plugin::{PluginRegistry, PluginSelector};
use crate::core::presenter::FramePresenter;
use crate::core::sensor::{SharedThermal, SharedVisible};
use crate::errors::AppError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Dispatch};

/// Operator requests, as delivered by whatever surface is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    RequestSave,
    ToggleSensors,
    SelectPlugin(Option<String>),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    UserRequest,
    SessionFailure(SessionEvent),
}

pub struct StationParts {
    pub thermal: SharedThermal,
    pub visible: SharedVisible,
    pub registry: PluginRegistry,
    pub presenter: Arc<dyn FramePresenter>,
}

pub struct Station {
    orchestrator: Arc<AcquisitionOrchestrator>,
    lifecycle: Arc<LifecycleController>,
    capture: Arc<CaptureWriter>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    log: LogSink,
}

enum Next {
    Failure(SessionEvent),
    Intent(Option<UserIntent>),
}

impl Station {
    pub fn new(config: &MasterConfig, parts: StationParts, dispatch: Dispatch) -> Self {
        let log = LogSink::new(dispatch, "station");
        let cameras = &config.cameras;
        let store = Arc::new(FrameStore::new(cameras.visible.resolution, cameras.thermal.resolution));
        let plugins = Arc::new(PluginSelector::new(parts.registry));
        let timeouts = config.app_settings.timeouts.clone();

        let orchestrator = Arc::new(AcquisitionOrchestrator::new(
            AcquisitionParts {
                thermal: parts.thermal,
                visible: Arc::clone(&parts.visible),
                store: Arc::clone(&store),
                plugins: Arc::clone(&plugins),
                presenter: parts.presenter,
            },
            cameras.thermal.queue_depth,
            timeouts.clone(),
            log.child("acquisition"),
        ));
        let capture = Arc::new(CaptureWriter::new(
            CaptureSettings::from(&config.app_settings),
            store,
            plugins,
            parts.visible,
            log.child("capture"),
        ));
        let (lifecycle, events) = LifecycleController::new(
            Arc::clone(&orchestrator),
            Arc::clone(&capture),
            timeouts.join(),
            log.child("lifecycle"),
        );

        Station {
            orchestrator,
            lifecycle: Arc::new(lifecycle),
            capture,
            events,
            log,
        }
    }

    pub fn orchestrator(&self) -> &Arc<AcquisitionOrchestrator> {
        &self.orchestrator
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    pub fn capture(&self) -> &Arc<CaptureWriter> {
        &self.capture
    }

    /// Opens the visible device and starts the first session.
    pub async fn start(&self) -> Result<(), AppError> {
        self.orchestrator.open_visible().await?;
        self.lifecycle.start().await;
        Ok(())
    }

    /// Handles every intent except [`UserIntent::Close`], which only
    /// [`Station::run`] acts on.
    pub async fn handle_intent(&self, intent: UserIntent) {
        match intent {
            UserIntent::RequestSave => {
                if self.lifecycle.mode() == SensorMode::Disabled {
                    self.log.scope(|| info!("Sensors are disabled, nothing to save."));
                } else {
                    self.capture.request_save();
                }
            }
            UserIntent::ToggleSensors => {
                let outcome = self.lifecycle.toggle().await;
                if matches!(outcome, ToggleOutcome::Stopping | ToggleOutcome::Restarting) {
                    self.log.scope(|| info!("Toggle accepted: {:?}", outcome));
                }
            }
            UserIntent::SelectPlugin(name) => match self.orchestrator.plugins().select(name.as_deref()) {
                Ok(()) => self.log.scope(|| info!("🧩 Active plugin: {}", name.as_deref().unwrap_or("None"))),
                Err(e) => self.log.scope(|| warn!("⚠️ {}", e)),
            },
            UserIntent::Close => {}
        }
    }

    /// Serves intents until the operator closes the station or a session
    /// fails, then shuts down exactly once.
    pub async fn run(mut self, mut intents: mpsc::Receiver<UserIntent>) -> CloseReason {
        let reason = loop {
            let next = tokio::select! {
                Some(event) = self.events.recv() => Next::Failure(event),
                intent = intents.recv() => Next::Intent(intent),
            };
            match next {
                Next::Failure(event) => {
                    self.log
                        .scope(|| error!("💥 Session failure reported by {}: {}", event.sensor, event.reason));
                    break CloseReason::SessionFailure(event);
                }
                Next::Intent(None) | Next::Intent(Some(UserIntent::Close)) => break CloseReason::UserRequest,
                Next::Intent(Some(intent)) => self.handle_intent(intent).await,
            }
        };
        self.lifecycle.shutdown().await;
        self.orchestrator.presenter().session_closed();
        self.log.scope(|| info!("Station closed: {:?}", reason));
        reason
    }
}
