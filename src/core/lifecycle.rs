//! Start, stop, restart and toggle of the acquisition session.

use crate::common::logging_setup::LogSink;
use crate::core::acquisition::{AcquisitionOrchestrator, SessionCloser, SessionContext, SessionEvent};
use crate::core::capture_writer::CaptureWriter;
use crate::core::sensor::SensorRunState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What the operator asked the sensors to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorMode {
    Capture,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Sensors are being stopped in the background.
    Stopping,
    /// A fresh session is being started in the background.
    Restarting,
    /// A previous toggle is still running.
    RejectedBusy,
    /// Disabling needs at least one running sensor.
    RejectedNotRunning,
    /// Enabling needs both sensors stopped and every loop of the previous
    /// session gone.
    RejectedStillRunning,
}

struct ActiveSession {
    context: SessionContext,
    thermal: JoinHandle<()>,
    visible: JoinHandle<()>,
}

pub struct LifecycleController {
    orchestrator: Arc<AcquisitionOrchestrator>,
    capture: Arc<CaptureWriter>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: Mutex<LifecycleState>,
    mode: Mutex<SensorMode>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    toggle_busy: AtomicBool,
    toggle_task: Mutex<Option<JoinHandle<()>>>,
    /// Loops of earlier sessions that outlived their join bound.
    lingering: Mutex<Vec<JoinHandle<()>>>,
    join_timeout: Duration,
    log: LogSink,
}

/// Joins a task for at most `bound`. A task still alive afterwards is handed
/// back so the caller can keep track of it.
async fn join_bounded(what: &str, mut handle: JoinHandle<()>, bound: Duration) -> Option<JoinHandle<()>> {
    match tokio::time::timeout(bound, &mut handle).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!("❌ {} task ended abnormally: {}", what, e);
            None
        }
        Err(_) => {
            warn!("⏱️ {} task still alive after {:?}, proceeding.", what, bound);
            Some(handle)
        }
    }
}

impl LifecycleController {
    /// Returns the controller and the receiving end of its session events.
    pub fn new(
        orchestrator: Arc<AcquisitionOrchestrator>,
        capture: Arc<CaptureWriter>,
        join_timeout: Duration,
        log: LogSink,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = LifecycleController {
            orchestrator,
            capture,
            events_tx,
            state: Mutex::new(LifecycleState::Stopped),
            mode: Mutex::new(SensorMode::Capture),
            session: tokio::sync::Mutex::new(None),
            toggle_busy: AtomicBool::new(false),
            toggle_task: Mutex::new(None),
            lingering: Mutex::new(Vec::new()),
            join_timeout,
            log,
        };
        (controller, events_rx)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn mode(&self) -> SensorMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn toggle_in_flight(&self) -> bool {
        self.toggle_busy.load(Ordering::Acquire)
    }

    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Whether a loop from an earlier session is still running. Such a loop
    /// still owns the devices and run states until it exits.
    pub fn has_lingering_loops(&self) -> bool {
        let mut lingering = self.lingering.lock().unwrap_or_else(PoisonError::into_inner);
        lingering.retain(|handle| !handle.is_finished());
        !lingering.is_empty()
    }

    /// Spawns both acquisition loops under a fresh session. Returns `false`
    /// if a session is already active or a previous loop has not exited yet.
    pub async fn start(&self) -> bool {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            self.log.scope(|| warn!("⚠️ Acquisition already running, start ignored."));
            return false;
        }
        if self.has_lingering_loops() {
            self.log
                .scope(|| warn!("⚠️ A loop of the previous session is still running, start refused."));
            return false;
        }
        self.set_state(LifecycleState::Starting);
        let context = SessionContext::new(SessionCloser::new(self.events_tx.clone()));
        let thermal = self.orchestrator.spawn_thermal(context.clone());
        let visible = self.orchestrator.spawn_visible(context.clone());
        *slot = Some(ActiveSession {
            context,
            thermal,
            visible,
        });
        self.set_state(LifecycleState::Running);
        self.log.scope(|| info!("🚀 Acquisition session started."));
        true
    }

    /// Stops the active session. With `full_close` any loop still parked in
    /// the handshake is woken so it can observe the stop.
    ///
    /// Returns `false` when there was nothing to stop.
    pub async fn stop(&self, full_close: bool) -> bool {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            self.log.scope(|| debug!("No active session, stop ignored."));
            return false;
        };
        self.set_state(LifecycleState::Stopping);
        self.log
            .attach(async {
                info!("🛑 Stopping acquisition (full close: {}).", full_close);
                session.context.disable();
                if full_close {
                    session.context.handshake().force_release();
                }
                let bound = self.join_timeout;
                let loops = vec![
                    join_bounded("IR loop", session.thermal, bound),
                    join_bounded("VIS loop", session.visible, bound),
                ];
                let stragglers: Vec<_> = futures::future::join_all(loops).await.into_iter().flatten().collect();
                if !stragglers.is_empty() {
                    self.lingering
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(stragglers);
                }
                if let Some(Err(e)) = self.capture.join_in_flight(bound).await {
                    warn!("⚠️ In-flight save ended with an error: {}", e);
                }

                let placeholders = self.orchestrator.store().reset();
                let presenter = self.orchestrator.presenter();
                presenter.present_visible(&placeholders.visible);
                presenter.present_thermal(&placeholders.thermal_processed);
                info!("✅ Acquisition stopped.");
            })
            .await;
        self.set_state(LifecycleState::Stopped);
        true
    }

    /// Starts a new session with fresh tasks and fresh synchronization state.
    pub async fn restart(&self) -> bool {
        self.start().await
    }

    /// Stops everything and closes the visible device. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        let pending = self.toggle_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = pending {
            self.log
                .attach(join_bounded("Toggle", handle, self.join_timeout))
                .await;
        }
        self.stop(true).await;
        let lingering: Vec<_> = self
            .lingering
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if !lingering.is_empty() {
            let bound = self.join_timeout;
            self.log
                .attach(futures::future::join_all(
                    lingering.into_iter().map(|handle| join_bounded("Lingering loop", handle, bound)),
                ))
                .await;
        }
        self.orchestrator.close_visible().await;
        self.log.scope(|| info!("👋 Acquisition shut down."));
    }

    /// Flips between capturing and disabled. The stop or restart runs in the
    /// background; a toggle pressed while one is still running is rejected.
    pub async fn toggle(self: &Arc<Self>) -> ToggleOutcome {
        if self.toggle_busy.swap(true, Ordering::AcqRel) {
            self.log.scope(|| info!("⏳ The sensor toggle is busy."));
            return ToggleOutcome::RejectedBusy;
        }

        let any_running = self.orchestrator.thermal_state() == SensorRunState::Running
            || self.orchestrator.visible_state() == SensorRunState::Running;
        let mode = self.mode();
        let rejection = match mode {
            SensorMode::Capture if !any_running => Some(ToggleOutcome::RejectedNotRunning),
            SensorMode::Disabled if any_running || self.has_lingering_loops() => {
                Some(ToggleOutcome::RejectedStillRunning)
            }
            _ => None,
        };
        if let Some(rejection) = rejection {
            self.log.scope(|| warn!("⚠️ Toggle rejected in mode {:?}: {:?}", mode, rejection));
            self.toggle_busy.store(false, Ordering::Release);
            return rejection;
        }

        let stale = self.toggle_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = stale {
            self.log
                .attach(join_bounded("Previous toggle", handle, self.join_timeout))
                .await;
        }

        self.orchestrator.plugins().clear();
        let (next_mode, outcome) = match mode {
            SensorMode::Capture => (SensorMode::Disabled, ToggleOutcome::Stopping),
            SensorMode::Disabled => (SensorMode::Capture, ToggleOutcome::Restarting),
        };
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = next_mode;
        self.log.scope(|| info!("🔁 Sensors toggled to {:?}.", next_mode));

        let this = Arc::clone(self);
        let handle = tokio::spawn(self.log.attach(async move {
            match outcome {
                ToggleOutcome::Stopping => {
                    this.stop(false).await;
                }
                _ => {
                    this.restart().await;
                }
            }
            this.toggle_busy.store(false, Ordering::Release);
        }));
        *self.toggle_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        outcome
    }
}
