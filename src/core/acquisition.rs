//! The two acquisition loops.
//!
//! Each loop runs as its own task and pulls frames from its sensor. Blocking
//! driver calls go through the blocking pool. The loops meet once at
//! startup through the [`Handshake`]; after that they only share the
//! [`FrameStore`].

use crate::app_config::TimeoutSettings;
use crate::common::logging_setup::LogSink;
use crate::core::frame::{raw_to_display, Frame, Gray16Image};
use crate::core::frame_queue::{self, QueueError};
use crate::core::frame_store::{FrameStore, ThermalProducts};
use crate::core::handshake::Handshake;
use crate::core::plugin::{PluginSelector, SharedTransform};
use crate::core::presenter::FramePresenter;
use crate::core::sensor::{
    with_sensor, RunStateCell, SensorKind, SensorRunState, SharedThermal, SharedVisible,
};
use crate::errors::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A session-ending failure reported by one of the loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub sensor: SensorKind,
    pub reason: String,
}

/// Reports at most one [`SessionEvent`] per session.
#[derive(Debug, Clone)]
pub struct SessionCloser {
    requested: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionCloser {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        SessionCloser {
            requested: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Returns `false` if a close was already requested for this session.
    pub fn request_close(&self, sensor: SensorKind, reason: impl Into<String>) -> bool {
        if self.requested.swap(true, Ordering::AcqRel) {
            debug!("Close already requested for this session, ignoring {} report.", sensor);
            return false;
        }
        // The receiver is gone only while the process is tearing down.
        let _ = self.tx.send(SessionEvent { sensor, reason: reason.into() });
        true
    }
}

/// Per-session state shared by both loops.
#[derive(Debug, Clone)]
pub struct SessionContext {
    enabled: Arc<AtomicBool>,
    handshake: Arc<Handshake>,
    closer: SessionCloser,
}

impl SessionContext {
    pub fn new(closer: SessionCloser) -> Self {
        SessionContext {
            enabled: Arc::new(AtomicBool::new(true)),
            handshake: Arc::new(Handshake::new()),
            closer,
        }
    }

    /// Cooperative cancellation flag, polled once per loop iteration.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn closer(&self) -> &SessionCloser {
        &self.closer
    }
}

/// Everything the orchestrator reads from or writes to.
pub struct AcquisitionParts {
    pub thermal: SharedThermal,
    pub visible: SharedVisible,
    pub store: Arc<FrameStore>,
    pub plugins: Arc<PluginSelector>,
    pub presenter: Arc<dyn FramePresenter>,
}

pub struct AcquisitionOrchestrator {
    thermal: SharedThermal,
    visible: SharedVisible,
    store: Arc<FrameStore>,
    plugins: Arc<PluginSelector>,
    presenter: Arc<dyn FramePresenter>,
    thermal_state: RunStateCell,
    visible_state: RunStateCell,
    visible_open: AtomicBool,
    queue_depth: usize,
    timeouts: TimeoutSettings,
    thermal_log: LogSink,
    visible_log: LogSink,
}

impl AcquisitionOrchestrator {
    pub fn new(parts: AcquisitionParts, queue_depth: usize, timeouts: TimeoutSettings, log: LogSink) -> Self {
        AcquisitionOrchestrator {
            thermal: parts.thermal,
            visible: parts.visible,
            store: parts.store,
            plugins: parts.plugins,
            presenter: parts.presenter,
            thermal_state: RunStateCell::new(),
            visible_state: RunStateCell::new(),
            visible_open: AtomicBool::new(false),
            queue_depth,
            timeouts,
            thermal_log: log.child("thermal"),
            visible_log: log.child("visible"),
        }
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    pub fn plugins(&self) -> &Arc<PluginSelector> {
        &self.plugins
    }

    pub fn presenter(&self) -> &Arc<dyn FramePresenter> {
        &self.presenter
    }

    pub fn thermal_state(&self) -> SensorRunState {
        self.thermal_state.get()
    }

    pub fn visible_state(&self) -> SensorRunState {
        self.visible_state.get()
    }

    /// Opens and configures the visible sensor, retrying the open until it
    /// succeeds. A configuration failure is returned to the caller.
    pub async fn open_visible(&self) -> Result<(), AppError> {
        let log = &self.visible_log;
        let start_time = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match with_sensor(&self.visible, log, |s| s.open()).await? {
                Ok(()) => break,
                Err(e) => {
                    log.scope(|| error!("❌ The VIS cam cannot be opened (attempt {}): {}. Trying again...", attempts, e));
                    tokio::time::sleep(self.timeouts.open_retry_backoff()).await;
                }
            }
        }
        with_sensor(&self.visible, log, |s| s.configure()).await??;
        self.visible_open.store(true, Ordering::Release);
        log.scope(|| info!("📷 VIS cam opened and configured in {:?} ({} attempt(s)).", start_time.elapsed(), attempts));
        Ok(())
    }

    pub async fn close_visible(&self) {
        if !self.visible_open.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = with_sensor(&self.visible, &self.visible_log, |s| s.close()).await {
            self.visible_log.scope(|| error!("❌ Closing the VIS cam failed: {}", e));
        }
    }

    pub fn spawn_thermal(self: &Arc<Self>, session: SessionContext) -> JoinHandle<()> {
        let fut = Arc::clone(self).thermal_loop(session);
        tokio::spawn(self.thermal_log.attach(fut))
    }

    pub fn spawn_visible(self: &Arc<Self>, session: SessionContext) -> JoinHandle<()> {
        let fut = Arc::clone(self).visible_loop(session);
        tokio::spawn(self.visible_log.attach(fut))
    }

    async fn open_thermal(&self, session: &SessionContext) -> bool {
        let mut attempts = 0u32;
        while session.is_enabled() {
            attempts += 1;
            match with_sensor(&self.thermal, &self.thermal_log, |s| s.open()).await {
                Ok(Ok(())) => {
                    info!("📷 IR camera opened after {} attempt(s).", attempts);
                    return true;
                }
                Ok(Err(e)) => warn!("⚠️ Error while opening IR camera (attempt {}): {}", attempts, e),
                Err(e) => warn!("⚠️ IR open call failed (attempt {}): {}", attempts, e),
            }
            tokio::time::sleep(self.timeouts.open_retry_backoff()).await;
        }
        false
    }

    async fn close_thermal(&self, streaming: bool) {
        let result = with_sensor(&self.thermal, &self.thermal_log, move |s| {
            if streaming {
                s.stop_streaming();
            }
            s.close();
        })
        .await;
        if let Err(e) = result {
            error!("❌ Closing the IR camera failed: {}", e);
        }
    }

    async fn thermal_loop(self: Arc<Self>, session: SessionContext) {
        info!("🌡️ On IR camera loop");
        self.thermal_state.set(SensorRunState::Opening);
        if !self.open_thermal(&session).await {
            info!("IR camera loop cancelled before the device opened.");
            self.thermal_state.set(SensorRunState::Stopped);
            return;
        }

        let format = match with_sensor(&self.thermal, &self.thermal_log, |s| s.configure()).await {
            Ok(Ok(format)) => format,
            Ok(Err(e)) | Err(e) => {
                error!("❌ IR configuration failed: {}", e);
                self.close_thermal(false).await;
                self.thermal_state.set(SensorRunState::Faulted);
                return;
            }
        };
        info!("⚙️ IR stream negotiated: {}x{} @ {} fps", format.width, format.height, format.frame_rate);

        let (sink, mut queue) = frame_queue::bounded(self.queue_depth);
        match with_sensor(&self.thermal, &self.thermal_log, move |s| s.start_streaming(sink)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) | Err(e) => {
                error!("❌ IR start streaming failed: {}", e);
                self.close_thermal(false).await;
                self.thermal_state.set(SensorRunState::Faulted);
                return;
            }
        }
        self.thermal_state.set(SensorRunState::Handshaking);

        let handshake = session.handshake();
        let mut first_frame = true;
        let mut faulted = false;
        let mut frames = 0u64;
        while session.is_enabled() {
            let raw = match queue.next_frame(self.timeouts.frame_wait()).await {
                Ok(raw) => raw,
                Err(QueueError::Timeout) => {
                    warn!("⏱️ Timeout waiting for an IR frame ({:?}).", self.timeouts.frame_wait());
                    continue;
                }
                Err(QueueError::Disconnected) => {
                    error!("❌ IR frame stream disconnected.");
                    faulted = true;
                    break;
                }
            };
            if !session.is_enabled() {
                break;
            }

            if first_frame {
                self.thermal_state.set(SensorRunState::Running);
                handshake.visible.release();
                if !handshake.thermal.wait(self.timeouts.handshake()).await {
                    if session.is_enabled() {
                        error!("❌ The VIS cam has failed: no first frame within {:?}.", self.timeouts.handshake());
                        session.closer().request_close(SensorKind::Thermal, "VIS handshake timed out");
                    }
                    break;
                }
                if !session.is_enabled() {
                    break;
                }
                if self.visible_state.get() != SensorRunState::Running {
                    warn!("⚠️ The VIS cam isn't running.");
                    session.closer().request_close(SensorKind::Thermal, "VIS sensor not running after handshake");
                    break;
                }
                info!("🤝 IR handshake complete.");
                first_frame = false;
            }

            let products = process_thermal_frame(raw, self.plugins.active(), &self.thermal_log).await;
            self.presenter.present_thermal(&products.processed);
            self.store.update_thermal(products);
            frames += 1;
        }

        self.close_thermal(true).await;
        let pending = queue.drain();
        info!(
            "IR camera loop ends after {} frame(s) ({} dropped on overflow, {} discarded at stop).",
            frames,
            queue.dropped(),
            pending
        );
        self.thermal_state.set(if faulted { SensorRunState::Faulted } else { SensorRunState::Stopped });
    }

    async fn visible_loop(self: Arc<Self>, session: SessionContext) {
        info!("📷 On VISIBLE camera loop");
        self.visible_state.set(SensorRunState::Handshaking);
        let handshake = session.handshake();
        let mut first_frame = true;
        let mut faulted = false;
        let mut frames = 0u64;
        while session.is_enabled() {
            let frame = match with_sensor(&self.visible, &self.visible_log, |s| s.capture_frame()).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    warn!("⚠️ VIS capture failed: {}", e);
                    tokio::time::sleep(self.timeouts.open_retry_backoff()).await;
                    continue;
                }
                Err(e) => {
                    error!("❌ VIS capture call failed: {}", e);
                    faulted = true;
                    break;
                }
            };
            if !session.is_enabled() {
                break;
            }

            if first_frame {
                self.visible_state.set(SensorRunState::Running);
                handshake.thermal.release();
                if !handshake.visible.wait(self.timeouts.handshake()).await {
                    if session.is_enabled() {
                        error!("❌ The IR cam has failed: no first frame within {:?}.", self.timeouts.handshake());
                        session.closer().request_close(SensorKind::Visible, "IR handshake timed out");
                    }
                    break;
                }
                if !session.is_enabled() {
                    break;
                }
                if self.thermal_state.get() != SensorRunState::Running {
                    warn!("⚠️ The IR cam isn't running.");
                    session.closer().request_close(SensorKind::Visible, "IR sensor not running after handshake");
                    break;
                }
                info!("🤝 VIS handshake complete.");
                first_frame = false;
            }

            self.presenter.present_visible(&frame);
            self.store.update_visible(frame);
            frames += 1;
        }
        info!("VIS camera loop ends after {} frame(s).", frames);
        self.visible_state.set(if faulted { SensorRunState::Faulted } else { SensorRunState::Stopped });
    }
}

/// Runs a transform on the blocking pool. Errors and panics both come back as
/// [`AppError::Plugin`].
async fn run_isolated(plugin: SharedTransform, raw: Gray16Image, log: &LogSink) -> Result<Frame, AppError> {
    let name = plugin.name().to_string();
    let log = log.clone();
    tokio::task::spawn_blocking(move || log.scope(|| plugin.transform(&raw)))
        .await
        .map_err(|e| AppError::Plugin(format!("'{}' panicked: {}", name, e)))?
        .map_err(|e| AppError::Plugin(format!("'{}' failed: {:#}", name, e)))
}

/// One thermal cycle: display conversion plus the optional plugin stage.
///
/// The processed frame falls back to the display frame when no plugin is
/// active or the plugin fails.
pub async fn process_thermal_frame(
    raw: Gray16Image,
    plugin: Option<SharedTransform>,
    log: &LogSink,
) -> ThermalProducts {
    let display = raw_to_display(&raw);
    let processed = match plugin {
        None => display.clone(),
        Some(plugin) => match run_isolated(plugin, raw.clone(), log).await {
            Ok(frame) => frame.into_display(),
            Err(e) => {
                error!("❌ {}", e);
                display.clone()
            }
        },
    };
    ThermalProducts { raw, display, processed }
}
