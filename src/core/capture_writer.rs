use crate::app_config::{ApplicationConfig, RawWriteMode};
use crate::common::file_utils::{artifact_path, ensure_output_directory, timestamped_prefix};
use crate::common::logging_setup::LogSink;
use crate::core::frame_store::{CaptureSnapshot, FrameStore};
use crate::core::plugin::PluginSelector;
use crate::core::raw_capture;
use crate::core::sensor::{with_sensor, SharedVisible};
use crate::errors::AppError;
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Paths written by one save, all sharing the same timestamp prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifacts {
    pub visible: PathBuf,
    pub thermal: PathBuf,
    pub thermal_processed: Option<PathBuf>,
    pub raw: PathBuf,
}

impl CaptureArtifacts {
    fn for_prefix(prefix: &Path, with_processed: bool) -> Self {
        CaptureArtifacts {
            visible: artifact_path(prefix, "_visible.png"),
            thermal: artifact_path(prefix, "_ir.png"),
            thermal_processed: with_processed.then(|| artifact_path(prefix, "_ir_proc.png")),
            raw: artifact_path(prefix, "_ir.bin"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub save_folder: String,
    pub timestamp_format: String,
    pub raw_write_mode: RawWriteMode,
    pub high_res_photo: bool,
}

impl From<&ApplicationConfig> for CaptureSettings {
    fn from(app: &ApplicationConfig) -> Self {
        CaptureSettings {
            save_folder: app.save_folder.clone(),
            timestamp_format: app.filename_timestamp_format.clone(),
            raw_write_mode: app.raw_write_mode,
            high_res_photo: app.high_res_photo,
        }
    }
}

struct CaptureJob {
    settings: CaptureSettings,
    store: Arc<FrameStore>,
    plugins: Arc<PluginSelector>,
    visible: SharedVisible,
    log: LogSink,
}

type SaveHandle = JoinHandle<Result<CaptureArtifacts, AppError>>;

/// Writes the current frames to disk, one save at a time.
///
/// A request made while a save is running is dropped, not queued.
pub struct CaptureWriter {
    job: Arc<CaptureJob>,
    save_lock: Arc<tokio::sync::Mutex<()>>,
    in_flight: Mutex<Option<SaveHandle>>,
}

impl CaptureWriter {
    pub fn new(
        settings: CaptureSettings,
        store: Arc<FrameStore>,
        plugins: Arc<PluginSelector>,
        visible: SharedVisible,
        log: LogSink,
    ) -> Self {
        CaptureWriter {
            job: Arc::new(CaptureJob {
                settings,
                store,
                plugins,
                visible,
                log,
            }),
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
            in_flight: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.save_lock.try_lock().is_err()
    }

    /// Starts a background save. Returns `false` when one is already running.
    pub fn request_save(&self) -> bool {
        let guard = match Arc::clone(&self.save_lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                self.job.log.scope(|| info!("⏳ A save is already in progress, request dropped."));
                return false;
            }
        };
        let job = Arc::clone(&self.job);
        let handle = tokio::spawn(self.job.log.attach(async move {
            let _guard = guard;
            let result = save(&job).await;
            if let Err(e) = &result {
                error!("❌ Saving capture failed: {}", e);
            }
            result
        }));
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Waits up to `bound` for the last started save. `None` when there is
    /// nothing to wait for or the save did not finish in time.
    pub async fn join_in_flight(&self, bound: Duration) -> Option<Result<CaptureArtifacts, AppError>> {
        let handle = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        match tokio::time::timeout(bound, handle).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => Some(Err(AppError::Task(format!("save task failed: {}", e)))),
            Err(_) => {
                self.job.log.scope(|| warn!("⏱️ Save still running after {:?}, not waiting any longer.", bound));
                None
            }
        }
    }
}

fn write_png(path: &Path, frame: &RgbImage) -> Result<(), AppError> {
    frame.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

async fn save(job: &CaptureJob) -> Result<CaptureArtifacts, AppError> {
    let start_time = Instant::now();
    info!("💾 Saving capture...");

    let save_dir = ensure_output_directory(&job.settings.save_folder)?;
    let prefix = timestamped_prefix(&save_dir, &job.settings.timestamp_format);
    let plugin_active = job.plugins.active().is_some();
    let CaptureSnapshot {
        visible: streamed,
        thermal_display,
        thermal_processed,
        thermal_raw,
    } = job.store.capture_snapshot(plugin_active);

    let visible = if job.settings.high_res_photo {
        match with_sensor(&job.visible, &job.log, |s| s.capture_photo()).await {
            Ok(Ok(photo)) => photo,
            Ok(Err(e)) | Err(e) => {
                warn!("⚠️ High resolution photo failed, saving the streamed frame: {}", e);
                streamed
            }
        }
    } else {
        streamed
    };

    let artifacts = CaptureArtifacts::for_prefix(&prefix, thermal_processed.is_some());
    let paths = artifacts.clone();
    let mode = job.settings.raw_write_mode;
    let log = job.log.clone();
    tokio::task::spawn_blocking(move || {
        log.scope(|| -> Result<(), AppError> {
            info!("Saving visible image...");
            write_png(&paths.visible, &visible)?;
            info!("Saving IR image...");
            write_png(&paths.thermal, &thermal_display)?;
            if let (Some(path), Some(frame)) = (&paths.thermal_processed, &thermal_processed) {
                info!("Saving processed IR image...");
                write_png(path, frame)?;
            }
            info!("Saving raw IR data...");
            raw_capture::write_raw_capture(&paths.raw, &thermal_raw, mode)
        })
    })
    .await
    .map_err(|e| AppError::Task(format!("capture write task failed: {}", e)))??;

    info!("✅ Capture saved to '{}' in {:?}", prefix.display(), start_time.elapsed());
    Ok(artifacts)
}
