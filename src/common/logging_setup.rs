use crate::config_loader::MasterConfig;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use tracing::instrument::{Instrument, WithSubscriber};
use tracing::{Dispatch, Span};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Builds the process log sink. Nothing is installed globally; the returned
/// [`Dispatch`] is handed to each component through a [`LogSink`].
pub fn build_dispatch(config: Option<&MasterConfig>, cli_matches: &clap::ArgMatches) -> Result<Dispatch> {
    // Determine log level from CLI, then config, then default
    let log_level_str = if cli_matches.get_flag("debug") {
        "debug".to_string()
    } else {
        config
            .and_then(|c| c.app_settings.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };

    let level = match log_level_str.to_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "info" => LevelFilter::INFO,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        s => {
            eprintln!("Unrecognized log level '{}', defaulting to info.", s);
            LevelFilter::INFO
        }
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let log_file = config.and_then(|c| c.app_settings.log_file.as_deref());
    let dispatch = match log_file {
        Some(path) => {
            let file = open_log_file(Path::new(path))?;
            Dispatch::new(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .finish(),
            )
        }
        None => Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };
    Ok(dispatch)
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory '{}'", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))
}

/// A log sink bound to one component.
///
/// Futures passed through [`LogSink::attach`] and closures run through
/// [`LogSink::scope`] emit their events to this sink's dispatcher, inside a
/// span naming the component.
#[derive(Clone)]
pub struct LogSink {
    dispatch: Dispatch,
    component: &'static str,
}

impl LogSink {
    pub fn new(dispatch: Dispatch, component: &'static str) -> Self {
        LogSink { dispatch, component }
    }

    /// A sink that drops everything.
    pub fn disabled(component: &'static str) -> Self {
        LogSink::new(Dispatch::none(), component)
    }

    /// Same dispatcher, different component name.
    pub fn child(&self, component: &'static str) -> Self {
        LogSink::new(self.dispatch.clone(), component)
    }

    fn span(&self) -> Span {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info_span!("component", name = self.component)
        })
    }

    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let span = self.span();
        tracing::dispatcher::with_default(&self.dispatch, || span.in_scope(f))
    }

    pub fn attach<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        fut.instrument(self.span()).with_subscriber(self.dispatch.clone())
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").field("component", &self.component).finish()
    }
}
