use crate::camera::{SimThermalOptions, SimVisibleOptions, SimulatedThermalSensor, SimulatedVisibleSensor};
use crate::common::logging_setup::LogSink;
use crate::config_loader::MasterConfig;
use crate::core::plugin::PluginRegistry;
use crate::core::presenter::LoggingPresenter;
use crate::core::sensor::{share_thermal, share_visible};
use crate::core::station::{CloseReason, Station, StationParts, UserIntent};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Dispatch};

/// Parses one console line. `None` for blank or unrecognized input.
pub fn parse_intent(line: &str) -> Option<UserIntent> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command.to_lowercase().as_str() {
        "save" | "s" => Some(UserIntent::RequestSave),
        "toggle" | "t" => Some(UserIntent::ToggleSensors),
        "quit" | "q" | "exit" => Some(UserIntent::Close),
        "plugin" | "p" if rest.is_empty() || rest.eq_ignore_ascii_case("none") => Some(UserIntent::SelectPlugin(None)),
        "plugin" | "p" => Some(UserIntent::SelectPlugin(Some(rest.to_string()))),
        _ => None,
    }
}

/// Reads console commands on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_console_reader(tx: mpsc::Sender<UserIntent>, log: LogSink) -> Result<()> {
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            log.scope(|| {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("⚠️ Failed to read from stdin: {}", e);
                            break;
                        }
                    };
                    match parse_intent(&line) {
                        Some(intent) => {
                            if tx.blocking_send(intent).is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => warn!("🤔 Unknown command '{}'. Try: save, toggle, plugin <name>|none, quit", line.trim()),
                    }
                }
                debug!("Console reader finished.");
            })
        })
        .context("Failed to spawn console reader thread")?;
    Ok(())
}

pub async fn handle_run_cli(master_config: &MasterConfig, args: Option<&ArgMatches>, dispatch: Dispatch) -> Result<()> {
    let start_time = Instant::now();
    let mut config = master_config.clone();
    if let Some(output) = args.and_then(|a| a.get_one::<String>("output")) {
        info!("💾 Saving captures to '{}' (from CLI).", output);
        config.app_settings.save_folder = output.clone();
    }

    let cameras = &config.cameras;
    let thermal = share_thermal(SimulatedThermalSensor::new(SimThermalOptions::from_config(&cameras.thermal)));
    let visible = share_visible(SimulatedVisibleSensor::new(SimVisibleOptions::from_config(&cameras.visible)));
    // Roughly one report every ten seconds per stream.
    let report_every = u64::from(cameras.thermal.frame_rate.max(1)) * 10;
    let station = Station::new(
        &config,
        StationParts {
            thermal,
            visible,
            registry: PluginRegistry::builtin(),
            presenter: Arc::new(LoggingPresenter::new(report_every)),
        },
        dispatch.clone(),
    );

    station.start().await.context("Failed to start the acquisition station")?;
    if let Some(name) = args.and_then(|a| a.get_one::<String>("plugin")) {
        station.handle_intent(UserIntent::SelectPlugin(Some(name.clone()))).await;
    }
    info!(
        "🚀 Station running (started in {:?}). Commands: save, toggle, plugin <name>|none, quit",
        start_time.elapsed()
    );

    let (tx, rx) = mpsc::channel(16);
    let console_log = LogSink::new(dispatch, "console");
    spawn_console_reader(tx.clone(), console_log.clone())?;
    tokio::spawn(console_log.attach(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Ctrl-C received, closing the station.");
                let _ = tx.send(UserIntent::Close).await;
            }
            Err(e) => warn!("⚠️ Unable to listen for Ctrl-C: {}", e),
        }
    }));

    match station.run(rx).await {
        CloseReason::UserRequest => {
            info!("✅ Station closed after {:?}.", start_time.elapsed());
            Ok(())
        }
        CloseReason::SessionFailure(event) => {
            bail!("Acquisition session failed ({}): {}", event.sensor, event.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_commands() {
        assert_eq!(parse_intent("save"), Some(UserIntent::RequestSave));
        assert_eq!(parse_intent("  TOGGLE "), Some(UserIntent::ToggleSensors));
        assert_eq!(parse_intent("q"), Some(UserIntent::Close));
        assert_eq!(parse_intent("plugin none"), Some(UserIntent::SelectPlugin(None)));
        assert_eq!(parse_intent("plugin"), Some(UserIntent::SelectPlugin(None)));
        assert_eq!(
            parse_intent("plugin Temp. Segmentation"),
            Some(UserIntent::SelectPlugin(Some("Temp. Segmentation".to_string())))
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(parse_intent(""), None);
        assert_eq!(parse_intent("record"), None);
    }
}
