use anyhow::{bail, Context, Result};
use std::time::Instant;
use thermovis::cli;
use thermovis::common::logging_setup;
use thermovis::config_loader;
use thermovis::operations::{plugin_list_op, raw_inspect_op, station_op};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    // Parse CLI arguments early for potential use in logging or config path
    let matches = cli::build_cli().get_matches();

    // Determine the configuration file path
    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or("config/thermovis.yaml");

    let config_load_start_time = Instant::now();
    let (master_config, dispatch) = match config_loader::load_config(config_path) {
        Ok(cfg) => {
            let dispatch = logging_setup::build_dispatch(Some(&cfg), &matches)
                .context("Failed to initialize logging with full config")?;
            (cfg, dispatch)
        }
        Err(e) => {
            // Try to initialize logging with CLI args only, or defaults
            let dispatch = logging_setup::build_dispatch(None, &matches)
                .context("Failed to initialize logging with basic settings after config load failure")?;
            tracing::dispatcher::with_default(&dispatch, || {
                error!("❌ Failed to load master configuration from '{}': {:#}. Exiting.", config_path, e);
            });
            return Err(e.context(format!("Failed to load master configuration from '{}'", config_path)));
        }
    };
    // Events from main itself; components get the dispatch explicitly.
    let _log_guard = tracing::dispatcher::set_default(&dispatch);
    info!("✅ Configuration loaded from: {} in {:?}", config_path, config_load_start_time.elapsed());

    let (operation_name, op_result) = match matches.subcommand() {
        Some(("run", sub)) => ("run", station_op::handle_run_cli(&master_config, Some(sub), dispatch.clone()).await),
        Some(("list-plugins", _)) => ("list-plugins", plugin_list_op::handle_list_plugins_cli()),
        Some(("inspect-raw", sub)) => ("inspect-raw", raw_inspect_op::handle_inspect_raw_cli(&master_config, sub)),
        Some((other, _)) => bail!("Subcommand '{}' not implemented.", other),
        None => {
            debug!("🤔 No subcommand provided, starting the station.");
            ("run", station_op::handle_run_cli(&master_config, None, dispatch.clone()).await)
        }
    };

    if let Err(e) = op_result {
        error!("❌ Operation '{}' failed: {:#}", operation_name, e);
        return Err(e);
    }
    info!("🏁 Thermovis finished '{}' in {:?}.", operation_name, main_start_time.elapsed());
    Ok(())
}
