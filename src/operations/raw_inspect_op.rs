use crate::config_loader::MasterConfig;
use crate::core::radiometry::raw_to_celsius;
use crate::core::raw_capture::read_raw_captures;
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub fn handle_inspect_raw_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let start_time = Instant::now();
    let file = args
        .get_one::<String>("file")
        .context("No raw capture file given")?;
    let default_res = master_config.cameras.thermal.resolution;
    let width = args.get_one::<u32>("width").copied().unwrap_or(default_res.x);
    let height = args.get_one::<u32>("height").copied().unwrap_or(default_res.y);

    let records = read_raw_captures(Path::new(file), width, height)
        .with_context(|| format!("Failed to read raw capture '{}' as {}x{}", file, width, height))?;
    if records.is_empty() {
        warn!("⚠️ '{}' holds no records.", file);
        return Ok(());
    }
    info!("📄 '{}': {} record(s) of {}x{}", file, records.len(), width, height);
    for (i, record) in records.iter().enumerate() {
        let mean = record.mean();
        info!(
            "  #{}: min {} max {} mean {:.1} (~{:.1} °C)",
            i,
            record.min,
            record.max,
            mean,
            raw_to_celsius(mean)
        );
    }
    info!("✅ Inspected in {:?}", start_time.elapsed());
    Ok(())
}
