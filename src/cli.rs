use clap::{Arg, ArgAction, Command};
use std::time::Instant;
use tracing::debug;

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    let start_time = Instant::now();
    let cmd = Command::new("thermovis")
        .version("0.1.0")
        .author("Thermovis Developers")
        .about("Dual thermal and visible camera acquisition station.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom configuration file")
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("run")
                .about("Starts both cameras and reads commands from stdin (save, toggle, plugin <name>|none, quit)")
                .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Folder for saved captures (overrides config)").action(ArgAction::Set))
                .arg(Arg::new("plugin").long("plugin").value_name("NAME").help("Plugin to activate once the station is up").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("list-plugins")
                .about("Lists the built-in thermal plugins")
        )
        .subcommand(
            Command::new("inspect-raw")
                .about("Prints the records of a raw thermal capture file")
                .arg(Arg::new("file").value_name("FILE").required(true).help("Raw capture (.bin) to read").action(ArgAction::Set))
                .arg(Arg::new("width").long("width").value_name("PIXELS").help("Frame width (default: thermal resolution from config)").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
                .arg(Arg::new("height").long("height").value_name("PIXELS").help("Frame height (default: thermal resolution from config)").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
        );
    debug!("✅ CLI interface built in {:?}", start_time.elapsed());
    cmd
}
