use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

use gator::{dispatch, Cli, Config, Database, State};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration; a missing file means defaults
    let config = if cli.config.exists() {
        match Config::load_with_env(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", cli.config.display());
                return ExitCode::FAILURE;
            }
        }
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    // Initialize logging
    if let Err(e) = gator::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gator::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&config.database.url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    debug!(command = ?cli.command, "Dispatching command");
    let mut state = State::new(config, cli.config, db);
    let mut stdout = std::io::stdout();
    match dispatch(&mut state, cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
