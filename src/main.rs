use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

use mysql_healthcheck::application::runner;
use mysql_healthcheck::config::AppConfig;
use mysql_healthcheck::infrastructure::persistence::MySqlProbe;
use mysql_healthcheck::utils::logging;

/// MySQL connectivity and health check probe
///
/// Configuration is read from MYSQL_* environment variables.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Resolve and print the configuration without contacting the server
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_loaded = match &cli.env_file {
        Some(path) => dotenv::from_path(path).map_err(|e| (path.display().to_string(), e)),
        None => {
            dotenv::dotenv().ok();
            Ok(())
        }
    };

    logging::init_logger();

    if let Err((path, e)) = env_loaded {
        warn!("Could not load environment file {}: {}", path, e);
    }

    let config = AppConfig::from_env();

    if cli.dry_run {
        runner::log_configuration(&config);
        info!("Dry run, not connecting.");
        return ExitCode::SUCCESS;
    }

    let probe = MySqlProbe::new(&config.database);
    let outcome = runner::run(&config, &probe).await;
    ExitCode::from(runner::exit_status(&outcome))
}
