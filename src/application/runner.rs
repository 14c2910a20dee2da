//! Health check run: preflight, bounded retry loop and evaluation

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::probe_trait::{DatabaseProbe, FirstColumn};
use crate::config::AppConfig;
use crate::domain::errors::HealthCheckError;
use crate::domain::evaluator::{self, Verdict};
use crate::infrastructure::network::preflight;
use crate::infrastructure::persistence::connection::ensure_supported_url;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging::redact_password;

/// Log the resolved configuration with secrets masked
pub fn log_configuration(config: &AppConfig) {
    let db = &config.database;
    info!("Connection URL: {}", redact_password(&db.url));
    info!("User: {}", db.user);
    info!("Host: {}:{}", db.host, db.port);
    info!(
        "connectTimeoutMs={}, socketTimeoutMs={}",
        db.connect_timeout_ms, db.socket_timeout_ms
    );
    info!(
        "retries={}, retryDelayMs={}",
        config.retry.retries, config.retry.delay_ms
    );
}

/// Run the health check and report the terminal outcome
pub async fn run<P>(config: &AppConfig, probe: &P) -> Result<(), HealthCheckError>
where
    P: DatabaseProbe + ?Sized,
{
    info!("Attempting MySQL connection...");
    log_configuration(config);

    ensure_supported_url(&config.database.url).map_err(|reason| {
        error!("MySQL driver not available: {}", reason);
        HealthCheckError::DriverUnavailable(reason)
    })?;

    if config.preflight.wait_for_host {
        wait_for_host(config).await;
    }

    let max_attempts = config.retry.max_attempts();
    let mut last_error: Option<DbError> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            info!("Retry attempt {} of {}...", attempt, max_attempts);
        }

        match probe.first_column(&config.check.query).await {
            Ok(row) => return conclude(config, row),
            Err(e) => {
                error!("Attempt {} failed to connect or query MySQL: {}", attempt, e);
                e.detail().log();
                last_error = Some(e);

                if attempt < max_attempts {
                    sleep(config.retry.delay()).await;
                }
            }
        }
    }

    error!("All attempts to connect/query MySQL have failed.");
    warn!("{}", troubleshooting_hint(config));
    if let Some(e) = &last_error {
        e.detail().log();
    }

    Err(HealthCheckError::AttemptsExhausted {
        attempts: max_attempts,
        last: last_error,
    })
}

/// Map the run outcome to a process exit status
///
/// `run` already logged why it failed, so the error is only repeated at debug.
pub fn exit_status(outcome: &Result<(), HealthCheckError>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            debug!("Health check finished with: {}", e);
            e.exit_code()
        }
    }
}

/// Advice printed once every attempt has failed
pub fn troubleshooting_hint(config: &AppConfig) -> String {
    format!(
        "Hint: check that the MySQL server is running and reachable at {}:{}, credentials are correct, \
         and that firewalls or container networking allow access. If needed, provide a full MYSQL_URL.",
        config.database.host, config.database.port
    )
}

async fn wait_for_host(config: &AppConfig) {
    let db = &config.database;
    info!(
        "Waiting for MySQL host:port to become available (timeout {} ms)...",
        config.preflight.wait_timeout_ms
    );

    let reachable = preflight::wait_for_host(
        &db.host,
        &db.port,
        db.connect_timeout(),
        config.preflight.wait_timeout(),
    )
    .await;

    if reachable {
        info!("Host:port is reachable, proceeding with connection attempts.");
    } else {
        warn!("MySQL host:port didn't become available within wait timeout; continuing to connection attempts.");
    }
}

fn conclude(config: &AppConfig, row: Option<FirstColumn>) -> Result<(), HealthCheckError> {
    if let Some(column) = &row {
        info!(
            "Health check first column: {}",
            column.value().unwrap_or("NULL")
        );
    }

    match evaluator::evaluate(
        &config.check.query,
        config.check.expected.as_deref(),
        row.as_ref(),
    ) {
        Verdict::Pass => {
            info!("MySQL health check passed.");
            Ok(())
        }
        Verdict::Mismatch { actual } => {
            warn!("MySQL health check failed based on expectation.");
            Err(HealthCheckError::Mismatch { actual })
        }
        Verdict::NoRows => {
            warn!("Health check returned no rows.");
            Err(HealthCheckError::NoRows)
        }
    }
}
