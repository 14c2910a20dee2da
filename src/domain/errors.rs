use thiserror::Error;

use crate::infrastructure::persistence::error::DbError;

/// Terminal failures of a health check run
#[derive(Debug, Error)]
pub enum HealthCheckError {
    /// The connection URL is not served by the compiled-in driver
    #[error("MySQL driver unavailable: {0}")]
    DriverUnavailable(String),
    /// A row came back but did not satisfy the expectation
    #[error("health check failed based on expectation (first column: {})", .actual.as_deref().unwrap_or("NULL"))]
    Mismatch { actual: Option<String> },
    /// The query ran but returned no rows
    #[error("health check returned no rows")]
    NoRows,
    /// Every attempt failed before a result could be evaluated
    #[error("all {attempts} attempts to connect/query MySQL failed")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        last: Option<DbError>,
    },
}

impl HealthCheckError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            HealthCheckError::AttemptsExhausted { .. } => 1,
            HealthCheckError::DriverUnavailable(_) => 2,
            HealthCheckError::Mismatch { .. } | HealthCheckError::NoRows => 3,
        }
    }
}
