use std::error::Error as StdError;
use std::fmt;

use sea_orm::{DbErr, RuntimeErr};
use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;
use tracing::error;

/// How many chained causes are reported for a single failure
pub const MAX_CAUSE_DEPTH: usize = 5;

/// Diagnostic snapshot of a database failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    /// Human readable message
    pub message: String,
    /// SQLSTATE reported by the server
    pub sql_state: Option<String>,
    /// MySQL error number
    pub vendor_code: Option<u16>,
    /// Messages of the underlying causes, outermost first
    pub causes: Vec<String>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            vendor_code: None,
            causes: Vec::new(),
        }
    }

    /// Extract server diagnostics and the cause chain from a SeaORM error
    pub fn from_db_err(err: &DbErr) -> Self {
        let mut detail = Self::new(err.to_string());

        if let Some(sqlx::Error::Database(db_err)) = sqlx_error(err) {
            detail.message = db_err.message().to_string();
            detail.sql_state = db_err.code().map(|code| code.into_owned());
            detail.vendor_code = db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|mysql| mysql.number());
        }

        detail.causes = cause_chain(err);
        detail
    }

    /// Write every known field at error level
    pub fn log(&self) {
        error!("Message: {}", self.message);
        error!("SQLState: {}", display_or_none(&self.sql_state));
        error!("ErrorCode: {}", display_or_none(&self.vendor_code));
        for cause in &self.causes {
            error!("Caused by -> {}", cause);
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.vendor_code {
            write!(f, " (error {}", code)?;
            if let Some(state) = &self.sql_state {
                write!(f, ", SQLSTATE {}", state)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not open a connection
    #[error("Connection error: {0}")]
    ConnectionError(FailureDetail),
    /// Connection opened but the query failed
    #[error("Query error: {0}")]
    QueryError(FailureDetail),
    /// Query did not complete within the socket timeout
    #[error("Query timed out after {0}ms")]
    QueryTimeout(u64),
}

impl DbError {
    pub fn connection(err: &DbErr) -> Self {
        DbError::ConnectionError(FailureDetail::from_db_err(err))
    }

    pub fn query(err: &DbErr) -> Self {
        DbError::QueryError(FailureDetail::from_db_err(err))
    }

    /// Diagnostic detail for logging
    pub fn detail(&self) -> FailureDetail {
        match self {
            DbError::ConnectionError(detail) | DbError::QueryError(detail) => detail.clone(),
            DbError::QueryTimeout(ms) => {
                FailureDetail::new(format!("Query did not complete within {}ms", ms))
            }
        }
    }
}

fn sqlx_error(err: &DbErr) -> Option<&sqlx::Error> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => Some(e),
        _ => None,
    }
}

/// Collect `source()` messages, skipping ones that repeat the previous level
fn cause_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut previous = err.to_string();
    let mut current = err.source();

    while let Some(cause) = current {
        if causes.len() == MAX_CAUSE_DEPTH {
            break;
        }
        let message = cause.to_string();
        if !previous.ends_with(&message) {
            causes.push(message.clone());
        }
        previous = message;
        current = cause.source();
    }
    causes
}

fn display_or_none<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string())
}
