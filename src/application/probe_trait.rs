use async_trait::async_trait;

pub use crate::domain::models::FirstColumn;
use crate::infrastructure::persistence::error::DbError;

/// Defines how a single health check attempt reaches the database
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Opens a connection, runs `query` and releases the connection before
    /// returning. `Ok(None)` means the query produced no rows.
    async fn first_column(&self, query: &str) -> Result<Option<FirstColumn>, DbError>;
}
