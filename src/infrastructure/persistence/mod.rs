pub mod connection;
pub mod error;

pub use connection::MySqlProbe;
pub use error::{DbError, FailureDetail};
