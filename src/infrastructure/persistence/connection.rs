use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, QueryResult,
    Statement,
};
use tracing::{debug, info};
use url::Url;

use crate::application::probe_trait::{DatabaseProbe, FirstColumn};
use crate::config::DatabaseConfig;
use crate::infrastructure::persistence::error::{DbError, FailureDetail};

/// Schemes served by the compiled-in MySQL driver
const SUPPORTED_SCHEMES: [&str; 2] = ["mysql", "mariadb"];

/// Query parameters the driver understands and that are forwarded unchanged
const DRIVER_PARAMS: [&str; 7] = [
    "ssl-mode",
    "ssl-ca",
    "ssl-cert",
    "ssl-key",
    "charset",
    "collation",
    "socket",
];

/// Connection target derived from a (possibly JDBC style) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverTarget {
    /// URL in the form the driver accepts
    pub url: String,
    /// `None` when the configured value is zero, meaning no bound
    pub connect_timeout: Option<Duration>,
    /// `None` when the configured value is zero, meaning no bound
    pub socket_timeout: Option<Duration>,
}

/// Returns the URL scheme with an optional `jdbc:` prefix removed
pub fn driver_scheme(url: &str) -> Option<String> {
    let url = strip_jdbc_prefix(url);
    url.find("://").map(|idx| url[..idx].to_ascii_lowercase())
}

/// Check whether the compiled driver can serve this URL
///
/// Stands in for loading the driver: a scheme nothing is compiled in for is
/// treated as a missing driver rather than a retryable connection failure.
pub fn ensure_supported_url(url: &str) -> Result<(), String> {
    match driver_scheme(url) {
        Some(scheme) if SUPPORTED_SCHEMES.contains(&scheme.as_str()) => Ok(()),
        Some(scheme) => Err(format!("no MySQL driver registered for scheme '{}'", scheme)),
        None => Err("connection URL has no scheme".to_string()),
    }
}

/// Translate the configured URL into driver options
///
/// JDBC parameters are mapped where the driver has an equivalent and dropped
/// otherwise. Credentials already present in the URL are kept; the configured
/// user and password are only used to fill in what is missing.
pub fn driver_target(config: &DatabaseConfig) -> Result<DriverTarget, DbError> {
    let raw = strip_jdbc_prefix(&config.url);
    let parsed = Url::parse(raw).map_err(|e| {
        DbError::ConnectionError(FailureDetail::new(format!("Invalid connection URL: {}", e)))
    })?;

    let mut connect_timeout = config.connect_timeout();
    let mut socket_timeout = config.socket_timeout();
    let mut url_user: Option<String> = None;
    let mut url_password: Option<String> = None;
    let mut forwarded: Vec<(String, String)> = Vec::new();

    for (key, value) in parsed.query_pairs() {
        let lower = key.to_ascii_lowercase();
        match lower.as_str() {
            "connecttimeout" => {
                connect_timeout = value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .unwrap_or(connect_timeout);
            }
            "sockettimeout" => {
                socket_timeout = value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .unwrap_or(socket_timeout);
            }
            "user" => url_user = Some(value.into_owned()),
            "password" => url_password = Some(value.into_owned()),
            "usessl" => {
                let mode = if value.eq_ignore_ascii_case("true") {
                    "REQUIRED"
                } else {
                    "DISABLED"
                };
                forwarded.push(("ssl-mode".to_string(), mode.to_string()));
            }
            "sslmode" => forwarded.push(("ssl-mode".to_string(), value.into_owned())),
            other if DRIVER_PARAMS.contains(&other) => {
                forwarded.push((other.to_string(), value.into_owned()))
            }
            other => debug!("Ignoring connection parameter '{}'", other),
        }
    }

    let mut target = parsed;
    target.set_query(None);
    target.set_scheme("mysql").map_err(|_| {
        DbError::ConnectionError(FailureDetail::new("Cannot rewrite connection URL scheme"))
    })?;

    if target.username().is_empty() {
        let user = url_user.unwrap_or_else(|| config.user.clone());
        target.set_username(&user).map_err(|_| {
            DbError::ConnectionError(FailureDetail::new("Connection URL cannot carry a user"))
        })?;
    }
    if target.password().is_none() {
        let password = url_password.unwrap_or_else(|| config.password.clone());
        if !password.is_empty() {
            target.set_password(Some(&password)).map_err(|_| {
                DbError::ConnectionError(FailureDetail::new(
                    "Connection URL cannot carry a password",
                ))
            })?;
        }
    }

    if !forwarded.is_empty() {
        target.query_pairs_mut().extend_pairs(forwarded);
    }

    Ok(DriverTarget {
        url: target.to_string(),
        connect_timeout: bounded(connect_timeout),
        socket_timeout: bounded(socket_timeout),
    })
}

/// Zero means "no timeout", matching `connectTimeout=0` / `socketTimeout=0`
fn bounded(timeout: Duration) -> Option<Duration> {
    Some(timeout).filter(|t| !t.is_zero())
}

fn strip_jdbc_prefix(url: &str) -> &str {
    match url.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("jdbc:") => &url[5..],
        _ => url,
    }
}

/// Health probe backed by SeaORM over the sqlx MySQL driver
pub struct MySqlProbe {
    config: DatabaseConfig,
}

impl MySqlProbe {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn connect(&self, target: &DriverTarget) -> Result<DatabaseConnection, DbError> {
        let mut options = ConnectOptions::new(target.url.clone());
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        if let Some(timeout) = target.connect_timeout {
            options.connect_timeout(timeout).acquire_timeout(timeout);
        }

        Database::connect(options)
            .await
            .map_err(|e| DbError::connection(&e))
    }

    async fn query_first(
        connection: &DatabaseConnection,
        query: &str,
        socket_timeout: Option<Duration>,
    ) -> Result<Option<FirstColumn>, DbError> {
        let statement = Statement::from_string(DbBackend::MySql, query.to_string());
        let pending = connection.query_one(statement);

        let row = match socket_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| DbError::QueryTimeout(limit.as_millis() as u64))?,
            None => pending.await,
        }
        .map_err(|e| DbError::query(&e))?;

        Ok(row.map(|row| FirstColumn(column_text(&row))))
    }
}

#[async_trait]
impl DatabaseProbe for MySqlProbe {
    async fn first_column(&self, query: &str) -> Result<Option<FirstColumn>, DbError> {
        let target = driver_target(&self.config)?;
        let connection = self.connect(&target).await?;
        info!("Connection established successfully.");
        info!("Running health check query: {}", query);

        let result = Self::query_first(&connection, query, target.socket_timeout).await;

        if let Err(e) = connection.close().await {
            debug!("Failed to close connection cleanly: {}", e);
        }
        result
    }
}

/// Render the first column as text whatever its SQL type; NULL yields `None`
fn column_text(row: &QueryResult) -> Option<String> {
    if let Ok(value) = row.try_get_by_index::<Option<String>>(0) {
        return value;
    }
    if let Ok(value) = row.try_get_by_index::<Option<i64>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<u64>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<Decimal>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<f64>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<f32>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<bool>>(0) {
        return value.map(|v| if v { "1" } else { "0" }.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<NaiveDateTime>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<NaiveDate>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<NaiveTime>>(0) {
        return value.map(|v| v.to_string());
    }
    if let Ok(value) = row.try_get_by_index::<Option<Vec<u8>>>(0) {
        return value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    }
    debug!("First column has a type that cannot be rendered as text");
    None
}
