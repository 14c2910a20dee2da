use std::env;
use std::time::Duration;

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL with timeout parameters guaranteed present
    pub url: String,
    /// Database host
    pub host: String,
    /// Database port
    pub port: String,
    /// Database name
    pub name: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Socket (query) timeout in milliseconds
    pub socket_timeout_ms: u64,
}

/// Retry policy for connection attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Configured retry count; zero or negative still means one attempt
    pub retries: i32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
}

/// TCP reachability preflight settings
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// Wait for host:port to accept TCP before connecting
    pub wait_for_host: bool,
    /// Overall wait budget in milliseconds
    pub wait_timeout_ms: u64,
}

/// Health check query settings
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Query to execute
    pub query: String,
    /// Expected value of the first column, if any
    pub expected: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub preflight: PreflightConfig,
    pub check: CheckConfig,
}

pub const DEFAULT_QUERY: &str = "SELECT 1";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 10000;
const DEFAULT_RETRIES: i32 = 5;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30000;

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| non_blank(lookup(key)).unwrap_or_else(|| default.to_string());

        let host = get("MYSQL_HOST", "localhost");
        let port = get("MYSQL_PORT", "3306");
        let name = get("MYSQL_DB", "mysql");
        let user = get("MYSQL_USER", "root");
        let password = get("MYSQL_PASSWORD", "");

        let connect_timeout_ms = parse_or(lookup("MYSQL_CONNECT_TIMEOUT_MS"), DEFAULT_CONNECT_TIMEOUT_MS);
        let socket_timeout_ms = parse_or(lookup("MYSQL_SOCKET_TIMEOUT_MS"), DEFAULT_SOCKET_TIMEOUT_MS);

        let base_url = non_blank(lookup("MYSQL_URL")).unwrap_or_else(|| synthesize_url(&host, &port, &name));
        let url = ensure_timeout_params(&base_url, connect_timeout_ms, socket_timeout_ms);

        let retry = RetryConfig {
            retries: parse_or(lookup("MYSQL_RETRIES"), DEFAULT_RETRIES),
            delay_ms: parse_or(lookup("MYSQL_RETRY_DELAY_MS"), DEFAULT_RETRY_DELAY_MS),
        };

        let preflight = PreflightConfig {
            wait_for_host: get("MYSQL_WAIT_FOR_HOST", "false").eq_ignore_ascii_case("true"),
            wait_timeout_ms: parse_or(lookup("MYSQL_WAIT_TIMEOUT_MS"), DEFAULT_WAIT_TIMEOUT_MS),
        };

        let check = CheckConfig {
            query: get("MYSQL_HEALTHCHECK_QUERY", DEFAULT_QUERY),
            expected: non_blank(lookup("MYSQL_HEALTHCHECK_EXPECT")),
        };

        Self {
            database: DatabaseConfig {
                url,
                host,
                port,
                name,
                user,
                password,
                connect_timeout_ms,
                socket_timeout_ms,
            },
            retry,
            preflight,
            check,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

impl RetryConfig {
    /// Number of attempts the runner makes, never less than one
    pub fn max_attempts(&self) -> u32 {
        self.retries.max(1) as u32
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl PreflightConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Build a connection URL from discrete fields
pub fn synthesize_url(host: &str, port: &str, database: &str) -> String {
    format!(
        "mysql://{}:{}/{}?useSSL=false&allowPublicKeyRetrieval=true&serverTimezone=UTC",
        host, port, database
    )
}

/// Append `connectTimeout` and `socketTimeout` unless the URL already carries them
pub fn ensure_timeout_params(url: &str, connect_timeout_ms: u64, socket_timeout_ms: u64) -> String {
    let mut url = url.to_string();
    for (key, value) in [
        ("connectTimeout", connect_timeout_ms),
        ("socketTimeout", socket_timeout_ms),
    ] {
        let marker = format!("{}=", key.to_ascii_lowercase());
        if !url.to_ascii_lowercase().contains(&marker) {
            let sep = if url.contains('?') { '&' } else { '?' };
            url = format!("{}{}{}={}", url, sep, key, value);
        }
    }
    url
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
