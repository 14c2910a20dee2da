//! TCP reachability preflight run before any database protocol traffic

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

/// Pause between reachability attempts
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for a single TCP connect attempt
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Per-attempt timeout: the connect timeout capped at two seconds.
/// A zero connect timeout means "unbounded" and gets the cap.
pub fn attempt_timeout(connect_timeout: Duration) -> Duration {
    if connect_timeout.is_zero() {
        MAX_ATTEMPT_TIMEOUT
    } else {
        connect_timeout.min(MAX_ATTEMPT_TIMEOUT)
    }
}

/// Poll `host:port` until it accepts a TCP connection or `wait_timeout` elapses.
///
/// Returns whether the host became reachable. A port that is not a valid TCP
/// port never succeeds.
pub async fn wait_for_host(
    host: &str,
    port: &str,
    connect_timeout: Duration,
    wait_timeout: Duration,
) -> bool {
    let per_attempt = attempt_timeout(connect_timeout);
    let deadline = Instant::now() + wait_timeout;

    while Instant::now() < deadline {
        if try_connect(host, port, per_attempt).await {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    false
}

async fn try_connect(host: &str, port: &str, per_attempt: Duration) -> bool {
    let port = match port.trim().parse::<u16>() {
        Ok(port) => port,
        Err(e) => {
            debug!("Invalid port '{}': {}", port, e);
            return false;
        }
    };

    match timeout(per_attempt, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("{}:{} not reachable yet: {}", host, port, e);
            false
        }
        Err(_) => {
            debug!("{}:{} did not answer within {:?}", host, port, per_attempt);
            false
        }
    }
}
