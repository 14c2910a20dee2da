use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::Instant;

use mysql_healthcheck::application::runner::exit_status;
use mysql_healthcheck::application::{run, DatabaseProbe, FirstColumn};
use mysql_healthcheck::config::AppConfig;
use mysql_healthcheck::domain::errors::HealthCheckError;
use mysql_healthcheck::infrastructure::persistence::{DbError, FailureDetail};

#[derive(Clone)]
enum Step {
    Refuse,
    Row(Option<&'static str>),
    Empty,
}

/// Probe that replays a script and remembers when it was called
struct ScriptedProbe {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedProbe {
    fn new(steps: Vec<Step>, fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, q)| q.clone()).collect()
    }
}

#[async_trait]
impl DatabaseProbe for ScriptedProbe {
    async fn first_column(&self, query: &str) -> Result<Option<FirstColumn>, DbError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), query.to_string()));

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Refuse => Err(DbError::ConnectionError(FailureDetail::new(
                "Can't connect to MySQL server",
            ))),
            Step::Row(value) => Ok(Some(FirstColumn(value.map(str::to_string)))),
            Step::Empty => Ok(None),
        }
    }
}

/// In-memory log sink shared with the fmt subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn config(vars: &[(&str, &str)]) -> AppConfig {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| map.get(key).cloned())
}

#[tokio::test(start_paused = true)]
async fn exhausts_configured_attempts_with_delay_between_them() {
    let config = config(&[("MYSQL_RETRIES", "3"), ("MYSQL_RETRY_DELAY_MS", "1000")]);
    let probe = ScriptedProbe::always(Step::Refuse);

    let err = run(&config, &probe).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    match err {
        HealthCheckError::AttemptsExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, Some(DbError::ConnectionError(_))));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let times = probe.call_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(1000), "gap too short: {:?}", gap);
        assert!(gap < Duration::from_millis(1010), "gap too long: {:?}", gap);
    }
}

#[tokio::test(start_paused = true)]
async fn recovers_when_a_later_attempt_succeeds() {
    let config = config(&[("MYSQL_RETRIES", "5"), ("MYSQL_RETRY_DELAY_MS", "200")]);
    let probe = ScriptedProbe::new(vec![Step::Refuse, Step::Refuse], Step::Row(Some("1")));

    run(&config, &probe).await.unwrap();

    assert_eq!(probe.call_times().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn non_positive_retries_still_make_one_attempt() {
    let config = config(&[("MYSQL_RETRIES", "0")]);
    let probe = ScriptedProbe::always(Step::Refuse);

    let err = run(&config, &probe).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(probe.call_times().len(), 1);
}

#[tokio::test]
async fn default_query_returning_other_value_fails_without_retry() {
    let config = config(&[]);
    let probe = ScriptedProbe::always(Step::Row(Some("2")));

    let err = run(&config, &probe).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(matches!(
        err,
        HealthCheckError::Mismatch { actual: Some(ref v) } if v == "2"
    ));
    assert_eq!(probe.queries(), vec!["SELECT 1".to_string()]);
}

#[tokio::test]
async fn empty_result_fails_with_code_three() {
    let config = config(&[("MYSQL_HEALTHCHECK_QUERY", "SELECT id FROM heartbeat")]);
    let probe = ScriptedProbe::always(Step::Empty);

    let err = run(&config, &probe).await.unwrap_err();

    assert!(matches!(err, HealthCheckError::NoRows));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(probe.queries(), vec!["SELECT id FROM heartbeat".to_string()]);
}

#[tokio::test]
async fn expectation_is_compared_numerically() {
    let config = config(&[
        ("MYSQL_HEALTHCHECK_QUERY", "SELECT COUNT(*) FROM replicas"),
        ("MYSQL_HEALTHCHECK_EXPECT", "3.0"),
    ]);

    run(&config, &ScriptedProbe::always(Step::Row(Some("3"))))
        .await
        .unwrap();

    let err = run(&config, &ScriptedProbe::always(Step::Row(Some("abc"))))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn unsupported_scheme_is_reported_as_missing_driver() {
    let config = config(&[("MYSQL_URL", "jdbc:postgresql://db:5432/app")]);
    let probe = ScriptedProbe::always(Step::Row(Some("1")));

    let err = run(&config, &probe).await.unwrap_err();

    assert!(matches!(err, HealthCheckError::DriverUnavailable(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(probe.call_times().is_empty());
}

#[tokio::test]
async fn unreachable_host_still_proceeds_to_connection_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    drop(listener);

    let config = config(&[
        ("MYSQL_HOST", "127.0.0.1"),
        ("MYSQL_PORT", port.as_str()),
        ("MYSQL_WAIT_FOR_HOST", "true"),
        ("MYSQL_WAIT_TIMEOUT_MS", "600"),
        ("MYSQL_CONNECT_TIMEOUT_MS", "200"),
    ]);
    let probe = ScriptedProbe::always(Step::Row(Some("1")));

    let started = std::time::Instant::now();
    run(&config, &probe).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(probe.call_times().len(), 1);
}

#[tokio::test]
async fn reachable_host_passes_preflight_quickly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let config = config(&[
        ("MYSQL_HOST", "127.0.0.1"),
        ("MYSQL_PORT", port.as_str()),
        ("MYSQL_WAIT_FOR_HOST", "true"),
        ("MYSQL_WAIT_TIMEOUT_MS", "10000"),
    ]);
    let probe = ScriptedProbe::always(Step::Row(Some("1")));

    let started = std::time::Instant::now();
    run(&config, &probe).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(probe.call_times().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_is_reported_once_with_a_hint() {
    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = config(&[
        ("MYSQL_HOST", "db.internal"),
        ("MYSQL_RETRIES", "2"),
        ("MYSQL_RETRY_DELAY_MS", "10"),
    ]);
    let outcome = run(&config, &ScriptedProbe::always(Step::Refuse)).await;

    assert_eq!(exit_status(&outcome), 1);

    let text = logs.text();
    assert_eq!(text.matches("All attempts to connect/query MySQL have failed.").count(), 1);
    assert!(!text.contains("all 2 attempts to connect/query MySQL failed"));
    assert_eq!(text.matches("Hint: check that the MySQL server").count(), 1);
    assert!(text.contains("db.internal:3306"));
}

#[tokio::test]
async fn exit_status_is_zero_on_pass() {
    let outcome = run(&config(&[]), &ScriptedProbe::always(Step::Row(Some("1")))).await;
    assert_eq!(exit_status(&outcome), 0);
}
