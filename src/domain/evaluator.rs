//! Decides whether a health check row counts as healthy

use crate::config::DEFAULT_QUERY;
use crate::domain::models::FirstColumn;

/// Outcome of evaluating a query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// A row came back but did not satisfy the expectation
    Mismatch { actual: Option<String> },
    NoRows,
}

/// Evaluate the query result against the configured expectation
///
/// With an expectation, the first column must match it as a string or as a
/// number. Without one, the default `SELECT 1` must return 1 and any other
/// query passes as soon as it returns a row.
pub fn evaluate(query: &str, expected: Option<&str>, row: Option<&FirstColumn>) -> Verdict {
    let Some(row) = row else {
        return Verdict::NoRows;
    };

    let pass = match expected {
        Some(expected) => values_match(row.value(), expected),
        None if is_default_query(query) => row
            .value()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|v| v == 1)
            .unwrap_or(false),
        None => true,
    };

    if pass {
        Verdict::Pass
    } else {
        Verdict::Mismatch {
            actual: row.0.clone(),
        }
    }
}

pub fn is_default_query(query: &str) -> bool {
    query.trim().eq_ignore_ascii_case(DEFAULT_QUERY)
}

/// Exact match on trimmed text, falling back to numeric equality
///
/// Any value that is neither an exact match nor numeric on both sides is a
/// mismatch.
pub fn values_match(actual: Option<&str>, expected: &str) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let actual = actual.trim();
    let expected = expected.trim();
    if actual == expected {
        return true;
    }

    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(e)) => a.total_cmp(&e).is_eq(),
        _ => false,
    }
}
