//! Retry with exponential backoff over transient provider failures.
//!
//! Classification is intentionally name-based: vendors expose wildly
//! different error taxonomies, so a case-insensitive substring test
//! over the rendered error catches them uniformly. Structured fast
//! paths cover the cases our own error type already distinguishes.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::ProviderError;

/// Markers that identify a transient failure in an error's text.
const RETRYABLE_MARKERS: &[&str] = &[
    "timeout",
    "rate_limit",
    "ratelimit",
    "connection",
    "503",
    "529",
    "internalserver",
];

const BASE_DELAY_SECS: f64 = 1.0;

/// Whether an error is transient and worth retrying.
pub fn is_transient(err: &ProviderError) -> bool {
    match err {
        ProviderError::RateLimited { .. } => true,
        ProviderError::Api { status, .. } if matches!(status, 500 | 503 | 529) => true,
        other => {
            let text = other.to_string().to_lowercase();
            RETRYABLE_MARKERS.iter().any(|m| text.contains(m))
        }
    }
}

static REDACTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(sk-[A-Za-z0-9_-]{8})[A-Za-z0-9_-]+").unwrap(), "$1..."),
        (Regex::new(r"(key-[A-Za-z0-9]{8})[A-Za-z0-9]+").unwrap(), "$1..."),
        (Regex::new(r"(AIza[A-Za-z0-9_-]{8})[A-Za-z0-9_-]+").unwrap(), "$1..."),
        (Regex::new(r"(ya29\.)[A-Za-z0-9_.-]+").unwrap(), "$1..."),
        (Regex::new(r"(Bearer\s+)[A-Za-z0-9_./+-]+").unwrap(), "$1[REDACTED]"),
    ]
});

/// Strip API keys and tokens from an error message before logging.
pub fn sanitize_log_message(err: &ProviderError) -> String {
    let mut text = err.to_string();
    for (pattern, replacement) in REDACTIONS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}

/// Run `op`, retrying transient failures up to `max_retries` extra
/// attempts with delays of `1s * 2^attempt`.
///
/// Fatal errors are raised immediately; after exhaustion the last
/// transient cause is surfaced unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err: Option<ProviderError> = None;

    for attempt in 0..=max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }

        if attempt < max_retries {
            let delay =
                Duration::from_secs_f64(BASE_DELAY_SECS * 2f64.powi(attempt as i32));
            if let Some(err) = &last_err {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_secs = delay.as_secs_f64(),
                    error = %sanitize_log_message(err),
                    "retrying after transient provider failure"
                );
            }
            tokio::time::sleep(delay).await;
        }
    }

    // max_retries transient failures in a row; surface the last cause.
    Err(last_err.expect("retry loop exited without an error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&ProviderError::RateLimited { retry_after: None }));
        assert!(is_transient(&ProviderError::Api {
            status: 503,
            message: "overloaded".to_string()
        }));
        assert!(is_transient(&ProviderError::Api {
            status: 529,
            message: "overloaded".to_string()
        }));
        assert!(is_transient(&ProviderError::Api {
            status: 500,
            message: "InternalServerError".to_string()
        }));
        assert!(is_transient(&ProviderError::Http(
            "request timeout: deadline elapsed".to_string()
        )));
        assert!(is_transient(&ProviderError::Http(
            "connection failed: reset by peer".to_string()
        )));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!is_transient(&ProviderError::Api {
            status: 401,
            message: "invalid api key".to_string()
        }));
        assert!(!is_transient(&ProviderError::Api {
            status: 404,
            message: "model not found".to_string()
        }));
        assert!(!is_transient(&ProviderError::Parse("bad json".to_string())));
        assert!(!is_transient(&ProviderError::NotConfigured("no key".to_string())));
    }

    #[test]
    fn test_marker_match_is_case_insensitive() {
        assert!(is_transient(&ProviderError::Http("Connection reset".to_string())));
        assert!(is_transient(&ProviderError::Http("RateLimit hit".to_string())));
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let err = ProviderError::Http(
            "401 for key sk-proj-abcdefgh12345678 with Bearer ya29.token".to_string(),
        );
        let sanitized = sanitize_log_message(&err);
        assert!(!sanitized.contains("12345678"));
        assert!(sanitized.contains("sk-proj-ab"));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Api { status: 401, message: "bad key".to_string() })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_bounded_and_last_cause_surfaced() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(ProviderError::Http(format!("connection failed: attempt {n}")))
            }
        })
        .await;
        // 1 initial + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.unwrap_err().to_string().contains("attempt 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::RateLimited { retry_after: None })
                } else {
                    Ok("answer".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::RateLimited { retry_after: None }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
