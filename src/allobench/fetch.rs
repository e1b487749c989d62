use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::{Config, RetryConfig};
use crate::errors::CurationError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{url} not found")]
    NotFound {
        url: String,
    },
    #[error("HTTP request to {url} failed with status {status}")]
    Status {
        url: String,
        status: u16,
    },
    // transport failures that outlasted every retry
    #[error("{url} unreachable after {attempts} attempts: {message}")]
    Unreachable {
        url: String,
        attempts: u32,
        message: String,
    },
    #[error("bad response from {url}: {message}")]
    BadResponse {
        url: String,
        message: String,
    },
}

impl FetchError {
    pub fn bad_response(url: &str, message: impl ToString) -> FetchError {
        FetchError::BadResponse {
            url: url.to_owned(),
            message: message.to_string(),
        }
    }
}

// Read-only access to the remote databases.  Implemented over HTTP by
// HttpFetcher and by in-memory fakes in the tests.
pub trait Fetch {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>, FetchError>;

    fn get_json<T>(&self, url: &str) -> Result<T, FetchError>
        where T: serde::de::DeserializeOwned, Self: Sized
    {
        let bytes = self.get_bytes(url)?;
        serde_json::from_slice(&bytes).map_err(|err| FetchError::bad_response(url, err))
    }
}

// exponential backoff: min(base * 2^attempt, max) plus `jitter` (a fraction
// of that delay)
pub fn backoff_delay(retry: &RetryConfig, attempt: u32, jitter: f64) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    let delay_ms = retry.base_delay_ms.saturating_mul(factor).min(retry.max_delay_ms);
    let jitter_ms = (delay_ms as f64 * jitter) as u64;
    Duration::from_millis(delay_ms + jitter_ms)
}

// rate limited requests wait twice as long
fn retry_wait(retry: &RetryConfig, attempt: u32, jitter: f64, rate_limited: bool) -> Duration {
    let wait = backoff_delay(retry, attempt, jitter);
    if rate_limited { wait * 2 } else { wait }
}

#[derive(Debug, PartialEq)]
enum AttemptError {
    Retry {
        message: String,
        rate_limited: bool,
        status: Option<u16>,
    },
    Fail(FetchError),
}

// What to do after an unsuccessful status: a 404 fails at once, rate limits
// and server errors are retried, anything else fails.
fn classify(url: &str, status: StatusCode) -> AttemptError {
    match status.as_u16() {
        404 => AttemptError::Fail(FetchError::NotFound { url: url.to_owned() }),
        429 | 500 | 502 | 503 | 504 => {
            let message =
                if let Some(reason) = status.canonical_reason() {
                    format!("{} - {}", status, reason)
                } else {
                    format!("status code: {}", status)
                };
            AttemptError::Retry {
                message,
                rate_limited: status == StatusCode::TOO_MANY_REQUESTS,
                status: Some(status.as_u16()),
            }
        },
        _ => AttemptError::Fail(FetchError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        }),
    }
}

// the error once every attempt has been retried
fn retries_exhausted(url: &str, attempts: u32, last_status: Option<u16>, last_message: String)
    -> FetchError
{
    match last_status {
        Some(status) => FetchError::Status {
            url: url.to_owned(),
            status,
        },
        None => FetchError::Unreachable {
            url: url.to_owned(),
            attempts,
            message: last_message,
        },
    }
}

pub struct HttpFetcher {
    client: Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<HttpFetcher, CurationError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| CurationError::Fatal(format!("failed to create HTTP client: {}", err)))?;

        Ok(HttpFetcher {
            client,
            retry: config.retry.clone(),
        })
    }

    fn attempt(&self, url: &str, body: Option<&serde_json::Value>)
        -> Result<Vec<u8>, AttemptError>
    {
        let request =
            if let Some(body) = body {
                self.client.post(url).json(body)
            } else {
                self.client.get(url)
            };

        let response = request.send().map_err(|err| AttemptError::Retry {
            message: format!("{}", err),
            rate_limited: false,
            status: None,
        })?;

        let status = response.status();

        if status.is_success() {
            return response.bytes()
                .map(|bytes| bytes.to_vec())
                .map_err(|err| AttemptError::Retry {
                    message: format!("failed reading body: {}", err),
                    rate_limited: false,
                    status: None,
                });
        }

        Err(classify(url, status))
    }

    fn request(&self, url: &str, body: Option<&serde_json::Value>) -> Result<Vec<u8>, FetchError> {
        let attempts = self.retry.max_retries.max(1);
        let mut last_message = String::new();
        let mut last_status = None;

        for attempt in 0..attempts {
            debug!("request to {} (attempt {}/{})", url, attempt + 1, attempts);

            match self.attempt(url, body) {
                Ok(bytes) => return Ok(bytes),
                Err(AttemptError::Fail(err)) => return Err(err),
                Err(AttemptError::Retry { message, rate_limited, status }) => {
                    warn!("request to {} failed (attempt {}/{}): {}",
                          url, attempt + 1, attempts, message);
                    last_message = message;
                    last_status = status;

                    if attempt + 1 < attempts {
                        let jitter = rand::thread_rng().gen_range(0.1..0.3);
                        let wait = retry_wait(&self.retry, attempt, jitter, rate_limited);
                        debug!("waiting {:.1} seconds before retry", wait.as_secs_f64());
                        thread::sleep(wait);
                    }
                },
            }
        }

        Err(retries_exhausted(url, attempts, last_status, last_message))
    }
}

impl Fetch for HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.request(url, None)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>, FetchError> {
        self.request(url, Some(body))
    }
}

// Counts lookups in a row that failed because the network was unreachable.
// Reaching the limit means connectivity is gone and the run must stop.
#[derive(Debug, Clone)]
pub struct NetworkGuard {
    limit: usize,
    consecutive_failures: usize,
}

impl NetworkGuard {
    pub fn new(limit: usize) -> NetworkGuard {
        NetworkGuard {
            limit: limit.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn check<T>(&mut self, result: &Result<T, FetchError>) -> Result<(), CurationError> {
        match result {
            Err(FetchError::Unreachable { url, .. }) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.limit {
                    return Err(CurationError::Fatal(
                        format!("network connectivity lost: {} lookups in a row failed, last: {}",
                                self.consecutive_failures, url)));
                }
            },
            _ => self.consecutive_failures = 0,
        }
        Ok(())
    }
}

#[test]
fn test_backoff_delay() {
    let retry = RetryConfig {
        max_retries: 5,
        base_delay_ms: 1000,
        max_delay_ms: 60_000,
    };
    assert_eq!(backoff_delay(&retry, 0, 0.0), Duration::from_millis(1000));
    assert_eq!(backoff_delay(&retry, 3, 0.0), Duration::from_millis(8000));
    assert_eq!(backoff_delay(&retry, 3, 0.25), Duration::from_millis(10_000));
    assert_eq!(backoff_delay(&retry, 10, 0.0), Duration::from_millis(60_000));
    assert_eq!(backoff_delay(&retry, 100, 0.0), Duration::from_millis(60_000));

    assert_eq!(retry_wait(&retry, 1, 0.0, false), Duration::from_millis(2000));
    assert_eq!(retry_wait(&retry, 1, 0.0, true), Duration::from_millis(4000));
}

#[test]
fn test_classify_status() {
    let url = "https://example.org/entry";

    assert_eq!(classify(url, StatusCode::NOT_FOUND),
               AttemptError::Fail(FetchError::NotFound { url: url.to_owned() }));
    assert_eq!(classify(url, StatusCode::FORBIDDEN),
               AttemptError::Fail(FetchError::Status { url: url.to_owned(), status: 403 }));
    assert_eq!(classify(url, StatusCode::BAD_REQUEST),
               AttemptError::Fail(FetchError::Status { url: url.to_owned(), status: 400 }));

    for code in [500, 502, 503, 504] {
        let status = StatusCode::from_u16(code).unwrap();
        match classify(url, status) {
            AttemptError::Retry { rate_limited, status, .. } => {
                assert!(!rate_limited);
                assert_eq!(status, Some(code));
            },
            other => panic!("{} should be retried, got {:?}", code, other),
        }
    }

    match classify(url, StatusCode::TOO_MANY_REQUESTS) {
        AttemptError::Retry { rate_limited, message, .. } => {
            assert!(rate_limited);
            assert_eq!(message, "429 Too Many Requests - Too Many Requests");
        },
        other => panic!("429 should be retried, got {:?}", other),
    }
}

#[test]
fn test_retries_exhausted() {
    let url = "https://example.org/entry";

    assert_eq!(retries_exhausted(url, 5, Some(503), "503 Service Unavailable".to_owned()),
               FetchError::Status { url: url.to_owned(), status: 503 });
    assert_eq!(retries_exhausted(url, 5, None, "connection refused".to_owned()),
               FetchError::Unreachable {
                   url: url.to_owned(),
                   attempts: 5,
                   message: "connection refused".to_owned(),
               });
}

#[test]
fn test_network_guard() {
    let unreachable: Result<(), FetchError> = Err(FetchError::Unreachable {
        url: "https://example.org".to_owned(),
        attempts: 5,
        message: "connection refused".to_owned(),
    });
    let not_found: Result<(), FetchError> = Err(FetchError::NotFound {
        url: "https://example.org".to_owned(),
    });

    let mut guard = NetworkGuard::new(2);
    assert!(guard.check(&unreachable).is_ok());
    assert!(guard.check(&not_found).is_ok());
    assert!(guard.check(&unreachable).is_ok());
    let err = guard.check(&unreachable).unwrap_err();
    assert!(err.is_fatal());
}
