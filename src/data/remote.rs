//! Remote dataset download with bounded retries.

use std::time::Duration;

use log::{info, warn};
use reqwest::blocking::Client;

use crate::error::AppError;

/// Dataset location used when neither `--data` nor `QREG_DATA_URL` is set.
pub const DEFAULT_DATA_URL: &str = "http://www.stata-press.com/data/mus/mus03data.dta";

const ENV_DATA_URL: &str = "QREG_DATA_URL";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Outcome of one download attempt that did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// Worth retrying: connection problems, timeouts, 5xx.
    Transient(String),
    /// Retrying will not help: 4xx, bad URL.
    Permanent(String),
}

/// Resolve the dataset URL from `.env` / environment, falling back to the default.
pub fn data_url_from_env() -> String {
    dotenvy::dotenv().ok();
    std::env::var(ENV_DATA_URL).unwrap_or_else(|_| DEFAULT_DATA_URL.to_string())
}

pub struct DatasetFetcher {
    client: Client,
    max_attempts: usize,
    backoff: Duration,
}

impl DatasetFetcher {
    pub fn new(max_attempts: usize) -> Result<Self, AppError> {
        if max_attempts == 0 {
            return Err(AppError::InvalidParameter(
                "Fetch attempts must be >= 1.".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::DataUnavailable(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            max_attempts,
            backoff: BACKOFF_STEP,
        })
    }

    /// Download `url` into memory, retrying transient failures.
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AppError> {
        info!("Fetching dataset from {url}");
        let bytes = with_retries(self.max_attempts, self.backoff, |_| self.attempt(url))?;
        info!("Fetched {} bytes", bytes.len());
        Ok(bytes)
    }

    fn attempt(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_builder() {
                AttemptError::Permanent(format!("invalid request: {e}"))
            } else {
                AttemptError::Transient(format!("request failed: {e}"))
            }
        })?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Permanent(format!("server returned {status}")));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| AttemptError::Transient(format!("reading body failed: {e}")))
    }
}

/// Run `op` up to `max_attempts` times with linear backoff between attempts.
///
/// `op` receives the 1-based attempt number. Permanent errors stop immediately;
/// exhausting the attempts yields `DataUnavailable` with the last error.
pub fn with_retries<T, F>(max_attempts: usize, backoff: Duration, mut op: F) -> Result<T, AppError>
where
    F: FnMut(usize) -> Result<T, AttemptError>,
{
    let mut last = String::from("no attempts made");
    for attempt in 1..=max_attempts {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(AttemptError::Permanent(msg)) => {
                return Err(AppError::DataUnavailable(msg));
            }
            Err(AttemptError::Transient(msg)) => {
                warn!("Dataset fetch attempt {attempt}/{max_attempts} failed: {msg}");
                last = msg;
                if attempt < max_attempts {
                    std::thread::sleep(backoff * attempt as u32);
                }
            }
        }
    }
    Err(AppError::DataUnavailable(format!(
        "giving up after {max_attempts} attempts: {last}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_transient_failures_then_succeeds() {
        let mut calls = 0;
        let out = with_retries(3, Duration::ZERO, |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(AttemptError::Transient("timeout".into()))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let err = with_retries::<(), _>(2, Duration::ZERO, |_| {
            calls += 1;
            Err(AttemptError::Transient("connection reset".into()))
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        match err {
            AppError::DataUnavailable(msg) => assert!(msg.contains("2 attempts")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let mut calls = 0;
        let err = with_retries::<(), _>(5, Duration::ZERO, |_| {
            calls += 1;
            Err(AttemptError::Permanent("404 Not Found".into()))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[test]
    fn zero_attempts_is_invalid() {
        assert!(matches!(
            DatasetFetcher::new(0),
            Err(AppError::InvalidParameter(_))
        ));
    }
}
