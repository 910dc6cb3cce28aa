//! HTTP probe execution.

use std::time::{Duration, Instant};

use crate::db::PollOutcome;

/// How long a probe may wait for a response before counting as down.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Classified outcome of a single probe attempt.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub outcome: PollOutcome,
    /// Wall-clock time spent on the attempt, success or not.
    pub elapsed_ms: i64,
    /// HTTP status, 0 when no response was received.
    pub status_code: u16,
    /// Transport-level description, present only when no response arrived.
    pub error: Option<String>,
}

/// Issues bounded-time GET probes against target URLs.
///
/// The underlying client is built once and shared, so connection pools and
/// TLS sessions are reused across probes.
pub struct ProbeExecutor {
    client: reqwest::Client,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Probe a URL once. Never fails: transport errors come back as offline
    /// reports carrying a description instead.
    ///
    /// Resolution means receiving the response head; the body is not read,
    /// so a slow payload does not inflate the measured time.
    pub async fn probe(&self, url: &str) -> ProbeReport {
        let start = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let elapsed_ms = start.elapsed().as_millis() as i64;
                let status_code = response.status().as_u16();
                ProbeReport {
                    outcome: classify_status(status_code),
                    elapsed_ms,
                    status_code,
                    error: None,
                }
            }
            Err(err) => ProbeReport {
                outcome: PollOutcome::Offline,
                elapsed_ms: start.elapsed().as_millis() as i64,
                status_code: 0,
                error: Some(self.describe_error(&err)),
            },
        }
    }

    fn describe_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("request timed out after {:?}", self.timeout)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        }
    }
}

/// Anything from 200 up to (not including) 400 counts as online. 4xx and
/// 5xx both mean the target is not serving, even though a response arrived.
fn classify_status(status: u16) -> PollOutcome {
    if (200..400).contains(&status) {
        PollOutcome::Online
    } else {
        PollOutcome::Offline
    }
}
