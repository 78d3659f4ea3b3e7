//! Configuration for a proxy check.

use std::time::Duration;

use serde::Deserialize;

/// URL requested through the proxy when the caller does not name one.
pub const DEFAULT_TEST_URL: &str = "https://www.google.com";
/// Number of attempt slots per check.
pub const DEFAULT_ATTEMPTS: usize = 3;
/// Retries allowed inside each attempt slot.
pub const DEFAULT_RETRY: usize = 3;
/// Bound on establishing the connection through the proxy.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Bound on receiving the full response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(10_000);
/// User agent sent with every test request.
pub const USER_AGENT: &str = concat!("proxy-probe/", env!("CARGO_PKG_VERSION"));

/// Timeout overrides, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutOptions {
    /// Connect timeout in milliseconds.
    pub connect: Option<u64>,
    /// Response timeout in milliseconds.
    pub response: Option<u64>,
}

/// Caller supplied overrides for a check. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeOptions {
    /// URL requested through the proxy.
    pub url: Option<String>,
    /// Number of attempt slots.
    pub attempts: Option<usize>,
    /// Retries allowed inside each attempt slot.
    pub retry: Option<usize>,
    /// Timeout overrides, merged field by field.
    pub timeout: TimeoutOptions,
}

impl ProbeOptions {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URL requested through the proxy.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the number of attempt slots.
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Set the retries allowed inside each attempt slot.
    pub fn retry(mut self, retry: usize) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.connect = Some(millis_ceil(timeout));
        self
    }

    /// Set the response timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.response = Some(millis_ceil(timeout));
        self
    }

    /// Resolve these overrides against the defaults.
    pub fn merge(&self) -> ProbeConfig {
        merge(Some(self))
    }
}

/// Complete configuration of one check. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// URL requested through the proxy.
    pub url: String,
    /// Number of attempt slots, at least one.
    pub attempts: usize,
    /// Retries allowed inside each attempt slot.
    pub retry: usize,
    /// Bound on establishing the connection through the proxy.
    pub connect_timeout: Duration,
    /// Bound on receiving the full response.
    pub response_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        merge(None)
    }
}

/// Merge caller overrides over the defaults.
///
/// Absent fields take their default; the nested timeouts merge one field at a
/// time. A zero attempt count is raised to one, and so is a zero timeout, in
/// milliseconds.
pub fn merge(overrides: Option<&ProbeOptions>) -> ProbeConfig {
    let empty = ProbeOptions::default();
    let overrides = overrides.unwrap_or(&empty);

    ProbeConfig {
        url: overrides
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_TEST_URL.to_string()),
        attempts: overrides.attempts.unwrap_or(DEFAULT_ATTEMPTS).max(1),
        retry: overrides.retry.unwrap_or(DEFAULT_RETRY),
        connect_timeout: overrides
            .timeout
            .connect
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        response_timeout: overrides
            .timeout
            .response
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT),
    }
}

/// Whole milliseconds in `timeout`, rounded up.
fn millis_ceil(timeout: Duration) -> u64 {
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    if timeout > Duration::from_millis(ms) {
        ms.saturating_add(1)
    } else {
        ms
    }
}
