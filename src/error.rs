//! Error types for the proxy-probe crate.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Error returned to the caller of a check.
///
/// These describe a broken configuration rather than an unhealthy proxy, so
/// they abort the check before any network activity.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The proxy protocol is not one of http, https, socks4 or socks5.
    #[error("Unsupported proxy protocol: {0}")]
    UnsupportedProtocol(String),
    /// The proxy address could not be parsed.
    #[error("Invalid proxy address {address:?}: {reason}")]
    InvalidProxy { address: String, reason: String },
    /// The test URL is not an absolute http or https URL.
    #[error("Invalid test url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Error from a single connect + request cycle.
///
/// The engine turns every one of these into retry bookkeeping; none of them
/// reach the caller of a check.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// TCP connection to the proxy failed (DNS, refused, unreachable).
    #[error("Cannot connect to proxy {proxy}: {source}")]
    Connect {
        proxy: String,
        #[source]
        source: io::Error,
    },
    /// The connect phase did not finish in time.
    #[error("Connect phase timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// The full response was not received in time.
    #[error("Request timeout after {0:?}")]
    ResponseTimeout(Duration),
    /// The SOCKS proxy rejected or broke the handshake.
    #[error("SOCKS handshake failed: {0}")]
    Socks(#[from] tokio_socks::Error),
    /// TLS handshake failed, including certificate verification.
    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: io::Error,
    },
    /// The host cannot be used as a TLS server name.
    #[error("Invalid TLS server name {0:?}")]
    ServerName(String),
    /// The HTTP proxy answered the CONNECT request with a non-success status.
    #[error("Proxy refused tunnel with status {0}")]
    Tunnel(http::StatusCode),
    /// HTTP transport failure (reset, malformed response, early close).
    #[error("HTTP transport error: {0}")]
    Http(#[from] hyper::Error),
    /// The outgoing request could not be assembled.
    #[error("Cannot build request: {0}")]
    Request(#[from] http::Error),
}

impl ProbeError {
    /// Whether this failure was caused by one of the configured timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout(_) | Self::ResponseTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(ProbeError::ConnectTimeout(Duration::from_millis(5)).is_timeout());
        assert!(ProbeError::ResponseTimeout(Duration::from_millis(5)).is_timeout());
        assert!(!ProbeError::Tunnel(http::StatusCode::BAD_GATEWAY).is_timeout());
    }

    #[test]
    fn test_unsupported_protocol_message() {
        let err = CheckError::UnsupportedProtocol("ftp".to_string());
        assert_eq!(err.to_string(), "Unsupported proxy protocol: ftp");
    }
}
