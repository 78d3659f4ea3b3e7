//! Connection strategies and the protocol dispatcher.
//!
//! A strategy performs exactly one connect + GET cycle through the proxy and
//! reports two timestamps measured from a single start instant. There are two
//! of them: HTTP tunneling for HTTP/HTTPS proxies and a SOCKS handshake for
//! SOCKS4/SOCKS5 proxies.

mod socks;
mod tunnel;

use std::time::Duration;

use async_trait::async_trait;
use tokio_rustls::TlsConnector;
use url::{Position, Url};

use crate::config::ProbeConfig;
use crate::error::{CheckError, ProbeError};
use crate::proxy::{ProxyEndpoint, ProxyProtocol};
use crate::stats::Latency;
use crate::transport;

/// The test URL, parsed once per check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    host: String,
    port: u16,
    secure: bool,
}

impl Target {
    /// Parse an absolute http or https URL.
    pub fn parse(url: &str) -> Result<Self, CheckError> {
        let invalid = |reason: &str| CheckError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let secure = match parsed.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(invalid("scheme must be http or https")),
        };
        let host = match parsed.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            Some(url::Host::Ipv4(ip)) => ip.to_string(),
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(invalid("missing host")),
        };
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            url: parsed,
            host,
            port,
            secure,
        })
    }

    /// Host name or IP address, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the target is reached over TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Absolute form without fragment, for requests forwarded by a proxy.
    pub(crate) fn absolute(&self) -> &str {
        &self.url[..Position::AfterQuery]
    }

    /// Origin form, `/path?query`.
    pub(crate) fn path_and_query(&self) -> &str {
        &self.url[Position::BeforePath..Position::AfterQuery]
    }

    /// Value of the `Host` header; the port is omitted when it is the default.
    pub(crate) fn host_header(&self) -> &str {
        &self.url[Position::BeforeHost..Position::AfterPort]
    }

    /// `host:port` with the port always present, for CONNECT.
    pub(crate) fn authority(&self) -> String {
        let host = &self.url[Position::BeforeHost..Position::AfterHost];
        format!("{}:{}", host, self.port)
    }
}

/// Timeouts applied to one connect + request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub response: Duration,
}

impl From<&ProbeConfig> for Timeouts {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            connect: config.connect_timeout,
            response: config.response_timeout,
        }
    }
}

/// One connect + request cycle through a proxy.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Establish a connection to `target` through `endpoint`, issue one GET
    /// and wait for the full response.
    async fn probe(
        &self,
        endpoint: &ProxyEndpoint,
        target: &Target,
        timeouts: &Timeouts,
    ) -> Result<Latency, ProbeError>;
}

/// How the connection to the target is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain forwarding or CONNECT tunneling through an HTTP/HTTPS proxy.
    HttpTunnel,
    /// SOCKS4/SOCKS5 handshake, TLS on top for https targets.
    Socks,
}

impl Strategy {
    pub fn select(protocol: ProxyProtocol) -> Self {
        match protocol {
            ProxyProtocol::Http | ProxyProtocol::Https => Strategy::HttpTunnel,
            ProxyProtocol::Socks4 | ProxyProtocol::Socks5 => Strategy::Socks,
        }
    }
}

/// Production [`Probe`]: picks the strategy from the proxy protocol and runs it
/// over real sockets.
#[derive(Clone)]
pub struct Dispatcher {
    tls: TlsConnector,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_tls(transport::tls_connector())
    }

    /// Use `tls` for every TLS handshake, to the proxy and to the target.
    ///
    /// [`Dispatcher::new`] trusts the webpki roots; a custom connector lets a
    /// private CA or a pinned certificate be trusted instead.
    pub fn with_tls(tls: TlsConnector) -> Self {
        Self { tls }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for Dispatcher {
    async fn probe(
        &self,
        endpoint: &ProxyEndpoint,
        target: &Target,
        timeouts: &Timeouts,
    ) -> Result<Latency, ProbeError> {
        match Strategy::select(endpoint.protocol) {
            Strategy::HttpTunnel => tunnel::probe(&self.tls, endpoint, target, timeouts).await,
            Strategy::Socks => socks::probe(&self.tls, endpoint, target, timeouts).await,
        }
    }
}
