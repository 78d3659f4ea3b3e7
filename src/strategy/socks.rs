//! SOCKS4/SOCKS5 proxy strategy.

use std::time::Instant;

use log::debug;
use tokio::time;
use tokio_rustls::TlsConnector;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};

use super::{Target, Timeouts};
use crate::error::ProbeError;
use crate::proxy::{ProxyEndpoint, ProxyProtocol};
use crate::stats::Latency;
use crate::transport::{self, BoxedIo};

pub(super) async fn probe(
    tls: &TlsConnector,
    endpoint: &ProxyEndpoint,
    target: &Target,
    timeouts: &Timeouts,
) -> Result<Latency, ProbeError> {
    let started = Instant::now();

    let relay = match time::timeout(timeouts.connect, handshake(endpoint, target)).await {
        Ok(result) => result?,
        Err(_) => return Err(ProbeError::ConnectTimeout(timeouts.connect)),
    };
    // Stamped once the proxy confirmed the relay, a full round trip later
    // than a raw TCP connect.
    let connection = started.elapsed();

    let exchange = async {
        let request = transport::get_request(target.path_and_query(), target, None)?;
        if target.is_secure() {
            let stream = transport::tls_handshake(tls, target.host(), relay).await?;
            transport::fetch(stream, request).await
        } else {
            transport::fetch(relay, request).await
        }
    };

    let status = match time::timeout(timeouts.response, exchange).await {
        Ok(result) => result?,
        Err(_) => return Err(ProbeError::ResponseTimeout(timeouts.response)),
    };

    let response = started.elapsed();
    debug!(
        "{} answered {} through {} in {:?}",
        target.as_str(),
        status,
        endpoint,
        response
    );

    Ok(Latency {
        connection,
        response,
    })
}

/// Connect to the proxy and ask it to relay to the target.
async fn handshake(endpoint: &ProxyEndpoint, target: &Target) -> Result<BoxedIo, ProbeError> {
    let proxy = endpoint.authority();
    let destination = (target.host(), target.port());

    let relay: BoxedIo = match (endpoint.protocol, endpoint.auth.as_ref()) {
        (ProxyProtocol::Socks4, None) => {
            Box::new(Socks4Stream::connect(proxy.as_str(), destination).await?)
        }
        (ProxyProtocol::Socks4, Some(auth)) => Box::new(
            Socks4Stream::connect_with_userid(proxy.as_str(), destination, &auth.username).await?,
        ),
        (_, None) => Box::new(Socks5Stream::connect(proxy.as_str(), destination).await?),
        (_, Some(auth)) => Box::new(
            Socks5Stream::connect_with_password(
                proxy.as_str(),
                destination,
                &auth.username,
                &auth.password,
            )
            .await?,
        ),
    };

    Ok(relay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_silent_proxy_hits_connect_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        // Accept and hold the socket without ever answering the greeting.
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let endpoint = ProxyEndpoint::new("127.0.0.1", port, ProxyProtocol::Socks5);
        let target = Target::parse("http://example.com/").expect("target");
        let timeouts = Timeouts {
            connect: Duration::from_millis(100),
            response: Duration::from_secs(20),
        };

        let tls = transport::tls_connector();
        let err = assert_err!(probe(&tls, &endpoint, &target, &timeouts).await);
        assert!(matches!(err, ProbeError::ConnectTimeout(t) if t == Duration::from_millis(100)));
    }
}
