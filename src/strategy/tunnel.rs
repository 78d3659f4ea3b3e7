//! HTTP/HTTPS proxy strategy.
//!
//! Plain http targets are forwarded: the GET goes to the proxy in absolute
//! form. https targets go through a CONNECT tunnel with TLS to the target on
//! top. An https proxy is itself reached over TLS first.

use std::time::Instant;

use log::debug;
use tokio::time;
use tokio_rustls::TlsConnector;

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

    let exchange = async {
        let stream = transport::connect(endpoint, timeouts.connect).await?;
        // Stamped at TCP connect to the proxy, before anything is sent.
        let connection = started.elapsed();

        let proxy: BoxedIo = if endpoint.protocol == ProxyProtocol::Https {
            Box::new(transport::tls_handshake(tls, &endpoint.host, stream).await?)
        } else {
            Box::new(stream)
        };
        let auth = endpoint.auth.as_ref();

        let status = if target.is_secure() {
            let tunnel = transport::open_tunnel(proxy, target, auth).await?;
            let stream = transport::tls_handshake(tls, target.host(), tunnel).await?;
            let request = transport::get_request(target.path_and_query(), target, None)?;
            transport::fetch(stream, request).await?
        } else {
            let request = transport::get_request(target.absolute(), target, auth)?;
            transport::fetch(proxy, request).await?
        };

        let response = started.elapsed();
        debug!(
            "{} answered {} through {} in {:?}",
            target.as_str(),
            status,
            endpoint,
            response
        );

        Ok::<_, ProbeError>(Latency {
            connection,
            response,
        })
    };

    match time::timeout(timeouts.response, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::ResponseTimeout(timeouts.response)),
    }
}
