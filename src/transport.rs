//! Byte stream and HTTP plumbing shared by the connection strategies.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONNECTION, HOST, PROXY_AUTHORIZATION, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config;
use crate::error::ProbeError;
use crate::proxy::{ProxyAuth, ProxyEndpoint};
use crate::strategy::Target;

/// Any duplex byte stream a request can be sent over.
pub(crate) trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

pub(crate) type BoxedIo = Box<dyn Io>;

/// Build a TLS connector trusting the webpki root set.
pub(crate) fn tls_connector() -> TlsConnector {
    // Fails only when a provider is already installed, which is fine.
    let _ = tokio_rustls::rustls::crypto::ring::default_provider().install_default();

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Open a TCP connection to the proxy, bounded by `timeout`.
pub(crate) async fn connect(
    endpoint: &ProxyEndpoint,
    timeout: Duration,
) -> Result<TcpStream, ProbeError> {
    let connecting = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    match time::timeout(timeout, connecting).await {
        Ok(Ok(stream)) => {
            if let Err(err) = stream.set_nodelay(true) {
                debug!("Cannot set TCP_NODELAY towards {}: {}", endpoint, err);
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(ProbeError::Connect {
            proxy: endpoint.authority(),
            source,
        }),
        Err(_) => Err(ProbeError::ConnectTimeout(timeout)),
    }
}

/// Run a TLS client handshake over `io`, verifying the certificate for `host`.
pub(crate) async fn tls_handshake<S>(
    connector: &TlsConnector,
    host: &str,
    io: S,
) -> Result<TlsStream<S>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ProbeError::ServerName(host.to_string()))?;

    connector
        .connect(server_name, io)
        .await
        .map_err(|source| ProbeError::Tls {
            host: host.to_string(),
            source,
        })
}

/// Build the GET request for `target`.
///
/// `uri` is either the origin form (`/path?query`) for requests sent straight
/// to the target, or the absolute form for requests forwarded by an HTTP proxy.
pub(crate) fn get_request(
    uri: &str,
    target: &Target,
    proxy_auth: Option<&ProxyAuth>,
) -> Result<Request<Empty<Bytes>>, ProbeError> {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(HOST, target.host_header())
        .header(USER_AGENT, config::USER_AGENT)
        .header(ACCEPT, "*/*")
        .header(CONNECTION, "close");

    if let Some(auth) = proxy_auth {
        builder = builder.header(PROXY_AUTHORIZATION, auth.basic_token());
    }

    Ok(builder.body(Empty::new())?)
}

/// Send `request` over `io` and wait until the whole response body arrived.
///
/// The status code is returned for logging only.
pub(crate) async fn fetch<S>(io: S, request: Request<Empty<Bytes>>) -> Result<StatusCode, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;

    drive(conn, async move {
        let response = sender.send_request(request).await?;
        let status = response.status();
        response.into_body().collect().await?;
        Ok::<_, ProbeError>(status)
    })
    .await
}

/// Ask an HTTP proxy to open a CONNECT tunnel to `target`.
pub(crate) async fn open_tunnel<S>(
    io: S,
    target: &Target,
    proxy_auth: Option<&ProxyAuth>,
) -> Result<TokioIo<Upgraded>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let authority = target.authority();
    let mut builder = Request::builder()
        .method(Method::CONNECT)
        .uri(authority.as_str())
        .header(HOST, authority.as_str())
        .header(USER_AGENT, config::USER_AGENT);

    if let Some(auth) = proxy_auth {
        builder = builder.header(PROXY_AUTHORIZATION, auth.basic_token());
    }
    let request = builder.body(Empty::<Bytes>::new())?;

    let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;

    drive(conn.with_upgrades(), async move {
        let response = sender.send_request(request).await?;
        if !response.status().is_success() {
            return Err(ProbeError::Tunnel(response.status()));
        }
        let upgraded = hyper::upgrade::on(response).await?;
        debug!("Tunnel to {} established", authority);
        Ok(TokioIo::new(upgraded))
    })
    .await
}

/// Poll the connection task alongside `exchange` until `exchange` resolves.
///
/// The connection may finish first (server closed, or the stream was handed
/// to an upgrade); the exchange then still has to drain what was delivered.
async fn drive<C, E, T>(conn: C, exchange: E) -> Result<T, ProbeError>
where
    C: Future<Output = hyper::Result<()>>,
    E: Future<Output = Result<T, ProbeError>>,
{
    let mut exchange = pin!(exchange);

    tokio::select! {
        biased;
        result = &mut exchange => return result,
        result = conn => result?,
    }

    exchange.await
}
