//! Oracle transport.
//!
//! `OracleTransport` is the seam between request/response handling and
//! the network. `HttpTransport` speaks HTTP/1.1 over TCP, wrapped in TLS
//! for `https` endpoints, with the whole exchange bounded by a timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::TransportError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Status line, rate-limit hint, and body of an oracle response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<f64>,
    pub body: Vec<u8>,
}

/// Sends one request body to the oracle and returns the raw response.
pub trait OracleTransport: Send + Sync {
    fn post<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

impl<T: OracleTransport + ?Sized> OracleTransport for Arc<T> {
    fn post<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        (**self).post(body)
    }
}

/// Parse a `Retry-After` value given in seconds. HTTP-date values and
/// anything negative or non-finite count as absent.
pub fn parse_retry_after(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

struct TlsSettings {
    connector: tokio_rustls::TlsConnector,
    server_name: rustls::pki_types::ServerName<'static>,
}

/// HTTP(S) transport built on a hyper client connection per request.
pub struct HttpTransport {
    uri: Uri,
    host: String,
    port: u16,
    api_key: String,
    timeout: Duration,
    tls: Option<TlsSettings>,
}

impl HttpTransport {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self, TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        let host = uri
            .host()
            .ok_or_else(|| TransportError::InvalidUrl(format!("{url}: missing host")))?
            .to_string();

        let (port, tls) = match uri.scheme_str() {
            Some("https") => (uri.port_u16().unwrap_or(443), Some(tls_settings(&host)?)),
            Some("http") => (uri.port_u16().unwrap_or(80), None),
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "{url}: unsupported scheme {other:?}"
                )));
            }
        };

        Ok(Self {
            uri,
            host,
            port,
            api_key: api_key.to_string(),
            timeout,
            tls,
        })
    }

    async fn exchange(&self, body: Bytes) -> Result<RawResponse, TransportError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::Connect(format!("{}:{}: {e}", self.host, self.port)))?;
        let _ = stream.set_nodelay(true);

        let req = self.build_request(body)?;

        match &self.tls {
            Some(tls) => {
                let stream = tls
                    .connector
                    .connect(tls.server_name.clone(), stream)
                    .await
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                send(TokioIo::new(stream), req).await
            }
            None => send(TokioIo::new(stream), req).await,
        }
    }

    fn build_request(&self, body: Bytes) -> Result<Request<Full<Bytes>>, TransportError> {
        let path = self
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let authority = self
            .uri
            .authority()
            .map(|a| a.as_str())
            .unwrap_or(self.host.as_str());

        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::HOST, authority)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "warpplan/0.1")
            .header("x-goog-api-key", self.api_key.as_str())
            .body(Full::new(body))
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

impl OracleTransport for HttpTransport {
    fn post<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let encoded = serde_json::to_vec(body)
                .map_err(|e| TransportError::Http(format!("encode body: {e}")))?;

            match tokio::time::timeout(self.timeout, self.exchange(Bytes::from(encoded))).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(host = %self.host, "oracle request timed out");
                    Err(TransportError::Timeout(self.timeout.as_secs_f64()))
                }
            }
        })
    }
}

async fn send<S>(io: TokioIo<S>, req: Request<Full<Bytes>>) -> Result<RawResponse, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| TransportError::Http(format!("handshake: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "oracle connection closed with error");
        }
    });

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| TransportError::Http(e.to_string()))?;

    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| TransportError::Http(format!("read body: {e}")))?
        .to_bytes();

    Ok(RawResponse {
        status,
        retry_after,
        body: body.to_vec(),
    })
}

fn tls_settings(host: &str) -> Result<TlsSettings, TransportError> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::ring::default_provider().into(),
    )
    .with_safe_default_protocol_versions()
    .map_err(|e| TransportError::Tls(format!("protocol versions: {e}")))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    let server_name = rustls::pki_types::ServerName::try_from(host)
        .map_err(|e| TransportError::InvalidUrl(format!("invalid tls server name '{host}': {e}")))?
        .to_owned();

    Ok(TlsSettings {
        connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
        server_name,
    })
}
