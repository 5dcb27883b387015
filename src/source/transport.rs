//! The HTTP boundary.
//!
//! [`Transport`] is the seam between [`HitCountSource`](super::HitCountSource)
//! and the network: it sends one GET and hands back the status and body
//! untouched.  [`HttpTransport`] is the reqwest-backed implementation; tests
//! substitute their own.

use std::future::Future;
use std::time::Duration;

use url::Url;

use super::{Credentials, TransportError};

/// A fully-resolved search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub url: Url,
    /// Sent as HTTP basic auth when present.
    pub credentials: Option<Credentials>,
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends search requests.
///
/// Implementations report only transport-level failures as errors; any
/// response the server sends, whatever its status, is returned as a
/// [`RawResponse`].
pub trait Transport: Send + Sync + 'static {
    fn get(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport.  `timeout` bounds each request end to end; with
    /// `None` a hung server stalls only the widget waiting on it.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("livedash/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        let client = self.client.clone();
        async move {
            let mut builder = client.get(request.url);
            if let Some(credentials) = request.credentials {
                builder = builder.basic_auth(credentials.username, Some(credentials.password));
            }

            let response = builder.send().await.map_err(network)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(network)?;
            Ok(RawResponse { status, body })
        }
    }
}

fn network(err: reqwest::Error) -> TransportError {
    TransportError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let response = |status| RawResponse {
            status,
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(301).is_success());
        assert!(!response(401).is_success());
        assert!(!response(503).is_success());
    }

    #[test]
    fn builds_with_and_without_timeout() {
        assert!(HttpTransport::new(None).is_ok());
        assert!(HttpTransport::new(Some(Duration::from_secs(5))).is_ok());
    }
}
