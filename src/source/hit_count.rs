//! Elasticsearch hit-count source.
//!
//! One cycle is one `GET {url}/{index}/_search?q={query}`; the value is
//! `hits.total` from the response.  Both the pre-7.0 bare number and the
//! newer `{ "value": n, "relation": "eq" }` object are accepted.

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

use super::{
    CredentialStore, DataSource, HttpTransport, SearchRequest, Transport, TransportError,
};
use crate::config::WidgetConfig;

/// Counts the documents matching a widget's query.
#[derive(Debug, Clone)]
pub struct HitCountSource<T = HttpTransport> {
    transport: T,
    credentials: CredentialStore,
}

impl<T: Transport> HitCountSource<T> {
    pub fn new(transport: T, credentials: CredentialStore) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Resolve the request for `config`, attaching credentials only when
    /// the widget names an `authKey`.
    pub fn request_for(&self, config: &WidgetConfig) -> Result<SearchRequest, TransportError> {
        let credentials = match &config.auth_key {
            None => None,
            Some(key) => Some(
                self.credentials
                    .get(key)
                    .cloned()
                    .ok_or_else(|| TransportError::Credentials(key.clone()))?,
            ),
        };
        Ok(SearchRequest {
            url: config.search_url(),
            credentials,
        })
    }
}

impl<T: Transport> DataSource for HitCountSource<T> {
    fn name(&self) -> &str {
        "elasticsearch-hit-count"
    }

    fn fetch(
        &self,
        config: &WidgetConfig,
    ) -> impl Future<Output = Result<u64, TransportError>> + Send {
        let request = self.request_for(config);
        async move {
            let request = request?;
            debug!(url = %request.url, "searching");
            let response = self.transport.get(request).await?;
            if !response.is_success() {
                return Err(TransportError::Network(format!(
                    "server answered HTTP {}",
                    response.status
                )));
            }
            parse_total(&response.body)
        }
    }
}

#[derive(Deserialize)]
struct SearchBody {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    total: Total,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Total {
    Count(u64),
    Tracked { value: u64 },
}

/// Extract `hits.total` from a search response body.
///
/// This is a pure function so the decoding rules can be tested without a
/// transport.
pub fn parse_total(body: &str) -> Result<u64, TransportError> {
    let parsed: SearchBody =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok(match parsed.hits.total {
        Total::Count(n) | Total::Tracked { value: n } => n,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
