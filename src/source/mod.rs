//! Data source abstraction layer.
//!
//! A [`DataSource`] turns a validated [`WidgetConfig`] into one number per
//! cycle.  The polling controller knows nothing else about where the number
//! comes from.  The only concrete source today is [`HitCountSource`], which
//! counts Elasticsearch search hits.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `doc_count.rs`).
//! 2. Define a struct holding whatever clients it needs and implement
//!    [`DataSource`] for it.
//! 3. Add `mod doc_count;` below and re-export the struct.
//! 4. Hand an instance to [`PollingController::new`](crate::poll::PollingController::new).

mod credentials;
mod hit_count;
mod transport;

pub use credentials::{CredentialStore, Credentials};
pub use hit_count::{parse_total, HitCountSource};
pub use transport::{HttpTransport, RawResponse, SearchRequest, Transport};

use std::future::Future;

use thiserror::Error;

use crate::config::WidgetConfig;
use crate::state::FailureCause;

/// Why a single fetch failed.
///
/// Every variant is recoverable: the controller publishes a failed state
/// and tries again on the next cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent, or the server answered with a
    /// non-success status.
    #[error("network error: {0}")]
    Network(String),

    /// The body was not the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The widget names an `authKey` that has no credentials.
    #[error("no credentials registered for auth key `{0}`")]
    Credentials(String),
}

impl TransportError {
    pub fn cause(&self) -> FailureCause {
        match self {
            Self::Network(_) => FailureCause::Network,
            Self::Decode(_) => FailureCause::Decode,
            Self::Credentials(_) => FailureCause::Credentials,
        }
    }
}

/// Trait that every data source must implement.
///
/// The polling controller calls [`fetch()`](DataSource::fetch) from a tokio
/// task once per cycle, never concurrently for the same widget.  Sources
/// may be shared between widgets, so implementations must be [`Send`] and
/// [`Sync`].
pub trait DataSource: Send + Sync + 'static {
    /// Short label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the current value for `config`.
    fn fetch(
        &self,
        config: &WidgetConfig,
    ) -> impl Future<Output = Result<u64, TransportError>> + Send;
}
