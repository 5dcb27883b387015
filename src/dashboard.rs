//! Dashboard file loading.
//!
//! The dashboard is a JSON file listing widget declarations and the
//! credentials they may refer to:
//!
//! ```json
//! {
//!   "request_timeout_secs": 10,
//!   "credentials": { "prod": { "username": "elastic", "password": "…" } },
//!   "widgets": [
//!     { "title": "Errors", "url": "https://es.example.com", "index": "logs",
//!       "query": "level:error", "interval": 60000, "authKey": "prod" }
//!   ]
//! }
//! ```
//!
//! Environment variables prefixed with `LIVEDASH_` are layered on top, with
//! `__` separating nested keys, so secrets can stay out of the file:
//! `LIVEDASH_CREDENTIALS__PROD__PASSWORD=…`.  Keys are lowercased, so the
//! example above overrides `credentials.prod.password`.  Numeric or boolean
//! looking values are still read as strings for credentials; quote the
//! value (`…PASSWORD='"007"'`) to keep leading zeros.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;
use serde_json::Value;

use crate::source::{CredentialStore, Credentials};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LIVEDASH_";

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Widget declarations, validated individually by each controller.
    #[serde(default)]
    pub widgets: Vec<Value>,

    #[serde(default)]
    pub credentials: HashMap<String, Credentials>,

    /// Per-request timeout for the HTTP transport.  Unset means requests
    /// may take as long as the server does.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl DashboardConfig {
    /// Load `path` with environment overrides applied.
    ///
    /// The file must exist; a missing file is an error rather than an empty
    /// dashboard.
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        if !path.is_file() {
            return Err(figment::Error::from(format!(
                "dashboard file {} not found",
                path.display()
            )));
        }
        Self::from_figment(
            Figment::new()
                .merge(Json::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.credentials.clone())
    }
}
