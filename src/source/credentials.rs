//! Named credentials for authenticated clusters.
//!
//! Widgets never carry secrets.  They name an `authKey`, and the
//! [`CredentialStore`] built from the dashboard file resolves it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

/// A username/password pair sent as HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(deserialize_with = "scalar_string")]
    pub username: String,
    #[serde(deserialize_with = "scalar_string")]
    pub password: String,
}

/// Any scalar a config layer may produce.  Environment variables are
/// parsed leniently, so `PASSWORD=12345` arrives as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Read-only map from auth key to [`Credentials`].  Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: Arc<HashMap<String, Credentials>>,
}

impl CredentialStore {
    pub fn new(entries: HashMap<String, Credentials>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, auth_key: &str) -> Option<&Credentials> {
        self.entries.get(auth_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
