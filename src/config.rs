//! Widget declaration validation.
//!
//! A widget is declared as a loose JSON object (usually one entry of the
//! `widgets` array in the dashboard file).  [`validate`] checks it against
//! the hit-count schema and produces a fully-defaulted [`WidgetConfig`].
//! Nothing reaches the network until a declaration has passed through here.
//!
//! ## Schema
//!
//! | field      | type   | rule                                  |
//! |------------|--------|---------------------------------------|
//! | `url`      | string | required, absolute `http`/`https` URL |
//! | `index`    | string | required, non-empty                   |
//! | `query`    | string | required, non-empty                   |
//! | `interval` | number | optional, positive whole milliseconds (`1000.0` ok) |
//! | `title`    | string | optional                              |
//! | `authKey`  | string | optional, key into the credential map |

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Refresh interval used when a declaration does not set one (5 minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(300_000);

/// Title used when a declaration does not set one.
pub const DEFAULT_TITLE: &str = "Hit Count";

/// A validated hit-count widget configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Base URL of the Elasticsearch cluster.
    pub url: Url,
    /// Index (or index pattern) to search.
    pub index: String,
    /// Lucene query string passed as `q`.
    pub query: String,
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Heading shown above the value.
    pub title: String,
    /// Name of the credentials entry to authenticate with, if any.
    pub auth_key: Option<String>,
}

impl WidgetConfig {
    /// The search endpoint: `{url}/{index}/_search?q={query}`.
    pub fn search_url(&self) -> Url {
        let mut url = self.url.clone();
        // http(s) URLs always have a hierarchical path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.index).push("_search");
        }
        url.query_pairs_mut().append_pair("q", &self.query);
        url
    }
}

/// Why a widget declaration was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("widget declaration must be an object")]
    NotAnObject,

    #[error("`{0}` is required")]
    Missing(&'static str),

    #[error("`{0}` must be a string")]
    NotAString(&'static str),

    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    #[error("`url` is not a valid absolute URL ({value:?}): {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("`url` must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("`interval` must be a positive whole number of milliseconds, got {0}")]
    InvalidInterval(Value),
}

/// Validate a widget declaration.
///
/// Checks run in field order and stop at the first failure.
pub fn validate(raw: &Value) -> Result<WidgetConfig, ValidationError> {
    let fields = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let url = parse_url(required_str(fields, "url")?)?;
    let index = required_str(fields, "index")?.to_owned();
    let query = required_str(fields, "query")?.to_owned();
    let interval = match fields.get("interval") {
        None | Some(Value::Null) => DEFAULT_INTERVAL,
        Some(value) => parse_interval(value)?,
    };
    let title = optional_str(fields, "title")?
        .unwrap_or(DEFAULT_TITLE)
        .to_owned();
    let auth_key = optional_str(fields, "authKey")?.map(str::to_owned);

    Ok(WidgetConfig {
        url,
        index,
        query,
        interval,
        title,
        auth_key,
    })
}

/// The title a declaration asks for, without validating anything else.
///
/// Hosts use this to label a widget before (or even if) validation runs.
pub fn declared_title(raw: &Value) -> &str {
    raw.get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TITLE)
}

fn required_str<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, ValidationError> {
    let value = optional_str(fields, name)?.ok_or(ValidationError::Missing(name))?;
    if value.is_empty() {
        return Err(ValidationError::Empty(name));
    }
    Ok(value)
}

fn optional_str<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<Option<&'a str>, ValidationError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::NotAString(name)),
    }
}

fn parse_url(value: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(value).map_err(|source| ValidationError::InvalidUrl {
        value: value.to_owned(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme(other.to_owned())),
    }
}

fn parse_interval(value: &Value) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidInterval(value.clone());
    if let Some(ms) = value.as_u64() {
        return if ms > 0 {
            Ok(Duration::from_millis(ms))
        } else {
            Err(invalid())
        };
    }
    // `1000.0` is as good as `1000`.
    match value.as_f64() {
        Some(ms) if ms > 0.0 && ms.fract() == 0.0 && ms <= u64::MAX as f64 => {
            Ok(Duration::from_millis(ms as u64))
        }
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
