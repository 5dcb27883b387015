//! livedash: self-refreshing dashboard widgets.
//!
//! ## Architecture overview
//!
//! ```text
//!  declaration ──► config::validate ──► WidgetConfig
//!                                            │
//!  ┌────────────────────── poll::PollingController ─────────────────────┐
//!  │ Fetching ──► source::DataSource::fetch ──► Settling ──► Scheduled │
//!  │     ▲                                         │            │       │
//!  │     └─────────────────── PollHandle ◄─────────┼────────────┘       │
//!  └───────────────────────────────────────────────┼────────────────────┘
//!                                                  ▼
//!                                     state::DisplayState ──► host callback
//! ```
//!
//! * **`config`**: validates a widget declaration into a [`WidgetConfig`].
//! * **`source`**: the [`DataSource`] trait and the Elasticsearch
//!   [`HitCountSource`], plus its HTTP [`Transport`] and credential lookup.
//! * **`state`**: the immutable [`DisplayState`] snapshot.
//! * **`poll`**: the [`PollingController`] lifecycle.
//! * **`dashboard`**: loading the dashboard file.
//!
//! The terminal front end lives in the `livedash` binary.

pub mod config;
pub mod dashboard;
pub mod poll;
pub mod source;
pub mod state;

pub use config::{validate, ValidationError, WidgetConfig};
pub use dashboard::DashboardConfig;
pub use poll::{Phase, PollError, PollHandle, PollingController};
pub use source::{DataSource, HitCountSource, HttpTransport, Transport, TransportError};
pub use state::{DisplayState, FailureCause, Status};
