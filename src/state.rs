//! The snapshot a widget publishes after every cycle.
//!
//! [`DisplayState`] values are immutable: the controller builds a fresh one
//! for every cycle and hands it to the host, which keeps whichever has the
//! highest [`generation`](DisplayState::generation).

use std::fmt;

/// What the widget should currently show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No cycle has completed yet.
    Loading,
    /// The last cycle produced a value.
    Ready,
    /// The last cycle (or validation) failed.
    Failed,
}

/// Why a state is [`Status::Failed`].
///
/// The render layer shows the same error indicator for every cause; the
/// distinction is kept for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// The declaration was rejected; the widget will never poll.
    InvalidConfig,
    /// The request could not be completed or returned a non-success status.
    Network,
    /// The response did not contain a usable hit total.
    Decode,
    /// The declared `authKey` has no credentials.
    Credentials,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidConfig => "invalid configuration",
            Self::Network => "network error",
            Self::Decode => "unexpected response",
            Self::Credentials => "missing credentials",
        })
    }
}

/// An immutable snapshot of a widget's display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    status: Status,
    value: Option<u64>,
    cause: Option<FailureCause>,
    generation: u64,
}

impl DisplayState {
    /// The state every widget starts in, before anything is published.
    pub const fn loading() -> Self {
        Self {
            status: Status::Loading,
            value: None,
            cause: None,
            generation: 0,
        }
    }

    pub const fn ready(generation: u64, value: u64) -> Self {
        Self {
            status: Status::Ready,
            value: Some(value),
            cause: None,
            generation,
        }
    }

    pub const fn failed(generation: u64, cause: FailureCause) -> Self {
        Self {
            status: Status::Failed,
            value: None,
            cause: Some(cause),
            generation,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The fetched value; only present when [`Status::Ready`].
    pub fn value(&self) -> Option<u64> {
        self.value
    }

    pub fn cause(&self) -> Option<FailureCause> {
        self.cause
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this state should replace `other` on screen.
    pub fn supersedes(&self, other: &Self) -> bool {
        self.generation > other.generation
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::loading()
    }
}
