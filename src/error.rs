//! Typed error hierarchy for the es-defend crate.
//!
//! Every operation returns `Result<T, DefendError>`. Variants map to real
//! failure boundaries: the local config file, the Kibana HTTP API, the
//! polling loop, and the local filesystem. The binary decides how each kind
//! is surfaced via [`DefendError::exit_code`].

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

/// Exit code for operator mistakes: missing flags, bad config.
pub const EXIT_USAGE: u8 = 2;
/// Exit code for HTTP failures talking to Kibana.
pub const EXIT_TRANSPORT: u8 = 3;
/// Exit code for a poll that never reached a terminal state.
pub const EXIT_TIMEOUT: u8 = 4;
/// Exit code for everything else (failed action, parse, local I/O).
pub const EXIT_GENERIC: u8 = 1;

/// Unified error type for all es-defend operations.
#[derive(Debug, thiserror::Error)]
pub enum DefendError {
    /// A flag required by the selected operation was not supplied.
    #[error("{0}")]
    Usage(String),

    /// The configuration file is missing, malformed, or lacks the
    /// requested cluster.
    #[error("configuration error: {message}")]
    Config {
        /// What went wrong, including the file path or cluster name.
        message: String,
        /// The underlying I/O or parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Kibana returned a non-success HTTP status.
    ///
    /// The body is kept because Kibana puts the useful part of the
    /// diagnosis (`message`, `error`) there.
    #[error("API error {status}: {body}")]
    Api {
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body, or an empty string if unreadable.
        body: String,
    },

    /// Transport-level failure (DNS, TCP, TLS, request timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The artifact download request returned a non-success status.
    #[error("download failed with status {status}: {body}")]
    Download {
        /// The HTTP status code of the file fetch.
        status: StatusCode,
        /// The raw response body.
        body: String,
    },

    /// The submit call succeeded but the response carried no action id.
    #[error("no action id in {operation} response")]
    MissingActionId {
        /// The operation whose response was missing the id.
        operation: String,
    },

    /// The action reached the terminal `failed` state.
    #[error("action {action_id} failed")]
    ActionFailed {
        /// The action id.
        action_id: String,
    },

    /// The action did not reach a terminal state within the poll budget.
    #[error("action {action_id} did not complete after {attempts} status checks ({elapsed:?})")]
    Timeout {
        /// The action id being polled.
        action_id: String,
        /// Number of status queries issued.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed: Duration,
    },

    /// A response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading or writing a local file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The local path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DefendError {
    /// Builds a `Config` error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        DefendError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            DefendError::Usage(_) | DefendError::Config { .. } => EXIT_USAGE,
            DefendError::Api { .. } | DefendError::Network(_) | DefendError::Download { .. } => {
                EXIT_TRANSPORT
            }
            DefendError::Timeout { .. } => EXIT_TIMEOUT,
            DefendError::MissingActionId { .. }
            | DefendError::ActionFailed { .. }
            | DefendError::Parse(_)
            | DefendError::Io { .. } => EXIT_GENERIC,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, DefendError>;
