//! Response-action status model and polling loop.
//!
//! Every Kibana response action (execute, upload, get_file) follows the same
//! async pattern:
//!
//! 1. **POST** to start the action; the response carries its `action` id.
//! 2. **Poll GET** `/api/endpoint/action/{id}` until `data.status` is
//!    `successful` or `failed`.
//!
//! The poller uses a fixed interval and a fixed attempt budget, so the
//! worst-case wait is `interval × max_attempts` plus request time.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::DefendClient;
use crate::error::{DefendError, Result};

// ── Status types ─────────────────────────────────────────────────────

/// The lifecycle status of a response action.
///
/// Only `Successful` and `Failed` are terminal. `Unknown` covers any status
/// string Kibana may add later and is polled like `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Created, not yet completed by the agent.
    Pending,
    /// Completed successfully; any output is ready to fetch.
    Successful,
    /// Completed with an error.
    Failed,
    /// Catch-all for unrecognized status strings.
    #[serde(other)]
    Unknown,
}

impl ActionStatus {
    /// Whether polling should stop on this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionStatus::Successful | ActionStatus::Failed)
    }
}

/// The `data` object of an action-details response, with its status
/// classified and the full payload kept for display.
#[derive(Debug, Clone)]
pub struct ActionDetails {
    /// Classified status. A payload with no `status` field reads as
    /// `Pending`.
    pub status: ActionStatus,
    /// The raw `data` payload as returned by Kibana.
    pub raw: Value,
}

impl ActionDetails {
    /// Classifies a raw `data` payload.
    pub fn from_payload(raw: Value) -> Self {
        let status = match raw.get("status") {
            Some(value) => ActionStatus::deserialize(value).unwrap_or(ActionStatus::Unknown),
            None => ActionStatus::Pending,
        };
        ActionDetails { status, raw }
    }

    /// The action id, if the payload carries one.
    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    /// The action's command name (`execute`, `get-file`, `upload`, ...).
    pub fn command(&self) -> Option<&str> {
        self.raw.get("command").and_then(Value::as_str)
    }

    /// The remote path a `get-file` action was created with.
    pub fn remote_path(&self) -> Option<&str> {
        self.raw.pointer("/parameters/path").and_then(Value::as_str)
    }
}

#[derive(Deserialize)]
struct ActionDetailsResponse {
    #[serde(default)]
    data: Value,
}

/// Path of the action-details endpoint for `action_id`.
pub fn action_status_path(action_id: &str) -> String {
    format!("/api/endpoint/action/{action_id}")
}

/// Fetches the current status of an action with a single GET.
pub async fn get_action_status(client: &DefendClient, action_id: &str) -> Result<ActionDetails> {
    let resp: ActionDetailsResponse = client.get(&action_status_path(action_id)).await?;
    Ok(ActionDetails::from_payload(resp.data))
}

// ── Polling configuration ────────────────────────────────────────────

/// Fixed-interval polling budget.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between a non-terminal status and the next query.
    pub interval: Duration,
    /// Maximum number of status queries.
    pub max_attempts: u32,
}

impl PollConfig {
    /// Creates a new `PollConfig` with the given interval and attempt budget.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        PollConfig {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(15),
            max_attempts: 40,
        }
    }
}

/// How a polling run ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The action reached `successful`.
    Succeeded(ActionDetails),
    /// The action reached `failed`.
    Failed(ActionDetails),
    /// The attempt budget ran out before a terminal status was seen.
    TimedOut {
        /// Status queries issued.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed: Duration,
    },
}

impl PollOutcome {
    /// Maps the non-success outcomes to their errors, for callers that can
    /// only continue on success.
    pub fn into_result(self, action_id: &str) -> Result<ActionDetails> {
        match self {
            PollOutcome::Succeeded(details) => Ok(details),
            PollOutcome::Failed(_) => Err(DefendError::ActionFailed {
                action_id: action_id.to_string(),
            }),
            PollOutcome::TimedOut { attempts, elapsed } => Err(DefendError::Timeout {
                action_id: action_id.to_string(),
                attempts,
                elapsed,
            }),
        }
    }
}

// ── Polling function ─────────────────────────────────────────────────

/// Whether a failed status query should still count as a pending attempt.
///
/// Network errors and 5xx responses are tolerated; 4xx means the request
/// itself is wrong (credentials, unknown action) and will not improve.
fn is_transient(err: &DefendError) -> bool {
    match err {
        DefendError::Network(_) => true,
        DefendError::Api { status, .. } => status.is_server_error(),
        _ => false,
    }
}

/// Polls an action until it reaches a terminal status or the attempt budget
/// is spent.
///
/// Queries first, then sleeps, so a terminal status on the first query
/// returns without waiting. At most `config.max_attempts` queries are sent.
///
/// # Errors
///
/// - `DefendError::Api` for a 4xx response to a status query.
/// - `DefendError::Parse` if a status response is not JSON.
pub async fn poll_action(
    client: &DefendClient,
    action_id: &str,
    config: &PollConfig,
) -> Result<PollOutcome> {
    let started = Instant::now();
    let mut attempts = 0;

    while attempts < config.max_attempts {
        attempts += 1;
        tracing::info!(
            action_id,
            attempt = attempts,
            max = config.max_attempts,
            "polling action status"
        );

        match get_action_status(client, action_id).await {
            Ok(details) => match details.status {
                ActionStatus::Successful => return Ok(PollOutcome::Succeeded(details)),
                ActionStatus::Failed => return Ok(PollOutcome::Failed(details)),
                ActionStatus::Pending | ActionStatus::Unknown => {}
            },
            Err(err) if is_transient(&err) => {
                tracing::warn!(
                    action_id,
                    attempt = attempts,
                    error = %err,
                    "status check failed; treating as pending"
                );
            }
            Err(err) => return Err(err),
        }

        tokio::time::sleep(config.interval).await;
    }

    Ok(PollOutcome::TimedOut {
        attempts,
        elapsed: started.elapsed(),
    })
}
