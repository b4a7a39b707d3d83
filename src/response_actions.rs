//! Submitting response actions to Kibana.
//!
//! | Function | API Path |
//! |----------|----------|
//! | [`execute_command`] | POST `/api/endpoint/action/execute` |
//! | [`prepare_file_download`] | POST `/api/endpoint/action/get_file` |
//! | [`upload_file`] | POST `/api/endpoint/action/upload` (multipart) |
//!
//! Each call targets every configured endpoint id and returns the action id
//! from the response's `action` field. None of them wait for completion;
//! see [`crate::action::poll_action`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::DefendClient;
use crate::config::ClusterConfig;
use crate::error::{DefendError, Result};

/// Comment attached to commands when the operator gives none.
pub const DEFAULT_COMMENT: &str = "ES_Defend Request";

/// Comment attached to get_file actions created by a file download.
pub const DOWNLOAD_COMMENT: &str = "File download request";

/// Command timeout in seconds when the operator gives none.
pub const DEFAULT_COMMAND_TIMEOUT: u64 = 600;

pub(crate) const EXECUTE_PATH: &str = "/api/endpoint/action/execute";
pub(crate) const GET_FILE_PATH: &str = "/api/endpoint/action/get_file";
pub(crate) const UPLOAD_PATH: &str = "/api/endpoint/action/upload";

// ── Request types ──────────────────────────────────────────────────────

/// JSON body shared by the execute and get_file endpoints.
#[derive(Debug, Serialize)]
pub struct ActionRequest<'a, P> {
    /// Agent ids the action targets.
    pub endpoint_ids: &'a [String],
    /// Command-specific parameters.
    pub parameters: P,
    /// Free-text comment recorded with the action.
    pub comment: &'a str,
}

/// `parameters` for the execute endpoint.
#[derive(Debug, Serialize)]
pub struct ExecuteParameters<'a> {
    /// Shell command line run on the endpoint.
    pub command: &'a str,
    /// Seconds the agent lets the command run.
    pub timeout: u64,
}

/// `parameters` for the get_file endpoint.
#[derive(Debug, Serialize)]
pub struct GetFileParameters<'a> {
    /// Absolute path of the file on the endpoint.
    pub path: &'a str,
}

/// Operator input for [`execute_command`].
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Command line to run.
    pub command: String,
    /// Timeout in seconds.
    pub timeout: u64,
    /// Comment recorded with the action.
    pub comment: String,
}

impl ExecuteRequest {
    /// An execute request with the default timeout and comment.
    pub fn new(command: impl Into<String>) -> Self {
        ExecuteRequest {
            command: command.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            comment: DEFAULT_COMMENT.to_string(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────────

/// The part of a create-action response we rely on.
///
/// Kibana also returns the full action under `data`; only the id matters
/// here.
#[derive(Debug, Deserialize)]
pub struct ActionCreated {
    /// The new action's id.
    #[serde(default)]
    pub action: Option<String>,
}

impl ActionCreated {
    fn into_action_id(self, operation: &str) -> Result<String> {
        match self.action {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(DefendError::MissingActionId {
                operation: operation.to_string(),
            }),
        }
    }
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// POSTs `body` to `path` and returns the action id from the response.
///
/// # Errors
///
/// - `DefendError::Api` / `DefendError::Network` if the request fails.
/// - `DefendError::MissingActionId` if the response has no `action`.
pub async fn submit_action<B: Serialize + ?Sized>(
    client: &DefendClient,
    path: &str,
    body: &B,
) -> Result<String> {
    let created: ActionCreated = client.post(path, body).await?;
    created.into_action_id(path)
}

/// Starts an execute action running `request.command` on every configured
/// endpoint.
pub async fn execute_command(
    client: &DefendClient,
    config: &ClusterConfig,
    request: &ExecuteRequest,
) -> Result<String> {
    let body = ActionRequest {
        endpoint_ids: &config.endpoint_ids,
        parameters: ExecuteParameters {
            command: &request.command,
            timeout: request.timeout,
        },
        comment: &request.comment,
    };
    tracing::info!(
        command = %request.command,
        timeout = request.timeout,
        "submitting execute action"
    );
    submit_action(client, EXECUTE_PATH, &body).await
}

/// Starts a get_file action that stages `remote_path` for download.
pub async fn prepare_file_download(
    client: &DefendClient,
    config: &ClusterConfig,
    remote_path: &str,
    comment: &str,
) -> Result<String> {
    let body = ActionRequest {
        endpoint_ids: &config.endpoint_ids,
        parameters: GetFileParameters { path: remote_path },
        comment,
    };
    tracing::info!(remote_path, "submitting get_file action");
    submit_action(client, GET_FILE_PATH, &body).await
}

/// Uploads `local_path` to every configured endpoint.
///
/// The file is read fully into memory and sent as multipart form data with
/// a `file` part and a JSON-encoded `endpoint_ids` field. A missing or
/// unreadable file fails with `DefendError::Io` before any request is sent.
pub async fn upload_file(
    client: &DefendClient,
    config: &ClusterConfig,
    local_path: &Path,
    comment: Option<&str>,
) -> Result<String> {
    let contents = tokio::fs::read(local_path)
        .await
        .map_err(|source| DefendError::Io {
            path: local_path.to_path_buf(),
            source,
        })?;

    let file_name = local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());

    tracing::info!(
        file = %local_path.display(),
        bytes = contents.len(),
        "submitting upload action"
    );

    let file_part = reqwest::multipart::Part::bytes(contents)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;

    let mut form = reqwest::multipart::Form::new()
        .part("file", file_part)
        .text("endpoint_ids", serde_json::to_string(&config.endpoint_ids)?);

    if let Some(comment) = comment {
        form = form.text("comment", comment.to_string());
    }

    let created: ActionCreated = client.post_multipart(UPLOAD_PATH, form).await?;
    created.into_action_id(UPLOAD_PATH)
}
