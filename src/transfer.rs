//! File retrieval from an endpoint.
//!
//! The download flow is:
//! 1. POST `/api/endpoint/action/get_file`: stage the remote file (returns an action id).
//! 2. Poll `GET /api/endpoint/action/{id}`: wait for `successful`.
//! 3. GET `.../action/{id}/file/{id}.{agent_id}/download`: raw bytes (usually a
//!    password-protected zip produced by the agent).
//! 4. Look up the agent's hostname and write the bytes to
//!    `{output_dir}/{hostname}_{flattened remote path}`.
//!
//! The file id in step 3 encodes exactly one agent. It defaults to the first
//! configured endpoint id; an explicit file id picks another agent.

use std::path::{Path, PathBuf};

use crate::action::{PollConfig, poll_action};
use crate::client::DefendClient;
use crate::config::ClusterConfig;
use crate::endpoints::get_endpoint_metadata;
use crate::error::{DefendError, Result};
use crate::response_actions::{DOWNLOAD_COMMENT, prepare_file_download};

/// Directory artifacts are written to when the operator gives none.
pub const DEFAULT_OUTPUT_DIR: &str = "es_defend_output";

/// Name used when the derived file name would be empty or a dot entry.
const FALLBACK_FILE_NAME: &str = "artifact";

/// Operator input for [`run_file_download`].
#[derive(Debug, Clone)]
pub struct FileDownloadRequest {
    /// Absolute path of the file on the endpoint.
    pub remote_path: String,
    /// Comment recorded with the get_file action.
    pub comment: String,
}

impl FileDownloadRequest {
    /// A request with the default download comment.
    pub fn new(remote_path: impl Into<String>) -> Self {
        FileDownloadRequest {
            remote_path: remote_path.into(),
            comment: DOWNLOAD_COMMENT.to_string(),
        }
    }
}

/// File id Kibana stores a get_file result under.
pub fn download_file_id(action_id: &str, endpoint_id: &str) -> String {
    format!("{action_id}.{endpoint_id}")
}

/// Download path for a staged file.
pub fn download_url_path(action_id: &str, file_id: &str) -> String {
    format!("/api/endpoint/action/{action_id}/file/{file_id}/download")
}

/// Agent id a file id names: the part after `{action_id}.`.
///
/// `None` when `file_id` does not belong to `action_id` or has no agent part.
pub fn file_id_agent<'a>(action_id: &str, file_id: &'a str) -> Option<&'a str> {
    file_id
        .strip_prefix(action_id)?
        .strip_prefix('.')
        .filter(|agent| !agent.is_empty())
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Derives the local file name for an artifact.
///
/// Path separators in both inputs become `_`, leading/trailing colons and
/// spaces are stripped, and the `_` left by a leading root separator is
/// dropped, so the result is always a single path component:
///
/// ```
/// use es_defend::transfer::artifact_file_name;
/// assert_eq!(artifact_file_name("host01", "/var/log/app.log"), "host01_var_log_app.log");
/// assert_eq!(artifact_file_name("WIN-DC01", r"C:\Temp\dump.bin"), "WIN-DC01_C:_Temp_dump.bin");
/// ```
pub fn artifact_file_name(hostname: &str, remote_path: &str) -> String {
    let flattened = remote_path.replace(is_separator, "_");
    let stem = flattened
        .trim_matches(|c| matches!(c, ':' | ' '))
        .trim_start_matches('_');

    let combined = format!("{hostname}_{stem}").replace(is_separator, "_");
    let name = combined.trim_matches(|c| matches!(c, ':' | ' '));

    match name {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Resolves the hostname used in artifact names, falling back to the agent
/// id when the metadata has none.
async fn resolve_hostname(client: &DefendClient, endpoint_id: &str) -> Result<String> {
    let metadata = get_endpoint_metadata(client, endpoint_id).await?;
    match metadata.hostname() {
        Some(hostname) if !hostname.trim().is_empty() => Ok(hostname.to_string()),
        _ => {
            tracing::warn!(endpoint_id, "endpoint metadata has no hostname; using agent id");
            Ok(endpoint_id.to_string())
        }
    }
}

/// Downloads the result of a completed get_file action and writes it under
/// `output_dir`.
///
/// `file_id` overrides the default `{action_id}.{first endpoint id}`; the
/// hostname is then looked up for the agent the file id names. The output
/// directory is created if missing. The body is written in one pass
/// with no temp file, so a failure mid-write can leave a truncated file.
///
/// Returns the path written.
///
/// # Errors
///
/// - `DefendError::Config` if `config` has no endpoint ids.
/// - `DefendError::Download` if the file fetch returns a non-success status.
/// - `DefendError::Api` / `DefendError::Network` from the hostname lookup.
/// - `DefendError::Io` if the directory or file cannot be written.
pub async fn download_artifact(
    client: &DefendClient,
    config: &ClusterConfig,
    action_id: &str,
    file_id: Option<&str>,
    remote_path: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let primary = config
        .primary_endpoint()
        .ok_or_else(|| DefendError::config("cluster has no endpoint_ids to download from"))?;
    let (file_id, endpoint_id) = match file_id {
        Some(file_id) => (
            file_id.to_string(),
            file_id_agent(action_id, file_id).unwrap_or(primary),
        ),
        None => (download_file_id(action_id, primary), primary),
    };

    let data = client
        .download(&download_url_path(action_id, &file_id))
        .await?;

    let hostname = resolve_hostname(client, endpoint_id).await?;
    let output_path = output_dir.join(artifact_file_name(&hostname, remote_path));

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| DefendError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&output_path, &data)
        .await
        .map_err(|source| DefendError::Io {
            path: output_path.clone(),
            source,
        })?;

    tracing::info!(path = %output_path.display(), bytes = data.len(), "artifact written");
    Ok(output_path)
}

/// Stages `request.remote_path` on the first configured endpoint, waits for
/// the action to finish, and downloads the result.
///
/// Nothing is written unless the action reaches `successful`.
///
/// # Errors
///
/// - `DefendError::MissingActionId` if the get_file response has no id.
/// - `DefendError::ActionFailed` if the action ends `failed`.
/// - `DefendError::Timeout` if the poll budget runs out.
/// - Any error from [`download_artifact`].
pub async fn run_file_download(
    client: &DefendClient,
    config: &ClusterConfig,
    request: &FileDownloadRequest,
    poll: &PollConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let action_id =
        prepare_file_download(client, config, &request.remote_path, &request.comment).await?;
    tracing::info!(action_id = %action_id, "file download staged");

    poll_action(client, &action_id, poll)
        .await?
        .into_result(&action_id)?;

    download_artifact(
        client,
        config,
        &action_id,
        None,
        &request.remote_path,
        output_dir,
    )
    .await
}

/// Waits for a get_file action created earlier (for example with
/// `file_download_prep`) and downloads its result.
///
/// The artifact name uses `remote_path` if given, otherwise the path
/// recorded in the action's parameters, otherwise the action id.
pub async fn resume_file_download(
    client: &DefendClient,
    config: &ClusterConfig,
    action_id: &str,
    file_id: Option<&str>,
    remote_path: Option<&str>,
    poll: &PollConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let details = poll_action(client, action_id, poll)
        .await?
        .into_result(action_id)?;

    let remote_path = remote_path
        .or_else(|| details.remote_path())
        .unwrap_or(action_id)
        .to_string();

    download_artifact(client, config, action_id, file_id, &remote_path, output_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_unix_path_under_hostname() {
        assert_eq!(
            artifact_file_name("host01", "/var/log/app.log"),
            "host01_var_log_app.log"
        );
        assert_eq!(
            Path::new(DEFAULT_OUTPUT_DIR).join(artifact_file_name("host01", "/var/log/app.log")),
            Path::new("es_defend_output/host01_var_log_app.log")
        );
    }

    #[test]
    fn flattens_windows_path() {
        assert_eq!(
            artifact_file_name("WIN-DC01", r"C:\Windows\Temp\dump.bin"),
            "WIN-DC01_C:_Windows_Temp_dump.bin"
        );
    }

    #[test]
    fn strips_edge_colons_and_spaces() {
        assert_eq!(artifact_file_name("h", " /tmp/x.txt: "), "h_tmp_x.txt");
        assert_eq!(artifact_file_name(" :h", "/a"), "h_a");
    }

    #[test]
    fn separators_in_hostname_are_replaced() {
        let name = artifact_file_name("../../etc", "passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
    }

    #[test]
    fn result_is_always_a_single_component() {
        for (host, path) in [
            ("host", "../../../etc/shadow"),
            ("..", ".."),
            ("", "/"),
            ("a\\b", "c\\..\\d"),
            ("", ""),
        ] {
            let name = artifact_file_name(host, path);
            let joined = Path::new("out").join(&name);
            assert_eq!(
                joined.parent(),
                Some(Path::new("out")),
                "{host:?} + {path:?} produced {name:?}"
            );
            assert!(name != "." && name != "..", "{name:?}");
            assert!(!name.is_empty());
        }
    }

    #[test]
    fn keeps_trailing_underscores_in_file_name() {
        assert_eq!(artifact_file_name("h", "/data/backup_"), "h_data_backup_");
        assert_eq!(artifact_file_name("h", "//srv/_cache"), "h_srv__cache");
    }

    #[test]
    fn file_id_agent_reads_suffix_after_action_id() {
        assert_eq!(file_id_agent("a9", "a9.ep-2"), Some("ep-2"));
        assert_eq!(file_id_agent("a9", "a9.host.with.dots"), Some("host.with.dots"));
        assert_eq!(file_id_agent("a9", "a9."), None);
        assert_eq!(file_id_agent("a9", "b1.ep-2"), None);
        assert_eq!(file_id_agent("a9", "a9ep-2"), None);
    }

    #[test]
    fn download_path_encodes_action_and_single_endpoint() {
        let file_id = download_file_id("a1", "ep-1");
        assert_eq!(file_id, "a1.ep-1");
        assert_eq!(
            download_url_path("a1", &file_id),
            "/api/endpoint/action/a1/file/a1.ep-1/download"
        );
    }
}
