//! CLI entry point for es-defend, an Elastic Defend response-action client.
//!
//! Resolves the cluster from the config file, then runs one operation
//! selected with `-o`.
//!
//! Exit codes:
//! - 0: success
//! - 1: action failed, missing action id, parse or local I/O error
//! - 2: usage error (missing flag, bad config; clap parse errors also use 2)
//! - 3: HTTP error talking to Kibana
//! - 4: action did not finish within the poll budget

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use es_defend::action::{ActionStatus, PollConfig, get_action_status};
use es_defend::client::DefendClient;
use es_defend::config::{DEFAULT_CONFIG_FILE, load_config};
use es_defend::endpoints::list_endpoints;
use es_defend::error::{DefendError, Result};
use es_defend::report::{ConsoleReporter, Reporter};
use es_defend::response_actions::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_COMMENT, DOWNLOAD_COMMENT, ExecuteRequest, execute_command,
    prepare_file_download, upload_file,
};
use es_defend::transfer::{
    DEFAULT_OUTPUT_DIR, FileDownloadRequest, resume_file_download, run_file_download,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Cluster name, as keyed in the config file (e.g. cluster01).
    #[arg(short = 'c', long = "cluster-name", alias = "cluster_name")]
    cluster_name: String,

    /// Operation to perform.
    #[arg(short = 'o', long, value_enum)]
    operation: Operation,

    /// Command to execute (execute).
    /// Allows leading hyphens since command lines often start with flags.
    #[arg(long, allow_hyphen_values = true)]
    command: Option<String>,

    /// Comment recorded with the action.
    #[arg(long)]
    comment: Option<String>,

    /// Command timeout in seconds (execute).
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT)]
    timeout: u64,

    /// Local file to upload (file_upload).
    #[arg(long = "local-file", alias = "local_file")]
    local_file: Option<PathBuf>,

    /// Remote file path (file_download_prep, file_download).
    #[arg(long = "remote-file", alias = "remote_file")]
    remote_file: Option<String>,

    /// Action id (check_status; file_download of a prepared action).
    #[arg(long = "action-id", alias = "action_id")]
    action_id: Option<String>,

    /// Explicit file id `{action_id}.{agent_id}` to download, with --action-id.
    #[arg(long = "output-id", alias = "output_id")]
    output_id: Option<String>,

    /// Cluster configuration file.
    #[arg(long, env = "ES_DEFEND_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory downloaded files are written to.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Seconds between action status checks.
    #[arg(long, default_value_t = 15)]
    poll_interval: u64,

    /// Maximum number of action status checks.
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Disable coloured output.
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Operation {
    /// Run a command on the configured endpoints.
    #[value(name = "execute")]
    Execute,
    /// Upload a local file to the configured endpoints.
    #[value(name = "file_upload")]
    FileUpload,
    /// Stage a remote file for download and print the action id.
    #[value(name = "file_download_prep")]
    FileDownloadPrep,
    /// Stage, wait for, and download a remote file.
    #[value(name = "file_download")]
    FileDownload,
    /// Show the current status of an action.
    #[value(name = "check_status")]
    CheckStatus,
    /// List enrolled endpoints.
    #[value(name = "list_endpoints")]
    ListEndpoints,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Execute => "execute",
            Operation::FileUpload => "file_upload",
            Operation::FileDownloadPrep => "file_download_prep",
            Operation::FileDownload => "file_download",
            Operation::CheckStatus => "check_status",
            Operation::ListEndpoints => "list_endpoints",
        }
    }
}

/// A fully validated operation, built before any config or network access.
#[derive(Debug)]
enum OperationRequest {
    Execute(ExecuteRequest),
    FileUpload {
        local_file: PathBuf,
        comment: Option<String>,
    },
    FileDownloadPrep {
        remote_file: String,
        comment: String,
    },
    FileDownload(FileDownloadRequest),
    ResumeFileDownload {
        action_id: String,
        file_id: Option<String>,
        remote_file: Option<String>,
    },
    CheckStatus {
        action_id: String,
    },
    ListEndpoints,
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, flag: &str, op: Operation) -> Result<&'a T> {
    value.ok_or_else(|| {
        DefendError::Usage(format!(
            "--{flag} is required for {} operation",
            op.name()
        ))
    })
}

impl OperationRequest {
    /// Checks the flags the selected operation needs.
    fn from_cli(cli: &Cli) -> Result<Self> {
        let op = cli.operation;
        let request = match op {
            Operation::Execute => {
                let command = required(cli.command.as_deref(), "command", op)?;
                OperationRequest::Execute(ExecuteRequest {
                    command: command.to_string(),
                    timeout: cli.timeout,
                    comment: cli.comment.clone().unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
                })
            }
            Operation::FileUpload => OperationRequest::FileUpload {
                local_file: required(cli.local_file.as_ref(), "local-file", op)?.clone(),
                comment: cli.comment.clone(),
            },
            Operation::FileDownloadPrep => OperationRequest::FileDownloadPrep {
                remote_file: required(cli.remote_file.as_deref(), "remote-file", op)?.to_string(),
                comment: cli
                    .comment
                    .clone()
                    .unwrap_or_else(|| DOWNLOAD_COMMENT.to_string()),
            },
            Operation::FileDownload => match (&cli.action_id, &cli.remote_file) {
                (Some(action_id), remote_file) => OperationRequest::ResumeFileDownload {
                    action_id: action_id.clone(),
                    file_id: cli.output_id.clone(),
                    remote_file: remote_file.clone(),
                },
                (None, _) if cli.output_id.is_some() => {
                    return Err(DefendError::Usage(
                        "--output-id requires --action-id for file_download operation".to_string(),
                    ));
                }
                (None, Some(remote_file)) => OperationRequest::FileDownload(FileDownloadRequest {
                    remote_path: remote_file.clone(),
                    comment: cli
                        .comment
                        .clone()
                        .unwrap_or_else(|| DOWNLOAD_COMMENT.to_string()),
                }),
                (None, None) => {
                    return Err(DefendError::Usage(
                        "--remote-file (or --action-id of a prepared download) is required for file_download operation"
                            .to_string(),
                    ));
                }
            },
            Operation::CheckStatus => OperationRequest::CheckStatus {
                action_id: required(cli.action_id.as_deref(), "action-id", op)?.to_string(),
            },
            Operation::ListEndpoints => OperationRequest::ListEndpoints,
        };
        Ok(request)
    }
}

fn poll_config(cli: &Cli) -> PollConfig {
    PollConfig::new(Duration::from_secs(cli.poll_interval), cli.max_retries)
}

/// Validates flags, resolves the cluster, and runs the selected operation.
async fn run(cli: &Cli, reporter: &dyn Reporter) -> Result<()> {
    let request = OperationRequest::from_cli(cli)?;
    let config = load_config(&cli.config, &cli.cluster_name)?;
    let client = DefendClient::new(&config)?;

    match request {
        OperationRequest::Execute(exec) => {
            let action_id = execute_command(&client, &config, &exec).await?;
            reporter.report_success(&format!(
                "Command executed successfully. Action ID: {action_id}"
            ));
        }
        OperationRequest::FileUpload {
            local_file,
            comment,
        } => {
            let action_id = upload_file(&client, &config, &local_file, comment.as_deref()).await?;
            reporter.report_success(&format!(
                "File uploaded successfully. Action ID: {action_id}"
            ));
        }
        OperationRequest::FileDownloadPrep {
            remote_file,
            comment,
        } => {
            let action_id = prepare_file_download(&client, &config, &remote_file, &comment).await?;
            reporter.report_success(&format!(
                "File download prepared. Action ID: {action_id}"
            ));
        }
        OperationRequest::FileDownload(download) => {
            let path =
                run_file_download(&client, &config, &download, &poll_config(cli), &cli.output_dir)
                    .await?;
            reporter.report_success(&format!(
                "File downloaded successfully to '{}'",
                path.display()
            ));
        }
        OperationRequest::ResumeFileDownload {
            action_id,
            file_id,
            remote_file,
        } => {
            let path = resume_file_download(
                &client,
                &config,
                &action_id,
                file_id.as_deref(),
                remote_file.as_deref(),
                &poll_config(cli),
                &cli.output_dir,
            )
            .await?;
            reporter.report_success(&format!(
                "File downloaded successfully to '{}'",
                path.display()
            ));
        }
        OperationRequest::CheckStatus { action_id } => {
            let details = get_action_status(&client, &action_id).await?;
            let payload = serde_json::to_string_pretty(&details.raw)?;
            reporter.report_info(&payload);
            let summary = format!("Action {action_id} status: {:?}", details.status);
            match details.status {
                ActionStatus::Successful => reporter.report_success(&summary),
                ActionStatus::Failed => reporter.report_error(&summary),
                ActionStatus::Pending | ActionStatus::Unknown => reporter.report_info(&summary),
            }
        }
        OperationRequest::ListEndpoints => {
            for record in list_endpoints(&client).await? {
                let meta = &record.metadata;
                let mut line = format!(
                    "Hostname: {}, OS: {}, Agent ID: {}",
                    meta.hostname().unwrap_or("unknown"),
                    meta.os_name().unwrap_or("unknown"),
                    meta.agent_id().unwrap_or("unknown"),
                );
                if let Some(status) = &record.host_status {
                    line.push_str(&format!(", Status: {status}"));
                }
                reporter.report_info(&line);
            }
        }
    }
    Ok(())
}

/// Renders an error with its `source()` chain.
fn error_chain(err: &DefendError) -> String {
    use std::error::Error as _;

    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    msg
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "es_defend=debug,warn"
    } else {
        "es_defend=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let reporter = ConsoleReporter::new(!cli.no_color);

    match run(&cli, &reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let rendered = error_chain(&err);
            tracing::error!(
                operation = cli.operation.name(),
                error = %rendered,
                "operation failed"
            );
            reporter.report_error(&format!("Error in {}: {rendered}", cli.operation.name()));
            ExitCode::from(err.exit_code())
        }
    }
}
