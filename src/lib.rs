//! Async Rust client for Elastic Defend response actions.
//!
//! Talks to the Kibana endpoint-security API with basic auth to run
//! commands on enrolled endpoints, upload files to them, retrieve files from
//! them, poll action status, and list endpoints.
//!
//! # Modules
//!
//! - [`action`]: Action status model and the fixed-interval poller.
//! - [`client`]: Authenticated HTTP transport.
//! - [`config`]: Per-cluster configuration loaded from JSON.
//! - [`endpoints`]: Endpoint metadata lookup and listing.
//! - [`error`]: Typed error hierarchy (`DefendError`) and exit codes.
//! - [`report`]: Console reporting collaborator used by the CLI.
//! - [`response_actions`]: Submitting execute, get_file, and upload actions.
//! - [`transfer`]: Artifact naming, download, and the end-to-end file download.
//!
//! # Quick Start
//!
//! ```ignore
//! use es_defend::action::PollConfig;
//! use es_defend::client::DefendClient;
//! use es_defend::config::load_config;
//! use es_defend::transfer::{FileDownloadRequest, run_file_download};
//!
//! let config = load_config("config.json".as_ref(), "cluster01")?;
//! let client = DefendClient::new(&config)?;
//! let request = FileDownloadRequest::new("/var/log/app.log");
//! let path = run_file_download(
//!     &client, &config, &request, &PollConfig::default(), "es_defend_output".as_ref(),
//! ).await?;
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod report;
pub mod response_actions;
pub mod transfer;
