//! Per-cluster configuration loaded from a JSON file.
//!
//! The file maps a cluster name to its Kibana base URL, basic-auth
//! credentials, and the endpoint (agent) ids that response actions target:
//!
//! ```json
//! {
//!   "cluster01": {
//!     "base_url": "https://kibana.example:5601",
//!     "username": "elastic",
//!     "password": "changeme",
//!     "endpoint_ids": ["3d9b1c4e-..."]
//!   }
//! }
//! ```
//!
//! A config is resolved once per invocation and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DefendError, Result};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Connection settings for one Kibana deployment.
///
/// Invariants after [`load_config`]:
/// - `base_url` is non-empty and has no trailing `/`.
/// - `endpoint_ids` is non-empty.
#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    /// Kibana base URL, e.g. `https://kibana.example:5601`.
    pub base_url: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password. Never printed by `Debug`.
    pub password: String,
    /// Agent ids targeted by response actions, in order.
    pub endpoint_ids: Vec<String>,
}

impl ClusterConfig {
    /// The endpoint used by single-target operations (file download,
    /// hostname lookup).
    ///
    /// The download URL encodes exactly one agent id, so multi-endpoint
    /// downloads are not supported; only the first configured id is used.
    /// `None` only for a hand-built config with no endpoint ids.
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.endpoint_ids.first().map(String::as_str)
    }

    fn validate(mut self, cluster: &str) -> Result<Self> {
        let trimmed = self.base_url.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(DefendError::config(format!(
                "cluster {cluster} has an empty base_url"
            )));
        }
        self.base_url = trimmed.to_string();

        if self.endpoint_ids.is_empty() || self.endpoint_ids.iter().any(|id| id.trim().is_empty())
        {
            return Err(DefendError::config(format!(
                "cluster {cluster} has missing or blank endpoint_ids"
            )));
        }
        Ok(self)
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("endpoint_ids", &self.endpoint_ids)
            .finish()
    }
}

/// Parses a config document and returns the named cluster.
///
/// Fails with `DefendError::Config` if the text is not a JSON object, the
/// cluster is absent, or its entry is malformed or violates the invariants
/// above. Entries for other clusters are not checked.
pub fn parse_config(text: &str, cluster: &str) -> Result<ClusterConfig> {
    let mut clusters: HashMap<String, serde_json::Value> =
        serde_json::from_str(text).map_err(|e| DefendError::Config {
            message: "config is not a JSON object".to_string(),
            source: Some(Box::new(e)),
        })?;

    let entry = clusters
        .remove(cluster)
        .ok_or_else(|| DefendError::config(format!("cluster {cluster} not found in config")))?;

    // Other clusters' entries are never decoded.
    let config: ClusterConfig = serde_json::from_value(entry).map_err(|e| DefendError::Config {
        message: format!("cluster {cluster} is not a valid cluster entry"),
        source: Some(Box::new(e)),
    })?;

    config.validate(cluster)
}

/// Reads `path` and resolves `cluster` from it.
pub fn load_config(path: &Path, cluster: &str) -> Result<ClusterConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| DefendError::Config {
        message: format!("failed to read {}", path.display()),
        source: Some(Box::new(e)),
    })?;

    let config = parse_config(&text, cluster).map_err(|err| match err {
        DefendError::Config { message, source } => DefendError::Config {
            message: format!("{}: {message}", path.display()),
            source,
        },
        other => other,
    })?;

    tracing::info!(cluster, base_url = %config.base_url, "configuration loaded");
    Ok(config)
}
