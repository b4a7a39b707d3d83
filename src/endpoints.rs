//! Endpoint metadata lookup and listing.
//!
//! - [`get_endpoint_metadata`]: one endpoint by agent id.
//! - [`list_endpoints`]: every enrolled endpoint in a single large page.
//!
//! Both are plain reads with no action polling and no caching. Fields are
//! `Option` or defaulted because Kibana omits parts of the metadata document
//! for agents that have not reported fully.

use serde::Deserialize;

use crate::client::DefendClient;
use crate::error::Result;

/// Page size used to fetch the whole endpoint list in one request.
pub const LIST_PAGE_SIZE: u32 = 10_000;

// ── Response types ─────────────────────────────────────────────────────

/// The endpoint metadata document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointMetadata {
    /// Elastic-specific fields; carries the agent id.
    #[serde(default)]
    pub elastic: ElasticInfo,
    /// Host facts reported by the agent.
    #[serde(default)]
    pub host: HostInfo,
    /// The Endpoint agent itself.
    #[serde(default)]
    pub agent: AgentVersion,
}

/// `metadata.elastic`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElasticInfo {
    /// `metadata.elastic.agent`.
    #[serde(default)]
    pub agent: AgentId,
}

/// `metadata.elastic.agent`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentId {
    /// Fleet agent id; the id response actions target.
    #[serde(default)]
    pub id: Option<String>,
}

/// `metadata.agent`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentVersion {
    /// Endpoint agent version, e.g. `8.15.0`.
    #[serde(default)]
    pub version: Option<String>,
}

/// `metadata.host`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostInfo {
    /// Host name as reported by the agent.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Operating system facts.
    #[serde(default)]
    pub os: OsInfo,
}

/// `metadata.host.os`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsInfo {
    /// OS name, e.g. `Windows` or `Ubuntu`.
    #[serde(default)]
    pub name: Option<String>,
    /// OS version string.
    #[serde(default)]
    pub version: Option<String>,
}

impl EndpointMetadata {
    /// Agent id, if reported.
    pub fn agent_id(&self) -> Option<&str> {
        self.elastic.agent.id.as_deref()
    }

    /// Host name, if reported.
    pub fn hostname(&self) -> Option<&str> {
        self.host.hostname.as_deref()
    }

    /// OS name, if reported.
    pub fn os_name(&self) -> Option<&str> {
        self.host.os.name.as_deref()
    }
}

/// One item of the endpoint list.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointRecord {
    /// The metadata document.
    #[serde(default)]
    pub metadata: EndpointMetadata,
    /// Health as seen by Fleet (`healthy`, `offline`, `unenrolled`, ...).
    #[serde(default)]
    pub host_status: Option<String>,
}

#[derive(Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    metadata: EndpointMetadata,
}

#[derive(Deserialize)]
struct MetadataListResponse {
    #[serde(default)]
    data: Vec<EndpointRecord>,
}

// ── Endpoint functions ─────────────────────────────────────────────────

/// Retrieves the metadata document for one agent.
pub async fn get_endpoint_metadata(
    client: &DefendClient,
    agent_id: &str,
) -> Result<EndpointMetadata> {
    let path = format!("/api/endpoint/metadata/{agent_id}");
    let resp: MetadataResponse = client.get(&path).await?;
    Ok(resp.metadata)
}

/// Lists every enrolled endpoint.
///
/// Requests one page of [`LIST_PAGE_SIZE`] items, which in practice is the
/// whole fleet; no further pages are fetched.
pub async fn list_endpoints(client: &DefendClient) -> Result<Vec<EndpointRecord>> {
    let path = format!("/api/endpoint/metadata?pageSize={LIST_PAGE_SIZE}");
    let resp: MetadataListResponse = client.get(&path).await?;
    tracing::info!(count = resp.data.len(), "listed endpoints");
    Ok(resp.data)
}
