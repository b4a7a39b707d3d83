//! Authenticated HTTP client for the Kibana endpoint-security API.
//!
//! `DefendClient` wraps a `reqwest::Client` configured the way Kibana's
//! response-action API expects to be called from scripts:
//! - HTTP basic auth on every request.
//! - `kbn-xsrf: true` on every request; Kibana rejects mutating calls
//!   without it.
//! - TLS certificate validation disabled (self-signed Kibana certificates).
//!
//! Non-2xx responses are turned into `DefendError::Api` with the response
//! body preserved. Nothing here retries.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::ClusterConfig;
use crate::error::{DefendError, Result};

/// Connect timeout (TCP + TLS handshake).
const API_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout, sized for multi-MB artifact downloads.
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert("kbn-xsrf", HeaderValue::from_static("true"));

    let client = Client::builder()
        .default_headers(headers)
        .danger_accept_invalid_certs(true)
        .connect_timeout(API_CONNECT_TIMEOUT)
        .timeout(API_REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Authenticated HTTP client bound to one cluster.
///
/// `base_url` comes from the cluster config, so tests point it at a
/// wiremock server simply by writing the mock URI into the config.
pub struct DefendClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl DefendClient {
    /// Builds a client for `config`.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        Ok(DefendClient {
            client: build_http_client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` must start with `/`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Converts a non-success response into `DefendError::Api`, reading the
    /// body first so Kibana's diagnostic message survives.
    async fn check_status(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DefendError::Api { status, body })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T> {
        let resp = Self::check_status(req.send().await?).await?;
        tracing::info!(path, status = %resp.status(), "request succeeded");
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends an authenticated GET and deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!(path, "GET");
        self.send_json(self.request(Method::GET, path), path).await
    }

    /// Sends an authenticated POST with a JSON body and deserializes the
    /// JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let rendered = serde_json::to_string(body).unwrap_or_default();
            tracing::debug!(path, body = %rendered, "POST");
        }
        self.send_json(self.request(Method::POST, path).json(body), path)
            .await
    }

    /// Sends an authenticated multipart POST and deserializes the JSON
    /// response.
    ///
    /// `reqwest::multipart::Form` is consumed on send, so the whole file
    /// sits in memory and a failed upload cannot be replayed from here.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        tracing::debug!(path, "POST multipart");
        self.send_json(self.request(Method::POST, path).multipart(form), path)
            .await
    }

    /// Fetches a raw binary body with an authenticated GET.
    ///
    /// Non-success statuses become `DefendError::Download` rather than
    /// `Api`, so callers can tell a failed artifact fetch apart from a
    /// failed JSON call.
    pub async fn download(&self, path: &str) -> Result<bytes::Bytes> {
        tracing::debug!(path, "GET (binary)");
        let resp = self.request(Method::GET, path).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DefendError::Download { status, body });
        }
        let data = resp.bytes().await?;
        tracing::info!(path, bytes = data.len(), "download succeeded");
        Ok(data)
    }
}
