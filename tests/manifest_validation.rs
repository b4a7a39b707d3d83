//! Validation for the API manifest (manifest/endpoints.toml).
//!
//! The manifest lists every Kibana call the client makes. These tests keep it
//! parseable and in step with the paths the library actually requests.

use serde::Deserialize;

/// Top-level manifest structure matching the TOML schema.
#[derive(Debug, Deserialize)]
struct Manifest {
    meta: Meta,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Meta {
    schema_version: u32,
    last_validated: String,
}

/// A single endpoint entry in the manifest.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Endpoint {
    family: String,
    name: String,
    method: String,
    path: String,
    request_content_type: String,
    response_status: u16,
    permissions: Vec<String>,
    implemented: bool,
    #[serde(default)]
    notes: String,
}

fn load_manifest() -> Manifest {
    let content = std::fs::read_to_string("manifest/endpoints.toml")
        .expect("manifest/endpoints.toml should exist and be readable");
    toml::from_str(&content).expect("manifest/endpoints.toml should be valid TOML")
}

fn find<'a>(manifest: &'a Manifest, name: &str) -> &'a Endpoint {
    manifest
        .endpoints
        .iter()
        .find(|ep| ep.name == name)
        .unwrap_or_else(|| panic!("manifest has no endpoint named '{name}'"))
}

#[test]
fn manifest_endpoints_toml_is_valid() {
    let manifest = load_manifest();

    assert!(
        manifest.meta.schema_version >= 1,
        "schema_version must be at least 1"
    );
    assert!(!manifest.endpoints.is_empty());

    for ep in &manifest.endpoints {
        assert!(!ep.family.is_empty(), "endpoint family must not be empty");
        assert!(!ep.name.is_empty(), "endpoint name must not be empty");
        assert!(
            ep.path.starts_with("/api/endpoint/"),
            "endpoint '{}' has unexpected path '{}'",
            ep.name,
            ep.path
        );
        assert!(
            !ep.permissions.is_empty(),
            "endpoint '{}' must list the privileges it needs",
            ep.name
        );
    }
}

#[test]
fn every_client_call_is_marked_implemented() {
    let manifest = load_manifest();

    for expected in [
        "execute",
        "upload",
        "get_file",
        "get_action_status",
        "download_file",
        "get_endpoint_metadata",
        "list_endpoints",
    ] {
        assert!(
            find(&manifest, expected).implemented,
            "endpoint '{expected}' should be marked as implemented"
        );
    }
}

#[test]
fn manifest_lists_only_calls_the_client_makes() {
    let manifest = load_manifest();

    let unimplemented: Vec<&str> = manifest
        .endpoints
        .iter()
        .filter(|ep| !ep.implemented)
        .map(|ep| ep.name.as_str())
        .collect();
    assert!(
        unimplemented.is_empty(),
        "manifest lists calls the client never makes: {unimplemented:?}"
    );
    assert_eq!(manifest.endpoints.len(), 7);
}

#[test]
fn manifest_paths_match_library_paths() {
    let manifest = load_manifest();

    assert_eq!(
        find(&manifest, "get_action_status")
            .path
            .replace("{action_id}", "a1"),
        es_defend::action::action_status_path("a1")
    );
    assert_eq!(
        find(&manifest, "download_file")
            .path
            .replace("{action_id}", "a1")
            .replace("{file_id}", "a1.ep-1"),
        es_defend::transfer::download_url_path("a1", "a1.ep-1")
    );
}

#[test]
fn upload_is_the_only_multipart_call() {
    let manifest = load_manifest();

    let multipart: Vec<&str> = manifest
        .endpoints
        .iter()
        .filter(|ep| ep.request_content_type == "multipart/form-data")
        .map(|ep| ep.name.as_str())
        .collect();
    assert_eq!(multipart, ["upload"]);
}

#[test]
fn manifest_endpoint_methods_are_valid_http_verbs() {
    let manifest = load_manifest();

    let valid_methods = ["GET", "POST", "PUT", "PATCH", "DELETE"];
    for ep in &manifest.endpoints {
        assert!(
            valid_methods.contains(&ep.method.as_str()),
            "endpoint '{}' has invalid method '{}', expected one of {:?}",
            ep.name,
            ep.method,
            valid_methods
        );
    }
}
