//! Integration tests for submitting response actions using wiremock.

use es_defend::client::DefendClient;
use es_defend::config::ClusterConfig;
use es_defend::error::DefendError;
use es_defend::response_actions::*;
use wiremock::matchers::{
    basic_auth, body_json, body_string_contains, header, header_regex, method, path,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cluster(server: &MockServer) -> ClusterConfig {
    ClusterConfig {
        base_url: server.uri(),
        username: "u".to_string(),
        password: "p".to_string(),
        endpoint_ids: vec!["ep-1".to_string()],
    }
}

#[tokio::test]
async fn execute_posts_command_and_returns_action_id() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/execute"))
        .and(basic_auth("u", "p"))
        .and(header("kbn-xsrf", "true"))
        .and(body_json(serde_json::json!({
            "endpoint_ids": ["ep-1"],
            "parameters": { "command": "ls -la", "timeout": 600 },
            "comment": "ES_Defend Request"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "action": "a1",
            "data": { "id": "a1", "command": "execute", "status": "pending" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let action_id = execute_command(&client, &config, &ExecuteRequest::new("ls -la"))
        .await
        .unwrap();
    assert_eq!(action_id, "a1");
}

#[tokio::test]
async fn execute_without_action_id_is_submission_error() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {}
        })))
        .mount(&server)
        .await;

    let err = execute_command(&client, &config, &ExecuteRequest::new("id"))
        .await
        .unwrap_err();
    assert!(matches!(err, DefendError::MissingActionId { .. }));
}

#[tokio::test]
async fn rejected_request_preserves_kibana_message() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/execute"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "statusCode": 403,
            "error": "Forbidden",
            "message": "Endpoint authorization failure"
        })))
        .mount(&server)
        .await;

    let err = execute_command(&client, &config, &ExecuteRequest::new("id"))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
    let msg = err.to_string();
    assert!(msg.contains("403"), "got: {msg}");
    assert!(msg.contains("Endpoint authorization failure"), "got: {msg}");
}

#[tokio::test]
async fn prepare_file_download_posts_path() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/get_file"))
        .and(body_json(serde_json::json!({
            "endpoint_ids": ["ep-1"],
            "parameters": { "path": "/var/log/app.log" },
            "comment": "File download request"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "action": "gf-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let action_id =
        prepare_file_download(&client, &config, "/var/log/app.log", DOWNLOAD_COMMENT)
            .await
            .unwrap();
    assert_eq!(action_id, "gf-1");
}

#[tokio::test]
async fn upload_sends_multipart_with_file_and_endpoint_ids() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("collector.sh");
    std::fs::write(&local, b"#!/bin/sh\necho collected\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/upload"))
        .and(header("kbn-xsrf", "true"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("echo collected"))
        .and(body_string_contains(r#"["ep-1"]"#))
        .and(body_string_contains("collector.sh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "action": "up-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let action_id = upload_file(&client, &config, &local, None).await.unwrap();
    assert_eq!(action_id, "up-1");
}

#[tokio::test]
async fn upload_of_missing_file_sends_nothing() {
    let server = MockServer::start().await;
    let config = cluster(&server);
    let client = DefendClient::new(&config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/endpoint/action/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let missing = std::path::Path::new("/nonexistent/es-defend/payload.bin");
    let err = upload_file(&client, &config, missing, None)
        .await
        .unwrap_err();
    match err {
        DefendError::Io { path, .. } => assert_eq!(path, missing),
        other => panic!("expected Io error, got {other:?}"),
    }
}
