//! End-to-end bridge tests
//!
//! One mock server plays both the authorization server and the tool
//! gateway:
//! - Startup wiring (token, handshake, catalog)
//! - Remote tool dispatch and failure reporting
//! - Refresh-and-retry after a mid-session 401

use gateway_m2m::Error;
use gateway_m2m::bridge::AgentBridge;
use gateway_m2m::config::Config;
use gateway_m2m::gateway::GatewaySession;
use gateway_m2m::oauth::{CredentialStore, TokenProvider};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.credentials.client_id = "abc".to_string();
    config.credentials.client_secret = "xyz".to_string();
    config.credentials.scope = "gateway/invoke".to_string();
    config.credentials.token_endpoint = format!("{}/oauth2/token", server.uri());
    config.gateway.url = format!("{}/mcp", server.uri());
    config
}

fn rpc(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

async fn mount_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

async fn mount_gateway(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("mcp-session-id", "sess-1")
                .set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "result": {
                        "protocolVersion": "2025-03-26",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "wills-gateway", "version": "2.1"}
                    }
                })),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(rpc(json!({"tools": [
            {
                "name": "wills___save_answers",
                "description": "Persist questionnaire answers",
                "inputSchema": {"type": "object", "properties": {"answers": {"type": "object"}}}
            },
            {"name": "wills___draft_will", "description": "Draft the will document"}
        ]})))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", "sess-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Startup wires token, session and toolset
#[tokio::test]
async fn test_bridge_start_and_list() {
    let server = MockServer::start().await;
    mount_token(&server, "tok1", 1).await;
    mount_gateway(&server).await;

    let bridge = AgentBridge::start(&config(&server)).await.unwrap();
    let names: Vec<_> = bridge.toolset().names().collect();
    assert_eq!(names, ["wills___draft_will", "wills___save_answers"]);
    assert_eq!(bridge.session().server_info().name, "wills-gateway");
    assert_eq!(bridge.session().token_provider().exchange_count(), 1);

    bridge.shutdown().await.unwrap();
    assert!(!bridge.session().is_connected());
}

/// Tool results and tool failures both reach the agent as outputs
#[tokio::test]
async fn test_dispatch_success_and_failure() {
    let server = MockServer::start().await;
    mount_token(&server, "tok1", 1).await;
    mount_gateway(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call", "params": {"name": "wills___save_answers"}})))
        .respond_with(rpc(json!({
            "content": [{"type": "text", "text": "saved 3 answers"}],
            "isError": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call", "params": {"name": "wills___draft_will"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "questionnaire incomplete", "data": {"missing": ["spouse"]}}
        })))
        .mount(&server)
        .await;

    let bridge = AgentBridge::start(&config(&server)).await.unwrap();

    let output = bridge
        .toolset()
        .dispatch("wills___save_answers", json!({"answers": {"a": 1}}))
        .await
        .unwrap();
    assert!(!output.is_error);
    assert_eq!(output.to_text(), "saved 3 answers");

    let output = bridge
        .toolset()
        .dispatch("wills___draft_will", json!({}))
        .await
        .unwrap();
    assert!(output.is_error);
    let payload = output.structured_content.unwrap();
    assert_eq!(payload["message"], "questionnaire incomplete");
    assert_eq!(payload["data"]["missing"][0], "spouse");

    let err = bridge.toolset().dispatch("nope", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));
}

/// A 401 mid-session forces exactly one refresh and one retry
#[tokio::test]
async fn test_mid_session_401_refreshes() {
    let server = MockServer::start().await;
    mount_token(&server, "tok1", 1).await;
    mount_token(&server, "tok2", 1).await;
    mount_gateway(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call"})))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call"})))
        .and(header("authorization", "Bearer tok2"))
        .respond_with(rpc(json!({"content": [{"type": "text", "text": "ok"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = AgentBridge::start(&config(&server)).await.unwrap();
    let output = bridge
        .toolset()
        .dispatch("wills___save_answers", json!({}))
        .await
        .unwrap();

    assert_eq!(output.to_text(), "ok");
    assert_eq!(bridge.session().token_provider().exchange_count(), 2);
}

/// Gateway keeps rejecting: the caller gets an authorization error
#[tokio::test]
async fn test_persistent_401_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "revoked",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let config = config(&server);
    let credential = CredentialStore::load(&config).await.unwrap();
    let tokens = Arc::new(TokenProvider::from_config(credential, &config.token).unwrap());
    let err = GatewaySession::open(&config, Arc::clone(&tokens))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Auth { status: Some(401), .. }));
    assert_eq!(tokens.exchange_count(), 2);
}

/// Semantic search goes through the gateway's built-in search tool
#[tokio::test]
async fn test_search_tools() {
    let server = MockServer::start().await;
    mount_token(&server, "tok1", 1).await;
    mount_gateway(&server).await;
    let hits = json!([{"name": "wills___draft_will", "description": "Draft the will document"}]);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"name": "x_amz_bedrock_agentcore_search", "arguments": {"query": "draft"}}
        })))
        .respond_with(rpc(json!({"content": [{"type": "text", "text": hits.to_string()}]})))
        .mount(&server)
        .await;

    let config = config(&server);
    let credential = CredentialStore::load(&config).await.unwrap();
    let tokens = Arc::new(TokenProvider::from_config(credential, &config.token).unwrap());
    let session = GatewaySession::open(&config, tokens).await.unwrap();

    let found = session.search_tools("draft").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].target.as_deref(), Some("wills"));
    session.close().await.unwrap();
}
