use std::sync::Arc;

use httpmock::{Method::GET, Method::POST, MockServer};
use reltio_mcp::{config::Config, mcp::ReltioMcpServer, reltio::ReltioClient};
use rmcp::{
    handler::client::ClientHandler,
    model::{self, CallToolRequestParam, CallToolResult, ClientInfo, PaginatedRequestParam},
    service::{RoleClient, RoleServer, RunningService, Service, serve_directly},
    transport::async_rw::AsyncRwTransport,
};
use serde_json::{Value, json};
use tokio::io::split;

#[derive(Clone, Default)]
struct DummyClientHandler;

impl ClientHandler for DummyClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

struct TestHarness {
    mock: MockServer,
    service: RunningService<RoleClient, DummyClientHandler>,
    server: RunningService<RoleServer, ReltioMcpServer>,
}

impl TestHarness {
    async fn new() -> Self {
        let mock = MockServer::start_async().await;
        let config = Config::for_base_url(&mock.base_url(), "t1");
        let client = ReltioClient::new(Arc::new(config)).expect("reltio client");
        let server = ReltioMcpServer::new(Arc::new(client));

        let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = split(client_stream);
        let (server_read, server_write) = split(server_stream);

        let client_transport = AsyncRwTransport::new_client(client_read, client_write);
        let server_transport = AsyncRwTransport::new_server(server_read, server_write);

        let server_info = server.get_info();
        let client_handler = DummyClientHandler;
        let client_info = ClientHandler::get_info(&client_handler);

        let server =
            serve_directly::<RoleServer, _, _, _, _>(server, server_transport, Some(client_info));
        let service = serve_directly::<RoleClient, _, _, _, _>(
            client_handler,
            client_transport,
            Some(server_info),
        );

        Self {
            mock,
            service,
            server,
        }
    }

    async fn call(&self, name: &'static str, arguments: Value) -> CallToolResult {
        self.service
            .call_tool(CallToolRequestParam {
                name: name.into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
            .expect("tool call")
    }

    async fn shutdown(self) {
        let Self {
            service, server, ..
        } = self;
        let _ = service.cancel().await;
        let _ = server.cancel().await;
    }
}

fn error_code(result: &CallToolResult) -> String {
    assert_eq!(result.is_error, Some(true), "expected an error result");
    let payload = result
        .structured_content
        .as_ref()
        .expect("structured error envelope");
    payload["error"]["code_key"]
        .as_str()
        .expect("code_key")
        .to_string()
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let harness = TestHarness::new().await;
    let service = &harness.service;

    let info = service
        .peer_info()
        .expect("server info should be initialized");
    assert_eq!(info.server_info.name, "reltio-mcp");
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.resources.is_some());

    let tools_result = service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");

    let names: Vec<_> = tools_result
        .tools
        .iter()
        .map(|tool| tool.name.as_ref())
        .collect();

    for expected in [
        "search_entities",
        "get_entity",
        "merge_entities",
        "find_potential_matches",
        "search_relations",
        "create_interactions",
        "get_merge_activities",
        "get_possible_assignees",
        "get_data_model_definition",
        "get_entity_type_definition",
        "capabilities",
        "health_check",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn entity_is_read_as_yaml() {
    let harness = TestHarness::new().await;
    let entity = harness
        .mock
        .mock_async(|when, then| {
            when.method(GET).path("/reltio/api/t1/entities/e1");
            then.status(200).json_body(json!({
                "uri": "entities/e1",
                "label": "Jane Doe",
                "attributes": {
                    "FirstName": [{"value": "Jane", "ov": true}],
                    "LastName": [{"value": "Doe", "ov": true}]
                }
            }));
        })
        .await;
    let audit = harness
        .mock
        .mock_async(|when, then| {
            when.method(POST)
                .path("/reltio/api/t1/activities")
                .body_contains("USER_PROFILE_VIEW");
            then.status(200).json_body(json!([]));
        })
        .await;

    let result = harness
        .call("get_entity", json!({"entity_id": "entities/e1"}))
        .await;
    entity.assert_async().await;
    audit.assert_async().await;

    assert_eq!(result.is_error, Some(false));
    let text = result.content[0]
        .as_text()
        .expect("yaml text content")
        .text
        .clone();
    let parsed: Value = serde_yaml::from_str(&text).expect("valid yaml");
    assert_eq!(parsed["attributes"]["FirstName"], "Jane");

    harness.shutdown().await;
}

#[tokio::test]
async fn missing_entity_is_an_error_envelope() {
    let harness = TestHarness::new().await;
    harness
        .mock
        .mock_async(|when, then| {
            when.method(GET).path("/reltio/api/t1/entities/gone");
            then.status(404)
                .json_body(json!({"errorMessage": "Entity not found"}));
        })
        .await;

    let result = harness.call("get_entity", json!({"entity_id": "gone"})).await;
    assert_eq!(error_code(&result), "RESOURCE_NOT_FOUND");
    let message = result.structured_content.as_ref().unwrap()["error"]["message"].clone();
    assert_eq!(message, "Entity with ID gone not found");

    harness.shutdown().await;
}

#[tokio::test]
async fn merge_requires_exactly_two_entities() {
    let harness = TestHarness::new().await;
    let merge = harness
        .mock
        .mock_async(|when, then| {
            when.method(POST).path("/reltio/api/t1/entities/_same");
            then.status(200).json_body(json!({}));
        })
        .await;

    let result = harness
        .call("merge_entities", json!({"entity_ids": ["e1"]}))
        .await;
    assert_eq!(error_code(&result), "VALIDATION_ERROR");
    merge.assert_hits_async(0).await;

    harness.shutdown().await;
}

#[tokio::test]
async fn possible_assignees_need_exactly_one_scope() {
    let harness = TestHarness::new().await;

    let both = harness
        .call(
            "get_possible_assignees",
            json!({"tasks": ["1"], "task_filter": {"assignee": "ana"}}),
        )
        .await;
    assert_eq!(error_code(&both), "VALIDATION_ERROR");

    let neither = harness.call("get_possible_assignees", json!({})).await;
    assert_eq!(error_code(&neither), "VALIDATION_ERROR");

    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_arguments_are_rejected_in_the_envelope() {
    let harness = TestHarness::new().await;
    let result = harness
        .call("get_relation", json!({"relation_id": "r1", "bogus": true}))
        .await;
    assert_eq!(error_code(&result), "VALIDATION_ERROR");
    harness.shutdown().await;
}

#[tokio::test]
async fn system_tools_answer_without_reltio() {
    let harness = TestHarness::new().await;

    let health = harness.call("health_check", json!({})).await;
    assert_eq!(health.is_error, Some(false));
    let payload = health.structured_content.expect("health payload");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["message"], "MCP server is running");

    let capabilities = harness.call("capabilities", json!({})).await;
    let payload = capabilities.structured_content.expect("capabilities payload");
    assert_eq!(payload["server_name"], "reltio-mcp");
    assert!(payload["tools"].as_array().unwrap().len() > 40);

    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error() {
    let harness = TestHarness::new().await;

    let err = harness
        .service
        .call_tool(CallToolRequestParam {
            name: "does_not_exist".into(),
            arguments: None,
        })
        .await
        .expect_err("unknown tool should fail");

    match err {
        rmcp::service::ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INVALID_PARAMS);
        }
        other => panic!("expected MCP error, got {other:?}"),
    }

    harness.shutdown().await;
}
