use std::sync::Arc;

use reltio_mcp::{config, reltio::ReltioClient};

fn live_client() -> ReltioClient {
    let config = config::init_config().expect("RELTIO_* variables must be set for live tests");
    ReltioClient::new(Arc::new(config.clone())).expect("client")
}

#[tokio::test]
#[ignore = "Requires a live Reltio tenant"]
async fn live_entity_page_is_a_list() {
    let client = live_client();
    let tenant = client.config().default_tenant.clone();
    let entities = client
        .get(client.api_url(&tenant, "entities"))
        .query("max", 1)
        .query("select", "uri")
        .send()
        .await
        .expect("entity listing");
    assert!(entities.is_array(), "expected a list: {entities}");
}

#[tokio::test]
#[ignore = "Requires a live Reltio tenant"]
async fn live_user_directory_is_reachable() {
    let client = live_client();
    let tenant = client.config().default_tenant.clone();
    let users = client
        .get(client.auth_url(&format!("oauth/users/tenant/{tenant}")))
        .send()
        .await
        .expect("user directory");
    assert!(users.is_array() || users.is_null(), "unexpected users payload: {users}");
}
