//! Handlers that read the tenant's user directory from the auth service.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::{ErrorCode, ToolError},
    reltio::ReltioClient,
    validation::{ValidationError, non_empty},
};

use super::{Output, ToolOutcome, Validate, parse_request, tenant};

/// Arguments of `get_users_by_role_and_tenant`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UsersByRoleArgs {
    /// Role to filter by, e.g. `ROLE_REVIEWER`, `ROLE_READONLY`, `ROLE_USER`, `ROLE_API`.
    role: String,
    /// Tenant the role must be granted on; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

/// Arguments of `get_users_by_group_and_tenant`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UsersByGroupArgs {
    /// Group to filter by, e.g. `GROUP_LOCAL_RO_ALL`.
    group: String,
    /// Tenant whose users are listed; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UserQuery {
    tenant: String,
    value: String,
}

impl Validate for UsersByRoleArgs {
    type Output = UserQuery;

    fn validate(self, config: &Config) -> Result<UserQuery, ValidationError> {
        Ok(UserQuery {
            tenant: tenant(config, self.tenant_id)?,
            value: non_empty("role", &self.role)?,
        })
    }
}

impl Validate for UsersByGroupArgs {
    type Output = UserQuery;

    fn validate(self, config: &Config) -> Result<UserQuery, ValidationError> {
        Ok(UserQuery {
            tenant: tenant(config, self.tenant_id)?,
            value: non_empty("group", &self.group)?,
        })
    }
}

async fn tenant_users(client: &ReltioClient, tenant: &str) -> Result<Vec<Value>, ToolError> {
    let users = client
        .get(client.auth_url(&format!("oauth/users/tenant/{tenant}")))
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(tenant, error = %err, "User directory request failed");
            ToolError::new(
                ErrorCode::ApiRequestError,
                format!("Failed to retrieve users: {err}"),
            )
        })?;
    match users {
        Value::Array(users) => Ok(users),
        Value::Null => Ok(Vec::new()),
        _ => Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            "User directory response was not a list",
        )),
    }
}

fn user_summary(user: &Value) -> Map<String, Value> {
    let field = |key: &str, fallback: Value| user.get(key).cloned().unwrap_or(fallback);
    let mut summary = Map::new();
    summary.insert("username".into(), field("username", json!("")));
    summary.insert("email".into(), field("email", json!("")));
    summary.insert("enabled".into(), field("enabled", json!(false)));
    summary.insert(
        "groups".into(),
        user.get("groups")
            .filter(|groups| !groups.is_null())
            .cloned()
            .unwrap_or_else(|| json!([])),
    );
    summary.insert("lastLoginDate".into(), field("lastLoginDate", Value::Null));
    summary
}

fn has_role_on_tenant(user: &Value, role: &str, tenant: &str) -> bool {
    user.pointer("/userPermissions/roles")
        .and_then(|roles| roles.get(role))
        .and_then(Value::as_array)
        .is_some_and(|tenants| tenants.iter().any(|t| t.as_str() == Some(tenant)))
}

fn in_group(user: &Value, group: &str) -> bool {
    user.get("groups")
        .and_then(Value::as_array)
        .is_some_and(|groups| groups.iter().any(|g| g.as_str() == Some(group)))
}

/// Handle the `get_users_by_role_and_tenant` tool.
pub(crate) async fn get_users_by_role_and_tenant(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UsersByRoleArgs>(arguments, client.config())?;
    let users = tenant_users(client, &request.tenant).await?;

    let matching: Vec<Value> = users
        .iter()
        .filter(|user| has_role_on_tenant(user, &request.value, &request.tenant))
        .map(|user| {
            let mut summary = user_summary(user);
            summary.insert("role".into(), json!(request.value));
            summary.insert("tenant".into(), json!(request.tenant));
            Value::Object(summary)
        })
        .collect();

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserDetails,
            format!(
                "Fetched users with role {} for tenant {}",
                request.value, request.tenant
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "role": request.value,
        "tenant_id": request.tenant,
        "user_count": matching.len(),
        "users": matching,
    })))
}

/// Handle the `get_users_by_group_and_tenant` tool.
pub(crate) async fn get_users_by_group_and_tenant(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UsersByGroupArgs>(arguments, client.config())?;
    let users = tenant_users(client, &request.tenant).await?;

    let matching: Vec<Value> = users
        .iter()
        .filter(|user| in_group(user, &request.value))
        .map(|user| {
            let mut summary = user_summary(user);
            summary.insert("group".into(), json!(request.value));
            Value::Object(summary)
        })
        .collect();

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserDetails,
            format!("Fetched users with group {}", request.value),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "group": request.value,
        "user_count": matching.len(),
        "users": matching,
    })))
}
