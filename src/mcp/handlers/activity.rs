//! Handlers querying the tenant activity log.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::{ErrorCode, ToolError},
    reltio::ReltioClient,
    validation::{Range, TimeWindow, ValidationError, bounded, non_empty, optional_text, sanitize, time_window},
};

use super::{Output, ReltioResultExt, ToolOutcome, Validate, parse_request, tenant};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Activity kinds that count as a user being active.
const USER_ACTIVITY_CLAUSES: [&str; 18] = [
    "startsWith(label, 'USER_LOGIN')",
    "startsWith(label, 'COMMENT_ADDED')",
    "startsWith(label, 'COMMENT_DELETED')",
    "startsWith(label, 'COMMENT_UPDATED')",
    "equals(items.data.type, NOT_MATCHES_SET)",
    "equals(items.data.type, NOT_MATCHES_RESET)",
    "equals(items.data.type, POTENTIAL_MATCHES_FOUND)",
    "equals(items.data.type, POTENTIAL_MATCHES_REMOVED)",
    "equals(items.data.type, ENTITY_CREATED)",
    "equals(items.data.type, ENTITIES_MERGED_MANUALLY)",
    "equals(items.data.type, ENTITY_REMOVED)",
    "equals(items.data.type, ENTITIES_SPLITTED)",
    "equals(items.data.type, ENTITY_CHANGED)",
    "startsWith(label, 'USER_PROFILE_VIEW')",
    "equals(items.data.type, RELATIONSHIP_CREATED)",
    "equals(items.data.type, RELATIONSHIP_REMOVED)",
    "equals(items.data.type, RELATIONSHIP_CHANGED)",
    "startsWith(label, 'USER_SEARCH')",
];

/// Merge event types queried when the caller names none.
const DEFAULT_MERGE_EVENTS: [&str; 3] = [
    "ENTITIES_MERGED_MANUALLY",
    "ENTITIES_MERGED",
    "ENTITIES_MERGED_ON_THE_FLY",
];

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn default_days_back() -> i64 {
    7
}

/// Arguments of `check_user_activity`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UserActivityArgs {
    /// Username to check.
    username: String,
    /// Look-back window in days, 1..=365.
    #[serde(default = "default_days_back")]
    days_back: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UserActivity {
    tenant: String,
    username: String,
    days_back: i64,
}

impl Validate for UserActivityArgs {
    type Output = UserActivity;

    fn validate(self, config: &Config) -> Result<UserActivity, ValidationError> {
        Ok(UserActivity {
            tenant: tenant(config, self.tenant_id)?,
            username: sanitize(&non_empty("username", &self.username)?),
            days_back: Range::new(1, 365).check("days_back", self.days_back)?,
        })
    }
}

fn user_activity_filter(username: &str, threshold: i64) -> String {
    format!(
        "(equals(user, '{username}')) and ({}) and (gte(timestamp, {threshold})) and (not equals(user, 'collaboration-service'))",
        USER_ACTIVITY_CLAUSES.join(" or ")
    )
}

/// Handle the `check_user_activity` tool.
pub(crate) async fn check_user_activity(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UserActivityArgs>(arguments, client.config())?;
    let threshold = now_millis() - request.days_back * DAY_MILLIS;

    let activities = client
        .get(client.api_url(&request.tenant, "activities"))
        .query("filter", user_activity_filter(&request.username, threshold))
        .query("max", 1)
        .query("offset", 0)
        .send()
        .await
        .map_err(|err| {
            ToolError::new(
                ErrorCode::ApiRequestError,
                format!("Failed to retrieve user activities: {err}"),
            )
        })?;

    let found = activities.as_array().cloned().unwrap_or_default();
    let is_active = !found.is_empty();

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserDetails,
            format!(
                "Checked activity for user {} (active: {is_active})",
                request.username
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "username": request.username,
        "days_checked": request.days_back,
        "timestamp_threshold": threshold,
        "is_active": is_active,
        "activity_found": found.len(),
        "last_activity": found.first().cloned().unwrap_or(Value::Null),
    })))
}

fn default_merge_max() -> i64 {
    100
}

/// Arguments of `get_merge_activities`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct MergeActivitiesArgs {
    /// Only events after this epoch-millisecond timestamp.
    timestamp_gt: i64,
    /// Merge event types; defaults to manual, automatic and on-the-fly merges.
    #[serde(default)]
    event_types: Option<Vec<String>>,
    /// Only events before this epoch-millisecond timestamp.
    #[serde(default)]
    timestamp_lt: Option<i64>,
    /// Entity type name, e.g. `Individual`.
    #[serde(default)]
    entity_type: Option<String>,
    /// Only merges performed by this user.
    #[serde(default)]
    user: Option<String>,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// Page size; clamped to 1..=the configured limit.
    #[serde(default = "default_merge_max")]
    max_results: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct MergeActivities {
    tenant: String,
    filter: String,
    offset: i64,
    max: i64,
}

fn merge_activity_filter(
    window: TimeWindow,
    event_types: &[String],
    entity_type: Option<&str>,
    user: Option<&str>,
) -> String {
    let mut parts = Vec::new();
    if let Some(lower) = window.lower {
        parts.push(format!("gt(timestamp,{lower})"));
    }
    if let Some(upper) = window.upper {
        parts.push(format!("lt(timestamp,{upper})"));
    }
    let events: Vec<String> = event_types
        .iter()
        .map(|event| format!("equals(items.data.type,'{event}')"))
        .collect();
    match events.as_slice() {
        [] => {}
        [single] => parts.push(single.clone()),
        many => parts.push(format!("({})", many.join(" OR "))),
    }
    if let Some(entity_type) = entity_type {
        parts.push(format!(
            "equals(items.objectType,'configuration/entityTypes/{entity_type}')"
        ));
    }
    if let Some(user) = user {
        parts.push(format!("equals(user,'{user}')"));
    }
    parts.join(" AND ")
}

impl Validate for MergeActivitiesArgs {
    type Output = MergeActivities;

    fn validate(self, config: &Config) -> Result<MergeActivities, ValidationError> {
        let window = time_window(
            ("timestamp_gt", Some(self.timestamp_gt)),
            ("timestamp_lt", self.timestamp_lt),
            false,
        )?;
        let event_types: Vec<String> = match self.event_types {
            Some(events) => events
                .iter()
                .filter_map(|event| optional_text(Some(sanitize(event))))
                .collect(),
            None => DEFAULT_MERGE_EVENTS.iter().map(|event| event.to_string()).collect(),
        };
        let entity_type = match optional_text(self.entity_type) {
            Some(entity_type) => Some(sanitize(&bounded("entity_type", &entity_type, 200)?)),
            None => None,
        };
        let user = optional_text(self.user).map(|user| sanitize(&user));

        Ok(MergeActivities {
            tenant: tenant(config, self.tenant_id)?,
            filter: merge_activity_filter(
                window,
                &event_types,
                entity_type.as_deref(),
                user.as_deref(),
            ),
            offset: Range::at_least(0).check("offset", self.offset)?,
            max: Range::new(1, i64::from(config.max_results_limit)).clamp(self.max_results),
        })
    }
}

/// Handle the `get_merge_activities` tool.
pub(crate) async fn get_merge_activities(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<MergeActivitiesArgs>(arguments, client.config())?;
    tracing::info!(tenant = %request.tenant, "Fetching merge activities");

    let activities = client
        .get(client.api_url(&request.tenant, "activities"))
        .query("filter", &request.filter)
        .query("offset", request.offset)
        .query("max", request.max)
        .send()
        .await
        .or_tool_error("retrieving merge activities")
        .map_err(|err| err.when_not_found(|| "Activities resource not found".into()))?;

    let uris: Vec<&str> = activities
        .as_array()
        .map(|events| {
            events
                .iter()
                .filter_map(|event| event.get("uri").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::GetMergeActivities,
            format!("Fetched merge activities: {}", uris.join(", ")),
        ),
    )
    .await;

    Ok(Output::Yaml(activities))
}
