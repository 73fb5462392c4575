//! Handlers for interactions: per-entity listing and creation.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::{ErrorCode, ToolError},
    normalize::simplify_attributes,
    reltio::ReltioClient,
    validation::{
        BALANCED_FILTER, ENTITY_ID, ORDER, Page, Range, ValidationError, non_empty, optional_text,
        page,
    },
};

use super::{
    Output, ReltioResultExt, ToolOutcome, Validate, flag, parse_request, require_typed_objects,
    tenant,
};

/// Reltio status returned when an interaction crosswalk already exists.
const DUPLICATE_CROSSWALK_STATUS: u16 = 536;

fn default_interaction_max() -> i64 {
    50
}

/// Arguments of `get_entity_interactions`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityInteractionsArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Page size, 1..=the configured limit.
    #[serde(default = "default_interaction_max")]
    max: i64,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// `asc` (default) or `desc`.
    #[serde(default)]
    order: Option<String>,
    /// Field to sort by; interactions sort by timestamp when empty.
    #[serde(default)]
    sort: String,
    /// Filter condition on interactions.
    #[serde(default)]
    filter: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct EntityInteractions {
    tenant: String,
    entity_id: String,
    page: Page,
    order: String,
    sort: String,
    filter: String,
}

impl Validate for EntityInteractionsArgs {
    type Output = EntityInteractions;

    fn validate(self, config: &Config) -> Result<EntityInteractions, ValidationError> {
        Ok(EntityInteractions {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            page: page(
                self.offset,
                ("max", self.max),
                Range::new(1, i64::from(config.max_results_limit)),
            )?,
            order: ORDER.apply_or("order", self.order.as_deref(), "asc")?,
            sort: self.sort.trim().to_string(),
            filter: BALANCED_FILTER.apply("filter", &self.filter)?,
        })
    }
}

/// Handle the `get_entity_interactions` tool.
pub(crate) async fn get_entity_interactions(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<EntityInteractionsArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let mut interactions = client
        .get(client.api_url(&request.tenant, &format!("{uri}/_interactions")))
        .query("max", request.page.max)
        .query("offset", request.page.offset)
        .query("order", &request.order)
        .query_non_empty("sort", &request.sort)
        .query_non_empty("filter", &request.filter)
        .send()
        .await
        .or_tool_error("retrieving entity interactions")
        .map_err(|err| {
            err.when_not_found(|| {
                format!(
                    "Entity with ID {} not found or no interactions available",
                    request.entity_id
                )
            })
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserInteraction,
            format!("Fetched interactions for entity {}", request.entity_id),
        )
        .object(uri),
    )
    .await;

    if let Some(records) = interactions
        .get_mut("interactions")
        .and_then(Value::as_array_mut)
    {
        for record in records {
            if let Some(attributes) = record.get("attributes") {
                let simplified = simplify_attributes(attributes, false);
                record["attributes"] = simplified;
            }
        }
    }
    Ok(Output::Yaml(interactions))
}

fn default_source_system() -> String {
    "configuration/sources/Reltio".into()
}

fn default_true() -> bool {
    true
}

/// Arguments of `create_interactions`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateInteractionsArgs {
    /// Interaction objects; each needs a non-empty `type`.
    interactions: Vec<Value>,
    /// Source system sent in the `Source-System` header.
    #[serde(default = "default_source_system")]
    source_system: String,
    /// Identifier of the interaction in the source system.
    #[serde(default)]
    crosswalk_value: String,
    /// Include the created objects in the response.
    #[serde(default = "default_true")]
    return_objects: bool,
    /// Request options, e.g. `sendHidden`.
    #[serde(default)]
    options: Option<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CreateInteractions {
    tenant: String,
    interactions: Vec<Value>,
    source_system: String,
    crosswalk_value: String,
    return_objects: bool,
    options: Option<String>,
}

impl Validate for CreateInteractionsArgs {
    type Output = CreateInteractions;

    fn validate(self, config: &Config) -> Result<CreateInteractions, ValidationError> {
        require_typed_objects("interactions", &self.interactions)?;
        Ok(CreateInteractions {
            tenant: tenant(config, self.tenant_id)?,
            interactions: self.interactions,
            source_system: non_empty("source_system", &self.source_system)?,
            crosswalk_value: self.crosswalk_value.trim().to_string(),
            return_objects: self.return_objects,
            options: optional_text(self.options),
        })
    }
}

/// Handle the `create_interactions` tool.
pub(crate) async fn create_interactions(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<CreateInteractionsArgs>(arguments, client.config())?;

    let created = client
        .post(client.api_url(&request.tenant, "interactions"))
        .global_id()
        .header("Source-System", request.source_system.clone())
        .query("returnObjects", flag(request.return_objects))
        .query_non_empty("crosswalkValue", &request.crosswalk_value)
        .query_opt("options", request.options.as_deref())
        .json(Value::Array(request.interactions.clone()))
        .send()
        .await
        .map_err(|err| {
            let duplicate = err
                .status()
                .is_some_and(|status| status.as_u16() == DUPLICATE_CROSSWALK_STATUS);
            let error = ToolError::from_reltio(err, "creating interactions");
            if duplicate {
                ToolError::new(
                    ErrorCode::Conflict,
                    "Duplicate interaction ID or existing crosswalk. Interactions must have unique IDs and crosswalks.",
                )
            } else {
                error.reclassify(ErrorCode::InvalidRequest, ErrorCode::BadRequest)
            }
        })?;

    if let Some(results) = created.as_array() {
        let succeeded = results
            .iter()
            .filter(|result| result.get("status").and_then(Value::as_str) == Some("OK"))
            .count();
        let failed = results
            .iter()
            .filter(|result| result.get("error").is_some() || result.get("errors").is_some())
            .count();
        let warned = results
            .iter()
            .filter(|result| result.get("warning").is_some())
            .count();
        tracing::info!(succeeded, failed, warned, "Interaction creation results");
    }

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserInteraction,
            format!(
                "Created {} interaction(s) from {}",
                request.interactions.len(),
                request.source_system
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(created))
}
