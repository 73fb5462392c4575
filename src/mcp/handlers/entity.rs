//! Handlers for entity search, retrieval, update, creation and graph traversal.

use std::collections::BTreeMap;

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel, search_activity_description},
    config::Config,
    error::{ErrorCode, ToolError},
    normalize::{filter_entity, is_present, simplify_attributes, slim_crosswalks, summarize_graph_entity},
    reltio::ReltioClient,
    validation::{
        CHANGE_REQUEST_ID, ENTITY_ACTIVENESS, ENTITY_ID, ORDER, Page, Range, SEARCH_FILTER,
        ValidationError, bounded, min_len, non_empty, optional_text, page, sanitize,
    },
};

use super::{
    Output, ReltioResultExt, ToolOutcome, Validate, flag, parse_request, require_typed_objects,
    tenant,
};

/// Hard ceiling on search page size regardless of the configured limit.
pub(crate) const SEARCH_PAGE_CEILING: i64 = 10;
/// Reltio error code reported when a hierarchy lookup has no parents for the graph type.
const PARENTS_NOT_FOUND_CODE: i64 = 119;
const MAX_ENTITY_TYPE_LENGTH: usize = 200;

fn default_search_max() -> i64 {
    10
}

fn default_search_select() -> String {
    "uri,label".into()
}

fn default_ov_only() -> String {
    "ovOnly".into()
}

fn default_true() -> bool {
    true
}

/// Arguments of `search_entities`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SearchEntitiesArgs {
    /// Reltio filter expression, e.g. `containsWordStartingWith(attributes,'John')`. Conditions
    /// combine with `and`/`or`.
    #[serde(default)]
    filter: String,
    /// Entity type in PascalCase, e.g. `Individual`, `Organization`, `HCP`.
    #[serde(default)]
    entity_type: String,
    /// Page size; capped at 10 per call.
    #[serde(default = "default_search_max")]
    max_results: i64,
    /// Attribute to sort by.
    #[serde(default)]
    sort: String,
    /// `asc` (default) or `desc`.
    #[serde(default)]
    order: Option<String>,
    /// Comma-separated fields to return; `uri` is always included.
    #[serde(default = "default_search_select")]
    select: String,
    /// Comma-separated search options such as `ovOnly`, `searchByOv`, `sendHidden`.
    #[serde(default = "default_ov_only")]
    options: String,
    /// `active` (default), `all`, `not_active` or `expired`.
    #[serde(default)]
    activeness: Option<String>,
    /// Zero-based start index; advance by the number of results already received.
    #[serde(default)]
    offset: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SearchEntities {
    tenant: String,
    filter: String,
    entity_type: String,
    page: Page,
    sort: String,
    order: String,
    select: String,
    options: String,
    activeness: String,
}

impl Validate for SearchEntitiesArgs {
    type Output = SearchEntities;

    fn validate(self, config: &Config) -> Result<SearchEntities, ValidationError> {
        let sanitized = SEARCH_FILTER.apply("filter", &self.filter)?;
        let entity_type = sanitize(&bounded(
            "entity_type",
            &self.entity_type,
            MAX_ENTITY_TYPE_LENGTH,
        )?)
        .replace(['(', ')'], "");
        let requested = Range::new(1, i64::from(config.max_results_limit))
            .check("max_results", self.max_results)?;
        let page = page(
            self.offset,
            ("max_results", requested.min(SEARCH_PAGE_CEILING)),
            Range::new(1, SEARCH_PAGE_CEILING),
        )?;

        Ok(SearchEntities {
            tenant: tenant(config, self.tenant_id)?,
            filter: with_entity_type(&sanitized, &entity_type),
            entity_type,
            page,
            sort: self.sort.trim().to_string(),
            order: ORDER.apply_or("order", self.order.as_deref(), "asc")?,
            select: ensure_uri_selected(&self.select),
            options: self.options.trim().to_string(),
            activeness: ENTITY_ACTIVENESS.apply_or(
                "activeness",
                self.activeness.as_deref(),
                "active",
            )?,
        })
    }
}

/// AND the entity-type clause onto an already sanitized filter.
fn with_entity_type(filter: &str, entity_type: &str) -> String {
    if entity_type.is_empty() {
        return filter.to_string();
    }
    let clause = format!("equals(type,'configuration/entityTypes/{entity_type}')");
    if filter.is_empty() {
        clause
    } else {
        format!("{filter} and {clause}")
    }
}

fn ensure_uri_selected(select: &str) -> String {
    let select = select.trim();
    if select.is_empty() {
        return default_search_select();
    }
    if select.split(',').any(|field| field.trim() == "uri") {
        select.to_string()
    } else {
        format!("uri,{select}")
    }
}

/// Flatten attributes and crosswalks of a search hit, keeping every other field.
fn compact_hit(hit: &Value) -> Value {
    let Some(map) = hit.as_object() else {
        return hit.clone();
    };
    let mut compact = Map::new();
    for (key, value) in map {
        match key.as_str() {
            "attributes" => {
                compact.insert(key.clone(), simplify_attributes(value, false));
            }
            "crosswalks" => {
                compact.insert(key.clone(), Value::Array(slim_crosswalks(value, false)));
            }
            _ if is_present(value) => {
                compact.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(compact)
}

/// Handle the `search_entities` tool.
pub(crate) async fn search_entities(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<SearchEntitiesArgs>(arguments, client.config())?;

    let hits = client
        .post(client.api_url(&request.tenant, "entities/_search"))
        .query_non_empty("filter", &request.filter)
        .query("select", &request.select)
        .query("max", request.page.max)
        .query("offset", request.page.offset)
        .query_non_empty("sort", &request.sort)
        .query("order", &request.order)
        .query_non_empty("options", &request.options)
        .query("activeness", &request.activeness)
        .send()
        .await
        .or_tool_error("searching entities")?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserSearch,
            search_activity_description(&request.filter, &request.entity_type, &request.options),
        ),
    )
    .await;

    let results: Vec<Value> = hits
        .as_array()
        .map(|hits| hits.iter().map(compact_hit).collect())
        .unwrap_or_default();
    if results.is_empty() {
        return Ok(Output::Json(json!({
            "message": "No entities matched the search criteria.",
            "results": [],
        })));
    }
    Ok(Output::Yaml(Value::Array(results)))
}

/// Arguments of `get_entity`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetEntityArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Restrict the response to these fields; map a field to the sub-fields to keep, or to an
    /// empty list to keep all of them, e.g. `{"attributes": ["FirstName", "LastName"]}`.
    #[serde(default)]
    filter_field: Option<BTreeMap<String, Vec<String>>>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GetEntity {
    tenant: String,
    entity_id: String,
    filter_field: Option<BTreeMap<String, Vec<String>>>,
}

impl Validate for GetEntityArgs {
    type Output = GetEntity;

    fn validate(self, config: &Config) -> Result<GetEntity, ValidationError> {
        Ok(GetEntity {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            filter_field: self.filter_field.filter(|fields| !fields.is_empty()),
        })
    }
}

/// Handle the `get_entity` tool.
pub(crate) async fn get_entity(client: &ReltioClient, arguments: Option<JsonObject>) -> ToolOutcome {
    let request = parse_request::<GetEntityArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let entity = client
        .get(client.api_url(&request.tenant, &uri))
        .send()
        .await
        .or_tool_error("retrieving entity details")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;
    let Some(entity) = entity.as_object() else {
        return Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            "Entity response was not a JSON object",
        ));
    };

    let label = entity.get("label").cloned().unwrap_or_else(|| json!(""));
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserProfileView,
            json!({ "uri": uri, "label": label }).to_string(),
        )
        .object(uri.clone()),
    )
    .await;

    let filtered = filter_entity(entity, request.filter_field.as_ref());
    let mut result = Map::new();
    result.insert(
        "attributes".into(),
        simplify_attributes(filtered.get("attributes").unwrap_or(&Value::Null), false),
    );
    if let Some(crosswalks) = filtered.get("crosswalks") {
        result.insert(
            "crosswalks".into(),
            Value::Array(slim_crosswalks(crosswalks, false)),
        );
    }
    Ok(Output::Yaml(Value::Object(result)))
}

/// Arguments of `update_entity_attributes`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateEntityAttributesArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Reltio update operations, e.g.
    /// `[{"type": "UPDATE_ATTRIBUTE", "uri": "entities/1/attributes/FirstName/a", "newValue": {"value": "Jane"}}]`.
    updates: Vec<Value>,
    /// Comma-separated options: `sendHidden`, `updateAttributeUpdateDates`,
    /// `addRefAttrUriToCrosswalk`.
    #[serde(default)]
    options: String,
    /// Create a data change request instead of updating the entity directly.
    #[serde(default)]
    always_create_dcr: bool,
    /// Add the changes to this existing change request.
    #[serde(default)]
    change_request_id: Option<String>,
    /// Allow updates to overwrite the default crosswalk value.
    #[serde(default = "default_true")]
    overwrite_default_crosswalk_value: bool,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UpdateEntityAttributes {
    tenant: String,
    entity_id: String,
    updates: Vec<Value>,
    options: String,
    always_create_dcr: bool,
    change_request_id: Option<String>,
    overwrite_default_crosswalk_value: bool,
}

impl Validate for UpdateEntityAttributesArgs {
    type Output = UpdateEntityAttributes;

    fn validate(self, config: &Config) -> Result<UpdateEntityAttributes, ValidationError> {
        min_len("updates", &self.updates, 1)?;
        if let Some(index) = self.updates.iter().position(|update| !update.is_object()) {
            return Err(ValidationError::new(
                format!("updates[{index}]"),
                "must be an object",
            ));
        }
        let change_request_id = optional_text(self.change_request_id)
            .map(|id| CHANGE_REQUEST_ID.apply("change_request_id", &id))
            .transpose()?;

        Ok(UpdateEntityAttributes {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            updates: self.updates,
            options: self.options.trim().to_string(),
            always_create_dcr: self.always_create_dcr,
            change_request_id,
            overwrite_default_crosswalk_value: self.overwrite_default_crosswalk_value,
        })
    }
}

/// Handle the `update_entity_attributes` tool.
pub(crate) async fn update_entity_attributes(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UpdateEntityAttributesArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let result = client
        .post(client.api_url(&request.tenant, &format!("{uri}/_update")))
        .query_non_empty("options", &request.options)
        .query_opt("alwaysCreateDCR", request.always_create_dcr.then_some("true"))
        .query_opt("changeRequestId", request.change_request_id.as_deref())
        .query_opt(
            "overwriteDefaultCrosswalkValue",
            request.overwrite_default_crosswalk_value.then_some("true"),
        )
        .global_id()
        .json(Value::Array(request.updates))
        .send()
        .await
        .or_tool_error("updating entity attributes")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::EntityChanged,
            format!("Updated attributes of {uri}"),
        )
        .object(uri),
    )
    .await;

    Ok(Output::Yaml(result))
}

/// Arguments of `create_entities`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateEntitiesArgs {
    /// Entity objects in Reltio format; each needs a `type` such as
    /// `configuration/entityTypes/Individual` plus `attributes` and `crosswalks`.
    entities: Vec<Value>,
    /// Return the created objects instead of just their URIs.
    #[serde(default)]
    return_objects: bool,
    /// Run lifecycle actions (LCA) on creation.
    #[serde(default = "default_true")]
    execute_lca: bool,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CreateEntities {
    tenant: String,
    entities: Vec<Value>,
    return_objects: bool,
    execute_lca: bool,
}

impl Validate for CreateEntitiesArgs {
    type Output = CreateEntities;

    fn validate(self, config: &Config) -> Result<CreateEntities, ValidationError> {
        require_typed_objects("entities", &self.entities)?;
        Ok(CreateEntities {
            tenant: tenant(config, self.tenant_id)?,
            entities: self.entities,
            return_objects: self.return_objects,
            execute_lca: self.execute_lca,
        })
    }
}

fn summarize_created(result: &Value, return_objects: bool) -> Value {
    let mut entry = Map::new();
    entry.insert(
        "index".into(),
        result.get("index").cloned().unwrap_or(Value::Null),
    );
    if result.get("successful").and_then(Value::as_bool) == Some(true) {
        entry.insert("successful".into(), Value::Bool(true));
        match result.get("object").filter(|_| return_objects) {
            Some(object) => {
                let mut kept = Map::new();
                for key in [
                    "uri",
                    "type",
                    "tags",
                    "createdBy",
                    "createdTime",
                    "updatedBy",
                    "updatedTime",
                    "isFavorite",
                    "label",
                    "crosswalks",
                ] {
                    if let Some(value) = object.get(key).filter(|value| !value.is_null()) {
                        kept.insert(key.into(), value.clone());
                    }
                }
                entry.insert("object".into(), Value::Object(kept));
            }
            None => {
                entry.insert(
                    "uri".into(),
                    result.get("uri").cloned().unwrap_or(Value::Null),
                );
            }
        }
    } else {
        entry.insert("successful".into(), Value::Bool(false));
        if let Some(errors) = result.get("errors") {
            entry.insert("errors".into(), errors.clone());
        }
    }
    Value::Object(entry)
}

/// Handle the `create_entities` tool.
pub(crate) async fn create_entities(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<CreateEntitiesArgs>(arguments, client.config())?;

    let response = client
        .post(client.api_url(&request.tenant, "entities"))
        .query("returnObjects", flag(request.return_objects))
        .query_opt("executeLCA", (!request.execute_lca).then_some("false"))
        .global_id()
        .json(Value::Array(request.entities))
        .send()
        .await
        .or_tool_error("creating entities")?;

    let Some(results) = response.as_array() else {
        return Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            "Unexpected response format from Reltio API",
        ));
    };

    let summaries: Vec<Value> = results
        .iter()
        .map(|result| summarize_created(result, request.return_objects))
        .collect();

    let mut activity = Activity::new(
        ActivityLabel::EntityCreated,
        format!("Created {} entities", results.len()),
    );
    for summary in &summaries {
        let uri = summary
            .get("uri")
            .or_else(|| summary.pointer("/object/uri"))
            .and_then(Value::as_str);
        if let Some(uri) = uri {
            activity = activity.object(uri);
        }
    }
    audit::record(client, &request.tenant, activity).await;

    Ok(Output::Yaml(Value::Array(summaries)))
}

fn default_hops_select() -> String {
    "label,secondaryLabel,entities.attributes,relations.attributes".into()
}

fn default_hops_deep() -> i64 {
    1
}

fn default_hops_max() -> i64 {
    100
}

/// Arguments of `get_entity_graph`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetEntityGraphArgs {
    /// Entity id to start the traversal from.
    entity_id: String,
    /// Comma-separated fields to return for entities and relations.
    #[serde(default = "default_hops_select")]
    select: String,
    /// Comma-separated graph type URIs to traverse.
    #[serde(default)]
    graph_type_uris: String,
    /// Comma-separated relation type URIs to traverse.
    #[serde(default)]
    relation_type_uris: String,
    /// Comma-separated entity type URIs to include.
    #[serde(default)]
    entity_type_uris: String,
    /// Traversal depth, clamped to 1..=10.
    #[serde(default = "default_hops_deep")]
    deep: i64,
    /// Maximum entities returned, clamped to 1..=1500.
    #[serde(default = "default_hops_max")]
    max_results: i64,
    /// Honour relation activeness during traversal.
    #[serde(default = "default_true")]
    activeness_enabled: bool,
    /// Include inactive relations.
    #[serde(default)]
    return_inactive: bool,
    /// Apply entity/relation type filters to the last level only.
    #[serde(default = "default_true")]
    filter_last_level: bool,
    /// Return partial data when the graph exceeds limits.
    #[serde(default)]
    return_data_anyway: bool,
    /// Comma-separated options, `ovOnly` by default.
    #[serde(default = "default_ov_only")]
    options: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GetEntityGraph {
    tenant: String,
    entity_id: String,
    select: String,
    graph_type_uris: String,
    relation_type_uris: String,
    entity_type_uris: String,
    deep: i64,
    max_results: i64,
    activeness_enabled: bool,
    return_inactive: bool,
    filter_last_level: bool,
    return_data_anyway: bool,
    options: String,
}

impl Validate for GetEntityGraphArgs {
    type Output = GetEntityGraph;

    fn validate(self, config: &Config) -> Result<GetEntityGraph, ValidationError> {
        Ok(GetEntityGraph {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            select: self.select.trim().to_string(),
            graph_type_uris: self.graph_type_uris.trim().to_string(),
            relation_type_uris: self.relation_type_uris.trim().to_string(),
            entity_type_uris: self.entity_type_uris.trim().to_string(),
            deep: Range::new(1, 10).clamp(self.deep),
            max_results: Range::new(1, 1500).clamp(self.max_results),
            activeness_enabled: self.activeness_enabled,
            return_inactive: self.return_inactive,
            filter_last_level: self.filter_last_level,
            return_data_anyway: self.return_data_anyway,
            options: self.options.trim().to_string(),
        })
    }
}

/// Handle the `get_entity_graph` tool (entity hops).
pub(crate) async fn get_entity_graph(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<GetEntityGraphArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let hops = client
        .get(client.api_url(&request.tenant, &format!("{uri}/_hops")))
        .query("select", &request.select)
        .query("deep", request.deep)
        .query("max", request.max_results)
        .query("activeness_enabled", flag(request.activeness_enabled))
        .query("returnInactive", flag(request.return_inactive))
        .query("filterLastLevel", flag(request.filter_last_level))
        .query("returnDataAnyway", flag(request.return_data_anyway))
        .query("options", &request.options)
        .query_non_empty("graphTypeURIs", &request.graph_type_uris)
        .query_non_empty("relationTypeURIs", &request.relation_type_uris)
        .query_non_empty("entityTypeURIs", &request.entity_type_uris)
        .send()
        .await
        .or_tool_error("retrieving entity hops")?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::EntityHops,
            json!({
                "uri": uri,
                "deep": request.deep,
                "max_results": request.max_results,
                "select": request.select,
                "graph_type_uris": request.graph_type_uris,
                "relation_type_uris": request.relation_type_uris,
                "entity_type_uris": request.entity_type_uris,
            })
            .to_string(),
        )
        .object(uri.clone()),
    )
    .await;

    let entities: Vec<Value> = hops
        .get("entities")
        .and_then(Value::as_array)
        .map(|entities| entities.iter().map(summarize_graph_entity).collect())
        .unwrap_or_default();
    Ok(Output::Yaml(json!({
        "relations": hops.get("relations").cloned().unwrap_or_else(|| json!([])),
        "entities": entities,
        "dataComplete": hops.get("dataComplete").cloned().unwrap_or(Value::Bool(true)),
    })))
}

fn default_parents_select() -> String {
    "uri,label,type,secondaryLabel".into()
}

/// Arguments of `get_entity_parents`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetEntityParentsArgs {
    /// Entity id whose hierarchy is requested.
    entity_id: String,
    /// Comma-separated graph type names, e.g. `OrganizationHierarchy,Hierarchy`.
    graph_type_uris: String,
    /// Comma-separated fields to return for each parent.
    #[serde(default = "default_parents_select")]
    select: String,
    /// Comma-separated options: `sendHidden`, `ovOnly`, `nonOvOnly`.
    #[serde(default)]
    options: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GetEntityParents {
    tenant: String,
    entity_id: String,
    graph_type_uris: String,
    select: String,
    options: String,
}

impl Validate for GetEntityParentsArgs {
    type Output = GetEntityParents;

    fn validate(self, config: &Config) -> Result<GetEntityParents, ValidationError> {
        Ok(GetEntityParents {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            graph_type_uris: non_empty("graph_type_uris", &self.graph_type_uris)?,
            select: self.select.trim().to_string(),
            options: self.options.trim().to_string(),
        })
    }
}

fn summarize_parent(entity: &Value) -> Value {
    let mut summary = Map::new();
    for key in ["uri", "type", "label", "secondaryLabel"] {
        summary.insert(
            key.into(),
            entity.get(key).cloned().unwrap_or(Value::Null),
        );
    }
    if let Some(attributes) = entity.get("attributes") {
        summary.insert("attributes".into(), simplify_attributes(attributes, false));
    }
    Value::Object(summary)
}

/// Handle the `get_entity_parents` tool.
pub(crate) async fn get_entity_parents(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<GetEntityParentsArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let parents = client
        .get(client.api_url(&request.tenant, &format!("{uri}/_parents")))
        .query("graphTypeURIs", &request.graph_type_uris)
        .query_non_empty("select", &request.select)
        .query_non_empty("options", &request.options)
        .send()
        .await
        .map_err(|err| {
            let missing = err.api_error_code() == Some(PARENTS_NOT_FOUND_CODE);
            let detail = err.api_error_message();
            let error = ToolError::from_reltio(err, "retrieving entity parents");
            if missing || error.code == ErrorCode::ResourceNotFound {
                ToolError::new(
                    ErrorCode::ResourceNotFound,
                    format!(
                        "Entity with ID {} or graph type not found: {}",
                        request.entity_id,
                        detail.as_deref().unwrap_or("Entity or graph type not found")
                    ),
                )
            } else {
                error
            }
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserProfileView,
            json!({
                "uri": uri,
                "graph_type_uris": request.graph_type_uris,
                "select": request.select,
                "options": request.options,
            })
            .to_string(),
        )
        .object(uri.clone()),
    )
    .await;

    let entities: Map<String, Value> = parents
        .get("entities")
        .and_then(Value::as_object)
        .map(|entities| {
            entities
                .iter()
                .map(|(uri, entity)| (uri.clone(), summarize_parent(entity)))
                .collect()
        })
        .unwrap_or_default();
    Ok(Output::Yaml(json!({
        "parentPaths": parents.get("parentPaths").cloned().unwrap_or_else(|| json!([])),
        "entities": entities,
        "relations": parents.get("relations").cloned().unwrap_or_else(|| json!({})),
    })))
}
