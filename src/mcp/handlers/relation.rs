//! Handlers for relations: lookup, creation, deletion, entity connections and relation search.

use std::collections::BTreeSet;

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::ErrorCode,
    normalize::{simplify_attributes, tail_segment},
    reltio::ReltioClient,
    validation::{
        ACTIVENESS, BALANCED_FILTER, ENTITY_ID, ORDER, Page, RELATION_ID, Range, ValidationError,
        min_len, non_empty, optional_text, page,
    },
};

use super::{Output, ReltioResultExt, ToolOutcome, Validate, flag, parse_request, tenant};

const DEFAULT_CROSSWALK_SOURCE: &str = "configuration/sources/Reltio";
const CONNECTIONS_DEFAULT_MAX: i64 = 10;

/// Arguments naming a single relation.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RelationIdArgs {
    /// Relation id, bare or as `relations/<id>`.
    relation_id: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct RelationRef {
    tenant: String,
    relation_id: String,
}

impl Validate for RelationIdArgs {
    type Output = RelationRef;

    fn validate(self, config: &Config) -> Result<RelationRef, ValidationError> {
        Ok(RelationRef {
            tenant: tenant(config, self.tenant_id)?,
            relation_id: RELATION_ID.apply("relation_id", &self.relation_id)?,
        })
    }
}

fn simplify_relation(relation: &mut Value) {
    if let Some(attributes) = relation.get("attributes") {
        let simplified = simplify_attributes(attributes, false);
        relation["attributes"] = simplified;
    }
}

/// Handle the `get_relation` tool.
pub(crate) async fn get_relation(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<RelationIdArgs>(arguments, client.config())?;
    let uri = format!("relations/{}", request.relation_id);

    let mut relation = client
        .get(client.api_url(&request.tenant, &uri))
        .send()
        .await
        .or_tool_error("retrieving relation details")
        .map_err(|err| {
            err.when_not_found(|| format!("Relation with ID {} not found", request.relation_id))
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::RelationshipSearch,
            format!("Fetched relation details for relation {}", request.relation_id),
        )
        .object(uri),
    )
    .await;

    simplify_relation(&mut relation);
    Ok(Output::Yaml(relation))
}

fn default_crosswalk_source() -> String {
    DEFAULT_CROSSWALK_SOURCE.into()
}

fn generated_crosswalk_value() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Crosswalk identifying a relation or one of its ends in a source system.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct CrosswalkInput {
    /// Source URI; defaults to `configuration/sources/Reltio`.
    #[serde(default = "default_crosswalk_source", rename = "type")]
    source: String,
    /// Source table; omitted from the request when blank.
    #[serde(default, rename = "sourceTable", skip_serializing_if = "String::is_empty")]
    source_table: String,
    /// Identifier in the source; a random UUID when omitted.
    #[serde(default = "generated_crosswalk_value")]
    value: String,
}

impl CrosswalkInput {
    fn normalized(mut self) -> Self {
        self.source_table = self.source_table.trim().to_string();
        self
    }
}

/// Start or end of a relation.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RelationEndInput {
    /// Entity type URI, e.g. `configuration/entityTypes/Organization`.
    #[serde(rename = "type")]
    entity_type: String,
    /// Existing entity URI, e.g. `entities/e1`.
    #[serde(default, rename = "objectURI", skip_serializing_if = "Option::is_none")]
    object_uri: Option<String>,
    /// Crosswalks resolving the entity when no URI is given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    crosswalks: Vec<CrosswalkInput>,
}

/// One relation to create.
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RelationInput {
    /// Relation type URI, e.g. `configuration/relationTypes/OrganizationIndividual`.
    #[serde(rename = "type")]
    relation_type: String,
    /// Crosswalks of the relation itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    crosswalks: Vec<CrosswalkInput>,
    /// Start of the relation.
    #[serde(rename = "startObject")]
    start_object: RelationEndInput,
    /// End of the relation.
    #[serde(rename = "endObject")]
    end_object: RelationEndInput,
}

/// Arguments of `create_relationships`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateRelationshipsArgs {
    /// Relations to create; each end needs `objectURI` or `crosswalks`.
    relations: Vec<RelationInput>,
    /// Comma-separated options such as `partialOverride` or `directMatchMode`.
    #[serde(default)]
    options: Option<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct CreateRelationships {
    tenant: String,
    relations: Vec<RelationInput>,
    options: Option<String>,
}

fn validate_end(
    field: &'static str,
    mut end: RelationEndInput,
) -> Result<RelationEndInput, ValidationError> {
    end.entity_type = non_empty(field, &end.entity_type)?;
    end.object_uri = optional_text(end.object_uri);
    if end.object_uri.is_none() && end.crosswalks.is_empty() {
        return Err(ValidationError::new(
            field,
            "Either objectURI or crosswalks must be provided",
        ));
    }
    end.crosswalks = end.crosswalks.into_iter().map(CrosswalkInput::normalized).collect();
    Ok(end)
}

impl Validate for CreateRelationshipsArgs {
    type Output = CreateRelationships;

    fn validate(self, config: &Config) -> Result<CreateRelationships, ValidationError> {
        min_len("relations", &self.relations, 1)?;
        let relations = self
            .relations
            .into_iter()
            .map(|relation| {
                Ok(RelationInput {
                    relation_type: non_empty("relations.type", &relation.relation_type)?,
                    crosswalks: relation
                        .crosswalks
                        .into_iter()
                        .map(CrosswalkInput::normalized)
                        .collect(),
                    start_object: validate_end("relations.startObject", relation.start_object)?,
                    end_object: validate_end("relations.endObject", relation.end_object)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(CreateRelationships {
            tenant: tenant(config, self.tenant_id)?,
            relations,
            options: optional_text(self.options),
        })
    }
}

/// Handle the `create_relationships` tool.
pub(crate) async fn create_relationships(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<CreateRelationshipsArgs>(arguments, client.config())?;

    let created = client
        .post(client.api_url(&request.tenant, "relations"))
        .query_opt("options", request.options.as_deref())
        .json(json!(request.relations))
        .send()
        .await
        .or_tool_error("creating relationships")?;

    let types: BTreeSet<&str> = request
        .relations
        .iter()
        .map(|relation| tail_segment(&relation.relation_type))
        .collect();
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::RelationshipCreate,
            format!(
                "Created {} relationship(s) of types: {}",
                request.relations.len(),
                types.into_iter().collect::<Vec<_>>().join(", ")
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(created))
}

/// Handle the `delete_relation` tool.
///
/// The API answers `{"status": "OK"}` or `{"status": "failed", "error": ...}`.
pub(crate) async fn delete_relation(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<RelationIdArgs>(arguments, client.config())?;
    let uri = format!("relations/{}", request.relation_id);

    let deleted = client
        .delete(client.api_url(&request.tenant, &uri))
        .global_id()
        .send()
        .await
        .or_tool_error("deleting relation")
        .map_err(|err| {
            err.when_not_found(|| format!("Relation with ID {} not found", request.relation_id))
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::RelationshipDelete,
            format!("Deleted relation {}", request.relation_id),
        )
        .object(uri),
    )
    .await;

    Ok(Output::Yaml(deleted))
}

fn default_connections_max() -> i64 {
    CONNECTIONS_DEFAULT_MAX
}

/// Arguments of `get_entity_relations`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityRelationsArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Entity types of the connected entities to return (at least one).
    entity_types: Vec<String>,
    /// Sort specification.
    #[serde(default)]
    sort_by: String,
    /// Relation types whose end entity is this entity.
    #[serde(default)]
    in_relations: Vec<Value>,
    /// Relation types whose start entity is this entity.
    #[serde(default)]
    out_relations: Vec<Value>,
    /// First element to return.
    #[serde(default)]
    offset: i64,
    /// Page size, 1..=1000.
    #[serde(default = "default_connections_max")]
    max: i64,
    /// Relationship URI selecting a page of connections.
    #[serde(default)]
    show_relationship: String,
    /// Connected entity URI selecting a page of connections.
    #[serde(default)]
    show_entity: String,
    /// Next hop specification for multi-hop paths.
    #[serde(default)]
    next_entry: String,
    /// Group types that have the entity as a member.
    #[serde(default)]
    groups: Vec<Value>,
    /// Condition on connected entities.
    #[serde(default)]
    filter: String,
    /// Condition on relations.
    #[serde(default)]
    relation_filter: String,
    /// Include full objects.
    #[serde(default)]
    return_objects: bool,
    /// Include activeness dates.
    #[serde(default)]
    return_dates: bool,
    /// Include entity and relation labels.
    #[serde(default = "default_true")]
    return_labels: bool,
    /// Identifier of this connection group.
    #[serde(default)]
    id: String,
    /// Other buckets mixed into this one.
    #[serde(default)]
    suggested: Vec<Value>,
    /// Limit credits consumption.
    #[serde(default)]
    limit_credits_consumption: bool,
    /// Return data even when the request is partially invalid.
    #[serde(default)]
    return_data_anyway: bool,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug)]
pub(crate) struct EntityRelations {
    tenant: String,
    entity_id: String,
    connection_group: Map<String, Value>,
    limit_credits_consumption: bool,
    return_data_anyway: bool,
}

fn insert_text(group: &mut Map<String, Value>, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        group.insert(key.into(), Value::String(value.into()));
    }
}

fn insert_list(group: &mut Map<String, Value>, key: &str, values: Vec<Value>) {
    if !values.is_empty() {
        group.insert(key.into(), Value::Array(values));
    }
}

impl Validate for EntityRelationsArgs {
    type Output = EntityRelations;

    fn validate(self, config: &Config) -> Result<EntityRelations, ValidationError> {
        let entity_id = ENTITY_ID.apply("entity_id", &self.entity_id)?;
        min_len("entity_types", &self.entity_types, 1)?;
        let Page { offset, max } = page(self.offset, ("max", self.max), Range::new(1, 1_000))?;
        let filter = BALANCED_FILTER.apply("filter", &self.filter)?;
        let relation_filter = BALANCED_FILTER.apply("relation_filter", &self.relation_filter)?;

        let mut group = Map::new();
        group.insert("entityTypes".into(), json!(self.entity_types));
        insert_text(&mut group, "sortBy", &self.sort_by);
        insert_list(&mut group, "inRelations", self.in_relations);
        insert_list(&mut group, "outRelations", self.out_relations);
        if offset > 0 {
            group.insert("offset".into(), json!(offset));
        }
        if i64::from(max) != CONNECTIONS_DEFAULT_MAX {
            group.insert("max".into(), json!(max));
        }
        insert_text(&mut group, "showRelationship", &self.show_relationship);
        insert_text(&mut group, "showEntity", &self.show_entity);
        insert_text(&mut group, "nextEntry", &self.next_entry);
        insert_list(&mut group, "groups", self.groups);
        insert_text(&mut group, "filter", &filter);
        insert_text(&mut group, "relationFilter", &relation_filter);
        if self.return_objects {
            group.insert("returnObjects".into(), Value::Bool(true));
        }
        if self.return_dates {
            group.insert("returnDates".into(), Value::Bool(true));
        }
        if !self.return_labels {
            group.insert("returnLabels".into(), Value::Bool(false));
        }
        insert_text(&mut group, "id", &self.id);
        insert_list(&mut group, "suggested", self.suggested);

        Ok(EntityRelations {
            tenant: tenant(config, self.tenant_id)?,
            entity_id,
            connection_group: group,
            limit_credits_consumption: self.limit_credits_consumption,
            return_data_anyway: self.return_data_anyway,
        })
    }
}

/// Handle the `get_entity_relations` tool.
pub(crate) async fn get_entity_relations(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<EntityRelationsArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let connections = client
        .post(client.api_url(&request.tenant, &format!("{uri}/_connections")))
        .query_opt(
            "limitCreditsConsumption",
            request.limit_credits_consumption.then_some(flag(true)),
        )
        .query_opt("returnDataAnyway", request.return_data_anyway.then_some(flag(true)))
        .json(Value::Array(vec![Value::Object(request.connection_group)]))
        .send()
        .await
        .or_tool_error("retrieving entity relations")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::RelationshipSearch,
            format!("Fetched entity relations for entity {}", request.entity_id),
        )
        .object(uri),
    )
    .await;

    Ok(Output::Yaml(connections))
}

fn default_active() -> String {
    "active".into()
}

fn default_relation_max() -> i64 {
    10
}

/// Arguments of `search_relations`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SearchRelationsArgs {
    /// Relation filter, e.g. `(equals(startObject,'entities/1') or equals(endObject,'entities/1'))`.
    #[serde(default)]
    filter: String,
    /// Comma-separated relation properties to return.
    #[serde(default)]
    select: String,
    /// Page size, 1..=10000.
    #[serde(default = "default_relation_max")]
    max: i64,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// Attribute(s) to order by, e.g. `uri`.
    #[serde(default)]
    sort: String,
    /// `asc` (default) or `desc`.
    #[serde(default)]
    order: Option<String>,
    /// Comma-separated options: `nonOvOnly`, `ovOnly`, `searchByOv`, `sendHidden`,
    /// `resolveMergedEntities`.
    #[serde(default)]
    options: String,
    /// `active` (default), `all` or `not_active`.
    #[serde(default = "default_active")]
    activeness: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SearchRelations {
    tenant: String,
    filter: String,
    select: String,
    page: Page,
    sort: String,
    order: String,
    options: String,
    activeness: String,
}

impl Validate for SearchRelationsArgs {
    type Output = SearchRelations;

    fn validate(self, config: &Config) -> Result<SearchRelations, ValidationError> {
        Ok(SearchRelations {
            tenant: tenant(config, self.tenant_id)?,
            filter: BALANCED_FILTER.apply("filter", &self.filter)?,
            select: self.select.trim().to_string(),
            page: page(self.offset, ("max", self.max), Range::new(1, 10_000))?,
            sort: self.sort.trim().to_string(),
            order: ORDER.apply_or("order", self.order.as_deref(), "asc")?,
            options: self.options.trim().to_string(),
            activeness: ACTIVENESS.apply("activeness", &self.activeness)?,
        })
    }
}

/// Handle the `search_relations` tool. Requires relation indexing on the tenant.
pub(crate) async fn search_relations(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<SearchRelationsArgs>(arguments, client.config())?;

    let mut found = client
        .post(client.api_url(&request.tenant, "relations/_search"))
        .json(json!({
            "filter": request.filter,
            "select": request.select,
            "max": request.page.max,
            "offset": request.page.offset,
            "sort": request.sort,
            "order": request.order,
            "options": request.options,
            "activeness": request.activeness,
        }))
        .send()
        .await
        .or_tool_error("searching relations")
        .map_err(|err| match err.code {
            ErrorCode::ResourceNotFound => err.when_not_found(|| {
                "Relations search endpoint not found or relations indexing is not enabled for this tenant".into()
            }),
            ErrorCode::InvalidRequest => err.reclassify(ErrorCode::InvalidRequest, ErrorCode::BadRequest),
            _ => err,
        })?;

    let summary = if request.filter.is_empty() {
        "all relations".to_string()
    } else if let Some((cut, _)) = request.filter.char_indices().nth(50) {
        format!("filter: {}...", &request.filter[..cut])
    } else {
        format!("filter: {}", request.filter)
    };
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::RelationshipSearch,
            format!("Searched relations with {summary}"),
        ),
    )
    .await;

    match &mut found {
        Value::Array(relations) => relations.iter_mut().for_each(simplify_relation),
        Value::Object(_) => simplify_relation(&mut found),
        _ => {}
    }
    Ok(Output::Yaml(found))
}
