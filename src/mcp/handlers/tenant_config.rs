//! Handlers for the tenant business configuration and its data model.
//!
//! Every data-model tool reads the tenant's `configuration` document once and picks the
//! requested part out of it locally; Reltio has no per-type endpoint for definitions.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::{ErrorCode, ToolError},
    normalize::is_present,
    reltio::ReltioClient,
    validation::{IdRule, ValidationError},
};

use super::{Output, ToolOutcome, Validate, parse_request, request_failure, tenant};

const ATTRIBUTE_FIELDS: [&str; 6] = ["label", "name", "description", "type", "required", "searchable"];

/// Data model sections of the business configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModelSection {
    EntityTypes,
    ChangeRequestTypes,
    RelationTypes,
    InteractionTypes,
    GraphTypes,
    SurvivorshipStrategies,
    GroupingTypes,
}

impl ModelSection {
    const ALL: [Self; 7] = [
        Self::EntityTypes,
        Self::ChangeRequestTypes,
        Self::RelationTypes,
        Self::InteractionTypes,
        Self::GraphTypes,
        Self::SurvivorshipStrategies,
        Self::GroupingTypes,
    ];

    /// Key of the section inside the configuration document.
    fn key(self) -> &'static str {
        match self {
            Self::EntityTypes => "entityTypes",
            Self::ChangeRequestTypes => "changeRequestTypes",
            Self::RelationTypes => "relationTypes",
            Self::InteractionTypes => "interactionTypes",
            Self::GraphTypes => "graphTypes",
            Self::SurvivorshipStrategies => "survivorshipStrategies",
            Self::GroupingTypes => "groupingTypes",
        }
    }

    fn count_key(self) -> &'static str {
        match self {
            Self::EntityTypes => "number_of_entity_types",
            Self::ChangeRequestTypes => "number_of_change_request_types",
            Self::RelationTypes => "number_of_relation_types",
            Self::InteractionTypes => "number_of_interaction_types",
            Self::GraphTypes => "number_of_graph_types",
            Self::SurvivorshipStrategies => "number_of_survivorship_strategies",
            Self::GroupingTypes => "number_of_grouping_types",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::EntityTypes => "entity type",
            Self::ChangeRequestTypes => "change request type",
            Self::RelationTypes => "relation type",
            Self::InteractionTypes => "interaction type",
            Self::GraphTypes => "graph type",
            Self::SurvivorshipStrategies => "survivorship strategy",
            Self::GroupingTypes => "grouping type",
        }
    }

    fn uri_prefix(self) -> &'static str {
        match self {
            Self::EntityTypes => "configuration/entityTypes/",
            Self::ChangeRequestTypes => "configuration/changeRequestTypes/",
            Self::RelationTypes => "configuration/relationTypes/",
            Self::InteractionTypes => "configuration/interactionTypes/",
            Self::GraphTypes => "configuration/graphTypes/",
            Self::SurvivorshipStrategies => "configuration/survivorshipStrategies/",
            Self::GroupingTypes => "configuration/groupingTypes/",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|section| section.key() == raw)
    }

    /// Reduce one definition to the fields an agent needs to reason about the model.
    fn summarize(self, record: &Value) -> Value {
        let fields: &[&str] = match self {
            Self::EntityTypes | Self::RelationTypes => &["uri", "label", "description"],
            Self::InteractionTypes => &["uri", "label", "description", "memberTypes"],
            Self::GraphTypes => &["uri", "label", "relationshipTypeURIs"],
            Self::GroupingTypes => &["uri", "description", "source"],
            Self::ChangeRequestTypes | Self::SurvivorshipStrategies => return record.clone(),
        };
        let mut summary = pick(record, fields);
        if self == Self::RelationTypes {
            for end in ["startObject", "endObject"] {
                if let Some(type_uri) = record
                    .get(end)
                    .and_then(|object| object.get("objectTypeURI"))
                    .filter(|value| is_present(value))
                {
                    summary.insert(end.into(), type_uri.clone());
                }
            }
        }
        if matches!(
            self,
            Self::EntityTypes | Self::RelationTypes | Self::InteractionTypes
        ) {
            if let Some(attributes) = record.get("attributes").and_then(Value::as_array) {
                summary.insert(
                    "attributes".into(),
                    attributes.iter().map(summarize_attribute).collect(),
                );
            }
        }
        Value::Object(summary)
    }
}

fn pick(record: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            record
                .get(*field)
                .filter(|value| is_present(value))
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}

fn summarize_attribute(attribute: &Value) -> Value {
    let mut summary = pick(attribute, &ATTRIBUTE_FIELDS);
    if let Some(nested) = attribute.get("attributes").and_then(Value::as_array) {
        summary.insert(
            "attributes".into(),
            nested.iter().map(summarize_attribute).collect(),
        );
    }
    Value::Object(summary)
}

fn count(configuration: &Value, key: &str) -> Value {
    Value::from(
        configuration
            .get(key)
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
    )
}

/// Header fields and per-section counts of the configuration.
fn tenant_metadata(configuration: &Value) -> Value {
    let mut summary = pick(configuration, &["uri", "description", "schemaVersion"]);
    summary.insert("number_of_sources".into(), count(configuration, "sources"));
    summary.extend(pick(
        configuration,
        &[
            "label",
            "createdTime",
            "updatedTime",
            "createdBy",
            "updatedBy",
        ],
    ));
    for section in ModelSection::ALL {
        summary.insert(
            section.count_key().into(),
            count(configuration, section.key()),
        );
    }
    Value::Object(summary)
}

async fn fetch_configuration(
    client: &ReltioClient,
    tenant: &str,
    action: &'static str,
) -> Result<Value, ToolError> {
    let configuration = client
        .get(client.api_url(tenant, "configuration"))
        .send()
        .await
        .map_err(request_failure(action))?;
    if !configuration.is_object() {
        return Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            format!("Failed to {action}: the configuration is not a JSON object"),
        ));
    }
    Ok(configuration)
}

/// Arguments of the tenant-wide configuration tools.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct TenantArgs {
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

impl Validate for TenantArgs {
    type Output = String;

    fn validate(self, config: &Config) -> Result<String, ValidationError> {
        tenant(config, self.tenant_id)
    }
}

/// Handle the `get_business_configuration` tool.
pub(crate) async fn get_business_configuration(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let tenant = parse_request::<TenantArgs>(arguments, client.config())?;
    let configuration =
        fetch_configuration(client, &tenant, "retrieve business configuration").await?;
    Ok(Output::Json(configuration))
}

/// Handle the `get_tenant_permissions_metadata` tool.
pub(crate) async fn get_tenant_permissions_metadata(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let tenant = parse_request::<TenantArgs>(arguments, client.config())?;
    let permissions = client
        .get(client.permissions_url(&tenant))
        .send()
        .await
        .map_err(request_failure("retrieve tenant permissions metadata"))?;

    audit::record(
        client,
        &tenant,
        Activity::new(
            ActivityLabel::TenantPermissionsMetadata,
            format!("Fetched permissions metadata for tenant {tenant}"),
        ),
    )
    .await;
    Ok(Output::Yaml(permissions))
}

/// Handle the `get_tenant_metadata` tool.
pub(crate) async fn get_tenant_metadata(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let tenant = parse_request::<TenantArgs>(arguments, client.config())?;
    let configuration = fetch_configuration(client, &tenant, "retrieve tenant metadata").await?;

    audit::record(
        client,
        &tenant,
        Activity::new(
            ActivityLabel::TenantMetadata,
            format!("Fetched tenant metadata for tenant {tenant}"),
        ),
    )
    .await;
    Ok(Output::Yaml(tenant_metadata(&configuration)))
}

/// Arguments of `get_data_model_definition`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct DataModelArgs {
    /// Sections to return: `entityTypes`, `changeRequestTypes`, `relationTypes`,
    /// `interactionTypes`, `graphTypes`, `survivorshipStrategies`, `groupingTypes`.
    /// Empty returns every section, which can be very large.
    #[serde(default)]
    object_type: Vec<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct DataModel {
    tenant: String,
    sections: Vec<ModelSection>,
}

impl Validate for DataModelArgs {
    type Output = DataModel;

    fn validate(self, config: &Config) -> Result<DataModel, ValidationError> {
        let mut sections = Vec::new();
        for raw in &self.object_type {
            let section = ModelSection::parse(raw).ok_or_else(|| {
                let allowed: Vec<_> = ModelSection::ALL.iter().map(|s| s.key()).collect();
                ValidationError::new(
                    "object_type",
                    format!("'{raw}' is not one of {}", allowed.join(", ")),
                )
            })?;
            if !sections.contains(&section) {
                sections.push(section);
            }
        }
        if sections.is_empty() {
            sections = ModelSection::ALL.to_vec();
        }
        Ok(DataModel {
            tenant: tenant(config, self.tenant_id)?,
            sections,
        })
    }
}

/// Handle the `get_data_model_definition` tool.
pub(crate) async fn get_data_model_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<DataModelArgs>(arguments, client.config())?;
    let configuration =
        fetch_configuration(client, &request.tenant, "retrieve data model definition").await?;

    let mut model = Map::new();
    for section in &request.sections {
        let definitions: Vec<Value> = configuration
            .get(section.key())
            .and_then(Value::as_array)
            .map(|records| records.iter().map(|record| section.summarize(record)).collect())
            .unwrap_or_default();
        model.insert(section.key().into(), Value::Array(definitions));
    }

    let keys: Vec<_> = request.sections.iter().map(|s| s.key()).collect();
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::DataModelDefinition,
            format!("Fetched data model definition: {}", keys.join(", ")),
        ),
    )
    .await;
    Ok(Output::Yaml(Value::Object(model)))
}

/// A single type looked up by its full configuration URI.
#[derive(Debug)]
pub(crate) struct TypeDefinition {
    tenant: String,
    section: ModelSection,
    uri: String,
}

impl TypeDefinition {
    fn resolve(
        config: &Config,
        section: ModelSection,
        field: &'static str,
        raw: &str,
        tenant_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let rule = IdRule::configuration_type(section.noun(), section.uri_prefix());
        Ok(Self {
            tenant: tenant(config, tenant_id)?,
            section,
            uri: rule.apply_uri(field, raw)?,
        })
    }
}

macro_rules! type_definition_args {
    ($args:ident, $field:ident, $section:ident, $doc:literal) => {
        #[doc = concat!("Arguments of `get_", stringify!($field), "_definition`.")]
        #[derive(Debug, Deserialize, JsonSchema)]
        #[serde(deny_unknown_fields)]
        pub(crate) struct $args {
            #[doc = $doc]
            $field: String,
            /// Tenant; defaults to the configured tenant.
            #[serde(default)]
            tenant_id: Option<String>,
        }

        impl Validate for $args {
            type Output = TypeDefinition;

            fn validate(self, config: &Config) -> Result<TypeDefinition, ValidationError> {
                TypeDefinition::resolve(
                    config,
                    ModelSection::$section,
                    stringify!($field),
                    &self.$field,
                    self.tenant_id,
                )
            }
        }
    };
}

type_definition_args!(
    EntityTypeArgs,
    entity_type,
    EntityTypes,
    "Entity type, bare (`Individual`) or as `configuration/entityTypes/Individual`."
);
type_definition_args!(
    ChangeRequestTypeArgs,
    change_request_type,
    ChangeRequestTypes,
    "Change request type, bare or as `configuration/changeRequestTypes/<name>`."
);
type_definition_args!(
    RelationTypeArgs,
    relation_type,
    RelationTypes,
    "Relation type, bare or as `configuration/relationTypes/<name>`."
);
type_definition_args!(
    InteractionTypeArgs,
    interaction_type,
    InteractionTypes,
    "Interaction type, bare or as `configuration/interactionTypes/<name>`."
);
type_definition_args!(
    GraphTypeArgs,
    graph_type,
    GraphTypes,
    "Graph type, bare or as `configuration/graphTypes/<name>`."
);
type_definition_args!(
    GroupingTypeArgs,
    grouping_type,
    GroupingTypes,
    "Grouping type, bare or as `configuration/groupingTypes/<name>`."
);

async fn type_definition<T>(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
    label: ActivityLabel,
    action: &'static str,
) -> ToolOutcome
where
    T: DeserializeOwned + Validate<Output = TypeDefinition>,
{
    let request = parse_request::<T>(arguments, client.config())?;
    let configuration = fetch_configuration(client, &request.tenant, action).await?;

    let definition = configuration
        .get(request.section.key())
        .and_then(Value::as_array)
        .and_then(|records| {
            records
                .iter()
                .find(|record| record.get("uri").and_then(Value::as_str) == Some(request.uri.as_str()))
        })
        .map(|record| request.section.summarize(record))
        .ok_or_else(|| {
            ToolError::new(
                ErrorCode::ResourceNotFound,
                format!(
                    "No {} '{}' in the configuration of tenant {}",
                    request.section.noun(),
                    request.uri,
                    request.tenant
                ),
            )
        })?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            label,
            format!("Fetched {} definition {}", request.section.noun(), request.uri),
        ),
    )
    .await;
    Ok(Output::Yaml(definition))
}

/// Handle the `get_entity_type_definition` tool.
pub(crate) async fn get_entity_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<EntityTypeArgs>(
        client,
        arguments,
        ActivityLabel::EntityTypeDefinition,
        "retrieve entity type definition",
    )
    .await
}

/// Handle the `get_change_request_type_definition` tool.
pub(crate) async fn get_change_request_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<ChangeRequestTypeArgs>(
        client,
        arguments,
        ActivityLabel::ChangeRequestTypeDefinition,
        "retrieve change request type definition",
    )
    .await
}

/// Handle the `get_relation_type_definition` tool.
pub(crate) async fn get_relation_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<RelationTypeArgs>(
        client,
        arguments,
        ActivityLabel::RelationTypeDefinition,
        "retrieve relation type definition",
    )
    .await
}

/// Handle the `get_interaction_type_definition` tool.
pub(crate) async fn get_interaction_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<InteractionTypeArgs>(
        client,
        arguments,
        ActivityLabel::InteractionTypeDefinition,
        "retrieve interaction type definition",
    )
    .await
}

/// Handle the `get_graph_type_definition` tool.
pub(crate) async fn get_graph_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<GraphTypeArgs>(
        client,
        arguments,
        ActivityLabel::GraphTypeDefinition,
        "retrieve graph type definition",
    )
    .await
}

/// Handle the `get_grouping_type_definition` tool.
pub(crate) async fn get_grouping_type_definition(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    type_definition::<GroupingTypeArgs>(
        client,
        arguments,
        ActivityLabel::GroupingTypeDefinition,
        "retrieve grouping type definition",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::test_support::{arguments, test_client, tokenless_client};
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn configuration() -> Value {
        json!({
            "uri": "configuration",
            "description": "Customer 360",
            "schemaVersion": "42",
            "label": "C360",
            "createdBy": "admin",
            "sources": [{"uri": "configuration/sources/Reltio"}, {"uri": "configuration/sources/CRM"}],
            "entityTypes": [{
                "uri": "configuration/entityTypes/Individual",
                "label": "Individual",
                "description": "A person",
                "abstract": false,
                "attributes": [{
                    "label": "First Name",
                    "name": "FirstName",
                    "type": "String",
                    "uri": "configuration/entityTypes/Individual/attributes/FirstName",
                    "searchable": true,
                    "required": false
                }, {
                    "label": "Address",
                    "name": "Address",
                    "type": "Nested",
                    "attributes": [{"label": "City", "name": "City", "type": "String", "faceted": true}]
                }]
            }],
            "relationTypes": [{
                "uri": "configuration/relationTypes/HasAddress",
                "label": "Has Address",
                "startObject": {"objectTypeURI": "configuration/entityTypes/Individual", "directionalContext": []},
                "endObject": {"objectTypeURI": "configuration/entityTypes/Location"}
            }],
            "graphTypes": [{
                "uri": "configuration/graphTypes/Hierarchy",
                "label": "Hierarchy",
                "relationshipTypeURIs": ["configuration/relationTypes/ReportsTo"],
                "layout": "tree"
            }]
        })
    }

    async fn serve_configuration(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/configuration");
                then.status(200).json_body(configuration());
            })
            .await
    }

    #[tokio::test]
    async fn business_configuration_is_returned_verbatim() {
        let server = MockServer::start_async().await;
        let config = serve_configuration(&server).await;

        let client = test_client(&server);
        let outcome = get_business_configuration(&client, None).await.unwrap();
        config.assert();
        assert!(matches!(outcome, Output::Json(_)));
        assert_eq!(outcome.value(), &configuration());
    }

    #[tokio::test]
    async fn tenant_metadata_counts_every_section() {
        let server = MockServer::start_async().await;
        serve_configuration(&server).await;
        let audit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/activities")
                    .body_contains("TENANT_METADATA");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_tenant_metadata(&client, None).await.unwrap();
        audit.assert();
        let metadata = outcome.value();
        assert_eq!(metadata["schemaVersion"], "42");
        assert_eq!(metadata["number_of_sources"], 2);
        assert_eq!(metadata["number_of_entity_types"], 1);
        assert_eq!(metadata["number_of_grouping_types"], 0);
        assert!(metadata.get("updatedBy").is_none());
    }

    #[tokio::test]
    async fn data_model_defaults_to_every_section() {
        let server = MockServer::start_async().await;
        serve_configuration(&server).await;

        let client = test_client(&server);
        let outcome = get_data_model_definition(&client, None).await.unwrap();
        let model = outcome.value().as_object().unwrap();
        let keys: Vec<_> = model.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "entityTypes",
                "changeRequestTypes",
                "relationTypes",
                "interactionTypes",
                "graphTypes",
                "survivorshipStrategies",
                "groupingTypes"
            ]
        );
        assert_eq!(model["groupingTypes"], json!([]));
        assert_eq!(
            model["graphTypes"][0],
            json!({
                "uri": "configuration/graphTypes/Hierarchy",
                "label": "Hierarchy",
                "relationshipTypeURIs": ["configuration/relationTypes/ReportsTo"]
            })
        );
    }

    #[tokio::test]
    async fn data_model_rejects_unknown_sections_before_calling_out() {
        let server = MockServer::start_async().await;
        let config = serve_configuration(&server).await;

        let client = test_client(&server);
        let err = get_data_model_definition(
            &client,
            arguments(json!({"object_type": ["entityTypes", "widgets"]})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        config.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn entity_type_definition_accepts_bare_names() {
        let server = MockServer::start_async().await;
        serve_configuration(&server).await;

        let client = test_client(&server);
        let outcome =
            get_entity_type_definition(&client, arguments(json!({"entity_type": "Individual"})))
                .await
                .unwrap();
        assert_eq!(
            outcome.value(),
            &json!({
                "uri": "configuration/entityTypes/Individual",
                "label": "Individual",
                "description": "A person",
                "attributes": [
                    {"label": "First Name", "name": "FirstName", "type": "String", "required": false, "searchable": true},
                    {"label": "Address", "name": "Address", "type": "Nested", "attributes": [
                        {"label": "City", "name": "City", "type": "String"}
                    ]}
                ]
            })
        );
    }

    #[tokio::test]
    async fn relation_type_definition_flattens_its_ends() {
        let server = MockServer::start_async().await;
        serve_configuration(&server).await;

        let client = test_client(&server);
        let outcome = get_relation_type_definition(
            &client,
            arguments(json!({"relation_type": "configuration/relationTypes/HasAddress"})),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome.value()["startObject"],
            "configuration/entityTypes/Individual"
        );
        assert_eq!(
            outcome.value()["endObject"],
            "configuration/entityTypes/Location"
        );
    }

    #[tokio::test]
    async fn unknown_types_are_not_found() {
        let server = MockServer::start_async().await;
        serve_configuration(&server).await;

        let client = test_client(&server);
        let err =
            get_grouping_type_definition(&client, arguments(json!({"grouping_type": "Household"})))
                .await
                .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert!(err.message.contains("configuration/groupingTypes/Household"));
    }

    #[tokio::test]
    async fn type_names_outside_the_pattern_are_rejected() {
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let err = get_graph_type_definition(
            &client,
            arguments(json!({"graph_type": "Hierarchy') or ("})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn upstream_failures_are_api_request_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/configuration");
                then.status(500);
            })
            .await;

        let client = test_client(&server);
        let err = get_business_configuration(&client, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiRequestError);
        assert!(err.message.starts_with("Failed to retrieve business configuration"));
    }

    #[tokio::test]
    async fn missing_credentials_are_authentication_errors() {
        let server = MockServer::start_async().await;
        let config = serve_configuration(&server).await;

        let client = tokenless_client(&server);
        let err = get_entity_type_definition(
            &client,
            arguments(json!({"entity_type": "Individual"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);
        config.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn permissions_metadata_is_read_per_tenant() {
        let server = MockServer::start_async().await;
        let permissions = server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/permissions/t2");
                then.status(200)
                    .json_body(json!({"roles": ["ROLE_API"], "status": "completed"}));
            })
            .await;

        let client = test_client(&server);
        let outcome =
            get_tenant_permissions_metadata(&client, arguments(json!({"tenant_id": "t2"})))
                .await
                .unwrap();
        permissions.assert();
        assert_eq!(outcome.value()["status"], "completed");
    }
}
