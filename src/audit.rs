//! Best-effort activity logging.
//!
//! Successful operations are recorded in the tenant's activity log. Recording never influences
//! the tool result: failures are logged locally and dropped.

use serde_json::{Value, json};

use crate::reltio::ReltioClient;

/// Activity labels written to the Reltio activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLabel {
    /// Entity or match search.
    UserSearch,
    /// Entity detail view.
    UserProfileView,
    /// Attribute update.
    EntityChanged,
    /// Merge of two entities.
    EntitiesMerged,
    /// Contributor unmerge.
    EntitiesUnmerged,
    /// Crosswalk tree lookup.
    EntityMatchHistory,
    /// A potential match was rejected.
    NotMatchesSet,
    /// Potential match lookup.
    PotentialMatchesFound,
    /// Merge tree export job submitted.
    EntityMergeTreeExport,
    /// Relation lookup or search.
    RelationshipSearch,
    /// Merge activity query.
    GetMergeActivities,
    /// User directory lookups.
    UserDetails,
    /// Workflow task operations.
    WorkflowTasks,
    /// RDM lookup listing.
    LookupList,
    /// Graph traversal.
    EntityHops,
    /// Relation creation.
    RelationshipCreate,
    /// Relation deletion.
    RelationshipDelete,
    /// Interaction read or write.
    UserInteraction,
    /// Entity creation.
    EntityCreated,
    /// Tenant metadata summary.
    TenantMetadata,
    /// Tenant permission metadata.
    TenantPermissionsMetadata,
    /// Data model definition listing.
    DataModelDefinition,
    /// Entity type definition.
    EntityTypeDefinition,
    /// Change request type definition.
    ChangeRequestTypeDefinition,
    /// Relation type definition.
    RelationTypeDefinition,
    /// Interaction type definition.
    InteractionTypeDefinition,
    /// Graph type definition.
    GraphTypeDefinition,
    /// Grouping type definition.
    GroupingTypeDefinition,
}

impl ActivityLabel {
    /// Label as stored by Reltio.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserSearch => "USER_SEARCH",
            Self::UserProfileView => "USER_PROFILE_VIEW",
            Self::EntityChanged => "ENTITY_CHANGED",
            Self::EntitiesMerged => "ENTITIES_MERGED",
            Self::EntitiesUnmerged => "ENTITIES_UNMERGED",
            Self::EntityMatchHistory => "ENTITY_MATCH_HISTORY",
            Self::NotMatchesSet => "NOT_MATCHES_SET",
            Self::PotentialMatchesFound => "POTENTIAL_MATCHES_FOUND",
            Self::EntityMergeTreeExport => "ENTITY_MERGE_TREE_EXPORT",
            Self::RelationshipSearch => "RELATIONSHIP_SEARCH",
            Self::GetMergeActivities => "GET_MERGE_ACTIVITIES",
            Self::UserDetails => "USER_DETAILS",
            Self::WorkflowTasks => "WORKFLOW_TASKS",
            Self::LookupList => "LOOKUP_LIST",
            Self::EntityHops => "ENTITY_HOPS",
            Self::RelationshipCreate => "RELATIONSHIP_CREATE",
            Self::RelationshipDelete => "RELATIONSHIP_DELETE",
            Self::UserInteraction => "USER_INTERACTION",
            Self::EntityCreated => "ENTITY_CREATED",
            Self::TenantMetadata => "TENANT_METADATA",
            Self::TenantPermissionsMetadata => "TENANT_PERMISSIONS_METADATA",
            Self::DataModelDefinition => "DATA_MODEL_DEFINITION",
            Self::EntityTypeDefinition => "ENTITY_TYPE_DEFINITION",
            Self::ChangeRequestTypeDefinition => "CHANGE_REQUEST_TYPE_DEFINITION",
            Self::RelationTypeDefinition => "RELATION_TYPE_DEFINITION",
            Self::InteractionTypeDefinition => "INTERACTION_TYPE_DEFINITION",
            Self::GraphTypeDefinition => "GRAPH_TYPE_DEFINITION",
            Self::GroupingTypeDefinition => "GROUPING_TYPE_DEFINITION",
        }
    }
}

/// One activity-log entry.
#[derive(Debug, Clone)]
pub struct Activity {
    label: ActivityLabel,
    description: String,
    items: Vec<Value>,
}

impl Activity {
    /// Entry with a plain-text description.
    pub fn new(label: ActivityLabel, description: impl Into<String>) -> Self {
        Self {
            label,
            description: description.into(),
            items: Vec::new(),
        }
    }

    /// Reference an affected object URI.
    pub fn object(mut self, uri: impl Into<String>) -> Self {
        self.items.push(json!({ "objectUri": uri.into() }));
        self
    }

    fn payload(&self, client_type: &str) -> Value {
        json!([{
            "label": self.label.as_str(),
            "clientType": client_type,
            "description": self.description,
            "items": self.items,
        }])
    }
}

/// Search activity description in the shape the Reltio UI records for searches.
pub fn search_activity_description(filter: &str, entity_type: &str, options: &str) -> String {
    let mut query_parts = Vec::new();
    if !filter.is_empty() {
        query_parts.push(format!("filter={filter}"));
    }
    if !options.is_empty() {
        query_parts.push(format!("options={options}"));
    }
    let entity_tab = (!entity_type.is_empty())
        .then(|| format!("configuration/entityTypes/{entity_type}"));

    json!({
        "activity": {
            "query": query_parts.join("&"),
            "uiState": {
                "view": {
                    "searchResultsMode": "table",
                    "entityTypeTab": entity_tab,
                    "tabs": null,
                    "previewPanelMode": null
                },
                "facets": { "type": { "fieldName": "type" } },
                "currentTenant": null,
                "searchOptions": {
                    "searchByOv": options.contains("searchByOv"),
                    "ovOnly": options.contains("ovOnly")
                },
                "keyword": { "value": filter, "isRawFilter": true },
                "map": null,
                "version": "2.0"
            }
        },
        "version": "2.0"
    })
    .to_string()
}

/// Record `activity` for `tenant`, swallowing any failure.
pub async fn record(client: &ReltioClient, tenant: &str, activity: Activity) {
    let payload = activity.payload(&client.config().activity_client);
    let result = client
        .post(client.api_url(tenant, "activities"))
        .json(payload)
        .send()
        .await;
    match result {
        Ok(_) => tracing::debug!(tenant, label = activity.label.as_str(), "Activity recorded"),
        Err(error) => tracing::warn!(
            tenant,
            label = activity.label.as_str(),
            %error,
            "Failed to record activity"
        ),
    }
}
