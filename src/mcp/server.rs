//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{json_resource_contents, serialize_json},
        handlers::{
            activity::{self, MergeActivitiesArgs, UserActivityArgs},
            entity::{
                self, CreateEntitiesArgs, GetEntityArgs, GetEntityGraphArgs, GetEntityParentsArgs,
                SearchEntitiesArgs, UpdateEntityAttributesArgs,
            },
            interaction::{self, CreateInteractionsArgs, EntityInteractionsArgs},
            into_call_result,
            lookup::{self, LookupListArgs},
            matching::{
                self, EntityIdArgs, FindPotentialMatchesArgs, GetEntityMatchesArgs,
                GetEntityWithMatchesArgs, PotentialMatchStatsArgs,
            },
            merge::{
                self, ExportMergeTreeArgs, MergeEntitiesArgs, RejectMatchArgs, UnmergeEntityArgs,
            },
            relation::{
                self, CreateRelationshipsArgs, EntityRelationsArgs, RelationIdArgs,
                SearchRelationsArgs,
            },
            tenant_config::{
                self, ChangeRequestTypeArgs, DataModelArgs, EntityTypeArgs, GraphTypeArgs,
                GroupingTypeArgs, InteractionTypeArgs, RelationTypeArgs, TenantArgs,
            },
            user::{self, UsersByGroupArgs, UsersByRoleArgs},
            workflow::{
                self, PossibleAssigneesArgs, ReassignTaskArgs, RetrieveTasksArgs,
                StartProcessArgs, TaskActionArgs, TaskDetailsArgs, UserTasksArgs,
            },
        },
        registry, schemas,
    },
    reltio::ReltioClient,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, JsonObject, ListResourcesResult,
        ListToolsResult, RawResource, ReadResourceRequestParam, ReadResourceResult,
        ServerCapabilities, ServerInfo, Tool, ToolAnnotations,
    },
};
use serde_json::{Value, json};
use time::OffsetDateTime;

const HEALTH_URI: &str = "reltio://health";
const SETTINGS_URI: &str = "reltio://settings";

/// MCP server exposing Reltio operations as tools.
#[derive(Clone)]
pub struct ReltioMcpServer {
    client: Arc<ReltioClient>,
    registry: Arc<registry::Registry>,
}

/// How a tool affects the tenant, reported to hosts as annotations.
#[derive(Debug, Clone, Copy)]
enum Effect {
    /// Reads only; repeating the call is harmless.
    Read,
    /// Adds or changes data without destroying any.
    Write,
    /// Merges, unmerges, deletes or otherwise rewrites existing records.
    Destructive,
}

struct ToolSpec {
    name: &'static str,
    title: &'static str,
    description: &'static str,
    schema: fn() -> JsonObject,
    effect: Effect,
    handler: registry::ToolHandler,
}

impl ToolSpec {
    fn describe(&self) -> Tool {
        let annotations = ToolAnnotations::with_title(self.title);
        let annotations = match self.effect {
            Effect::Read => annotations.read_only(true).idempotent(true),
            Effect::Write => annotations
                .read_only(false)
                .destructive(false)
                .idempotent(false),
            Effect::Destructive => annotations
                .read_only(false)
                .destructive(true)
                .idempotent(false),
        };
        Tool {
            name: Cow::Borrowed(self.name),
            title: Some(self.title.to_string()),
            description: Some(Cow::Borrowed(self.description)),
            input_schema: Arc::new((self.schema)()),
            output_schema: None,
            annotations: Some(annotations.open_world(true)),
            icons: None,
        }
    }
}

/// Generate a registry adapter that runs a handler against the shared client.
macro_rules! client_tool {
    ($adapter:ident, $name:literal, $handler:path) => {
        fn $adapter(
            server: &ReltioMcpServer,
            request: CallToolRequestParam,
        ) -> registry::ToolFuture {
            let client = server.client.clone();
            Box::pin(async move {
                Ok(into_call_result(
                    $name,
                    $handler(&client, request.arguments).await,
                ))
            })
        }
    };
}

client_tool!(tool_search_entities, "search_entities", entity::search_entities);
client_tool!(tool_get_entity, "get_entity", entity::get_entity);
client_tool!(
    tool_update_entity_attributes,
    "update_entity_attributes",
    entity::update_entity_attributes
);
client_tool!(tool_create_entities, "create_entities", entity::create_entities);
client_tool!(tool_get_entity_graph, "get_entity_graph", entity::get_entity_graph);
client_tool!(tool_get_entity_parents, "get_entity_parents", entity::get_entity_parents);
client_tool!(tool_get_entity_matches, "get_entity_matches", matching::get_entity_matches);
client_tool!(
    tool_get_entity_match_history,
    "get_entity_match_history",
    matching::get_entity_match_history
);
client_tool!(
    tool_get_entity_with_matches,
    "get_entity_with_matches",
    matching::get_entity_with_matches
);
client_tool!(
    tool_find_potential_matches,
    "find_potential_matches",
    matching::find_potential_matches
);
client_tool!(
    tool_get_potential_matches_stats,
    "get_potential_matches_stats",
    matching::get_potential_matches_stats
);
client_tool!(tool_merge_entities, "merge_entities", merge::merge_entities);
client_tool!(tool_reject_entity_match, "reject_entity_match", merge::reject_entity_match);
client_tool!(tool_export_merge_tree, "export_merge_tree", merge::export_merge_tree);
client_tool!(tool_unmerge_entity, "unmerge_entity", merge::unmerge_entity);
client_tool!(tool_get_relation, "get_relation", relation::get_relation);
client_tool!(
    tool_create_relationships,
    "create_relationships",
    relation::create_relationships
);
client_tool!(tool_delete_relation, "delete_relation", relation::delete_relation);
client_tool!(
    tool_get_entity_relations,
    "get_entity_relations",
    relation::get_entity_relations
);
client_tool!(tool_search_relations, "search_relations", relation::search_relations);
client_tool!(
    tool_get_entity_interactions,
    "get_entity_interactions",
    interaction::get_entity_interactions
);
client_tool!(
    tool_create_interactions,
    "create_interactions",
    interaction::create_interactions
);
client_tool!(tool_rdm_lookups_list, "rdm_lookups_list", lookup::rdm_lookups_list);
client_tool!(
    tool_get_users_by_role_and_tenant,
    "get_users_by_role_and_tenant",
    user::get_users_by_role_and_tenant
);
client_tool!(
    tool_get_users_by_group_and_tenant,
    "get_users_by_group_and_tenant",
    user::get_users_by_group_and_tenant
);
client_tool!(
    tool_get_business_configuration,
    "get_business_configuration",
    tenant_config::get_business_configuration
);
client_tool!(
    tool_get_tenant_permissions_metadata,
    "get_tenant_permissions_metadata",
    tenant_config::get_tenant_permissions_metadata
);
client_tool!(tool_get_tenant_metadata, "get_tenant_metadata", tenant_config::get_tenant_metadata);
client_tool!(
    tool_get_data_model_definition,
    "get_data_model_definition",
    tenant_config::get_data_model_definition
);
client_tool!(
    tool_get_entity_type_definition,
    "get_entity_type_definition",
    tenant_config::get_entity_type_definition
);
client_tool!(
    tool_get_change_request_type_definition,
    "get_change_request_type_definition",
    tenant_config::get_change_request_type_definition
);
client_tool!(
    tool_get_relation_type_definition,
    "get_relation_type_definition",
    tenant_config::get_relation_type_definition
);
client_tool!(
    tool_get_interaction_type_definition,
    "get_interaction_type_definition",
    tenant_config::get_interaction_type_definition
);
client_tool!(
    tool_get_graph_type_definition,
    "get_graph_type_definition",
    tenant_config::get_graph_type_definition
);
client_tool!(
    tool_get_grouping_type_definition,
    "get_grouping_type_definition",
    tenant_config::get_grouping_type_definition
);
client_tool!(tool_check_user_activity, "check_user_activity", activity::check_user_activity);
client_tool!(
    tool_get_merge_activities,
    "get_merge_activities",
    activity::get_merge_activities
);
client_tool!(
    tool_get_user_workflow_tasks,
    "get_user_workflow_tasks",
    workflow::get_user_workflow_tasks
);
client_tool!(
    tool_reassign_workflow_task,
    "reassign_workflow_task",
    workflow::reassign_workflow_task
);
client_tool!(
    tool_get_possible_assignees,
    "get_possible_assignees",
    workflow::get_possible_assignees
);
client_tool!(tool_retrieve_tasks, "retrieve_tasks", workflow::retrieve_tasks);
client_tool!(tool_get_task_details, "get_task_details", workflow::get_task_details);
client_tool!(
    tool_start_process_instance,
    "start_process_instance",
    workflow::start_process_instance
);
client_tool!(
    tool_execute_task_action,
    "execute_task_action",
    workflow::execute_task_action
);

const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "search_entities",
        title: "Search Entities",
        description: "Search entities with a Reltio filter expression (equals, containsWordStartingWith, fuzzy, range, exists, ...), optionally restricted to one entity type.",
        schema: schemas::input_schema::<SearchEntitiesArgs>,
        effect: Effect::Read,
        handler: tool_search_entities,
    },
    ToolSpec {
        name: "get_entity",
        title: "Get Entity",
        description: "Read one entity by id with simplified attributes and slim crosswalks; filter_field narrows the returned fields.",
        schema: schemas::input_schema::<GetEntityArgs>,
        effect: Effect::Read,
        handler: tool_get_entity,
    },
    ToolSpec {
        name: "update_entity_attributes",
        title: "Update Entity Attributes",
        description: "Insert, update or delete attribute values of an entity, or queue the change as a data change request.",
        schema: schemas::input_schema::<UpdateEntityAttributesArgs>,
        effect: Effect::Write,
        handler: tool_update_entity_attributes,
    },
    ToolSpec {
        name: "create_entities",
        title: "Create Entities",
        description: "Create one or more entities; each needs a type such as configuration/entityTypes/Individual.",
        schema: schemas::input_schema::<CreateEntitiesArgs>,
        effect: Effect::Write,
        handler: tool_create_entities,
    },
    ToolSpec {
        name: "get_entity_graph",
        title: "Get Entity Graph",
        description: "Traverse relations from an entity up to a number of hops and return the connected entities and relations.",
        schema: schemas::input_schema::<GetEntityGraphArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_graph,
    },
    ToolSpec {
        name: "get_entity_parents",
        title: "Get Entity Parents",
        description: "Find the parent paths of an entity within the given graph types.",
        schema: schemas::input_schema::<GetEntityParentsArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_parents,
    },
    ToolSpec {
        name: "get_entity_matches",
        title: "Get Entity Matches",
        description: "List the potential matches of an entity with match rules and scores.",
        schema: schemas::input_schema::<GetEntityMatchesArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_matches,
    },
    ToolSpec {
        name: "get_entity_match_history",
        title: "Get Match History",
        description: "Show the crosswalk tree recording how an entity was merged over time.",
        schema: schemas::input_schema::<EntityIdArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_match_history,
    },
    ToolSpec {
        name: "get_entity_with_matches",
        title: "Get Entity With Matches",
        description: "Read an entity together with its top potential matches (1 to 5) and an approximate total match count.",
        schema: schemas::input_schema::<GetEntityWithMatchesArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_with_matches,
    },
    ToolSpec {
        name: "find_potential_matches",
        title: "Find Potential Matches",
        description: "Find entities with potential matches by match rule, relevance score range (\"start,end\" in 0..100) or confidence label.",
        schema: schemas::input_schema::<FindPotentialMatchesArgs>,
        effect: Effect::Read,
        handler: tool_find_potential_matches,
    },
    ToolSpec {
        name: "get_potential_matches_stats",
        title: "Potential Match Statistics",
        description: "Count potential matches per entity type and match rule, plus the overall total.",
        schema: schemas::input_schema::<PotentialMatchStatsArgs>,
        effect: Effect::Read,
        handler: tool_get_potential_matches_stats,
    },
    ToolSpec {
        name: "merge_entities",
        title: "Merge Entities",
        description: "Merge exactly two entities into one.",
        schema: schemas::input_schema::<MergeEntitiesArgs>,
        effect: Effect::Destructive,
        handler: tool_merge_entities,
    },
    ToolSpec {
        name: "reject_entity_match",
        title: "Reject Match",
        description: "Mark two entities as not a match so they stop appearing as potential duplicates.",
        schema: schemas::input_schema::<RejectMatchArgs>,
        effect: Effect::Write,
        handler: tool_reject_entity_match,
    },
    ToolSpec {
        name: "export_merge_tree",
        title: "Export Merge Tree",
        description: "Start an export job of the tenant's merge tree; the result is mailed to the given address.",
        schema: schemas::input_schema::<ExportMergeTreeArgs>,
        effect: Effect::Write,
        handler: tool_export_merge_tree,
    },
    ToolSpec {
        name: "unmerge_entity",
        title: "Unmerge Entity",
        description: "Split a contributor out of a merged entity, optionally together with everything merged into it.",
        schema: schemas::input_schema::<UnmergeEntityArgs>,
        effect: Effect::Destructive,
        handler: tool_unmerge_entity,
    },
    ToolSpec {
        name: "get_relation",
        title: "Get Relation",
        description: "Read one relation by id with simplified attributes.",
        schema: schemas::input_schema::<RelationIdArgs>,
        effect: Effect::Read,
        handler: tool_get_relation,
    },
    ToolSpec {
        name: "create_relationships",
        title: "Create Relationships",
        description: "Create relations between entities referenced by URI or by crosswalk.",
        schema: schemas::input_schema::<CreateRelationshipsArgs>,
        effect: Effect::Write,
        handler: tool_create_relationships,
    },
    ToolSpec {
        name: "delete_relation",
        title: "Delete Relation",
        description: "Delete a relation by id.",
        schema: schemas::input_schema::<RelationIdArgs>,
        effect: Effect::Destructive,
        handler: tool_delete_relation,
    },
    ToolSpec {
        name: "get_entity_relations",
        title: "Get Entity Relations",
        description: "List the connections of an entity to entities of the given types.",
        schema: schemas::input_schema::<EntityRelationsArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_relations,
    },
    ToolSpec {
        name: "search_relations",
        title: "Search Relations",
        description: "Search relations with a filter expression. Requires relation indexing on the tenant.",
        schema: schemas::input_schema::<SearchRelationsArgs>,
        effect: Effect::Read,
        handler: tool_search_relations,
    },
    ToolSpec {
        name: "get_entity_interactions",
        title: "Get Entity Interactions",
        description: "List the interactions recorded for an entity.",
        schema: schemas::input_schema::<EntityInteractionsArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_interactions,
    },
    ToolSpec {
        name: "create_interactions",
        title: "Create Interactions",
        description: "Record interactions such as e-mails or purchases against entities.",
        schema: schemas::input_schema::<CreateInteractionsArgs>,
        effect: Effect::Write,
        handler: tool_create_interactions,
    },
    ToolSpec {
        name: "rdm_lookups_list",
        title: "List RDM Lookups",
        description: "List reference-data lookup values of an RDM lookup type.",
        schema: schemas::input_schema::<LookupListArgs>,
        effect: Effect::Read,
        handler: tool_rdm_lookups_list,
    },
    ToolSpec {
        name: "get_users_by_role_and_tenant",
        title: "Users By Role",
        description: "List users holding a role on the tenant.",
        schema: schemas::input_schema::<UsersByRoleArgs>,
        effect: Effect::Read,
        handler: tool_get_users_by_role_and_tenant,
    },
    ToolSpec {
        name: "get_users_by_group_and_tenant",
        title: "Users By Group",
        description: "List users of the tenant belonging to a group.",
        schema: schemas::input_schema::<UsersByGroupArgs>,
        effect: Effect::Read,
        handler: tool_get_users_by_group_and_tenant,
    },
    ToolSpec {
        name: "check_user_activity",
        title: "Check User Activity",
        description: "Tell whether a user searched, viewed, edited, merged or logged in within the last days.",
        schema: schemas::input_schema::<UserActivityArgs>,
        effect: Effect::Read,
        handler: tool_check_user_activity,
    },
    ToolSpec {
        name: "get_merge_activities",
        title: "Get Merge Activities",
        description: "List merge events after a timestamp, optionally narrowed by event type, entity type or user.",
        schema: schemas::input_schema::<MergeActivitiesArgs>,
        effect: Effect::Read,
        handler: tool_get_merge_activities,
    },
    ToolSpec {
        name: "get_user_workflow_tasks",
        title: "User Workflow Tasks",
        description: "List the workflow tasks assigned to a user with the total count.",
        schema: schemas::input_schema::<UserTasksArgs>,
        effect: Effect::Read,
        handler: tool_get_user_workflow_tasks,
    },
    ToolSpec {
        name: "reassign_workflow_task",
        title: "Reassign Workflow Task",
        description: "Assign a workflow task to another user.",
        schema: schemas::input_schema::<ReassignTaskArgs>,
        effect: Effect::Write,
        handler: tool_reassign_workflow_task,
    },
    ToolSpec {
        name: "get_possible_assignees",
        title: "Possible Assignees",
        description: "List users who may take the given tasks. Pass either tasks, or task_filter and/or exclude.",
        schema: schemas::input_schema::<PossibleAssigneesArgs>,
        effect: Effect::Read,
        handler: tool_get_possible_assignees,
    },
    ToolSpec {
        name: "retrieve_tasks",
        title: "Retrieve Tasks",
        description: "Query workflow tasks by assignee, process, priority, creation time, state or linked objects.",
        schema: schemas::input_schema::<RetrieveTasksArgs>,
        effect: Effect::Read,
        handler: tool_retrieve_tasks,
    },
    ToolSpec {
        name: "get_task_details",
        title: "Get Task Details",
        description: "Read one workflow task, optionally with its variables.",
        schema: schemas::input_schema::<TaskDetailsArgs>,
        effect: Effect::Read,
        handler: tool_get_task_details,
    },
    ToolSpec {
        name: "start_process_instance",
        title: "Start Process Instance",
        description: "Start a workflow process such as DataChangeRequest for the given objects.",
        schema: schemas::input_schema::<StartProcessArgs>,
        effect: Effect::Write,
        handler: tool_start_process_instance,
    },
    ToolSpec {
        name: "execute_task_action",
        title: "Execute Task Action",
        description: "Complete a workflow task with an action such as Approve or Reject.",
        schema: schemas::input_schema::<TaskActionArgs>,
        effect: Effect::Write,
        handler: tool_execute_task_action,
    },
    ToolSpec {
        name: "get_business_configuration",
        title: "Get Business Configuration",
        description: "Return the tenant's full business configuration document as JSON. Large; prefer the summarized definition tools.",
        schema: schemas::input_schema::<TenantArgs>,
        effect: Effect::Read,
        handler: tool_get_business_configuration,
    },
    ToolSpec {
        name: "get_tenant_permissions_metadata",
        title: "Get Tenant Permissions Metadata",
        description: "Read the permission metadata of a tenant.",
        schema: schemas::input_schema::<TenantArgs>,
        effect: Effect::Read,
        handler: tool_get_tenant_permissions_metadata,
    },
    ToolSpec {
        name: "get_tenant_metadata",
        title: "Get Tenant Metadata",
        description: "Summarize the tenant configuration: schema version, audit fields and the number of sources and types per data model section.",
        schema: schemas::input_schema::<TenantArgs>,
        effect: Effect::Read,
        handler: tool_get_tenant_metadata,
    },
    ToolSpec {
        name: "get_data_model_definition",
        title: "Get Data Model Definition",
        description: "Summarize selected data model sections (entityTypes, relationTypes, graphTypes, ...); all sections when object_type is empty.",
        schema: schemas::input_schema::<DataModelArgs>,
        effect: Effect::Read,
        handler: tool_get_data_model_definition,
    },
    ToolSpec {
        name: "get_entity_type_definition",
        title: "Get Entity Type Definition",
        description: "Read one entity type with its attribute tree.",
        schema: schemas::input_schema::<EntityTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_entity_type_definition,
    },
    ToolSpec {
        name: "get_change_request_type_definition",
        title: "Get Change Request Type Definition",
        description: "Read one change request type definition.",
        schema: schemas::input_schema::<ChangeRequestTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_change_request_type_definition,
    },
    ToolSpec {
        name: "get_relation_type_definition",
        title: "Get Relation Type Definition",
        description: "Read one relation type with its start and end object types and attributes.",
        schema: schemas::input_schema::<RelationTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_relation_type_definition,
    },
    ToolSpec {
        name: "get_interaction_type_definition",
        title: "Get Interaction Type Definition",
        description: "Read one interaction type with its member types and attributes.",
        schema: schemas::input_schema::<InteractionTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_interaction_type_definition,
    },
    ToolSpec {
        name: "get_graph_type_definition",
        title: "Get Graph Type Definition",
        description: "Read one graph type with the relation types it spans.",
        schema: schemas::input_schema::<GraphTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_graph_type_definition,
    },
    ToolSpec {
        name: "get_grouping_type_definition",
        title: "Get Grouping Type Definition",
        description: "Read one grouping type definition.",
        schema: schemas::input_schema::<GroupingTypeArgs>,
        effect: Effect::Read,
        handler: tool_get_grouping_type_definition,
    },
    ToolSpec {
        name: "capabilities",
        title: "Server Capabilities",
        description: "List every tool of this server with its parameter names.",
        schema: schemas::empty_object_schema,
        effect: Effect::Read,
        handler: tool_capabilities,
    },
    ToolSpec {
        name: "health_check",
        title: "Health Check",
        description: "Check that the server is running.",
        schema: schemas::empty_object_schema,
        effect: Effect::Read,
        handler: tool_health_check,
    },
];

impl ReltioMcpServer {
    /// Create a new MCP server calling Reltio through `client`.
    pub fn new(client: Arc<ReltioClient>) -> Self {
        let mut registry = registry::Registry::new();

        let mut health = RawResource::new(HEALTH_URI, "health");
        health.description = Some("Server liveness with a millisecond timestamp".into());
        registry.register_resource(HEALTH_URI, health.no_annotation(), resource_health);

        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description =
            Some("Default tenant, environment and result limits in effect".into());
        registry.register_resource(SETTINGS_URI, settings.no_annotation(), resource_settings);

        for spec in TOOLS {
            registry.register_tool(spec.name, spec.describe(), spec.handler);
        }

        Self {
            client,
            registry: Arc::new(registry),
        }
    }

    fn capabilities_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .tools()
            .iter()
            .map(|tool| {
                let parameters: Vec<&String> = tool
                    .input_schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|properties| properties.keys().collect())
                    .unwrap_or_default();
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": parameters,
                })
            })
            .collect();
        json!({
            "server_name": self.client.config().server_name,
            "tools": tools,
        })
    }
}

fn health_payload() -> Value {
    json!({
        "status": "ok",
        "message": "MCP server is running",
        "timestamp": (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
    })
}

fn tool_capabilities(
    server: &ReltioMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let payload = server.capabilities_payload();
    Box::pin(async move { Ok(CallToolResult::structured(payload)) })
}

fn tool_health_check(
    _server: &ReltioMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    Box::pin(async move { Ok(CallToolResult::structured(health_payload())) })
}

fn resource_health(
    _server: &ReltioMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                HEALTH_URI,
                serialize_json(&health_payload(), HEALTH_URI),
            )],
        })
    })
}

fn resource_settings(
    server: &ReltioMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let config = server.client.config();
    let payload = json!({
        "server_name": config.server_name,
        "default_tenant": config.default_tenant,
        "environment": config.environment,
        "max_results_limit": config.max_results_limit,
        "http_timeout_secs": config.http_timeout_secs,
    });
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(&payload, SETTINGS_URI),
            )],
        })
    })
}

impl ServerHandler for ReltioMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = self.client.config().server_name.clone();
        implementation.title = Some("Reltio MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Use this server to search, inspect and curate Reltio MDM data: entities, potential matches, merges, relations, interactions, lookups, users, activities and workflow tasks. Tools default to the configured tenant; pass tenant_id to target another.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.registry.resources().to_vec();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.registry.tools().to_vec();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resource(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tool(request.name.as_ref()) {
                tracing::debug!(tool = %request.name, "Dispatching tool call");
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashSet;

    fn server() -> ReltioMcpServer {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        let client = ReltioClient::new(Arc::new(config)).expect("client");
        ReltioMcpServer::new(Arc::new(client))
    }

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<&str> = TOOLS.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), TOOLS.len());
    }

    #[test]
    fn every_tool_schema_is_a_closed_object() {
        for spec in TOOLS {
            let schema = (spec.schema)();
            assert_eq!(schema["type"], "object", "{}", spec.name);
            assert_eq!(schema["additionalProperties"], false, "{}", spec.name);
        }
    }

    #[test]
    fn destructive_tools_are_annotated() {
        let tool = TOOLS
            .iter()
            .find(|spec| spec.name == "merge_entities")
            .expect("merge tool")
            .describe();
        let annotations = tool.annotations.expect("annotations");
        assert_eq!(annotations.destructive_hint, Some(true));
        assert_eq!(annotations.read_only_hint, Some(false));
    }

    #[test]
    fn capabilities_list_parameter_names() {
        let payload = server().capabilities_payload();
        assert_eq!(payload["server_name"], "reltio-mcp");
        let tools = payload["tools"].as_array().expect("tools");
        assert_eq!(tools.len(), TOOLS.len());
        let merge = tools
            .iter()
            .find(|tool| tool["name"] == "merge_entities")
            .expect("merge listed");
        let parameters = merge["parameters"].as_array().expect("parameters");
        assert!(parameters.contains(&json!("entity_ids")));
        assert!(parameters.contains(&json!("tenant_id")));
    }

    #[test]
    fn health_payload_reports_ok() {
        let payload = health_payload();
        assert_eq!(payload["status"], "ok");
        assert!(payload["timestamp"].as_i64().unwrap() > 0);
    }
}
