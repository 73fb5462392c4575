//! Handlers for the workflow service: task queries, assignment, and process control.
//!
//! Task calls go to the workflow UI service and carry an `EnvironmentURL` header naming the
//! Reltio environment the tasks belong to. Starting a process goes through the process engine
//! under the main API host instead.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    reltio::{ApiCall, ReltioClient},
    validation::{
        Exclusive, PRIORITY_CLASS, Page, Range, TASK_ID, TASK_ORDER_BY, TASK_STATE, TimeWindow,
        ValidationError, exactly_one_group, min_len, non_empty, optional_text, page,
        time_window,
    },
};

use super::{
    Output, ReltioResultExt, ToolOutcome, Validate, parse_request, request_failure, tenant,
};

const STATUS_FAILED: &str = "failed";

fn with_environment<'a>(client: &ReltioClient, call: ApiCall<'a>) -> ApiCall<'a> {
    call.header("EnvironmentURL", client.environment_url())
}

fn status_of(response: &Value) -> &str {
    response.get("status").and_then(Value::as_str).unwrap_or("")
}

fn is_ok(response: &Value) -> bool {
    status_of(response).eq_ignore_ascii_case("ok")
}

/// Trimmed `{status: failed, error}` document when the workflow service reports a failure.
fn failed_status(response: &Value) -> Option<Value> {
    if status_of(response) != STATUS_FAILED {
        return None;
    }
    let error = response.get("error").cloned().unwrap_or_else(|| {
        json!({"errorCode": "Unknown", "errorMessage": "Unknown error"})
    });
    tracing::error!(%error, "Workflow service returned a failed status");
    Some(json!({"status": STATUS_FAILED, "error": error}))
}

fn default_task_max() -> i64 {
    10
}

/// Arguments of `get_user_workflow_tasks`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UserTasksArgs {
    /// Username whose tasks are listed.
    assignee: String,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// Page size; values above the configured limit are capped. Use 1 to read only the total.
    #[serde(default = "default_task_max")]
    max_results: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UserTasks {
    tenant: String,
    assignee: String,
    offset: i64,
    max: i64,
}

impl Validate for UserTasksArgs {
    type Output = UserTasks;

    fn validate(self, config: &Config) -> Result<UserTasks, ValidationError> {
        Ok(UserTasks {
            tenant: tenant(config, self.tenant_id)?,
            assignee: non_empty("assignee", &self.assignee)?,
            offset: Range::at_least(0).check("offset", self.offset)?,
            max: Range::new(1, i64::from(config.max_results_limit)).clamp(self.max_results),
        })
    }
}

fn task_summary(task: &Value) -> Value {
    let field = |key: &str, fallback: Value| task.get(key).cloned().unwrap_or(fallback);
    json!({
        "taskId": field("taskId", json!("")),
        "processType": field("processType", json!("")),
        "taskType": field("taskType", json!("")),
        "createTime": field("createTime", Value::Null),
        "dueDate": field("dueDate", Value::Null),
        "displayName": field("displayName", json!("")),
        "priorityClass": field("priorityClass", json!("")),
        "processDefinitionDisplayName": field("processDefinitionDisplayName", json!("")),
        "objectURIs": field("objectURIs", json!([])),
    })
}

/// Handle the `get_user_workflow_tasks` tool.
pub(crate) async fn get_user_workflow_tasks(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UserTasksArgs>(arguments, client.config())?;

    let response = with_environment(client, client.post(client.workflow_url(&request.tenant, "tasks")))
        .json(json!({
            "assignee": request.assignee,
            "offset": request.offset,
            "max": request.max,
        }))
        .send()
        .await
        .map_err(request_failure("retrieve workflow tasks"))?;

    let tasks: Vec<Value> = response
        .get("data")
        .and_then(Value::as_array)
        .map(|tasks| tasks.iter().map(task_summary).collect())
        .unwrap_or_default();
    let total = response.get("total").cloned().unwrap_or_else(|| json!(0));

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::WorkflowTasks,
            format!(
                "Fetched workflow tasks for user {} (total: {total}, returned: {})",
                request.assignee,
                tasks.len()
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "assignee": request.assignee,
        "total_tasks": total,
        "returned_count": tasks.len(),
        "offset": response.get("offset").cloned().unwrap_or_else(|| json!(request.offset)),
        "status": status_of(&response),
        "tasks": tasks,
    })))
}

/// Arguments of `reassign_workflow_task`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReassignTaskArgs {
    /// Task to reassign.
    task_id: String,
    /// Username receiving the task.
    assignee: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct ReassignTask {
    tenant: String,
    task_id: String,
    assignee: String,
}

impl Validate for ReassignTaskArgs {
    type Output = ReassignTask;

    fn validate(self, config: &Config) -> Result<ReassignTask, ValidationError> {
        Ok(ReassignTask {
            tenant: tenant(config, self.tenant_id)?,
            task_id: TASK_ID.apply("task_id", &self.task_id)?,
            assignee: non_empty("assignee", &self.assignee)?,
        })
    }
}

/// Handle the `reassign_workflow_task` tool.
pub(crate) async fn reassign_workflow_task(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<ReassignTaskArgs>(arguments, client.config())?;

    let response = with_environment(client, client.put(client.workflow_url(&request.tenant, "tasks")))
        .json(json!([{"taskId": request.task_id, "assignee": request.assignee}]))
        .send()
        .await
        .map_err(request_failure("reassign workflow task"))?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::WorkflowTasks,
            format!(
                "Reassigned task {} to user {}",
                request.task_id, request.assignee
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "task_id": request.task_id,
        "new_assignee": request.assignee,
        "status": status_of(&response),
        "success": is_ok(&response),
    })))
}

/// Arguments of `get_possible_assignees`.
///
/// Either `tasks` alone, or `task_filter` and/or `exclude`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct PossibleAssigneesArgs {
    /// Task ids to find assignees for. Cannot be combined with `task_filter` or `exclude`.
    #[serde(default)]
    tasks: Option<Vec<String>>,
    /// Filter selecting the tasks. Cannot be combined with `tasks`.
    #[serde(default)]
    task_filter: Option<Map<String, Value>>,
    /// Task ids to leave out. Cannot be combined with `tasks`.
    #[serde(default)]
    exclude: Option<Vec<String>>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

/// Which tasks the assignee lookup covers.
#[derive(Debug)]
pub(crate) enum AssigneeScope {
    Tasks(Vec<String>),
    Filter {
        filter: Map<String, Value>,
        exclude: Vec<String>,
    },
}

#[derive(Debug)]
pub(crate) struct PossibleAssignees {
    tenant: String,
    scope: AssigneeScope,
}

impl Validate for PossibleAssigneesArgs {
    type Output = PossibleAssignees;

    fn validate(self, config: &Config) -> Result<PossibleAssignees, ValidationError> {
        let tasks = self.tasks.unwrap_or_default();
        let filter = self.task_filter.unwrap_or_default();
        let exclude = self.exclude.unwrap_or_default();
        let scope = match exactly_one_group(
            ("tasks", !tasks.is_empty()),
            ("task_filter/exclude", !filter.is_empty() || !exclude.is_empty()),
        )? {
            Exclusive::First => AssigneeScope::Tasks(
                tasks
                    .iter()
                    .map(|task| TASK_ID.apply("tasks", task))
                    .collect::<Result<_, _>>()?,
            ),
            Exclusive::Second => AssigneeScope::Filter { filter, exclude },
        };
        Ok(PossibleAssignees {
            tenant: tenant(config, self.tenant_id)?,
            scope,
        })
    }
}

impl AssigneeScope {
    fn body(&self) -> Value {
        match self {
            Self::Tasks(tasks) => json!({ "tasks": tasks }),
            Self::Filter { filter, exclude } => {
                let mut body = Map::new();
                body.insert("filter".into(), Value::Object(filter.clone()));
                if !exclude.is_empty() {
                    body.insert("exclude".into(), json!(exclude));
                }
                Value::Object(body)
            }
        }
    }

    fn echo(&self, tenant: &str) -> Value {
        let (tasks, filter, exclude) = match self {
            Self::Tasks(tasks) => (json!(tasks), Value::Null, Value::Null),
            Self::Filter { filter, exclude } => (
                Value::Null,
                if filter.is_empty() {
                    Value::Null
                } else {
                    Value::Object(filter.clone())
                },
                if exclude.is_empty() {
                    Value::Null
                } else {
                    json!(exclude)
                },
            ),
        };
        json!({"tenant_id": tenant, "tasks": tasks, "filter": filter, "exclude": exclude})
    }
}

/// Handle the `get_possible_assignees` tool.
pub(crate) async fn get_possible_assignees(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<PossibleAssigneesArgs>(arguments, client.config())?;

    let response = with_environment(
        client,
        client.post(client.workflow_url(&request.tenant, "assignee")),
    )
    .json(request.scope.body())
    .send()
    .await
    .map_err(request_failure("retrieve possible assignees"))?;

    let total = response.get("total").cloned().unwrap_or_else(|| json!(0));
    let mut result = Map::new();
    result.insert("status".into(), json!(status_of(&response)));
    result.insert(
        "data".into(),
        response.get("data").cloned().unwrap_or_else(|| json!([])),
    );
    result.insert("total".into(), total.clone());
    result.insert(
        "request_parameters".into(),
        request.scope.echo(&request.tenant),
    );
    if let Some(warning) = response.get("warning").filter(|warning| !warning.is_null()) {
        result.insert("warning".into(), warning.clone());
    }

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::WorkflowTasks,
            format!("Retrieved possible assignees (total: {total})"),
        ),
    )
    .await;

    Ok(Output::Yaml(Value::Object(result)))
}

/// Arguments of `retrieve_tasks`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RetrieveTasksArgs {
    /// Task assignee; `none` selects unassigned tasks.
    #[serde(default)]
    assignee: Option<String>,
    /// Process instance id.
    #[serde(default)]
    process_instance_id: Option<String>,
    /// Single process type.
    #[serde(default)]
    process_type: Option<String>,
    /// Several process types.
    #[serde(default)]
    process_types: Option<Vec<String>>,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// Page size, 1..=the configured limit.
    #[serde(default = "default_task_max")]
    max_results: i64,
    /// Only suspended (or only active) tasks.
    #[serde(default)]
    suspended: Option<bool>,
    /// Task owner.
    #[serde(default)]
    created_by: Option<String>,
    /// `Urgent`, `High`, `Medium` or `Low`.
    #[serde(default)]
    priority_class: Option<String>,
    /// `createTime` (default), `assignee`, `dueDate` or `priority`.
    #[serde(default)]
    order_by: Option<String>,
    /// Ascending sort; descending by default.
    #[serde(default)]
    ascending: bool,
    /// Task type, e.g. `dcrReview`.
    #[serde(default)]
    task_type: Option<String>,
    /// Only tasks created after this epoch-millisecond timestamp.
    #[serde(default)]
    created_after: Option<i64>,
    /// Only tasks created before this epoch-millisecond timestamp.
    #[serde(default)]
    created_before: Option<i64>,
    /// `valid` (default), `invalid` or `all`.
    #[serde(default)]
    state: Option<String>,
    /// Reltio object URIs the tasks must reference.
    #[serde(default)]
    object_uris: Option<Vec<String>>,
    /// Include task variables.
    #[serde(default)]
    show_task_variables: bool,
    /// Include task-local variables.
    #[serde(default)]
    show_task_local_variables: bool,
    /// Search filter on the entities linked to the tasks.
    #[serde(default)]
    object_filter: Option<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct RetrieveTasks {
    tenant: String,
    page: Page,
    body: Map<String, Value>,
}

impl Validate for RetrieveTasksArgs {
    type Output = RetrieveTasks;

    fn validate(self, config: &Config) -> Result<RetrieveTasks, ValidationError> {
        let page = page(
            self.offset,
            ("max_results", self.max_results),
            Range::new(1, i64::from(config.max_results_limit)),
        )?;
        let TimeWindow { lower, upper } = time_window(
            ("created_after", self.created_after),
            ("created_before", self.created_before),
            true,
        )?;
        let priority_class = match optional_text(self.priority_class) {
            Some(priority) => Some(PRIORITY_CLASS.apply("priority_class", &priority)?),
            None => None,
        };

        let mut body = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                body.insert(key.into(), value);
            }
        };
        put("assignee", optional_text(self.assignee).map(Value::String));
        put(
            "processInstanceId",
            optional_text(self.process_instance_id).map(Value::String),
        );
        put("processType", optional_text(self.process_type).map(Value::String));
        put("processTypes", self.process_types.map(|types| json!(types)));
        put("offset", Some(json!(page.offset)));
        put("max", Some(json!(page.max)));
        put("suspended", self.suspended.map(Value::Bool));
        put("createdBy", optional_text(self.created_by).map(Value::String));
        put("priorityClass", priority_class.map(Value::String));
        put(
            "orderBy",
            Some(Value::String(TASK_ORDER_BY.apply_or(
                "order_by",
                self.order_by.as_deref(),
                "createTime",
            )?)),
        );
        put("ascending", Some(Value::Bool(self.ascending)));
        put("taskType", optional_text(self.task_type).map(Value::String));
        put("createdAfter", lower.map(|after| json!(after)));
        put("createdBefore", upper.map(|before| json!(before)));
        put(
            "state",
            Some(Value::String(TASK_STATE.apply_or(
                "state",
                self.state.as_deref(),
                "valid",
            )?)),
        );
        put("objectURIs", self.object_uris.map(|uris| json!(uris)));
        put("showTaskVariables", Some(Value::Bool(self.show_task_variables)));
        put(
            "showTaskLocalVariables",
            Some(Value::Bool(self.show_task_local_variables)),
        );
        put("objectFilter", optional_text(self.object_filter).map(Value::String));

        Ok(RetrieveTasks {
            tenant: tenant(config, self.tenant_id)?,
            page,
            body,
        })
    }
}

impl RetrieveTasks {
    fn description(&self, total: &Value, returned: usize) -> String {
        let mut parts = vec!["Retrieved workflow tasks".to_string()];
        if let Some(assignee) = self.body.get("assignee").and_then(Value::as_str) {
            parts.push(format!("for assignee {assignee}"));
        }
        if let Some(types) = self.body.get("processTypes").and_then(Value::as_array) {
            let types: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            parts.push(format!("of types {}", types.join(", ")));
        }
        if let Some(task_type) = self.body.get("taskType").and_then(Value::as_str) {
            parts.push(format!("of task type {task_type}"));
        }
        parts.push(format!("(total: {total}, returned: {returned})"));
        parts.join(" ")
    }
}

/// Handle the `retrieve_tasks` tool.
pub(crate) async fn retrieve_tasks(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<RetrieveTasksArgs>(arguments, client.config())?;

    let response = with_environment(client, client.post(client.workflow_url(&request.tenant, "tasks")))
        .query("checkAccess", true)
        .json(Value::Object(request.body.clone()))
        .send()
        .await
        .map_err(request_failure("retrieve workflow tasks"))?;

    if let Some(failed) = failed_status(&response) {
        return Ok(Output::Yaml(failed));
    }

    let tasks = response.get("data").cloned().unwrap_or_else(|| json!([]));
    let returned = tasks.as_array().map_or(0, Vec::len);
    let total = response.get("total").cloned().unwrap_or_else(|| json!(0));
    let mut result = Map::new();
    result.insert(
        "offset".into(),
        response
            .get("offset")
            .cloned()
            .unwrap_or_else(|| json!(request.page.offset)),
    );
    result.insert(
        "size".into(),
        response.get("size").cloned().unwrap_or_else(|| json!(returned)),
    );
    result.insert("total".into(), total.clone());
    result.insert("data".into(), tasks);
    result.insert(
        "status".into(),
        response.get("status").cloned().unwrap_or(Value::Null),
    );
    if let Some(warning) = response.get("warning") {
        result.insert("warning".into(), warning.clone());
    }

    if is_ok(&response) {
        audit::record(
            client,
            &request.tenant,
            Activity::new(
                ActivityLabel::WorkflowTasks,
                request.description(&total, returned),
            ),
        )
        .await;
    }

    Ok(Output::Yaml(Value::Object(result)))
}

/// Arguments of `get_task_details`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct TaskDetailsArgs {
    /// Task to read.
    task_id: String,
    /// Include task variables.
    #[serde(default)]
    show_task_variables: bool,
    /// Include task-local variables.
    #[serde(default)]
    show_task_local_variables: bool,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct TaskDetails {
    tenant: String,
    task_id: String,
    show_task_variables: bool,
    show_task_local_variables: bool,
}

impl Validate for TaskDetailsArgs {
    type Output = TaskDetails;

    fn validate(self, config: &Config) -> Result<TaskDetails, ValidationError> {
        Ok(TaskDetails {
            tenant: tenant(config, self.tenant_id)?,
            task_id: TASK_ID.apply("task_id", &self.task_id)?,
            show_task_variables: self.show_task_variables,
            show_task_local_variables: self.show_task_local_variables,
        })
    }
}

/// Handle the `get_task_details` tool.
pub(crate) async fn get_task_details(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<TaskDetailsArgs>(arguments, client.config())?;

    let response = with_environment(
        client,
        client.get(client.workflow_url(&request.tenant, &format!("tasks/{}", request.task_id))),
    )
    .query_opt("showTaskVariables", request.show_task_variables.then_some("true"))
    .query_opt(
        "showTaskLocalVariables",
        request.show_task_local_variables.then_some("true"),
    )
    .send()
    .await
    .map_err(request_failure("retrieve task details"))?;

    if let Some(failed) = failed_status(&response) {
        return Ok(Output::Yaml(failed));
    }

    if is_ok(&response) {
        let text = |key: &str, fallback: &'static str| {
            response
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        audit::record(
            client,
            &request.tenant,
            Activity::new(
                ActivityLabel::WorkflowTasks,
                format!(
                    "Retrieved details for task {} ({}) assigned to {} of type {}",
                    request.task_id,
                    text("displayName", "Unknown Task"),
                    text("assignee", "Unassigned"),
                    text("processType", "Unknown Process"),
                ),
            ),
        )
        .await;
    }

    Ok(Output::Yaml(response))
}

/// Arguments of `start_process_instance`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct StartProcessArgs {
    /// Process type, e.g. `DataChangeRequest`.
    process_type: String,
    /// Object URIs attached to the process; at least one.
    object_uris: Vec<String>,
    /// Comment stored on the process instance.
    #[serde(default)]
    comment: Option<String>,
    /// Process variables.
    #[serde(default)]
    variables: Option<Map<String, Value>>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct StartProcess {
    tenant: String,
    process_type: String,
    object_uris: Vec<String>,
    comment: Option<String>,
    variables: Option<Map<String, Value>>,
}

impl Validate for StartProcessArgs {
    type Output = StartProcess;

    fn validate(self, config: &Config) -> Result<StartProcess, ValidationError> {
        min_len("object_uris", &self.object_uris, 1)?;
        Ok(StartProcess {
            tenant: tenant(config, self.tenant_id)?,
            process_type: non_empty("process_type", &self.process_type)?,
            object_uris: self.object_uris,
            comment: optional_text(self.comment),
            variables: self.variables.filter(|variables| !variables.is_empty()),
        })
    }
}

/// Handle the `start_process_instance` tool.
pub(crate) async fn start_process_instance(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<StartProcessArgs>(arguments, client.config())?;

    let mut body = Map::new();
    body.insert("processType".into(), json!(request.process_type));
    body.insert("objectURIs".into(), json!(request.object_uris));
    if let Some(comment) = &request.comment {
        body.insert("comment".into(), json!(comment));
    }
    if let Some(variables) = &request.variables {
        body.insert("variables".into(), Value::Object(variables.clone()));
    }

    let response = with_environment(
        client,
        client.post(client.process_url(&request.tenant, "processInstances")),
    )
    .global_id()
    .json(Value::Object(body))
    .send()
    .await
    .or_tool_error("starting process instance")
    .map_err(|err| {
        err.when_not_found(|| {
            format!(
                "Process type '{}' not found or invalid",
                request.process_type
            )
        })
    })?;

    let instance_id = response
        .get("processInstanceId")
        .cloned()
        .unwrap_or_else(|| json!(""));

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::WorkflowTasks,
            format!(
                "Started process instance {instance_id} of type {} for {} objects",
                request.process_type,
                request.object_uris.len()
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(json!({
        "processInstanceId": instance_id,
        "processType": request.process_type,
        "objectURIs": request.object_uris,
        "status": response.get("status").cloned().unwrap_or_else(|| json!("STARTED")),
    })))
}

/// Arguments of `execute_task_action`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct TaskActionArgs {
    /// Task to act on.
    task_id: String,
    /// Action name, e.g. `Approve` or `Reject`.
    action: String,
    /// Comment stored on the process instance.
    #[serde(default)]
    process_instance_comment: Option<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct TaskAction {
    tenant: String,
    task_id: String,
    action: String,
    comment: Option<String>,
}

impl Validate for TaskActionArgs {
    type Output = TaskAction;

    fn validate(self, config: &Config) -> Result<TaskAction, ValidationError> {
        Ok(TaskAction {
            tenant: tenant(config, self.tenant_id)?,
            task_id: TASK_ID.apply("task_id", &self.task_id)?,
            action: non_empty("action", &self.action)?,
            comment: optional_text(self.process_instance_comment),
        })
    }
}

/// Handle the `execute_task_action` tool.
pub(crate) async fn execute_task_action(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<TaskActionArgs>(arguments, client.config())?;

    let mut body = Map::new();
    body.insert("action".into(), json!(request.action));
    if let Some(comment) = &request.comment {
        body.insert("processInstanceComment".into(), json!(comment));
    }

    let response = with_environment(
        client,
        client.post(client.workflow_url(
            &request.tenant,
            &format!("tasks/{}/_action", request.task_id),
        )),
    )
    .global_id()
    .json(Value::Object(body))
    .send()
    .await
    .or_tool_error("executing task action")
    .map_err(|err| {
        err.when_not_found(|| format!("Task '{}' not found or invalid", request.task_id))
    })?;

    let status = response
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();
    let mut result = Map::new();
    result.insert("taskId".into(), json!(request.task_id));
    result.insert("action".into(), json!(request.action));
    result.insert("status".into(), json!(status));
    result.insert("success".into(), json!(is_ok(&response)));
    if let Some(comment) = &request.comment {
        result.insert("comment".into(), json!(comment));
    }

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::WorkflowTasks,
            format!(
                "Executed action '{}' on task {} with status '{status}'",
                request.action, request.task_id
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(Value::Object(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::mcp::handlers::test_support::{
        arguments, plain_http_client, test_client, tokenless_client,
    };
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    #[tokio::test]
    async fn workflow_calls_without_credentials_are_authentication_errors() {
        let server = MockServer::start_async().await;
        let tasks = server
            .mock_async(|when, then| {
                when.method(POST).path("/workflow/services/workflow/t1/tasks");
                then.status(200).json_body(json!({"status": "OK", "data": []}));
            })
            .await;

        let client = tokenless_client(&server);
        let err = get_user_workflow_tasks(&client, arguments(json!({"assignee": "ana"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);
        tasks.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn workflow_calls_over_plain_http_are_security_errors() {
        let client = plain_http_client();
        let err = get_task_details(&client, arguments(json!({"task_id": "42"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SecurityError);
    }

    #[tokio::test]
    async fn user_tasks_are_summarized() {
        let server = MockServer::start_async().await;
        let tasks = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workflow/services/workflow/t1/tasks")
                    .header_exists("EnvironmentURL")
                    .json_body(json!({"assignee": "ana", "offset": 0, "max": 100}));
                then.status(200).json_body(json!({
                    "status": "OK",
                    "total": 42,
                    "offset": 0,
                    "data": [{"taskId": "9", "taskType": "dcrReview", "assignee": "ana", "extra": 1}]
                }));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_user_workflow_tasks(
            &client,
            arguments(json!({"assignee": "ana", "max_results": 500})),
        )
        .await
        .unwrap();
        tasks.assert();
        let value = outcome.value();
        assert_eq!(value["total_tasks"], 42);
        assert_eq!(value["returned_count"], 1);
        assert_eq!(value["tasks"][0]["taskType"], "dcrReview");
        assert_eq!(value["tasks"][0]["objectURIs"], json!([]));
        assert!(value["tasks"][0].get("extra").is_none());
    }

    #[tokio::test]
    async fn reassignment_reports_success() {
        let server = MockServer::start_async().await;
        let reassign = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/workflow/services/workflow/t1/tasks")
                    .json_body(json!([{"taskId": "123", "assignee": "bo"}]));
                then.status(200).json_body(json!({"status": "ok"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = reassign_workflow_task(
            &client,
            arguments(json!({"task_id": "123", "assignee": "bo"})),
        )
        .await
        .unwrap();
        reassign.assert();
        assert_eq!(outcome.value()["success"], true);
    }

    #[test]
    fn assignee_scopes_are_exclusive() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        let parse = |value: Value| {
            serde_json::from_value::<PossibleAssigneesArgs>(value)
                .unwrap()
                .validate(&config)
        };
        assert!(parse(json!({"tasks": ["1"], "task_filter": {"assignee": "ana"}})).is_err());
        assert!(parse(json!({"tasks": ["1"], "exclude": ["2"]})).is_err());
        assert!(parse(json!({})).is_err());
        assert!(parse(json!({"tasks": [], "task_filter": {}})).is_err());

        let by_tasks = parse(json!({"tasks": ["1", "2"]})).unwrap();
        assert_eq!(by_tasks.scope.body(), json!({"tasks": ["1", "2"]}));
        let by_exclude = parse(json!({"exclude": ["3"]})).unwrap();
        assert_eq!(by_exclude.scope.body(), json!({"filter": {}, "exclude": ["3"]}));
    }

    #[tokio::test]
    async fn possible_assignees_echo_request_and_warning() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workflow/services/workflow/t1/assignee")
                    .json_body(json!({"filter": {"processType": "dcr"}}));
                then.status(200).json_body(json!({
                    "status": "OK",
                    "data": ["ana", "bo"],
                    "total": 2,
                    "warning": "partial"
                }));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_possible_assignees(
            &client,
            arguments(json!({"task_filter": {"processType": "dcr"}})),
        )
        .await
        .unwrap();
        let value = outcome.value();
        assert_eq!(value["total"], 2);
        assert_eq!(value["warning"], "partial");
        assert_eq!(value["request_parameters"]["tasks"], Value::Null);
        assert_eq!(
            value["request_parameters"]["filter"],
            json!({"processType": "dcr"})
        );
    }

    #[test]
    fn retrieve_body_keeps_defaults_and_drops_absent_fields() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        let request = serde_json::from_value::<RetrieveTasksArgs>(json!({
            "assignee": "none",
            "priority_class": "High",
            "created_after": 5
        }))
        .unwrap()
        .validate(&config)
        .unwrap();
        assert_eq!(
            Value::Object(request.body),
            json!({
                "assignee": "none",
                "offset": 0,
                "max": 10,
                "priorityClass": "High",
                "orderBy": "createTime",
                "ascending": false,
                "createdAfter": 5,
                "state": "valid",
                "showTaskVariables": false,
                "showTaskLocalVariables": false
            })
        );
    }

    #[test]
    fn retrieve_rejects_bad_enums_windows_and_pages() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        for args in [
            json!({"priority_class": "urgent"}),
            json!({"order_by": "name"}),
            json!({"state": "open"}),
            json!({"created_after": 10, "created_before": 10}),
            json!({"offset": 9950, "max_results": 100}),
            json!({"max_results": 0}),
        ] {
            let result = serde_json::from_value::<RetrieveTasksArgs>(args.clone())
                .unwrap()
                .validate(&config);
            assert!(result.is_err(), "{args}");
        }
    }

    #[tokio::test]
    async fn failed_status_is_passed_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workflow/services/workflow/t1/tasks")
                    .query_param("checkAccess", "true");
                then.status(200).json_body(json!({
                    "status": "failed",
                    "error": {"errorCode": "WF-1", "errorMessage": "nope"},
                    "data": []
                }));
            })
            .await;

        let client = test_client(&server);
        let outcome = retrieve_tasks(&client, arguments(json!({}))).await.unwrap();
        assert_eq!(
            outcome.value(),
            &json!({"status": "failed", "error": {"errorCode": "WF-1", "errorMessage": "nope"}})
        );
    }

    #[tokio::test]
    async fn task_details_request_variables_on_demand() {
        let server = MockServer::start_async().await;
        let details = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/workflow/services/workflow/t1/tasks/77")
                    .query_param("showTaskVariables", "true");
                then.status(200)
                    .json_body(json!({"status": "OK", "taskId": "77", "displayName": "Review"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_task_details(
            &client,
            arguments(json!({"task_id": "77", "show_task_variables": true})),
        )
        .await
        .unwrap();
        details.assert();
        assert_eq!(outcome.value()["displayName"], "Review");
    }

    #[tokio::test]
    async fn missing_process_type_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/nui/workflow/workflow/t1/processInstances")
                    .header_exists("Globalid");
                then.status(404);
            })
            .await;

        let client = test_client(&server);
        let err = start_process_instance(
            &client,
            arguments(json!({"process_type": "Nope", "object_uris": ["entities/1"]})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert_eq!(err.message, "Process type 'Nope' not found or invalid");
    }

    #[tokio::test]
    async fn process_needs_objects() {
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        let err = start_process_instance(
            &client,
            arguments(json!({"process_type": "DataChangeRequest", "object_uris": []})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn task_action_conflicts_keep_their_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workflow/services/workflow/t1/tasks/5/_action")
                    .json_body(json!({"action": "Approve", "processInstanceComment": "ok"}));
                then.status(409);
            })
            .await;

        let client = test_client(&server);
        let err = execute_task_action(
            &client,
            arguments(json!({"task_id": "5", "action": "Approve", "process_instance_comment": "ok"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn task_action_reports_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/workflow/services/workflow/t1/tasks/5/_action");
                then.status(200).json_body(json!({"status": "OK"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = execute_task_action(
            &client,
            arguments(json!({"task_id": "5", "action": "Reject"})),
        )
        .await
        .unwrap();
        let value = outcome.value();
        assert_eq!(value["success"], true);
        assert!(value.get("comment").is_none());
    }
}
