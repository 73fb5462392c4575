//! Handlers that change match state: merge, not-a-match, unmerge and merge-tree export.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    reltio::ReltioClient,
    validation::{ENTITY_ID, ValidationError, email, exact_len},
};

use super::{Output, ReltioResultExt, ToolOutcome, Validate, parse_request, tenant};

const ENTITIES_NOT_FOUND: &str = "One or more entities not found";

/// Arguments of `merge_entities`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct MergeEntitiesArgs {
    /// Exactly two entity ids, bare or as `entities/<id>`.
    entity_ids: Vec<String>,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct MergeEntities {
    tenant: String,
    entity_uris: Vec<String>,
}

impl Validate for MergeEntitiesArgs {
    type Output = MergeEntities;

    fn validate(self, config: &Config) -> Result<MergeEntities, ValidationError> {
        exact_len("entity_ids", &self.entity_ids, 2)?;
        let entity_uris = self
            .entity_ids
            .iter()
            .map(|id| ENTITY_ID.apply_uri("entity_ids", id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MergeEntities {
            tenant: tenant(config, self.tenant_id)?,
            entity_uris,
        })
    }
}

/// Handle the `merge_entities` tool.
pub(crate) async fn merge_entities(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<MergeEntitiesArgs>(arguments, client.config())?;

    let merged = client
        .post(client.api_url(&request.tenant, "entities/_same"))
        .global_id()
        .json(json!(request.entity_uris))
        .send()
        .await
        .or_tool_error("merging entities")
        .map_err(|err| err.when_not_found(|| ENTITIES_NOT_FOUND.into()))?;

    audit::record(
        client,
        &request.tenant,
        request.entity_uris.iter().fold(
            Activity::new(
                ActivityLabel::EntitiesMerged,
                format!("Merged entities {}", request.entity_uris.join(" and ")),
            ),
            |activity, uri| activity.object(uri.clone()),
        ),
    )
    .await;

    Ok(Output::Yaml(merged))
}

/// Arguments of `reject_entity_match`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RejectMatchArgs {
    /// Entity whose potential match is rejected.
    source_id: String,
    /// Entity to mark as not a match.
    target_id: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct RejectMatch {
    tenant: String,
    source_id: String,
    target_id: String,
}

impl Validate for RejectMatchArgs {
    type Output = RejectMatch;

    fn validate(self, config: &Config) -> Result<RejectMatch, ValidationError> {
        Ok(RejectMatch {
            tenant: tenant(config, self.tenant_id)?,
            source_id: ENTITY_ID.apply("source_id", &self.source_id)?,
            target_id: ENTITY_ID.apply("target_id", &self.target_id)?,
        })
    }
}

/// Handle the `reject_entity_match` tool.
pub(crate) async fn reject_entity_match(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<RejectMatchArgs>(arguments, client.config())?;
    let source_uri = format!("entities/{}", request.source_id);

    let rejected = client
        .post(client.api_url(&request.tenant, &format!("{source_uri}/_notMatch")))
        .global_id()
        .query("uri", format!("entities/{}", request.target_id))
        .send()
        .await
        .or_tool_error("rejecting entity match")
        .map_err(|err| err.when_not_found(|| ENTITIES_NOT_FOUND.into()))?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::NotMatchesSet,
            format!(
                "Marked entity {} as not a match for {}",
                request.target_id, request.source_id
            ),
        )
        .object(source_uri),
    )
    .await;

    if rejected.is_null() {
        return Ok(Output::Json(json!({
            "success": true,
            "message": format!(
                "Successfully rejected match between entities {} and {}",
                request.source_id, request.target_id
            ),
        })));
    }
    Ok(Output::Yaml(rejected))
}

/// Arguments of `export_merge_tree`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExportMergeTreeArgs {
    /// Address notified when the export job completes.
    email_id: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct ExportMergeTree {
    tenant: String,
    email: String,
}

impl Validate for ExportMergeTreeArgs {
    type Output = ExportMergeTree;

    fn validate(self, config: &Config) -> Result<ExportMergeTree, ValidationError> {
        Ok(ExportMergeTree {
            tenant: tenant(config, self.tenant_id)?,
            email: email("email_id", &self.email_id)?,
        })
    }
}

/// Handle the `export_merge_tree` tool.
///
/// Schedules an asynchronous export job; the response only carries the job status.
pub(crate) async fn export_merge_tree(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<ExportMergeTreeArgs>(arguments, client.config())?;

    let job = client
        .post(client.export_url(&request.tenant, "entities/_crosswalksTree"))
        .query("email", &request.email)
        .json(json!({ "outputAsJsonArray": true }))
        .send()
        .await
        .or_tool_error("scheduling the merge tree export job")?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::EntityMergeTreeExport,
            format!(
                "Scheduled merge tree export for all entities in tenant {}",
                request.tenant
            ),
        ),
    )
    .await;

    Ok(Output::Yaml(job))
}

/// Arguments of `unmerge_entity`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct UnmergeEntityArgs {
    /// Merged entity the contributor is split from.
    origin_entity_id: String,
    /// Contributor entity to split off.
    contributor_entity_id: String,
    /// Also split every profile merged beneath the contributor.
    #[serde(default)]
    tree: bool,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UnmergeEntity {
    tenant: String,
    origin_id: String,
    contributor_id: String,
    tree: bool,
}

impl Validate for UnmergeEntityArgs {
    type Output = UnmergeEntity;

    fn validate(self, config: &Config) -> Result<UnmergeEntity, ValidationError> {
        Ok(UnmergeEntity {
            tenant: tenant(config, self.tenant_id)?,
            origin_id: ENTITY_ID.apply("origin_entity_id", &self.origin_entity_id)?,
            contributor_id: ENTITY_ID.apply("contributor_entity_id", &self.contributor_entity_id)?,
            tree: self.tree,
        })
    }
}

/// Handle the `unmerge_entity` tool.
///
/// The response carries `a` (the modified origin) and `b` (the spawned entity).
pub(crate) async fn unmerge_entity(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<UnmergeEntityArgs>(arguments, client.config())?;
    let origin_uri = format!("entities/{}", request.origin_id);
    let (endpoint, action) = if request.tree {
        ("_treeUnmerge", "tree unmerging entity")
    } else {
        ("_unmerge", "unmerging entity")
    };

    let split = client
        .post(client.api_url(&request.tenant, &format!("{origin_uri}/{endpoint}")))
        .global_id()
        .query("contributorURI", format!("entities/{}", request.contributor_id))
        .send()
        .await
        .or_tool_error(action)
        .map_err(|err| err.when_not_found(|| ENTITIES_NOT_FOUND.into()))?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::EntitiesUnmerged,
            format!(
                "Unmerged contributor {} from entity {}{}",
                request.contributor_id,
                request.origin_id,
                if request.tree { " with its merge tree" } else { "" }
            ),
        )
        .object(origin_uri),
    )
    .await;

    Ok(Output::Yaml(split))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorCode,
        mcp::handlers::test_support::{arguments, test_client},
    };
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn merge_sends_prefixed_uris() {
        let server = MockServer::start_async().await;
        let same = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/entities/_same")
                    .header_exists("Globalid")
                    .json_body(json!(["entities/123abc", "entities/456def"]));
                then.status(200).json_body(json!({"uri": "entities/123abc"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = merge_entities(
            &client,
            arguments(json!({"entity_ids": ["123abc", "entities/456def"]})),
        )
        .await
        .expect("merge succeeds");
        same.assert();
        assert_eq!(outcome.value()["uri"], "entities/123abc");
    }

    #[tokio::test]
    async fn merge_requires_exactly_two_ids() {
        let server = MockServer::start_async().await;
        let client = test_client(&server);
        for ids in [json!(["a"]), json!(["a", "b", "c"])] {
            let err = merge_entities(&client, arguments(json!({"entity_ids": ids})))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn merge_reports_missing_entities() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/reltio/api/t1/entities/_same");
                then.status(404).body("{}");
            })
            .await;

        let client = test_client(&server);
        let err = merge_entities(&client, arguments(json!({"entity_ids": ["a1", "b2"]})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert_eq!(err.message, ENTITIES_NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_reject_response_is_a_success() {
        let server = MockServer::start_async().await;
        let not_match = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/entities/src1/_notMatch")
                    .query_param("uri", "entities/tgt2");
                then.status(200).body("");
            })
            .await;

        let client = test_client(&server);
        let outcome = reject_entity_match(
            &client,
            arguments(json!({"source_id": "entities/src1", "target_id": "tgt2"})),
        )
        .await
        .unwrap();
        not_match.assert();
        assert_eq!(outcome.value()["success"], true);
        assert_eq!(
            outcome.value()["message"],
            "Successfully rejected match between entities src1 and tgt2"
        );
    }

    #[tokio::test]
    async fn tree_flag_selects_tree_unmerge() {
        let server = MockServer::start_async().await;
        let tree = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/entities/o1/_treeUnmerge")
                    .query_param("contributorURI", "entities/c1");
                then.status(200)
                    .json_body(json!({"a": {"uri": "entities/o1"}, "b": {"uri": "entities/c1"}}));
            })
            .await;

        let client = test_client(&server);
        let outcome = unmerge_entity(
            &client,
            arguments(json!({"origin_entity_id": "o1", "contributor_entity_id": "c1", "tree": true})),
        )
        .await
        .unwrap();
        tree.assert();
        assert_eq!(outcome.value()["b"]["uri"], "entities/c1");
    }

    #[tokio::test]
    async fn export_posts_to_export_service() {
        let server = MockServer::start_async().await;
        let export = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/jobs/export/t1/entities/_crosswalksTree")
                    .query_param("email", "ops@example.com")
                    .json_body(json!({"outputAsJsonArray": true}));
                then.status(200).json_body(json!({"status": "scheduled"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = export_merge_tree(&client, arguments(json!({"email_id": "ops@example.com"})))
            .await
            .unwrap();
        export.assert();
        assert_eq!(outcome.value()["status"], "scheduled");
    }

    #[test]
    fn export_rejects_malformed_email() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        let args: ExportMergeTreeArgs =
            serde_json::from_value(json!({"email_id": "nobody"})).unwrap();
        assert!(args.validate(&config).is_err());
    }
}
