//! Handlers for match lookups: transitive matches, match history and potential-match search.

use std::collections::BTreeMap;

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    error::{ErrorCode, ToolError},
    normalize::{filter_entity, format_entity_matches, is_present, simplify_attributes, slim_crosswalks, tail_segment},
    reltio::ReltioClient,
    validation::{
        BALANCED_FILTER, ENTITY_ID, OneOf, Page, Range, ValidationError, bounded, non_empty, page,
        sanitize,
    },
};

use super::{Output, ReltioResultExt, ToolOutcome, Validate, parse_request, tenant};

/// Page ceiling for potential-match searches.
const POTENTIAL_MATCH_PAGE_CEILING: i64 = 10;
/// Limit used to approximate the total number of transitive matches.
const TOTAL_MATCHES_PROBE_LIMIT: u32 = 1000;

static SEARCH_TYPE: OneOf = OneOf::exact(&["match_rule", "score", "confidence"]);

fn default_match_results() -> i64 {
    25
}

/// Arguments of `get_entity_matches`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetEntityMatchesArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Maximum matches to return; clamped to 1..=the configured limit.
    #[serde(default = "default_match_results")]
    max_results: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GetEntityMatches {
    tenant: String,
    entity_id: String,
    limit: i64,
}

impl Validate for GetEntityMatchesArgs {
    type Output = GetEntityMatches;

    fn validate(self, config: &Config) -> Result<GetEntityMatches, ValidationError> {
        Ok(GetEntityMatches {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            limit: Range::new(1, i64::from(config.max_results_limit)).clamp(self.max_results),
        })
    }
}

/// Handle the `get_entity_matches` tool.
pub(crate) async fn get_entity_matches(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<GetEntityMatchesArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let matches = client
        .get(client.api_url(&request.tenant, &format!("{uri}/_transitiveMatches")))
        .query("deep", 1)
        .query("markMatchedValues", "true")
        .query("sort", "score")
        .query("order", "desc")
        .query("activeness", "active")
        .query("limit", request.limit)
        .send()
        .await
        .or_tool_error("retrieving entity matches")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;

    let records = matches.as_array().cloned().unwrap_or_default();
    if records.is_empty() {
        return Ok(Output::Json(json!({
            "message": format!("No potential matches found for entity {}.", request.entity_id),
            "matches": [],
        })));
    }

    let source = match client.get(client.api_url(&request.tenant, &uri)).send().await {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(entity_id = %request.entity_id, error = %err, "Source entity lookup failed");
            return Ok(Output::Json(json!({
                "message": format!(
                    "Found matches but could not retrieve source entity details: {err}"
                ),
                "matches": matches,
            })));
        }
    };

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::PotentialMatchesFound,
            format!(
                "Fetched potential matches for entity {}, label: {}",
                request.entity_id,
                source.get("label").and_then(Value::as_str).unwrap_or_default()
            ),
        )
        .object(uri),
    )
    .await;

    Ok(Output::Yaml(json!({
        "source_entity": request.entity_id,
        "matches": format_entity_matches(&records, None),
    })))
}

/// Arguments of `get_entity_match_history`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityIdArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct EntityRef {
    tenant: String,
    entity_id: String,
}

impl Validate for EntityIdArgs {
    type Output = EntityRef;

    fn validate(self, config: &Config) -> Result<EntityRef, ValidationError> {
        Ok(EntityRef {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
        })
    }
}

/// Handle the `get_entity_match_history` tool.
pub(crate) async fn get_entity_match_history(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<EntityIdArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);

    let history = client
        .get(client.api_url(&request.tenant, &format!("{uri}/_crosswalkTree")))
        .send()
        .await
        .or_tool_error("retrieving match history")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;

    if !is_present(&history) {
        return Ok(Output::Json(json!({
            "message": format!("No match history found for entity {}.", request.entity_id),
            "match_history": [],
        })));
    }

    let source = match client.get(client.api_url(&request.tenant, &uri)).send().await {
        Ok(source) => source,
        Err(err) => {
            return Ok(Output::Json(json!({
                "message": format!(
                    "Found match history but could not retrieve source entity details: {err}"
                ),
                "match_history": history,
            })));
        }
    };

    let crosswalk_uris: Vec<&str> = history
        .get("crosswalks")
        .and_then(Value::as_array)
        .map(|crosswalks| {
            crosswalks
                .iter()
                .filter_map(|crosswalk| crosswalk.get("uri").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::EntityMatchHistory,
            format!(
                "Fetched match history for entity {}, label: {}, crosswalk URIs: {}",
                request.entity_id,
                source.get("label").and_then(Value::as_str).unwrap_or_default(),
                crosswalk_uris.join(", ")
            ),
        )
        .object(uri),
    )
    .await;

    Ok(Output::Yaml(history))
}

fn default_match_limit() -> i64 {
    5
}

fn default_true() -> bool {
    true
}

/// Arguments of `get_entity_with_matches`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetEntityWithMatchesArgs {
    /// Entity id, bare or as `entities/<id>`.
    entity_id: String,
    /// Source attributes to return; all when empty.
    #[serde(default)]
    attributes: Vec<String>,
    /// Fetch and attach attributes of each matched entity.
    #[serde(default = "default_true")]
    include_match_attributes: bool,
    /// Attributes to return for matched entities; all when empty.
    #[serde(default)]
    match_attributes: Vec<String>,
    /// Number of matches to return, 1..=5.
    #[serde(default = "default_match_limit")]
    match_limit: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct GetEntityWithMatches {
    tenant: String,
    entity_id: String,
    attributes: Vec<String>,
    include_match_attributes: bool,
    match_attributes: Vec<String>,
    match_limit: usize,
}

impl Validate for GetEntityWithMatchesArgs {
    type Output = GetEntityWithMatches;

    fn validate(self, config: &Config) -> Result<GetEntityWithMatches, ValidationError> {
        Ok(GetEntityWithMatches {
            tenant: tenant(config, self.tenant_id)?,
            entity_id: ENTITY_ID.apply("entity_id", &self.entity_id)?,
            attributes: self.attributes,
            include_match_attributes: self.include_match_attributes,
            match_attributes: self.match_attributes,
            match_limit: Range::new(1, 5).check("match_limit", self.match_limit)? as usize,
        })
    }
}

fn attribute_filter(attributes: &[String]) -> Option<BTreeMap<String, Vec<String>>> {
    (!attributes.is_empty())
        .then(|| BTreeMap::from([("attributes".to_string(), attributes.to_vec())]))
}

/// Handle the `get_entity_with_matches` tool.
///
/// `total_matches` comes from a second transitive-match lookup capped at 1000 records, so it is
/// a lower bound rather than an exact count.
pub(crate) async fn get_entity_with_matches(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<GetEntityWithMatchesArgs>(arguments, client.config())?;
    let uri = format!("entities/{}", request.entity_id);
    let matches_url = client.api_url(&request.tenant, &format!("{uri}/_transitiveMatches"));

    let source = client
        .get(client.api_url(&request.tenant, &uri))
        .send()
        .await
        .or_tool_error("retrieving source entity")
        .map_err(|err| {
            err.when_not_found(|| format!("Entity with ID {} not found", request.entity_id))
        })?;
    let Some(source) = source.as_object() else {
        return Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            "Entity response was not a JSON object",
        ));
    };

    let mut matches = match client
        .get(matches_url.clone())
        .query("deep", 1)
        .query("markMatchedValues", "true")
        .query("sort", "relevance")
        .query("order", "desc")
        .query("activeness", "active")
        .query("limit", request.match_limit)
        .send()
        .await
    {
        Ok(value) => value.as_array().cloned().unwrap_or_default(),
        Err(err) => {
            tracing::warn!(entity_id = %request.entity_id, error = %err, "Transitive match lookup failed");
            Vec::new()
        }
    };
    matches.truncate(request.match_limit);

    let total_matches = match client
        .get(matches_url)
        .query("deep", 1)
        .query("markMatchedValues", "true")
        .query("activeness", "active")
        .query("limit", TOTAL_MATCHES_PROBE_LIMIT)
        .send()
        .await
    {
        Ok(value) => value.as_array().map_or(0, Vec::len),
        Err(err) => {
            tracing::warn!(entity_id = %request.entity_id, error = %err, "Match count lookup failed");
            matches.len()
        }
    };

    let mut enrichment = Map::new();
    if request.include_match_attributes {
        let match_filter = attribute_filter(&request.match_attributes);
        for record in &matches {
            let Some(match_uri) = record.pointer("/object/uri").and_then(Value::as_str) else {
                continue;
            };
            let path = format!("entities/{}", tail_segment(match_uri));
            match client.get(client.api_url(&request.tenant, &path)).send().await {
                Ok(Value::Object(entity)) => {
                    enrichment.insert(
                        match_uri.to_string(),
                        Value::Object(filter_entity(&entity, match_filter.as_ref())),
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(match_uri, error = %err, "Skipping match enrichment");
                }
            }
        }
    }

    let filtered = filter_entity(source, attribute_filter(&request.attributes).as_ref());
    let label = source.get("label").cloned().unwrap_or_else(|| json!(""));
    let mut source_entity = Map::new();
    source_entity.insert("uri".into(), Value::String(uri.clone()));
    source_entity.insert("label".into(), label.clone());
    source_entity.insert(
        "attributes".into(),
        simplify_attributes(filtered.get("attributes").unwrap_or(&Value::Null), false),
    );
    if let Some(crosswalks) = filtered.get("crosswalks") {
        source_entity.insert(
            "crosswalks".into(),
            Value::Array(slim_crosswalks(crosswalks, false)),
        );
    }

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::PotentialMatchesFound,
            json!({ "uri": uri, "label": label, "total_matches": total_matches }).to_string(),
        )
        .object(uri.clone()),
    )
    .await;

    let enrichment = request.include_match_attributes.then_some(&enrichment);
    Ok(Output::Yaml(json!({
        "source_entity": source_entity,
        "matches": format_entity_matches(&matches, enrichment),
        "total_matches": total_matches,
        "total_is_approximate": true,
    })))
}

fn default_search_type() -> String {
    "match_rule".into()
}

fn default_individual() -> String {
    "Individual".into()
}

fn default_page_size() -> i64 {
    10
}

/// Arguments of `find_potential_matches`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct FindPotentialMatchesArgs {
    /// `match_rule` (default), `score` or `confidence`.
    #[serde(default = "default_search_type")]
    search_type: String,
    /// Match rule id (e.g. `BaseRule05`), a `start,end` score range between 0 and 100
    /// (e.g. `50,100`), or a confidence label (e.g. `High confidence`).
    filter: String,
    /// Entity type in PascalCase.
    #[serde(default = "default_individual")]
    entity_type: String,
    /// Page size; clamped to 1..=10.
    #[serde(default = "default_page_size")]
    max_results: i64,
    /// Zero-based start index.
    #[serde(default)]
    offset: i64,
    /// Extra filter expression ANDed onto the generated one, e.g.
    /// `equals(attributes.FirstName,John)`.
    #[serde(default)]
    search_filters: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct FindPotentialMatches {
    tenant: String,
    search_type: String,
    filter: String,
    entity_type: String,
    page: Page,
    expression: String,
}

fn score_bounds(raw: &str) -> Result<(i64, i64), ValidationError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [start, end] = parts.as_slice() else {
        return Err(ValidationError::new(
            "filter",
            "For score search_type, filter must be in format 'start,end' (e.g., '50,100')",
        ));
    };
    let parse = |value: &str| {
        value.parse::<i64>().map_err(|_| {
            ValidationError::new(
                "filter",
                "For score search_type, filter must contain numeric values (e.g., '50,100')",
            )
        })
    };
    let scores = Range::new(0, 100);
    let start = scores.check("filter", parse(start)?)?;
    let end = scores.check("filter", parse(end)?)?;
    if start > end {
        return Err(ValidationError::new(
            "filter",
            "Start score must be less than or equal to end score",
        ));
    }
    Ok((start, end))
}

fn primary_clause(
    search_type: &str,
    filter: &str,
    entity_type: &str,
) -> Result<String, ValidationError> {
    Ok(match search_type {
        "score" => {
            let (start, end) = score_bounds(filter)?;
            format!(
                "range(relevanceScores.relevance,{:?},{:?})",
                start as f64 / 100.0,
                end as f64 / 100.0
            )
        }
        "confidence" => format!(
            "equals(relevanceScores.actionLabel,'{}')",
            sanitize(filter)
        ),
        _ => format!(
            "equals(matchRules,'configuration/entityTypes/{entity_type}/matchGroups/{}')",
            sanitize(tail_segment(filter))
        ),
    })
}

impl Validate for FindPotentialMatchesArgs {
    type Output = FindPotentialMatches;

    fn validate(self, config: &Config) -> Result<FindPotentialMatches, ValidationError> {
        let search_type = SEARCH_TYPE.apply("search_type", &self.search_type)?;
        let filter = non_empty("filter", &self.filter)?;
        let entity_type = sanitize(&non_empty(
            "entity_type",
            &bounded("entity_type", &self.entity_type, 200)?,
        )?);
        let max = Range::new(1, POTENTIAL_MATCH_PAGE_CEILING).clamp(self.max_results);
        let page = page(
            self.offset,
            ("max_results", max),
            Range::new(1, POTENTIAL_MATCH_PAGE_CEILING),
        )?;
        let refinement = BALANCED_FILTER.apply("search_filters", &self.search_filters)?;

        let mut parts = vec![
            primary_clause(&search_type, &filter, &entity_type)?,
            format!("equals(type,'configuration/entityTypes/{entity_type}')"),
        ];
        if !refinement.is_empty() {
            parts.push(refinement);
        }

        Ok(FindPotentialMatches {
            tenant: tenant(config, self.tenant_id)?,
            search_type,
            filter,
            entity_type,
            page,
            expression: format!("({})", parts.join(" and ")),
        })
    }
}

/// Handle the `find_potential_matches` tool.
pub(crate) async fn find_potential_matches(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<FindPotentialMatchesArgs>(arguments, client.config())?;

    let hits = client
        .post(client.api_url(&request.tenant, "entities/_search"))
        .json(json!({
            "filter": request.expression,
            "select": "uri,label,type,relevanceScores",
            "max": request.page.max,
            "offset": request.page.offset,
            "scoreEnabled": false,
            "options": "ovOnly",
            "activeness": "active",
        }))
        .send()
        .await
        .or_tool_error("searching for potential matches")?;

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::UserSearch,
            json!({
                "activity": {
                    "query": format!("filter={}", request.expression),
                    "search_type": request.search_type,
                },
                "version": "2.0",
            })
            .to_string(),
        ),
    )
    .await;

    let results: Vec<Value> = hits
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    json!({
                        "uri": hit.get("uri").cloned().unwrap_or(Value::Null),
                        "label": hit.get("label").cloned().unwrap_or(Value::Null),
                        "type": hit.get("type").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if results.is_empty() {
        return Ok(Output::Json(json!({
            "message": format!(
                "No potential matches found for entity type {} with {} filter '{}'.",
                request.entity_type, request.search_type, request.filter
            ),
            "results": [],
        })));
    }
    Ok(Output::Yaml(Value::Array(results)))
}

/// Arguments of `get_potential_matches_stats`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct PotentialMatchStatsArgs {
    /// Count only entities with more than this many potential matches.
    #[serde(default)]
    min_matches: i64,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct PotentialMatchStats {
    tenant: String,
    min_matches: i64,
}

impl Validate for PotentialMatchStatsArgs {
    type Output = PotentialMatchStats;

    fn validate(self, config: &Config) -> Result<PotentialMatchStats, ValidationError> {
        Ok(PotentialMatchStats {
            tenant: tenant(config, self.tenant_id)?,
            min_matches: Range::at_least(0).check("min_matches", self.min_matches)?,
        })
    }
}

/// Handle the `get_potential_matches_stats` tool.
pub(crate) async fn get_potential_matches_stats(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<PotentialMatchStatsArgs>(arguments, client.config())?;

    let mut facets = client
        .get(client.api_url(&request.tenant, "entities/_facets"))
        .query("filter", format!("(gt(matches,'{}'))", request.min_matches))
        .query("facet", "matchRules,type")
        .query("activeness", "active")
        .query("options", "searchByOv,ovOnly")
        .send()
        .await
        .or_tool_error("retrieving potential match statistics")?;

    let Some(type_counts) = facets.get("type").and_then(Value::as_object) else {
        return Err(ToolError::new(
            ErrorCode::UnexpectedResponse,
            "API response did not contain facet counts",
        ));
    };
    let total: i64 = type_counts.values().filter_map(Value::as_i64).sum();
    if let Some(map) = facets.as_object_mut() {
        map.insert("total_matches".into(), json!(total));
    }

    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::PotentialMatchesFound,
            format!(
                "Found {total} potential matches by type and match rule with more than {} matches",
                request.min_matches
            ),
        ),
    )
    .await;

    Ok(Output::Json(facets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::test_support::{arguments, test_client};
    use httpmock::{Method::GET, Method::POST, MockServer};

    #[tokio::test]
    async fn match_limit_is_clamped_to_configured_ceiling() {
        let server = MockServer::start_async().await;
        let low = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches")
                    .query_param("limit", "1");
                then.status(200).json_body(json!([]));
            })
            .await;
        let high = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches")
                    .query_param("limit", "100");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server);
        for max_results in [0, 10_000] {
            let outcome = get_entity_matches(
                &client,
                arguments(json!({"entity_id": "e1", "max_results": max_results})),
            )
            .await
            .expect("empty match list is a success");
            assert_eq!(outcome.value()["matches"], json!([]));
        }
        low.assert();
        high.assert();
    }

    #[tokio::test]
    async fn matches_survive_source_lookup_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches");
                then.status(200)
                    .json_body(json!([{"object": {"uri": "entities/e2"}, "label": "Twin"}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/entities/e1");
                then.status(500);
            })
            .await;

        let client = test_client(&server);
        let outcome = get_entity_matches(&client, arguments(json!({"entity_id": "e1"})))
            .await
            .expect("partial success");
        let value = outcome.value();
        assert!(value["message"].as_str().unwrap().starts_with("Found matches"));
        assert_eq!(value["matches"][0]["label"], "Twin");
    }

    #[tokio::test]
    async fn matches_are_keyed_by_uri() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches");
                then.status(200).json_body(json!([{
                    "object": {"uri": "entities/e2"},
                    "label": "Twin",
                    "matchRules": ["BaseRule01"],
                    "createdTime": 1
                }]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/entities/e1");
                then.status(200).json_body(json!({"label": "Source"}));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_entity_matches(&client, arguments(json!({"entity_id": "e1"})))
            .await
            .unwrap();
        let entry = &outcome.value()["matches"]["entities/e2"];
        assert_eq!(entry["relevance"], crate::normalize::RELEVANCE_NOT_AVAILABLE);
        assert_eq!(outcome.value()["source_entity"], "e1");
    }

    #[tokio::test]
    async fn entity_with_matches_flags_approximate_total() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/entities/e1");
                then.status(200).json_body(json!({
                    "label": "Source",
                    "attributes": {"Name": [{"value": "A"}], "Other": [{"value": "B"}]}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches")
                    .query_param("limit", "1000");
                then.status(200).json_body(json!([
                    {"object": {"uri": "entities/e2"}},
                    {"object": {"uri": "entities/e3"}},
                    {"object": {"uri": "entities/e4"}}
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/e1/_transitiveMatches")
                    .query_param("limit", "1");
                then.status(200)
                    .json_body(json!([{"object": {"uri": "entities/e2"}, "label": "Twin"}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/entities/e2");
                then.status(200)
                    .json_body(json!({"attributes": {"Name": [{"value": "A2"}]}}));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_entity_with_matches(
            &client,
            arguments(json!({"entity_id": "e1", "attributes": ["Name"], "match_limit": 1})),
        )
        .await
        .unwrap();
        let value = outcome.value();
        assert_eq!(value["total_matches"], 3);
        assert_eq!(value["total_is_approximate"], true);
        assert_eq!(value["source_entity"]["attributes"], json!({"Name": "A"}));
        assert_eq!(value["matches"]["entities/e2"]["attributes"]["Name"], "A2");
    }

    #[test]
    fn match_limit_above_five_is_rejected() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        let args: GetEntityWithMatchesArgs =
            serde_json::from_value(json!({"entity_id": "e1", "match_limit": 6})).unwrap();
        assert!(args.validate(&config).is_err());
    }

    fn potential(value: Value) -> Result<FindPotentialMatches, ValidationError> {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        serde_json::from_value::<FindPotentialMatchesArgs>(value)
            .unwrap()
            .validate(&config)
    }

    #[test]
    fn potential_match_filters_are_generated_per_search_type() {
        let rule = potential(json!({"filter": "configuration/entityTypes/Individual/matchGroups/BaseRule05"})).unwrap();
        assert_eq!(
            rule.expression,
            "(equals(matchRules,'configuration/entityTypes/Individual/matchGroups/BaseRule05') and equals(type,'configuration/entityTypes/Individual'))"
        );

        let score = potential(json!({"search_type": "score", "filter": "50, 100", "entity_type": "Organization"})).unwrap();
        assert_eq!(
            score.expression,
            "(range(relevanceScores.relevance,0.5,1.0) and equals(type,'configuration/entityTypes/Organization'))"
        );

        let confidence = potential(json!({
            "search_type": "confidence",
            "filter": "High confidence",
            "search_filters": "equals(attributes.FirstName,John)"
        }))
        .unwrap();
        assert!(confidence.expression.ends_with("and equals(attributes.FirstName,John))"));
    }

    #[test]
    fn potential_match_page_is_clamped() {
        let request = potential(json!({"filter": "BaseRule01", "max_results": 10_000})).unwrap();
        assert_eq!(request.page.max, 10);
        let request = potential(json!({"filter": "BaseRule01", "max_results": 0})).unwrap();
        assert_eq!(request.page.max, 1);
    }

    #[test]
    fn invalid_score_ranges_are_rejected() {
        for filter in ["50", "a,b", "-1,50", "80,20", "0,101"] {
            assert!(
                potential(json!({"search_type": "score", "filter": filter})).is_err(),
                "{filter}"
            );
        }
        assert!(potential(json!({"search_type": "fuzzy", "filter": "x"})).is_err());
    }

    #[tokio::test]
    async fn stats_sum_type_counts() {
        let server = MockServer::start_async().await;
        let facets = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/reltio/api/t1/entities/_facets")
                    .query_param("filter", "(gt(matches,'2'))")
                    .query_param("facet", "matchRules,type");
                then.status(200).json_body(json!({
                    "type": {"configuration/entityTypes/Individual": 4, "configuration/entityTypes/Organization": 6},
                    "matchRules": {}
                }));
            })
            .await;

        let client = test_client(&server);
        let outcome = get_potential_matches_stats(&client, arguments(json!({"min_matches": 2})))
            .await
            .unwrap();
        facets.assert();
        assert_eq!(outcome.value()["total_matches"], 10);
    }

    #[tokio::test]
    async fn potential_match_search_posts_generated_filter() {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/entities/_search")
                    .json_body_partial(r#"{"max": 10, "offset": 0, "options": "ovOnly"}"#);
                then.status(200).json_body(json!([
                    {"uri": "entities/e9", "label": "Dup", "type": "configuration/entityTypes/Individual", "relevanceScores": []}
                ]));
            })
            .await;

        let client = test_client(&server);
        let outcome = find_potential_matches(&client, arguments(json!({"filter": "BaseRule01"})))
            .await
            .unwrap();
        search.assert();
        assert_eq!(
            outcome.value(),
            &json!([{"uri": "entities/e9", "label": "Dup", "type": "configuration/entityTypes/Individual"}])
        );
    }
}
