//! Handler for listing RDM lookup values.

use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    audit::{self, Activity, ActivityLabel},
    config::Config,
    reltio::ReltioClient,
    validation::{Range, ValidationError, non_empty},
};

use super::{Output, ReltioResultExt, ToolOutcome, Validate, parse_request, tenant};

const LOOKUP_TYPE_PREFIX: &str = "rdm/lookupTypes/";

fn default_lookup_max() -> i64 {
    10
}

/// Arguments of `rdm_lookups_list`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct LookupListArgs {
    /// RDM lookup type, e.g. `rdm/lookupTypes/VistaVegetarianOrVegan`.
    lookup_type: String,
    /// Page size, 1..=10.
    #[serde(default = "default_lookup_max")]
    max_results: i64,
    /// Only lookups whose display name starts with this prefix.
    #[serde(default)]
    display_name_prefix: String,
    /// Tenant; defaults to the configured tenant.
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct LookupList {
    tenant: String,
    lookup_type: String,
    max: i64,
    display_name_prefix: String,
}

impl Validate for LookupListArgs {
    type Output = LookupList;

    fn validate(self, config: &Config) -> Result<LookupList, ValidationError> {
        let lookup_type = non_empty("lookup_type", &self.lookup_type)?;
        if !lookup_type.starts_with(LOOKUP_TYPE_PREFIX) {
            return Err(ValidationError::new(
                "lookup_type",
                format!("must start with '{LOOKUP_TYPE_PREFIX}'"),
            ));
        }
        Ok(LookupList {
            tenant: tenant(config, self.tenant_id)?,
            lookup_type,
            max: Range::new(1, 10).check("max_results", self.max_results)?,
            display_name_prefix: self.display_name_prefix.trim().to_string(),
        })
    }
}

/// Handle the `rdm_lookups_list` tool.
pub(crate) async fn rdm_lookups_list(
    client: &ReltioClient,
    arguments: Option<JsonObject>,
) -> ToolOutcome {
    let request = parse_request::<LookupListArgs>(arguments, client.config())?;

    let lookups = client
        .post(client.api_url(&request.tenant, "lookups/list"))
        .json(json!({
            "type": request.lookup_type,
            "max": request.max,
            "displayNamePrefix": request.display_name_prefix,
        }))
        .send()
        .await
        .or_tool_error("retrieving lookups")?;

    let found = lookups.as_array().map_or(0, Vec::len);
    audit::record(
        client,
        &request.tenant,
        Activity::new(
            ActivityLabel::LookupList,
            match found {
                0 => format!("Listed lookups for {}: no lookups found", request.lookup_type),
                n => format!("Listed lookups for {}: {n} lookups found", request.lookup_type),
            },
        ),
    )
    .await;

    Ok(Output::Yaml(if lookups.is_null() {
        Value::Array(Vec::new())
    } else {
        lookups
    }))
}
