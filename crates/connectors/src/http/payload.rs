use engine_core::error::GatewayError;
use model::{
    assets::workload::AssetWorkItem,
    migration::{
        errors::MigrationErrorRecord,
        request::{CountQuery, RunTotals},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub(crate) struct AssetIdRequest<'a> {
    pub profile: &'a str,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssetIdPage {
    #[serde(default)]
    pub media_uuids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadRequest<'a> {
    pub workload: &'a [AssetWorkItem],
    pub file_chunk_byte_size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadResponse {
    pub workload: Vec<AssetWorkItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<MigrationErrorRecord>,
}

/// Descriptors carried by an error response. Bodies that are not JSON or
/// carry no `errors` array yield nothing.
pub(crate) fn error_records(body: &[u8]) -> Vec<MigrationErrorRecord> {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default()
}

fn equals(field: &str, value: Value) -> Value {
    json!({ "type": "equals", "field": field, "value": value })
}

/// Search criteria counting the migration data rows of one entity in a run.
pub(crate) fn count_criteria(query: &CountQuery) -> Value {
    let mut filter = vec![
        equals("runId", json!(query.run_id.as_str())),
        equals("entity", json!(query.entity)),
    ];
    if query.converted_only {
        filter.push(json!({
            "type": "not",
            "operator": "AND",
            "queries": [equals("converted", Value::Null)]
        }));
    }
    if query.written_only {
        filter.push(equals("written", json!(true)));
    }

    json!({
        "limit": 1,
        "filter": [{ "type": "multi", "operator": "AND", "queries": filter }],
        "aggregations": [{
            "name": query.entity,
            "type": "count",
            "field": "swag_migration_data.entity"
        }]
    })
}

/// Reads `aggregations.<entity>.count`, which may be a number or a numeric string.
pub(crate) fn parse_count(body: &Value, entity: &str) -> Result<u64, GatewayError> {
    let count = body
        .get("aggregations")
        .and_then(|a| a.get(entity))
        .and_then(|a| a.get("count"))
        .ok_or_else(|| GatewayError::Decode(format!("missing count aggregation for '{entity}'")))?;

    match count {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| GatewayError::Decode(format!("count '{n}' is not a natural number"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| GatewayError::Decode(format!("count '{s}' is not a number"))),
        other => Err(GatewayError::Decode(format!("unexpected count value {other}"))),
    }
}

/// Existing `totals` object of a run record, wherever the API put it.
pub(crate) fn run_totals(body: &Value) -> Map<String, Value> {
    let data = body.get("data");
    data.and_then(|d| d.get("totals"))
        .or_else(|| data.and_then(|d| d.get("attributes")).and_then(|a| a.get("totals")))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Replaces `toBeWritten` and keeps every other key of the stored totals.
pub(crate) fn merge_totals(
    mut existing: Map<String, Value>,
    totals: &RunTotals,
) -> Result<Value, GatewayError> {
    let to_be_written = serde_json::to_value(&totals.to_be_written)
        .map_err(|e| GatewayError::Decode(e.to_string()))?;
    existing.insert("toBeWritten".to_string(), to_be_written);
    Ok(json!({ "totals": existing }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::RunId;

    #[test]
    fn written_count_adds_written_filter() {
        let run = RunId::new("run-1");
        let converted = count_criteria(&CountQuery::converted(&run, "product"));
        let written = count_criteria(&CountQuery::written(&run, "media"));

        let queries = |v: &Value| v["filter"][0]["queries"].as_array().unwrap().len();
        assert_eq!(queries(&converted), 3);
        assert_eq!(queries(&written), 4);
        assert_eq!(written["aggregations"][0]["name"], "media");
    }

    #[test]
    fn count_accepts_numbers_and_strings() {
        let body = json!({ "aggregations": { "product": { "count": "120" } } });
        assert_eq!(parse_count(&body, "product").unwrap(), 120);

        let body = json!({ "aggregations": { "product": { "count": 7 } } });
        assert_eq!(parse_count(&body, "product").unwrap(), 7);

        let body = json!({ "aggregations": {} });
        assert!(matches!(
            parse_count(&body, "product"),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn merge_keeps_other_totals() {
        let body = json!({ "data": { "totals": { "toBeFetched": { "product": 3 } } } });
        let mut totals = RunTotals::default();
        totals.to_be_written.insert("product".into(), 2);

        let merged = merge_totals(run_totals(&body), &totals).unwrap();
        assert_eq!(merged["totals"]["toBeFetched"]["product"], 3);
        assert_eq!(merged["totals"]["toBeWritten"]["product"], 2);
    }

    #[test]
    fn error_body_is_best_effort() {
        let body = br#"{ "errors": [{ "code": "X", "status": "500", "title": "t", "detail": "d" }] }"#;
        assert_eq!(error_records(body).len(), 1);
        assert!(error_records(b"<html>oops</html>").is_empty());
        assert!(error_records(b"{}").is_empty());
    }
}
