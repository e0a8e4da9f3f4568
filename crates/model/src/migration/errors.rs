use crate::core::utils::string_or_number;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const SYNTHETIC_CODE: &str = "0";
const SYNTHETIC_STATUS: &str = "444";

/// Error descriptor collected during a run.
///
/// Descriptors coming from the remote side are kept verbatim, unknown keys
/// included. Client-side failures are described with the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationErrorRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub trace: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MigrationErrorRecord {
    fn synthetic(title: &str, detail: String, information: Option<String>) -> Self {
        Self {
            code: SYNTHETIC_CODE.to_string(),
            status: SYNTHETIC_STATUS.to_string(),
            title: title.to_string(),
            detail,
            information,
            path: None,
            trace: Vec::new(),
            extra: Map::new(),
        }
    }

    /// A batch request got no response at all.
    pub fn cannot_reach_server(entity: &str, offset: u64) -> Self {
        Self::synthetic(
            "Cannot connect to server",
            "The server did not answer the migration request.".to_string(),
            Some(format!("Request for entity '{entity}' at offset {offset} failed")),
        )
    }

    /// An asset exhausted its error budget and was dropped from the download.
    pub fn cannot_download_asset(locator: &str) -> Self {
        let mut record = Self::synthetic(
            "Cannot download asset",
            "The asset could not be downloaded and was skipped.".to_string(),
            Some(format!("Failed to download {locator}")),
        );
        record.path = Some(locator.to_string());
        record
    }

    /// The download phase gave up after repeated transport failures.
    pub fn asset_downloads_aborted(failures: u32, remaining: u64) -> Self {
        Self::synthetic(
            "Asset download aborted",
            format!("The server did not answer {failures} consecutive download requests."),
            Some(format!("{remaining} assets were not downloaded")),
        )
    }

    /// The pre-write count query failed for an entity.
    pub fn count_unavailable(entity: &str) -> Self {
        Self::synthetic(
            "Cannot count entity",
            "The number of converted records could not be determined.".to_string(),
            Some(format!("Entity '{entity}' was skipped in the write phase")),
        )
    }

    pub fn is_synthetic(&self) -> bool {
        self.code == SYNTHETIC_CODE && self.status == SYNTHETIC_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_descriptor_roundtrips_verbatim() {
        let raw = serde_json::json!({
            "code": "SWAG_MIGRATION__ENTITY_UNKNOWN",
            "status": 400,
            "title": "Bad Request",
            "detail": "Entity unknown",
            "meta": { "parameters": { "entity": "foo" } }
        });

        let record: MigrationErrorRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.status, "400");
        assert_eq!(record.extra["meta"], raw["meta"]);
        assert!(!record.is_synthetic());

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["meta"], raw["meta"]);
        assert_eq!(back["code"], raw["code"]);
    }

    #[test]
    fn asset_record_carries_locator() {
        let record = MigrationErrorRecord::cannot_download_asset("http://old.shop/media/a.jpg");
        assert!(record.is_synthetic());
        assert_eq!(record.path.as_deref(), Some("http://old.shop/media/a.jpg"));
        assert!(
            record
                .information
                .as_deref()
                .unwrap()
                .contains("http://old.shop/media/a.jpg")
        );
    }
}
