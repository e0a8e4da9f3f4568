use crate::{
    core::identifiers::RunId,
    migration::{
        group::{EntityGroup, TargetScope},
        profile::MigrationProfile,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a caller hands over to start a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    #[serde(default = "RunId::generate")]
    pub run_id: RunId,
    pub profile: MigrationProfile,
    pub entity_groups: Vec<EntityGroup>,
}

/// Which remote operation a paced batch loop drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperation {
    FetchData,
    WriteData,
}

impl BatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOperation::FetchData => "fetchData",
            BatchOperation::WriteData => "writeData",
        }
    }
}

/// One paged request against the fetch or write endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(rename = "runUuid")]
    pub run_id: RunId,
    pub profile: String,
    pub gateway: String,
    pub credential_fields: serde_json::Map<String, serde_json::Value>,
    pub entity: String,
    pub offset: u64,
    pub limit: u64,
    #[serde(flatten)]
    pub scope: TargetScope,
}

/// Count query against the migration data table of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
    pub run_id: RunId,
    pub entity: String,
    /// Only rows the server has already converted.
    pub converted_only: bool,
    /// Only rows already written to the target.
    pub written_only: bool,
}

impl CountQuery {
    /// Rows converted but not necessarily written, used before the write phase.
    pub fn converted(run_id: &RunId, entity: &str) -> Self {
        Self {
            run_id: run_id.clone(),
            entity: entity.to_string(),
            converted_only: true,
            written_only: false,
        }
    }

    /// Rows converted and written, used to size the asset download.
    pub fn written(run_id: &RunId, entity: &str) -> Self {
        Self {
            written_only: true,
            ..Self::converted(run_id, entity)
        }
    }
}

/// Per-run totals persisted on the remote run record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub to_be_written: BTreeMap<String, u64>,
}

impl RunTotals {
    pub fn from_groups(groups: &[EntityGroup]) -> Self {
        let to_be_written = groups
            .iter()
            .flat_map(|g| g.entities.iter())
            .map(|e| (e.entity_name.clone(), e.entity_count))
            .collect();
        Self { to_be_written }
    }
}
