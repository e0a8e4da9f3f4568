use crate::core::utils::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle of a single asset inside the download workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetState {
    InProgress,
    Finished,
}

/// Opaque per-asset data the remote side attaches. `uri` is the only key
/// the client reads, as a human readable locator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One asset in flight. The remote side advances `current_offset`, flips
/// `state` and bumps `error_count`; the client only reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetWorkItem {
    pub uuid: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_offset: u64,
    pub state: AssetState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_data: AssetMetadata,
}

impl AssetWorkItem {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            current_offset: 0,
            state: AssetState::InProgress,
            error_count: 0,
            additional_data: AssetMetadata::default(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == AssetState::Finished
    }

    /// True once the item failed more often than the budget allows.
    pub fn exceeds_error_budget(&self, threshold: u32) -> bool {
        self.error_count > threshold
    }

    /// Locator used in error messages, falling back to the uuid.
    pub fn locator(&self) -> String {
        self.additional_data
            .uri
            .clone()
            .unwrap_or_else(|| self.uuid.to_string())
    }
}
