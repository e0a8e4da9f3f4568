use crate::{
    core::identifiers::RunId,
    migration::{group::EntityGroup, status::MigrationStatus},
};
use serde::Serialize;
use std::fmt::Debug;

/// A trait for events that can be published on the EventBus.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

/// Emitted on every phase transition of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub run_id: RunId,
    pub status: MigrationStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for StatusChanged {
    fn event_type(&self) -> &'static str {
        "migration.status"
    }
}

/// Emitted after every paced request and every asset download round.
///
/// `entity_group_progress_value` is cumulative within the group and
/// `entity_count` is the group total, so a consumer can render one bar per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdated {
    pub run_id: RunId,
    pub entity_name: String,
    pub entity_group_progress_value: u64,
    pub entity_count: u64,
}

impl Event for ProgressUpdated {
    fn event_type(&self) -> &'static str {
        "migration.progress"
    }
}

/// Emitted once per run, after the counts were refreshed for the write phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCountsUpdated {
    pub run_id: RunId,
    pub entity_groups: Vec<EntityGroup>,
}

impl Event for EntityCountsUpdated {
    fn event_type(&self) -> &'static str {
        "migration.entity_count"
    }
}
