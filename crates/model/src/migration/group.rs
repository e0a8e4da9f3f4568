use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of target a group is migrated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Catalog,
    SalesChannel,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Catalog => f.write_str("catalog"),
            TargetKind::SalesChannel => f.write_str("sales_channel"),
        }
    }
}

/// Scope attached to every batch request. Serializes to the single
/// `catalogId` / `salesChannelId` key the remote side expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetScope {
    #[serde(rename = "catalogId")]
    Catalog(String),
    #[serde(rename = "salesChannelId")]
    SalesChannel(String),
}

/// One entity kind inside a group, e.g. `product` or `customer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_name: String,
    #[serde(default)]
    pub entity_count: u64,
    #[serde(default)]
    pub progress: u64,
}

impl Entity {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            entity_name: name.into(),
            entity_count: count,
            progress: 0,
        }
    }
}

/// A user-selected bundle of entities migrated together into one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityGroup {
    pub id: String,
    pub target: TargetKind,
    pub target_id: String,
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub progress: u64,
    /// Whether migrating this group leaves binary files behind that must be downloaded.
    #[serde(default)]
    pub requires_asset_download: bool,
}

impl EntityGroup {
    pub fn new(
        id: impl Into<String>,
        target: TargetKind,
        target_id: impl Into<String>,
        entities: Vec<Entity>,
    ) -> Self {
        let mut group = Self {
            id: id.into(),
            target,
            target_id: target_id.into(),
            entities,
            count: 0,
            progress: 0,
            requires_asset_download: false,
        };
        group.recount();
        group
    }

    pub fn with_asset_download(mut self, required: bool) -> Self {
        self.requires_asset_download = required;
        self
    }

    pub fn scope(&self) -> TargetScope {
        match self.target {
            TargetKind::Catalog => TargetScope::Catalog(self.target_id.clone()),
            TargetKind::SalesChannel => TargetScope::SalesChannel(self.target_id.clone()),
        }
    }

    /// Recomputes the aggregate count from the member entities.
    pub fn recount(&mut self) -> u64 {
        self.count = self.entities.iter().map(|e| e.entity_count).sum();
        self.count
    }

    pub fn reset_progress(&mut self) {
        self.progress = 0;
        for entity in &mut self.entities {
            entity.progress = 0;
        }
    }
}
