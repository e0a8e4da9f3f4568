use crate::scripted::ScriptedGateway;
use engine_config::settings::MigrationSettings;
use engine_core::gateway::MigrationGateway;
use engine_runtime::{
    coordinator::{
        MigrationLock,
        broadcast::BroadcastCoordinator,
        channel::{BroadcastChannel, LocalBroadcastHub},
    },
    execution::worker::{MigrationWorker, Subscribers},
};
use model::{
    core::identifiers::RunId,
    events::{EntityCountsUpdated, ProgressUpdated, StatusChanged},
    migration::{
        group::{Entity, EntityGroup, TargetKind},
        profile::MigrationProfile,
        request::MigrationRequest,
        status::MigrationStatus,
    },
};
use std::sync::{Arc, Mutex};

/// Everything the subscribers of a run were told.
#[derive(Default)]
pub struct Recorder {
    pub statuses: Mutex<Vec<MigrationStatus>>,
    pub progress: Mutex<Vec<ProgressUpdated>>,
    pub counts: Mutex<Vec<Vec<EntityGroup>>>,
}

impl Recorder {
    pub fn subscribers(self: &Arc<Self>) -> Subscribers {
        let (s, p, c) = (self.clone(), self.clone(), self.clone());
        Subscribers::default()
            .on_status(move |e: &StatusChanged| s.statuses.lock().unwrap().push(e.status))
            .on_progress(move |e: &ProgressUpdated| p.progress.lock().unwrap().push(e.clone()))
            .on_entity_count(move |e: &EntityCountsUpdated| {
                c.counts.lock().unwrap().push(e.entity_groups.clone())
            })
    }

    pub fn statuses(&self) -> Vec<MigrationStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn progress_for(&self, entity: &str) -> Vec<ProgressUpdated> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.entity_name == entity)
            .cloned()
            .collect()
    }
}

pub fn worker_on(
    hub: &LocalBroadcastHub,
    gateway: Arc<ScriptedGateway>,
    settings: MigrationSettings,
) -> MigrationWorker {
    let channel: Arc<dyn BroadcastChannel> = Arc::new(hub.clone());
    let lock: Arc<dyn MigrationLock> = Arc::new(BroadcastCoordinator::new(
        channel,
        settings.coordinator.wait_window(),
    ));
    let gateway: Arc<dyn MigrationGateway> = gateway;
    MigrationWorker::new(gateway, lock, settings)
}

pub fn group(id: &str, target: TargetKind, entities: &[(&str, u64)]) -> EntityGroup {
    EntityGroup::new(
        id,
        target,
        format!("{id}-target"),
        entities
            .iter()
            .map(|(name, count)| Entity::new(*name, *count))
            .collect(),
    )
}

pub fn request(run: &str, groups: Vec<EntityGroup>) -> MigrationRequest {
    MigrationRequest {
        run_id: RunId::new(run),
        profile: MigrationProfile::new("shopware55", "api"),
        entity_groups: groups,
    }
}
