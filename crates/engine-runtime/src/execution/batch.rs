use super::session::MigrationSession;
use engine_core::{
    event_bus::bus::EventBus,
    gateway::MigrationGateway,
    metrics::Metrics,
    throttle::{AdaptiveThrottle, ThrottleSettings},
};
use model::{
    events::ProgressUpdated,
    migration::{
        errors::MigrationErrorRecord,
        request::{BatchOperation, BatchRequest},
    },
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Drives one remote operation over every entity of every group, one paced
/// request at a time.
pub struct BatchRunner<'a> {
    gateway: &'a dyn MigrationGateway,
    bus: &'a EventBus,
    metrics: &'a Metrics,
    throttle: &'a ThrottleSettings,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        gateway: &'a dyn MigrationGateway,
        bus: &'a EventBus,
        metrics: &'a Metrics,
        throttle: &'a ThrottleSettings,
    ) -> Self {
        Self {
            gateway,
            bus,
            metrics,
            throttle,
        }
    }

    /// Groups and entities are processed strictly in selection order.
    pub async fn run(&self, operation: BatchOperation, session: &mut MigrationSession) {
        for group_idx in 0..session.groups.len() {
            let mut group_progress = 0;
            for entity_idx in 0..session.groups[group_idx].entities.len() {
                self.run_entity(operation, session, group_idx, entity_idx, group_progress)
                    .await;
                group_progress += session.groups[group_idx].entities[entity_idx].entity_count;
            }
        }
    }

    async fn run_entity(
        &self,
        operation: BatchOperation,
        session: &mut MigrationSession,
        group_idx: usize,
        entity_idx: usize,
        group_progress: u64,
    ) {
        let group = &session.groups[group_idx];
        let entity_name = group.entities[entity_idx].entity_name.clone();
        let entity_count = group.entities[entity_idx].entity_count;
        let group_count = group.count;
        let scope = group.scope();

        info!(
            run_id = %session.run_id,
            operation = operation.as_str(),
            entity = %entity_name,
            count = entity_count,
            "Processing entity"
        );

        let mut throttle = AdaptiveThrottle::new(self.throttle.clone());
        let mut offset = 0;

        while offset < entity_count {
            let limit = throttle.current();
            let request = BatchRequest {
                run_id: session.run_id.clone(),
                profile: session.profile.profile.clone(),
                gateway: session.profile.gateway.clone(),
                credential_fields: session.profile.credential_fields.clone(),
                entity: entity_name.clone(),
                offset,
                limit,
                scope: scope.clone(),
            };

            self.metrics.record_batch(limit);
            let started = Instant::now();
            let result = self.gateway.run_batch(operation, &request).await;
            let elapsed = started.elapsed();

            match result {
                Ok(()) => {
                    let adjustment = throttle.observe(elapsed);
                    debug!(entity = %entity_name, offset, limit, ?elapsed, ?adjustment, "Batch done");
                }
                Err(err) if err.has_response() => {
                    let records = err.into_records();
                    warn!(
                        entity = %entity_name,
                        offset,
                        errors = records.len(),
                        "Batch answered with errors"
                    );
                    self.metrics.increment_remote_errors(records.len() as u64);
                    session.extend_errors(records);
                    throttle.observe(elapsed);
                }
                Err(err) => {
                    warn!(entity = %entity_name, offset, error = %err, "Batch got no response");
                    self.metrics.increment_transport_failures(1);
                    session.push_error(MigrationErrorRecord::cannot_reach_server(
                        &entity_name,
                        offset,
                    ));
                }
            }

            let reached = offset.saturating_add(limit).min(entity_count);
            let group = &mut session.groups[group_idx];
            group.entities[entity_idx].progress = reached;
            group.progress = group_progress + reached;

            self.bus
                .publish(&ProgressUpdated {
                    run_id: session.run_id.clone(),
                    entity_name: entity_name.clone(),
                    entity_group_progress_value: group_progress + reached,
                    entity_count: group_count,
                })
                .await;

            offset = offset.saturating_add(limit);
        }
    }
}
