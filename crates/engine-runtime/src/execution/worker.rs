use super::{
    assets::{ASSET_ENTITY, AssetWorkloadManager},
    batch::BatchRunner,
    session::{MigrationOutcome, MigrationSession},
};
use crate::{coordinator::MigrationLock, error::StartError};
use engine_config::settings::MigrationSettings;
use engine_core::{
    event_bus::bus::{Callback, EventBus},
    gateway::{MigrationGateway, classify_gateway_error},
    metrics::{Metrics, MetricsSnapshot},
};
use model::{
    events::{EntityCountsUpdated, ProgressUpdated, StatusChanged},
    migration::{
        errors::MigrationErrorRecord,
        request::{BatchOperation, CountQuery, MigrationRequest, RunTotals},
        status::MigrationStatus,
    },
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::watch;
use tracing::{info, warn};

/// Callbacks for the three event channels of a run. A missing callback
/// clears whatever an earlier run registered on that channel.
#[derive(Clone, Default)]
pub struct Subscribers {
    pub status: Option<Callback<StatusChanged>>,
    pub progress: Option<Callback<ProgressUpdated>>,
    pub entity_count: Option<Callback<EntityCountsUpdated>>,
}

impl Subscribers {
    pub fn on_status(mut self, f: impl Fn(&StatusChanged) + Send + Sync + 'static) -> Self {
        self.status = Some(Arc::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&ProgressUpdated) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn on_entity_count(
        mut self,
        f: impl Fn(&EntityCountsUpdated) + Send + Sync + 'static,
    ) -> Self {
        self.entity_count = Some(Arc::new(f));
        self
    }
}

/// Runs migrations one at a time: fetch, write, optional asset download, finish.
pub struct MigrationWorker {
    gateway: Arc<dyn MigrationGateway>,
    lock: Arc<dyn MigrationLock>,
    settings: MigrationSettings,
    bus: EventBus,
    metrics: Metrics,
    migrating: AtomicBool,
    status: watch::Sender<MigrationStatus>,
}

/// Releases the worker and the lock when a run ends, including when the
/// `start` future is dropped halfway.
struct ActiveRun<'a> {
    worker: &'a MigrationWorker,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.worker.lock.announce_stop();
        self.worker.migrating.store(false, Ordering::SeqCst);
    }
}

impl MigrationWorker {
    pub fn new(
        gateway: Arc<dyn MigrationGateway>,
        lock: Arc<dyn MigrationLock>,
        settings: MigrationSettings,
    ) -> Self {
        let (status, _) = watch::channel(MigrationStatus::Waiting);
        Self {
            gateway,
            lock,
            settings,
            bus: EventBus::new(),
            metrics: Metrics::new(),
            migrating: AtomicBool::new(false),
            status,
        }
    }

    pub fn status(&self) -> MigrationStatus {
        *self.status.borrow()
    }

    pub fn is_migrating(&self) -> bool {
        self.migrating.load(Ordering::SeqCst)
    }

    pub fn subscribe_status_changes(&self) -> watch::Receiver<MigrationStatus> {
        self.status.subscribe()
    }

    /// Counters of the current run, or of the last one when idle.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Runs a full migration and returns every error collected on the way.
    ///
    /// Fails only when the run could not start; once started, the run
    /// always reaches `Finished`.
    pub async fn start(
        &self,
        request: MigrationRequest,
        subscribers: Subscribers,
    ) -> Result<MigrationOutcome, StartError> {
        if self
            .migrating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(run_id = %request.run_id, "Migration already running in this context");
            return Err(StartError::AlreadyMigrating);
        }

        if !self.lock.request_permission().await {
            self.migrating.store(false, Ordering::SeqCst);
            warn!(run_id = %request.run_id, "Migration already running in another context");
            return Err(StartError::RunningElsewhere);
        }

        self.lock.announce_start();
        let _active = ActiveRun { worker: self };
        self.metrics.reset();

        self.bus.replace(subscribers.status).await;
        self.bus.replace(subscribers.progress).await;
        self.bus.replace(subscribers.entity_count).await;

        let mut session = MigrationSession::new(request);
        info!(
            run_id = %session.run_id,
            profile = %session.profile.profile,
            groups = session.groups.len(),
            "Migration started"
        );

        self.fetch_data(&mut session).await;
        self.write_data(&mut session).await;
        if session.requires_asset_download() {
            self.download_data(&mut session).await;
        }
        self.finish(&mut session).await;

        info!(
            run_id = %session.run_id,
            errors = session.errors().len(),
            "Migration finished"
        );
        Ok(session.into_outcome(self.metrics.snapshot()))
    }

    /// Moves the run to `status` and tells subscribers. A refused transition
    /// changes nothing and publishes nothing.
    pub(crate) async fn set_status(
        &self,
        session: &mut MigrationSession,
        status: MigrationStatus,
    ) -> bool {
        if !session.advance(status) {
            return false;
        }
        self.status.send_replace(status);
        info!(run_id = %session.run_id, status = %status, "Migration status changed");

        self.bus
            .publish(&StatusChanged {
                run_id: session.run_id.clone(),
                status,
                timestamp: chrono::Utc::now(),
            })
            .await;
        true
    }

    fn batch_runner(&self) -> BatchRunner<'_> {
        BatchRunner::new(
            self.gateway.as_ref(),
            &self.bus,
            &self.metrics,
            &self.settings.batch,
        )
    }

    async fn fetch_data(&self, session: &mut MigrationSession) {
        session.reset_progress();
        self.set_status(session, MigrationStatus::FetchData).await;
        self.batch_runner()
            .run(BatchOperation::FetchData, session)
            .await;
    }

    async fn write_data(&self, session: &mut MigrationSession) {
        session.reset_progress();
        self.set_status(session, MigrationStatus::WriteData).await;

        self.refresh_counts(session).await;
        self.bus
            .publish(&EntityCountsUpdated {
                run_id: session.run_id.clone(),
                entity_groups: session.groups.clone(),
            })
            .await;
        self.persist_totals(session).await;

        self.batch_runner()
            .run(BatchOperation::WriteData, session)
            .await;
    }

    /// Replaces every entity count with the number of rows converted in this run.
    async fn refresh_counts(&self, session: &mut MigrationSession) {
        let gateway = self.gateway.as_ref();
        let run_id = session.run_id.clone();
        let mut failures = Vec::new();

        for group in &mut session.groups {
            for entity in &mut group.entities {
                let query = CountQuery::converted(&run_id, &entity.entity_name);
                entity.entity_count = match gateway.entity_count(&query).await {
                    Ok(count) => count,
                    Err(err) => {
                        warn!(run_id = %run_id, entity = %entity.entity_name, error = %err, "Entity count unavailable");
                        failures.push(MigrationErrorRecord::count_unavailable(&entity.entity_name));
                        0
                    }
                };
            }
            group.recount();
        }

        session.extend_errors(failures);
    }

    async fn persist_totals(&self, session: &MigrationSession) {
        let gateway = self.gateway.as_ref();
        let run_id = &session.run_id;
        let totals = &RunTotals::from_groups(&session.groups);

        let result = self
            .settings
            .totals_retry
            .policy()
            .run(
                move || gateway.persist_run_totals(run_id, totals),
                classify_gateway_error,
            )
            .await;

        if let Err(err) = result {
            warn!(run_id = %run_id, error = %err.into_inner(), "Failed to persist run totals");
        }
    }

    async fn download_data(&self, session: &mut MigrationSession) {
        let query = CountQuery::written(&session.run_id, ASSET_ENTITY);
        let total = match self.gateway.entity_count(&query).await {
            Ok(total) => total,
            Err(err) => {
                warn!(run_id = %session.run_id, error = %err, "Asset count unavailable, skipping download");
                0
            }
        };

        session.reset_progress();
        self.set_status(session, MigrationStatus::DownloadData).await;

        let manager = AssetWorkloadManager::new(
            self.gateway.as_ref(),
            &self.bus,
            &self.metrics,
            &self.settings.assets,
            session.run_id.clone(),
            session.profile.profile.clone(),
        );
        let errors = manager.download_all(total).await;
        session.extend_errors(errors);
    }

    async fn finish(&self, session: &mut MigrationSession) {
        session.reset_progress();
        self.set_status(session, MigrationStatus::Finished).await;
    }
}
