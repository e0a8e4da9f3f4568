use crate::coordinator::MigrationLock;
use async_trait::async_trait;
use engine_core::{error::GatewayError, gateway::MigrationGateway};
use model::{
    assets::workload::{AssetMetadata, AssetState, AssetWorkItem},
    core::identifiers::RunId,
    migration::{
        group::{Entity, EntityGroup, TargetKind},
        profile::MigrationProfile,
        request::{BatchOperation, BatchRequest, CountQuery, MigrationRequest, RunTotals},
    },
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchCall {
    pub operation: BatchOperation,
    pub entity: String,
    pub offset: u64,
    pub limit: u64,
}

/// How the fake server treats one asset.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AssetBehaviour {
    /// Finished after the given number of rounds.
    FinishAfter(u32),
    /// Never finishes, error count grows every round.
    Fail,
    /// Never finishes, answered with this error count every round.
    ReportErrors(u32),
}

/// In-memory gateway with scripted answers. Batch latency is simulated with
/// `tokio::time::sleep`, so tests run with a paused clock.
#[derive(Default)]
pub(crate) struct MockGateway {
    pub latency: Duration,
    pub download_latency: Duration,
    pub counts: HashMap<String, u64>,
    pub failing_counts: Vec<String>,
    pub batch_failures: Mutex<VecDeque<Option<GatewayError>>>,
    pub batch_calls: Mutex<Vec<BatchCall>>,
    pub asset_ids: Vec<Uuid>,
    pub asset_behaviour: HashMap<Uuid, AssetBehaviour>,
    pub asset_rounds: Mutex<HashMap<Uuid, u32>>,
    pub download_failures: Mutex<VecDeque<GatewayError>>,
    pub download_calls: Mutex<Vec<(usize, u64)>>,
    /// Asset ids of every submitted workload, in submission order.
    pub download_workloads: Mutex<Vec<Vec<Uuid>>>,
    pub id_calls: Mutex<Vec<(u64, u64)>>,
    pub persisted: Mutex<Vec<RunTotals>>,
    pub count_queries: Mutex<Vec<CountQuery>>,
}

impl MockGateway {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn workloads(&self) -> Vec<Vec<Uuid>> {
        self.download_workloads.lock().unwrap().clone()
    }

    pub fn with_assets(mut self, ids: Vec<Uuid>) -> Self {
        self.counts.insert("media".into(), ids.len() as u64);
        self.asset_ids = ids;
        self
    }

    pub fn calls(&self) -> Vec<BatchCall> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, operation: BatchOperation) -> Vec<BatchCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Queues the outcome of the next batch calls, `None` meaning success.
    pub fn script_batches(&self, outcomes: Vec<Option<GatewayError>>) {
        self.batch_failures.lock().unwrap().extend(outcomes);
    }

    async fn batch(&self, operation: BatchOperation, request: &BatchRequest) -> Result<(), GatewayError> {
        self.batch_calls.lock().unwrap().push(BatchCall {
            operation,
            entity: request.entity.clone(),
            offset: request.offset,
            limit: request.limit,
        });

        let scripted = self.batch_failures.lock().unwrap().pop_front().flatten();
        match scripted {
            // no response means no latency either
            Some(err @ GatewayError::Transport(_)) => Err(err),
            Some(err) => {
                tokio::time::sleep(self.latency).await;
                Err(err)
            }
            None => {
                tokio::time::sleep(self.latency).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MigrationGateway for MockGateway {
    async fn fetch_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        self.batch(BatchOperation::FetchData, request).await
    }

    async fn write_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        self.batch(BatchOperation::WriteData, request).await
    }

    async fn entity_count(&self, query: &CountQuery) -> Result<u64, GatewayError> {
        self.count_queries.lock().unwrap().push(query.clone());
        if self.failing_counts.contains(&query.entity) {
            return Err(GatewayError::Transport("count failed".into()));
        }
        Ok(self.counts.get(&query.entity).copied().unwrap_or(0))
    }

    async fn fetch_asset_ids(
        &self,
        _profile: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Uuid>, GatewayError> {
        self.id_calls.lock().unwrap().push((offset, limit));
        Ok(self
            .asset_ids
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .copied()
            .collect())
    }

    async fn download_assets(
        &self,
        workload: &[AssetWorkItem],
        chunk_byte_size: u64,
    ) -> Result<Vec<AssetWorkItem>, GatewayError> {
        self.download_calls
            .lock()
            .unwrap()
            .push((workload.len(), chunk_byte_size));
        self.download_workloads
            .lock()
            .unwrap()
            .push(workload.iter().map(|item| item.uuid).collect());
        tokio::time::sleep(self.download_latency).await;

        if let Some(err) = self.download_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut rounds = self.asset_rounds.lock().unwrap();
        Ok(workload
            .iter()
            .map(|item| {
                let round = rounds.entry(item.uuid).or_insert(0);
                *round += 1;
                let mut item = item.clone();
                item.additional_data = AssetMetadata {
                    uri: Some(format!("http://old.shop/media/{}.jpg", item.uuid)),
                    ..Default::default()
                };
                match self
                    .asset_behaviour
                    .get(&item.uuid)
                    .copied()
                    .unwrap_or(AssetBehaviour::FinishAfter(1))
                {
                    AssetBehaviour::FinishAfter(n) if *round >= n => {
                        item.state = AssetState::Finished
                    }
                    AssetBehaviour::FinishAfter(_) => item.current_offset += chunk_byte_size,
                    AssetBehaviour::Fail => item.error_count += 1,
                    AssetBehaviour::ReportErrors(n) => item.error_count = n,
                }
                item
            })
            .collect())
    }

    async fn persist_run_totals(
        &self,
        _run_id: &RunId,
        totals: &RunTotals,
    ) -> Result<(), GatewayError> {
        self.persisted.lock().unwrap().push(totals.clone());
        Ok(())
    }
}

/// Lock that answers every request the same way and counts announcements.
#[derive(Default)]
pub(crate) struct StaticLock {
    pub deny: bool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl StaticLock {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationLock for StaticLock {
    async fn request_permission(&self) -> bool {
        !self.deny
    }

    fn announce_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn announce_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn product_group(count: u64) -> EntityGroup {
    EntityGroup::new(
        "products",
        TargetKind::Catalog,
        "catalog-1",
        vec![Entity::new("product", count)],
    )
}

pub(crate) fn request(groups: Vec<EntityGroup>) -> MigrationRequest {
    MigrationRequest {
        run_id: RunId::new("run-1"),
        profile: MigrationProfile::new("shopware55", "api"),
        entity_groups: groups,
    }
}

pub(crate) fn uuids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}
