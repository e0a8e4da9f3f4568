use async_trait::async_trait;
use engine_core::{error::GatewayError, gateway::MigrationGateway};
use model::{
    assets::workload::{AssetMetadata, AssetState, AssetWorkItem},
    core::identifiers::RunId,
    migration::{
        errors::MigrationErrorRecord,
        request::{BatchOperation, BatchRequest, CountQuery, RunTotals},
    },
};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::debug;
use uuid::Uuid;

/// A request as the scripted server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    pub operation: BatchOperation,
    pub entity: String,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
struct ScriptedAsset {
    id: Uuid,
    /// `None` for files the legacy shop cannot deliver.
    size: Option<u64>,
}

type LatencyFn = Box<dyn Fn(&RecordedBatch) -> Duration + Send + Sync>;

#[derive(Default)]
struct ServerState {
    converted: HashMap<String, u64>,
    written: HashMap<String, u64>,
    batches: Vec<RecordedBatch>,
    downloads: Vec<(usize, u64)>,
    totals: Option<RunTotals>,
}

/// In-memory stand-in for the migration API.
///
/// Keeps a legacy record count per entity and tracks which pages were
/// converted and written, so counts behave like the real data table.
/// Pages can be scripted to be rejected (structured error) or dropped (no
/// response); assets transfer in chunks of the requested byte size.
pub struct ScriptedGateway {
    legacy: HashMap<String, u64>,
    rejected: HashSet<(BatchOperation, String, u64)>,
    dropped: HashSet<(BatchOperation, String, u64)>,
    assets: Vec<ScriptedAsset>,
    latency: LatencyFn,
    download_latency: Duration,
    state: Mutex<ServerState>,
}

pub struct ScriptedGatewayBuilder {
    legacy: HashMap<String, u64>,
    rejected: HashSet<(BatchOperation, String, u64)>,
    dropped: HashSet<(BatchOperation, String, u64)>,
    assets: Vec<ScriptedAsset>,
    latency: LatencyFn,
    download_latency: Duration,
}

impl ScriptedGatewayBuilder {
    pub fn entity(mut self, name: &str, records: u64) -> Self {
        self.legacy.insert(name.to_string(), records);
        self
    }

    /// Answers the page at `offset` with an error payload; its records are not processed.
    pub fn reject_page(mut self, operation: BatchOperation, entity: &str, offset: u64) -> Self {
        self.rejected.insert((operation, entity.to_string(), offset));
        self
    }

    /// Never answers the page at `offset`.
    pub fn drop_page(mut self, operation: BatchOperation, entity: &str, offset: u64) -> Self {
        self.dropped.insert((operation, entity.to_string(), offset));
        self
    }

    pub fn asset(mut self, size: u64) -> Self {
        self.assets.push(ScriptedAsset {
            id: Uuid::new_v4(),
            size: Some(size),
        });
        self
    }

    pub fn broken_asset(mut self) -> Self {
        self.assets.push(ScriptedAsset {
            id: Uuid::new_v4(),
            size: None,
        });
        self
    }

    pub fn batch_latency(self, latency: Duration) -> Self {
        self.latency_fn(move |_| latency)
    }

    pub fn latency_fn(
        mut self,
        f: impl Fn(&RecordedBatch) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Box::new(f);
        self
    }

    pub fn download_latency(mut self, latency: Duration) -> Self {
        self.download_latency = latency;
        self
    }

    pub fn build(self) -> Arc<ScriptedGateway> {
        Arc::new(ScriptedGateway {
            legacy: self.legacy,
            rejected: self.rejected,
            dropped: self.dropped,
            assets: self.assets,
            latency: self.latency,
            download_latency: self.download_latency,
            state: Mutex::new(ServerState::default()),
        })
    }
}

impl ScriptedGateway {
    pub fn builder() -> ScriptedGatewayBuilder {
        ScriptedGatewayBuilder {
            legacy: HashMap::new(),
            rejected: HashSet::new(),
            dropped: HashSet::new(),
            assets: Vec::new(),
            latency: Box::new(|_| Duration::from_millis(100)),
            download_latency: Duration::from_millis(100),
        }
    }

    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn batches_for(&self, operation: BatchOperation, entity: &str) -> Vec<RecordedBatch> {
        self.batches()
            .into_iter()
            .filter(|b| b.operation == operation && b.entity == entity)
            .collect()
    }

    pub fn downloads(&self) -> Vec<(usize, u64)> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn converted(&self, entity: &str) -> u64 {
        self.state.lock().unwrap().converted.get(entity).copied().unwrap_or(0)
    }

    pub fn written(&self, entity: &str) -> u64 {
        self.state.lock().unwrap().written.get(entity).copied().unwrap_or(0)
    }

    pub fn persisted_totals(&self) -> Option<RunTotals> {
        self.state.lock().unwrap().totals.clone()
    }

    pub fn asset_uri(id: &Uuid) -> String {
        format!("https://legacy.shop/media/{id}.png")
    }

    pub fn broken_asset_uris(&self) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.size.is_none())
            .map(|a| Self::asset_uri(&a.id))
            .collect()
    }

    async fn batch(
        &self,
        operation: BatchOperation,
        request: &BatchRequest,
    ) -> Result<(), GatewayError> {
        let recorded = RecordedBatch {
            operation,
            entity: request.entity.clone(),
            offset: request.offset,
            limit: request.limit,
        };
        self.state.lock().unwrap().batches.push(recorded.clone());

        let key = (operation, request.entity.clone(), request.offset);
        if self.dropped.contains(&key) {
            debug!(entity = %request.entity, offset = request.offset, "Dropping request");
            return Err(GatewayError::Transport("connection reset by peer".into()));
        }

        tokio::time::sleep((self.latency)(&recorded)).await;

        if self.rejected.contains(&key) {
            let record: MigrationErrorRecord = serde_json::from_value(serde_json::json!({
                "code": "SWAG_MIGRATION__GATEWAY_READ",
                "status": "500",
                "title": "Internal Server Error",
                "detail": format!("Could not process {} at offset {}", request.entity, request.offset),
                "meta": { "entity": request.entity, "offset": request.offset }
            }))
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

            return Err(GatewayError::Remote {
                status: Some(500),
                errors: vec![record],
            });
        }

        let mut state = self.state.lock().unwrap();
        match operation {
            BatchOperation::FetchData => {
                let available = self.legacy.get(&request.entity).copied().unwrap_or(0);
                let page = available.saturating_sub(request.offset).min(request.limit);
                *state.converted.entry(request.entity.clone()).or_default() += page;
            }
            BatchOperation::WriteData => {
                let available = state.converted.get(&request.entity).copied().unwrap_or(0);
                let page = available.saturating_sub(request.offset).min(request.limit);
                *state.written.entry(request.entity.clone()).or_default() += page;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationGateway for ScriptedGateway {
    async fn fetch_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        self.batch(BatchOperation::FetchData, request).await
    }

    async fn write_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        self.batch(BatchOperation::WriteData, request).await
    }

    async fn entity_count(&self, query: &CountQuery) -> Result<u64, GatewayError> {
        if query.written_only && query.entity == "media" {
            return Ok(self.assets.len() as u64);
        }

        let state = self.state.lock().unwrap();
        let table = if query.written_only {
            &state.written
        } else {
            &state.converted
        };
        Ok(table.get(&query.entity).copied().unwrap_or(0))
    }

    async fn fetch_asset_ids(
        &self,
        _profile: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Uuid>, GatewayError> {
        Ok(self
            .assets
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|a| a.id)
            .collect())
    }

    async fn download_assets(
        &self,
        workload: &[AssetWorkItem],
        chunk_byte_size: u64,
    ) -> Result<Vec<AssetWorkItem>, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .downloads
            .push((workload.len(), chunk_byte_size));
        tokio::time::sleep(self.download_latency).await;

        Ok(workload
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.additional_data = AssetMetadata {
                    uri: Some(Self::asset_uri(&item.uuid)),
                    ..Default::default()
                };

                match self.assets.iter().find(|a| a.id == item.uuid).and_then(|a| a.size) {
                    Some(size) => {
                        item.current_offset = (item.current_offset + chunk_byte_size).min(size);
                        if item.current_offset >= size {
                            item.state = AssetState::Finished;
                        }
                    }
                    None => item.error_count += 1,
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
        self.state.lock().unwrap().totals = Some(totals.clone());
        Ok(())
    }
}
