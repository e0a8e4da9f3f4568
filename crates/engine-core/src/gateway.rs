use crate::{error::GatewayError, retry::RetryDisposition};
use async_trait::async_trait;
use model::{
    assets::workload::AssetWorkItem,
    core::identifiers::RunId,
    migration::request::{BatchOperation, BatchRequest, CountQuery, RunTotals},
};
use uuid::Uuid;

/// Remote side of a migration. Every call is an opaque request/response
/// exchange; reading, converting and writing records happens on the server.
#[async_trait]
pub trait MigrationGateway: Send + Sync {
    /// Reads one page of legacy records and stores them converted on the server.
    async fn fetch_data(&self, request: &BatchRequest) -> Result<(), GatewayError>;

    /// Writes one page of converted records into the target store.
    async fn write_data(&self, request: &BatchRequest) -> Result<(), GatewayError>;

    async fn entity_count(&self, query: &CountQuery) -> Result<u64, GatewayError>;

    /// Page of asset identifiers known for the profile.
    async fn fetch_asset_ids(
        &self,
        profile: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Uuid>, GatewayError>;

    /// Advances every item of the workload by up to `chunk_byte_size` bytes
    /// and returns the workload with states and error counts updated.
    async fn download_assets(
        &self,
        workload: &[AssetWorkItem],
        chunk_byte_size: u64,
    ) -> Result<Vec<AssetWorkItem>, GatewayError>;

    async fn persist_run_totals(
        &self,
        run_id: &RunId,
        totals: &RunTotals,
    ) -> Result<(), GatewayError>;

    async fn run_batch(
        &self,
        operation: BatchOperation,
        request: &BatchRequest,
    ) -> Result<(), GatewayError> {
        match operation {
            BatchOperation::FetchData => self.fetch_data(request).await,
            BatchOperation::WriteData => self.write_data(request).await,
        }
    }
}

/// Transport failures are worth another attempt, a structured rejection is not.
pub fn classify_gateway_error(err: &GatewayError) -> RetryDisposition {
    match err {
        GatewayError::Transport(_) => RetryDisposition::Retry,
        GatewayError::Decode(_) => RetryDisposition::Retry,
        GatewayError::Remote { .. } => RetryDisposition::Stop,
    }
}
