use async_trait::async_trait;
use engine_config::settings::GatewaySettings;
use engine_core::{error::GatewayError, gateway::MigrationGateway};
use model::{
    assets::workload::AssetWorkItem,
    core::identifiers::RunId,
    migration::request::{BatchRequest, CountQuery, RunTotals},
};
use payload::{AssetIdPage, AssetIdRequest, DownloadRequest, DownloadResponse};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

mod payload;

const ACTION_PREFIX: &str = "api/v1/_action/swag-migration";
const DATA_SEARCH: &str = "api/v1/search/swag-migration-data";
const RUN_RESOURCE: &str = "api/v1/swag-migration-run";

/// Talks to the migration API of the target shop over HTTP.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // A response without a readable body still counts as an answer.
        let body = response.bytes().await.unwrap_or_default();
        let errors = payload::error_records(&body);
        warn!(status = %status, errors = errors.len(), "Migration API returned an error");
        Err(GatewayError::Remote {
            status: Some(status.as_u16()),
            errors,
        })
    }

    async fn post<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, GatewayError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn action<B: Serialize + Sync + ?Sized>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<Response, GatewayError> {
        self.post(&format!("{ACTION_PREFIX}/{action}"), body).await
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MigrationGateway for HttpGateway {
    async fn fetch_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        debug!(entity = %request.entity, offset = request.offset, limit = request.limit, "fetch-data");
        self.action("fetch-data", request).await.map(|_| ())
    }

    async fn write_data(&self, request: &BatchRequest) -> Result<(), GatewayError> {
        debug!(entity = %request.entity, offset = request.offset, limit = request.limit, "write-data");
        self.action("write-data", request).await.map(|_| ())
    }

    async fn entity_count(&self, query: &CountQuery) -> Result<u64, GatewayError> {
        let response = self
            .post(DATA_SEARCH, &payload::count_criteria(query))
            .await?;
        let body: Value = Self::read_json(response).await?;
        payload::parse_count(&body, &query.entity)
    }

    async fn fetch_asset_ids(
        &self,
        profile: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Uuid>, GatewayError> {
        let body = AssetIdRequest {
            profile,
            offset,
            limit,
        };
        let response = self.action("fetch-media-uuids", &body).await?;
        let page: AssetIdPage = Self::read_json(response).await?;
        Ok(page.media_uuids)
    }

    async fn download_assets(
        &self,
        workload: &[AssetWorkItem],
        chunk_byte_size: u64,
    ) -> Result<Vec<AssetWorkItem>, GatewayError> {
        let body = DownloadRequest {
            workload,
            file_chunk_byte_size: chunk_byte_size,
        };
        let response = self.action("download-assets", &body).await?;
        let result: DownloadResponse = Self::read_json(response).await?;
        Ok(result.workload)
    }

    async fn persist_run_totals(
        &self,
        run_id: &RunId,
        totals: &RunTotals,
    ) -> Result<(), GatewayError> {
        let path = format!("{RUN_RESOURCE}/{run_id}");

        let response = self.send(self.request(Method::GET, &path)).await?;
        let record: Value = Self::read_json(response).await?;
        let body = payload::merge_totals(payload::run_totals(&record), totals)?;

        self.send(self.request(Method::PATCH, &path).json(&body))
            .await
            .map(|_| ())
    }
}
