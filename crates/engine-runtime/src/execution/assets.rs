use engine_config::settings::AssetSettings;
use engine_core::{
    cb::{CircuitBreaker, CircuitBreakerState},
    event_bus::bus::EventBus,
    gateway::MigrationGateway,
    metrics::Metrics,
    throttle::AdaptiveThrottle,
};
use model::{
    assets::workload::AssetWorkItem, core::identifiers::RunId, events::ProgressUpdated,
    migration::errors::MigrationErrorRecord,
};
use std::{collections::VecDeque, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Entity name under which asset progress is reported.
pub const ASSET_ENTITY: &str = "media";

/// Downloads every asset of a run through a bounded workload.
///
/// Identifiers are paged into a FIFO pool. The workload holds at most
/// `workload_size` items and is sent as a whole with every request; the
/// remote side advances each item by up to the current transfer chunk size.
pub struct AssetWorkloadManager<'a> {
    gateway: &'a dyn MigrationGateway,
    bus: &'a EventBus,
    metrics: &'a Metrics,
    settings: &'a AssetSettings,
    run_id: RunId,
    profile: String,
    pool: VecDeque<Uuid>,
    workload: Vec<AssetWorkItem>,
    next_offset: u64,
    processed: u64,
    throttle: AdaptiveThrottle,
    breaker: CircuitBreaker,
    errors: Vec<MigrationErrorRecord>,
}

impl<'a> AssetWorkloadManager<'a> {
    pub fn new(
        gateway: &'a dyn MigrationGateway,
        bus: &'a EventBus,
        metrics: &'a Metrics,
        settings: &'a AssetSettings,
        run_id: RunId,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            bus,
            metrics,
            settings,
            run_id,
            profile: profile.into(),
            pool: VecDeque::new(),
            workload: Vec::new(),
            next_offset: 0,
            processed: 0,
            throttle: AdaptiveThrottle::new(settings.transfer.clone()),
            breaker: settings.transport_breaker(),
            errors: Vec::new(),
        }
    }

    /// Runs until `total` assets were processed, or nothing is left to download.
    pub async fn download_all(mut self, total: u64) -> Vec<MigrationErrorRecord> {
        if total == 0 {
            debug!(run_id = %self.run_id, "No assets to download");
            return self.errors;
        }

        info!(run_id = %self.run_id, total, "Downloading assets");
        self.refill_pool().await;

        while self.processed < total {
            self.top_up();
            if self.pool.is_empty() && self.workload.is_empty() {
                break;
            }

            let chunk = self.throttle.current();
            self.metrics.increment_asset_requests(1);
            let started = Instant::now();
            let result = self.gateway.download_assets(&self.workload, chunk).await;
            let elapsed = started.elapsed();

            let (returned, elapsed) = match result {
                Ok(items) => {
                    self.breaker.record_success();
                    (items, Some(elapsed))
                }
                Err(err) => {
                    self.metrics.increment_transport_failures(1);
                    match self.breaker.record_failure() {
                        CircuitBreakerState::RetryAfter(delay) => {
                            warn!(
                                run_id = %self.run_id,
                                error = %err,
                                failures = self.breaker.consecutive_failures(),
                                ?delay,
                                "Asset download failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            (self.workload.clone(), None)
                        }
                        CircuitBreakerState::Open => {
                            warn!(
                                run_id = %self.run_id,
                                error = %err,
                                failures = self.breaker.consecutive_failures(),
                                "Asset downloads aborted"
                            );
                            self.errors
                                .push(MigrationErrorRecord::asset_downloads_aborted(
                                    self.breaker.consecutive_failures(),
                                    total.saturating_sub(self.processed),
                                ));
                            break;
                        }
                    }
                }
            };

            self.apply(returned, elapsed);

            self.bus
                .publish(&ProgressUpdated {
                    run_id: self.run_id.clone(),
                    entity_name: ASSET_ENTITY.to_string(),
                    entity_group_progress_value: self.processed,
                    entity_count: total,
                })
                .await;

            self.top_up();
            self.refill_pool().await;

            if self.pool.is_empty() && self.workload.is_empty() {
                break;
            }
        }

        info!(
            run_id = %self.run_id,
            processed = self.processed,
            total,
            failed = self.errors.len(),
            "Asset download finished"
        );
        self.errors
    }

    /// Partitions the returned workload: finished and over-budget items leave,
    /// everything else stays for the next round.
    fn apply(&mut self, returned: Vec<AssetWorkItem>, elapsed: Option<Duration>) {
        let threshold = self.settings.error_threshold;
        let mut removed = 0;
        let mut kept = Vec::with_capacity(returned.len());

        for item in returned {
            if item.is_finished() {
                removed += 1;
                self.metrics.increment_assets_processed(1);
            } else if item.exceeds_error_budget(threshold) {
                removed += 1;
                let locator = item.locator();
                warn!(run_id = %self.run_id, asset = %locator, errors = item.error_count, "Dropping asset");
                self.metrics.increment_assets_failed(1);
                self.errors
                    .push(MigrationErrorRecord::cannot_download_asset(&locator));
            } else {
                kept.push(item);
            }
        }

        // Only healthy items used the whole chunk, so only they say something about latency.
        if let Some(elapsed) = elapsed {
            if kept.iter().any(|item| item.error_count == 0) {
                let adjustment = self.throttle.observe(elapsed);
                debug!(chunk = self.throttle.current(), ?elapsed, ?adjustment, "Transfer chunk adjusted");
            }
        }

        self.workload = kept;
        self.processed += removed;
    }

    fn top_up(&mut self) {
        let target = self.settings.workload_size;
        while self.workload.len() < target {
            match self.pool.pop_front() {
                Some(uuid) => self.workload.push(AssetWorkItem::new(uuid)),
                None => break,
            }
        }
    }

    async fn refill_pool(&mut self) {
        if self.pool.len() >= self.settings.workload_size {
            return;
        }

        let limit = self.settings.id_page_size;
        match self
            .gateway
            .fetch_asset_ids(&self.profile, self.next_offset, limit)
            .await
        {
            Ok(ids) => {
                debug!(offset = self.next_offset, received = ids.len(), "Fetched asset ids");
                self.pool.extend(ids);
                self.next_offset += limit;
            }
            Err(err) => {
                self.metrics.increment_transport_failures(1);
                warn!(offset = self.next_offset, error = %err, "Failed to fetch asset ids");
            }
        }
    }
}
