#[cfg(test)]
mod tests {
    use crate::{
        scripted::ScriptedGateway,
        utils::{Recorder, group, request, worker_on},
    };
    use engine_config::settings::{MigrationSettings, ShopshiftConfig};
    use engine_runtime::{coordinator::channel::LocalBroadcastHub, error::StartError};
    use model::migration::{group::TargetKind, request::BatchOperation, status::MigrationStatus};
    use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};
    use tracing_test::traced_test;

    const CEILING: Duration = Duration::from_millis(10_000);

    // Scenario: one entity of 120 records, every request takes exactly the latency ceiling.
    // Expected Outcome: page size never changes, offsets 0, 50, 100 in both phases.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn tc01_steady_latency_keeps_default_pages() {
        let gateway = ScriptedGateway::builder()
            .entity("product", 120)
            .batch_latency(CEILING)
            .build();
        let worker = worker_on(
            &LocalBroadcastHub::default(),
            gateway.clone(),
            MigrationSettings::default(),
        );
        let recorder = Arc::new(Recorder::default());

        let outcome = worker
            .start(
                request(
                    "run-tc01",
                    vec![group("catalog", TargetKind::Catalog, &[("product", 120)])],
                ),
                recorder.subscribers(),
            )
            .await
            .unwrap();

        for operation in [BatchOperation::FetchData, BatchOperation::WriteData] {
            let pages: Vec<(u64, u64)> = gateway
                .batches_for(operation, "product")
                .iter()
                .map(|b| (b.offset, b.limit))
                .collect();
            assert_eq!(pages, vec![(0, 50), (50, 50), (100, 50)]);
        }

        let progress: Vec<u64> = recorder
            .progress_for("product")
            .iter()
            .map(|p| p.entity_group_progress_value)
            .collect();
        assert_eq!(progress, vec![50, 100, 120, 50, 100, 120]);
        assert!(outcome.errors.is_empty());
        assert_eq!(gateway.written("product"), 120);
        assert!(logs_contain("Migration finished"));
    }

    // Scenario: two groups; one fetch page is rejected by the server and one never answered.
    // Expected Outcome:
    // - the rejection is recorded verbatim, the lost page as a synthetic error
    // - write counts shrink to what was actually converted and are persisted
    // - the run still finishes
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn tc02_failed_pages_are_reported_and_skipped() {
        let gateway = ScriptedGateway::builder()
            .entity("category", 30)
            .entity("product", 200)
            .entity("customer", 75)
            .reject_page(BatchOperation::FetchData, "product", 50)
            .drop_page(BatchOperation::FetchData, "customer", 0)
            .batch_latency(Duration::from_millis(100))
            .build();
        let worker = worker_on(
            &LocalBroadcastHub::default(),
            gateway.clone(),
            MigrationSettings::default(),
        );
        let recorder = Arc::new(Recorder::default());

        let outcome = worker
            .start(
                request(
                    "run-tc02",
                    vec![
                        group(
                            "catalog",
                            TargetKind::Catalog,
                            &[("category", 30), ("product", 200)],
                        ),
                        group("customers", TargetKind::SalesChannel, &[("customer", 75)]),
                    ],
                ),
                recorder.subscribers(),
            )
            .await
            .unwrap();

        assert_eq!(
            recorder.statuses(),
            vec![
                MigrationStatus::FetchData,
                MigrationStatus::WriteData,
                MigrationStatus::Finished
            ]
        );

        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].code, "SWAG_MIGRATION__GATEWAY_READ");
        assert_eq!(outcome.errors[0].extra["meta"]["offset"], 50);
        assert!(outcome.errors[1].is_synthetic());

        // the rejected page still counted as an answer, the dropped one did not
        let product: Vec<u64> = gateway
            .batches_for(BatchOperation::FetchData, "product")
            .iter()
            .map(|b| b.limit)
            .collect();
        assert_eq!(product, vec![50, 55, 60, 65]);
        let customer: Vec<u64> = gateway
            .batches_for(BatchOperation::FetchData, "customer")
            .iter()
            .map(|b| b.limit)
            .collect();
        assert_eq!(customer, vec![50, 50]);

        let counts = recorder.counts.lock().unwrap().clone();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0][0].count, 30 + 145);
        assert_eq!(counts[0][1].count, 25);

        let totals = gateway.persisted_totals().unwrap();
        assert_eq!(totals.to_be_written["product"], 145);
        assert_eq!(totals.to_be_written["customer"], 25);

        assert_eq!(gateway.written("product"), 145);
        assert_eq!(gateway.written("customer"), 25);

        let last = recorder.progress_for("product").last().cloned().unwrap();
        assert_eq!(last.entity_group_progress_value, 175);
        assert_eq!(last.entity_count, 175);
        assert!(logs_contain("Batch got no response"));
    }

    // Scenario: a media group with six deliverable files and two broken ones.
    // Expected Outcome: six finished, two evicted with their locators, progress reaches 8 of 8.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn tc03_assets_finish_or_get_evicted() {
        let gateway = ScriptedGateway::builder()
            .entity("media", 8)
            .asset(3_000_000)
            .asset(12_000_000)
            .broken_asset()
            .asset(20_000_000)
            .asset(500_000)
            .broken_asset()
            .asset(9_000_000)
            .asset(30_000_000)
            .build();
        let worker = worker_on(
            &LocalBroadcastHub::default(),
            gateway.clone(),
            MigrationSettings::default(),
        );
        let recorder = Arc::new(Recorder::default());
        let media =
            group("media", TargetKind::SalesChannel, &[("media", 8)]).with_asset_download(true);

        let outcome = worker
            .start(request("run-tc03", vec![media]), recorder.subscribers())
            .await
            .unwrap();

        assert_eq!(
            recorder.statuses(),
            vec![
                MigrationStatus::FetchData,
                MigrationStatus::WriteData,
                MigrationStatus::DownloadData,
                MigrationStatus::Finished
            ]
        );

        let evicted: HashSet<String> = outcome
            .errors
            .iter()
            .filter_map(|e| e.path.clone())
            .collect();
        let broken: HashSet<String> = gateway.broken_asset_uris().into_iter().collect();
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(evicted, broken);

        let last = recorder.progress_for("media").last().cloned().unwrap();
        assert_eq!(last.entity_group_progress_value, 8);
        assert_eq!(last.entity_count, 8);

        assert!(gateway.downloads().iter().all(|(len, _)| *len <= 5));
        assert_eq!(outcome.metrics.assets_processed, 6);
        assert_eq!(outcome.metrics.assets_failed, 2);
        assert!(logs_contain("Dropping asset"));
    }

    // Scenario: two workers share a broadcast hub; the second starts while the first migrates.
    // Expected Outcome: the second is refused, and succeeds once the first has finished.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn tc04_sibling_context_is_refused_while_running() {
        let hub = LocalBroadcastHub::default();
        let gateway = ScriptedGateway::builder()
            .entity("product", 300)
            .batch_latency(Duration::from_secs(1))
            .build();
        let first = worker_on(&hub, gateway.clone(), MigrationSettings::default());
        let second = worker_on(&hub, gateway.clone(), MigrationSettings::default());
        let selection = || {
            request(
                "run-tc04",
                vec![group("catalog", TargetKind::Catalog, &[("product", 300)])],
            )
        };

        let recorder = Arc::new(Recorder::default());
        let (first_result, second_result) = tokio::join!(
            first.start(selection(), Default::default()),
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                second.start(selection(), recorder.subscribers()).await
            }
        );

        assert!(first_result.is_ok());
        assert_eq!(second_result.unwrap_err(), StartError::RunningElsewhere);
        assert!(recorder.statuses().is_empty());

        let retry = second.start(selection(), recorder.subscribers()).await;
        assert!(retry.is_ok());
        assert_eq!(recorder.statuses().last(), Some(&MigrationStatus::Finished));
    }

    // Scenario: page size tuned through the settings file.
    // Expected Outcome: requests start at the configured size and grow by the configured step.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn tc05_settings_drive_the_page_size() {
        let config = ShopshiftConfig::parse(
            "[migration.batch]\ndefault_size = 20\nincrement = 10\nmax_size = 40\n",
            Path::new("inline"),
        )
        .unwrap();
        config.validate().unwrap();

        let gateway = ScriptedGateway::builder()
            .entity("order", 150)
            .batch_latency(Duration::from_millis(10))
            .build();
        let worker = worker_on(&LocalBroadcastHub::default(), gateway.clone(), config.migration);

        worker
            .start(
                request(
                    "run-tc05",
                    vec![group("orders", TargetKind::SalesChannel, &[("order", 150)])],
                ),
                Default::default(),
            )
            .await
            .unwrap();

        let limits: Vec<u64> = gateway
            .batches_for(BatchOperation::FetchData, "order")
            .iter()
            .map(|b| b.limit)
            .collect();
        assert_eq!(limits, vec![20, 30, 40, 40, 40]);
    }
}
