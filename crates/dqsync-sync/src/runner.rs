use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use dqsync_catalog::{AssetStage, AssetSync, AssetUpdate, CatalogAdapter};
use dqsync_checks::summarize_check_records;
use dqsync_core::check_window_start;
use dqsync_monitor::{ConfiguredTable, MonitorSource, Warehouse};
use dqsync_tags::{reconcile_tags, TagVocabulary};
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::report::{AssetFailure, SyncOutcome, SyncRunReport};

const DEFAULT_ASSET_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct SyncRunConfig {
    pub warehouse_name: Option<String>,
    pub warehouse_id: Option<u64>,
    pub vocabulary: TagVocabulary,
    /// Tables in flight per warehouse; 1 keeps the run sequential.
    pub workers: usize,
    /// Bound on fetching one table's check results and profile.
    pub asset_timeout: Duration,
    pub lookback_days: u64,
}

impl Default for SyncRunConfig {
    fn default() -> Self {
        Self {
            warehouse_name: None,
            warehouse_id: None,
            vocabulary: TagVocabulary::default(),
            workers: 1,
            asset_timeout: DEFAULT_ASSET_TIMEOUT,
            lookback_days: 1,
        }
    }
}

impl SyncRunConfig {
    pub fn selects(&self, warehouse: &Warehouse) -> bool {
        let name_matches = self
            .warehouse_name
            .as_deref()
            .map_or(true, |name| warehouse.name == name);
        let id_matches = self.warehouse_id.map_or(true, |id| warehouse.id == id);
        name_matches && id_matches
    }
}

struct TableResult {
    outcome: SyncOutcome,
    failure: Option<AssetFailure>,
}

impl TableResult {
    fn completed(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            failure: None,
        }
    }

    fn failed(warehouse: &Warehouse, table: &str, stage: AssetStage, cause: String) -> Self {
        tracing::error!(
            warehouse = %warehouse.name,
            table,
            stage = %stage,
            cause = %cause,
            "failed to sync table"
        );
        Self {
            outcome: SyncOutcome::Failed,
            failure: Some(AssetFailure {
                warehouse: warehouse.name.clone(),
                table: table.to_string(),
                stage,
                cause,
            }),
        }
    }
}

/// Publishes the latest check status of every configured table to one catalog.
///
/// Fails only when the warehouse list cannot be read. Each table is an
/// isolated failure unit; cancellation is checked before a table starts and
/// never interrupts an apply already in flight.
pub async fn run_catalog_sync(
    source: &dyn MonitorSource,
    adapter: &dyn CatalogAdapter,
    config: &SyncRunConfig,
    cancel: watch::Receiver<bool>,
) -> Result<SyncRunReport> {
    let since = check_window_start(Utc::now().date_naive(), config.lookback_days);
    let warehouses = source
        .list_warehouses()
        .await
        .context("failed to read warehouse list from monitoring service")?;

    let mut report = SyncRunReport::default();
    for warehouse in warehouses.iter().filter(|warehouse| config.selects(warehouse)) {
        if *cancel.borrow() {
            report.cancelled = true;
            break;
        }
        if !adapter.include_warehouse(warehouse) {
            tracing::info!(
                warehouse = %warehouse.label(),
                catalog = %adapter.kind(),
                "skipping unsupported data source"
            );
            continue;
        }
        report.warehouses = report.warehouses.saturating_add(1);

        let tables = match source.configured_tables(warehouse.id).await {
            Ok(tables) => tables,
            Err(error) => {
                let result = TableResult::failed(
                    warehouse,
                    "*",
                    AssetStage::FetchChecks,
                    format!("failed to list configured tables: {error:#}"),
                );
                report.record(result.outcome, result.failure);
                continue;
            }
        };
        tracing::info!(
            warehouse = %warehouse.label(),
            tables = tables.len(),
            since = %since,
            "publishing status to configured tables"
        );

        let cancel = &cancel;
        let since = since.as_str();
        let mut results = stream::iter(tables.iter().map(|table| async move {
            if *cancel.borrow() {
                return None;
            }
            Some(sync_table(source, adapter, warehouse, table, config, since).await)
        }))
        .buffer_unordered(config.workers.max(1));

        while let Some(result) = results.next().await {
            match result {
                Some(result) => report.record(result.outcome, result.failure),
                None => report.cancelled = true,
            }
        }
    }

    tracing::info!(
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        cancelled = report.cancelled,
        "catalog sync finished"
    );
    Ok(report)
}

async fn sync_table(
    source: &dyn MonitorSource,
    adapter: &dyn CatalogAdapter,
    warehouse: &Warehouse,
    table: &ConfiguredTable,
    config: &SyncRunConfig,
    since: &str,
) -> TableResult {
    let table_ref = table.table_ref();
    let name = table_ref.full_name.clone();

    let records = match tokio::time::timeout(
        config.asset_timeout,
        source.latest_check_runs(table_ref.table_id, since),
    )
    .await
    {
        Ok(Ok(records)) => records,
        Ok(Err(error)) => {
            return TableResult::failed(
                warehouse,
                &name,
                AssetStage::FetchChecks,
                format!("{error:#}"),
            )
        }
        Err(_) => {
            return TableResult::failed(
                warehouse,
                &name,
                AssetStage::FetchChecks,
                format!(
                    "check results not received within {}ms",
                    config.asset_timeout.as_millis()
                ),
            )
        }
    };

    let profile = match tokio::time::timeout(
        config.asset_timeout,
        source.table_profile(warehouse.id, table_ref.table_id),
    )
    .await
    {
        Ok(Ok(profile)) => Some(profile),
        Ok(Err(error)) => {
            tracing::warn!(table = %name, error = %format!("{error:#}"), "table profile unavailable");
            None
        }
        Err(_) => {
            tracing::warn!(table = %name, "table profile lookup timed out");
            None
        }
    };

    let monitor_url = source.table_url(table_ref.table_id);
    let summary = summarize_check_records(table_ref, monitor_url, &records, profile);
    let delta = reconcile_tags(&summary, &config.vocabulary);
    tracing::debug!(
        table = %name,
        table_passed = summary.table_passed(),
        apply = ?delta.apply_names(),
        remove = ?delta.remove_names(),
        "reconciled table status"
    );

    let asset = AssetSync {
        summary: &summary,
        delta: &delta,
    };
    match adapter.update_catalog_asset(warehouse, &asset).await {
        Ok(AssetUpdate::Updated { .. }) => TableResult::completed(SyncOutcome::Updated),
        Ok(AssetUpdate::Skipped { reason }) => {
            tracing::info!(warehouse = %warehouse.name, table = %name, reason = %reason, "skipped table");
            TableResult::completed(SyncOutcome::Skipped)
        }
        Err(error) => TableResult::failed(warehouse, &name, error.stage(), error.to_string()),
    }
}
