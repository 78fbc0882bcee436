use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dqsync_catalog::{
    build_adapter, AssetStage, CatalogKind, CatalogSettings, CatalogSyncOptions, PurviewSettings,
};
use dqsync_checks::ProfileAttachment;
use dqsync_core::RetryPolicy;
use dqsync_monitor::{ConfiguredTable, ConfiguredTableInfo, MonitorSource, Warehouse};
use dqsync_sync::{run_catalog_sync, SyncRunConfig};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::sync::watch;

struct ScriptedMonitor {
    warehouses: Vec<Warehouse>,
    tables: HashMap<u64, Vec<ConfiguredTable>>,
    runs: HashMap<u64, Vec<Value>>,
    requested: Mutex<Vec<u64>>,
}

impl ScriptedMonitor {
    fn new() -> Self {
        Self {
            warehouses: Vec::new(),
            tables: HashMap::new(),
            runs: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn with_warehouse(mut self, id: u64, name: &str, warehouse_type: &str) -> Self {
        self.warehouses.push(Warehouse {
            id,
            name: name.to_string(),
            warehouse_type: Some(warehouse_type.to_string()),
            project_id: None,
        });
        self
    }

    fn with_table(mut self, warehouse_id: u64, table_id: u64, full_name: &str, runs: Value) -> Self {
        self.tables
            .entry(warehouse_id)
            .or_default()
            .push(ConfiguredTable {
                table: ConfiguredTableInfo {
                    id: table_id,
                    full_name: full_name.to_string(),
                    warehouse_id: Some(warehouse_id),
                },
            });
        let records = runs.as_array().cloned().unwrap_or_default();
        self.runs.insert(table_id, records);
        self
    }

    fn requested_tables(&self) -> Vec<u64> {
        let mut requested = self.requested.lock().expect("requested lock").clone();
        requested.sort_unstable();
        requested
    }
}

#[async_trait]
impl MonitorSource for ScriptedMonitor {
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        Ok(self.warehouses.clone())
    }

    async fn configured_tables(&self, warehouse_id: u64) -> Result<Vec<ConfiguredTable>> {
        Ok(self.tables.get(&warehouse_id).cloned().unwrap_or_default())
    }

    async fn latest_check_runs(&self, table_id: u64, _since: &str) -> Result<Vec<Value>> {
        self.requested
            .lock()
            .expect("requested lock")
            .push(table_id);
        self.runs
            .get(&table_id)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted runs for table {table_id}"))
    }

    async fn table_profile(&self, _warehouse_id: u64, _table_id: u64) -> Result<ProfileAttachment> {
        Err(anyhow!("profile not scripted"))
    }

    fn table_url(&self, table_id: u64) -> String {
        format!("https://monitor.test/dashboard/orgs/1/tables/{table_id}")
    }
}

fn check_run(check_type: &str, success: Option<bool>) -> Value {
    json!({
        "run_config": {"_metadata": {"check_type": check_type}},
        "results": {"success": success}
    })
}

fn purview_settings(server: &MockServer) -> CatalogSettings {
    CatalogSettings {
        purview: PurviewSettings {
            tenant_id: Some("tenant-1".to_string()),
            client_id: Some("client-1".to_string()),
            client_secret: Some("secret-1".to_string()),
            root_url: Some(server.base_url()),
            login_base: Some(server.url("/login")),
        },
        retry: RetryPolicy {
            request_timeout_ms: 3_000,
            max_attempts: 1,
            base_delay_ms: 1,
        },
        ..CatalogSettings::default()
    }
}

fn mock_purview_session(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/login/tenant-1/oauth2/token");
        then.status(200).json_body(json!({"access_token": "pv-token"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/catalog/api/atlas/v2/types/typedefs");
        then.status(409)
            .json_body(json!({"errorMessage": "AnomaloDQ already exists"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/catalog/api/browse");
        then.status(200).json_body(json!({
            "value": [
                {"id": "guid-orders", "name": "orders"},
                {"id": "guid-users", "name": "users"}
            ]
        }));
    });
}

#[tokio::test]
async fn integration_purview_run_isolates_failures_and_skips_unknown_assets() {
    let server = MockServer::start();
    mock_purview_session(&server);
    let orders_labels = server.mock(|when, then| {
        when.method(PUT)
            .path("/catalog/api/atlas/v2/entity/guid/guid-orders/labels")
            .json_body(json!(["ANOMALO_MONITORED", "ANOMALO_DQ_CHECKS_PASSED"]));
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(DELETE)
            .path("/catalog/api/atlas/v2/entity/guid/guid-orders/labels");
        then.status(204);
    });
    let certify = server.mock(|when, then| {
        when.method(POST)
            .path("/catalog/api/atlas/v2/entity/bulk/classification")
            .body_includes("guid-orders");
        then.status(200).json_body(json!({}));
    });
    let metadata = server.mock(|when, then| {
        when.method(POST)
            .path("/catalog/api/atlas/v2/entity/guid/guid-orders/businessmetadata")
            .body_includes("AnomaloChecks");
        then.status(204);
    });
    let users_labels = server.mock(|when, then| {
        when.method(PUT)
            .path("/catalog/api/atlas/v2/entity/guid/guid-users/labels");
        then.status(500).body("catalog unavailable");
    });

    let monitor = ScriptedMonitor::new()
        .with_warehouse(2, "NICK-main", "databricks")
        .with_table(
            2,
            10,
            "sales.orders",
            json!([check_run("rule", Some(true)), check_run("data_freshness", Some(true))]),
        )
        .with_table(2, 11, "crm.users", json!([check_run("rule", Some(false))]))
        .with_table(2, 12, "ops.audit_log", json!([check_run("rule", Some(true))]));

    let mut adapter = build_adapter(
        CatalogKind::Purview,
        &purview_settings(&server),
        CatalogSyncOptions::default(),
    )
    .expect("build adapter");
    adapter.configure().await.expect("configure purview");

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let config = SyncRunConfig {
        workers: 2,
        ..SyncRunConfig::default()
    };
    let report = run_catalog_sync(&monitor, adapter.as_ref(), &config, cancel_rx)
        .await
        .expect("run sync");

    orders_labels.assert();
    certify.assert();
    metadata.assert();
    users_labels.assert();
    assert_eq!(monitor.requested_tables(), vec![10, 11, 12]);
    assert_eq!(report.warehouses, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.cancelled);
    let failure = &report.failures[0];
    assert_eq!(failure.table, "crm.users");
    assert_eq!(failure.stage, AssetStage::ApplyTags);
    assert!(failure.cause.contains("500"));
}

#[tokio::test]
async fn regression_cancelled_run_starts_no_tables() {
    let server = MockServer::start();
    mock_purview_session(&server);
    let monitor = ScriptedMonitor::new()
        .with_warehouse(2, "NICK-main", "databricks")
        .with_table(2, 10, "sales.orders", json!([check_run("rule", Some(true))]));

    let mut adapter = build_adapter(
        CatalogKind::Purview,
        &purview_settings(&server),
        CatalogSyncOptions::default(),
    )
    .expect("build adapter");
    adapter.configure().await.expect("configure purview");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).expect("send cancel");
    let report = run_catalog_sync(&monitor, adapter.as_ref(), &SyncRunConfig::default(), cancel_rx)
        .await
        .expect("run sync");

    assert!(report.cancelled);
    assert_eq!(report.total(), 0);
    assert!(monitor.requested_tables().is_empty());
}
