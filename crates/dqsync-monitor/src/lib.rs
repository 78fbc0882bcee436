//! Client for the data-quality monitoring service.
//!
//! The orchestrator only depends on [`MonitorSource`]; [`AnomaloClient`] is the
//! HTTP implementation used by the binary.

mod client;
mod types;

use anyhow::Result;
use async_trait::async_trait;
use dqsync_checks::ProfileAttachment;
use serde_json::Value;

pub use client::{AnomaloClient, AnomaloConfig};
pub use types::{ConfiguredTable, ConfiguredTableInfo, Organization, Warehouse};

/// Read-only view of the monitoring service consumed by a sync run.
#[async_trait]
pub trait MonitorSource: Send + Sync {
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>>;

    async fn configured_tables(&self, warehouse_id: u64) -> Result<Vec<ConfiguredTable>>;

    /// Raw `check_runs[]` records of the latest check job run since `since` (`YYYY-MM-DD`).
    async fn latest_check_runs(&self, table_id: u64, since: &str) -> Result<Vec<Value>>;

    /// Best-effort profile lookup; callers degrade to no attachment on error.
    async fn table_profile(&self, warehouse_id: u64, table_id: u64) -> Result<ProfileAttachment>;

    fn table_url(&self, table_id: u64) -> String;
}
