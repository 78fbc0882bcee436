use dqsync_checks::TableRef;
use serde::Deserialize;

/// A data source ("warehouse") registered in the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Warehouse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub warehouse_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Warehouse {
    pub fn label(&self) -> String {
        format!("`{}` ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfiguredTableInfo {
    pub id: u64,
    pub full_name: String,
    #[serde(default)]
    pub warehouse_id: Option<u64>,
}

/// A table with checks configured in the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfiguredTable {
    pub table: ConfiguredTableInfo,
}

impl ConfiguredTable {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.table.id, self.table.full_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WarehouseListResponse {
    #[serde(default)]
    pub(crate) warehouses: Vec<Warehouse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PingResponse {
    #[serde(default)]
    pub(crate) ping: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActiveOrganizationResponse {
    pub(crate) id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckInterval {
    #[serde(default)]
    pub(crate) latest_run_checks_job_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RunResultResponse {
    #[serde(default)]
    pub(crate) check_runs: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImageRef {
    #[serde(default)]
    pub(crate) img_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TableProfileResponse {
    #[serde(default)]
    pub(crate) profile: Option<ImageRef>,
    #[serde(default)]
    pub(crate) columns: Option<ImageRef>,
}
