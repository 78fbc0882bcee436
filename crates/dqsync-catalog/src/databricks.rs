//! Unity Catalog backend: table comments and table tags through the SQL statement API.

use std::time::Duration;

use async_trait::async_trait;
use dqsync_annotation::{merge_annotation, render_status, MergeKind, StatusFormat};
use dqsync_core::RetryPolicy;
use dqsync_monitor::Warehouse;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::adapter::{AssetSync, AssetUpdate, CatalogAdapter};
use crate::error::{AssetStage, CatalogError};
use crate::http::{normalize_root_url, CatalogHttp};
use crate::registry::{require_setting, CatalogKind, CatalogSyncOptions};

const STATEMENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct DatabricksSettings {
    pub host: Option<String>,
    pub token: Option<String>,
    pub warehouse_uid: Option<String>,
}

#[derive(Debug, Clone)]
struct DatabricksConnection {
    host: String,
    token: String,
    warehouse_uid: String,
}

pub struct DatabricksAdapter {
    settings: DatabricksSettings,
    options: CatalogSyncOptions,
    http: CatalogHttp,
    connection: Option<DatabricksConnection>,
}

#[derive(Debug, Deserialize)]
struct UnityTable {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    #[serde(default)]
    status: StatementStatus,
}

#[derive(Debug, Default, Deserialize)]
struct StatementStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<StatementErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StatementErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl DatabricksAdapter {
    pub fn new(
        settings: DatabricksSettings,
        options: CatalogSyncOptions,
        retry: RetryPolicy,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            settings,
            options,
            http: CatalogHttp::new(retry)?,
            connection: None,
        })
    }

    fn connection(&self) -> Result<&DatabricksConnection, CatalogError> {
        self.connection.as_ref().ok_or_else(|| {
            CatalogError::configuration("databricks adapter used before configure()")
        })
    }

    async fn fetch_table(
        &self,
        connection: &DatabricksConnection,
        full_name: &str,
    ) -> Result<Option<UnityTable>, CatalogError> {
        let operation = "get unity catalog table";
        let url = format!(
            "{}/api/2.1/unity-catalog/tables/{full_name}",
            connection.host
        );
        let reply = self
            .http
            .send(AssetStage::ResolveAsset, operation, |client| {
                client.get(&url).bearer_auth(&connection.token)
            })
            .await?;
        if reply.status == 404 {
            return Ok(None);
        }
        if !reply.is_success() {
            return Err(reply.into_error(AssetStage::ResolveAsset, operation));
        }
        reply.decode(AssetStage::ResolveAsset, operation).map(Some)
    }

    /// Executes one statement and polls it to a terminal state within the wait budget.
    async fn run_sql(
        &self,
        connection: &DatabricksConnection,
        stage: AssetStage,
        operation: &str,
        statement: &str,
    ) -> Result<(), CatalogError> {
        let budget = self.options.statement_wait_budget;
        let started = Instant::now();
        let url = format!("{}/api/2.0/sql/statements", connection.host);
        let body = json!({
            "statement": statement,
            "warehouse_id": connection.warehouse_uid,
            "wait_timeout": inline_wait_timeout(budget),
            "on_wait_timeout": "CONTINUE",
        });
        let mut response: StatementResponse = self
            .http
            .send_ok(stage, operation, |client| {
                client.post(&url).bearer_auth(&connection.token).json(&body)
            })
            .await?
            .decode(stage, operation)?;

        loop {
            match response.status.state.as_str() {
                "SUCCEEDED" => return Ok(()),
                "PENDING" | "RUNNING" => {}
                state => {
                    let message = response
                        .status
                        .error
                        .and_then(|error| error.message)
                        .unwrap_or_else(|| format!("statement ended in state {state}"));
                    return Err(CatalogError::backend(stage, operation, None, message));
                }
            }

            let Some(statement_id) = response.statement_id.clone() else {
                return Err(CatalogError::backend(
                    stage,
                    operation,
                    None,
                    "pending statement has no statement_id",
                ));
            };
            let elapsed = started.elapsed();
            if elapsed >= budget {
                self.cancel_statement(connection, &statement_id).await;
                return Err(CatalogError::Timeout {
                    stage,
                    operation: operation.to_string(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            tokio::time::sleep(STATEMENT_POLL_INTERVAL.min(budget - elapsed)).await;

            let poll_url = format!("{url}/{statement_id}");
            response = self
                .http
                .send_ok(stage, operation, |client| {
                    client.get(&poll_url).bearer_auth(&connection.token)
                })
                .await?
                .decode(stage, operation)?;
        }
    }

    async fn cancel_statement(&self, connection: &DatabricksConnection, statement_id: &str) {
        let url = format!(
            "{}/api/2.0/sql/statements/{statement_id}/cancel",
            connection.host
        );
        let result = self
            .http
            .send(AssetStage::Apply, "cancel sql statement", |client| {
                client.post(&url).bearer_auth(&connection.token)
            })
            .await;
        if let Err(error) = result {
            tracing::warn!(statement_id, error = %error, "failed to cancel timed out statement");
        }
    }
}

#[async_trait]
impl CatalogAdapter for DatabricksAdapter {
    fn kind(&self) -> CatalogKind {
        CatalogKind::Databricks
    }

    async fn configure(&mut self) -> Result<(), CatalogError> {
        tracing::info!("initializing databricks integration");
        let raw_host = require_setting(&self.settings.host, "DATABRICKS_HOST")?;
        let host = normalize_root_url(&raw_host).ok_or_else(|| {
            CatalogError::configuration(format!("DATABRICKS_HOST `{raw_host}` is not a valid host"))
        })?;
        self.connection = Some(DatabricksConnection {
            host,
            token: require_setting(&self.settings.token, "DATABRICKS_TOKEN")?,
            warehouse_uid: require_setting(
                &self.settings.warehouse_uid,
                "DATABRICKS_WAREHOUSE_UID",
            )?,
        });
        Ok(())
    }

    fn include_warehouse(&self, warehouse: &Warehouse) -> bool {
        metastore_name(warehouse).is_some()
    }

    async fn update_catalog_asset(
        &self,
        warehouse: &Warehouse,
        asset: &AssetSync<'_>,
    ) -> Result<AssetUpdate, CatalogError> {
        let connection = self.connection()?;
        let table = asset.summary.table();
        let Some(metastore) = metastore_name(warehouse) else {
            return Ok(AssetUpdate::skipped(format!(
                "warehouse {} has no catalog name",
                warehouse.label()
            )));
        };
        let full_name = format!("{metastore}.{}", table.full_name);
        let Some(unity_table) = self.fetch_table(connection, &full_name).await? else {
            return Ok(AssetUpdate::skipped(format!(
                "no unity catalog table named `{full_name}`"
            )));
        };
        let asset_id = unity_table.full_name.unwrap_or_else(|| full_name.clone());
        let identifier = quote_identifier(&asset_id);

        let existing = unity_table.comment.unwrap_or_default();
        let format = StatusFormat::Markdown;
        let block = render_status(asset.summary, format);
        let merged = merge_annotation(
            &existing,
            &block,
            format.markers(),
            self.options.description_mode,
        );
        if merged.kind == MergeKind::DiscardedMalformed {
            tracing::warn!(
                asset = %asset_id,
                "replacing status block with a damaged separator in table comment"
            );
        }
        if merged.text == existing {
            tracing::debug!(asset = %asset_id, "table comment already current");
        } else {
            let statement = format!(
                "COMMENT ON TABLE {identifier} IS {}",
                sql_string_literal(&merged.text)
            );
            self.run_sql(
                connection,
                AssetStage::WriteAnnotation,
                "comment on table",
                &statement,
            )
            .await?;
        }

        if self.options.update_labels {
            if !asset.delta.to_apply.is_empty() {
                let assignments = asset
                    .delta
                    .apply_names()
                    .into_iter()
                    .map(|tag| format!("{} = 'y'", sql_string_literal(tag)))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.run_sql(
                    connection,
                    AssetStage::ApplyTags,
                    "set table tags",
                    &format!("ALTER TABLE {identifier} SET TAGS ({assignments})"),
                )
                .await?;
            }
            if !asset.delta.to_remove.is_empty() {
                let keys = asset
                    .delta
                    .remove_names()
                    .into_iter()
                    .map(sql_string_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.run_sql(
                    connection,
                    AssetStage::RemoveTags,
                    "unset table tags",
                    &format!("ALTER TABLE {identifier} UNSET TAGS ({keys})"),
                )
                .await?;
            }
        }

        tracing::info!(
            warehouse = %warehouse.name,
            table = %table.full_name,
            asset = %asset_id,
            "updated databricks table"
        );
        Ok(AssetUpdate::updated(asset_id))
    }
}

/// Catalog name encoded in a Databricks warehouse name (`NICKNAME-CATALOG` or `NICKNAME_CATALOG`).
pub(crate) fn metastore_name(warehouse: &Warehouse) -> Option<String> {
    if warehouse.warehouse_type.as_deref() != Some("databricks") {
        return None;
    }
    let name = warehouse.name.as_str();
    let catalog = name
        .split_once('-')
        .or_else(|| name.split_once('_'))
        .map(|(_, catalog)| catalog.trim())
        .filter(|catalog| !catalog.is_empty());
    if catalog.is_none() {
        tracing::warn!(
            warehouse = %warehouse.label(),
            "databricks warehouse names must follow `NICKNAME-CATALOG` or `NICKNAME_CATALOG`"
        );
    }
    catalog.map(str::to_string)
}

fn quote_identifier(full_name: &str) -> String {
    full_name
        .split('.')
        .map(|segment| format!("`{}`", segment.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

fn sql_string_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Inline wait accepted by the statement API: `0s` or 5 to 50 seconds.
fn inline_wait_timeout(budget: Duration) -> String {
    let seconds = budget.as_secs();
    if seconds < 5 {
        "0s".to_string()
    } else {
        format!("{}s", seconds.min(50))
    }
}
