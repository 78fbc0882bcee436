//! BigQuery descriptions and labels, plus the Dataplex status aspect.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use dqsync_annotation::{merge_annotation, render_status, MergeKind, StatusFormat};
use dqsync_core::RetryPolicy;
use dqsync_monitor::Warehouse;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::adapter::{AssetSync, AssetUpdate, CatalogAdapter};
use crate::error::{AssetStage, CatalogError};
use crate::http::CatalogHttp;
use crate::registry::{require_setting, CatalogKind, CatalogSyncOptions};

pub const ASPECT_TYPE_ID: &str = "anomalo-dq-status";
pub const ASPECT_FIELD: &str = "anomalo-status";
const DEFAULT_BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_DATAPLEX_API_BASE: &str = "https://dataplex.googleapis.com/v1";
const OPERATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct DataplexSettings {
    pub access_token: Option<String>,
    /// Used when a warehouse carries no `project_id`.
    pub default_project: Option<String>,
    pub bigquery_api_base: Option<String>,
    pub dataplex_api_base: Option<String>,
}

#[derive(Debug, Clone)]
struct GoogleConnection {
    token: String,
    bigquery_base: String,
    dataplex_base: String,
}

pub struct DataplexAdapter {
    settings: DataplexSettings,
    options: CatalogSyncOptions,
    http: CatalogHttp,
    connection: Option<GoogleConnection>,
    ensured_aspect_types: Mutex<HashSet<String>>,
}

#[derive(Debug, Deserialize)]
struct BigQueryTable {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntriesResponse {
    #[serde(default)]
    results: Vec<SearchEntryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntryResult {
    #[serde(default)]
    linked_resource: String,
    #[serde(default)]
    dataplex_entry: Option<DataplexEntry>,
}

#[derive(Debug, Deserialize)]
struct DataplexEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LongRunningOperation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<Value>,
}

impl DataplexAdapter {
    pub fn new(
        settings: DataplexSettings,
        options: CatalogSyncOptions,
        retry: RetryPolicy,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            settings,
            options,
            http: CatalogHttp::new(retry)?,
            connection: None,
            ensured_aspect_types: Mutex::new(HashSet::new()),
        })
    }

    fn connection(&self) -> Result<&GoogleConnection, CatalogError> {
        self.connection
            .as_ref()
            .ok_or_else(|| CatalogError::configuration("dataplex adapter used before configure()"))
    }

    async fn fetch_table(
        &self,
        connection: &GoogleConnection,
        url: &str,
    ) -> Result<Option<BigQueryTable>, CatalogError> {
        let operation = "get bigquery table";
        let reply = self
            .http
            .send(AssetStage::ResolveAsset, operation, |client| {
                client.get(url).bearer_auth(&connection.token)
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

    /// Description and label patch, or `None` when neither is enabled or nothing changes.
    fn table_patch(&self, table: &BigQueryTable, asset: &AssetSync<'_>) -> Option<Value> {
        let mut patch = Map::new();
        if self.options.update_description {
            let existing = table.description.clone().unwrap_or_default();
            let format = StatusFormat::Plaintext;
            let merged = merge_annotation(
                &existing,
                &render_status(asset.summary, format),
                format.markers(),
                self.options.description_mode,
            );
            if merged.kind == MergeKind::DiscardedMalformed {
                tracing::warn!(
                    table = %asset.summary.table().full_name,
                    "replacing status block with a damaged separator in table description"
                );
            }
            if merged.text != existing {
                patch.insert("description".to_string(), Value::String(merged.text));
            }
        }
        if self.options.update_labels {
            let mut labels = Map::new();
            for tag in &asset.delta.to_apply {
                let key = tag.label_key();
                if table.labels.get(&key).map(String::as_str) != Some("y") {
                    labels.insert(key, Value::String("y".to_string()));
                }
            }
            for tag in &asset.delta.to_remove {
                let key = tag.label_key();
                if table.labels.contains_key(&key) {
                    labels.insert(key, Value::Null);
                }
            }
            if !labels.is_empty() {
                patch.insert("labels".to_string(), Value::Object(labels));
            }
        }
        if patch.is_empty() {
            None
        } else {
            Some(Value::Object(patch))
        }
    }

    async fn find_entry(
        &self,
        connection: &GoogleConnection,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> Result<Option<DataplexEntry>, CatalogError> {
        let operation = "search dataplex entries";
        let url = format!(
            "{}/projects/{project}/locations/global:searchEntries",
            connection.dataplex_base
        );
        let query = format!("{dataset}.{table}");
        let response: SearchEntriesResponse = self
            .http
            .send_ok(AssetStage::ResolveAsset, operation, |client| {
                client
                    .post(&url)
                    .bearer_auth(&connection.token)
                    .query(&[("query", query.as_str())])
            })
            .await?
            .decode(AssetStage::ResolveAsset, operation)?;
        let match_key = format!("/datasets/{dataset}/tables/{table}").to_lowercase();
        Ok(response
            .results
            .into_iter()
            .find(|result| result.linked_resource.to_lowercase().ends_with(&match_key))
            .and_then(|result| result.dataplex_entry))
    }

    /// Registers the status aspect type under `parent` once per run; an existing type is success.
    async fn ensure_aspect_type(
        &self,
        connection: &GoogleConnection,
        parent: &str,
    ) -> Result<(), CatalogError> {
        let mut ensured = self.ensured_aspect_types.lock().await;
        if ensured.contains(parent) {
            return Ok(());
        }
        let stage = AssetStage::EnsureSchema;
        let aspect_type_url = format!(
            "{}/{parent}/aspectTypes/{ASPECT_TYPE_ID}",
            connection.dataplex_base
        );
        let existing = self
            .http
            .send(stage, "get aspect type", |client| {
                client.get(&aspect_type_url).bearer_auth(&connection.token)
            })
            .await?;
        if existing.is_success() {
            ensured.insert(parent.to_string());
            return Ok(());
        }
        if existing.status != 404 {
            return Err(existing.into_error(stage, "get aspect type"));
        }

        tracing::info!(parent, "registering dataplex aspect type");
        let create_url = format!("{}/{parent}/aspectTypes", connection.dataplex_base);
        let body = aspect_type_definition();
        let reply = self
            .http
            .send(stage, "create aspect type", |client| {
                client
                    .post(&create_url)
                    .bearer_auth(&connection.token)
                    .query(&[("aspectTypeId", ASPECT_TYPE_ID)])
                    .json(&body)
            })
            .await?;
        if reply.status == 409 {
            ensured.insert(parent.to_string());
            return Ok(());
        }
        if !reply.is_success() {
            return Err(reply.into_error(stage, "create aspect type"));
        }
        let operation: LongRunningOperation = reply.decode(stage, "create aspect type")?;
        self.wait_for_operation(connection, operation).await?;
        ensured.insert(parent.to_string());
        Ok(())
    }

    async fn wait_for_operation(
        &self,
        connection: &GoogleConnection,
        mut operation: LongRunningOperation,
    ) -> Result<(), CatalogError> {
        let stage = AssetStage::EnsureSchema;
        let budget = self.options.statement_wait_budget;
        let started = Instant::now();
        loop {
            if operation.done {
                return match operation.error {
                    Some(error) => Err(CatalogError::backend(
                        stage,
                        "create aspect type",
                        None,
                        error.to_string(),
                    )),
                    None => Ok(()),
                };
            }
            let Some(name) = operation.name.clone() else {
                return Err(CatalogError::backend(
                    stage,
                    "create aspect type",
                    None,
                    "pending operation has no name",
                ));
            };
            let elapsed = started.elapsed();
            if elapsed >= budget {
                return Err(CatalogError::Timeout {
                    stage,
                    operation: "create aspect type".to_string(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            tokio::time::sleep(OPERATION_POLL_INTERVAL.min(budget - elapsed)).await;
            let url = format!("{}/{name}", connection.dataplex_base);
            operation = self
                .http
                .send_ok(stage, "poll aspect type operation", |client| {
                    client.get(&url).bearer_auth(&connection.token)
                })
                .await?
                .decode(stage, "poll aspect type operation")?;
        }
    }

    async fn write_aspect(
        &self,
        connection: &GoogleConnection,
        entry: &DataplexEntry,
        asset: &AssetSync<'_>,
    ) -> Result<(), CatalogError> {
        let Some(parent) = aspect_parent(&entry.name) else {
            return Err(CatalogError::backend(
                AssetStage::WriteStructuredFields,
                "update entry aspects",
                None,
                format!("unexpected dataplex entry name `{}`", entry.name),
            ));
        };
        self.ensure_aspect_type(connection, parent).await?;

        let key = aspect_key(parent);
        let body = json!({
            "aspects": {
                key.clone(): {
                    "data": { ASPECT_FIELD: render_status(asset.summary, StatusFormat::RichTable) }
                }
            }
        });
        let url = format!("{}/{}", connection.dataplex_base, entry.name);
        self.http
            .send_ok(
                AssetStage::WriteStructuredFields,
                "update entry aspects",
                |client| {
                    client
                        .patch(&url)
                        .bearer_auth(&connection.token)
                        .query(&[("updateMask", "aspects"), ("aspectKeys", key.as_str())])
                        .json(&body)
                },
            )
            .await?;
        tracing::debug!(entry = %entry.name, aspect = %key, "updated dataplex aspect");
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for DataplexAdapter {
    fn kind(&self) -> CatalogKind {
        CatalogKind::Dataplex
    }

    async fn configure(&mut self) -> Result<(), CatalogError> {
        tracing::info!("initializing dataplex integration");
        let token = require_setting(&self.settings.access_token, "GOOGLE_OAUTH_ACCESS_TOKEN")?;
        self.connection = Some(GoogleConnection {
            token,
            bigquery_base: api_base(&self.settings.bigquery_api_base, DEFAULT_BIGQUERY_API_BASE),
            dataplex_base: api_base(&self.settings.dataplex_api_base, DEFAULT_DATAPLEX_API_BASE),
        });
        Ok(())
    }

    async fn update_catalog_asset(
        &self,
        warehouse: &Warehouse,
        asset: &AssetSync<'_>,
    ) -> Result<AssetUpdate, CatalogError> {
        let connection = self.connection()?;
        let table_ref = asset.summary.table();
        let Some(project) = warehouse
            .project_id
            .clone()
            .or_else(|| self.settings.default_project.clone())
            .filter(|project| !project.trim().is_empty())
        else {
            return Ok(AssetUpdate::skipped(format!(
                "warehouse {} has no project_id and GOOGLE_CLOUD_PROJECT is unset",
                warehouse.label()
            )));
        };
        let segments = table_ref.name_segments();
        let [.., dataset, table] = segments.as_slice() else {
            return Ok(AssetUpdate::skipped(format!(
                "`{}` is not a dataset.table name",
                table_ref.full_name
            )));
        };
        let asset_id = format!("{project}.{dataset}.{table}");
        let table_url = format!(
            "{}/projects/{project}/datasets/{dataset}/tables/{table}",
            connection.bigquery_base
        );
        let Some(bigquery_table) = self.fetch_table(connection, &table_url).await? else {
            return Ok(AssetUpdate::skipped(format!(
                "no bigquery table `{asset_id}` in warehouse {}",
                warehouse.label()
            )));
        };

        if let Some(patch) = self.table_patch(&bigquery_table, asset) {
            let stage = if patch.get("description").is_some() {
                AssetStage::WriteAnnotation
            } else {
                AssetStage::ApplyTags
            };
            self.http
                .send_ok(stage, "patch bigquery table", |client| {
                    client
                        .patch(&table_url)
                        .bearer_auth(&connection.token)
                        .json(&patch)
                })
                .await?;
            tracing::debug!(
                asset = %bigquery_table.id.as_deref().unwrap_or(&asset_id),
                "patched bigquery table"
            );
        }

        if self.options.update_aspect {
            match self.find_entry(connection, &project, dataset, table).await? {
                Some(entry) => self.write_aspect(connection, &entry, asset).await?,
                None => tracing::warn!(
                    asset = %asset_id,
                    "no dataplex entry found; status aspect not updated"
                ),
            }
        }

        tracing::info!(
            warehouse = %warehouse.name,
            table = %table_ref.full_name,
            asset = %asset_id,
            "updated bigquery table"
        );
        Ok(AssetUpdate::updated(asset_id))
    }
}

fn api_base(configured: &Option<String>, default: &str) -> String {
    configured
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// `projects/<p>/locations/<l>` prefix of an entry name.
fn aspect_parent(entry_name: &str) -> Option<&str> {
    entry_name
        .split_once("/entryGroups")
        .map(|(parent, _)| parent)
        .filter(|parent| parent.starts_with("projects/") && parent.contains("/locations/"))
}

/// Aspect map key in the `project.location.aspectType` form the entry API requires.
fn aspect_key(parent: &str) -> String {
    let dotted = parent
        .trim_start_matches("projects/")
        .replace("/locations/", ".");
    format!("{dotted}.{ASPECT_TYPE_ID}")
}

fn aspect_type_definition() -> Value {
    json!({
        "displayName": "Anomalo",
        "description": "Anomalo Data Quality details",
        "metadataTemplate": {
            "name": "UserSchema",
            "type": "record",
            "recordFields": [{
                "index": 1,
                "name": ASPECT_FIELD,
                "type": "string",
                "annotations": {
                    "stringType": "richText",
                    "displayName": "DQ Status",
                    "displayOrder": 1,
                    "description": "Latest Data Quality status from Anomalo"
                }
            }]
        }
    })
}
