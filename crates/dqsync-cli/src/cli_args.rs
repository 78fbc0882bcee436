use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use dqsync_annotation::MergeMode;
use dqsync_catalog::{
    CatalogKind, CatalogSettings, CatalogSyncOptions, DatabricksSettings, DataplexSettings,
    PurviewSettings,
};
use dqsync_core::RetryPolicy;
use dqsync_monitor::AnomaloConfig;
use dqsync_sync::SyncRunConfig;
use dqsync_tags::TagVocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliCatalogKind {
    Databricks,
    Dataplex,
    Purview,
}

impl From<CliCatalogKind> for CatalogKind {
    fn from(value: CliCatalogKind) -> Self {
        match value {
            CliCatalogKind::Databricks => CatalogKind::Databricks,
            CliCatalogKind::Dataplex => CatalogKind::Dataplex,
            CliCatalogKind::Purview => CatalogKind::Purview,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dq-catalog-sync",
    about = "Sync Anomalo check metadata with your data catalog.",
    version
)]
pub(crate) struct Cli {
    #[arg(long = "catalogs", help = "List available catalog integrations")]
    pub(crate) list_catalogs: bool,

    #[arg(long, value_enum, help = "Catalog type")]
    pub(crate) catalog: Option<CliCatalogKind>,

    #[arg(
        long = "list-anomalo-organizations",
        help = "List available Anomalo organizations"
    )]
    pub(crate) list_organizations: bool,

    #[arg(
        long,
        env = "ANOMALO_ORGANIZATION_ID",
        help = "Anomalo organization id (default: last organization used by the API token's user)"
    )]
    pub(crate) anomalo_organization_id: Option<u64>,

    #[arg(
        long,
        env = "ANOMALO_INSTANCE_HOST",
        default_value = "app.anomalo.com",
        help = "Anomalo deployment host"
    )]
    pub(crate) anomalo_instance_host: String,

    #[arg(
        long,
        env = "ANOMALO_PROTOCOL",
        default_value = "https",
        help = "Protocol used to reach the Anomalo deployment"
    )]
    pub(crate) anomalo_protocol: String,

    #[arg(
        long,
        env = "ANOMALO_API_SECRET_TOKEN",
        hide_env_values = true,
        help = "Anomalo API token"
    )]
    pub(crate) anomalo_api_secret_token: Option<String>,

    #[arg(
        long,
        help = "Only sync tables from the named Anomalo data source (aka warehouse)"
    )]
    pub(crate) warehouse_name: Option<String>,

    #[arg(
        long,
        help = "Only sync tables from the Anomalo data source (aka warehouse) with this id"
    )]
    pub(crate) warehouse_id: Option<u64>,

    #[arg(
        long,
        help = "Update the table's description field with Anomalo metadata (default: disabled)"
    )]
    pub(crate) update_table_description: bool,

    #[arg(
        long,
        help = "Replace the whole description instead of preserving user-authored content (implies --update-table-description)"
    )]
    pub(crate) overwrite_table_description: bool,

    #[arg(
        long,
        help = "Disable applying labels to monitored assets in the catalog (default: enabled)"
    )]
    pub(crate) no_update_labels: bool,

    #[arg(
        long,
        help = "Disable updating the Anomalo structured metadata in the catalog (default: enabled)"
    )]
    pub(crate) no_update_aspect: bool,

    #[arg(
        long,
        help = "Disable applying endorsement to monitored assets in the catalog (default: enabled)"
    )]
    pub(crate) no_update_endorsement: bool,

    #[arg(
        long,
        help = "Force re-registration of catalog metadata type definitions (default: disabled)"
    )]
    pub(crate) force_update_typedefs: bool,

    #[arg(
        long,
        env = "DQ_SYNC_TAG_VOCABULARY",
        conflicts_with = "granular_tags",
        help = "Comma separated tags the run manages, e.g. ANOMALO_MONITORED,ANOMALO_DQ_CHECKS_FAILED"
    )]
    pub(crate) tag_vocabulary: Option<TagVocabulary>,

    #[arg(long, help = "Manage the per-category pass/fail tags as well")]
    pub(crate) granular_tags: bool,

    #[arg(
        long,
        env = "DQ_SYNC_WORKERS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..=64),
        help = "Tables synced concurrently within one data source"
    )]
    pub(crate) workers: u64,

    #[arg(
        long,
        env = "DQ_SYNC_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Timeout for each HTTP request"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long,
        env = "DQ_SYNC_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        help = "Attempts per HTTP request for retryable failures"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long,
        env = "DQ_SYNC_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base backoff between HTTP retries"
    )]
    pub(crate) retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "DQ_SYNC_STATEMENT_WAIT_BUDGET_MS",
        default_value_t = 30_000,
        help = "Polling budget for asynchronous catalog operations"
    )]
    pub(crate) statement_wait_budget_ms: u64,

    #[arg(
        long,
        env = "DQ_SYNC_ASSET_TIMEOUT_MS",
        default_value_t = 120_000,
        help = "Bound on fetching one table's check results"
    )]
    pub(crate) asset_timeout_ms: u64,

    #[arg(
        long,
        env = "DQ_SYNC_LOOKBACK_DAYS",
        default_value_t = 1,
        help = "Days before today where the latest check run is searched"
    )]
    pub(crate) lookback_days: u64,

    #[arg(long, help = "Write the JSON run report to this path")]
    pub(crate) report_path: Option<PathBuf>,

    #[arg(long, env = "DATABRICKS_HOST", help = "Databricks workspace host")]
    pub(crate) databricks_host: Option<String>,

    #[arg(
        long,
        env = "DATABRICKS_TOKEN",
        hide_env_values = true,
        help = "Databricks personal access token"
    )]
    pub(crate) databricks_token: Option<String>,

    #[arg(
        long,
        env = "DATABRICKS_WAREHOUSE_UID",
        help = "Databricks SQL warehouse used to run statements"
    )]
    pub(crate) databricks_warehouse_uid: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_OAUTH_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth access token for BigQuery and Dataplex"
    )]
    pub(crate) google_oauth_access_token: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_CLOUD_PROJECT",
        help = "Project used when a data source has no project_id"
    )]
    pub(crate) google_cloud_project: Option<String>,

    #[arg(long, env = "BIGQUERY_API_BASE", help = "BigQuery API base URL override")]
    pub(crate) bigquery_api_base: Option<String>,

    #[arg(long, env = "DATAPLEX_API_BASE", help = "Dataplex API base URL override")]
    pub(crate) dataplex_api_base: Option<String>,

    #[arg(long, env = "ENTRA_TENANT_ID", help = "Entra tenant id")]
    pub(crate) entra_tenant_id: Option<String>,

    #[arg(long, env = "ENTRA_CLIENT_ID", help = "Entra application (client) id")]
    pub(crate) entra_client_id: Option<String>,

    #[arg(
        long,
        env = "ENTRA_CLIENT_SECRET",
        hide_env_values = true,
        help = "Entra application client secret"
    )]
    pub(crate) entra_client_secret: Option<String>,

    #[arg(long, env = "PURVIEW_ROOT_URL", help = "Purview account root URL")]
    pub(crate) purview_root_url: Option<String>,

    #[arg(long, env = "ENTRA_LOGIN_BASE", help = "Entra login endpoint override")]
    pub(crate) entra_login_base: Option<String>,
}

impl Cli {
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            request_timeout_ms: self.request_timeout_ms,
            max_attempts: self.retry_max_attempts,
            base_delay_ms: self.retry_base_delay_ms,
        }
    }

    pub(crate) fn anomalo_config(&self) -> AnomaloConfig {
        AnomaloConfig {
            host: self.anomalo_instance_host.clone(),
            protocol: self.anomalo_protocol.clone(),
            api_token: self.anomalo_api_secret_token.clone().unwrap_or_default(),
            organization_id: self.anomalo_organization_id,
            retry: self.retry_policy(),
        }
    }

    pub(crate) fn sync_options(&self) -> CatalogSyncOptions {
        CatalogSyncOptions {
            update_description: self.update_table_description || self.overwrite_table_description,
            description_mode: if self.overwrite_table_description {
                MergeMode::Overwrite
            } else {
                MergeMode::Preserve
            },
            update_labels: !self.no_update_labels,
            update_aspect: !self.no_update_aspect,
            update_endorsement: !self.no_update_endorsement,
            force_update_typedefs: self.force_update_typedefs,
            statement_wait_budget: Duration::from_millis(self.statement_wait_budget_ms),
        }
    }

    pub(crate) fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            databricks: DatabricksSettings {
                host: self.databricks_host.clone(),
                token: self.databricks_token.clone(),
                warehouse_uid: self.databricks_warehouse_uid.clone(),
            },
            dataplex: DataplexSettings {
                access_token: self.google_oauth_access_token.clone(),
                default_project: self.google_cloud_project.clone(),
                bigquery_api_base: self.bigquery_api_base.clone(),
                dataplex_api_base: self.dataplex_api_base.clone(),
            },
            purview: PurviewSettings {
                tenant_id: self.entra_tenant_id.clone(),
                client_id: self.entra_client_id.clone(),
                client_secret: self.entra_client_secret.clone(),
                root_url: self.purview_root_url.clone(),
                login_base: self.entra_login_base.clone(),
            },
            retry: self.retry_policy(),
        }
    }

    pub(crate) fn vocabulary(&self) -> TagVocabulary {
        if self.granular_tags {
            return TagVocabulary::granular();
        }
        self.tag_vocabulary.clone().unwrap_or_default()
    }

    pub(crate) fn run_config(&self) -> SyncRunConfig {
        SyncRunConfig {
            warehouse_name: self.warehouse_name.clone(),
            warehouse_id: self.warehouse_id,
            vocabulary: self.vocabulary(),
            workers: usize::try_from(self.workers).unwrap_or(1),
            asset_timeout: Duration::from_millis(self.asset_timeout_ms.max(1)),
            lookback_days: self.lookback_days,
        }
    }
}
