use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dqsync_annotation::MergeMode;
use dqsync_core::RetryPolicy;
use serde::Serialize;

use crate::adapter::CatalogAdapter;
use crate::databricks::{DatabricksAdapter, DatabricksSettings};
use crate::dataplex::{DataplexAdapter, DataplexSettings};
use crate::error::CatalogError;
use crate::purview::{PurviewAdapter, PurviewSettings};

/// Supported catalog backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Databricks,
    Dataplex,
    Purview,
}

impl CatalogKind {
    pub const fn all() -> [CatalogKind; 3] {
        [Self::Databricks, Self::Dataplex, Self::Purview]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Databricks => "databricks",
            Self::Dataplex => "dataplex",
            Self::Purview => "purview",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CatalogKind {
    type Err = CatalogError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                let known = Self::all().map(CatalogKind::name).join(", ");
                CatalogError::configuration(format!(
                    "unknown catalog `{}`; expected one of: {known}",
                    raw.trim()
                ))
            })
    }
}

/// Per-run switches shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSyncOptions {
    pub update_description: bool,
    pub description_mode: MergeMode,
    pub update_labels: bool,
    pub update_aspect: bool,
    pub update_endorsement: bool,
    pub force_update_typedefs: bool,
    /// Upper bound for polling asynchronous backend operations.
    pub statement_wait_budget: Duration,
}

impl Default for CatalogSyncOptions {
    fn default() -> Self {
        Self {
            update_description: false,
            description_mode: MergeMode::Preserve,
            update_labels: true,
            update_aspect: true,
            update_endorsement: true,
            force_update_typedefs: false,
            statement_wait_budget: Duration::from_secs(30),
        }
    }
}

/// Credentials and endpoints for every backend; only the selected one is validated.
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub databricks: DatabricksSettings,
    pub dataplex: DataplexSettings,
    pub purview: PurviewSettings,
    pub retry: RetryPolicy,
}

/// Compile-time constructor map from catalog name to adapter.
pub fn build_adapter(
    kind: CatalogKind,
    settings: &CatalogSettings,
    options: CatalogSyncOptions,
) -> Result<Box<dyn CatalogAdapter>, CatalogError> {
    let adapter: Box<dyn CatalogAdapter> = match kind {
        CatalogKind::Databricks => Box::new(DatabricksAdapter::new(
            settings.databricks.clone(),
            options,
            settings.retry,
        )?),
        CatalogKind::Dataplex => Box::new(DataplexAdapter::new(
            settings.dataplex.clone(),
            options,
            settings.retry,
        )?),
        CatalogKind::Purview => Box::new(PurviewAdapter::new(
            settings.purview.clone(),
            options,
            settings.retry,
        )?),
    };
    Ok(adapter)
}

/// Reads a required setting, naming the environment variable in the error.
pub(crate) fn require_setting(value: &Option<String>, env_name: &str) -> Result<String, CatalogError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            CatalogError::configuration(format!(
                "{env_name} is required; define it in your environment or a .env file and try again"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::{build_adapter, require_setting, CatalogKind, CatalogSettings, CatalogSyncOptions};

    #[test]
    fn unit_catalog_kind_round_trips_names() {
        for kind in CatalogKind::all() {
            assert_eq!(kind.name().parse::<CatalogKind>().expect("parse"), kind);
        }
        assert_eq!(
            " Purview ".parse::<CatalogKind>().expect("parse"),
            CatalogKind::Purview
        );
        let error = "atlan".parse::<CatalogKind>().expect_err("unknown kind");
        assert!(error.to_string().contains("databricks, dataplex, purview"));
    }

    #[test]
    fn functional_build_adapter_returns_matching_kind() {
        let settings = CatalogSettings::default();
        for kind in CatalogKind::all() {
            let adapter =
                build_adapter(kind, &settings, CatalogSyncOptions::default()).expect("adapter");
            assert_eq!(adapter.kind(), kind);
        }
    }

    #[test]
    fn regression_require_setting_rejects_blank_values() {
        let error = require_setting(&Some("   ".to_string()), "DATABRICKS_TOKEN")
            .expect_err("blank is missing");
        assert!(error.is_configuration());
        assert!(error.to_string().contains("DATABRICKS_TOKEN is required"));
        assert_eq!(
            require_setting(&Some(" token ".to_string()), "X").expect("present"),
            "token"
        );
    }
}
