use async_trait::async_trait;
use dqsync_checks::TableSummary;
use dqsync_monitor::Warehouse;
use dqsync_tags::TagDelta;
use serde::Serialize;

use crate::error::CatalogError;
use crate::registry::CatalogKind;

/// Reconciled state for one table, handed to an adapter.
#[derive(Debug, Clone, Copy)]
pub struct AssetSync<'a> {
    pub summary: &'a TableSummary,
    pub delta: &'a TagDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssetUpdate {
    Updated { asset_id: String },
    /// No matching catalog entity. Not a failure.
    Skipped { reason: String },
}

impl AssetUpdate {
    pub fn updated(asset_id: impl Into<String>) -> Self {
        Self::Updated {
            asset_id: asset_id.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// One catalog backend.
///
/// `configure` runs once before any asset is touched; `update_catalog_asset`
/// is called concurrently for independent tables and its errors are isolated
/// per asset by the caller.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    fn kind(&self) -> CatalogKind;

    async fn configure(&mut self) -> Result<(), CatalogError>;

    fn include_warehouse(&self, warehouse: &Warehouse) -> bool {
        let _ = warehouse;
        true
    }

    async fn update_catalog_asset(
        &self,
        warehouse: &Warehouse,
        asset: &AssetSync<'_>,
    ) -> Result<AssetUpdate, CatalogError>;
}
