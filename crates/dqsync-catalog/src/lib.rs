//! Catalog backends that receive reconciled data-quality status.
//!
//! [`CatalogAdapter`] is the seam the orchestrator drives; [`build_adapter`]
//! maps a [`CatalogKind`] to its implementation.

mod adapter;
pub mod databricks;
pub mod dataplex;
mod error;
mod http;
pub mod purview;
mod registry;

pub use adapter::{AssetSync, AssetUpdate, CatalogAdapter};
pub use databricks::{DatabricksAdapter, DatabricksSettings};
pub use dataplex::{DataplexAdapter, DataplexSettings};
pub use error::{AssetStage, CatalogError};
pub use purview::{PurviewAdapter, PurviewAsset, PurviewSettings};
pub use registry::{build_adapter, CatalogKind, CatalogSettings, CatalogSyncOptions};
