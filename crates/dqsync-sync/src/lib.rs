//! Orchestrates one sync run: warehouses, then configured tables, each
//! table aggregated, reconciled and applied in isolation.

mod report;
mod runner;

pub use report::{AssetFailure, SyncOutcome, SyncRunReport};
pub use runner::{run_catalog_sync, SyncRunConfig};
