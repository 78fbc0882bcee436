//! Check-run records and the per-table summary derived from them.
//!
//! The monitoring service reports one record per evaluated check; this crate
//! classifies those records into the six known categories and aggregates them
//! into a read-only [`TableSummary`].

pub mod category;
pub mod check_run;
pub mod summary;

pub use category::{CheckCategory, CheckTier};
pub use check_run::{CheckOutcome, CheckRun};
pub use summary::{
    summarize_check_records, summarize_check_runs, CategoryTally, CategoryVerdict,
    ProfileAttachment, TableRef, TableSummary,
};
