use std::path::Path;

use anyhow::{Context, Result};
use dqsync_catalog::AssetStage;
use dqsync_core::write_text_atomic;
use serde::Serialize;

/// Terminal state of one table in a run. Never retried within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Updated,
    Skipped,
    Failed,
}

/// Which asset failed, at which stage, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub warehouse: String,
    pub table: String,
    pub stage: AssetStage,
    pub cause: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncRunReport {
    pub warehouses: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when cancellation stopped the run before every table started.
    pub cancelled: bool,
    pub failures: Vec<AssetFailure>,
}

impl SyncRunReport {
    pub(crate) fn record(&mut self, outcome: SyncOutcome, failure: Option<AssetFailure>) {
        match outcome {
            SyncOutcome::Updated => self.updated = self.updated.saturating_add(1),
            SyncOutcome::Skipped => self.skipped = self.skipped.saturating_add(1),
            SyncOutcome::Failed => self.failed = self.failed.saturating_add(1),
        }
        if let Some(failure) = failure {
            self.failures.push(failure);
        }
    }

    pub fn total(&self) -> usize {
        self.updated
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "finished sync: updated={} skipped={} failed={} warehouses={}{}",
            self.updated,
            self.skipped,
            self.failed,
            self.warehouses,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(self).context("failed to serialize sync run report")?;
        payload.push('\n');
        write_text_atomic(path, &payload)
            .with_context(|| format!("failed to write sync run report {}", path.display()))
    }
}
