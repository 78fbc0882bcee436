use serde_json::Value;

use crate::category::CheckCategory;

/// Tri-state result of one check evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// The check has not resolved yet (still running or result unknown).
    Pending,
}

impl CheckOutcome {
    pub fn from_success(success: Option<bool>) -> Self {
        match success {
            Some(true) => Self::Passed,
            Some(false) => Self::Failed,
            None => Self::Pending,
        }
    }
}

/// One evaluated check as reported by the monitoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckRun {
    pub category: CheckCategory,
    pub outcome: CheckOutcome,
}

impl CheckRun {
    pub fn new(category: CheckCategory, outcome: CheckOutcome) -> Self {
        Self { category, outcome }
    }

    /// Decodes a raw `check_runs[]` record.
    ///
    /// The category comes from `run_config._metadata.check_type` and the result
    /// from `results.success`. Records with a missing or unknown check type
    /// return `None`; a missing or non-boolean `success` is a pending run.
    pub fn from_record(record: &Value) -> Option<Self> {
        let check_type = record
            .pointer("/run_config/_metadata/check_type")
            .and_then(Value::as_str)?;
        let category = CheckCategory::from_check_type(check_type)?;
        let success = record.pointer("/results/success").and_then(Value::as_bool);
        Some(Self::new(category, CheckOutcome::from_success(success)))
    }
}
