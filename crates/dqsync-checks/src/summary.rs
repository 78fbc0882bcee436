use serde_json::Value;

use crate::category::{CheckCategory, CheckTier};
use crate::check_run::{CheckOutcome, CheckRun};

/// Per-category counters. `passed + failed <= total`; the gap is pending runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTally {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

/// Per-category verdict used for tagging. Untested categories have no verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryVerdict {
    Passed,
    Failed,
}

impl CategoryTally {
    fn record(&mut self, outcome: CheckOutcome) {
        self.total = self.total.saturating_add(1);
        match outcome {
            CheckOutcome::Passed => self.passed = self.passed.saturating_add(1),
            CheckOutcome::Failed => self.failed = self.failed.saturating_add(1),
            CheckOutcome::Pending => {}
        }
    }

    /// True when runs exist but none of them has resolved yet.
    pub fn pending(&self) -> bool {
        self.total > 0 && self.passed == 0 && self.failed == 0
    }

    pub fn all_passed(&self) -> bool {
        self.total == self.passed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// `Failed` on any failure, `Passed` on at least one pass and no failures,
    /// `None` when nothing resolved.
    pub fn verdict(&self) -> Option<CategoryVerdict> {
        if self.failed > 0 {
            Some(CategoryVerdict::Failed)
        } else if self.passed > 0 {
            Some(CategoryVerdict::Passed)
        } else {
            None
        }
    }
}

/// Identity of a monitored table in the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table_id: u64,
    /// Fully qualified name as the monitoring service spells it (`schema.table` or `db.schema.table`).
    pub full_name: String,
}

impl TableRef {
    pub fn new(table_id: u64, full_name: impl Into<String>) -> Self {
        Self {
            table_id,
            full_name: full_name.into(),
        }
    }

    /// Dot-separated name segments, outermost first.
    pub fn name_segments(&self) -> Vec<&str> {
        self.full_name
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    pub fn table_name(&self) -> &str {
        self.name_segments()
            .last()
            .copied()
            .unwrap_or(self.full_name.as_str())
    }
}

/// Best-effort visual profile images attached to a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileAttachment {
    pub profile_image_url: Option<String>,
    pub columns_image_url: Option<String>,
}

impl ProfileAttachment {
    pub fn is_empty(&self) -> bool {
        self.profile_image_url.is_none() && self.columns_image_url.is_none()
    }
}

/// Aggregated status of one table for one sync pass. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    table: TableRef,
    monitor_url: String,
    tallies: [CategoryTally; 6],
    profile: Option<ProfileAttachment>,
}

/// Aggregates decoded check runs for one table.
pub fn summarize_check_runs(
    table: TableRef,
    monitor_url: impl Into<String>,
    runs: impl IntoIterator<Item = CheckRun>,
    profile: Option<ProfileAttachment>,
) -> TableSummary {
    let mut tallies = [CategoryTally::default(); 6];
    for run in runs {
        tallies[run.category.index()].record(run.outcome);
    }
    TableSummary {
        table,
        monitor_url: monitor_url.into(),
        tallies,
        profile: profile.filter(|attachment| !attachment.is_empty()),
    }
}

/// Aggregates raw `check_runs[]` records, skipping unknown check types.
pub fn summarize_check_records(
    table: TableRef,
    monitor_url: impl Into<String>,
    records: &[Value],
    profile: Option<ProfileAttachment>,
) -> TableSummary {
    summarize_check_runs(
        table,
        monitor_url,
        records.iter().filter_map(CheckRun::from_record),
        profile,
    )
}

impl TableSummary {
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn monitor_url(&self) -> &str {
        &self.monitor_url
    }

    pub fn profile(&self) -> Option<&ProfileAttachment> {
        self.profile.as_ref()
    }

    pub fn tally(&self, category: CheckCategory) -> CategoryTally {
        self.tallies[category.index()]
    }

    pub fn tallies(&self) -> impl Iterator<Item = (CheckCategory, CategoryTally)> + '_ {
        CheckCategory::ALL
            .into_iter()
            .map(move |category| (category, self.tally(category)))
    }

    /// True iff every category has `total == passed`: no failures and nothing pending.
    pub fn table_passed(&self) -> bool {
        self.tallies.iter().all(CategoryTally::all_passed)
    }

    pub fn any_failed(&self) -> bool {
        self.tallies.iter().any(CategoryTally::has_failures)
    }

    pub fn to_checks_failed(&self) -> bool {
        self.tier_failed(CheckTier::TimelinessOrVolume)
    }

    pub fn dq_checks_failed(&self) -> bool {
        self.tier_failed(CheckTier::DataQuality)
    }

    fn tier_failed(&self, tier: CheckTier) -> bool {
        self.tallies()
            .any(|(category, tally)| category.tier() == tier && tally.has_failures())
    }

    /// Display-only pending state. Data-quality categories read as pending while
    /// a timeliness or volume check is failing.
    pub fn display_pending(&self, category: CheckCategory) -> bool {
        if category.tier() == CheckTier::DataQuality && self.to_checks_failed() {
            return true;
        }
        self.tally(category).pending()
    }

    /// One-line status such as `Data Volume: 2/3 passed ❌`.
    pub fn summary_line(&self, category: CheckCategory) -> String {
        let name = category.display_name();
        if self.display_pending(category) {
            return format!("{name}: 🕑");
        }
        let tally = self.tally(category);
        let icon = if tally.has_failures() {
            "❌"
        } else if tally.all_passed() {
            "✅"
        } else {
            "🕑"
        };
        format!("{name}: {}/{} passed {icon}", tally.passed, tally.total)
    }

    pub fn summary_lines(&self) -> Vec<String> {
        CheckCategory::ALL
            .into_iter()
            .map(|category| self.summary_line(category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        summarize_check_records, summarize_check_runs, CategoryTally, CategoryVerdict,
        ProfileAttachment, TableRef, TableSummary,
    };
    use crate::category::CheckCategory;
    use crate::check_run::{CheckOutcome, CheckRun};

    fn table() -> TableRef {
        TableRef::new(42, "sales.orders")
    }

    fn summarize(runs: Vec<CheckRun>) -> TableSummary {
        summarize_check_runs(table(), "https://monitor.test/tables/42", runs, None)
    }

    fn runs(category: CheckCategory, outcomes: &[CheckOutcome]) -> Vec<CheckRun> {
        outcomes
            .iter()
            .map(|outcome| CheckRun::new(category, *outcome))
            .collect()
    }

    #[test]
    fn unit_empty_summary_is_passed_and_has_no_verdicts() {
        let summary = summarize(Vec::new());
        assert!(summary.table_passed());
        assert!(!summary.any_failed());
        for (_, tally) in summary.tallies() {
            assert_eq!(tally, CategoryTally::default());
            assert_eq!(tally.verdict(), None);
            assert!(!tally.pending());
        }
    }

    #[test]
    fn functional_pending_run_counts_toward_total_only() {
        let summary = summarize(runs(
            CheckCategory::Metric,
            &[CheckOutcome::Passed, CheckOutcome::Pending],
        ));
        let tally = summary.tally(CheckCategory::Metric);
        assert_eq!((tally.total, tally.passed, tally.failed), (2, 1, 0));
        assert!(!summary.table_passed());
        assert_eq!(tally.verdict(), Some(CategoryVerdict::Passed));
    }

    #[test]
    fn functional_mixed_scenario_fails_table_and_trips_timeliness_gate() {
        let mut all = runs(
            CheckCategory::DataFreshness,
            &[
                CheckOutcome::Passed,
                CheckOutcome::Passed,
                CheckOutcome::Failed,
            ],
        );
        all.extend(runs(
            CheckCategory::MissingData,
            &[CheckOutcome::Passed, CheckOutcome::Passed],
        ));
        let summary = summarize(all);
        assert!(!summary.table_passed());
        assert!(summary.to_checks_failed());
        assert!(!summary.dq_checks_failed());
        assert_eq!(summary.tally(CheckCategory::DataVolume).total, 0);
        assert!(summary.display_pending(CheckCategory::MissingData));
        assert_eq!(
            summary.summary_line(CheckCategory::MissingData),
            "Missing Data: 🕑"
        );
        assert_eq!(
            summary.summary_line(CheckCategory::DataFreshness),
            "Data Freshness: 2/3 passed ❌"
        );
    }

    #[test]
    fn functional_all_categories_passing_marks_table_passed() {
        let all = CheckCategory::ALL
            .into_iter()
            .map(|category| CheckRun::new(category, CheckOutcome::Passed))
            .collect();
        let summary = summarize(all);
        assert!(summary.table_passed());
        assert_eq!(
            summary.summary_lines(),
            vec![
                "Data Freshness: 1/1 passed ✅",
                "Data Volume: 1/1 passed ✅",
                "Missing Data: 1/1 passed ✅",
                "Table Anomalies: 1/1 passed ✅",
                "Key Metrics: 1/1 passed ✅",
                "Validation Rules: 1/1 passed ✅",
            ]
        );
    }

    #[test]
    fn integration_summarize_check_records_skips_unknown_check_types() {
        let records = vec![
            json!({"run_config": {"_metadata": {"check_type": "anomaly"}}, "results": {"success": false}}),
            json!({"run_config": {"_metadata": {"check_type": "brand_new_check"}}, "results": {"success": false}}),
            json!({"unexpected": true}),
        ];
        let summary = summarize_check_records(table(), "url", &records, None);
        assert_eq!(summary.tally(CheckCategory::Anomaly).failed, 1);
        assert!(summary.dq_checks_failed());
        let total: u32 = summary.tallies().map(|(_, tally)| tally.total).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn regression_empty_profile_attachment_degrades_to_absent() {
        let summary = summarize_check_runs(
            table(),
            "url",
            Vec::new(),
            Some(ProfileAttachment::default()),
        );
        assert!(summary.profile().is_none());
    }

    #[test]
    fn unit_table_ref_segments_and_table_name() {
        let table = TableRef::new(1, "warehouse.sales.orders");
        assert_eq!(table.name_segments(), vec!["warehouse", "sales", "orders"]);
        assert_eq!(table.table_name(), "orders");
    }

    fn outcome_strategy() -> impl Strategy<Value = CheckOutcome> {
        prop_oneof![
            Just(CheckOutcome::Passed),
            Just(CheckOutcome::Failed),
            Just(CheckOutcome::Pending),
        ]
    }

    fn run_strategy() -> impl Strategy<Value = CheckRun> {
        (0usize..6, outcome_strategy())
            .prop_map(|(index, outcome)| CheckRun::new(CheckCategory::ALL[index], outcome))
    }

    proptest! {
        #[test]
        fn property_tallies_never_overcount(all in proptest::collection::vec(run_strategy(), 0..64)) {
            let count = all.len() as u32;
            let summary = summarize(all);
            let mut total = 0;
            for (_, tally) in summary.tallies() {
                prop_assert!(tally.passed + tally.failed <= tally.total);
                total += tally.total;
            }
            prop_assert_eq!(total, count);
        }

        #[test]
        fn property_table_passed_iff_no_failures_and_nothing_pending(all in proptest::collection::vec(run_strategy(), 0..64)) {
            let unresolved_or_failed = all.iter().any(|run| run.outcome != CheckOutcome::Passed);
            let summary = summarize(all);
            prop_assert_eq!(summary.table_passed(), !unresolved_or_failed);
        }
    }
}
