use chrono::{Days, NaiveDate};

/// Start date (`YYYY-MM-DD`) of the check-interval window, `lookback_days` before `today`.
///
/// A lookback of zero is treated as one day so the latest completed job run is
/// always inside the window.
pub fn check_window_start(today: NaiveDate, lookback_days: u64) -> String {
    today
        .checked_sub_days(Days::new(lookback_days.max(1)))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}
