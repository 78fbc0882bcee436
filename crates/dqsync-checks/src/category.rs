use serde::{Deserialize, Serialize};

/// Check tiers. Timeliness-and-volume checks gate the granular data-quality tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckTier {
    TimelinessOrVolume,
    DataQuality,
}

/// The closed set of check categories the monitoring service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    DataFreshness,
    DataVolume,
    MissingData,
    Anomaly,
    Metric,
    Rule,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 6] = [
        CheckCategory::DataFreshness,
        CheckCategory::DataVolume,
        CheckCategory::MissingData,
        CheckCategory::Anomaly,
        CheckCategory::Metric,
        CheckCategory::Rule,
    ];

    /// Maps the service's `check_type` string; unknown types yield `None`.
    pub fn from_check_type(raw: &str) -> Option<Self> {
        match raw.trim() {
            "data_freshness" => Some(Self::DataFreshness),
            "data_volume" => Some(Self::DataVolume),
            "missing_data" => Some(Self::MissingData),
            "anomaly" => Some(Self::Anomaly),
            "metric" => Some(Self::Metric),
            "rule" => Some(Self::Rule),
            _ => None,
        }
    }

    pub fn check_type(self) -> &'static str {
        match self {
            Self::DataFreshness => "data_freshness",
            Self::DataVolume => "data_volume",
            Self::MissingData => "missing_data",
            Self::Anomaly => "anomaly",
            Self::Metric => "metric",
            Self::Rule => "rule",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::DataFreshness => "Data Freshness",
            Self::DataVolume => "Data Volume",
            Self::MissingData => "Missing Data",
            Self::Anomaly => "Table Anomalies",
            Self::Metric => "Key Metrics",
            Self::Rule => "Validation Rules",
        }
    }

    pub fn tier(self) -> CheckTier {
        match self {
            Self::DataFreshness | Self::DataVolume => CheckTier::TimelinessOrVolume,
            Self::MissingData | Self::Anomaly | Self::Metric | Self::Rule => CheckTier::DataQuality,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::DataFreshness => 0,
            Self::DataVolume => 1,
            Self::MissingData => 2,
            Self::Anomaly => 3,
            Self::Metric => 4,
            Self::Rule => 5,
        }
    }
}
