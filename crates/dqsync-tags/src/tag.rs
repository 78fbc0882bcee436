use std::fmt;
use std::str::FromStr;

use dqsync_checks::{CategoryVerdict, CheckCategory};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Every tag the sync can ever write to a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogTag {
    Monitored,
    ChecksPassed,
    ChecksFailed,
    DataFreshnessPassed,
    DataFreshnessFailed,
    DataVolumePassed,
    DataVolumeFailed,
    MissingDataPassed,
    MissingDataFailed,
    AnomalyPassed,
    AnomalyFailed,
    MetricPassed,
    MetricFailed,
    RulePassed,
    RuleFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown catalog tag '{0}'")]
pub struct TagParseError(pub String);

impl CatalogTag {
    pub const ALL: [CatalogTag; 15] = [
        CatalogTag::Monitored,
        CatalogTag::ChecksPassed,
        CatalogTag::ChecksFailed,
        CatalogTag::DataFreshnessPassed,
        CatalogTag::DataFreshnessFailed,
        CatalogTag::DataVolumePassed,
        CatalogTag::DataVolumeFailed,
        CatalogTag::MissingDataPassed,
        CatalogTag::MissingDataFailed,
        CatalogTag::AnomalyPassed,
        CatalogTag::AnomalyFailed,
        CatalogTag::MetricPassed,
        CatalogTag::MetricFailed,
        CatalogTag::RulePassed,
        CatalogTag::RuleFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitored => "ANOMALO_MONITORED",
            Self::ChecksPassed => "ANOMALO_DQ_CHECKS_PASSED",
            Self::ChecksFailed => "ANOMALO_DQ_CHECKS_FAILED",
            Self::DataFreshnessPassed => "ANOMALO_DATA_FRESHNESS_CHECKS_PASSED",
            Self::DataFreshnessFailed => "ANOMALO_DATA_FRESHNESS_CHECKS_FAILED",
            Self::DataVolumePassed => "ANOMALO_DATA_VOLUME_CHECKS_PASSED",
            Self::DataVolumeFailed => "ANOMALO_DATA_VOLUME_CHECKS_FAILED",
            Self::MissingDataPassed => "ANOMALO_MISSING_DATA_CHECKS_PASSED",
            Self::MissingDataFailed => "ANOMALO_MISSING_DATA_CHECKS_FAILED",
            Self::AnomalyPassed => "ANOMALO_ANOMALY_CHECKS_PASSED",
            Self::AnomalyFailed => "ANOMALO_ANOMALY_CHECKS_FAILED",
            Self::MetricPassed => "ANOMALO_METRIC_CHECKS_PASSED",
            Self::MetricFailed => "ANOMALO_METRIC_CHECKS_FAILED",
            Self::RulePassed => "ANOMALO_RULE_CHECKS_PASSED",
            Self::RuleFailed => "ANOMALO_RULE_CHECKS_FAILED",
        }
    }

    /// Lower-case key for backends whose label keys only accept lower case.
    pub fn label_key(self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    pub fn for_category(category: CheckCategory, verdict: CategoryVerdict) -> Self {
        use CategoryVerdict::{Failed, Passed};
        match (category, verdict) {
            (CheckCategory::DataFreshness, Passed) => Self::DataFreshnessPassed,
            (CheckCategory::DataFreshness, Failed) => Self::DataFreshnessFailed,
            (CheckCategory::DataVolume, Passed) => Self::DataVolumePassed,
            (CheckCategory::DataVolume, Failed) => Self::DataVolumeFailed,
            (CheckCategory::MissingData, Passed) => Self::MissingDataPassed,
            (CheckCategory::MissingData, Failed) => Self::MissingDataFailed,
            (CheckCategory::Anomaly, Passed) => Self::AnomalyPassed,
            (CheckCategory::Anomaly, Failed) => Self::AnomalyFailed,
            (CheckCategory::Metric, Passed) => Self::MetricPassed,
            (CheckCategory::Metric, Failed) => Self::MetricFailed,
            (CheckCategory::Rule, Passed) => Self::RulePassed,
            (CheckCategory::Rule, Failed) => Self::RuleFailed,
        }
    }

    /// The category a granular tag belongs to; `None` for the table-level tags.
    pub fn category(self) -> Option<CheckCategory> {
        match self {
            Self::Monitored | Self::ChecksPassed | Self::ChecksFailed => None,
            Self::DataFreshnessPassed | Self::DataFreshnessFailed => {
                Some(CheckCategory::DataFreshness)
            }
            Self::DataVolumePassed | Self::DataVolumeFailed => Some(CheckCategory::DataVolume),
            Self::MissingDataPassed | Self::MissingDataFailed => Some(CheckCategory::MissingData),
            Self::AnomalyPassed | Self::AnomalyFailed => Some(CheckCategory::Anomaly),
            Self::MetricPassed | Self::MetricFailed => Some(CheckCategory::Metric),
            Self::RulePassed | Self::RuleFailed => Some(CheckCategory::Rule),
        }
    }
}

impl fmt::Display for CatalogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogTag {
    type Err = TagParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        CatalogTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| TagParseError(raw.trim().to_string()))
    }
}

impl Serialize for CatalogTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CatalogTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
