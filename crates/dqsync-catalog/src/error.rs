use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage an asset was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStage {
    FetchChecks,
    ResolveAsset,
    FetchAnnotation,
    WriteAnnotation,
    ApplyTags,
    RemoveTags,
    EnsureSchema,
    WriteStructuredFields,
    Endorsement,
    Apply,
}

impl AssetStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchChecks => "fetch_checks",
            Self::ResolveAsset => "resolve_asset",
            Self::FetchAnnotation => "fetch_annotation",
            Self::WriteAnnotation => "write_annotation",
            Self::ApplyTags => "apply_tags",
            Self::RemoveTags => "remove_tags",
            Self::EnsureSchema => "ensure_schema",
            Self::WriteStructuredFields => "write_structured_fields",
            Self::Endorsement => "endorsement",
            Self::Apply => "apply",
        }
    }
}

impl fmt::Display for AssetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Missing credential or required setting. Fatal before any asset is touched.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{operation} failed during {stage}{}: {message}", status_suffix(.status))]
    Backend {
        stage: AssetStage,
        operation: String,
        status: Option<u16>,
        message: String,
    },
    #[error("{operation} did not finish during {stage} within {waited_ms}ms")]
    Timeout {
        stage: AssetStage,
        operation: String,
        waited_ms: u64,
    },
}

impl CatalogError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn backend(
        stage: AssetStage,
        operation: &str,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            stage,
            operation: operation.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> AssetStage {
        match self {
            Self::Configuration(_) => AssetStage::Apply,
            Self::Backend { stage, .. } | Self::Timeout { stage, .. } => *stage,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" with status {status}"))
        .unwrap_or_default()
}
