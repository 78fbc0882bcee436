use dqsync_checks::{CheckCategory, CheckTier, TableSummary};
use serde::Serialize;

use crate::tag::CatalogTag;
use crate::vocabulary::TagVocabulary;

/// Tags to add and remove for one asset.
///
/// `to_apply` and `to_remove` are disjoint and together cover the vocabulary,
/// both in vocabulary order, so applying the same delta twice converges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDelta {
    pub to_apply: Vec<CatalogTag>,
    pub to_remove: Vec<CatalogTag>,
}

impl TagDelta {
    pub fn applies(&self, tag: CatalogTag) -> bool {
        self.to_apply.contains(&tag)
    }

    pub fn apply_names(&self) -> Vec<&'static str> {
        self.to_apply.iter().map(|tag| tag.as_str()).collect()
    }

    pub fn remove_names(&self) -> Vec<&'static str> {
        self.to_remove.iter().map(|tag| tag.as_str()).collect()
    }
}

/// Every tag the summary supports, before vocabulary filtering.
fn candidate_tags(summary: &TableSummary) -> Vec<CatalogTag> {
    let mut candidates = vec![CatalogTag::Monitored];
    candidates.push(if summary.any_failed() {
        CatalogTag::ChecksFailed
    } else {
        CatalogTag::ChecksPassed
    });

    let granular_data_quality = !summary.to_checks_failed();
    for category in CheckCategory::ALL {
        if category.tier() == CheckTier::DataQuality && !granular_data_quality {
            continue;
        }
        if let Some(verdict) = summary.tally(category).verdict() {
            candidates.push(CatalogTag::for_category(category, verdict));
        }
    }
    candidates
}

/// Derives the tag delta for a table against a closed vocabulary.
///
/// Candidates outside the vocabulary are dropped; everything in the
/// vocabulary that is not applied is scheduled for removal.
pub fn reconcile_tags(summary: &TableSummary, vocabulary: &TagVocabulary) -> TagDelta {
    let candidates = candidate_tags(summary);
    let (to_apply, to_remove): (Vec<_>, Vec<_>) = vocabulary
        .iter()
        .partition(|tag| candidates.contains(tag));
    TagDelta {
        to_apply,
        to_remove,
    }
}
