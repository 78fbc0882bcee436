use std::str::FromStr;

use thiserror::Error;

use crate::tag::{CatalogTag, TagParseError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VocabularyError {
    #[error("tag vocabulary cannot be empty")]
    Empty,
    #[error(transparent)]
    UnknownTag(#[from] TagParseError),
}

/// The ordered, closed set of tags a run is allowed to manage.
///
/// Built once at startup and shared read-only across every table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVocabulary {
    tags: Vec<CatalogTag>,
}

impl Default for TagVocabulary {
    /// The coarse vocabulary: monitored plus the overall pass/fail pair.
    fn default() -> Self {
        Self {
            tags: vec![
                CatalogTag::Monitored,
                CatalogTag::ChecksFailed,
                CatalogTag::ChecksPassed,
            ],
        }
    }
}

impl TagVocabulary {
    /// Keeps first-seen order and drops duplicates.
    pub fn new(tags: impl IntoIterator<Item = CatalogTag>) -> Result<Self, VocabularyError> {
        let mut ordered = Vec::new();
        for tag in tags {
            if !ordered.contains(&tag) {
                ordered.push(tag);
            }
        }
        if ordered.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(Self { tags: ordered })
    }

    /// Every known tag, including the per-category pairs.
    pub fn granular() -> Self {
        Self {
            tags: CatalogTag::ALL.to_vec(),
        }
    }

    pub fn contains(&self, tag: CatalogTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = CatalogTag> + '_ {
        self.tags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromStr for TagVocabulary {
    type Err = VocabularyError;

    /// Parses a comma separated list of tag names.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tags = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(CatalogTag::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::{TagVocabulary, VocabularyError};
    use crate::tag::{CatalogTag, TagParseError};

    #[test]
    fn unit_default_vocabulary_is_coarse() {
        let vocabulary = TagVocabulary::default();
        assert_eq!(
            vocabulary.iter().collect::<Vec<_>>(),
            vec![
                CatalogTag::Monitored,
                CatalogTag::ChecksFailed,
                CatalogTag::ChecksPassed
            ]
        );
        assert!(!vocabulary.contains(CatalogTag::RulePassed));
    }

    #[test]
    fn functional_from_str_parses_list_and_deduplicates() {
        let vocabulary: TagVocabulary =
            "ANOMALO_MONITORED, anomalo_rule_checks_failed,,ANOMALO_MONITORED"
                .parse()
                .expect("vocabulary");
        assert_eq!(
            vocabulary.iter().collect::<Vec<_>>(),
            vec![CatalogTag::Monitored, CatalogTag::RuleFailed]
        );
    }

    #[test]
    fn regression_from_str_rejects_unknown_and_empty_lists() {
        assert_eq!(
            "ANOMALO_MONITORED,BOGUS".parse::<TagVocabulary>(),
            Err(VocabularyError::UnknownTag(TagParseError(
                "BOGUS".to_string()
            )))
        );
        assert_eq!(" , ".parse::<TagVocabulary>(), Err(VocabularyError::Empty));
    }

    #[test]
    fn unit_granular_vocabulary_contains_every_tag() {
        let vocabulary = TagVocabulary::granular();
        assert_eq!(vocabulary.len(), CatalogTag::ALL.len());
        assert!(CatalogTag::ALL.iter().all(|tag| vocabulary.contains(*tag)));
    }
}
