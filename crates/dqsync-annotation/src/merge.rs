/// Header and separator literals bounding a sync-owned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationMarkers {
    pub header: &'static str,
    pub separator: &'static str,
}

impl AnnotationMarkers {
    pub const fn new(header: &'static str, separator: &'static str) -> Self {
        Self { header, separator }
    }
}

/// Whether existing content is preserved around the new block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    #[default]
    Preserve,
    Overwrite,
}

/// What the merger did with the existing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Existing text was empty.
    Fresh,
    /// Existing text was entirely user-authored and now follows the block.
    PrependedUserContent,
    /// A prior block was replaced; user content after its separator was kept.
    ReplacedPriorBlock,
    /// A prior block's separator was mangled, so the whole field was replaced.
    DiscardedMalformed,
    /// Overwrite mode replaced the field unconditionally.
    Overwritten,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedAnnotation {
    pub text: String,
    pub kind: MergeKind,
}

impl MergedAnnotation {
    fn new(text: String, kind: MergeKind) -> Self {
        Self { text, kind }
    }
}

/// Splices a freshly rendered `block` into `existing` annotation text.
///
/// `block` must start with `markers.header` and must not contain
/// `markers.separator`; under that contract merging the output again with
/// the same block returns it unchanged.
pub fn merge_annotation(
    existing: &str,
    block: &str,
    markers: AnnotationMarkers,
    mode: MergeMode,
) -> MergedAnnotation {
    if mode == MergeMode::Overwrite {
        return MergedAnnotation::new(block.to_string(), MergeKind::Overwritten);
    }
    if existing.trim().is_empty() {
        return MergedAnnotation::new(block.to_string(), MergeKind::Fresh);
    }

    if existing.starts_with(markers.header) {
        let Some((_, preserved)) = existing.split_once(markers.separator) else {
            // A bare block is the stored result of a fresh merge; a damaged
            // separator may have swallowed user content.
            let kind = if existing.contains(markers.separator.trim()) {
                MergeKind::DiscardedMalformed
            } else {
                MergeKind::ReplacedPriorBlock
            };
            return MergedAnnotation::new(block.to_string(), kind);
        };
        return MergedAnnotation::new(
            format!("{block}{}{preserved}", markers.separator),
            MergeKind::ReplacedPriorBlock,
        );
    }

    MergedAnnotation::new(
        format!("{block}{}{existing}", markers.separator),
        MergeKind::PrependedUserContent,
    )
}
