//! Status rendering and non-destructive annotation merging.
//!
//! A rendered status block always starts with its format's header literal.
//! The merger uses that header plus a separator literal to find and replace
//! the block a previous sync wrote, keeping anything a person wrote below it.

pub mod merge;
pub mod render;

pub use merge::{merge_annotation, AnnotationMarkers, MergeKind, MergeMode, MergedAnnotation};
pub use render::{escape_html, render_profile_image, render_status, StatusFormat};
