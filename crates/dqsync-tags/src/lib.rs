//! Catalog tag vocabulary and the reconciler that turns a table summary into
//! an idempotent add/remove tag delta.

pub mod reconcile;
pub mod tag;
pub mod vocabulary;

pub use reconcile::{reconcile_tags, TagDelta};
pub use tag::{CatalogTag, TagParseError};
pub use vocabulary::{TagVocabulary, VocabularyError};
