//! Canonical content handling: mention markers, the per-session mention
//! dictionary, and the two pure passes over canonical content.
//!
//! Canonical content is plain text in which a resolved mention is written
//! as `` `@DisplayName` ``. [`synthesize`] expands markers into the wire
//! text for one network, [`retarget`] swaps the names shown inside markers
//! when the preview network changes.

mod dictionary;
mod markers;
mod retarget;
mod synthesize;

pub use dictionary::{EntryError, MentionDictionary, MentionEntry, MentionScope, ReverseTokenIndex};
pub use markers::{marker, markers, rewrite_markers, Marker};
pub use retarget::retarget;
pub use synthesize::synthesize;
