//! Incremental list rendering
//!
//! Navigation keys only restyle rows; any data change goes through a full
//! rebuild, which is skipped when the content hash still matches.

pub mod cache;
pub mod item;

pub use cache::{ListHandle, RenderCache, RenderStats, RenderStrategy, RowRenderer};
pub use item::{content_hash, ListItem};
