//! Definition registry and options resolution for lineage component definitions.
//!
//! This crate handles:
//! - Definition storage (own options, extension options, merge snapshots)
//! - Single-parent inheritance chains
//! - Cached, change-detecting option resolution
//! - Late modification and mixins
//! - Self-registration under a definition's name

mod options;
mod registry;

pub use options::{apply_mixin, lookup_component, resolve_options};
pub use registry::{DefinitionBuilder, DefinitionRecord, DefinitionRegistry};
