//! Instance creation for lineage component definitions.
//!
//! This crate handles:
//! - Instance identity and the instance tree
//! - Effective options, including the internal fast path
//! - Relation, event channel and render context initialization
//! - Lifecycle hook invocation
//! - The fixed-order creation pipeline and its collaborators

mod collaborators;
mod events;
mod instance;
mod internal;
mod lifecycle;
mod render;
mod runtime;

pub use collaborators::{Collaborators, DefaultCollaborators};
pub use events::EventChannel;
pub use instance::{next_instance_id, Instance, InstanceTree, Phase};
pub use internal::{
    build_internal, ComponentNodeOptions, EffectiveOptions, InternalCreateOptions, InternalOptions,
    PlaceholderNode, RenderOverride, INTERNAL_FIELDS,
};
pub use lifecycle::{call_hook, format_component_name, hook, init_lifecycle};
pub use render::{resolve_slots, ChildNode, RenderContext};
pub use runtime::{CreateConfig, Runtime};
