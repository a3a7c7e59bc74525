//! Render context initialization: placeholder node and slot resolution.

use std::sync::Arc;

use indexmap::IndexMap;

use lineage_core::{InstanceId, OptionValue, Options};

use crate::instance::Instance;
use crate::internal::PlaceholderNode;

const DEFAULT_SLOT: &str = "default";

/// A child passed into a component between its tags.
#[derive(Debug, Clone)]
pub struct ChildNode {
    /// Target slot; `None` goes to the default slot.
    pub slot: Option<String>,
    pub content: OptionValue,
}

impl ChildNode {
    pub fn new(content: OptionValue) -> Self {
        Self { slot: None, content }
    }

    pub fn text(text: &str) -> Self {
        Self::new(OptionValue::str(text))
    }

    pub fn in_slot(mut self, slot: &str) -> Self {
        self.slot = Some(slot.to_string());
        self
    }

    fn is_whitespace(&self) -> bool {
        matches!(&self.content, OptionValue::Str(s) if s.trim().is_empty())
    }
}

/// Per-instance render state set up before `beforeCreate`.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Placeholder node this instance was created for.
    pub placeholder: Option<Arc<PlaceholderNode>>,
    /// Instance whose render pass produced the placeholder.
    pub render_context: Option<InstanceId>,
    pub slots: IndexMap<String, Vec<ChildNode>>,
    pub scoped_slots: Options,
}

impl RenderContext {
    pub fn slot(&self, name: &str) -> Option<&[ChildNode]> {
        self.slots.get(name).map(Vec::as_slice)
    }
}

/// Group children by slot name. Slots holding only whitespace text are dropped.
pub fn resolve_slots(children: &[ChildNode]) -> IndexMap<String, Vec<ChildNode>> {
    let mut slots: IndexMap<String, Vec<ChildNode>> = IndexMap::new();
    for child in children {
        let name = child.slot.as_deref().unwrap_or(DEFAULT_SLOT);
        slots.entry(name.to_string()).or_default().push(child.clone());
    }
    slots.retain(|_, nodes| !nodes.iter().all(ChildNode::is_whitespace));
    slots
}

/// Set up the render context from the instance's options.
pub(crate) fn init_render(vm: &mut Instance) {
    let placeholder = vm.options().parent_node();
    let slots = vm
        .options()
        .render_children()
        .map(|children| resolve_slots(&children))
        .unwrap_or_default();
    vm.render = RenderContext {
        render_context: placeholder.as_ref().and_then(|node| node.context),
        placeholder,
        slots,
        scoped_slots: Options::new(),
    };
}
