//! Live instances and the instance tree.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use lineage_core::{DefinitionId, InstanceId, OptionValue, Options};

use crate::events::EventChannel;
use crate::internal::EffectiveOptions;
use crate::render::RenderContext;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

/// Take the next process-wide instance id. Ids are never reused.
pub fn next_instance_id() -> InstanceId {
    InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Id assigned, options resolved, relations/events/render being set up.
    Created,
    /// `beforeCreate` callbacks ran.
    BeforeCreate,
    Injected,
    StateInitialized,
    Provided,
    /// `created` callbacks ran.
    Ready,
    Mounted,
    Destroyed,
}

/// A live component instance.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    definition: DefinitionId,
    is_internal: bool,
    /// Keeps the instance itself out of reactive observation.
    skip_observe: bool,
    options: EffectiveOptions,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) root: InstanceId,
    pub(crate) children: SmallVec<[InstanceId; 4]>,
    pub(crate) is_mounted: bool,
    pub(crate) is_destroyed: bool,
    pub(crate) inactive: bool,
    pub(crate) events: EventChannel,
    pub(crate) render: RenderContext,
    injections: Options,
    state: Options,
    provided: Option<Options>,
    pub(crate) phase: Phase,
}

impl Instance {
    pub(crate) fn new(
        id: InstanceId,
        definition: DefinitionId,
        is_internal: bool,
        options: EffectiveOptions,
    ) -> Self {
        Self {
            id,
            definition,
            is_internal,
            skip_observe: false,
            options,
            parent: None,
            root: id,
            children: SmallVec::new(),
            is_mounted: false,
            is_destroyed: false,
            inactive: false,
            events: EventChannel::new(),
            render: RenderContext::default(),
            injections: Options::new(),
            state: Options::new(),
            provided: None,
            phase: Phase::Created,
        }
    }

    pub(crate) fn mark_skip_observe(&mut self) {
        self.skip_observe = true;
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn definition(&self) -> DefinitionId {
        self.definition
    }

    /// True for instances created through the internal fast path.
    pub fn is_internal(&self) -> bool {
        self.is_internal
    }

    pub fn skip_observe(&self) -> bool {
        self.skip_observe
    }

    pub fn options(&self) -> &EffectiveOptions {
        &self.options
    }

    /// Shorthand for a lookup on the effective options.
    pub fn option(&self, key: &str) -> Option<OptionValue> {
        self.options.get(key)
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted
    }

    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed
    }

    pub fn is_inactive(&self) -> bool {
        self.inactive
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.render
    }

    /// Read-only values resolved from ancestors' provisions.
    pub fn injections(&self) -> &Options {
        &self.injections
    }

    pub fn set_injections(&mut self, injections: Options) {
        self.injections = injections;
    }

    pub fn state(&self) -> &Options {
        &self.state
    }

    pub fn set_state(&mut self, state: Options) {
        self.state = state;
    }

    /// Values this instance provides to its descendants.
    pub fn provided(&self) -> Option<&Options> {
        self.provided.as_ref()
    }

    pub fn set_provided(&mut self, provided: Options) {
        self.provided = Some(provided);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// All live instances, keyed by id in creation order.
#[derive(Debug, Default)]
pub struct InstanceTree {
    instances: IndexMap<InstanceId, Instance>,
}

impl InstanceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: InstanceId) -> impl Iterator<Item = &Instance> + '_ {
        let mut next = self.get(id).and_then(|vm| vm.parent);
        std::iter::from_fn(move || {
            let vm = self.get(next?)?;
            next = vm.parent;
            Some(vm)
        })
    }

    pub(crate) fn insert(&mut self, vm: Instance) {
        self.instances.insert(vm.id, vm);
    }

    pub(crate) fn remove(&mut self, id: InstanceId) -> Option<Instance> {
        self.instances.shift_remove(&id)
    }

    pub(crate) fn link_child(&mut self, parent: InstanceId, child: InstanceId) {
        if let Some(vm) = self.instances.get_mut(&parent) {
            vm.children.push(child);
        }
    }

    pub(crate) fn unlink_child(&mut self, parent: InstanceId, child: InstanceId) {
        if let Some(vm) = self.instances.get_mut(&parent) {
            vm.children.retain(|c| *c != child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(id: InstanceId) -> Instance {
        Instance::new(id, DefinitionId(0), false, EffectiveOptions::Merged(Options::new()))
    }

    #[test]
    fn test_ids_increase() {
        let a = next_instance_id();
        let b = next_instance_id();
        assert!(b > a);
    }

    #[test]
    fn test_new_instance_is_its_own_root() {
        let vm = bare(next_instance_id());
        assert_eq!(vm.root(), vm.id());
        assert_eq!(vm.phase(), Phase::Created);
        assert!(vm.children().is_empty());
        assert!(!vm.is_mounted());
    }

    #[test]
    fn test_tree_links_and_ancestors() {
        let mut tree = InstanceTree::new();
        let root = bare(next_instance_id());
        let root_id = root.id();
        let mut child = bare(next_instance_id());
        child.parent = Some(root_id);
        let child_id = child.id();
        let mut grandchild = bare(next_instance_id());
        grandchild.parent = Some(child_id);
        let grandchild_id = grandchild.id();

        tree.insert(root);
        tree.insert(child);
        tree.insert(grandchild);
        tree.link_child(root_id, child_id);
        tree.link_child(child_id, grandchild_id);

        let ancestors: Vec<_> = tree.ancestors(grandchild_id).map(|vm| vm.id()).collect();
        assert_eq!(ancestors, vec![child_id, root_id]);

        tree.unlink_child(root_id, child_id);
        assert!(tree.get(root_id).unwrap().children().is_empty());
        assert_eq!(tree.len(), 3);
        assert!(tree.remove(grandchild_id).is_some());
        assert!(!tree.contains(grandchild_id));
    }
}
