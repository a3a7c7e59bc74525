//! The instance creation pipeline.

use std::time::Instant;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use lineage_core::{
    CollaboratorError, CollaboratorStep, DefaultMergeStrategies, DefinitionError, DefinitionId,
    InstanceId, LifecycleError, LifecycleHook, MergeService, Options, RuntimeConfig,
};
use lineage_resolver::{apply_mixin, lookup_component, resolve_options, DefinitionRegistry};

use crate::collaborators::{Collaborators, DefaultCollaborators};
use crate::events::init_events;
use crate::instance::{next_instance_id, Instance, InstanceTree, Phase};
use crate::internal::{build_internal, EffectiveOptions, InternalCreateOptions, PlaceholderNode};
use crate::lifecycle::{call_hook, format_component_name, init_lifecycle};
use crate::render::init_render;

/// How an instance is created.
#[derive(Debug, Clone)]
pub enum CreateConfig {
    /// Merge the definition's resolved options with per-instance `options`.
    Root {
        definition: DefinitionId,
        options: Options,
    },
    /// Fast path for a child produced while its parent renders.
    Internal(InternalCreateOptions),
}

impl CreateConfig {
    pub fn root(definition: DefinitionId, options: Options) -> Self {
        CreateConfig::Root { definition, options }
    }
}

/// Owns the definition registry and the live instances.
pub struct Runtime<M = DefaultMergeStrategies, C = DefaultCollaborators> {
    registry: DefinitionRegistry,
    merge: M,
    collaborators: C,
    tree: InstanceTree,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_parts(DefaultMergeStrategies::new(), DefaultCollaborators, RuntimeConfig::default())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MergeService, C: Collaborators> Runtime<M, C> {
    pub fn with_parts(merge: M, collaborators: C, config: RuntimeConfig) -> Self {
        Self {
            registry: DefinitionRegistry::new(),
            merge,
            collaborators,
            tree: InstanceTree::new(),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RuntimeConfig) {
        self.config = config;
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Direct registry access, for late modifications.
    pub fn registry_mut(&mut self) -> &mut DefinitionRegistry {
        &mut self.registry
    }

    pub fn merge_service(&self) -> &M {
        &self.merge
    }

    pub fn collaborators(&self) -> &C {
        &self.collaborators
    }

    pub fn collaborators_mut(&mut self) -> &mut C {
        &mut self.collaborators
    }

    pub fn define(&mut self, options: Options) -> DefinitionId {
        self.registry.define(options)
    }

    pub fn extend(&mut self, parent: DefinitionId, options: Options) -> Result<DefinitionId, DefinitionError> {
        self.registry.extend(parent, options)
    }

    pub fn resolve(&mut self, definition: DefinitionId) -> Result<Options, DefinitionError> {
        resolve_options(&mut self.registry, &self.merge, definition)
    }

    pub fn mixin(&mut self, definition: DefinitionId, mixin: &Options) -> Result<Options, DefinitionError> {
        apply_mixin(&mut self.registry, &self.merge, definition, mixin)
    }

    pub fn lookup_component(
        &mut self,
        definition: DefinitionId,
        name: &str,
    ) -> Result<Option<DefinitionId>, DefinitionError> {
        lookup_component(&mut self.registry, &self.merge, definition, name)
    }

    /// Placeholder node for `definition`, resolving the definition first the
    /// way a render pass does before creating the child.
    pub fn component_node(&mut self, definition: DefinitionId, tag: &str) -> Result<PlaceholderNode, DefinitionError> {
        self.resolve(definition)?;
        Ok(PlaceholderNode::new(definition, tag))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.tree.get(id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.tree.get_mut(id)
    }

    pub fn instances(&self) -> &InstanceTree {
        &self.tree
    }

    pub fn create_root(&mut self, definition: DefinitionId, options: Options) -> Result<InstanceId, LifecycleError> {
        self.create_instance(CreateConfig::root(definition, options))
    }

    pub fn create_internal(&mut self, options: InternalCreateOptions) -> Result<InstanceId, LifecycleError> {
        self.create_instance(CreateConfig::Internal(options))
    }

    /// Create an instance and run it through initialization.
    ///
    /// On failure the instance is detached from its parent and dropped; the
    /// registry keeps whatever resolutions completed.
    pub fn create_instance(&mut self, config: CreateConfig) -> Result<InstanceId, LifecycleError> {
        let started = self.config.performance.then(Instant::now);
        let id = next_instance_id();
        trace!("{id}: assigned");

        let (definition, is_internal, options) = self.effective_options(id, config)?;
        let mut vm = Instance::new(id, definition, is_internal, options);
        vm.mark_skip_observe();
        trace!("{id}: options resolved for {definition}");

        init_lifecycle(&mut vm, &mut self.tree, &self.config);
        init_events(&mut vm);
        init_render(&mut vm);
        trace!("{id}: relations, events and render context initialized");

        if let Err(err) = self.initialize(&mut vm, started) {
            if let Some(parent) = vm.parent() {
                self.tree.unlink_child(parent, id);
            }
            return Err(err);
        }
        self.tree.insert(vm);
        Ok(id)
    }

    fn effective_options(
        &mut self,
        id: InstanceId,
        config: CreateConfig,
    ) -> Result<(DefinitionId, bool, EffectiveOptions), LifecycleError> {
        match config {
            CreateConfig::Root { definition, options } => {
                let resolved = self.resolve(definition)?;
                let merged = self.merge.merge(&resolved, &options);
                Ok((definition, false, EffectiveOptions::Merged(merged)))
            }
            CreateConfig::Internal(options) => {
                if !self.tree.contains(options.parent) {
                    return Err(LifecycleError::UnknownInstance { id: options.parent });
                }
                let definition = options.parent_node.definition;
                let base = match self.registry.get(definition) {
                    Some(base) => base.clone(),
                    None => {
                        if !self.config.silent {
                            warn!("{id}: internal creation from unresolved definition {definition}, resolving it now");
                        }
                        self.resolve(definition)?
                    }
                };
                Ok((definition, true, build_internal(&base, options)))
            }
        }
    }

    /// Hooks and collaborators, from `beforeCreate` through mount.
    fn initialize(&mut self, vm: &mut Instance, started: Option<Instant>) -> Result<(), LifecycleError> {
        let id = vm.id();

        call_hook(vm, LifecycleHook::BeforeCreate)?;
        vm.phase = Phase::BeforeCreate;

        self.collaborators
            .resolve_injections(vm, &self.tree)
            .map_err(step_error(CollaboratorStep::Injections, id))?;
        vm.phase = Phase::Injected;
        trace!("{id}: injections resolved");

        self.collaborators
            .init_state(vm)
            .map_err(step_error(CollaboratorStep::State, id))?;
        vm.phase = Phase::StateInitialized;
        trace!("{id}: state initialized");

        self.collaborators
            .resolve_provisions(vm)
            .map_err(step_error(CollaboratorStep::Provisions, id))?;
        vm.phase = Phase::Provided;
        trace!("{id}: provisions resolved");

        call_hook(vm, LifecycleHook::Created)?;
        vm.phase = Phase::Ready;

        if let Some(started) = started {
            debug!("{id}: {} init took {:?}", format_component_name(vm), started.elapsed());
        }

        if let Some(target) = vm.options().el() {
            let mount_started = self.config.performance.then(Instant::now);
            self.collaborators
                .mount(vm, &target)
                .map_err(step_error(CollaboratorStep::Mount, id))?;
            vm.is_mounted = true;
            vm.phase = Phase::Mounted;
            if let Some(mount_started) = mount_started {
                debug!("{id}: {} mount took {:?}", format_component_name(vm), mount_started.elapsed());
            }
        }
        Ok(())
    }

    /// Tear down `id` and its descendants, children first after `beforeDestroy`.
    ///
    /// Returns the detached instance. A failing hook stops the teardown where
    /// it is: instances already torn down stay removed, the rest stay live.
    pub fn destroy(&mut self, id: InstanceId) -> Result<Instance, LifecycleError> {
        if !self.tree.contains(id) {
            return Err(LifecycleError::UnknownInstance { id });
        }
        let mut children: IndexMap<InstanceId, Vec<InstanceId>> = IndexMap::new();
        for vm in self.tree.iter() {
            if let Some(parent) = vm.parent() {
                children.entry(parent).or_default().push(vm.id());
            }
        }
        self.teardown(id, &children)
    }

    fn teardown(
        &mut self,
        id: InstanceId,
        children: &IndexMap<InstanceId, Vec<InstanceId>>,
    ) -> Result<Instance, LifecycleError> {
        let vm = self.tree.get_mut(id).ok_or(LifecycleError::UnknownInstance { id })?;
        call_hook(vm, LifecycleHook::BeforeDestroy)?;

        for &child in children.get(&id).into_iter().flatten() {
            self.teardown(child, children)?;
        }

        let mut vm = self.tree.remove(id).ok_or(LifecycleError::UnknownInstance { id })?;
        if let Some(parent) = vm.parent() {
            self.tree.unlink_child(parent, id);
        }
        vm.is_destroyed = true;
        vm.phase = Phase::Destroyed;
        call_hook(&mut vm, LifecycleHook::Destroyed)?;
        vm.events.clear();
        debug!("{id}: destroyed");
        Ok(vm)
    }
}

fn step_error(step: CollaboratorStep, instance: InstanceId) -> impl FnOnce(CollaboratorError) -> LifecycleError {
    move |source| LifecycleError::Collaborator { step, instance, source }
}
