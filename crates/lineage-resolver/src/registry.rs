//! Definition registry for storing component definitions and their merge snapshots.
//!
//! The registry is an arena: a definition can only extend a definition that is
//! already registered, so every parent id is smaller than its child's id and
//! inheritance chains cannot form cycles.

use indexmap::IndexMap;

use lineage_core::{
    keys, DefinitionError, DefinitionId, Hook, HookList, LifecycleHook, OptionKey, OptionValue,
    Options,
};

/// Stored state of one definition.
#[derive(Debug, Clone)]
pub struct DefinitionRecord {
    parent: Option<DefinitionId>,
    /// Live options. Late modifications replace this map.
    options: Options,
    /// Options as passed when the definition was created. Late modifications
    /// are folded back in so later merges see them.
    extend_options: Options,
    /// Result of the last merge.
    resolved: Option<Options>,
    /// Parent options observed at the last merge.
    super_seen: Option<Options>,
    /// Snapshot of the live options taken right after the last merge.
    sealed: Options,
}

impl DefinitionRecord {
    fn new(parent: Option<DefinitionId>, options: Options) -> Self {
        Self {
            parent,
            options: options.clone(),
            extend_options: options.clone(),
            resolved: None,
            super_seen: None,
            sealed: options,
        }
    }

    pub fn parent(&self) -> Option<DefinitionId> {
        self.parent
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn extend_options(&self) -> &Options {
        &self.extend_options
    }

    pub fn resolved_options(&self) -> Option<&Options> {
        self.resolved.as_ref()
    }

    pub fn super_options_seen(&self) -> Option<&Options> {
        self.super_seen.as_ref()
    }

    pub fn sealed_options(&self) -> &Options {
        &self.sealed
    }

    /// Name carried by the live options, if any.
    pub fn name(&self) -> Option<&str> {
        self.options.get(keys::NAME.as_str()).and_then(|v| v.as_str())
    }
}

/// Arena of definitions keyed by [`DefinitionId`].
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    records: Vec<DefinitionRecord>,
}

impl DefinitionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a base definition. Its own options are its resolved options.
    pub fn define(&mut self, options: Options) -> DefinitionId {
        self.push(DefinitionRecord::new(None, options))
    }

    /// Register a definition extending `parent`.
    ///
    /// Nothing is merged here; the first resolution performs the merge.
    pub fn extend(
        &mut self,
        parent: DefinitionId,
        extend_options: Options,
    ) -> Result<DefinitionId, DefinitionError> {
        self.record(parent)?;
        Ok(self.push(DefinitionRecord::new(Some(parent), extend_options)))
    }

    fn push(&mut self, record: DefinitionRecord) -> DefinitionId {
        let id = DefinitionId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    pub fn record(&self, id: DefinitionId) -> Result<&DefinitionRecord, DefinitionError> {
        self.records
            .get(id.0 as usize)
            .ok_or(DefinitionError::UnknownDefinition { id })
    }

    fn record_mut(&mut self, id: DefinitionId) -> Result<&mut DefinitionRecord, DefinitionError> {
        self.records
            .get_mut(id.0 as usize)
            .ok_or(DefinitionError::UnknownDefinition { id })
    }

    /// Options of a definition that has been resolved at least once.
    ///
    /// Base definitions are always resolved. The returned map includes late
    /// modifications made since the last merge.
    pub fn get(&self, id: DefinitionId) -> Option<&Options> {
        let record = self.records.get(id.0 as usize)?;
        if record.parent.is_none() || record.resolved.is_some() {
            Some(&record.options)
        } else {
            None
        }
    }

    /// Live options, resolved or not.
    pub fn options(&self, id: DefinitionId) -> Result<&Options, DefinitionError> {
        Ok(&self.record(id)?.options)
    }

    pub fn parent(&self, id: DefinitionId) -> Option<DefinitionId> {
        self.records.get(id.0 as usize).and_then(|r| r.parent)
    }

    /// The definition followed by its ancestors, nearest first.
    pub fn chain(&self, id: DefinitionId) -> Result<Vec<DefinitionId>, DefinitionError> {
        let mut chain = vec![id];
        let mut current = self.record(id)?.parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.record(parent)?.parent;
        }
        Ok(chain)
    }

    /// Store a merge result together with the parent options it was merged from.
    pub fn put(
        &mut self,
        id: DefinitionId,
        super_options: Options,
        merged: Options,
    ) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        record.super_seen = Some(super_options);
        record.resolved = Some(merged.clone());
        record.options = merged;
        Ok(())
    }

    /// Seal the current live options as the baseline for late-modification detection.
    pub fn snapshot_sealed(&mut self, id: DefinitionId) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        // Maps are immutable; sharing the allocation is a snapshot.
        record.sealed = record.options.clone();
        Ok(())
    }

    /// Fold late modifications into the extension options: `changed` keys
    /// overwrite, `removed` keys are dropped.
    pub fn fold_extend_options(
        &mut self,
        id: DefinitionId,
        changed: &Options,
        removed: &[OptionKey],
    ) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        let mut extend_options = record.extend_options.extended_with(changed);
        for key in removed {
            extend_options = extend_options.without(key.as_str());
        }
        record.extend_options = extend_options;
        Ok(())
    }

    /// Point the live options back at the last merge result.
    ///
    /// Only valid when the live map holds exactly the sealed keys and values.
    pub(crate) fn reseal_live(&mut self, id: DefinitionId) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        if let Some(resolved) = &record.resolved {
            record.options = resolved.clone();
            record.sealed = resolved.clone();
        }
        Ok(())
    }

    /// Late modification: set one key on the live options.
    ///
    /// The live map is replaced, so descendants of a base definition see a new
    /// identity and the next resolution of an extended definition detects the key.
    pub fn set_option(
        &mut self,
        id: DefinitionId,
        key: impl Into<OptionKey>,
        value: impl Into<OptionValue>,
    ) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        record.options = record.options.with(key, value);
        Ok(())
    }

    /// Late modification: drop one key from the live options.
    pub fn remove_option(&mut self, id: DefinitionId, key: &str) -> Result<(), DefinitionError> {
        let record = self.record_mut(id)?;
        record.options = record.options.without(key);
        Ok(())
    }

    /// Replace the live options wholesale.
    pub fn replace_options(&mut self, id: DefinitionId, options: Options) -> Result<(), DefinitionError> {
        self.record_mut(id)?.options = options;
        Ok(())
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builder for definition options.
#[derive(Debug, Default)]
pub struct DefinitionBuilder {
    entries: IndexMap<OptionKey, OptionValue>,
}

impl DefinitionBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registrable name.
    pub fn name(self, name: &str) -> Self {
        self.option(keys::NAME, OptionValue::str(name))
    }

    /// Set an arbitrary option. A later call with the same key wins.
    pub fn option(mut self, key: impl Into<OptionKey>, value: impl Into<OptionValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Append a lifecycle callback.
    pub fn hook(mut self, hook: LifecycleHook, callback: Hook) -> Self {
        let hooks = match self.entries.get(hook.name()) {
            Some(OptionValue::Hooks(list)) => list.iter().cloned().chain(std::iter::once(callback)).collect(),
            _ => HookList::single(callback),
        };
        self.entries.insert(hook.key(), OptionValue::Hooks(hooks));
        self
    }

    /// Register a local component under `name`.
    pub fn component(self, name: &str, definition: DefinitionId) -> Self {
        let table = match self.entries.get(keys::COMPONENTS.as_str()) {
            Some(OptionValue::Map(m)) => m.with(name, definition),
            _ => Options::new().with(name, definition),
        };
        self.option(keys::COMPONENTS, table)
    }

    /// Build the option map.
    pub fn build(self) -> Options {
        self.entries.into_iter().collect()
    }

    /// Build and register as a base definition.
    pub fn define(self, registry: &mut DefinitionRegistry) -> DefinitionId {
        registry.define(self.build())
    }

    /// Build and register as an extension of `parent`.
    pub fn extend(
        self,
        registry: &mut DefinitionRegistry,
        parent: DefinitionId,
    ) -> Result<DefinitionId, DefinitionError> {
        registry.extend(parent, self.build())
    }
}
