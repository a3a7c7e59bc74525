//! Options resolution.
//!
//! Resolves a definition's effective options by walking its parent chain. A
//! definition is re-merged only when its parent's resolved options changed
//! identity since the last merge, or when keys on its own live options were
//! modified after that merge. Otherwise the cached result is returned as is.

use log::debug;

use lineage_core::{keys, DefinitionError, DefinitionId, MergeService, OptionKey, OptionValue, Options};

use crate::registry::{DefinitionRecord, DefinitionRegistry};

/// Resolve the options of `definition`, re-merging along the chain where needed.
///
/// The chain length bounds the recursion depth.
pub fn resolve_options<M: MergeService + ?Sized>(
    registry: &mut DefinitionRegistry,
    merge: &M,
    definition: DefinitionId,
) -> Result<Options, DefinitionError> {
    let mut resolver = OptionsResolver::new(registry, merge);
    resolver.resolve(definition)
}

/// Merge `mixin` into a definition's live options.
///
/// The live map gets a new identity: descendants of a base definition re-merge
/// on their next resolution, and an extended definition picks the mixed-in keys
/// up as late modifications.
pub fn apply_mixin<M: MergeService + ?Sized>(
    registry: &mut DefinitionRegistry,
    merge: &M,
    definition: DefinitionId,
    mixin: &Options,
) -> Result<Options, DefinitionError> {
    let mixed = merge.merge(registry.options(definition)?, mixin);
    registry.replace_options(definition, mixed.clone())?;
    Ok(mixed)
}

/// Look up a component by name in the resolved `components` table of `definition`.
///
/// Tries the name as given, then camelized (`my-card` -> `myCard`), then
/// capitalized (`MyCard`).
pub fn lookup_component<M: MergeService + ?Sized>(
    registry: &mut DefinitionRegistry,
    merge: &M,
    definition: DefinitionId,
    name: &str,
) -> Result<Option<DefinitionId>, DefinitionError> {
    let options = resolve_options(registry, merge, definition)?;
    let components = match options.get(keys::COMPONENTS.as_str()).and_then(|v| v.as_map()) {
        Some(components) => components,
        None => return Ok(None),
    };
    let camelized = camelize(name);
    let capitalized = capitalize(&camelized);
    let found = [name, camelized.as_str(), capitalized.as_str()]
        .iter()
        .find_map(|candidate| components.get(candidate).and_then(|v| v.as_definition()));
    Ok(found)
}

fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct OptionsResolver<'a, M: ?Sized> {
    registry: &'a mut DefinitionRegistry,
    merge: &'a M,
}

impl<'a, M: MergeService + ?Sized> OptionsResolver<'a, M> {
    fn new(registry: &'a mut DefinitionRegistry, merge: &'a M) -> Self {
        Self { registry, merge }
    }

    fn resolve(&mut self, definition: DefinitionId) -> Result<Options, DefinitionError> {
        let parent = match self.registry.record(definition)?.parent() {
            Some(parent) => parent,
            // Base definitions carry their own options.
            None => return Ok(self.registry.options(definition)?.clone()),
        };

        let super_options = self.resolve(parent)?;

        let record = self.registry.record(definition)?;
        let super_changed = !record
            .super_options_seen()
            .map_or(false, |seen| seen.same(&super_options));
        let live_replaced = !record.options().same(record.sealed_options());
        let modified = if live_replaced { late_modifications(record) } else { None };

        if !super_changed && modified.is_none() {
            // Same keys, same values: only the map identity changed.
            if live_replaced {
                self.registry.reseal_live(definition)?;
            }
            return Ok(self.registry.options(definition)?.clone());
        }

        if let Some(modified) = &modified {
            debug!(
                "{definition}: late-modified keys {:?}, removed {:?}",
                modified.changed.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
                modified.removed.iter().map(|k| k.as_str()).collect::<Vec<_>>()
            );
            self.registry
                .fold_extend_options(definition, &modified.changed, &modified.removed)?;
        }
        if super_changed {
            debug!("{definition}: parent {parent} options changed, re-merging");
        }

        let extend_options = self.registry.record(definition)?.extend_options().clone();
        let mut merged = self.merge.merge(&super_options, &extend_options);
        let name = merged.get(keys::NAME.as_str()).and_then(|v| v.as_str()).map(str::to_string);
        if let Some(name) = name {
            debug!("{definition}: self-registering as {name:?}");
            merged = register_self(&merged, &name, definition);
        }

        self.registry.put(definition, super_options, merged.clone())?;
        self.registry.snapshot_sealed(definition)?;
        Ok(merged)
    }
}

/// Live options that diverged from the sealed snapshot.
struct LateModifications {
    /// Keys added or given a different value.
    changed: Options,
    /// Sealed keys no longer present in the live options.
    removed: Vec<OptionKey>,
}

fn late_modifications(record: &DefinitionRecord) -> Option<LateModifications> {
    let sealed = record.sealed_options();
    let live = record.options();
    let changed: Options = live
        .iter()
        .filter(|(key, value)| {
            sealed
                .get(key.as_str())
                .map_or(true, |sealed_value| !sealed_value.same(value))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let removed: Vec<OptionKey> = sealed
        .keys()
        .filter(|key| !live.contains(key.as_str()))
        .cloned()
        .collect();
    if changed.is_empty() && removed.is_empty() {
        None
    } else {
        Some(LateModifications { changed, removed })
    }
}

fn register_self(merged: &Options, name: &str, definition: DefinitionId) -> Options {
    let components = merged
        .get(keys::COMPONENTS.as_str())
        .and_then(|v| v.as_map())
        .cloned()
        .unwrap_or_default();
    merged.with(keys::COMPONENTS, components.with(name, OptionValue::Definition(definition)))
}
