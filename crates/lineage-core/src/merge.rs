//! The merge service interface and the default per-key strategy table.
//!
//! The resolver decides *when* two option maps are merged; the merge service
//! decides *how*. [`DefaultMergeStrategies`] covers the common keys and can be
//! extended with custom strategies per key.

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::hooks::LifecycleHook;
use crate::types::{keys, OptionKey, OptionValue, Options};

/// Combines a parent option map with a child option map.
///
/// Implementations must be deterministic and must return a fresh map: the
/// identity of the result is what descendants use to detect change.
pub trait MergeService {
    fn merge(&self, parent: &Options, child: &Options) -> Options;
}

impl<F> MergeService for F
where
    F: Fn(&Options, &Options) -> Options,
{
    fn merge(&self, parent: &Options, child: &Options) -> Options {
        self(parent, child)
    }
}

/// Combines the parent and child value of a single key.
///
/// `None` means the key is absent on that side. Returning `None` drops the key.
pub type MergeStrategy = fn(Option<&OptionValue>, Option<&OptionValue>) -> Option<OptionValue>;

/// Strategy table keyed by option key, falling back to [`default_strategy`].
#[derive(Debug, Clone)]
pub struct DefaultMergeStrategies {
    strategies: IndexMap<OptionKey, MergeStrategy>,
}

impl Default for DefaultMergeStrategies {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultMergeStrategies {
    pub fn new() -> Self {
        let mut strategies: IndexMap<OptionKey, MergeStrategy> = IndexMap::new();
        for hook in LifecycleHook::ALL {
            strategies.insert(hook.key(), merge_hooks);
        }
        for key in [
            keys::COMPONENTS,
            keys::DIRECTIVES,
            keys::FILTERS,
            keys::PROPS,
            keys::METHODS,
            keys::COMPUTED,
            keys::INJECT,
        ] {
            strategies.insert(key, merge_maps);
        }
        strategies.insert(keys::WATCH, merge_watch);
        strategies.insert(keys::DATA, merge_data);
        strategies.insert(keys::PROVIDE, merge_data);
        Self { strategies }
    }

    /// Register or replace the strategy used for `key`.
    pub fn with_strategy(mut self, key: impl Into<OptionKey>, strategy: MergeStrategy) -> Self {
        self.strategies.insert(key.into(), strategy);
        self
    }

    pub fn strategy_for(&self, key: &str) -> MergeStrategy {
        self.strategies.get(key).copied().unwrap_or(default_strategy)
    }

    fn merge_field(
        &self,
        key: &OptionKey,
        parent: &Options,
        child: &Options,
        merged: &mut Vec<(OptionKey, OptionValue)>,
    ) {
        let strategy = self.strategy_for(key.as_str());
        if let Some(value) = strategy(parent.get(key.as_str()), child.get(key.as_str())) {
            merged.push((key.clone(), value));
        }
    }
}

impl MergeService for DefaultMergeStrategies {
    fn merge(&self, parent: &Options, child: &Options) -> Options {
        let mut merged = Vec::with_capacity(parent.len() + child.len());
        for key in parent.keys() {
            self.merge_field(key, parent, child, &mut merged);
        }
        for key in child.keys() {
            if !parent.contains(key.as_str()) {
                self.merge_field(key, parent, child, &mut merged);
            }
        }
        merged.into_iter().collect()
    }
}

/// Child value when present, otherwise the parent value.
pub fn default_strategy(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
    child.or(parent).cloned()
}

/// Parent callbacks run before child callbacks; a callback shared by both runs once.
pub fn merge_hooks(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
    match (parent, child) {
        (Some(OptionValue::Hooks(p)), Some(OptionValue::Hooks(c))) => Some(OptionValue::Hooks(p.concat(c))),
        _ => default_strategy(parent, child),
    }
}

/// Shallow extend: child entries override parent entries of the same name.
pub fn merge_maps(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
    match (parent, child) {
        (Some(OptionValue::Map(p)), Some(OptionValue::Map(c))) => Some(OptionValue::Map(p.extended_with(c))),
        _ => default_strategy(parent, child),
    }
}

/// Watchers on the same expression accumulate instead of overriding.
pub fn merge_watch(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
    let (p, c) = match (parent, child) {
        (Some(OptionValue::Map(p)), Some(OptionValue::Map(c))) => (p, c),
        _ => return default_strategy(parent, child),
    };
    let mut merged: IndexMap<OptionKey, OptionValue> = p.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (key, value) in c.iter() {
        match merged.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let combined: Vec<OptionValue> = as_items(entry.get()).chain(as_items(value)).collect();
                entry.insert(OptionValue::list(combined));
            }
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
            }
        }
    }
    Some(OptionValue::Map(merged.into_iter().collect()))
}

fn as_items(value: &OptionValue) -> impl Iterator<Item = OptionValue> + '_ {
    let items: &[OptionValue] = match value {
        OptionValue::List(items) => &**items,
        other => std::slice::from_ref(other),
    };
    items.iter().cloned()
}

/// Data factories are combined into a factory that evaluates both and deep
/// merges the results, child values winning.
pub fn merge_data(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
    let (parent, child) = match (parent, child) {
        (Some(p), Some(c)) => (p.clone(), c.clone()),
        _ => return default_strategy(parent, child),
    };
    Some(OptionValue::function(move |args| {
        match (evaluate_data(&child, args), evaluate_data(&parent, args)) {
            (Some(to), Some(from)) => OptionValue::Map(merge_data_objects(&to, &from)),
            (Some(data), None) | (None, Some(data)) => OptionValue::Map(data),
            (None, None) => OptionValue::Null,
        }
    }))
}

fn evaluate_data(value: &OptionValue, args: &[OptionValue]) -> Option<Options> {
    match value {
        OptionValue::Function(f) => f(args).as_map().cloned(),
        OptionValue::Map(m) => Some(m.clone()),
        _ => None,
    }
}

fn merge_data_objects(to: &Options, from: &Options) -> Options {
    let mut merged: IndexMap<OptionKey, OptionValue> = to.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (key, from_value) in from.iter() {
        match merged.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(from_value.clone());
            }
            Entry::Occupied(mut entry) => {
                if let (OptionValue::Map(to_map), OptionValue::Map(from_map)) = (entry.get_mut(), from_value) {
                    *to_map = merge_data_objects(to_map, from_map);
                }
            }
        }
    }
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{Hook, HookList};

    fn data_fn(key: &'static str, value: f64) -> OptionValue {
        OptionValue::function(move |_| OptionValue::Map(Options::new().with(key, value)))
    }

    #[test]
    fn test_default_strategy_child_wins() {
        let parent = Options::new().with("template", "a").with("only_parent", true);
        let child = Options::new().with("template", "b");
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        assert_eq!(merged.get("template").and_then(|v| v.as_str()), Some("b"));
        assert_eq!(merged.get("only_parent").and_then(|v| v.as_bool()), Some(true));
        assert!(!merged.same(&parent));
        assert!(!merged.same(&child));
    }

    #[test]
    fn test_merge_key_order_parent_first() {
        let parent = Options::new().with("a", 1.0).with("b", 1.0);
        let child = Options::new().with("c", 1.0).with("a", 2.0);
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        let keys: Vec<_> = merged.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_hooks_concatenates() {
        let a = Hook::new(|_: &mut ()| Ok(()));
        let b = Hook::new(|_: &mut ()| Ok(()));
        let parent = Options::new().with(LifecycleHook::Created.key(), HookList::single(a.clone()));
        let child = Options::new().with(LifecycleHook::Created.key(), HookList::single(b.clone()));
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        let hooks = merged.get("created").and_then(|v| v.as_hooks()).unwrap();
        let order: Vec<_> = hooks.iter().collect();
        assert_eq!(order.len(), 2);
        assert!(order[0].same(&a));
        assert!(order[1].same(&b));
    }

    #[test]
    fn test_merge_components_extends() {
        let parent = Options::new().with(keys::COMPONENTS, Options::new().with("Button", 1.0).with("Card", 1.0));
        let child = Options::new().with(keys::COMPONENTS, Options::new().with("Card", 2.0));
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        let components = merged.get("components").and_then(|v| v.as_map()).unwrap();
        assert_eq!(components.get("Button").and_then(|v| v.as_number()), Some(1.0));
        assert_eq!(components.get("Card").and_then(|v| v.as_number()), Some(2.0));
    }

    #[test]
    fn test_merge_watch_accumulates() {
        let parent = Options::new().with(keys::WATCH, Options::new().with("value", "onParent"));
        let child = Options::new().with(keys::WATCH, Options::new().with("value", "onChild").with("other", "x"));
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        let watch = merged.get("watch").and_then(|v| v.as_map()).unwrap();
        let value = watch.get("value").and_then(|v| v.as_list()).unwrap();
        assert_eq!(value.len(), 2);
        assert_eq!(value[0].as_str(), Some("onParent"));
        assert_eq!(value[1].as_str(), Some("onChild"));
        assert_eq!(watch.get("other").and_then(|v| v.as_str()), Some("x"));
    }

    #[test]
    fn test_merge_data_functions() {
        let parent = Options::new().with(keys::DATA, data_fn("a", 1.0));
        let child = Options::new().with(keys::DATA, data_fn("b", 2.0));
        let merged = DefaultMergeStrategies::new().merge(&parent, &child);
        let factory = merged.get("data").and_then(|v| v.as_function()).unwrap();
        let data = factory(&[]);
        let data = data.as_map().unwrap();
        assert_eq!(data.get("a").and_then(|v| v.as_number()), Some(1.0));
        assert_eq!(data.get("b").and_then(|v| v.as_number()), Some(2.0));
    }

    #[test]
    fn test_merge_data_nested_child_wins() {
        let parent = OptionValue::Map(
            Options::new().with("style", Options::new().with("color", "red").with("size", 1.0)),
        );
        let child = OptionValue::Map(Options::new().with("style", Options::new().with("color", "blue")));
        let merged = merge_data(Some(&parent), Some(&child)).unwrap();
        let data = merged.as_function().unwrap()(&[]);
        let style = data.as_map().and_then(|d| d.get("style")).and_then(|v| v.as_map()).unwrap();
        assert_eq!(style.get("color").and_then(|v| v.as_str()), Some("blue"));
        assert_eq!(style.get("size").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_custom_strategy() {
        fn keep_parent(parent: Option<&OptionValue>, child: Option<&OptionValue>) -> Option<OptionValue> {
            parent.or(child).cloned()
        }
        let strategies = DefaultMergeStrategies::new().with_strategy("template", keep_parent);
        let merged = strategies.merge(
            &Options::new().with("template", "parent"),
            &Options::new().with("template", "child"),
        );
        assert_eq!(merged.get("template").and_then(|v| v.as_str()), Some("parent"));
    }

    #[test]
    fn test_closure_merge_service() {
        let service = |parent: &Options, child: &Options| parent.extended_with(child);
        let merged = service.merge(&Options::new().with("a", 1.0), &Options::new().with("b", 1.0));
        assert_eq!(merged.len(), 2);
    }
}
