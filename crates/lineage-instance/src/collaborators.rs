//! External initialization steps driven by the creation pipeline.
//!
//! The pipeline calls these in a fixed order: injections, state, provisions,
//! then mount when a target is configured. Implementations see the instance
//! before it is inserted into the tree; ancestors are reachable through `tree`.

use log::warn;

use lineage_core::{keys, CollaboratorError, InstanceId, OptionKey, OptionValue, Options};

use crate::instance::{Instance, InstanceTree};

/// Host-supplied initialization steps.
///
/// Every step defaults to doing nothing.
pub trait Collaborators {
    /// Populate the instance's injections from its ancestors. Runs before state.
    fn resolve_injections(
        &mut self,
        vm: &mut Instance,
        tree: &InstanceTree,
    ) -> Result<(), CollaboratorError> {
        let _ = (vm, tree);
        Ok(())
    }

    /// Set up the instance's state. Injections are already visible.
    fn init_state(&mut self, vm: &mut Instance) -> Result<(), CollaboratorError> {
        let _ = vm;
        Ok(())
    }

    /// Publish values for descendants. Runs after state.
    fn resolve_provisions(&mut self, vm: &mut Instance) -> Result<(), CollaboratorError> {
        let _ = vm;
        Ok(())
    }

    /// Mount the instance at `target`.
    fn mount(&mut self, vm: &mut Instance, target: &OptionValue) -> Result<(), CollaboratorError> {
        let _ = (vm, target);
        Ok(())
    }
}

/// Provide/inject and plain props/data state.
///
/// - `inject` is a list of keys, or a map from local name to either the
///   source key or `{ from, default }`.
/// - State is the declared props taken from `propsData`, followed by the
///   entries returned by `data`. `data` receives the props and injections.
/// - `provide` is a map, or a function receiving the state and injections.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollaborators;

const FROM: &str = "from";
const DEFAULT: &str = "default";

impl Collaborators for DefaultCollaborators {
    fn resolve_injections(
        &mut self,
        vm: &mut Instance,
        tree: &InstanceTree,
    ) -> Result<(), CollaboratorError> {
        let Some(inject) = vm.option(keys::INJECT.as_str()) else {
            return Ok(());
        };
        let mut injections: Vec<(OptionKey, OptionValue)> = Vec::new();
        for (local, source, default) in inject_entries(&inject)? {
            match provided_value(tree, vm.parent(), &source).or(default) {
                Some(value) => injections.push((local, value)),
                None => warn!("{}: injection \"{source}\" not found", vm.id()),
            }
        }
        vm.set_injections(injections.into_iter().collect());
        Ok(())
    }

    fn init_state(&mut self, vm: &mut Instance) -> Result<(), CollaboratorError> {
        let props = declared_props(vm)?;
        let mut state: Vec<(OptionKey, OptionValue)> =
            props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        if let Some(data) = vm.option(keys::DATA.as_str()) {
            let args = [OptionValue::Map(props.clone()), OptionValue::Map(vm.injections().clone())];
            let values = match &data {
                OptionValue::Function(f) => f(&args),
                other => other.clone(),
            };
            let values = match values {
                OptionValue::Map(values) => values,
                OptionValue::Null => Options::new(),
                _ => return Err(CollaboratorError::new("data must return a map")),
            };
            for (key, value) in values.iter() {
                if props.contains(key.as_str()) {
                    warn!("{}: data \"{key}\" is already declared as a prop", vm.id());
                    continue;
                }
                state.push((key.clone(), value.clone()));
            }
        }

        vm.set_state(state.into_iter().collect());
        Ok(())
    }

    fn resolve_provisions(&mut self, vm: &mut Instance) -> Result<(), CollaboratorError> {
        let provided = match vm.option(keys::PROVIDE.as_str()) {
            None => return Ok(()),
            Some(OptionValue::Map(provided)) => provided,
            Some(OptionValue::Function(f)) => {
                let args = [OptionValue::Map(vm.state().clone()), OptionValue::Map(vm.injections().clone())];
                match f(&args) {
                    OptionValue::Map(provided) => provided,
                    _ => return Err(CollaboratorError::new("provide must return a map")),
                }
            }
            Some(_) => return Err(CollaboratorError::new("provide must be a map or a function")),
        };
        vm.set_provided(provided);
        Ok(())
    }
}

type InjectEntry = (OptionKey, String, Option<OptionValue>);

fn inject_entries(inject: &OptionValue) -> Result<Vec<InjectEntry>, CollaboratorError> {
    match inject {
        OptionValue::List(names) => names
            .iter()
            .map(|name| {
                let name = name
                    .as_str()
                    .ok_or_else(|| CollaboratorError::new("inject list entries must be strings"))?;
                Ok((OptionKey::from(name), name.to_string(), None))
            })
            .collect(),
        OptionValue::Map(entries) => entries
            .iter()
            .map(|(local, entry)| match entry {
                OptionValue::Str(source) => Ok((local.clone(), source.to_string(), None)),
                OptionValue::Map(entry) => {
                    let source = entry
                        .get(FROM)
                        .and_then(|v| v.as_str())
                        .unwrap_or(local.as_str())
                        .to_string();
                    let default = entry.get(DEFAULT).map(|v| match v {
                        OptionValue::Function(f) => f(&[]),
                        other => other.clone(),
                    });
                    Ok((local.clone(), source, default))
                }
                _ => Err(CollaboratorError::new(format!("invalid inject entry \"{local}\""))),
            })
            .collect(),
        _ => Err(CollaboratorError::new("inject must be a list or a map")),
    }
}

/// Nearest provided value for `key`, starting at `start` and walking up.
fn provided_value(tree: &InstanceTree, start: Option<InstanceId>, key: &str) -> Option<OptionValue> {
    let mut next = start;
    while let Some(id) = next {
        let vm = tree.get(id)?;
        if let Some(value) = vm.provided().and_then(|p| p.get(key)) {
            return Some(value.clone());
        }
        next = vm.parent();
    }
    None
}

fn declared_props(vm: &Instance) -> Result<Options, CollaboratorError> {
    let props_data = vm.options().props_data().unwrap_or_default();
    let declared: Vec<String> = match vm.option(keys::PROPS.as_str()) {
        None => return Ok(props_data),
        Some(OptionValue::List(names)) => names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect(),
        Some(OptionValue::Map(names)) => names.keys().map(|k| k.as_str().to_string()).collect(),
        Some(_) => return Err(CollaboratorError::new("props must be a list or a map")),
    };
    Ok(declared
        .iter()
        .filter_map(|name| props_data.get(name).map(|v| (name.as_str(), v.clone())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::next_instance_id;
    use crate::internal::EffectiveOptions;
    use lineage_core::DefinitionId;

    fn instance(options: Options) -> Instance {
        Instance::new(next_instance_id(), DefinitionId(0), false, EffectiveOptions::Merged(options))
    }

    fn provider(tree: &mut InstanceTree, parent: Option<InstanceId>, provided: Options) -> InstanceId {
        let mut vm = instance(Options::new());
        vm.parent = parent;
        vm.set_provided(provided);
        let id = vm.id();
        tree.insert(vm);
        id
    }

    #[test]
    fn test_injections_from_nearest_ancestor() {
        let mut tree = InstanceTree::new();
        let outer = provider(&mut tree, None, Options::new().with("theme", "dark").with("locale", "en"));
        let inner = provider(&mut tree, Some(outer), Options::new().with("theme", "light"));

        let inject = OptionValue::list([OptionValue::str("theme"), OptionValue::str("locale")]);
        let mut vm = instance(Options::new().with(keys::INJECT, inject));
        vm.parent = Some(inner);

        DefaultCollaborators.resolve_injections(&mut vm, &tree).unwrap();
        assert_eq!(vm.injections().get("theme").and_then(|v| v.as_str()), Some("light"));
        assert_eq!(vm.injections().get("locale").and_then(|v| v.as_str()), Some("en"));
    }

    #[test]
    fn test_injection_alias_and_default() {
        let mut tree = InstanceTree::new();
        let root = provider(&mut tree, None, Options::new().with("theme", "dark"));

        let inject = Options::new()
            .with("colors", "theme")
            .with("size", Options::new().with(FROM, "size").with(DEFAULT, 12.0));
        let mut vm = instance(Options::new().with(keys::INJECT, inject));
        vm.parent = Some(root);

        DefaultCollaborators.resolve_injections(&mut vm, &tree).unwrap();
        assert_eq!(vm.injections().get("colors").and_then(|v| v.as_str()), Some("dark"));
        assert_eq!(vm.injections().get("size").and_then(|v| v.as_number()), Some(12.0));
    }

    #[test]
    fn test_missing_injection_is_skipped() {
        let tree = InstanceTree::new();
        let inject = OptionValue::list([OptionValue::str("missing")]);
        let mut vm = instance(Options::new().with(keys::INJECT, inject));
        DefaultCollaborators.resolve_injections(&mut vm, &tree).unwrap();
        assert!(vm.injections().is_empty());
    }

    #[test]
    fn test_state_from_props_and_data() {
        let data = OptionValue::function(|args| {
            let injections = args[1].as_map().cloned().unwrap_or_default();
            let theme = injections.get("theme").cloned().unwrap_or(OptionValue::Null);
            OptionValue::Map(Options::new().with("count", 0.0).with("theme", theme).with("label", "data"))
        });
        let options = Options::new()
            .with(keys::PROPS, OptionValue::list([OptionValue::str("label")]))
            .with(keys::PROPS_DATA, Options::new().with("label", "prop").with("ignored", true))
            .with(keys::DATA, data);
        let mut vm = instance(options);
        vm.set_injections(Options::new().with("theme", "dark"));

        DefaultCollaborators.init_state(&mut vm).unwrap();
        let state = vm.state();
        assert_eq!(state.get("label").and_then(|v| v.as_str()), Some("prop"));
        assert_eq!(state.get("theme").and_then(|v| v.as_str()), Some("dark"));
        assert_eq!(state.get("count").and_then(|v| v.as_number()), Some(0.0));
        assert!(!state.contains("ignored"));
    }

    #[test]
    fn test_data_must_be_map() {
        let mut vm = instance(Options::new().with(keys::DATA, OptionValue::function(|_| OptionValue::Bool(true))));
        assert!(DefaultCollaborators.init_state(&mut vm).is_err());
    }

    #[test]
    fn test_provide_function_sees_state() {
        let provide = OptionValue::function(|args| {
            let state = args[0].as_map().cloned().unwrap_or_default();
            OptionValue::Map(Options::new().with("total", state.get("count").cloned().unwrap_or(OptionValue::Null)))
        });
        let mut vm = instance(Options::new().with(keys::PROVIDE, provide));
        vm.set_state(Options::new().with("count", 3.0));

        DefaultCollaborators.resolve_provisions(&mut vm).unwrap();
        assert_eq!(vm.provided().and_then(|p| p.get("total")).and_then(|v| v.as_number()), Some(3.0));
    }

    #[test]
    fn test_no_provide_leaves_none() {
        let mut vm = instance(Options::new());
        DefaultCollaborators.resolve_provisions(&mut vm).unwrap();
        assert!(vm.provided().is_none());
    }
}
