//! Relation setup and lifecycle hook invocation.

use log::{trace, warn};

use lineage_core::{Hook, HookError, LifecycleError, LifecycleHook, RuntimeConfig};

use crate::instance::{Instance, InstanceTree};

/// Wrap a callback that runs with the instance as its context.
pub fn hook<F>(f: F) -> Hook
where
    F: Fn(&mut Instance) -> Result<(), HookError> + Send + Sync + 'static,
{
    Hook::new::<Instance, F>(f)
}

/// Invoke the callbacks registered for `hook`, in registration order.
///
/// The first failing callback aborts the rest and is returned to the caller.
/// Afterwards a `hook:<name>` event is emitted if anything listens for hook events.
pub fn call_hook(vm: &mut Instance, hook: LifecycleHook) -> Result<(), LifecycleError> {
    if let Some(handlers) = vm.options().hooks(hook) {
        trace!("{}: {} ({} callbacks)", vm.id(), hook, handlers.len());
        for handler in handlers.iter() {
            handler.call(vm).map_err(|source| LifecycleError::Hook {
                hook,
                instance: vm.id(),
                source,
            })?;
        }
    }
    if vm.events().has_hook_event() {
        vm.events().emit(&hook.event_name(), &[]);
    }
    Ok(())
}

/// Link the instance into the tree: effective parent, parent's children, root.
///
/// Abstract ancestors are skipped when choosing the parent that records the
/// instance as a child. An abstract instance keeps its given parent but is
/// not recorded as anyone's child. A parent that is not a live instance is
/// reported and the instance becomes a root.
pub fn init_lifecycle(vm: &mut Instance, tree: &mut InstanceTree, config: &RuntimeConfig) {
    let mut parent = vm.options().parent();
    if let Some(id) = parent {
        if !tree.contains(id) {
            if !config.silent {
                warn!("{}: parent {id} is not a live instance, creating it without a parent", vm.id());
            }
            parent = None;
        }
    }

    if let Some(mut id) = parent {
        if !vm.options().is_abstract() {
            while let Some(ancestor) = tree.get(id) {
                match ancestor.parent() {
                    Some(next) if ancestor.options().is_abstract() => id = next,
                    _ => break,
                }
            }
            tree.link_child(id, vm.id());
        }
        parent = Some(id);
    }

    vm.parent = parent;
    vm.root = parent
        .and_then(|id| tree.get(id))
        .map_or(vm.id(), |p| p.root());
    vm.children.clear();
    vm.is_mounted = false;
    vm.is_destroyed = false;
    vm.inactive = false;
}

/// `<Name>` for diagnostics; `<Root>` for a root instance, `<Anonymous>` without a name.
pub fn format_component_name(vm: &Instance) -> String {
    if vm.root() == vm.id() && vm.parent().is_none() && !vm.is_internal() {
        return "<Root>".to_string();
    }
    let name = vm
        .options()
        .name()
        .or_else(|| vm.options().component_tag());
    match name {
        Some(name) => format!("<{}>", classify(&name)),
        None => "<Anonymous>".to_string(),
    }
}

fn classify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' || c == '_' {
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
