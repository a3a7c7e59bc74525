//! Per-instance event channel.

use indexmap::IndexMap;

use lineage_core::{Callable, OptionValue};

use crate::instance::Instance;

const HOOK_EVENT_PREFIX: &str = "hook:";

/// Subscriber table keyed by event name.
#[derive(Clone, Default)]
pub struct EventChannel {
    listeners: IndexMap<String, Vec<Callable>>,
    has_hook_event: bool,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `event`.
    pub fn on(&mut self, event: &str, listener: Callable) {
        if event.starts_with(HOOK_EVENT_PREFIX) {
            self.has_hook_event = true;
        }
        self.listeners.entry(event.to_string()).or_default().push(listener);
    }

    /// Remove one listener, or every listener of `event` when `listener` is `None`.
    pub fn off(&mut self, event: &str, listener: Option<&Callable>) {
        match listener {
            None => {
                self.listeners.shift_remove(event);
            }
            Some(listener) => {
                if let Some(listeners) = self.listeners.get_mut(event) {
                    listeners.retain(|l| !std::sync::Arc::ptr_eq(l, listener));
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.has_hook_event = false;
    }

    /// Call every listener of `event` in subscription order. Returns how many ran.
    pub fn emit(&self, event: &str, args: &[OptionValue]) -> usize {
        let Some(listeners) = self.listeners.get(event) else {
            return 0;
        };
        for listener in listeners {
            listener(args);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// True once any `hook:` event has been subscribed to.
    pub fn has_hook_event(&self) -> bool {
        self.has_hook_event
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("events", &self.listeners.keys().collect::<Vec<_>>())
            .field("has_hook_event", &self.has_hook_event)
            .finish()
    }
}

/// Reset the channel and attach the listeners the parent passed down.
///
/// A listener value is either a single function or a list of functions.
pub(crate) fn init_events(vm: &mut Instance) {
    let mut channel = EventChannel::new();
    if let Some(listeners) = vm.options().parent_listeners() {
        for (event, value) in listeners.iter() {
            let handlers: Vec<&OptionValue> = match value {
                OptionValue::List(items) => items.iter().collect(),
                other => vec![other],
            };
            for handler in handlers {
                if let Some(f) = handler.as_function() {
                    channel.on(event.as_str(), f.clone());
                }
            }
        }
    }
    vm.events = channel;
}
