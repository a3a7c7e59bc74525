//! Lifecycle hook tags and callback lists.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::errors::HookError;
use crate::types::OptionKey;

/// The closed set of lifecycle hooks an instance can register callbacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
    Activated,
    Deactivated,
    ErrorCaptured,
    ServerPrefetch,
}

impl LifecycleHook {
    pub const ALL: [LifecycleHook; 12] = [
        LifecycleHook::BeforeCreate,
        LifecycleHook::Created,
        LifecycleHook::BeforeMount,
        LifecycleHook::Mounted,
        LifecycleHook::BeforeUpdate,
        LifecycleHook::Updated,
        LifecycleHook::BeforeDestroy,
        LifecycleHook::Destroyed,
        LifecycleHook::Activated,
        LifecycleHook::Deactivated,
        LifecycleHook::ErrorCaptured,
        LifecycleHook::ServerPrefetch,
    ];

    /// The option key the callbacks are registered under.
    pub const fn name(self) -> &'static str {
        match self {
            LifecycleHook::BeforeCreate => "beforeCreate",
            LifecycleHook::Created => "created",
            LifecycleHook::BeforeMount => "beforeMount",
            LifecycleHook::Mounted => "mounted",
            LifecycleHook::BeforeUpdate => "beforeUpdate",
            LifecycleHook::Updated => "updated",
            LifecycleHook::BeforeDestroy => "beforeDestroy",
            LifecycleHook::Destroyed => "destroyed",
            LifecycleHook::Activated => "activated",
            LifecycleHook::Deactivated => "deactivated",
            LifecycleHook::ErrorCaptured => "errorCaptured",
            LifecycleHook::ServerPrefetch => "serverPrefetch",
        }
    }

    pub const fn key(self) -> OptionKey {
        OptionKey::from_static(self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|hook| hook.name() == name)
    }

    /// Name of the event emitted on the instance channel after the callbacks ran.
    pub fn event_name(self) -> String {
        format!("hook:{}", self.name())
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type HookCallback = dyn Fn(&mut dyn Any) -> Result<(), HookError> + Send + Sync;

/// A single lifecycle callback.
///
/// Callbacks are typed on the context they expect; the context is passed
/// type-erased and downcast on call.
#[derive(Clone)]
pub struct Hook(Arc<HookCallback>);

impl Hook {
    pub fn new<C, F>(f: F) -> Self
    where
        C: Any,
        F: Fn(&mut C) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Hook(Arc::new(move |cx: &mut dyn Any| {
            let cx = cx
                .downcast_mut::<C>()
                .ok_or(HookError::ContextMismatch { expected: type_name::<C>() })?;
            f(cx)
        }))
    }

    pub fn call(&self, cx: &mut dyn Any) -> Result<(), HookError> {
        (self.0)(cx)
    }

    pub fn same(&self, other: &Hook) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Ordered callbacks registered under one hook name.
#[derive(Clone, Debug)]
pub struct HookList(Arc<[Hook]>);

impl HookList {
    pub fn single(hook: Hook) -> Self {
        HookList(Arc::from(vec![hook]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn same(&self, other: &HookList) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// These callbacks followed by `child`'s, keeping the first occurrence of
    /// any callback present in both.
    pub fn concat(&self, child: &HookList) -> HookList {
        let mut merged: Vec<Hook> = Vec::with_capacity(self.len() + child.len());
        for hook in self.iter().chain(child.iter()) {
            if !merged.iter().any(|h| h.same(hook)) {
                merged.push(hook.clone());
            }
        }
        HookList(merged.into())
    }
}

impl FromIterator<Hook> for HookList {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        HookList(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[test]
    fn test_hook_names_roundtrip() {
        for hook in LifecycleHook::ALL {
            assert_eq!(LifecycleHook::from_name(hook.name()), Some(hook));
        }
        assert_eq!(LifecycleHook::from_name("beforeCreated"), None);
        assert_eq!(LifecycleHook::Created.event_name(), "hook:created");
    }

    #[test]
    fn test_hook_call_typed_context() {
        let hook = Hook::new(|c: &mut Counter| {
            c.0 += 1;
            Ok(())
        });
        let mut counter = Counter(0);
        hook.call(&mut counter).unwrap();
        hook.call(&mut counter).unwrap();
        assert_eq!(counter.0, 2);
    }

    #[test]
    fn test_hook_context_mismatch() {
        let hook = Hook::new(|_: &mut Counter| Ok(()));
        let mut wrong = 5u8;
        let err = hook.call(&mut wrong).unwrap_err();
        assert!(matches!(err, HookError::ContextMismatch { .. }));
    }

    #[test]
    fn test_concat_keeps_order_and_dedupes() {
        let a = Hook::new(|c: &mut Counter| {
            c.0 = c.0 * 10 + 1;
            Ok(())
        });
        let b = Hook::new(|c: &mut Counter| {
            c.0 = c.0 * 10 + 2;
            Ok(())
        });
        let parent: HookList = [a.clone()].into_iter().collect();
        let child: HookList = [a, b].into_iter().collect();
        let merged = parent.concat(&child);
        assert_eq!(merged.len(), 2);
        assert!(!merged.same(&parent));

        let mut counter = Counter(0);
        for hook in merged.iter() {
            hook.call(&mut counter).unwrap();
        }
        assert_eq!(counter.0, 12);
    }
}
