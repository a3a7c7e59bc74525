//! Core value types: identifiers, option keys, option values and option maps.
//!
//! Option maps are immutable and shared. Every change produces a new map with
//! a new identity, and that identity is what the resolver compares to decide
//! whether a cached merge is still current. Values follow the same rule:
//! scalars compare by value, everything that lives behind an `Arc` compares by
//! pointer (see [`OptionValue::same`]).

use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::hooks::HookList;

/// Handle to a definition stored in a definition registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DefinitionId(pub u32);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def#{}", self.0)
    }
}

/// Process-unique identifier of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vm#{}", self.0)
    }
}

/// A configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionKey(Cow<'static, str>);

impl OptionKey {
    pub const fn from_static(name: &'static str) -> Self {
        OptionKey(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OptionKey {
    fn from(s: &str) -> Self {
        OptionKey(Cow::Owned(s.to_string()))
    }
}

impl From<String> for OptionKey {
    fn from(s: String) -> Self {
        OptionKey(Cow::Owned(s))
    }
}

impl From<&OptionKey> for OptionKey {
    fn from(key: &OptionKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for OptionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known option keys.
pub mod keys {
    use super::OptionKey;

    pub const NAME: OptionKey = OptionKey::from_static("name");
    pub const COMPONENTS: OptionKey = OptionKey::from_static("components");
    pub const DIRECTIVES: OptionKey = OptionKey::from_static("directives");
    pub const FILTERS: OptionKey = OptionKey::from_static("filters");
    pub const DATA: OptionKey = OptionKey::from_static("data");
    pub const PROPS: OptionKey = OptionKey::from_static("props");
    pub const METHODS: OptionKey = OptionKey::from_static("methods");
    pub const COMPUTED: OptionKey = OptionKey::from_static("computed");
    pub const WATCH: OptionKey = OptionKey::from_static("watch");
    pub const INJECT: OptionKey = OptionKey::from_static("inject");
    pub const PROVIDE: OptionKey = OptionKey::from_static("provide");
    pub const ABSTRACT: OptionKey = OptionKey::from_static("abstract");
    /// Mount target. Mounting is triggered at the end of creation when present.
    pub const EL: OptionKey = OptionKey::from_static("el");

    // Fields copied eagerly by the internal fast path.
    pub const PARENT: OptionKey = OptionKey::from_static("parent");
    pub const PARENT_NODE: OptionKey = OptionKey::from_static("parentNode");
    pub const PROPS_DATA: OptionKey = OptionKey::from_static("propsData");
    pub const PARENT_LISTENERS: OptionKey = OptionKey::from_static("parentListeners");
    pub const RENDER_CHILDREN: OptionKey = OptionKey::from_static("renderChildren");
    pub const COMPONENT_TAG: OptionKey = OptionKey::from_static("componentTag");
    pub const RENDER: OptionKey = OptionKey::from_static("render");
    pub const STATIC_RENDER_FNS: OptionKey = OptionKey::from_static("staticRenderFns");
}

/// An opaque callable stored in options (data factories, render functions, methods).
pub type Callable = Arc<dyn Fn(&[OptionValue]) -> OptionValue + Send + Sync>;

/// A configuration value.
#[derive(Clone)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Function(Callable),
    Hooks(HookList),
    List(Arc<[OptionValue]>),
    Map(Options),
    Definition(DefinitionId),
    Instance(InstanceId),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl OptionValue {
    pub fn str(s: impl AsRef<str>) -> Self {
        OptionValue::Str(Arc::from(s.as_ref()))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[OptionValue]) -> OptionValue + Send + Sync + 'static,
    {
        OptionValue::Function(Arc::new(f))
    }

    pub fn list(items: impl IntoIterator<Item = OptionValue>) -> Self {
        OptionValue::List(items.into_iter().collect())
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        OptionValue::Opaque(Arc::new(value))
    }

    /// Identity comparison.
    ///
    /// Scalars are compared by value; functions, hook lists, lists, maps and
    /// opaque payloads are the same only if they share an allocation.
    pub fn same(&self, other: &OptionValue) -> bool {
        match (self, other) {
            (OptionValue::Null, OptionValue::Null) => true,
            (OptionValue::Bool(a), OptionValue::Bool(b)) => a == b,
            (OptionValue::Number(a), OptionValue::Number(b)) => a == b,
            (OptionValue::Str(a), OptionValue::Str(b)) => a == b,
            (OptionValue::Function(a), OptionValue::Function(b)) => Arc::ptr_eq(a, b),
            (OptionValue::Hooks(a), OptionValue::Hooks(b)) => a.same(b),
            (OptionValue::List(a), OptionValue::List(b)) => Arc::ptr_eq(a, b),
            (OptionValue::Map(a), OptionValue::Map(b)) => a.same(b),
            (OptionValue::Definition(a), OptionValue::Definition(b)) => a == b,
            (OptionValue::Instance(a), OptionValue::Instance(b)) => a == b,
            (OptionValue::Opaque(a), OptionValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OptionValue::Null)
    }

    /// Truthiness as used for flags such as `abstract`.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Null => false,
            OptionValue::Bool(b) => *b,
            OptionValue::Number(n) => *n != 0.0 && !n.is_nan(),
            OptionValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Callable> {
        match self {
            OptionValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_hooks(&self) -> Option<&HookList> {
        match self {
            OptionValue::Hooks(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::List(items) => Some(&**items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Options> {
        match self {
            OptionValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_definition(&self) -> Option<DefinitionId> {
        match self {
            OptionValue::Definition(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<InstanceId> {
        match self {
            OptionValue::Instance(id) => Some(*id),
            _ => None,
        }
    }

    /// Downcast an opaque payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            OptionValue::Opaque(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Null => f.write_str("Null"),
            OptionValue::Bool(b) => write!(f, "Bool({b})"),
            OptionValue::Number(n) => write!(f, "Number({n})"),
            OptionValue::Str(s) => write!(f, "Str({s:?})"),
            OptionValue::Function(func) => write!(f, "Function({:p})", Arc::as_ptr(func) as *const ()),
            OptionValue::Hooks(h) => write!(f, "Hooks(len={})", h.len()),
            OptionValue::List(items) => f.debug_tuple("List").field(items).finish(),
            OptionValue::Map(m) => f.debug_tuple("Map").field(m).finish(),
            OptionValue::Definition(id) => write!(f, "Definition({id})"),
            OptionValue::Instance(id) => write!(f, "Instance({id})"),
            OptionValue::Opaque(v) => write!(f, "Opaque({:p})", Arc::as_ptr(v) as *const ()),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<f64> for OptionValue {
    fn from(n: f64) -> Self {
        OptionValue::Number(n)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::str(s)
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(Arc::from(s))
    }
}

impl From<Options> for OptionValue {
    fn from(m: Options) -> Self {
        OptionValue::Map(m)
    }
}

impl From<HookList> for OptionValue {
    fn from(h: HookList) -> Self {
        OptionValue::Hooks(h)
    }
}

impl From<DefinitionId> for OptionValue {
    fn from(id: DefinitionId) -> Self {
        OptionValue::Definition(id)
    }
}

impl From<InstanceId> for OptionValue {
    fn from(id: InstanceId) -> Self {
        OptionValue::Instance(id)
    }
}

/// An immutable, shared mapping of option key to value.
///
/// Cloning an `Options` shares the allocation, so clones are [`same`](Options::same).
/// Every modifying operation returns a fresh map with a new identity.
#[derive(Clone, Default)]
pub struct Options {
    entries: Arc<IndexMap<OptionKey, OptionValue>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity comparison: true only if both handles share one allocation.
    pub fn same(&self, other: &Options) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &OptionKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &OptionValue)> {
        self.entries.iter()
    }

    /// Returns a new map with `key` set to `value`.
    pub fn with(&self, key: impl Into<OptionKey>, value: impl Into<OptionValue>) -> Options {
        let mut entries = IndexMap::clone(&self.entries);
        entries.insert(key.into(), value.into());
        Options { entries: Arc::new(entries) }
    }

    /// Returns a new map without `key`.
    pub fn without(&self, key: &str) -> Options {
        let mut entries = IndexMap::clone(&self.entries);
        entries.shift_remove(key);
        Options { entries: Arc::new(entries) }
    }

    /// Returns a new map holding these entries overlaid with `other`'s.
    pub fn extended_with(&self, other: &Options) -> Options {
        let mut entries = IndexMap::clone(&self.entries);
        for (key, value) in other.iter() {
            entries.insert(key.clone(), value.clone());
        }
        Options { entries: Arc::new(entries) }
    }
}

impl<K: Into<OptionKey>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Options {
            entries: Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k.as_str(), v))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_key_lookup_by_str() {
        let opts: Options = [(keys::NAME, OptionValue::str("Button"))].into_iter().collect();
        assert_eq!(opts.get("name").and_then(|v| v.as_str()), Some("Button"));
        assert!(opts.contains(keys::NAME.as_str()));
        assert!(!opts.contains("data"));
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = Options::new().with("a", 1.0);
        let b = a.clone();
        assert!(a.same(&b));
    }

    #[test]
    fn test_with_produces_new_identity() {
        let a = Options::new().with("a", 1.0);
        let b = a.with("b", 2.0);
        assert!(!a.same(&b));
        assert!(a.get("b").is_none());
        assert_eq!(b.get("a").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_empty_maps_are_distinct() {
        assert!(!Options::new().same(&Options::new()));
    }

    #[test]
    fn test_value_identity() {
        let f = OptionValue::function(|_| OptionValue::Null);
        let g = OptionValue::function(|_| OptionValue::Null);
        assert!(f.same(&f.clone()));
        assert!(!f.same(&g));

        assert!(OptionValue::str("x").same(&OptionValue::str("x")));
        assert!(OptionValue::Number(1.0).same(&OptionValue::Number(1.0)));
        assert!(!OptionValue::Number(1.0).same(&OptionValue::Bool(true)));

        let list = OptionValue::list([OptionValue::Null]);
        assert!(list.same(&list.clone()));
        assert!(!list.same(&OptionValue::list([OptionValue::Null])));
    }

    #[test]
    fn test_extended_with_child_wins() {
        let parent = Options::new().with("a", 1.0).with("b", 1.0);
        let child = Options::new().with("b", 2.0);
        let merged = parent.extended_with(&child);
        assert_eq!(merged.get("a").and_then(|v| v.as_number()), Some(1.0));
        assert_eq!(merged.get("b").and_then(|v| v.as_number()), Some(2.0));
        let keys: Vec<_> = merged.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_without() {
        let opts = Options::new().with("a", 1.0).with("b", 2.0);
        let trimmed = opts.without("a");
        assert!(!trimmed.contains("a"));
        assert!(opts.contains("a"));
    }

    #[test]
    fn test_truthiness() {
        assert!(!OptionValue::Null.is_truthy());
        assert!(OptionValue::Bool(true).is_truthy());
        assert!(!OptionValue::str("").is_truthy());
        assert!(OptionValue::Map(Options::new()).is_truthy());
    }

    #[test]
    fn test_opaque_downcast() {
        let v = OptionValue::opaque(42u32);
        assert_eq!(v.downcast_ref::<u32>(), Some(&42));
        assert!(v.downcast_ref::<i64>().is_none());
    }
}
