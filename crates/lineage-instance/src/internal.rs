//! Effective options and the internal fast path.
//!
//! Instances created internally (children produced while a parent renders)
//! skip the general merge. Their options are a fixed set of fields copied
//! from the placeholder node, read first, with every other key read through
//! to the definition's resolved options.

use std::sync::Arc;

use lineage_core::{
    keys, Callable, DefinitionId, HookList, InstanceId, LifecycleHook, OptionKey, OptionValue,
    Options,
};

use crate::render::ChildNode;

/// Keys answered by [`InternalOptions`] without consulting the definition.
pub const INTERNAL_FIELDS: [OptionKey; 8] = [
    keys::PARENT,
    keys::PARENT_NODE,
    keys::PROPS_DATA,
    keys::PARENT_LISTENERS,
    keys::RENDER_CHILDREN,
    keys::COMPONENT_TAG,
    keys::RENDER,
    keys::STATIC_RENDER_FNS,
];

/// Component data carried by a placeholder node.
#[derive(Debug, Clone, Default)]
pub struct ComponentNodeOptions {
    pub props_data: Option<Options>,
    pub listeners: Option<Options>,
    pub children: Option<Arc<Vec<ChildNode>>>,
    pub tag: Option<Arc<str>>,
}

/// The node in a parent's render output that stands for a child component.
#[derive(Debug, Clone)]
pub struct PlaceholderNode {
    pub definition: DefinitionId,
    /// Instance whose render pass produced the node.
    pub context: Option<InstanceId>,
    pub component_options: ComponentNodeOptions,
}

impl PlaceholderNode {
    pub fn new(definition: DefinitionId, tag: &str) -> Self {
        Self {
            definition,
            context: None,
            component_options: ComponentNodeOptions {
                tag: Some(Arc::from(tag)),
                ..ComponentNodeOptions::default()
            },
        }
    }

    pub fn with_context(mut self, context: InstanceId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_props(mut self, props_data: Options) -> Self {
        self.component_options.props_data = Some(props_data);
        self
    }

    pub fn with_listeners(mut self, listeners: Options) -> Self {
        self.component_options.listeners = Some(listeners);
        self
    }

    pub fn with_children(mut self, children: Vec<ChildNode>) -> Self {
        self.component_options.children = Some(Arc::new(children));
        self
    }
}

/// A render function supplied at creation time, together with its static
/// render functions. The two are only ever set as a pair.
#[derive(Clone)]
pub struct RenderOverride {
    pub render: Callable,
    pub static_render_fns: Option<Arc<[OptionValue]>>,
}

impl std::fmt::Debug for RenderOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOverride")
            .field("render", &OptionValue::Function(self.render.clone()))
            .field("static_render_fns", &self.static_render_fns)
            .finish()
    }
}

/// Creation options for an internally created instance.
#[derive(Debug, Clone)]
pub struct InternalCreateOptions {
    pub parent: InstanceId,
    pub parent_node: PlaceholderNode,
    pub render: Option<RenderOverride>,
}

impl InternalCreateOptions {
    pub fn new(parent: InstanceId, parent_node: PlaceholderNode) -> Self {
        Self {
            parent,
            parent_node,
            render: None,
        }
    }

    pub fn with_render(mut self, render: Callable, static_render_fns: Option<Arc<[OptionValue]>>) -> Self {
        self.render = Some(RenderOverride {
            render,
            static_render_fns,
        });
        self
    }
}

/// The hot fields of an internally created instance.
#[derive(Debug, Clone)]
pub struct InternalOptions {
    pub parent: InstanceId,
    pub parent_node: Arc<PlaceholderNode>,
    pub props_data: Option<Options>,
    pub parent_listeners: Option<Options>,
    pub render_children: Option<Arc<Vec<ChildNode>>>,
    pub component_tag: Option<Arc<str>>,
    pub render: Option<RenderOverride>,
}

/// Answer from the hot-field level of the lookup.
enum Local {
    Value(OptionValue),
    /// Answered locally with no value; do not read through.
    Shadowed,
    /// Not a local field, or not set: read through to the definition.
    Absent,
}

impl InternalOptions {
    fn lookup(&self, key: &str) -> Local {
        let value = match key {
            k if k == keys::PARENT.as_str() => Some(OptionValue::Instance(self.parent)),
            k if k == keys::PARENT_NODE.as_str() => Some(OptionValue::Opaque(self.parent_node.clone())),
            k if k == keys::PROPS_DATA.as_str() => self.props_data.clone().map(OptionValue::Map),
            k if k == keys::PARENT_LISTENERS.as_str() => self.parent_listeners.clone().map(OptionValue::Map),
            k if k == keys::RENDER_CHILDREN.as_str() => self
                .render_children
                .clone()
                .map(|children| OptionValue::Opaque(children)),
            k if k == keys::COMPONENT_TAG.as_str() => self.component_tag.clone().map(OptionValue::Str),
            k if k == keys::RENDER.as_str() => self
                .render
                .as_ref()
                .map(|o| OptionValue::Function(o.render.clone())),
            k if k == keys::STATIC_RENDER_FNS.as_str() => match &self.render {
                // Paired with the render override even when empty.
                Some(o) => {
                    return match &o.static_render_fns {
                        Some(fns) => Local::Value(OptionValue::List(fns.clone())),
                        None => Local::Shadowed,
                    }
                }
                None => None,
            },
            _ => None,
        };
        match value {
            Some(value) => Local::Value(value),
            None => Local::Absent,
        }
    }
}

/// Build the effective options of an internally created instance.
///
/// `base` is the definition's resolved options; it is shared, not copied.
pub fn build_internal(base: &Options, options: InternalCreateOptions) -> EffectiveOptions {
    let InternalCreateOptions {
        parent,
        parent_node,
        render,
    } = options;
    let component = &parent_node.component_options;
    let local = InternalOptions {
        parent,
        props_data: component.props_data.clone(),
        parent_listeners: component.listeners.clone(),
        render_children: component.children.clone(),
        component_tag: component.tag.clone(),
        render,
        parent_node: Arc::new(parent_node),
    };
    EffectiveOptions::Internal {
        local: Box::new(local),
        base: base.clone(),
    }
}

/// The options an instance actually uses.
#[derive(Debug, Clone)]
pub enum EffectiveOptions {
    /// Fully merged, independent options (root and explicitly created instances).
    Merged(Options),
    /// Hot fields first, then the definition's resolved options.
    Internal {
        local: Box<InternalOptions>,
        base: Options,
    },
}

impl EffectiveOptions {
    pub fn get(&self, key: &str) -> Option<OptionValue> {
        match self {
            EffectiveOptions::Merged(options) => options.get(key).cloned(),
            EffectiveOptions::Internal { local, base } => match local.lookup(key) {
                Local::Value(value) => Some(value),
                Local::Shadowed => None,
                Local::Absent => base.get(key).cloned(),
            },
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, EffectiveOptions::Internal { .. })
    }

    pub fn name(&self) -> Option<Arc<str>> {
        match self.get(keys::NAME.as_str())? {
            OptionValue::Str(name) => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.get(keys::PARENT.as_str())?.as_instance()
    }

    pub fn parent_node(&self) -> Option<Arc<PlaceholderNode>> {
        match self.get(keys::PARENT_NODE.as_str())? {
            OptionValue::Opaque(node) => node.downcast::<PlaceholderNode>().ok(),
            _ => None,
        }
    }

    pub fn props_data(&self) -> Option<Options> {
        self.get(keys::PROPS_DATA.as_str())?.as_map().cloned()
    }

    pub fn parent_listeners(&self) -> Option<Options> {
        self.get(keys::PARENT_LISTENERS.as_str())?.as_map().cloned()
    }

    pub fn render_children(&self) -> Option<Arc<Vec<ChildNode>>> {
        match self.get(keys::RENDER_CHILDREN.as_str())? {
            OptionValue::Opaque(children) => children.downcast::<Vec<ChildNode>>().ok(),
            _ => None,
        }
    }

    pub fn component_tag(&self) -> Option<Arc<str>> {
        match self.get(keys::COMPONENT_TAG.as_str())? {
            OptionValue::Str(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn render(&self) -> Option<Callable> {
        self.get(keys::RENDER.as_str())?.as_function().cloned()
    }

    pub fn static_render_fns(&self) -> Option<Arc<[OptionValue]>> {
        match self.get(keys::STATIC_RENDER_FNS.as_str())? {
            OptionValue::List(fns) => Some(fns),
            _ => None,
        }
    }

    pub fn hooks(&self, hook: LifecycleHook) -> Option<HookList> {
        self.get(hook.name())?.as_hooks().cloned()
    }

    /// Mount target, if one was configured.
    pub fn el(&self) -> Option<OptionValue> {
        self.get(keys::EL.as_str()).filter(|v| !v.is_null())
    }

    pub fn is_abstract(&self) -> bool {
        self.get(keys::ABSTRACT.as_str()).map_or(false, |v| v.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_core::{DefaultMergeStrategies, MergeService};

    fn definition_options() -> Options {
        Options::new()
            .with("someInheritedKey", OptionValue::function(|_| OptionValue::Null))
            .with(keys::NAME, "Item")
            .with(keys::RENDER, OptionValue::function(|_| OptionValue::str("definition render")))
            .with(keys::STATIC_RENDER_FNS, OptionValue::list([]))
    }

    fn node() -> PlaceholderNode {
        PlaceholderNode::new(DefinitionId(1), "list-item")
            .with_props(Options::new().with("label", "first"))
            .with_listeners(Options::new().with("select", OptionValue::function(|_| OptionValue::Null)))
            .with_children(vec![ChildNode::text("hello")])
    }

    #[test]
    fn test_render_override_pair() {
        let base = definition_options();
        let render: Callable = Arc::new(|_: &[OptionValue]| OptionValue::Null);
        let statics: Arc<[OptionValue]> = Arc::from(vec![OptionValue::function(|_| OptionValue::Null)]);
        let options = InternalCreateOptions::new(InstanceId(1), node()).with_render(render.clone(), Some(statics.clone()));

        let effective = build_internal(&base, options);
        assert!(Arc::ptr_eq(&effective.render().unwrap(), &render));
        assert!(Arc::ptr_eq(&effective.static_render_fns().unwrap(), &statics));
        assert!(effective
            .get("someInheritedKey")
            .unwrap()
            .same(base.get("someInheritedKey").unwrap()));
    }

    #[test]
    fn test_render_override_without_statics_shadows_definition() {
        let base = definition_options();
        let render: Callable = Arc::new(|_: &[OptionValue]| OptionValue::Null);
        let options = InternalCreateOptions::new(InstanceId(1), node()).with_render(render, None);
        let effective = build_internal(&base, options);
        assert!(effective.static_render_fns().is_none());
    }

    #[test]
    fn test_no_override_reads_definition_render() {
        let base = definition_options();
        let effective = build_internal(&base, InternalCreateOptions::new(InstanceId(1), node()));
        assert!(effective.get("render").unwrap().same(base.get("render").unwrap()));
        assert!(effective
            .get("staticRenderFns")
            .unwrap()
            .same(base.get("staticRenderFns").unwrap()));
    }

    #[test]
    fn test_hot_fields_copied_from_node() {
        let base = definition_options();
        let effective = build_internal(&base, InternalCreateOptions::new(InstanceId(7), node()));
        assert_eq!(effective.parent(), Some(InstanceId(7)));
        assert_eq!(effective.component_tag().as_deref(), Some("list-item"));
        assert_eq!(
            effective.props_data().unwrap().get("label").and_then(|v| v.as_str()),
            Some("first")
        );
        assert!(effective.parent_listeners().unwrap().contains("select"));
        assert_eq!(effective.render_children().unwrap().len(), 1);
        assert_eq!(effective.parent_node().unwrap().definition, DefinitionId(1));
        assert_eq!(effective.name().as_deref(), Some("Item"));
        assert!(effective.is_internal());
    }

    #[test]
    fn test_fast_path_matches_general_merge() {
        let merge = DefaultMergeStrategies::new();
        let base = definition_options();
        let render: Callable = Arc::new(|_: &[OptionValue]| OptionValue::Null);
        let statics: Arc<[OptionValue]> = Arc::from(vec![]);
        let internal = build_internal(
            &base,
            InternalCreateOptions::new(InstanceId(3), node()).with_render(render, Some(statics)),
        );

        // The same hot values handed to the general path as plain options.
        let creation: Options = INTERNAL_FIELDS
            .iter()
            .filter_map(|key| internal.get(key.as_str()).map(|v| (key.clone(), v)))
            .collect();
        let general = EffectiveOptions::Merged(merge.merge(&base, &creation));

        for key in INTERNAL_FIELDS.iter().chain(base.keys()) {
            let fast = internal.get(key.as_str());
            let slow = general.get(key.as_str());
            match (fast, slow) {
                (Some(a), Some(b)) => assert!(a.same(&b), "key {key} differs"),
                (None, None) => {}
                (a, b) => panic!("key {key}: fast {a:?} vs general {b:?}"),
            }
        }
    }

    #[test]
    fn test_merged_options_lookup() {
        let options = EffectiveOptions::Merged(Options::new().with(keys::ABSTRACT, true).with(keys::EL, "#app"));
        assert!(options.is_abstract());
        assert_eq!(options.el().and_then(|v| v.as_str().map(str::to_owned)).as_deref(), Some("#app"));
        assert!(options.parent().is_none());
        assert!(!options.is_internal());
    }
}
