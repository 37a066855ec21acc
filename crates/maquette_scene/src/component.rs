//! Component model: behaviors, props and child declarations.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use indexmap::IndexMap;
use maquette_socle::{Identity, Value};
use maquette_toile::BindingId;

use crate::stage::Cx;

/// Behavior of a component: its template plus lifecycle hooks.
///
/// All hooks default to doing nothing. They run outside the render pass,
/// when the stage flushes its notification queue, and receive a [`Cx`] to
/// read and stage state through.
pub trait Component {
    /// Template markup with `${name}` substitution tokens.
    fn template(&self) -> CompactString;

    /// Runs after this instance's markup reached the surface.
    fn on_mounted(&mut self, _cx: &mut Cx<'_>) {}

    /// Runs after every render pass, including skipped ones; (re-)register
    /// event bindings here.
    fn on_register_events(&mut self, _cx: &mut Cx<'_>) {}

    /// Runs once the whole subtree below this instance finished rendering.
    fn on_children_rendered(&mut self, _cx: &mut Cx<'_>) {}

    /// Runs for each store update this instance subscribed to. The event's
    /// `callback` field carries the name given at subscription time.
    fn on_store_update(&mut self, _update: &StoreEvent, _cx: &mut Cx<'_>) {}

    /// Runs when a surface event bound by this instance fires.
    fn on_event(&mut self, _event: &SurfaceEvent, _cx: &mut Cx<'_>) {}
}

/// A component type the runtime can assemble from props and children.
pub trait Blueprint: Component + Sized + 'static {
    /// Kind name, unique per component type.
    const KIND: &'static str;

    fn assemble(props: Props, children: ChildDecls) -> Self;
}

/// Callable prop: invoked once per render, its returned text spliced into
/// the template. `None` reads as empty text.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn() -> Option<CompactString>>);

impl Callback {
    pub fn new(call: impl Fn() -> Option<CompactString> + 'static) -> Self {
        Callback(Rc::new(call))
    }

    pub fn call(&self) -> Option<CompactString> {
        (self.0)()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// One entry of a prop bag.
#[derive(Clone, Debug)]
pub enum Prop {
    Value(Value),
    Callback(Callback),
    Child(ChildDecl),
}

impl From<Value> for Prop {
    fn from(value: Value) -> Self {
        Prop::Value(value)
    }
}

impl From<Callback> for Prop {
    fn from(callback: Callback) -> Self {
        Prop::Callback(callback)
    }
}

impl From<ChildDecl> for Prop {
    fn from(decl: ChildDecl) -> Self {
        Prop::Child(decl)
    }
}

impl From<&str> for Prop {
    fn from(text: &str) -> Self {
        Prop::Value(text.into())
    }
}

impl From<String> for Prop {
    fn from(text: String) -> Self {
        Prop::Value(text.into())
    }
}

impl From<CompactString> for Prop {
    fn from(text: CompactString) -> Self {
        Prop::Value(text.into())
    }
}

impl From<i64> for Prop {
    fn from(n: i64) -> Self {
        Prop::Value(n.into())
    }
}

impl From<i32> for Prop {
    fn from(n: i32) -> Self {
        Prop::Value(n.into())
    }
}

impl From<f64> for Prop {
    fn from(f: f64) -> Self {
        Prop::Value(f.into())
    }
}

impl From<bool> for Prop {
    fn from(flag: bool) -> Self {
        Prop::Value(flag.into())
    }
}

/// Ordered prop bag of an instance.
#[derive(Clone, Debug, Default)]
pub struct Props(IndexMap<CompactString, Prop>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<CompactString>, prop: impl Into<Prop>) -> Self {
        self.insert(name, prop);
        self
    }

    pub fn insert(&mut self, name: impl Into<CompactString>, prop: impl Into<Prop>) {
        self.0.insert(name.into(), prop.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Prop> {
        self.0.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Prop> {
        self.0.get_mut(name)
    }

    /// The value under `name`, if it is a plain value prop.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.0.get(name) {
            Some(Prop::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompactString, &Prop)> {
        self.0.iter()
    }

    /// Merge `other` over `self`; entries in `other` win.
    pub fn merge(&mut self, other: Props) {
        for (name, prop) in other.0 {
            self.0.insert(name, prop);
        }
    }
}

impl FromIterator<(CompactString, Prop)> for Props {
    fn from_iter<I: IntoIterator<Item = (CompactString, Prop)>>(entries: I) -> Self {
        Props(entries.into_iter().collect())
    }
}

type Assemble = Rc<dyn Fn(Props, ChildDecls) -> Box<dyn Component>>;

/// One declared child: which component to build, and with what.
///
/// Once the runtime mounts the declaration, the instance's identity is
/// recorded back into it; as long as that identity stays registered, later
/// renders of the parent reuse the mounted instance instead of assembling
/// a new one.
#[derive(Clone)]
pub struct ChildDecl {
    kind: CompactString,
    build: Assemble,
    pub props: Props,
    pub children: ChildDecls,
    mounted: Option<Identity>,
}

impl ChildDecl {
    pub fn of<C: Blueprint>() -> Self {
        ChildDecl {
            kind: C::KIND.into(),
            build: Rc::new(|props, children| Box::new(C::assemble(props, children))),
            props: Props::new(),
            children: ChildDecls::new(),
            mounted: None,
        }
    }

    pub fn with_prop(mut self, name: impl Into<CompactString>, prop: impl Into<Prop>) -> Self {
        self.props.insert(name, prop);
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_child(mut self, name: impl Into<CompactString>, slot: impl Into<ChildSlot>) -> Self {
        self.children.insert(name, slot);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identity of the mounted instance, once the runtime rendered it.
    pub fn mounted(&self) -> Option<&Identity> {
        self.mounted.as_ref()
    }

    pub(crate) fn set_mounted(&mut self, identity: Option<Identity>) {
        self.mounted = identity;
    }

    /// Assemble a fresh behavior from this declaration.
    pub(crate) fn construct(&self) -> Box<dyn Component> {
        (self.build)(self.props.clone(), self.children.clone())
    }
}

impl fmt::Debug for ChildDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildDecl")
            .field("kind", &self.kind)
            .field("mounted", &self.mounted)
            .field("props", &self.props)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Value of one named child slot.
#[derive(Clone, Debug)]
pub enum ChildSlot {
    Single(ChildDecl),
    Many(Vec<ChildDecl>),
}

impl ChildSlot {
    pub fn len(&self) -> usize {
        match self {
            ChildSlot::Single(_) => 1,
            ChildSlot::Many(decls) => decls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[ChildDecl] {
        match self {
            ChildSlot::Single(decl) => std::slice::from_ref(decl),
            ChildSlot::Many(decls) => decls,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [ChildDecl] {
        match self {
            ChildSlot::Single(decl) => std::slice::from_mut(decl),
            ChildSlot::Many(decls) => decls,
        }
    }

    pub fn decls(&self) -> impl Iterator<Item = &ChildDecl> {
        self.as_slice().iter()
    }
}

impl From<ChildDecl> for ChildSlot {
    fn from(decl: ChildDecl) -> Self {
        ChildSlot::Single(decl)
    }
}

impl From<Vec<ChildDecl>> for ChildSlot {
    fn from(decls: Vec<ChildDecl>) -> Self {
        ChildSlot::Many(decls)
    }
}

/// Ordered named child slots of an instance.
#[derive(Clone, Debug, Default)]
pub struct ChildDecls(IndexMap<CompactString, ChildSlot>);

impl ChildDecls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<CompactString>, slot: impl Into<ChildSlot>) -> Self {
        self.insert(name, slot);
        self
    }

    pub fn insert(&mut self, name: impl Into<CompactString>, slot: impl Into<ChildSlot>) {
        self.0.insert(name.into(), slot.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<ChildSlot> {
        self.0.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ChildSlot> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ChildSlot> {
        self.0.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompactString, &ChildSlot)> {
        self.0.iter()
    }
}

impl FromIterator<(CompactString, ChildSlot)> for ChildDecls {
    fn from_iter<I: IntoIterator<Item = (CompactString, ChildSlot)>>(entries: I) -> Self {
        ChildDecls(entries.into_iter().collect())
    }
}

/// Store update delivered to [`Component::on_store_update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEvent {
    pub store: CompactString,
    /// The subscription's registered path ("all" for whole-store watchers).
    pub path: CompactString,
    /// Name given when subscribing, for multiplexing several subscriptions
    /// in one hook.
    pub callback: CompactString,
}

/// Surface event delivered to [`Component::on_event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub binding: BindingId,
    pub selector: CompactString,
    pub event: CompactString,
}
