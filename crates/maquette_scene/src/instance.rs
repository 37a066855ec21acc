//! Live component instances.

use std::fmt;

use compact_str::CompactString;
use maquette_socle::Identity;
use maquette_toile::ContainerId;

use crate::component::{Blueprint, ChildDecls, Component, Props};

/// Lifecycle phase of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    /// Assembled but never rendered.
    #[default]
    Unmounted,
    /// First render in progress.
    Mounting,
    /// Content on the surface, children reconciled.
    Mounted,
    /// Re-render in progress.
    Reconciling,
    /// Terminal; set while the registry tears the instance down.
    Destroyed,
}

/// One live component: its behavior plus everything the runtime files it
/// under. The state the runtime owns (props, children, identity) lives
/// here, outside the behavior, so hooks mutate it only through their
/// context.
pub struct Instance {
    pub(crate) identity: Option<Identity>,
    pub(crate) parent: Option<Identity>,
    pub(crate) slot_index: usize,
    pub(crate) kind: CompactString,
    pub(crate) props: Props,
    pub(crate) children: ChildDecls,
    pub(crate) handle: Option<ContainerId>,
    pub(crate) phase: Phase,
    pub(crate) behavior: Box<dyn Component>,
}

impl Instance {
    pub fn new(
        kind: impl Into<CompactString>,
        behavior: Box<dyn Component>,
        props: Props,
        children: ChildDecls,
    ) -> Self {
        Instance {
            identity: None,
            parent: None,
            slot_index: 0,
            kind: kind.into(),
            props,
            children,
            handle: None,
            phase: Phase::Unmounted,
            behavior,
        }
    }

    /// Assemble an instance of a known component type.
    pub fn of<C: Blueprint>(props: Props, children: ChildDecls) -> Self {
        let behavior = Box::new(C::assemble(props.clone(), children.clone()));
        Instance::new(C::KIND, behavior, props, children)
    }

    /// Identity, once the instance has been registered.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn parent(&self) -> Option<&Identity> {
        self.parent.as_ref()
    }

    /// Position among the siblings of its slot.
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &ChildDecls {
        &self.children
    }

    /// Surface container, once mounted.
    pub fn handle(&self) -> Option<ContainerId> {
        self.handle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .field("phase", &self.phase)
            .field("parent", &self.parent)
            .field("slot_index", &self.slot_index)
            .finish_non_exhaustive()
    }
}
