//! Stage - the component lifecycle driver.
//!
//! A [`Stage`] owns the four collaborators of one running component tree:
//! the [`Registry`] of live instances, the [`StoreHub`] of shared state,
//! the presentation [`Surface`], and the notification [`Schedule`]. Every
//! render, first mount and re-render alike, runs the same pass:
//!
//! ```text
//!  unchanged? ── yes ──► defer register-events, done
//!      │
//!      no
//!      ▼
//!  parse template ──► register ──► content to surface ──► defer mounted
//!                                        │
//!                                        ▼
//!                         reconcile declared children
//!                     (destroy orphans, reuse or assemble,
//!                      render each, anchor, record identity)
//!                                        │
//!                                        ▼
//!                  defer children-rendered + register-events
//! ```
//!
//! Hooks run when the host calls [`Stage::flush`], never inside a render
//! pass. Each hook borrows its instance out of the registry, works against
//! a [`Cx`], and is parked again before its staged effects (re-renders,
//! store fan-out) are applied.

use compact_str::CompactString;
use maquette_gabarit::{parse, Bindings, TokenClass};
use maquette_reserve::{StoreHub, StoreScope, StoreUpdate};
use maquette_socle::{Identity, IdentityStrategy};
use maquette_toile::{BindingId, ContainerId, Surface};
use serde_json::Value as JsonValue;

use crate::component::{
    Blueprint, ChildDecl, ChildDecls, ChildSlot, Prop, Props, StoreEvent, SurfaceEvent,
};
use crate::error::SceneError;
use crate::instance::{Instance, Phase};
use crate::registry::{Entry, Registry};
use crate::schedule::{Notice, Schedule, Task};

/// Which hook a dequeued task or fired event resolves to.
enum Hook {
    Mounted,
    RegisterEvents,
    ChildrenRendered,
    StoreUpdate(StoreEvent),
    Surface(SurfaceEvent),
}

/// Effects a hook stages through its [`Cx`], applied after the hook
/// returns and its instance is parked again.
#[derive(Default)]
struct Staged {
    render: bool,
    updates: Vec<StoreUpdate>,
}

/// One running component tree.
pub struct Stage<S: Surface> {
    registry: Registry,
    stores: StoreHub,
    surface: S,
    schedule: Schedule,
}

impl<S: Surface> Stage<S> {
    /// Stage with in-memory stores and random identities.
    pub fn new(surface: S) -> Self {
        Stage::with_parts(surface, StoreHub::in_memory(), IdentityStrategy::default())
    }

    pub fn with_strategy(surface: S, strategy: IdentityStrategy) -> Self {
        Stage::with_parts(surface, StoreHub::in_memory(), strategy)
    }

    pub fn with_stores(surface: S, stores: StoreHub) -> Self {
        Stage::with_parts(surface, stores, IdentityStrategy::default())
    }

    pub fn with_parts(surface: S, stores: StoreHub, strategy: IdentityStrategy) -> Self {
        Stage {
            registry: Registry::with_strategy(strategy),
            stores,
            surface,
            schedule: Schedule::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stores(&self) -> &StoreHub {
        &self.stores
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Assemble an instance of `C` and mount it as a root.
    pub fn mount<C: Blueprint>(
        &mut self,
        props: Props,
        children: ChildDecls,
    ) -> Result<Identity, SceneError> {
        self.mount_instance(Instance::of::<C>(props, children))
    }

    /// Mount a pre-assembled instance as a root.
    pub fn mount_instance(&mut self, instance: Instance) -> Result<Identity, SceneError> {
        self.render_instance(instance)
    }

    /// Re-render a mounted instance. A no-op render (state unchanged since
    /// the last one) still queues a register-events notice.
    pub fn render(&mut self, identity: &Identity) -> Result<Identity, SceneError> {
        let instance = self.take_or_unknown(identity)?;
        self.render_instance(instance)
    }

    /// Merge `props` over the instance's prop bag and re-render.
    pub fn set_props(&mut self, identity: &Identity, props: Props) -> Result<Identity, SceneError> {
        if props.iter().any(|(name, _)| name.is_empty()) {
            return Err(SceneError::InvalidArgument {
                reason: "prop names must not be empty".into(),
            });
        }
        let mut instance = self.take_or_unknown(identity)?;
        instance.props.merge(props);
        self.render_instance(instance)
    }

    /// Merge `props` without rendering. The next render of this instance
    /// picks the change up.
    pub fn merge_props(&mut self, identity: &Identity, props: Props) -> Result<(), SceneError> {
        if props.iter().any(|(name, _)| name.is_empty()) {
            return Err(SceneError::InvalidArgument {
                reason: "prop names must not be empty".into(),
            });
        }
        let mut instance = self.take_or_unknown(identity)?;
        instance.props.merge(props);
        self.registry.put_instance(identity, instance);
        Ok(())
    }

    /// Replace (`Some`) or delete (`None`) one child slot and re-render.
    /// A deleted slot's mounted subtree is destroyed by the reconcile pass
    /// of that render.
    pub fn set_child(
        &mut self,
        identity: &Identity,
        name: impl Into<CompactString>,
        slot: Option<ChildSlot>,
    ) -> Result<Identity, SceneError> {
        self.set_children(identity, vec![(name.into(), slot)])
    }

    /// Batched [`set_child`](Self::set_child): apply every change, then
    /// re-render once.
    pub fn set_children(
        &mut self,
        identity: &Identity,
        changes: Vec<(CompactString, Option<ChildSlot>)>,
    ) -> Result<Identity, SceneError> {
        if changes.iter().any(|(name, _)| name.is_empty()) {
            return Err(SceneError::InvalidArgument {
                reason: "child slot names must not be empty".into(),
            });
        }
        let mut instance = self.take_or_unknown(identity)?;
        for (name, slot) in changes {
            match slot {
                Some(slot) => instance.children.insert(name, slot),
                None => {
                    instance.children.remove(&name);
                }
            }
        }
        self.render_instance(instance)
    }

    /// Tear down `identity` and its whole subtree: subscriptions, event
    /// bindings, containers, registry entries. Unknown identities are a
    /// no-op.
    pub fn destroy(&mut self, identity: &Identity) {
        self.registry.destroy_subtree(identity, &mut self.stores, &mut self.surface);
    }

    /// Run queued lifecycle notices until the queue is empty, including
    /// whatever the hooks themselves enqueue. Returns how many tasks ran.
    pub fn flush(&mut self) -> Result<usize, SceneError> {
        let mut completed = 0;
        while let Some(task) = self.schedule.next_task() {
            self.dispatch(task)?;
            completed += 1;
        }
        Ok(completed)
    }

    /// Deliver a surface event to the instance owning `binding`.
    pub fn fire_event(&mut self, binding: BindingId) -> Result<(), SceneError> {
        let Some(record) = self.surface.binding(binding) else {
            return Err(SceneError::InvalidArgument { reason: "unknown event binding".into() });
        };
        let event = SurfaceEvent {
            binding,
            selector: record.selector.clone(),
            event: record.event.clone(),
        };
        let instance = self
            .registry
            .take_instance(&record.owner)
            .ok_or_else(|| SceneError::UnknownIdentity { identity: record.owner.clone() })?;
        self.run_hook(record.owner, instance, Hook::Surface(event))
    }

    /// Create (or re-open) the store `name` under `scope`.
    pub fn create_store(&mut self, name: &str, scope: StoreScope) -> Result<(), SceneError> {
        self.stores.create_store(name, scope).map_err(Into::into)
    }

    /// Read a whole store (`path` `None`) or one dotted path.
    pub fn load(&self, name: &str, path: Option<&str>) -> Result<JsonValue, SceneError> {
        self.stores.load(name, path).map_err(Into::into)
    }

    /// Write `value` to `path` of store `name` and synchronously deliver
    /// the resulting updates to every subscribed instance.
    pub fn save(&mut self, name: &str, path: &str, value: JsonValue) -> Result<(), SceneError> {
        let mut updates = Vec::new();
        self.stores.save(name, path, value, &mut |update| updates.push(update))?;
        self.deliver_updates(updates)
    }

    /// Batched [`save`](Self::save) with a single fan-out.
    pub fn save_many(
        &mut self,
        name: &str,
        entries: Vec<(CompactString, JsonValue)>,
    ) -> Result<(), SceneError> {
        let mut updates = Vec::new();
        self.stores.save_many(name, entries, &mut |update| updates.push(update))?;
        self.deliver_updates(updates)
    }

    /// Subscribe `owner` to writes on `path` of store `name`; matching
    /// writes run its store-update hook under the name `callback`.
    pub fn register_for_updates(&mut self, owner: &Identity, callback: &str, name: &str, path: &str) {
        self.stores.register_for_updates(owner, callback, name, path);
    }

    /// Drop every subscription owned by `owner`.
    pub fn unregister(&mut self, owner: &Identity) {
        self.stores.unregister(owner);
    }

    fn take_or_unknown(&mut self, identity: &Identity) -> Result<Instance, SceneError> {
        self.registry
            .take_instance(identity)
            .ok_or_else(|| SceneError::UnknownIdentity { identity: identity.clone() })
    }

    /// The render pass. See the module docs for the shape.
    fn render_instance(&mut self, mut instance: Instance) -> Result<Identity, SceneError> {
        if let Some(identity) = instance.identity.clone() {
            if !self.registry.needs_render(&instance) {
                tracing::trace!(identity = %identity, kind = %instance.kind, "render skipped, state unchanged");
                self.schedule.defer(identity.clone(), Notice::RegisterEvents);
                self.registry.put_instance(&identity, instance);
                return Ok(identity);
            }
        }

        instance.phase = if instance.identity.is_none() {
            Phase::Mounting
        } else {
            Phase::Reconciling
        };

        let template = instance.behavior.template();
        let parsed = {
            let mut bindings =
                InstanceBindings { props: &instance.props, children: &instance.children };
            parse(&template, &mut bindings)
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(kind = %instance.kind, error = %err, "template rejected");
                // A previously mounted instance keeps its prior content;
                // a fresh one is dropped without ever reaching the surface.
                if let Some(identity) = instance.identity.clone() {
                    instance.phase = Phase::Mounted;
                    self.registry.put_instance(&identity, instance);
                }
                return Err(err.into());
            }
        };

        let identity = self.registry.register(&mut instance, parsed.markup.clone());
        tracing::debug!(identity = %identity, kind = %instance.kind, phase = ?instance.phase, "rendering");
        self.schedule.begin_render(identity.clone());

        let container = match instance.handle {
            Some(container) => container,
            None => {
                let container = self.surface.create_container(&instance.kind);
                instance.handle = Some(container);
                if instance.parent.is_none() {
                    self.surface.mount_root(container);
                }
                container
            }
        };
        self.registry.record_container(&identity, container);
        self.surface.set_content(container, &parsed.markup);
        self.schedule.defer(identity.clone(), Notice::Mounted);

        let outcome = self.reconcile_children(&mut instance, &identity, container, &parsed.used_slots);
        if outcome.is_ok() {
            self.schedule.defer_children_rendered(identity.clone());
            self.schedule.defer(identity.clone(), Notice::RegisterEvents);
        }
        self.schedule.finish_render();

        instance.phase = Phase::Mounted;
        self.registry.put_instance(&identity, instance);
        outcome.map(|()| identity)
    }

    /// Bring the mounted children in line with the declared ones: destroy
    /// whatever is mounted but no longer declared, then render every
    /// declared child of every used slot, reusing still-registered
    /// instances and assembling the rest.
    fn reconcile_children(
        &mut self,
        instance: &mut Instance,
        identity: &Identity,
        container: ContainerId,
        used_slots: &[CompactString],
    ) -> Result<(), SceneError> {
        let mut keep = Vec::new();
        for slot in used_slots {
            for decl in slot_decls(instance, slot) {
                if let Some(mounted) = decl.mounted() {
                    keep.push(mounted.clone());
                }
            }
        }
        self.registry.reconcile_children(identity, &keep, &mut self.stores, &mut self.surface);

        for slot in used_slots {
            let anchor = self.surface.place_slot_anchor(container, slot);
            let count = slot_decls(instance, slot).len();
            for position in 0..count {
                let Some(decl) = slot_decls(instance, slot).get(position).cloned() else {
                    break;
                };

                let child = match decl.mounted().and_then(|id| self.registry.take_instance(id)) {
                    Some(mut reused) => {
                        // Still registered: keep the instance, refresh the
                        // runtime-injected fields.
                        reused.parent = Some(identity.clone());
                        reused.slot_index = position;
                        reused
                    }
                    None => {
                        let mut fresh = Instance::new(
                            decl.kind(),
                            decl.construct(),
                            decl.props.clone(),
                            decl.children.clone(),
                        );
                        fresh.parent = Some(identity.clone());
                        fresh.slot_index = position;
                        fresh
                    }
                };

                let child_identity = self.render_instance(child)?;

                if let Some(anchor) = anchor {
                    if let Some(child_container) =
                        self.registry.lookup(&child_identity).and_then(Entry::container)
                    {
                        self.surface.attach_to_anchor(anchor, child_container);
                    }
                }

                if let Some(decl) = slot_decls_mut(instance, slot).get_mut(position) {
                    decl.set_mounted(Some(child_identity));
                }
            }
        }

        // The stored identities are part of the snapshot; re-snapshot so
        // this render's own bookkeeping never reads as a pending change.
        // Skipped on the error path above, which leaves the entry stale on
        // purpose: the next render then sees a difference and retries.
        self.registry.refresh_snapshot(instance);
        Ok(())
    }

    fn dispatch(&mut self, task: Task) -> Result<(), SceneError> {
        let Some(instance) = self.registry.take_instance(&task.owner) else {
            // Destroyed after the task was queued.
            tracing::trace!(owner = %task.owner, "dropping task for unavailable instance");
            return Ok(());
        };
        let hook = match task.notice {
            Notice::Mounted => Hook::Mounted,
            Notice::RegisterEvents => Hook::RegisterEvents,
            Notice::ChildrenRendered => Hook::ChildrenRendered,
            Notice::StoreUpdate(event) => Hook::StoreUpdate(event),
        };
        self.run_hook(task.owner, instance, hook)
    }

    /// Run one hook against a borrowed-out instance, park the instance,
    /// then apply what the hook staged.
    fn run_hook(&mut self, owner: Identity, mut instance: Instance, hook: Hook) -> Result<(), SceneError> {
        let mut staged = Staged::default();
        {
            let Instance { kind, props, children, handle, behavior, .. } = &mut instance;
            let mut cx = Cx {
                identity: &owner,
                kind: kind.as_str(),
                props,
                children,
                handle: *handle,
                stores: &mut self.stores,
                surface: &mut self.surface,
                staged: &mut staged,
            };
            match &hook {
                Hook::Mounted => behavior.on_mounted(&mut cx),
                Hook::RegisterEvents => behavior.on_register_events(&mut cx),
                Hook::ChildrenRendered => behavior.on_children_rendered(&mut cx),
                Hook::StoreUpdate(event) => behavior.on_store_update(event, &mut cx),
                Hook::Surface(event) => behavior.on_event(event, &mut cx),
            }
        }

        let destroyed = self.registry.put_instance(&owner, instance).is_some();
        self.deliver_updates(staged.updates)?;
        if staged.render && !destroyed {
            self.render(&owner)?;
        }
        Ok(())
    }

    /// Hand store updates to their subscribers, in fan-out order. An owner
    /// whose hook is currently on the stack gets its update queued instead,
    /// so it still sees it once that hook returns.
    fn deliver_updates(&mut self, updates: Vec<StoreUpdate>) -> Result<(), SceneError> {
        for update in updates {
            let StoreUpdate { store, path, owner, callback } = update;
            let event = StoreEvent { store, path, callback };
            match self.registry.take_instance(&owner) {
                Some(instance) => self.run_hook(owner, instance, Hook::StoreUpdate(event))?,
                None if self.registry.contains(&owner) => {
                    self.schedule.defer(owner, Notice::StoreUpdate(event));
                }
                None => {
                    tracing::trace!(owner = %owner, "dropping update for destroyed instance");
                }
            }
        }
        Ok(())
    }
}

/// What a lifecycle hook sees of its instance and stage.
///
/// Prop and child mutations stage a re-render instead of rendering
/// immediately; the render runs right after the hook returns. Store writes
/// likewise fan out after the hook returns, which is what lets a hook
/// write to a store it subscribes to itself without re-entering.
pub struct Cx<'a> {
    identity: &'a Identity,
    kind: &'a str,
    props: &'a mut Props,
    children: &'a mut ChildDecls,
    handle: Option<ContainerId>,
    stores: &'a mut StoreHub,
    surface: &'a mut (dyn Surface + 'a),
    staged: &'a mut Staged,
}

impl Cx<'_> {
    pub fn identity(&self) -> &Identity {
        self.identity
    }

    pub fn kind(&self) -> &str {
        self.kind
    }

    /// Surface container of this instance, once mounted.
    pub fn handle(&self) -> Option<ContainerId> {
        self.handle
    }

    pub fn props(&self) -> &Props {
        self.props
    }

    pub fn children(&self) -> &ChildDecls {
        self.children
    }

    /// Set one prop and stage a re-render.
    pub fn set_prop(&mut self, name: impl Into<CompactString>, prop: impl Into<Prop>) {
        self.props.insert(name, prop);
        self.staged.render = true;
    }

    /// Remove one prop; stages a re-render if the prop existed.
    pub fn remove_prop(&mut self, name: &str) {
        if self.props.remove(name).is_some() {
            self.staged.render = true;
        }
    }

    /// Set one child slot and stage a re-render.
    pub fn set_child(&mut self, name: impl Into<CompactString>, slot: impl Into<ChildSlot>) {
        self.children.insert(name, slot);
        self.staged.render = true;
    }

    /// Remove one child slot; stages a re-render if the slot existed. The
    /// slot's mounted subtree is destroyed by that render's reconcile pass.
    pub fn remove_child(&mut self, name: &str) {
        if self.children.remove(name).is_some() {
            self.staged.render = true;
        }
    }

    /// Stage a re-render without changing anything. The render still skips
    /// if the instance state is unchanged.
    pub fn request_render(&mut self) {
        self.staged.render = true;
    }

    pub fn create_store(&mut self, name: &str, scope: StoreScope) -> Result<(), SceneError> {
        self.stores.create_store(name, scope).map_err(Into::into)
    }

    pub fn load(&self, name: &str, path: Option<&str>) -> Result<JsonValue, SceneError> {
        self.stores.load(name, path).map_err(Into::into)
    }

    /// Write to a store. The resulting updates are delivered after this
    /// hook returns, the writer's own subscriptions included.
    pub fn save(&mut self, name: &str, path: &str, value: JsonValue) -> Result<(), SceneError> {
        let pending = &mut self.staged.updates;
        self.stores
            .save(name, path, value, &mut |update| pending.push(update))
            .map_err(Into::into)
    }

    pub fn save_many(
        &mut self,
        name: &str,
        entries: Vec<(CompactString, JsonValue)>,
    ) -> Result<(), SceneError> {
        let pending = &mut self.staged.updates;
        self.stores
            .save_many(name, entries, &mut |update| pending.push(update))
            .map_err(Into::into)
    }

    /// Subscribe this instance to writes on `path` of store `name`,
    /// delivered through its store-update hook under `callback`.
    pub fn watch(&mut self, callback: &str, name: &str, path: &str) {
        self.stores.register_for_updates(self.identity, callback, name, path);
    }

    /// Drop every subscription this instance holds.
    pub fn unwatch(&mut self) {
        self.stores.unregister(self.identity);
    }

    /// Register a delegated surface event on this instance's container.
    /// `None` before the instance has a container.
    pub fn bind(&mut self, selector: &str, event: &str) -> Option<BindingId> {
        self.handle
            .map(|container| self.surface.bind_event(self.identity, container, selector, event))
    }
}

/// Adapts an instance's prop and child bags to the parser's binding
/// contract. Props shadow same-named child slots, matching the lookup
/// order everywhere else in the runtime.
struct InstanceBindings<'a> {
    props: &'a Props,
    children: &'a ChildDecls,
}

impl Bindings for InstanceBindings<'_> {
    fn classify(&self, name: &str) -> TokenClass {
        match self.props.get(name) {
            Some(Prop::Callback(_)) => TokenClass::Function,
            Some(Prop::Child(_)) => TokenClass::ChildSlot,
            Some(Prop::Value(value)) => {
                if value.is_object_like() {
                    TokenClass::Malformed
                } else {
                    TokenClass::Scalar
                }
            }
            None if self.children.contains(name) => TokenClass::ChildSlot,
            None => TokenClass::Missing,
        }
    }

    fn invoke(&mut self, name: &str) -> Option<CompactString> {
        match self.props.get(name) {
            Some(Prop::Callback(callback)) => callback.call(),
            _ => None,
        }
    }

    fn scalar(&self, name: &str) -> CompactString {
        match self.props.get(name) {
            Some(Prop::Value(value)) => value.to_display(),
            _ => CompactString::default(),
        }
    }
}

/// Declared children of `slot`, wherever the declaration lives: a
/// [`Prop::Child`] entry shadows a same-named slot in the children bag.
fn slot_decls<'a>(instance: &'a Instance, slot: &str) -> &'a [ChildDecl] {
    match instance.props.get(slot) {
        Some(Prop::Child(decl)) => std::slice::from_ref(decl),
        Some(_) => &[],
        None => instance.children.get(slot).map(ChildSlot::as_slice).unwrap_or(&[]),
    }
}

fn slot_decls_mut<'a>(instance: &'a mut Instance, slot: &str) -> &'a mut [ChildDecl] {
    if instance.props.contains(slot) {
        match instance.props.get_mut(slot) {
            Some(Prop::Child(decl)) => std::slice::from_mut(decl),
            _ => &mut [],
        }
    } else {
        match instance.children.get_mut(slot) {
            Some(slot_value) => slot_value.as_mut_slice(),
            None => &mut [],
        }
    }
}
