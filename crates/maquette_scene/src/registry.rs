//! Identity and change-detection registry.
//!
//! The registry files every live instance under its identity: the canonical
//! snapshot change detection compares against, the markup of its last
//! render, the ordered identities of its children, and the parked
//! [`Instance`] itself while no render or hook is borrowing it. The child
//! lists make teardown and orphan collection a direct index walk instead of
//! a scan over every entry.

use compact_str::CompactString;
use maquette_reserve::StoreHub;
use maquette_socle::{Identity, IdentityMint, IdentityStrategy};
use maquette_toile::{ContainerId, Surface};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::instance::{Instance, Phase};
use crate::snapshot::instance_snapshot;

/// Registry record of one live instance.
pub struct Entry {
    kind: CompactString,
    parent: Option<Identity>,
    slot_index: usize,
    snapshot: String,
    rendered: String,
    /// Child identities in registration order.
    children: SmallVec<[Identity; 4]>,
    container: Option<ContainerId>,
    /// The instance itself, parked between renders and hook runs.
    instance: Option<Instance>,
}

impl Entry {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn parent(&self) -> Option<&Identity> {
        self.parent.as_ref()
    }

    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// Canonical snapshot of the last registered state.
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Markup of the last full render.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn children(&self) -> &[Identity] {
        &self.children
    }

    pub fn container(&self) -> Option<ContainerId> {
        self.container
    }

    /// False while the instance is out on loan to a render or hook.
    pub fn is_parked(&self) -> bool {
        self.instance.is_some()
    }
}

/// All live instances of one stage.
pub struct Registry {
    entries: FxHashMap<Identity, Entry>,
    mint: IdentityMint,
}

impl Registry {
    pub fn new() -> Self {
        Registry::with_strategy(IdentityStrategy::default())
    }

    pub fn with_strategy(strategy: IdentityStrategy) -> Self {
        Registry {
            entries: FxHashMap::default(),
            mint: IdentityMint::new(strategy),
        }
    }

    pub fn strategy(&self) -> IdentityStrategy {
        self.mint.strategy()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn lookup(&self, identity: &Identity) -> Option<&Entry> {
        self.entries.get(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.keys()
    }

    /// File `instance` under its identity, minting one first if it has
    /// none, and record `rendered` as its current markup.
    ///
    /// Under the digest strategy a freshly minted identity can hit an entry
    /// that already exists; the entry is then taken over rather than
    /// duplicated, which is what makes same-state re-creation collapse into
    /// instance reuse.
    pub fn register(&mut self, instance: &mut Instance, rendered: String) -> Identity {
        let snapshot = instance_snapshot(instance.kind(), instance.props(), instance.children());
        let identity = match &instance.identity {
            Some(identity) => identity.clone(),
            None => {
                let minted = self.mint.issue(&instance.kind, &snapshot);
                instance.identity = Some(minted.clone());
                minted
            }
        };

        match self.entries.get_mut(&identity) {
            Some(entry) => {
                entry.slot_index = instance.slot_index;
                entry.snapshot = snapshot;
                entry.rendered = rendered;
                if entry.parent == instance.parent {
                    return identity;
                }
                // Taken over by another owner: move the adjacency edge.
                let old_parent = std::mem::replace(&mut entry.parent, instance.parent.clone());
                if let Some(old_parent) = old_parent {
                    if let Some(old_entry) = self.entries.get_mut(&old_parent) {
                        old_entry.children.retain(|child| child != &identity);
                    }
                }
            }
            None => {
                tracing::trace!(identity = %identity, kind = %instance.kind, "instance registered");
                self.entries.insert(
                    identity.clone(),
                    Entry {
                        kind: instance.kind.clone(),
                        parent: instance.parent.clone(),
                        slot_index: instance.slot_index,
                        snapshot,
                        rendered,
                        children: SmallVec::new(),
                        container: None,
                        instance: None,
                    },
                );
            }
        }

        self.link(&identity, instance.parent.as_ref());
        identity
    }

    fn link(&mut self, child: &Identity, parent: Option<&Identity>) {
        let Some(parent) = parent else { return };
        // An unregistered parent is tolerated; the edge simply isn't kept.
        let Some(parent_entry) = self.entries.get_mut(parent) else { return };
        if !parent_entry.children.iter().any(|existing| existing == child) {
            parent_entry.children.push(child.clone());
        }
    }

    /// Whether `instance` differs from the state it was last registered
    /// with. Unregistered instances always need a render.
    pub fn needs_render(&self, instance: &Instance) -> bool {
        let Some(identity) = &instance.identity else { return true };
        let Some(entry) = self.entries.get(identity) else { return true };
        entry.snapshot != instance_snapshot(instance.kind(), instance.props(), instance.children())
    }

    /// Re-snapshot `instance` into its entry without touching anything
    /// else. Used after the runtime records mounted child identities back
    /// into the parent's declarations, so that bookkeeping alone never
    /// reads as a pending change.
    pub fn refresh_snapshot(&mut self, instance: &Instance) {
        let Some(identity) = &instance.identity else { return };
        if let Some(entry) = self.entries.get_mut(identity) {
            entry.snapshot = instance_snapshot(instance.kind(), instance.props(), instance.children());
        }
    }

    /// Remember the surface container `identity` renders into, keeping it
    /// reachable for teardown even while the instance is out on loan.
    pub fn record_container(&mut self, identity: &Identity, container: ContainerId) {
        if let Some(entry) = self.entries.get_mut(identity) {
            entry.container = Some(container);
        }
    }

    /// Child identities of `identity` in registration order.
    pub fn children_of(&self, identity: &Identity) -> &[Identity] {
        self.entries
            .get(identity)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    /// Destroy every child of `parent` that is not in `keep`, subtrees
    /// included. Returns the destroyed roots. Running it again with the
    /// same arguments destroys nothing.
    pub fn reconcile_children(
        &mut self,
        parent: &Identity,
        keep: &[Identity],
        stores: &mut StoreHub,
        surface: &mut dyn Surface,
    ) -> Vec<Identity> {
        let orphans: Vec<Identity> = self
            .children_of(parent)
            .iter()
            .filter(|child| !keep.contains(child))
            .cloned()
            .collect();
        for orphan in &orphans {
            tracing::debug!(parent = %parent, orphan = %orphan, "destroying unreferenced child");
            self.destroy_subtree(orphan, stores, surface);
        }
        orphans
    }

    /// Tear down `identity` and everything below it, top-down: the node's
    /// subscriptions, event bindings and container go before its children
    /// are visited. Unknown identities are a no-op.
    pub fn destroy_subtree(
        &mut self,
        identity: &Identity,
        stores: &mut StoreHub,
        surface: &mut dyn Surface,
    ) {
        let Some(mut entry) = self.entries.remove(identity) else { return };

        stores.unregister(identity);
        surface.release_bindings(identity);
        if let Some(container) = entry.container {
            surface.remove(container);
        }
        if let Some(instance) = entry.instance.as_mut() {
            instance.phase = Phase::Destroyed;
        }
        if let Some(parent) = &entry.parent {
            if let Some(parent_entry) = self.entries.get_mut(parent) {
                parent_entry.children.retain(|child| child != identity);
            }
        }
        tracing::debug!(identity = %identity, kind = %entry.kind, "instance destroyed");

        for child in entry.children {
            self.destroy_subtree(&child, stores, surface);
        }
    }

    /// Borrow the parked instance out of its entry.
    pub fn take_instance(&mut self, identity: &Identity) -> Option<Instance> {
        self.entries.get_mut(identity).and_then(|entry| entry.instance.take())
    }

    /// Park `instance` back into its entry. If the entry was destroyed in
    /// the meantime the instance is marked [`Phase::Destroyed`] and handed
    /// back to the caller instead.
    pub fn put_instance(&mut self, identity: &Identity, mut instance: Instance) -> Option<Instance> {
        match self.entries.get_mut(identity) {
            Some(entry) => {
                entry.instance = Some(instance);
                None
            }
            None => {
                instance.phase = Phase::Destroyed;
                Some(instance)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;
    use maquette_toile::{AnchorId, BindingId, EventBinding};

    use super::*;
    use crate::component::{ChildDecls, Component, Props};

    struct Noop;

    impl Component for Noop {
        fn template(&self) -> CompactString {
            "".into()
        }
    }

    fn widget(parent: Option<&Identity>, slot_index: usize) -> Instance {
        let mut instance = Instance::new("Widget", Box::new(Noop), Props::new(), ChildDecls::new());
        instance.parent = parent.cloned();
        instance.slot_index = slot_index;
        instance
    }

    /// Surface double that records teardown calls in order.
    #[derive(Default)]
    struct ProbeSurface {
        removed: Vec<ContainerId>,
        released: Vec<Identity>,
        next: u64,
    }

    impl Surface for ProbeSurface {
        fn create_container(&mut self, _kind: &str) -> ContainerId {
            self.next += 1;
            ContainerId(self.next)
        }

        fn mount_root(&mut self, _container: ContainerId) {}

        fn set_content(&mut self, _container: ContainerId, _markup: &str) {}

        fn place_slot_anchor(&mut self, _container: ContainerId, _slot: &str) -> Option<AnchorId> {
            None
        }

        fn attach_to_anchor(&mut self, _anchor: AnchorId, _child: ContainerId) {}

        fn has_anchor(&self, _anchor: AnchorId) -> bool {
            false
        }

        fn remove(&mut self, container: ContainerId) {
            self.removed.push(container);
        }

        fn bind_event(
            &mut self,
            _owner: &Identity,
            _container: ContainerId,
            _selector: &str,
            _event: &str,
        ) -> BindingId {
            BindingId(0)
        }

        fn binding(&self, _id: BindingId) -> Option<EventBinding> {
            None
        }

        fn release_bindings(&mut self, owner: &Identity) {
            self.released.push(owner.clone());
        }
    }

    #[test]
    fn test_register_mints_once_and_stays_stable() {
        let mut registry = Registry::new();
        let mut instance = widget(None, 0);

        let first = registry.register(&mut instance, String::new());
        let second = registry.register(&mut instance, String::new());
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(instance.identity(), Some(&first));
    }

    #[test]
    fn test_needs_render_tracks_snapshot_changes() {
        let mut registry = Registry::new();
        let mut instance = widget(None, 0);
        assert!(registry.needs_render(&instance));

        registry.register(&mut instance, String::new());
        assert!(!registry.needs_render(&instance));

        instance.props.insert("label", "changed");
        assert!(registry.needs_render(&instance));

        registry.refresh_snapshot(&instance);
        assert!(!registry.needs_render(&instance));
    }

    #[test]
    fn test_adjacency_follows_registration_order() {
        let mut registry = Registry::new();
        let mut parent = widget(None, 0);
        let parent_id = registry.register(&mut parent, String::new());
        let mut first = widget(Some(&parent_id), 0);
        let mut second = widget(Some(&parent_id), 1);
        let first_id = registry.register(&mut first, String::new());
        let second_id = registry.register(&mut second, String::new());

        assert_eq!(registry.children_of(&parent_id), &[first_id.clone(), second_id.clone()]);
        // Re-registering does not duplicate the edge.
        registry.register(&mut first, String::new());
        assert_eq!(registry.children_of(&parent_id), &[first_id, second_id]);
    }

    #[test]
    fn test_unregistered_parent_is_tolerated() {
        let mut registry = Registry::new();
        let ghost = Identity::from_raw("never-registered");
        let mut child = widget(Some(&ghost), 0);
        let child_id = registry.register(&mut child, String::new());

        assert!(registry.contains(&child_id));
        assert!(registry.children_of(&ghost).is_empty());
    }

    #[test]
    fn test_reconcile_destroys_unkept_children_once() {
        let mut registry = Registry::new();
        let mut stores = StoreHub::in_memory();
        let mut surface = ProbeSurface::default();

        let mut parent = widget(None, 0);
        let parent_id = registry.register(&mut parent, String::new());
        let mut kept = widget(Some(&parent_id), 0);
        let mut dropped = widget(Some(&parent_id), 1);
        let kept_id = registry.register(&mut kept, String::new());
        let dropped_id = registry.register(&mut dropped, String::new());

        let destroyed = registry.reconcile_children(
            &parent_id,
            std::slice::from_ref(&kept_id),
            &mut stores,
            &mut surface,
        );
        assert_eq!(destroyed, vec![dropped_id.clone()]);
        assert!(!registry.contains(&dropped_id));
        assert_eq!(registry.children_of(&parent_id), &[kept_id.clone()]);

        // Idempotent: nothing left to collect.
        let again = registry.reconcile_children(
            &parent_id,
            std::slice::from_ref(&kept_id),
            &mut stores,
            &mut surface,
        );
        assert!(again.is_empty());
    }

    #[test]
    fn test_destroy_tears_down_top_down() {
        let mut registry = Registry::new();
        let mut stores = StoreHub::in_memory();
        let mut surface = ProbeSurface::default();

        let mut parent = widget(None, 0);
        let parent_id = registry.register(&mut parent, String::new());
        let mut child = widget(Some(&parent_id), 0);
        let child_id = registry.register(&mut child, String::new());
        let mut leaf = widget(Some(&child_id), 0);
        let leaf_id = registry.register(&mut leaf, String::new());

        for (identity, container) in
            [(&parent_id, 10), (&child_id, 20), (&leaf_id, 30)]
        {
            registry.record_container(identity, ContainerId(container));
        }
        stores.register_for_updates(&child_id, "cb", "state", "all");

        registry.destroy_subtree(&parent_id, &mut stores, &mut surface);

        assert!(registry.is_empty());
        assert_eq!(surface.removed, vec![ContainerId(10), ContainerId(20), ContainerId(30)]);
        assert_eq!(surface.released, vec![parent_id, child_id.clone(), leaf_id]);
        assert!(!stores.is_subscribed(&child_id));
    }

    #[test]
    fn test_destroy_unknown_identity_is_a_no_op() {
        let mut registry = Registry::new();
        let mut stores = StoreHub::in_memory();
        let mut surface = ProbeSurface::default();
        registry.destroy_subtree(&Identity::from_raw("missing"), &mut stores, &mut surface);
        assert!(surface.removed.is_empty());
    }

    #[test]
    fn test_identity_collision_takes_over_the_entry() {
        let mut registry = Registry::new();
        let shared = Identity::from_raw("abc123");

        let mut original = widget(None, 0);
        original.identity = Some(shared.clone());
        registry.register(&mut original, "first".into());

        let mut doppelganger = widget(None, 0);
        doppelganger.identity = Some(shared.clone());
        registry.register(&mut doppelganger, "second".into());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&shared).map(Entry::rendered), Some("second"));
    }

    #[test]
    fn test_put_instance_reports_a_dead_entry() {
        let mut registry = Registry::new();
        let mut stores = StoreHub::in_memory();
        let mut surface = ProbeSurface::default();

        let mut instance = widget(None, 0);
        let identity = registry.register(&mut instance, String::new());
        assert!(registry.put_instance(&identity, instance).is_none());

        let loaned = registry.take_instance(&identity).unwrap();
        registry.destroy_subtree(&identity, &mut stores, &mut surface);
        let returned = registry.put_instance(&identity, loaned).unwrap();
        assert_eq!(returned.phase(), Phase::Destroyed);
    }
}
