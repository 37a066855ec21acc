//! Presentation surface contract.
//!
//! The runtime drives presentation through this trait and never touches a
//! concrete output technology. A surface hands out opaque handles for
//! containers, slot anchors and event bindings; the runtime files them by
//! instance identity and hands them back when content changes or an
//! instance is torn down.

use compact_str::CompactString;
use maquette_socle::Identity;

/// Handle to one component container on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

/// Handle to one child slot anchor inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

/// Handle to one event binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(pub u64);

/// One delegated event registration, owned by an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBinding {
    pub id: BindingId,
    pub owner: Identity,
    pub container: ContainerId,
    /// Selector scoping the binding inside its container.
    pub selector: CompactString,
    /// Event name, e.g. `click`.
    pub event: CompactString,
}

/// What the component runtime needs from a presentation layer.
pub trait Surface {
    /// Allocate an empty container for an instance of `kind`.
    fn create_container(&mut self, kind: &str) -> ContainerId;

    /// Put `container` at the front of the surface's root list.
    fn mount_root(&mut self, container: ContainerId);

    /// Replace the whole content of `container`, dropping any anchors the
    /// previous content carried.
    fn set_content(&mut self, container: ContainerId, markup: &str);

    /// Swap the first occurrence of the slot marker for `slot` in the
    /// container's text for a live anchor. Markers inside framed spans are
    /// not eligible. Calling again for the same slot returns the existing
    /// anchor; `None` means no marker was found.
    fn place_slot_anchor(&mut self, container: ContainerId, slot: &str) -> Option<AnchorId>;

    /// Attach `child` under `anchor`, detaching it from wherever it was.
    fn attach_to_anchor(&mut self, anchor: AnchorId, child: ContainerId);

    /// Whether `anchor` is still live. Anchors die when their container's
    /// content is replaced or removed.
    fn has_anchor(&self, anchor: AnchorId) -> bool;

    /// Remove `container` and its anchors. Containers attached to those
    /// anchors are detached, not removed; teardown recursion is the
    /// caller's job.
    fn remove(&mut self, container: ContainerId);

    /// Register a delegated event for `owner` on `container`.
    fn bind_event(
        &mut self,
        owner: &Identity,
        container: ContainerId,
        selector: &str,
        event: &str,
    ) -> BindingId;

    /// Look up a binding by handle, e.g. to route a fired event back to
    /// its owner.
    fn binding(&self, id: BindingId) -> Option<EventBinding>;

    /// Drop every binding owned by `owner`.
    fn release_bindings(&mut self, owner: &Identity);
}
