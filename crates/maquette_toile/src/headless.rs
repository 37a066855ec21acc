//! In-memory surface for tests and headless runs.
//!
//! Containers hold their markup as a list of segments so that `<iframe>`
//! spans can be fenced off from marker scanning, mirroring how a real
//! surface must not rewrite framed content it does not own. Everything the
//! runtime does is observable afterwards through the readout methods.

use compact_str::CompactString;
use maquette_socle::{slot_marker, Identity};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::surface::{AnchorId, BindingId, ContainerId, EventBinding, Surface};

/// One piece of a container's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Plain markup text. Slot markers in here are anchorable.
    Text(String),
    /// An `<iframe>...</iframe>` span (lowercase form). Never scanned.
    Frame(String),
    /// A live child anchor.
    Anchor(AnchorId),
}

#[derive(Debug, Default)]
struct Container {
    kind: CompactString,
    segments: Vec<Segment>,
    attached_to: Option<AnchorId>,
}

#[derive(Debug)]
struct AnchorState {
    host: ContainerId,
    slot: CompactString,
    attached: SmallVec<[ContainerId; 2]>,
}

/// Surface that renders nothing but records everything.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    containers: FxHashMap<ContainerId, Container>,
    anchors: FxHashMap<AnchorId, AnchorState>,
    bindings: Vec<EventBinding>,
    roots: Vec<ContainerId>,
    next_id: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn anchor_for(&self, container: ContainerId, slot: &str) -> Option<AnchorId> {
        self.anchors
            .iter()
            .find(|(_, state)| state.host == container && state.slot == slot)
            .map(|(id, _)| *id)
    }

    /// Kind the container was created for.
    pub fn kind_of(&self, container: ContainerId) -> Option<&str> {
        self.containers.get(&container).map(|state| state.kind.as_str())
    }

    pub fn contains(&self, container: ContainerId) -> bool {
        self.containers.contains_key(&container)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Root containers, most recently mounted first.
    pub fn roots(&self) -> &[ContainerId] {
        &self.roots
    }

    /// Containers attached under `anchor`, in attachment order.
    pub fn attached_children(&self, anchor: AnchorId) -> &[ContainerId] {
        self.anchors.get(&anchor).map(|state| state.attached.as_slice()).unwrap_or(&[])
    }

    /// Flattened text of one container, descending into attached children.
    pub fn content_of(&self, container: ContainerId) -> String {
        let mut out = String::new();
        self.write_content(container, &mut out);
        out
    }

    /// Flattened text of every root, in root order.
    pub fn root_content(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.write_content(*root, &mut out);
        }
        out
    }

    fn write_content(&self, container: ContainerId, out: &mut String) {
        let Some(state) = self.containers.get(&container) else { return };
        for segment in &state.segments {
            match segment {
                Segment::Text(text) | Segment::Frame(text) => out.push_str(text),
                Segment::Anchor(anchor) => {
                    for child in self.attached_children(*anchor) {
                        self.write_content(*child, out);
                    }
                }
            }
        }
    }

    pub fn bindings_of(&self, owner: &Identity) -> Vec<&EventBinding> {
        self.bindings.iter().filter(|binding| binding.owner == *owner).collect()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// First binding matching `selector` and `event`, for driving events
    /// in tests.
    pub fn find_binding(&self, selector: &str, event: &str) -> Option<&EventBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.selector == selector && binding.event == event)
    }
}

impl Surface for HeadlessSurface {
    fn create_container(&mut self, kind: &str) -> ContainerId {
        let id = ContainerId(self.alloc());
        self.containers.insert(
            id,
            Container { kind: kind.into(), segments: Vec::new(), attached_to: None },
        );
        id
    }

    fn mount_root(&mut self, container: ContainerId) {
        self.roots.retain(|root| *root != container);
        self.roots.insert(0, container);
    }

    fn set_content(&mut self, container: ContainerId, markup: &str) {
        let Some(state) = self.containers.get_mut(&container) else { return };
        let old_segments = std::mem::replace(&mut state.segments, segment_markup(markup));

        // The previous content's anchors die with it; whatever was attached
        // to them floats free until re-attached.
        for segment in old_segments {
            if let Segment::Anchor(anchor) = segment {
                if let Some(dropped) = self.anchors.remove(&anchor) {
                    for child in dropped.attached {
                        if let Some(child_state) = self.containers.get_mut(&child) {
                            child_state.attached_to = None;
                        }
                    }
                }
            }
        }
    }

    fn place_slot_anchor(&mut self, container: ContainerId, slot: &str) -> Option<AnchorId> {
        if let Some(existing) = self.anchor_for(container, slot) {
            return Some(existing);
        }

        let marker = slot_marker(slot);
        let found = {
            let state = self.containers.get(&container)?;
            state.segments.iter().enumerate().find_map(|(index, segment)| match segment {
                Segment::Text(text) => text.find(&marker).map(|offset| (index, offset)),
                _ => None,
            })
        };
        let (index, offset) = found?;

        let id = AnchorId(self.alloc());
        let state = self.containers.get_mut(&container)?;
        let Segment::Text(text) = state.segments.remove(index) else { return None };

        let mut replacement = Vec::with_capacity(3);
        if offset > 0 {
            replacement.push(Segment::Text(text[..offset].to_string()));
        }
        replacement.push(Segment::Anchor(id));
        let after = &text[offset + marker.len()..];
        if !after.is_empty() {
            replacement.push(Segment::Text(after.to_string()));
        }
        state.segments.splice(index..index, replacement);

        self.anchors.insert(
            id,
            AnchorState { host: container, slot: slot.into(), attached: SmallVec::new() },
        );
        Some(id)
    }

    fn attach_to_anchor(&mut self, anchor: AnchorId, child: ContainerId) {
        if !self.anchors.contains_key(&anchor) || !self.containers.contains_key(&child) {
            return;
        }
        let previous = self.containers.get(&child).and_then(|state| state.attached_to);
        if let Some(previous) = previous {
            if let Some(state) = self.anchors.get_mut(&previous) {
                state.attached.retain(|attached| *attached != child);
            }
        }
        if let Some(state) = self.anchors.get_mut(&anchor) {
            state.attached.push(child);
        }
        if let Some(state) = self.containers.get_mut(&child) {
            state.attached_to = Some(anchor);
        }
    }

    fn has_anchor(&self, anchor: AnchorId) -> bool {
        self.anchors.contains_key(&anchor)
    }

    fn remove(&mut self, container: ContainerId) {
        let Some(state) = self.containers.remove(&container) else { return };
        self.roots.retain(|root| *root != container);

        if let Some(anchor) = state.attached_to {
            if let Some(parent_state) = self.anchors.get_mut(&anchor) {
                parent_state.attached.retain(|attached| *attached != container);
            }
        }

        for segment in state.segments {
            if let Segment::Anchor(anchor) = segment {
                if let Some(dropped) = self.anchors.remove(&anchor) {
                    for child in dropped.attached {
                        if let Some(child_state) = self.containers.get_mut(&child) {
                            child_state.attached_to = None;
                        }
                    }
                }
            }
        }
    }

    fn bind_event(
        &mut self,
        owner: &Identity,
        container: ContainerId,
        selector: &str,
        event: &str,
    ) -> BindingId {
        let id = BindingId(self.alloc());
        self.bindings.push(EventBinding {
            id,
            owner: owner.clone(),
            container,
            selector: selector.into(),
            event: event.into(),
        });
        id
    }

    fn binding(&self, id: BindingId) -> Option<EventBinding> {
        self.bindings.iter().find(|binding| binding.id == id).cloned()
    }

    fn release_bindings(&mut self, owner: &Identity) {
        self.bindings.retain(|binding| binding.owner != *owner);
    }
}

/// Split markup into anchorable text and fenced `<iframe>` spans.
fn segment_markup(markup: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = markup;
    while let Some(open) = rest.find("<iframe") {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let framed = &rest[open..];
        match framed.find("</iframe>") {
            Some(close) => {
                let end = close + "</iframe>".len();
                segments.push(Segment::Frame(framed[..end].to_string()));
                rest = &framed[end..];
            }
            None => {
                // Unterminated frame: fence off the whole tail.
                segments.push(Segment::Frame(framed.to_string()));
                rest = "";
                break;
            }
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(raw: &str) -> Identity {
        Identity::from_raw(raw)
    }

    #[test]
    fn test_roots_are_prepended() {
        let mut surface = HeadlessSurface::new();
        let first = surface.create_container("First");
        let second = surface.create_container("Second");
        surface.mount_root(first);
        surface.mount_root(second);
        assert_eq!(surface.roots(), &[second, first]);
    }

    #[test]
    fn test_marker_becomes_anchor_once() {
        let mut surface = HeadlessSurface::new();
        let container = surface.create_container("Card");
        surface.set_content(container, "<div>[[#body]] and [[#body]]</div>");

        let anchor = surface.place_slot_anchor(container, "body").unwrap();
        // Only the first occurrence is swapped; the second stays text.
        assert_eq!(surface.content_of(container), "<div> and [[#body]]</div>");
        // Asking again returns the same anchor.
        assert_eq!(surface.place_slot_anchor(container, "body"), Some(anchor));
        assert_eq!(surface.anchor_count(), 1);
    }

    #[test]
    fn test_markers_inside_iframes_are_fenced_off() {
        let mut surface = HeadlessSurface::new();
        let container = surface.create_container("Embed");
        surface.set_content(container, "<iframe>[[#slot]]</iframe><p>[[#slot]]</p>");

        surface.place_slot_anchor(container, "slot").unwrap();
        assert_eq!(
            surface.content_of(container),
            "<iframe>[[#slot]]</iframe><p></p>"
        );
    }

    #[test]
    fn test_marker_only_inside_iframe_is_not_anchorable() {
        let mut surface = HeadlessSurface::new();
        let container = surface.create_container("Embed");
        surface.set_content(container, "<iframe src=x>[[#slot]]</iframe>");
        assert_eq!(surface.place_slot_anchor(container, "slot"), None);
    }

    #[test]
    fn test_attached_children_render_inside_parent_content() {
        let mut surface = HeadlessSurface::new();
        let parent = surface.create_container("List");
        surface.set_content(parent, "<ul>[[#items]]</ul>");
        let anchor = surface.place_slot_anchor(parent, "items").unwrap();

        let first = surface.create_container("Item");
        surface.set_content(first, "<li>one</li>");
        let second = surface.create_container("Item");
        surface.set_content(second, "<li>two</li>");
        surface.attach_to_anchor(anchor, first);
        surface.attach_to_anchor(anchor, second);

        assert_eq!(surface.content_of(parent), "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn test_set_content_drops_stale_anchors() {
        let mut surface = HeadlessSurface::new();
        let parent = surface.create_container("List");
        surface.set_content(parent, "[[#items]]");
        let anchor = surface.place_slot_anchor(parent, "items").unwrap();
        let child = surface.create_container("Item");
        surface.attach_to_anchor(anchor, child);

        surface.set_content(parent, "[[#items]] again");
        assert!(!surface.has_anchor(anchor));
        assert_eq!(surface.attached_children(anchor), &[]);
        assert_eq!(surface.anchor_count(), 0);

        // The marker in the fresh content is anchorable anew.
        let fresh = surface.place_slot_anchor(parent, "items").unwrap();
        assert_ne!(fresh, anchor);
    }

    #[test]
    fn test_reattach_moves_to_the_end() {
        let mut surface = HeadlessSurface::new();
        let parent = surface.create_container("List");
        surface.set_content(parent, "[[#items]]");
        let anchor = surface.place_slot_anchor(parent, "items").unwrap();

        let first = surface.create_container("Item");
        let second = surface.create_container("Item");
        surface.attach_to_anchor(anchor, first);
        surface.attach_to_anchor(anchor, second);
        surface.attach_to_anchor(anchor, first);

        assert_eq!(surface.attached_children(anchor), &[second, first]);
    }

    #[test]
    fn test_remove_detaches_from_parent_and_orphans_children() {
        let mut surface = HeadlessSurface::new();
        let parent = surface.create_container("Outer");
        surface.set_content(parent, "[[#slot]]");
        let anchor = surface.place_slot_anchor(parent, "slot").unwrap();

        let middle = surface.create_container("Middle");
        surface.set_content(middle, "[[#inner]]");
        let inner_anchor = surface.place_slot_anchor(middle, "inner").unwrap();
        let leaf = surface.create_container("Leaf");
        surface.attach_to_anchor(anchor, middle);
        surface.attach_to_anchor(inner_anchor, leaf);

        surface.remove(middle);
        assert_eq!(surface.attached_children(anchor), &[]);
        assert!(!surface.contains(middle));
        // The leaf container still exists; removing it is the caller's job.
        assert!(surface.contains(leaf));
        assert_eq!(surface.anchor_count(), 1);
    }

    #[test]
    fn test_bindings_are_owned_and_releasable() {
        let mut surface = HeadlessSurface::new();
        let container = surface.create_container("Button");
        let a = owner("a");
        let b = owner("b");
        let binding = surface.bind_event(&a, container, ".save", "click");
        surface.bind_event(&b, container, ".cancel", "click");

        assert_eq!(surface.binding(binding).unwrap().selector, ".save");
        assert_eq!(surface.bindings_of(&a).len(), 1);

        surface.release_bindings(&a);
        assert!(surface.bindings_of(&a).is_empty());
        assert_eq!(surface.binding_count(), 1);
        assert!(surface.find_binding(".cancel", "click").is_some());
    }
}
