//! Canonical instance snapshots for change detection.
//!
//! An instance's snapshot is the compact JSON text of its kind, props and
//! child declarations. Two snapshots comparing equal means "nothing to
//! re-render". Callback props are omitted the way JSON serialization drops
//! functions, and shared value cells go through the cycle-safe writer, so
//! the comparison is deliberately lossy for aliased structures.
//!
//! Mounted child identities are part of the text: recording a freshly
//! mounted child back into a declaration changes the parent's snapshot,
//! which is what lets the registry tell "children mounted" apart from
//! "nothing happened".

use maquette_socle::snapshot::{write_escaped, write_value};
use maquette_socle::{FxHashSet, Value};

use crate::component::{ChildDecl, ChildDecls, ChildSlot, Prop, Props};

/// Canonical text of one instance's state.
pub fn instance_snapshot(kind: &str, props: &Props, children: &ChildDecls) -> String {
    let mut out = String::with_capacity(64);
    let mut visited = FxHashSet::default();
    out.push_str("{\"kind\":");
    write_escaped(&mut out, kind);
    out.push_str(",\"props\":");
    write_props(&mut out, props, &mut visited);
    out.push_str(",\"children\":");
    write_children(&mut out, children, &mut visited);
    out.push('}');
    out
}

fn write_props(out: &mut String, props: &Props, visited: &mut FxHashSet<usize>) {
    out.push('{');
    let mut first = true;
    for (name, prop) in props.iter() {
        let skip = match prop {
            // Functions have no canonical text.
            Prop::Callback(_) => true,
            // A shared cell the pass already serialized is omitted,
            // mirroring the value writer's object rule.
            Prop::Value(Value::Shared(cell)) => visited.contains(&cell.ptr_key()),
            _ => false,
        };
        if skip {
            continue;
        }
        if !first {
            out.push(',');
        }
        first = false;
        write_escaped(out, name);
        out.push(':');
        match prop {
            Prop::Value(value) => write_value(out, value, visited),
            Prop::Child(decl) => write_decl(out, decl, visited),
            Prop::Callback(_) => {}
        }
    }
    out.push('}');
}

fn write_children(out: &mut String, children: &ChildDecls, visited: &mut FxHashSet<usize>) {
    out.push('{');
    let mut first = true;
    for (name, slot) in children.iter() {
        if !first {
            out.push(',');
        }
        first = false;
        write_escaped(out, name);
        out.push(':');
        match slot {
            ChildSlot::Single(decl) => write_decl(out, decl, visited),
            ChildSlot::Many(decls) => {
                out.push('[');
                for (index, decl) in decls.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    write_decl(out, decl, visited);
                }
                out.push(']');
            }
        }
    }
    out.push('}');
}

fn write_decl(out: &mut String, decl: &ChildDecl, visited: &mut FxHashSet<usize>) {
    out.push_str("{\"kind\":");
    write_escaped(out, decl.kind());
    out.push_str(",\"mounted\":");
    match decl.mounted() {
        Some(identity) => write_escaped(out, identity.as_str()),
        None => out.push_str("null"),
    }
    out.push_str(",\"props\":");
    write_props(out, &decl.props, visited);
    out.push_str(",\"children\":");
    write_children(out, &decl.children, visited);
    out.push('}');
}

#[cfg(test)]
mod tests {
    use maquette_socle::SharedValue;

    use super::*;
    use crate::component::Callback;

    struct Noop;

    impl crate::component::Component for Noop {
        fn template(&self) -> compact_str::CompactString {
            "".into()
        }
    }

    impl crate::component::Blueprint for Noop {
        const KIND: &'static str = "Noop";

        fn assemble(_props: Props, _children: ChildDecls) -> Self {
            Noop
        }
    }

    #[test]
    fn test_snapshot_shape() {
        let props = Props::new().with("label", "Save").with("count", 2);
        let text = instance_snapshot("Button", &props, &ChildDecls::new());
        assert_eq!(
            text,
            r#"{"kind":"Button","props":{"label":"Save","count":2},"children":{}}"#
        );
    }

    #[test]
    fn test_callbacks_are_invisible() {
        let plain = Props::new().with("label", "Save");
        let with_callback = Props::new()
            .with("label", "Save")
            .with("fill", Callback::new(|| Some("x".into())));

        assert_eq!(
            instance_snapshot("Button", &plain, &ChildDecls::new()),
            instance_snapshot("Button", &with_callback, &ChildDecls::new())
        );
    }

    #[test]
    fn test_mounted_identity_changes_the_snapshot() {
        let children = ChildDecls::new().with("body", crate::component::ChildDecl::of::<Noop>());
        let before = instance_snapshot("Card", &Props::new(), &children);

        let mut mounted = children.clone();
        if let Some(ChildSlot::Single(decl)) = mounted.get_mut("body") {
            decl.set_mounted(Some(maquette_socle::Identity::from_raw("abc123")));
        }
        let after = instance_snapshot("Card", &Props::new(), &mounted);

        assert_ne!(before, after);
        assert!(after.contains("abc123"));
    }

    #[test]
    fn test_cyclic_props_terminate() {
        let cell = SharedValue::new(Value::Null);
        cell.set(Value::Map(
            [("me".into(), Value::Shared(cell.clone()))].into_iter().collect(),
        ));
        let props = Props::new().with("state", Value::Shared(cell));

        let text = instance_snapshot("Loop", &props, &ChildDecls::new());
        assert_eq!(text, r#"{"kind":"Loop","props":{"state":{}},"children":{}}"#);
    }

    #[test]
    fn test_many_slot_serializes_as_array() {
        let children = ChildDecls::new().with(
            "items",
            vec![ChildDecl::of::<Noop>(), ChildDecl::of::<Noop>()],
        );
        let text = instance_snapshot("List", &Props::new(), &children);
        assert!(text.contains(r#""items":[{"#));
    }
}
