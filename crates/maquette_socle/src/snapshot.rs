//! Cycle-safe canonical text for prop values.
//!
//! Change detection compares the canonical text of an instance's state
//! before and after a mutation. The writer emits compact JSON and keeps a
//! set of visited shared cells for the duration of one pass: a cell seen a
//! second time is omitted from objects and written as `null` in lists, so
//! self-referential props serialize without recursing forever. The price is
//! a lossy equality, since two passes that revisit differently-shaped cells
//! can still produce identical text.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;

use crate::value::{Value, ValueMap};

/// Canonical text of a single value, with a fresh visited set.
pub fn value_text(value: &Value) -> String {
    let mut out = String::new();
    let mut visited = FxHashSet::default();
    write_value(&mut out, value, &mut visited);
    out
}

/// Append the canonical text of `value`, tracking visited shared cells.
pub fn write_value(out: &mut String, value: &Value, visited: &mut FxHashSet<usize>) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(f) => {
            if f.is_finite() {
                let _ = write!(out, "{f}");
            } else {
                out.push_str("null");
            }
        }
        Value::Str(s) => write_escaped(out, s),
        Value::List(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item, visited);
            }
            out.push(']');
        }
        Value::Map(entries) => write_map(out, entries, visited),
        Value::Shared(cell) => {
            if visited.insert(cell.ptr_key()) {
                write_value(out, &cell.borrow(), visited);
            } else {
                out.push_str("null");
            }
        }
    }
}

/// Append an object body, omitting entries whose cell was already visited.
pub fn write_map(out: &mut String, entries: &ValueMap, visited: &mut FxHashSet<usize>) {
    out.push('{');
    let mut first = true;
    for (key, entry) in entries {
        if revisits(entry, visited) {
            continue;
        }
        if !first {
            out.push(',');
        }
        first = false;
        write_escaped(out, key);
        out.push(':');
        write_value(out, entry, visited);
    }
    out.push('}');
}

fn revisits(value: &Value, visited: &FxHashSet<usize>) -> bool {
    matches!(value, Value::Shared(cell) if visited.contains(&cell.ptr_key()))
}

/// Append `text` as a JSON string literal.
pub fn write_escaped(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
