//! Prop value tree.
//!
//! Component props carry a small dynamic value type instead of raw JSON so
//! that aliasing is expressible: [`Value::Shared`] wraps a node in a
//! reference-counted mutable cell, letting several owners observe a single
//! mutation and making self-referential structures constructible. The
//! snapshot writer in [`crate::snapshot`] tolerates those by skipping nodes
//! it has already visited.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use compact_str::{CompactString, ToCompactString};
use indexmap::IndexMap;

use crate::snapshot;

/// Insertion-ordered map used for object-shaped values.
pub type ValueMap = IndexMap<CompactString, Value>;

/// A single dynamic prop value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    List(Vec<Value>),
    Map(ValueMap),
    Shared(SharedValue),
}

impl Value {
    /// Empty object-shaped value.
    pub fn map() -> Value {
        Value::Map(ValueMap::new())
    }

    /// Wrap a value in a shared mutable cell.
    pub fn shared(value: Value) -> Value {
        Value::Shared(SharedValue::new(value))
    }

    /// True for object-shaped values, which cannot be spliced into markup
    /// as text. Shared cells delegate to their current content.
    pub fn is_object_like(&self) -> bool {
        match self {
            Value::Map(_) => true,
            Value::Shared(cell) => cell.borrow().is_object_like(),
            _ => false,
        }
    }

    /// The text spliced into markup when this value fills a template token.
    ///
    /// Strings are used bare, `Null` reads `null`, numbers and booleans use
    /// their canonical form, and lists serialize to compact JSON text.
    pub fn to_display(&self) -> CompactString {
        match self {
            Value::Null => "null".into(),
            Value::Bool(flag) => if *flag { "true" } else { "false" }.into(),
            Value::Int(n) => n.to_compact_string(),
            Value::Float(f) => {
                if f.is_finite() {
                    f.to_compact_string()
                } else {
                    "null".into()
                }
            }
            Value::Str(s) => s.clone(),
            Value::List(_) | Value::Map(_) => snapshot::value_text(self).into(),
            Value::Shared(cell) => {
                let inner = cell.borrow();
                match &*inner {
                    // Nested cells go through the cycle-safe writer.
                    Value::Shared(_) => snapshot::value_text(self).into(),
                    other => other.to_display(),
                }
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Entry lookup on object-shaped values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    /// Convert into plain JSON, replacing already-visited shared cells with
    /// `null` so cyclic structures terminate.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visited = rustc_hash::FxHashSet::default();
        self.to_json_inner(&mut visited)
    }

    fn to_json_inner(&self, visited: &mut rustc_hash::FxHashSet<usize>) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|item| item.to_json_inner(visited)).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, entry)| (key.to_string(), entry.to_json_inner(visited)))
                    .collect(),
            ),
            Value::Shared(cell) => {
                if visited.insert(cell.ptr_key()) {
                    cell.borrow().to_json_inner(visited)
                } else {
                    serde_json::Value::Null
                }
            }
        }
    }

    /// Build a value from plain JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    Value::Int(int)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, entry)| (CompactString::from(key), Value::from_json(entry)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<CompactString> for Value {
    fn from(s: CompactString) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ValueMap> for Value {
    fn from(entries: ValueMap) -> Self {
        Value::Map(entries)
    }
}

impl From<SharedValue> for Value {
    fn from(cell: SharedValue) -> Self {
        Value::Shared(cell)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }
}

// Serde support goes through the JSON bridge so that shared cells and cycles
// serialize with the same null-on-revisit rule as everything else.
impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

/// Reference-counted mutable cell shared between prop owners.
#[derive(Clone)]
pub struct SharedValue(Rc<RefCell<Value>>);

impl SharedValue {
    pub fn new(value: Value) -> Self {
        SharedValue(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Replace the cell content, visible through every clone.
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    /// Clone of the current content.
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Cell address, used by the snapshot writer to detect revisits.
    pub fn ptr_key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Default for SharedValue {
    fn default() -> Self {
        SharedValue::new(Value::Null)
    }
}

// Cells can be cyclic, so Debug prints the address instead of recursing.
impl fmt::Debug for SharedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedValue({:p})", Rc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_display_forms() {
        assert_eq!(Value::Null.to_display(), "null");
        assert_eq!(Value::from(true).to_display(), "true");
        assert_eq!(Value::from(42).to_display(), "42");
        assert_eq!(Value::from(2.5).to_display(), "2.5");
        assert_eq!(Value::from("plain text").to_display(), "plain text");
    }

    #[test]
    fn test_list_displays_as_json() {
        let list = Value::from(vec![Value::from(1), Value::from("two")]);
        assert_eq!(list.to_display(), r#"[1,"two"]"#);
    }

    #[test]
    fn test_object_like_detection() {
        assert!(Value::map().is_object_like());
        assert!(Value::shared(Value::map()).is_object_like());
        assert!(!Value::from("text").is_object_like());
        assert!(!Value::from(vec![Value::map()]).is_object_like());
    }

    #[test]
    fn test_shared_mutation_visible_through_clones() {
        let cell = SharedValue::new(Value::from(1));
        let alias = cell.clone();
        cell.set(Value::from(2));
        assert_eq!(alias.get().as_int(), Some(2));
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::json!({"name": "Ada", "tags": ["a", "b"], "age": 36});
        let value = Value::from_json(&json);
        assert_eq!(value.get("name").and_then(Value::as_str), Some("Ada"));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_serde_round_trip() {
        let value = Value::Map(
            [
                ("label".into(), Value::from("Save")),
                ("count".into(), Value::from(3)),
            ]
            .into_iter()
            .collect(),
        );
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"label":"Save","count":3}"#);

        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back.get("count").and_then(Value::as_int), Some(3));
    }

    #[test]
    fn test_cyclic_value_to_json_terminates() {
        let cell = SharedValue::new(Value::map());
        let mut entries = ValueMap::new();
        entries.insert("me".into(), Value::Shared(cell.clone()));
        cell.set(Value::Map(entries));

        let json = Value::Shared(cell).to_json();
        assert_eq!(json, serde_json::json!({"me": null}));
    }
}
