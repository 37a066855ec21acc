//! Scoped keyed stores with subscriber fan-out.
//!
//! A [`StoreHub`] holds every store of one runtime. Each store is a JSON
//! object mirror that is rewritten through its persistence scope on every
//! save, plus a list of update subscriptions. Subscription bookkeeping is
//! kept apart from the stores themselves so a component may register for
//! updates before the store it watches has been created.
//!
//! Fan-out is synchronous and caller-driven: writes hand one
//! [`StoreUpdate`] per matching subscription to the sink closure, in
//! registration order, and the caller decides how to deliver them.

use compact_str::CompactString;
use maquette_socle::Identity;
use rustc_hash::FxHashMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::StoreError;
use crate::persist::{storage_key, MemoryMap, PersistentMap};

/// Subscription path that matches every write to its store.
pub const ALL_PATHS: &str = "all";

/// Longevity of a store's persisted copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreScope {
    /// Survives process restarts.
    Durable,
    /// Dropped when the session's map is dropped.
    Session,
}

impl std::fmt::Display for StoreScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreScope::Durable => "durable",
            StoreScope::Session => "session",
        })
    }
}

/// One registered update subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Instance the update is delivered to.
    pub owner: Identity,
    /// Hook name the owner asked to have invoked.
    pub callback: CompactString,
    /// Watched path, or [`ALL_PATHS`].
    pub path: CompactString,
}

/// Notification produced by a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreUpdate {
    pub store: CompactString,
    /// The subscription's registered path. Subscribers on [`ALL_PATHS`] see
    /// the sentinel, not the concrete written path.
    pub path: CompactString,
    pub owner: Identity,
    pub callback: CompactString,
}

struct Store {
    scope: StoreScope,
    /// Always a JSON object.
    mirror: JsonValue,
}

/// All stores of one runtime, written through two persistence scopes.
pub struct StoreHub {
    stores: FxHashMap<CompactString, Store>,
    subscribers: FxHashMap<CompactString, Vec<Subscription>>,
    durable: Box<dyn PersistentMap>,
    session: Box<dyn PersistentMap>,
}

impl StoreHub {
    pub fn new(durable: Box<dyn PersistentMap>, session: Box<dyn PersistentMap>) -> Self {
        StoreHub {
            stores: FxHashMap::default(),
            subscribers: FxHashMap::default(),
            durable,
            session,
        }
    }

    /// Hub with both scopes held in memory. The usual choice for tests and
    /// headless runs.
    pub fn in_memory() -> Self {
        StoreHub::new(Box::new(MemoryMap::new()), Box::new(MemoryMap::new()))
    }

    /// Create (or re-open) the store `name` under `scope`.
    ///
    /// A persisted copy is loaded if the scope's map has one, otherwise the
    /// store starts as an empty object which is persisted immediately.
    /// Re-creating an existing store with its own scope is a no-op;
    /// re-creating it under the other scope is rejected.
    pub fn create_store(&mut self, name: &str, scope: StoreScope) -> Result<(), StoreError> {
        if let Some(existing) = self.stores.get(name) {
            if existing.scope == scope {
                return Ok(());
            }
            return Err(StoreError::ScopeMismatch {
                name: name.into(),
                existing: existing.scope,
                requested: scope,
            });
        }

        let key = storage_key(name);
        let mirror = match self.scope_map_mut(scope).get_item(&key) {
            Some(raw) => match serde_json::from_str::<JsonValue>(&raw) {
                Ok(persisted @ JsonValue::Object(_)) => persisted,
                Ok(_) | Err(_) => {
                    tracing::warn!(store = name, "discarding unreadable persisted copy");
                    JsonValue::Object(JsonMap::new())
                }
            },
            None => JsonValue::Object(JsonMap::new()),
        };
        let raw = mirror.to_string();
        self.scope_map_mut(scope).set_item(&key, &raw);

        tracing::debug!(store = name, %scope, "store created");
        self.stores.insert(name.into(), Store { scope, mirror });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn scope_of(&self, name: &str) -> Option<StoreScope> {
        self.stores.get(name).map(|store| store.scope)
    }

    /// Read the whole mirror (`path` `None`) or one dotted path. Missing
    /// paths read as `null`.
    pub fn load(&self, name: &str, path: Option<&str>) -> Result<JsonValue, StoreError> {
        let store = self.lookup(name)?;
        match path {
            None => Ok(store.mirror.clone()),
            Some(path) => Ok(read_path(&store.mirror, path).cloned().unwrap_or(JsonValue::Null)),
        }
    }

    /// Subscribe `owner` to writes on `path` of store `name`, to be
    /// delivered through the hook called `callback`. Duplicate
    /// registrations collapse into one. The store need not exist yet.
    pub fn register_for_updates(&mut self, owner: &Identity, callback: &str, name: &str, path: &str) {
        let subscription = Subscription {
            owner: owner.clone(),
            callback: callback.into(),
            path: path.into(),
        };
        let subscribers = self.subscribers.entry(name.into()).or_default();
        if !subscribers.contains(&subscription) {
            tracing::trace!(store = name, owner = %subscription.owner, path = %subscription.path, "subscription added");
            subscribers.push(subscription);
        }
    }

    /// Drop every subscription owned by `owner`, across all stores.
    pub fn unregister(&mut self, owner: &Identity) {
        for subscribers in self.subscribers.values_mut() {
            subscribers.retain(|subscription| subscription.owner != *owner);
        }
    }

    /// True if any store still has a subscription owned by `owner`.
    pub fn is_subscribed(&self, owner: &Identity) -> bool {
        self.subscribers
            .values()
            .any(|subscribers| subscribers.iter().any(|subscription| subscription.owner == *owner))
    }

    /// Subscriptions of store `name` in registration order.
    pub fn subscriptions(&self, name: &str) -> &[Subscription] {
        self.subscribers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deep-merge `value` into `path`, persist the whole mirror, then hand
    /// one update per matching subscription to `sink` in registration
    /// order. Objects merge entry by entry; everything else, arrays
    /// included, is replaced wholesale.
    pub fn save(
        &mut self,
        name: &str,
        path: &str,
        value: JsonValue,
        sink: &mut dyn FnMut(StoreUpdate),
    ) -> Result<(), StoreError> {
        self.write(name, path, value)?;
        self.persist(name);
        self.notify(name, std::slice::from_ref(&CompactString::from(path)), sink);
        Ok(())
    }

    /// Batched [`save`](Self::save): merge every entry, persist once, then
    /// fan out. Path subscribers get one update per matching entry;
    /// [`ALL_PATHS`] subscribers get at most one update for the batch.
    pub fn save_many(
        &mut self,
        name: &str,
        entries: Vec<(CompactString, JsonValue)>,
        sink: &mut dyn FnMut(StoreUpdate),
    ) -> Result<(), StoreError> {
        let mut written = Vec::with_capacity(entries.len());
        for (path, value) in entries {
            self.write(name, &path, value)?;
            written.push(path);
        }
        self.persist(name);
        self.notify(name, &written, sink);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Store, StoreError> {
        self.stores.get(name).ok_or_else(|| StoreError::NotInitialized { name: name.into() })
    }

    fn write(&mut self, name: &str, path: &str, value: JsonValue) -> Result<(), StoreError> {
        let store = self
            .stores
            .get_mut(name)
            .ok_or_else(|| StoreError::NotInitialized { name: name.into() })?;
        let slot = dig_path(&mut store.mirror, path)?;
        deep_merge(slot, value);
        tracing::trace!(store = name, path, "store written");
        Ok(())
    }

    fn persist(&mut self, name: &str) {
        let Some(store) = self.stores.get(name) else { return };
        let scope = store.scope;
        let raw = store.mirror.to_string();
        let key = storage_key(name);
        self.scope_map_mut(scope).set_item(&key, &raw);
    }

    fn notify(&self, name: &str, written: &[CompactString], sink: &mut dyn FnMut(StoreUpdate)) {
        let Some(subscribers) = self.subscribers.get(name) else { return };
        for subscription in subscribers {
            if subscription.path == ALL_PATHS {
                if !written.is_empty() {
                    sink(self.update_for(name, subscription));
                }
            } else {
                for path in written {
                    if *path == subscription.path {
                        sink(self.update_for(name, subscription));
                    }
                }
            }
        }
    }

    fn update_for(&self, name: &str, subscription: &Subscription) -> StoreUpdate {
        StoreUpdate {
            store: name.into(),
            path: subscription.path.clone(),
            owner: subscription.owner.clone(),
            callback: subscription.callback.clone(),
        }
    }

    fn scope_map_mut(&mut self, scope: StoreScope) -> &mut dyn PersistentMap {
        match scope {
            StoreScope::Durable => self.durable.as_mut(),
            StoreScope::Session => self.session.as_mut(),
        }
    }
}

/// Merge `source` into `target`. Object entries merge recursively; any
/// other pairing replaces the target slot.
fn deep_merge(target: &mut JsonValue, source: JsonValue) {
    match (target, source) {
        (JsonValue::Object(target_entries), JsonValue::Object(source_entries)) => {
            for (key, value) in source_entries {
                match target_entries.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        target_entries.insert(key, value);
                    }
                }
            }
        }
        (slot, source) => *slot = source,
    }
}

/// Mutable slot for a dotted path, creating empty objects along the way.
/// Traversing through an existing non-object slot is an error.
fn dig_path<'a>(root: &'a mut JsonValue, path: &str) -> Result<&'a mut JsonValue, StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath { path: path.into() });
    }
    let mut slot = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath { path: path.into() });
        }
        let entries = match slot {
            JsonValue::Object(entries) => entries,
            _ => return Err(StoreError::InvalidPath { path: path.into() }),
        };
        slot = entries
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(JsonMap::new()));
    }
    Ok(slot)
}

fn read_path<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut slot = root;
    for segment in path.split('.') {
        slot = slot.as_object()?.get(segment)?;
    }
    Some(slot)
}
