//! Persistent string maps backing the two store scopes.

use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

/// Key under which a store named `name` is persisted.
pub fn storage_key(name: &str) -> String {
    format!("maquette:{name}")
}

/// Minimal key/value persistence a store scope writes through to.
///
/// Writes are fire-and-forget. Implementations log failures instead of
/// surfacing them; the in-memory mirror stays authoritative either way.
pub trait PersistentMap {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str);
}

/// Map that lives and dies with the process.
///
/// The usual backing for session scope, and for both scopes in tests and
/// headless runs.
#[derive(Debug, Default)]
pub struct MemoryMap {
    entries: FxHashMap<String, String>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PersistentMap for MemoryMap {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// Map persisted as one file per key under a directory.
#[derive(Debug)]
pub struct DiskMap {
    dir: PathBuf,
}

impl DiskMap {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskMap { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys may carry separators; flatten them into a safe file name.
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl PersistentMap for DiskMap {
    fn get_item(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), %err, "cannot create persistence directory");
            return;
        }
        let path = self.path_for(key);
        if let Err(err) = fs::write(&path, value) {
            tracing::warn!(path = %path.display(), %err, "cannot persist store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_prefix() {
        assert_eq!(storage_key("user"), "maquette:user");
    }

    #[test]
    fn test_memory_map_round_trip() {
        let mut map = MemoryMap::new();
        assert_eq!(map.get_item("maquette:user"), None);
        map.set_item("maquette:user", "{}");
        assert_eq!(map.get_item("maquette:user").as_deref(), Some("{}"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_disk_map_round_trip() {
        let dir = std::env::temp_dir().join(format!("maquette-disk-map-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut map = DiskMap::new(&dir);
        assert_eq!(map.get_item("maquette:user"), None);
        map.set_item("maquette:user", r#"{"name":"Ada"}"#);

        let reopened = DiskMap::new(&dir);
        assert_eq!(reopened.get_item("maquette:user").as_deref(), Some(r#"{"name":"Ada"}"#));

        let _ = fs::remove_dir_all(&dir);
    }
}
