//! Reserve - scoped keyed stores for the Maquette component runtime.
//!
//! # Name Origin
//!
//! The "réserve" is a museum's storage room: pieces live there between
//! exhibitions, catalogued and retrievable. This crate keeps the shared
//! state components exchange outside their prop trees: named JSON stores,
//! each bound at creation to a durable or session persistence scope, with
//! synchronous per-path update fan-out to subscribed instances.
//!
//! # Example
//!
//! ```
//! use maquette_reserve::{StoreHub, StoreScope, ALL_PATHS};
//! use maquette_socle::Identity;
//! use serde_json::json;
//!
//! let mut hub = StoreHub::in_memory();
//! hub.create_store("user", StoreScope::Session).unwrap();
//!
//! let badge = Identity::from_raw("badge-1");
//! hub.register_for_updates(&badge, "on_user_change", "user", ALL_PATHS);
//!
//! let mut fired = Vec::new();
//! hub.save("user", "name", json!("Ada"), &mut |update| fired.push(update)).unwrap();
//!
//! assert_eq!(fired.len(), 1);
//! assert_eq!(hub.load("user", Some("name")).unwrap(), json!("Ada"));
//! ```

pub mod error;
pub mod persist;
pub mod store;

pub use error::StoreError;
pub use persist::{storage_key, DiskMap, MemoryMap, PersistentMap};
pub use store::{StoreHub, StoreScope, StoreUpdate, Subscription, ALL_PATHS};
