//! Socle - shared foundation for the Maquette component runtime.
//!
//! # Name Origin
//!
//! A "socle" is the plinth a maquette stands on. Every other crate in the
//! workspace rests on the types defined here: the dynamic prop [`Value`]
//! tree, the cycle-safe canonical [`snapshot`] writer used for change
//! detection, the instance [`Identity`] tokens, and the child slot
//! [`marker`] format shared by the template parser and the presentation
//! surface.
//!
//! # Example
//!
//! ```
//! use maquette_socle::{snapshot, IdentityMint, IdentityStrategy, Value};
//!
//! let props = Value::Map(
//!     [("label".into(), Value::from("Save"))].into_iter().collect(),
//! );
//! let text = snapshot::value_text(&props);
//! assert_eq!(text, r#"{"label":"Save"}"#);
//!
//! let mint = IdentityMint::new(IdentityStrategy::Digest);
//! let identity = mint.issue_stamped("Button", &text, 0);
//! assert_eq!(identity.as_str().len(), 16);
//! ```

pub mod hash;
pub mod identity;
pub mod marker;
pub mod snapshot;
pub mod value;

pub use hash::content_hash;
pub use identity::{Identity, IdentityMint, IdentityStrategy};
pub use marker::slot_marker;
pub use value::{SharedValue, Value, ValueMap};

// Re-export compact_str::CompactString for convenience
pub use compact_str::CompactString;

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};
