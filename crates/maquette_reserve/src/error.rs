//! Store failures.

use compact_str::CompactString;
use thiserror::Error;

use crate::store::StoreScope;

/// Errors raised by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A store was read or written before `create_store` ran for it.
    #[error("store `{name}` was used before being created")]
    NotInitialized { name: CompactString },

    /// A store was re-created under a different scope than it already has.
    #[error("store `{name}` already exists with {existing} scope, requested {requested}")]
    ScopeMismatch {
        name: CompactString,
        existing: StoreScope,
        requested: StoreScope,
    },

    /// A write path traversed through a slot that is not an object.
    #[error("store path `{path}` does not address an object slot")]
    InvalidPath { path: CompactString },
}
