//! Runtime failures.

use compact_str::CompactString;
use maquette_gabarit::ParseError;
use maquette_reserve::StoreError;
use maquette_socle::Identity;
use thiserror::Error;

/// Errors raised by stage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// Template substitution failed; the failing instance was not mounted
    /// and its already-mounted ancestors keep the state they had.
    #[error(transparent)]
    Template(#[from] ParseError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A caller handed an operation an argument it cannot work with.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: CompactString },

    /// An operation addressed an identity with no live registry entry.
    #[error("no live instance is registered under `{identity}`")]
    UnknownIdentity { identity: Identity },
}
