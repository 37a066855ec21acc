//! Identity tokens for live component instances.
//!
//! An identity names one mounted instance for its whole mounted lifetime.
//! Registry entries, store subscriptions and surface event bindings are all
//! keyed by it, so revoking an instance is a matter of dropping everything
//! filed under its identity.

use std::fmt;
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use compact_str::CompactString;
use uuid::Uuid;

use crate::hash;

/// Opaque token naming one mounted instance.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Identity(CompactString);

impl Identity {
    /// Wrap an externally produced token. Mostly useful in tests and for
    /// collaborators that key their own state by identity.
    pub fn from_raw(raw: impl Into<CompactString>) -> Self {
        Identity(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How fresh identities are minted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Random 32-hex token. Practically collision-free, so every mount gets
    /// a distinct registry entry.
    #[default]
    Random,
    /// 16-hex digest of the instance kind, its first canonical snapshot and
    /// a millisecond stamp. Two instances of the same kind created with
    /// identical props within one millisecond digest to the same identity
    /// and therefore land on the same registry entry.
    Digest,
}

/// Mints identities according to the configured strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMint {
    strategy: IdentityStrategy,
}

impl IdentityMint {
    pub fn new(strategy: IdentityStrategy) -> Self {
        IdentityMint { strategy }
    }

    pub fn strategy(&self) -> IdentityStrategy {
        self.strategy
    }

    /// Mint an identity for an instance of `kind` whose canonical snapshot
    /// is `snapshot`.
    pub fn issue(&self, kind: &str, snapshot: &str) -> Identity {
        match self.strategy {
            IdentityStrategy::Random => Identity(Uuid::new_v4().simple().to_string().into()),
            IdentityStrategy::Digest => self.issue_stamped(kind, snapshot, now_millis()),
        }
    }

    /// Digest-mint with an explicit stamp. Deterministic, regardless of the
    /// configured strategy.
    pub fn issue_stamped(&self, kind: &str, snapshot: &str, stamp: u64) -> Identity {
        let mut buf = String::with_capacity(kind.len() + snapshot.len() + 20);
        buf.push_str(kind);
        buf.push_str(snapshot);
        let _ = write!(buf, "{stamp}");
        Identity(hash::content_hash(&buf))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_identities_are_distinct() {
        let mint = IdentityMint::new(IdentityStrategy::Random);
        let a = mint.issue("Widget", "{}");
        let b = mint.issue("Widget", "{}");
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_stamped_digest_is_deterministic() {
        let mint = IdentityMint::new(IdentityStrategy::Digest);
        let a = mint.issue_stamped("Widget", r#"{"n":1}"#, 1_700_000_000_000);
        let b = mint.issue_stamped("Widget", r#"{"n":1}"#, 1_700_000_000_000);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_stamp_and_snapshot_change_the_digest() {
        let mint = IdentityMint::new(IdentityStrategy::Digest);
        let base = mint.issue_stamped("Widget", r#"{"n":1}"#, 1);
        assert_ne!(base, mint.issue_stamped("Widget", r#"{"n":2}"#, 1));
        assert_ne!(base, mint.issue_stamped("Widget", r#"{"n":1}"#, 2));
        assert_ne!(base, mint.issue_stamped("Gadget", r#"{"n":1}"#, 1));
    }
}
