//! Template parsing failures.

use compact_str::CompactString;
use thiserror::Error;

/// Errors raised while substituting template tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token named a binding that is object-shaped but not a child
    /// declaration, so it can neither be spliced as text nor anchored.
    #[error("prop `{name}` is an object that is not a child declaration")]
    MalformedChildDeclaration { name: CompactString },
}
