//! Child slot markers embedded in rendered markup.
//!
//! The template parser replaces a child token with a plain text marker; the
//! presentation surface later swaps the first occurrence of that marker for
//! a real anchor node. Keeping the format here lets both sides agree on it
//! without depending on each other.

/// Opens a slot marker. Followed by the slot name.
pub const MARKER_OPEN: &str = "[[#";

/// Closes a slot marker.
pub const MARKER_CLOSE: &str = "]]";

/// The exact marker text emitted for slot `name`.
pub fn slot_marker(name: &str) -> String {
    let mut marker = String::with_capacity(MARKER_OPEN.len() + name.len() + MARKER_CLOSE.len());
    marker.push_str(MARKER_OPEN);
    marker.push_str(name);
    marker.push_str(MARKER_CLOSE);
    marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_format() {
        assert_eq!(slot_marker("header"), "[[#header]]");
        assert_eq!(slot_marker(""), "[[#]]");
    }
}
