//! Byte-level scanning for `${name}` substitution tokens.
//!
//! A token opens with `$` immediately followed by `{` and closes at the
//! first `}` after it. The name between the braces is any run of bytes
//! other than `}`, which means tokens never nest. Text with no closing
//! brace ahead is literal, so an unterminated `$...{` survives parsing
//! untouched.

use memchr::memchr;

/// One substitution token found in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'t> {
    /// Byte offset of the opening `$`.
    pub start: usize,
    /// Byte offset just past the closing `}`.
    pub end: usize,
    /// Name between the braces. May be empty.
    pub name: &'t str,
}

/// Iterator over the tokens of `template`, left to right.
pub fn scan(template: &str) -> Tokens<'_> {
    Tokens { template, pos: 0 }
}

pub struct Tokens<'t> {
    template: &'t str,
    pos: usize,
}

impl<'t> Iterator for Tokens<'t> {
    type Item = Token<'t>;

    fn next(&mut self) -> Option<Token<'t>> {
        let bytes = self.template.as_bytes();
        while self.pos < bytes.len() {
            let Some(dollar_offset) = memchr(b'$', &bytes[self.pos..]) else {
                self.pos = bytes.len();
                return None;
            };
            let dollar = self.pos + dollar_offset;
            if dollar + 1 >= bytes.len() || bytes[dollar + 1] != b'{' {
                // Bare dollar sign, keep looking.
                self.pos = dollar + 1;
                continue;
            }
            let Some(close_offset) = memchr(b'}', &bytes[dollar + 2..]) else {
                // No closing brace anywhere ahead: the rest is literal.
                self.pos = bytes.len();
                return None;
            };
            let close = dollar + 2 + close_offset;
            self.pos = close + 1;
            return Some(Token {
                start: dollar,
                end: close + 1,
                name: &self.template[dollar + 2..close],
            });
        }
        None
    }
}
