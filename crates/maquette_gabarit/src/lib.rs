//! Gabarit - template token parser for the Maquette component runtime.
//!
//! # Name Origin
//!
//! A "gabarit" is the stencil or template a modelmaker cuts against. This
//! crate turns a component's template string into final markup by
//! substituting `${name}` tokens from a binding source, in four passes:
//!
//! ```text
//!  template ──► pass 1 ──► pass 2 ──► pass 3 ──► pass 4 ──► markup
//!              functions   scalars    children    sweep
//!              (invoke)    (splice)   (markers)   (delete)
//! ```
//!
//! Each pass re-scans the text the previous pass produced, so a
//! substitution can hand tokens to later passes but never re-trigger an
//! earlier one. After the sweep no `${...}` token remains.
//!
//! # Example
//!
//! ```
//! use compact_str::CompactString;
//! use maquette_gabarit::{parse, Bindings, TokenClass};
//!
//! struct Greeter;
//!
//! impl Bindings for Greeter {
//!     fn classify(&self, name: &str) -> TokenClass {
//!         match name {
//!             "name" => TokenClass::Scalar,
//!             "slot" => TokenClass::ChildSlot,
//!             _ => TokenClass::Missing,
//!         }
//!     }
//!     fn invoke(&mut self, _name: &str) -> Option<CompactString> {
//!         None
//!     }
//!     fn scalar(&self, _name: &str) -> CompactString {
//!         "Ada".into()
//!     }
//! }
//!
//! let parsed = parse("<p>Hi ${name}</p>${slot}${typo}", &mut Greeter).unwrap();
//! assert_eq!(parsed.markup, "<p>Hi Ada</p>[[#slot]]");
//! assert_eq!(parsed.used_slots, vec!["slot"]);
//! ```

pub mod error;
pub mod parser;
pub mod scanner;

pub use error::ParseError;
pub use parser::{parse, Bindings, ParsedTemplate, TokenClass};
pub use scanner::{scan, Token};
