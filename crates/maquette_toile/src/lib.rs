//! Toile - presentation surface contract for the Maquette component runtime.
//!
//! # Name Origin
//!
//! The "toile" is the canvas a work is realized on. The runtime composes
//! instances and markup; this crate defines the [`Surface`] trait it
//! paints through, plus a [`HeadlessSurface`] that records every stroke in
//! memory for tests and server-side runs.
//!
//! # Example
//!
//! ```
//! use maquette_toile::{HeadlessSurface, Surface};
//!
//! let mut surface = HeadlessSurface::new();
//! let card = surface.create_container("Card");
//! surface.set_content(card, "<div>[[#body]]</div>");
//!
//! let anchor = surface.place_slot_anchor(card, "body").unwrap();
//! let body = surface.create_container("Body");
//! surface.set_content(body, "<p>hello</p>");
//! surface.attach_to_anchor(anchor, body);
//!
//! assert_eq!(surface.content_of(card), "<div><p>hello</p></div>");
//! ```

pub mod headless;
pub mod surface;

pub use headless::{HeadlessSurface, Segment};
pub use surface::{AnchorId, BindingId, ContainerId, EventBinding, Surface};
