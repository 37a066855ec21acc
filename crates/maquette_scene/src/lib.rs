//! Scene - component lifecycle runtime for Maquette.
//!
//! # Name Origin
//!
//! The "scène" is the stage a maquette is presented on. This crate is
//! where the other pieces come together into a running component tree: a
//! [`Stage`] drives renders through the template parser, files every live
//! instance in its [`Registry`], reconciles declared children against
//! mounted ones, and delivers deferred lifecycle notices and store updates
//! to component hooks.
//!
//! # Example
//!
//! ```
//! use compact_str::CompactString;
//! use maquette_scene::{Blueprint, ChildDecls, Component, Props, Stage};
//! use maquette_toile::HeadlessSurface;
//!
//! struct Badge;
//!
//! impl Component for Badge {
//!     fn template(&self) -> CompactString {
//!         "<span>${label}</span>".into()
//!     }
//! }
//!
//! impl Blueprint for Badge {
//!     const KIND: &'static str = "Badge";
//!
//!     fn assemble(_props: Props, _children: ChildDecls) -> Self {
//!         Badge
//!     }
//! }
//!
//! let mut stage = Stage::new(HeadlessSurface::new());
//! let badge = stage
//!     .mount::<Badge>(Props::new().with("label", "New"), ChildDecls::new())
//!     .unwrap();
//! stage.flush().unwrap();
//! assert_eq!(stage.surface().root_content(), "<span>New</span>");
//!
//! stage.destroy(&badge);
//! assert!(stage.registry().is_empty());
//! ```

pub mod component;
pub mod error;
pub mod instance;
pub mod registry;
pub mod schedule;
pub mod snapshot;
pub mod stage;

pub use component::{
    Blueprint, Callback, ChildDecl, ChildDecls, ChildSlot, Component, Prop, Props, StoreEvent,
    SurfaceEvent,
};
pub use error::SceneError;
pub use instance::{Instance, Phase};
pub use registry::{Entry, Registry};
pub use schedule::{Notice, Schedule, Task};
pub use snapshot::instance_snapshot;
pub use stage::{Cx, Stage};
