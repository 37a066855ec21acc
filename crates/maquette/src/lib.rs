//! # Maquette
//!
//! Reactive string-template component runtime written in Rust.
//!
//! This crate re-exports all Maquette sub-crates for unified documentation.
//!
//! ## Crates
//!
//! - [`socle`] - Shared foundation: prop values, snapshots, identities
//! - [`gabarit`] - String template parsing and token substitution
//! - [`reserve`] - Keyed stores with scoped persistence and fan-out
//! - [`toile`] - Presentation surface contract and headless surface
//! - [`scene`] - Component lifecycle runtime

/// Shared foundation: prop values, snapshots, identities.
pub use maquette_socle as socle;

/// String template parsing and token substitution.
pub use maquette_gabarit as gabarit;

/// Keyed stores with scoped persistence and fan-out.
pub use maquette_reserve as reserve;

/// Presentation surface contract and headless surface.
pub use maquette_toile as toile;

/// Component lifecycle runtime.
pub use maquette_scene as scene;
