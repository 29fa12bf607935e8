//! # Workflows Module
//!
//! High-level bundles that chain engine tasks into the complete procedures a user runs.
//!
//! ## Overview
//!
//! Each workflow is constructed once from a structure and an explicit configuration, runs
//! every step eagerly, and then exposes the intermediate and final results through accessors.
//! Construction either succeeds with a consistent bundle or fails with an
//! [`EngineError`](crate::engine::error::EngineError); there are no partially built results.
//!
//! ## Architecture
//!
//! - **Slicing** ([`slice`]) - Re-expresses a primitive structure in a cell exposing a Miller
//!   plane, with one floored variant per basis site
//! - **Shifting** ([`shift`]) - Direct and Wigner–Seitz shift grids over a slab, their cleaved
//!   variants, and the cross-checked equivalence classes
//! - **Twisting** ([`twist`]) - Commensurate approximants of a twisted bilayer applied to a
//!   slab structure, down to the stacked bilayer

pub mod shift;
pub mod slice;
pub mod twist;
