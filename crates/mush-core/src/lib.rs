//! # MultiShifter Core Library
//!
//! A crystallographic lattice-transformation engine for generating families of periodic
//! structures: slabs sliced along arbitrary Miller planes, dense grids of shifted interfaces,
//! and twisted bilayers with commensurate moiré approximants.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Immutable value types (`Lattice`, `Structure`), integer and
//!   real linear-algebra helpers, superlattice construction and the structure matcher.
//!
//! - **[`engine`]: The Logic Core.** The transformation algorithms: plane slicing with
//!   unimodular basis improvement, shift grids and equivalence classification, alignment and
//!   twisting, exact moiré construction and the commensurate-approximant search.
//!
//! - **[`workflows`]: The Public API.** Bundles that chain engine tasks into the complete
//!   procedures a user runs: slicing a primitive structure, shifting a slab, and building
//!   twisted bilayer layers.
//!
//! The library never installs a logging subscriber; it only emits `tracing` events and spans.

pub mod core;
pub mod engine;
pub mod workflows;
