//! # Engine Module
//!
//! The lattice-transformation algorithms of MultiShifter.
//!
//! ## Overview
//!
//! Every operation in this module is a pure, synchronous function of plain geometric values:
//! lattices, structures, integer matrices, Miller indices, angles and grid densities. Nothing
//! here touches files or installs a logger; progress is reported through `tracing` spans and
//! an optional [`progress::ProgressReporter`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Explicit per-run settings for slicing, shifting, twisting and matching
//! - **Error Handling** ([`error`]) - Invalid input, exhausted searches and broken invariants
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events for long expansions
//! - **Tasks** ([`tasks`]) - The individual algorithms
//!
//! ## Key Capabilities
//!
//! - **Plane slicing** with a greedy unimodular search for the most orthogonal ab basis
//! - **Shift grids** in direct and Wigner–Seitz form with equivalence classification
//! - **Moiré construction** from the folded reciprocal difference of a twisted bilayer
//! - **Commensurate approximants** with bounded integer searches and deformation reports

pub mod config;
pub mod error;
pub mod progress;
pub mod tasks;
