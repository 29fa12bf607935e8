//! # Core Module
//!
//! Fundamental value types and numerical primitives shared by every transformation in
//! MultiShifter.
//!
//! ## Overview
//!
//! Every algorithm in the engine consumes and produces plain lattices, integer matrices and
//! structures. This module defines those values together with the small set of numerical
//! operations they need: tolerant comparisons, integer-matrix arithmetic, basis reduction,
//! Voronoi folding and polar decomposition.
//!
//! ## Architecture
//!
//! - **Value Types** ([`models`]) - `Lattice` and `Structure`
//! - **Superlattices** ([`superlattice`]) - Integer transformations between tiling units and supercells
//! - **Structure Comparison** ([`matching`]) - Periodic equality of structures under point operations
//! - **Numerics** ([`utils`]) - Named tolerances, integer matrices, geometry and Voronoi folding

pub mod matching;
pub mod models;
pub mod superlattice;
pub mod utils;
