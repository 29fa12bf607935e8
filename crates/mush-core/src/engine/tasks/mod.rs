//! The individual lattice-transformation algorithms.
//!
//! Each submodule is one step of a workflow: slicing a unit along a Miller plane, building
//! slabs, generating shift grids, classifying equivalent shifts, aligning and twisting a
//! lattice, constructing the exact moiré lattice, and approximating it commensurately.

pub mod alignment;
pub mod approximant;
pub mod commensurate;
pub mod equivalence;
pub mod moire;
pub mod shifting;
pub mod slab;
pub mod slicing;
