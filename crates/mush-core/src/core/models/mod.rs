pub mod lattice;
pub mod structure;
