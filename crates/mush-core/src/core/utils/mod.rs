pub mod geometry;
pub mod integer;
pub mod tolerance;
pub mod voronoi;
