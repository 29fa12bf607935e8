pub mod shift;
pub mod slice;
pub mod stack;
pub mod twist;
