/// Group of useful computations
pub mod computations;
mod direction;
pub mod indices;
mod keyed_vec;
/// Sorting algorithms
pub mod sort;
pub mod type_range;

pub use computations::*;
pub use direction::{Axis, Direction};
pub use indices::Index;
pub use keyed_vec::KeyedVec;
pub use sort::*;
pub use type_range::Types;
