pub mod rect;
pub use rect::Rect;

use rand::Rng;

/// A volume of space that atoms can be created in or tested against
pub trait Region {
    fn contains(&self, coord: &[f64; 3]) -> bool;
    fn bounding_box(&self) -> Rect;
    /// A uniformly distributed point inside the region
    fn random_coord<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3];
}
