pub mod geometries;

use crate::cell::{Cell, FaceTag};
use crate::error::Result;

/// The first id available for walls. Wall ids must be less than or equal to this value
/// to stay clear of non-negative particle ids and the six box side ids `-1..=-6`.
pub const WALL_ID_START: i32 = -7;

/// A clipping boundary for the tessellation.
///
/// A `Wall` wraps a [`WallGeometry`] and gives it an id, which neighbor-tracking cells
/// report for faces produced by the wall.
#[derive(Debug)]
pub struct Wall {
    id: i32,
    inner: Box<dyn WallGeometry>,
}

impl Wall {
    /// Creates a new `Wall` from a geometry.
    ///
    /// # Panics
    ///
    /// If `id` is greater than [`WALL_ID_START`].
    pub fn new(id: i32, geometry: Box<dyn WallGeometry>) -> Self {
        if id > WALL_ID_START {
            panic!("Wall ID must be <= {}", WALL_ID_START);
        }
        Self { id, inner: geometry }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn contains(&self, point: &[f64; 3]) -> bool {
        self.inner.contains(point)
    }

    pub fn cut(&self, generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3])) {
        self.inner.cut(generator, callback)
    }

    /// Clips a cell whose generator sits at `generator`.
    ///
    /// Returns `Ok(false)` if the wall removed the cell.
    pub fn apply<T: FaceTag>(&self, cell: &mut Cell<T>, generator: &[f64; 3]) -> Result<bool> {
        let mut outcome = Ok(true);
        let id = self.id;
        self.inner.cut(generator, &mut |point, normal| {
            if matches!(outcome, Ok(true)) {
                let rel = [point[0] - generator[0], point[1] - generator[1], point[2] - generator[2]];
                outcome = cell.cut_plane(rel, normal, id);
            }
        });
        outcome
    }
}

/// Geometry of a wall.
/// Must be Send + Sync so that containers holding walls can be shared between threads.
pub trait WallGeometry: Send + Sync + std::fmt::Debug {
    /// Checks if a point is inside the valid region defined by the wall.
    fn contains(&self, point: &[f64; 3]) -> bool;

    /// Calculates the clipping plane for a given generator as (point_on_plane, normal).
    /// The normal points OUT of the valid region. Generators for which no plane is
    /// defined (such as the center of a sphere) produce no callback.
    fn cut(&self, generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3]));
}
