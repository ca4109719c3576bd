use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bounds::BoundingBox;
use crate::cell::{Cell, FaceTag};
use crate::compute::SearchContext;
use crate::error::Result;
use crate::wall::Wall;

/// A computed cell together with the particle that generated it.
///
/// The cell's vertices are relative to `position`.
#[derive(Clone, Debug)]
pub struct CellReport<T: FaceTag = ()> {
    pub id: i32,
    pub position: [f64; 3],
    pub radius: f64,
    pub cell: Cell<T>,
}

impl<T: FaceTag> CellReport<T> {
    /// Centroid of the cell in global coordinates.
    pub fn centroid(&self) -> [f64; 3] {
        let c = self.cell.centroid();
        [c[0] + self.position[0], c[1] + self.position[1], c[2] + self.position[2]]
    }

    pub fn vertices_global(&self) -> Vec<[f64; 3]> {
        self.cell.vertices_global(self.position)
    }
}

/// Particle storage whose cells can be computed independently of each other.
pub trait ParticleContainer: Sync {
    fn total_particles(&self) -> usize;

    /// `(block, slot)` of every stored particle, in storage order.
    fn slots(&self) -> Vec<(usize, usize)>;

    /// Computes the cell of the particle at `slot`, using `ctx` as scratch space.
    fn compute_slot<T: FaceTag>(&self, ctx: &mut SearchContext, slot: (usize, usize)) -> Result<CellReport<T>>;
}

/// The cells of every particle of a container, computed in parallel.
#[derive(Clone, Debug)]
pub struct Tessellation<T: FaceTag = ()> {
    pub cells: Vec<CellReport<T>>,
}

impl<T: FaceTag> Tessellation<T> {
    /// Computes all cells of `container`, one search context per worker thread.
    ///
    /// Cells come back in storage order, independent of the number of threads.
    pub fn compute<C: ParticleContainer>(container: &C) -> Result<Self> {
        let slots = container.slots();
        debug!("tessellating {} particles", slots.len());
        let cells = slots
            .into_par_iter()
            .map_init(SearchContext::new, |ctx, slot| {
                container.compute_slot::<T>(ctx, slot).inspect_err(|e| {
                    warn!("cell of particle in block {} slot {} failed: {}", slot.0, slot.1, e);
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let tessellation = Self { cells };
        debug!(
            "tessellation finished: {} cells, {} empty",
            tessellation.cells.len(),
            tessellation.empty_cells()
        );
        Ok(tessellation)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CellReport<T>> {
        self.cells.get(index)
    }

    /// Looks a cell up by particle id.
    pub fn find(&self, id: i32) -> Option<&CellReport<T>> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Number of cells removed completely by walls.
    pub fn empty_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.cell.is_empty()).count()
    }

    pub fn total_volume(&self) -> f64 {
        self.cells.par_iter().map(|c| c.cell.volume()).sum()
    }

    /// Cell centroids in global coordinates, the particle position for empty cells.
    ///
    /// Feeding them back as particle positions performs one step of Lloyd relaxation.
    pub fn centroids(&self) -> Vec<(i32, [f64; 3])> {
        self.cells
            .par_iter()
            .map(|c| (c.id, if c.cell.is_empty() { c.position } else { c.centroid() }))
            .collect()
    }
}

/// Uniformly distributed points inside `bounds` and all `walls`.
///
/// Gives up after `1000 * count` attempts, so fewer points may be returned when the walls
/// enclose only a tiny fraction of the box.
pub fn random_points(bounds: &BoundingBox<3>, walls: &[Wall], count: usize, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let extent = bounds.extent();
    let mut points = Vec::with_capacity(count);
    let max_attempts = count.saturating_mul(1000);
    let mut attempts = 0;
    while points.len() < count && attempts < max_attempts {
        attempts += 1;
        let p = [
            bounds.min[0] + rng.r#gen::<f64>() * extent[0],
            bounds.min[1] + rng.r#gen::<f64>() * extent[1],
            bounds.min[2] + rng.r#gen::<f64>() * extent[2],
        ];
        if walls.iter().all(|w| w.contains(&p)) {
            points.push(p);
        }
    }
    if points.len() < count {
        warn!("placed {} of {} random points", points.len(), count);
    }
    points
}
