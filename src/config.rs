//! Tolerances, initial buffer sizes and hard ceilings.
//!
//! A [`Config`] is copied into every container and cell. All buffers start at their `init_*`
//! size, double when full and fail with [`VoroError::Memory`] once they would pass the
//! matching `max_*` ceiling.

use crate::bounds::BoundingBox;
use crate::error::{Result, VoroError};

/// Average number of particles per block targeted by [`optimal_grid`].
pub const PARTICLES_PER_BLOCK: f64 = 5.6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Plane test tolerance relative to the squared domain length scale.
    pub tolerance: f64,
    /// Multiplier applied to the tolerance for the wide band used by the degenerate searches.
    pub big_tolerance_fac: f64,
    pub init_vertices: usize,
    pub init_delete_size: usize,
    pub init_delete2_size: usize,
    pub init_xse_size: usize,
    pub init_wall_size: usize,
    pub init_particle_memory: usize,
    pub max_vertices: usize,
    pub max_vertex_order: usize,
    pub max_n_vertices: usize,
    pub max_delete_size: usize,
    pub max_delete2_size: usize,
    pub max_xse_size: usize,
    pub max_particle_memory: usize,
    pub max_list_memory: usize,
    pub max_unit_voro_shells: usize,
    /// Squared separation below which two inserted particles count as coincident.
    pub duplicate_tolerance_sq: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: 1e-11,
            big_tolerance_fac: 1024.0,
            init_vertices: 256,
            init_delete_size: 256,
            init_delete2_size: 256,
            init_xse_size: 256,
            init_wall_size: 32,
            init_particle_memory: 8,
            max_vertices: 16_777_216,
            max_vertex_order: 2048,
            max_n_vertices: 16_777_216,
            max_delete_size: 16_777_216,
            max_delete2_size: 16_777_216,
            max_xse_size: 16_777_216,
            max_particle_memory: 16_777_216,
            max_list_memory: 16_777_216,
            max_unit_voro_shells: 10,
            duplicate_tolerance_sq: 1e-10,
        }
    }
}

impl Config {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_duplicate_tolerance_sq(mut self, duplicate_tolerance_sq: f64) -> Self {
        self.duplicate_tolerance_sq = duplicate_tolerance_sq;
        self
    }

    pub fn with_init_particle_memory(mut self, init_particle_memory: usize) -> Self {
        self.init_particle_memory = init_particle_memory.max(1);
        self
    }

    pub fn with_max_particle_memory(mut self, max_particle_memory: usize) -> Self {
        self.max_particle_memory = max_particle_memory;
        self
    }

    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }

    pub fn with_max_vertex_order(mut self, max_vertex_order: usize) -> Self {
        self.max_vertex_order = max_vertex_order;
        self
    }

    pub fn with_max_list_memory(mut self, max_list_memory: usize) -> Self {
        self.max_list_memory = max_list_memory;
        self
    }

    pub fn with_max_unit_voro_shells(mut self, shells: usize) -> Self {
        self.max_unit_voro_shells = shells;
        self
    }
}

/// Doubles `current` for a buffer named `what`, failing once the ceiling would be passed.
pub(crate) fn grow(what: &'static str, current: usize, limit: usize) -> Result<usize> {
    let next = (current.max(1)) << 1;
    if current >= limit {
        return Err(VoroError::Memory { what, limit });
    }
    let next = next.min(limit);
    log::debug!("{} memory scaled up to {}", what, next);
    Ok(next)
}

/// Chooses a block count per axis so that the blocks hold about [`PARTICLES_PER_BLOCK`]
/// particles on average.
///
/// # Arguments
///
/// * `bounds` - The domain.
/// * `n_particles` - The expected number of particles.
pub fn optimal_grid(bounds: &BoundingBox<3>, n_particles: usize) -> [usize; 3] {
    let extent = [
        bounds.max[0] - bounds.min[0],
        bounds.max[1] - bounds.min[1],
        bounds.max[2] - bounds.min[2],
    ];
    let volume = extent[0] * extent[1] * extent[2];
    if n_particles == 0 || volume <= 0.0 {
        return [1, 1, 1];
    }
    let ilscale = (n_particles as f64 / (PARTICLES_PER_BLOCK * volume)).cbrt();
    grid_from_inverse_length(extent, ilscale)
}

/// Chooses a block count per axis from a typical particle spacing.
pub fn grid_from_length_scale(bounds: &BoundingBox<3>, length_scale: f64) -> [usize; 3] {
    let extent = [
        bounds.max[0] - bounds.min[0],
        bounds.max[1] - bounds.min[1],
        bounds.max[2] - bounds.min[2],
    ];
    if length_scale <= 0.0 {
        return [1, 1, 1];
    }
    grid_from_inverse_length(extent, 1.0 / length_scale)
}

fn grid_from_inverse_length(extent: [f64; 3], ilscale: f64) -> [usize; 3] {
    let mut n = [1usize; 3];
    for axis in 0..3 {
        let blocks = (extent[axis] * ilscale + 1.0).floor();
        n[axis] = if blocks.is_finite() && blocks >= 1.0 { blocks as usize } else { 1 };
    }
    n
}
