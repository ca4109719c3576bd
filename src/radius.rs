//! Plain Voronoi versus radical (power) distance.
//!
//! The driver works with squared distances. For the radical tessellation the bisector
//! between particles `i` and `j` at separation `d` sits where `|x|² - rᵢ² = |x - d|² - rⱼ²`,
//! which only shifts the plane offset and loosens the block pruning bounds by the largest
//! radius in the container.

/// Hooks used by the cell search to account for particle radii.
///
/// `mrs` always stands for four times the squared cell radius, the scale at which a
/// neighbor can still cut the cell.
pub trait RadiusPolicy: Default + Copy + Send + Sync {
    /// Prepares for computing the cell of a particle with radius `radius`.
    fn init(&mut self, radius: f64, max_radius: f64);

    /// Plane offset for a neighbor with squared separation `rs` and radius `r_j`.
    fn scale(&self, rs: f64, r_j: f64) -> f64;

    /// Plane offset if a neighbor at squared separation `rs` can reach the cell.
    fn scale_check(&self, rs: f64, r_j: f64, mrs: f64) -> Option<f64>;

    /// True if a block at squared distance `crs` is too far to affect the cell.
    fn ctest(&self, crs: f64, mrs: f64) -> bool;

    /// Stores the reference distance used by [`RadiusPolicy::cutoff`].
    fn prime(&mut self, rv: f64);

    /// Plane offset used when probing a block corner.
    fn cutoff(&self, lrs: f64) -> f64;

    /// Search radius for locating the cell containing a point.
    fn max_add(&self, rs: f64) -> f64;

    /// Distance measure minimized when locating the cell containing a point.
    fn current_sub(&self, rs: f64, r_j: f64) -> f64;
}

/// Ordinary Voronoi tessellation; radii are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mono;

impl RadiusPolicy for Mono {
    #[inline]
    fn init(&mut self, _radius: f64, _max_radius: f64) {}

    #[inline]
    fn scale(&self, rs: f64, _r_j: f64) -> f64 {
        rs
    }

    #[inline]
    fn scale_check(&self, rs: f64, _r_j: f64, mrs: f64) -> Option<f64> {
        (rs < mrs).then_some(rs)
    }

    #[inline]
    fn ctest(&self, crs: f64, mrs: f64) -> bool {
        crs > mrs
    }

    #[inline]
    fn prime(&mut self, _rv: f64) {}

    #[inline]
    fn cutoff(&self, lrs: f64) -> f64 {
        lrs
    }

    #[inline]
    fn max_add(&self, rs: f64) -> f64 {
        rs
    }

    #[inline]
    fn current_sub(&self, rs: f64, _r_j: f64) -> f64 {
        rs
    }
}

/// Radical (power) tessellation of particles with radii.
#[derive(Clone, Copy, Debug, Default)]
pub struct Poly {
    r_rad: f64,
    r_mul: f64,
    r_val: f64,
    max_rad_sq: f64,
}

impl RadiusPolicy for Poly {
    #[inline]
    fn init(&mut self, radius: f64, max_radius: f64) {
        self.max_rad_sq = max_radius * max_radius;
        self.r_rad = radius * radius;
        self.r_mul = self.r_rad - self.max_rad_sq;
    }

    #[inline]
    fn scale(&self, rs: f64, r_j: f64) -> f64 {
        rs + self.r_rad - r_j * r_j
    }

    #[inline]
    fn scale_check(&self, rs: f64, r_j: f64, mrs: f64) -> Option<f64> {
        let scaled = rs + self.r_rad - r_j * r_j;
        (scaled < (mrs * rs).sqrt()).then_some(scaled)
    }

    #[inline]
    fn ctest(&self, crs: f64, mrs: f64) -> bool {
        crs + self.r_mul > (mrs * crs).sqrt()
    }

    #[inline]
    fn prime(&mut self, rv: f64) {
        self.r_val = 1.0 + self.r_mul / rv;
    }

    #[inline]
    fn cutoff(&self, lrs: f64) -> f64 {
        lrs * self.r_val
    }

    #[inline]
    fn max_add(&self, rs: f64) -> f64 {
        rs + self.max_rad_sq
    }

    #[inline]
    fn current_sub(&self, rs: f64, r_j: f64) -> f64 {
        rs - r_j * r_j
    }
}
