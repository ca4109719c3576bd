use super::WallGeometry;

#[inline]
fn normalized(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 { [0.0, 0.0, 1.0] } else { [v[0] / len, v[1] / len, v[2] / len] }
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Splits `point - origin` into its length along `axis` (unit) and the perpendicular remainder.
#[inline]
fn split_axis(point: &[f64; 3], origin: [f64; 3], axis: [f64; 3]) -> (f64, [f64; 3]) {
    let d = [point[0] - origin[0], point[1] - origin[1], point[2] - origin[2]];
    let h = dot(d, axis);
    (h, [d[0] - h * axis[0], d[1] - h * axis[1], d[2] - h * axis[2]])
}

/// A wall defined by a plane.
///
/// The plane partitions space into two regions: valid (inside) and invalid (outside).
/// The normal vector points towards the valid region.
#[derive(Debug)]
pub struct PlaneGeometry {
    /// A point on the plane.
    pub point: [f64; 3],
    /// The unit normal of the plane, pointing towards the valid region.
    pub normal: [f64; 3],
}

impl PlaneGeometry {
    /// Creates a new `PlaneGeometry`.
    ///
    /// # Arguments
    ///
    /// * `point` - A point on the plane.
    /// * `normal` - The normal vector of the plane, pointing towards the valid region.
    ///              It will be normalized.
    pub fn new(point: [f64; 3], normal: [f64; 3]) -> Self {
        Self { point, normal: normalized(normal) }
    }
}

impl WallGeometry for PlaneGeometry {
    fn contains(&self, point: &[f64; 3]) -> bool {
        let d = [point[0] - self.point[0], point[1] - self.point[1], point[2] - self.point[2]];
        dot(d, self.normal) >= 0.0
    }

    fn cut(&self, _generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3])) {
        callback(self.point, [-self.normal[0], -self.normal[1], -self.normal[2]]);
    }
}

/// A wall defined by a sphere.
///
/// The valid region is inside the sphere. Cells are clipped by the tangent plane at the
/// surface point closest to their generator.
#[derive(Debug)]
pub struct SphereGeometry {
    pub center: [f64; 3],
    pub radius: f64,
}

impl SphereGeometry {
    /// Creates a new `SphereGeometry`.
    ///
    /// # Arguments
    ///
    /// * `center` - The center of the sphere.
    /// * `radius` - The radius of the sphere.
    pub fn new(center: [f64; 3], radius: f64) -> Self {
        Self { center, radius }
    }
}

impl WallGeometry for SphereGeometry {
    fn contains(&self, point: &[f64; 3]) -> bool {
        let d = [point[0] - self.center[0], point[1] - self.center[1], point[2] - self.center[2]];
        dot(d, d) <= self.radius * self.radius
    }

    fn cut(&self, generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3])) {
        let d = [generator[0] - self.center[0], generator[1] - self.center[1], generator[2] - self.center[2]];
        let dist = dot(d, d).sqrt();
        if dist == 0.0 {
            return;
        }
        let n = [d[0] / dist, d[1] / dist, d[2] / dist];
        let surface = [
            self.center[0] + n[0] * self.radius,
            self.center[1] + n[1] * self.radius,
            self.center[2] + n[2] * self.radius,
        ];
        callback(surface, n);
    }
}

/// A wall defined by an infinite cylinder.
///
/// The valid region is inside the cylinder.
#[derive(Debug)]
pub struct CylinderGeometry {
    /// A point on the cylinder's axis.
    pub center: [f64; 3],
    /// The unit direction of the cylinder's axis.
    pub axis: [f64; 3],
    pub radius: f64,
}

impl CylinderGeometry {
    /// Creates a new `CylinderGeometry`.
    ///
    /// # Arguments
    ///
    /// * `center` - A point on the cylinder's axis.
    /// * `axis` - The direction of the cylinder's axis. It will be normalized.
    /// * `radius` - The radius of the cylinder.
    pub fn new(center: [f64; 3], axis: [f64; 3], radius: f64) -> Self {
        Self { center, axis: normalized(axis), radius }
    }
}

impl WallGeometry for CylinderGeometry {
    fn contains(&self, point: &[f64; 3]) -> bool {
        let (_, perp) = split_axis(point, self.center, self.axis);
        dot(perp, perp) <= self.radius * self.radius
    }

    fn cut(&self, generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3])) {
        let (h, perp) = split_axis(generator, self.center, self.axis);
        let dist = dot(perp, perp).sqrt();
        if dist == 0.0 {
            return;
        }
        let n = [perp[0] / dist, perp[1] / dist, perp[2] / dist];
        let surface = [
            self.center[0] + h * self.axis[0] + n[0] * self.radius,
            self.center[1] + h * self.axis[1] + n[1] * self.radius,
            self.center[2] + h * self.axis[2] + n[2] * self.radius,
        ];
        callback(surface, n);
    }
}

/// A wall defined by an infinite single cone.
///
/// The valid region is inside the cone. The clipping plane is the tangent plane along the
/// cone line in the generator's azimuth, which always passes through the apex.
#[derive(Debug)]
pub struct ConeGeometry {
    /// The apex of the cone.
    pub tip: [f64; 3],
    /// The unit direction of the cone's axis, pointing into the cone.
    pub axis: [f64; 3],
    /// The half-angle of the cone in radians.
    pub angle: f64,
}

impl ConeGeometry {
    /// Creates a new `ConeGeometry`.
    ///
    /// # Arguments
    ///
    /// * `tip` - The apex of the cone.
    /// * `axis` - The direction of the cone's axis. It will be normalized.
    /// * `angle` - The half-angle of the cone in radians.
    pub fn new(tip: [f64; 3], axis: [f64; 3], angle: f64) -> Self {
        Self { tip, axis: normalized(axis), angle }
    }
}

impl WallGeometry for ConeGeometry {
    fn contains(&self, point: &[f64; 3]) -> bool {
        let (h, perp) = split_axis(point, self.tip, self.axis);
        if h < 0.0 {
            return false;
        }
        let r = h * self.angle.tan();
        dot(perp, perp) < r * r
    }

    fn cut(&self, generator: &[f64; 3], callback: &mut dyn FnMut([f64; 3], [f64; 3])) {
        let (_, perp) = split_axis(generator, self.tip, self.axis);
        let dist = dot(perp, perp).sqrt();
        if dist == 0.0 {
            return;
        }
        let (sin_a, cos_a) = self.angle.sin_cos();
        let n = [
            cos_a * perp[0] / dist - sin_a * self.axis[0],
            cos_a * perp[1] / dist - sin_a * self.axis[1],
            cos_a * perp[2] / dist - sin_a * self.axis[2],
        ];
        callback(self.tip, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::NeighborCell;
    use crate::config::Config;
    use crate::wall::Wall;

    fn planes(g: &dyn WallGeometry, generator: [f64; 3]) -> Vec<([f64; 3], [f64; 3])> {
        let mut out = Vec::new();
        g.cut(&generator, &mut |p, n| out.push((p, n)));
        out
    }

    #[test]
    fn test_plane_contains_and_cut() {
        let g = PlaneGeometry::new([0.0, 0.0, 1.0], [0.0, 0.0, -2.0]);
        assert!(g.contains(&[5.0, 5.0, 0.0]));
        assert!(!g.contains(&[0.0, 0.0, 2.0]));
        let cut = planes(&g, [0.0; 3]);
        assert_eq!(cut, vec![([0.0, 0.0, 1.0], [0.0, 0.0, 1.0])]);
    }

    #[test]
    fn test_sphere_tangent_plane() {
        let g = SphereGeometry::new([0.0; 3], 2.0);
        let cut = planes(&g, [1.0, 0.0, 0.0]);
        assert_eq!(cut, vec![([2.0, 0.0, 0.0], [1.0, 0.0, 0.0])]);
        assert!(planes(&g, [0.0; 3]).is_empty());
    }

    #[test]
    fn test_cylinder_and_cone_contains() {
        let c = CylinderGeometry::new([0.0; 3], [0.0, 0.0, 3.0], 1.0);
        assert!(c.contains(&[0.5, 0.5, 100.0]));
        assert!(!c.contains(&[1.0, 0.5, 0.0]));
        let k = ConeGeometry::new([0.0; 3], [0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_4);
        assert!(k.contains(&[0.5, 0.0, 1.0]));
        assert!(!k.contains(&[0.5, 0.0, -1.0]));
        assert!(!k.contains(&[1.5, 0.0, 1.0]));
    }

    #[test]
    fn test_cone_plane_passes_through_generator_side() {
        let k = ConeGeometry::new([0.0; 3], [0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_4);
        let cut = planes(&k, [0.5, 0.0, 2.0]);
        let (p, n) = cut[0];
        assert_eq!(p, [0.0; 3]);
        // the surface line x = z lies in the plane
        assert!((n[0] * 1.0 + n[2] * 1.0).abs() < 1e-12);
        assert!(n[0] > 0.0);
    }

    #[test]
    fn test_wall_apply_tags_face() {
        let mut cell = NeighborCell::new_box([-1.0; 3], [1.0; 3], Config::default());
        let wall = Wall::new(-20, Box::new(PlaneGeometry::new([0.5, 0.0, 0.0], [-1.0, 0.0, 0.0])));
        assert!(wall.apply(&mut cell, &[0.0; 3]).unwrap());
        assert!((cell.volume() - 6.0).abs() < 1e-12);
        assert!(cell.neighbors().contains(&-20));
    }

    #[test]
    #[should_panic]
    fn test_wall_id_range() {
        let _ = Wall::new(-3, Box::new(SphereGeometry::new([0.0; 3], 1.0)));
    }
}
