use super::{Cell, FaceTag};

#[inline]
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

impl<T: FaceTag> Cell<T> {
    /// Vertex positions relative to the generator.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.pts[..self.p]
    }

    /// Vertex positions shifted by the generator position.
    pub fn vertices_global(&self, origin: [f64; 3]) -> Vec<[f64; 3]> {
        self.vertices()
            .iter()
            .map(|v| [v[0] + origin[0], v[1] + origin[1], v[2] + origin[2]])
            .collect()
    }

    pub fn vertex_orders(&self) -> Vec<usize> {
        (0..self.p).map(|v| self.order(v)).collect()
    }

    pub fn number_of_edges(&self) -> usize {
        (0..self.p).map(|v| self.order(v)).sum::<usize>() / 2
    }

    pub fn number_of_faces(&self) -> usize {
        let mut n = 0;
        self.trace_faces(|_| n += 1);
        n
    }

    /// Vertices minus edges plus faces; 2 for every non-empty cell.
    pub fn euler_characteristic(&self) -> i64 {
        self.p as i64 - self.number_of_edges() as i64 + self.number_of_faces() as i64
    }

    /// Squared distance from the generator to the furthest vertex.
    pub fn max_radius_squared(&self) -> f64 {
        self.vertices().iter().map(|v| dot(*v, *v)).fold(0.0, f64::max)
    }

    pub fn volume(&self) -> f64 {
        if self.p == 0 {
            return 0.0;
        }
        let p0 = self.pts[0];
        let mut vol = 0.0;
        self.trace_faces(|face| {
            let u = sub(p0, self.pts[face[0].0]);
            for w in face[1..].windows(2) {
                let v = sub(self.pts[w[0].0], p0);
                let x = sub(self.pts[w[1].0], p0);
                vol += dot(u, cross(v, x));
            }
        });
        vol / 6.0
    }

    /// Area of every face, in face order.
    pub fn face_areas(&self) -> Vec<f64> {
        let mut areas = Vec::new();
        self.trace_faces(|face| {
            let a = self.pts[face[0].0];
            let mut area = 0.0;
            for w in face[1..].windows(2) {
                let c = cross(sub(self.pts[w[0].0], a), sub(self.pts[w[1].0], a));
                area += dot(c, c).sqrt();
            }
            areas.push(0.5 * area);
        });
        areas
    }

    pub fn surface_area(&self) -> f64 {
        self.face_areas().iter().sum()
    }

    /// Centroid relative to the generator; the origin for a cell without volume.
    pub fn centroid(&self) -> [f64; 3] {
        if self.p == 0 {
            return [0.0; 3];
        }
        let p0 = self.pts[0];
        let mut vol = 0.0;
        let mut c = [0.0; 3];
        self.trace_faces(|face| {
            let u = sub(p0, self.pts[face[0].0]);
            for w in face[1..].windows(2) {
                let v = sub(self.pts[w[0].0], p0);
                let x = sub(self.pts[w[1].0], p0);
                let t = dot(u, cross(v, x));
                vol += t;
                for a in 0..3 {
                    c[a] += (x[a] + v[a] - u[a]) * t;
                }
            }
        });
        if vol > self.tol_cu {
            let s = 0.25 / vol;
            [c[0] * s + p0[0], c[1] * s + p0[1], c[2] * s + p0[2]]
        } else {
            [0.0; 3]
        }
    }

    /// Vertex index cycles of every face.
    pub fn face_vertices(&self) -> Vec<Vec<usize>> {
        let mut faces = Vec::new();
        self.trace_faces(|face| faces.push(face.iter().map(|&(v, _)| v).collect()));
        faces
    }

    /// Number of vertices of every face.
    pub fn face_orders(&self) -> Vec<usize> {
        let mut orders = Vec::new();
        self.trace_faces(|face| orders.push(face.len()));
        orders
    }

    /// Histogram of face orders; entry `n` counts the faces with `n` vertices.
    pub fn face_freq_table(&self) -> Vec<usize> {
        let mut table = Vec::new();
        for n in self.face_orders() {
            if n >= table.len() {
                table.resize(n + 1, 0);
            }
            table[n] += 1;
        }
        table
    }

    pub fn face_perimeters(&self) -> Vec<f64> {
        let mut perimeters = Vec::new();
        self.trace_faces(|face| {
            let mut s = 0.0;
            for (i, &(v, _)) in face.iter().enumerate() {
                let w = face[(i + 1) % face.len()].0;
                let d = sub(self.pts[w], self.pts[v]);
                s += dot(d, d).sqrt();
            }
            perimeters.push(s);
        });
        perimeters
    }

    /// Outward unit normal of every face; zero for faces too small to define one.
    pub fn normals(&self) -> Vec<[f64; 3]> {
        let mut normals = Vec::new();
        self.trace_faces(|face| {
            let n = face.len();
            let mut normal = [0.0; 3];
            'search: for t in 0..n {
                let u = sub(self.pts[face[(t + 1) % n].0], self.pts[face[t].0]);
                if dot(u, u) <= self.tol {
                    continue;
                }
                for s in t + 1..t + n {
                    let v = sub(self.pts[face[(s + 1) % n].0], self.pts[face[s % n].0]);
                    let w = cross(v, u);
                    let mag = dot(w, w);
                    if mag > self.tol {
                        let inv = 1.0 / mag.sqrt();
                        normal = [w[0] * inv, w[1] * inv, w[2] * inv];
                        break 'search;
                    }
                }
            }
            normals.push(normal);
        });
        normals
    }

    /// Ids of the particles and walls that produced each face, in face order.
    ///
    /// Empty for cells that do not track face ids.
    pub fn neighbors(&self) -> Vec<i32> {
        let mut ids = Vec::new();
        self.trace_faces(|face| {
            let (v, e) = face[0];
            if let Some(id) = self.tag(v, e).id() {
                ids.push(id);
            }
        });
        ids
    }

    /// Sum of the lengths of all edges.
    pub fn total_edge_distance(&self) -> f64 {
        let mut s = 0.0;
        for i in 0..self.p {
            for j in 0..self.order(i) {
                let k = self.ed(i, j) as usize;
                if k > i {
                    let d = sub(self.pts[k], self.pts[i]);
                    s += dot(d, d).sqrt();
                }
            }
        }
        s
    }

    /// Moves every vertex by `d`.
    pub fn translate(&mut self, d: [f64; 3]) {
        for v in self.pts[..self.p].iter_mut() {
            v[0] += d[0];
            v[1] += d[1];
            v[2] += d[2];
        }
    }

    /// Tests whether the plane `2 x·n = rsq` cuts the cell, starting from the search hint.
    pub fn plane_intersects(&self, n: [f64; 3], rsq: f64) -> bool {
        if self.p == 0 {
            return false;
        }
        let g = 2.0 * dot(n, self.pts[self.up]);
        if g < rsq {
            return self.plane_intersects_track(n, rsq);
        }
        true
    }

    /// Like [`Cell::plane_intersects`], but first samples a sparse subset of the vertices
    /// and moves the search hint to the highest one seen.
    pub fn plane_intersects_guess(&mut self, n: [f64; 3], rsq: f64) -> bool {
        if self.p == 0 {
            return false;
        }
        self.up = 0;
        let mut g = 2.0 * dot(n, self.pts[0]);
        if g < rsq {
            let cc = self.p >> 3;
            let mut ca = 1;
            let mut mp = 1;
            while ca < cc {
                let m = 2.0 * dot(n, self.pts[mp]);
                if m > g {
                    if m > rsq {
                        return true;
                    }
                    g = m;
                    self.up = mp;
                }
                ca += mp;
                mp += 1;
            }
            return self.plane_intersects_track(n, rsq);
        }
        true
    }

    fn plane_intersects_track(&self, n: [f64; 3], rsq: f64) -> bool {
        self.vertices().iter().any(|v| 2.0 * dot(n, *v) > rsq)
    }
}

#[cfg(test)]
mod tests {
    use crate::cell::{NeighborCell, VoronoiCell};
    use crate::config::Config;

    macro_rules! assert_close {
        ($a:expr, $b:expr, $tol:expr) => {
            assert!(($a - $b).abs() < $tol, "{} != {} (tol {})", $a, $b, $tol)
        };
    }

    #[test]
    fn test_box_measures() {
        let cell = VoronoiCell::new_box([0.0; 3], [1.0, 2.0, 3.0], Config::default());
        assert_close!(cell.volume(), 6.0, 1e-12);
        assert_close!(cell.surface_area(), 22.0, 1e-12);
        let c = cell.centroid();
        assert_close!(c[0], 0.5, 1e-12);
        assert_close!(c[1], 1.0, 1e-12);
        assert_close!(c[2], 1.5, 1e-12);
        assert_close!(cell.max_radius_squared(), 14.0, 1e-12);
        assert_close!(cell.total_edge_distance(), 24.0, 1e-12);
        assert_eq!(cell.number_of_edges(), 12);
        assert_eq!(cell.euler_characteristic(), 2);
        assert_eq!(cell.face_freq_table(), vec![0, 0, 0, 0, 6]);
    }

    #[test]
    fn test_box_normals_point_outward() {
        let cell = NeighborCell::new_box([-1.0; 3], [1.0; 3], Config::default());
        let normals = cell.normals();
        let ids = cell.neighbors();
        assert_eq!(normals.len(), 6);
        for (n, id) in normals.iter().zip(ids) {
            // -1 - (2 axis + is_max)
            let side = (-1 - id) as usize;
            let (axis, sign) = (side / 2, if side % 2 == 1 { 1.0 } else { -1.0 });
            assert_close!(n[axis], sign, 1e-12);
        }
    }

    #[test]
    fn test_octahedron_and_tetrahedron_volume() {
        let mut cell = VoronoiCell::new(4.0, Config::default());
        cell.init_octahedron(1.0);
        assert_close!(cell.volume(), 4.0 / 3.0, 1e-12);
        assert_eq!(cell.face_orders(), vec![3; 8]);
        cell.init_tetrahedron([1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, -1.0], [1.0, -1.0, -1.0]);
        assert_close!(cell.volume(), 8.0 / 3.0, 1e-12);
        let c = cell.centroid();
        assert_close!(c[0].abs() + c[1].abs() + c[2].abs(), 0.0, 1e-12);
    }

    #[test]
    fn test_plane_intersection_queries() {
        let mut cell = VoronoiCell::new_box([-1.0; 3], [1.0; 3], Config::default());
        assert!(cell.plane_intersects([1.0, 0.0, 0.0], 1.0));
        assert!(!cell.plane_intersects([1.0, 0.0, 0.0], 3.0));
        assert!(cell.plane_intersects_guess([1.0, 1.0, 1.0], 5.0));
        assert!(!cell.plane_intersects_guess([1.0, 1.0, 1.0], 7.0));
    }

    #[test]
    fn test_translate_and_global_vertices() {
        let mut cell = VoronoiCell::new_box([0.0; 3], [1.0; 3], Config::default());
        cell.translate([1.0, 0.0, 0.0]);
        let g = cell.vertices_global([0.0, 0.0, 10.0]);
        assert!(g.iter().all(|v| v[0] >= 1.0 && v[2] >= 10.0));
        assert_close!(cell.volume(), 1.0, 1e-12);
    }
}
