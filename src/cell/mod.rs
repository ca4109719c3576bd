//! Convex polyhedral cell stored as a vertex/edge graph.
//!
//! Vertices carry an ordered list of edges. For vertex `v` with order `n`, edge `e` leads
//! to `ed(v, e)` and `rel(v, e)` is the position of `v` in that neighbor's edge list, so
//! `ed(ed(v, e), rel(v, e)) == v`. Walking a face means following an edge and then turning
//! to the next edge of the arrival vertex with [`Cell::cycle_up`].
//!
//! Edge records live in per-order pools. A vertex refers to its record through a
//! [`Handle`]; freeing a record moves the pool tail into the hole and patches the moved
//! owner's handle, so vertex indices stay stable while a cut is in progress.

mod cut;
mod measure;

use crate::bounds::box_side;
use crate::config::{self, Config};
use crate::error::{Result, VoroError};

/// Per-face payload carried along the edges of a cell.
///
/// The plain cell uses `()` and pays nothing for it; the neighbor-tracking cell uses
/// `i32` and records the id of the particle or wall that produced each face.
pub trait FaceTag: Copy + Default + Send + Sync + std::fmt::Debug + 'static {
    fn from_id(id: i32) -> Self;
    fn id(self) -> Option<i32>;
}

impl FaceTag for () {
    #[inline]
    fn from_id(_id: i32) -> Self {}

    #[inline]
    fn id(self) -> Option<i32> {
        None
    }
}

impl FaceTag for i32 {
    #[inline]
    fn from_id(id: i32) -> Self {
        id
    }

    #[inline]
    fn id(self) -> Option<i32> {
        Some(self)
    }
}

/// Cell that only tracks geometry.
pub type VoronoiCell = Cell<()>;
/// Cell that records the generating id of every face.
pub type NeighborCell = Cell<i32>;

/// Location of a vertex's edge record: pool (the vertex order) and slot within it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Handle {
    pub(crate) order: usize,
    pub(crate) slot: usize,
}

/// Edge records of all vertices of one order.
///
/// A record of order `n` occupies `2n` entries of `edges` (targets, then back indices)
/// and `n` entries of `tags`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Pool<T> {
    pub(crate) edges: Vec<i32>,
    pub(crate) tags: Vec<T>,
    pub(crate) owner: Vec<usize>,
}

impl<T> Pool<T> {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.owner.len()
    }
}

/// A convex polyhedron in coordinates relative to its generating particle.
#[derive(Clone, Debug)]
pub struct Cell<T: FaceTag = ()> {
    pub(crate) pts: Vec<[f64; 3]>,
    pub(crate) handles: Vec<Handle>,
    /// Back pointer and flood marker per vertex; holds the vertex's own index at rest.
    pub(crate) marks: Vec<i32>,
    doomed: Vec<bool>,
    mask: Vec<u32>,
    dist: Vec<f64>,
    pub(crate) pools: Vec<Pool<T>>,
    /// Number of live vertices.
    pub(crate) p: usize,
    /// Search hint, reused between plane queries.
    pub(crate) up: usize,
    maskc: u32,
    tol: f64,
    tol_cu: f64,
    big_tol: f64,
    ds: Vec<usize>,
    ds2: Vec<usize>,
    xse: Vec<usize>,
    plane: [f64; 3],
    prsq: f64,
    config: Config,
}

impl<T: FaceTag> Cell<T> {
    /// Creates an empty cell.
    ///
    /// # Arguments
    ///
    /// * `max_len_sq` - Squared length scale of the domain; the plane tolerance is relative to it.
    /// * `config` - Tolerances and buffer ceilings.
    pub fn new(max_len_sq: f64, config: Config) -> Self {
        let tol = config.tolerance * max_len_sq;
        let n = config.init_vertices.max(8);
        Self {
            pts: vec![[0.0; 3]; n],
            handles: vec![Handle::default(); n],
            marks: vec![0; n],
            doomed: vec![false; n],
            mask: vec![0; n],
            dist: vec![0.0; n],
            pools: (0..4).map(|_| Pool::default()).collect(),
            p: 0,
            up: 0,
            maskc: 0,
            tol,
            tol_cu: tol * tol.sqrt(),
            big_tol: config.big_tolerance_fac * tol,
            ds: Vec::with_capacity(config.init_delete_size),
            ds2: Vec::with_capacity(config.init_delete2_size),
            xse: Vec::with_capacity(config.init_xse_size),
            plane: [0.0; 3],
            prsq: 0.0,
            config,
        }
    }

    /// Creates a cell initialized to the box `[min, max]`.
    pub fn new_box(min: [f64; 3], max: [f64; 3], config: Config) -> Self {
        let mut len_sq = 0.0;
        for axis in 0..3 {
            let l = max[axis] - min[axis];
            len_sq += l * l;
        }
        let mut cell = Self::new(len_sq, config);
        cell.init_box(min[0], max[0], min[1], max[1], min[2], max[2]);
        cell
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.p
    }

    /// True once a cut removed every vertex.
    pub fn is_empty(&self) -> bool {
        self.p == 0
    }

    /// Absolute plane tolerance in use.
    pub fn tolerance(&self) -> f64 {
        self.tol
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    // --- initial shapes ---

    /// Resets the cell to an axis-aligned box with eight order-3 vertices.
    pub fn init_box(&mut self, xmin: f64, xmax: f64, ymin: f64, ymax: f64, zmin: f64, zmax: f64) {
        let pts = [
            [xmin, ymin, zmin],
            [xmax, ymin, zmin],
            [xmin, ymax, zmin],
            [xmax, ymax, zmin],
            [xmin, ymin, zmax],
            [xmax, ymin, zmax],
            [xmin, ymax, zmax],
            [xmax, ymax, zmax],
        ];
        let edges: [&[usize]; 8] = [
            &[1, 4, 2],
            &[3, 5, 0],
            &[0, 6, 3],
            &[2, 7, 1],
            &[6, 0, 5],
            &[4, 1, 7],
            &[7, 2, 4],
            &[5, 3, 6],
        ];
        self.init_graph(&pts, &edges);

        let (x0, x1) = (box_side(0, false), box_side(0, true));
        let (y0, y1) = (box_side(1, false), box_side(1, true));
        let (z0, z1) = (box_side(2, false), box_side(2, true));
        let sides = [
            [z0, y0, x0],
            [z0, x1, y0],
            [z0, x0, y1],
            [z0, y1, x1],
            [z1, x0, y0],
            [z1, y0, x1],
            [z1, y1, x0],
            [z1, x1, y1],
        ];
        for (v, ids) in sides.iter().enumerate() {
            for (e, &id) in ids.iter().enumerate() {
                self.set_tag(v, e, T::from_id(id));
            }
        }
    }

    /// Resets the cell to the octahedron with vertices at distance `l` along each axis.
    pub fn init_octahedron(&mut self, l: f64) {
        let pts = [
            [-l, 0.0, 0.0],
            [l, 0.0, 0.0],
            [0.0, -l, 0.0],
            [0.0, l, 0.0],
            [0.0, 0.0, -l],
            [0.0, 0.0, l],
        ];
        let edges: [&[usize]; 6] = [
            &[2, 5, 3, 4],
            &[2, 4, 3, 5],
            &[0, 4, 1, 5],
            &[0, 5, 1, 4],
            &[0, 3, 1, 2],
            &[0, 2, 1, 3],
        ];
        self.init_graph(&pts, &edges);
        self.label_faces();
    }

    /// Resets the cell to the tetrahedron spanned by four points.
    ///
    /// The points must be ordered so that `(p1 - p0) x (p2 - p0)` points towards `p3`.
    pub fn init_tetrahedron(&mut self, p0: [f64; 3], p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) {
        let edges: [&[usize]; 4] = [&[1, 3, 2], &[0, 2, 3], &[0, 3, 1], &[0, 1, 2]];
        self.init_graph(&[p0, p1, p2, p3], &edges);
        self.label_faces();
    }

    /// Resets the cell to a non-convex L-shaped prism of volume 6, used to exercise
    /// the degenerate code paths of the cutting routine.
    pub fn init_l_shape(&mut self) {
        let layer = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 0.0), (0.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let mut pts = [[0.0; 3]; 12];
        for (i, &(x, y)) in layer.iter().enumerate() {
            pts[i] = [x, y, -1.0];
            pts[i + 6] = [x, y, 1.0];
        }
        let edges: [&[usize]; 12] = [
            &[1, 6, 2],
            &[5, 7, 0],
            &[0, 8, 3],
            &[2, 9, 4],
            &[3, 10, 5],
            &[4, 11, 1],
            &[8, 0, 7],
            &[6, 1, 11],
            &[9, 2, 6],
            &[10, 3, 8],
            &[11, 4, 9],
            &[7, 5, 10],
        ];
        self.init_graph(&pts, &edges);
        self.label_faces();
    }

    /// Loads vertex positions and edge lists, then derives the back indices.
    fn init_graph(&mut self, pts: &[[f64; 3]], edges: &[&[usize]]) {
        for pool in self.pools.iter_mut() {
            pool.edges.clear();
            pool.tags.clear();
            pool.owner.clear();
        }
        let n = pts.len();
        if self.pts.len() < n {
            self.resize_vertices(n);
        }
        self.p = n;
        self.up = 0;
        for (v, list) in edges.iter().enumerate() {
            let order = list.len();
            if order >= self.pools.len() {
                self.pools.resize_with(order + 1, Pool::default);
            }
            let pool = &mut self.pools[order];
            let slot = pool.len();
            pool.edges.extend(list.iter().map(|&e| e as i32));
            pool.edges.extend(std::iter::repeat(-1).take(order));
            pool.tags.extend(std::iter::repeat(T::default()).take(order));
            pool.owner.push(v);
            self.handles[v] = Handle { order, slot };
            self.pts[v] = pts[v];
            self.marks[v] = v as i32;
            self.doomed[v] = false;
        }
        self.construct_relations();
    }

    /// Gives every face of the current graph its own negative id, starting at -1.
    fn label_faces(&mut self) {
        let mut faces = Vec::new();
        self.trace_faces(|half_edges| faces.push(half_edges.to_vec()));
        for (f, half_edges) in faces.iter().enumerate() {
            let id = T::from_id(-1 - f as i32);
            for &(v, e) in half_edges {
                self.set_tag(v, e, id);
            }
        }
    }

    /// Resets the cell to the geometry of `other`, tagging every face with `id`.
    pub(crate) fn copy_shape<U: FaceTag>(&mut self, other: &Cell<U>, id: i32) {
        let n = other.p;
        if self.pts.len() < n {
            self.resize_vertices(n);
        }
        self.clear();
        self.pools.resize_with(other.pools.len().max(self.pools.len()), Pool::default);
        let tag = T::from_id(id);
        for (pool, src) in self.pools.iter_mut().zip(other.pools.iter()) {
            pool.edges.extend_from_slice(&src.edges);
            pool.tags.extend(std::iter::repeat(tag).take(src.tags.len()));
            pool.owner.extend_from_slice(&src.owner);
        }
        self.pts[..n].copy_from_slice(&other.pts[..n]);
        self.handles[..n].copy_from_slice(&other.handles[..n]);
        for v in 0..n {
            self.marks[v] = v as i32;
        }
        self.p = n;
    }

    // --- edge record access ---

    #[inline]
    pub(crate) fn order(&self, v: usize) -> usize {
        self.handles[v].order
    }

    #[inline]
    fn base(&self, v: usize) -> (usize, usize) {
        let h = self.handles[v];
        (h.order, h.slot)
    }

    /// Raw edge target of vertex `v`; negative once the edge has been cut away.
    #[inline]
    pub(crate) fn ed(&self, v: usize, e: usize) -> i32 {
        let (order, slot) = self.base(v);
        self.pools[order].edges[slot * 2 * order + e]
    }

    #[inline]
    pub(crate) fn set_ed(&mut self, v: usize, e: usize, target: i32) {
        let (order, slot) = self.base(v);
        self.pools[order].edges[slot * 2 * order + e] = target;
    }

    /// Edge target that must still be present.
    #[inline]
    pub(crate) fn link(&self, v: usize, e: usize) -> Result<usize> {
        let target = self.ed(v, e);
        if target < 0 {
            return Err(VoroError::Internal("walked onto a deleted edge"));
        }
        Ok(target as usize)
    }

    #[inline]
    pub(crate) fn rel(&self, v: usize, e: usize) -> usize {
        let (order, slot) = self.base(v);
        self.pools[order].edges[slot * 2 * order + order + e] as usize
    }

    #[inline]
    pub(crate) fn set_rel(&mut self, v: usize, e: usize, back: usize) {
        let (order, slot) = self.base(v);
        self.pools[order].edges[slot * 2 * order + order + e] = back as i32;
    }

    #[inline]
    pub(crate) fn tag(&self, v: usize, e: usize) -> T {
        let (order, slot) = self.base(v);
        self.pools[order].tags[slot * order + e]
    }

    #[inline]
    pub(crate) fn set_tag(&mut self, v: usize, e: usize, tag: T) {
        let (order, slot) = self.base(v);
        self.pools[order].tags[slot * order + e] = tag;
    }

    /// Next edge index around vertex `v`.
    #[inline]
    pub(crate) fn cycle_up(&self, e: usize, v: usize) -> usize {
        if e + 1 == self.order(v) { 0 } else { e + 1 }
    }

    /// Previous edge index around vertex `v`.
    #[inline]
    pub(crate) fn cycle_down(&self, e: usize, v: usize) -> usize {
        if e == 0 { self.order(v) - 1 } else { e - 1 }
    }

    // --- pool management ---

    /// Appends a fresh record of the given order owned by vertex `owner`.
    pub(crate) fn alloc(&mut self, order: usize, owner: usize) -> Result<Handle> {
        if order >= self.pools.len() {
            if order >= self.config.max_vertex_order {
                return Err(VoroError::Memory {
                    what: "vertex order",
                    limit: self.config.max_vertex_order,
                });
            }
            log::debug!("Vertex order memory scaled up to {}", order + 1);
            self.pools.resize_with(order + 1, Pool::default);
        }
        let limit = if order == 3 { self.config.max_vertices } else { self.config.max_n_vertices };
        let pool = &mut self.pools[order];
        let slot = pool.len();
        if slot >= limit {
            return Err(VoroError::Memory { what: "vertices of one order", limit });
        }
        pool.edges.extend(std::iter::repeat(-1).take(2 * order));
        pool.tags.extend(std::iter::repeat(T::default()).take(order));
        pool.owner.push(owner);
        Ok(Handle { order, slot })
    }

    /// Releases a record by moving the pool's last record into its slot.
    pub(crate) fn free(&mut self, h: Handle) {
        let stride = 2 * h.order;
        let pool = &mut self.pools[h.order];
        let last = pool.len() - 1;
        let mut moved = None;
        if h.slot != last {
            pool.edges.copy_within(last * stride..(last + 1) * stride, h.slot * stride);
            pool.tags.copy_within(last * h.order..(last + 1) * h.order, h.slot * h.order);
            let owner = pool.owner[last];
            pool.owner[h.slot] = owner;
            moved = Some(owner);
        }
        pool.edges.truncate(last * stride);
        pool.tags.truncate(last * h.order);
        pool.owner.truncate(last);
        if let Some(owner) = moved {
            self.handles[owner].slot = h.slot;
        }
    }

    /// Points vertex `v` at record `h` and records the new owner.
    #[inline]
    pub(crate) fn adopt(&mut self, v: usize, h: Handle) {
        self.handles[v] = h;
        self.pools[h.order].owner[h.slot] = v;
    }

    /// Makes sure vertex index `self.p` is addressable.
    pub(crate) fn reserve_vertex(&mut self) -> Result<()> {
        if self.p >= self.pts.len() {
            let n = config::grow("vertex", self.pts.len(), self.config.max_vertices)?;
            self.resize_vertices(n);
        }
        Ok(())
    }

    fn resize_vertices(&mut self, n: usize) {
        self.pts.resize(n, [0.0; 3]);
        self.handles.resize(n, Handle::default());
        self.marks.resize(n, 0);
        self.doomed.resize(n, false);
        self.mask.resize(n, 0);
        self.dist.resize(n, 0.0);
    }

    /// Drops every vertex, leaving an empty cell.
    pub(crate) fn clear(&mut self) {
        for pool in self.pools.iter_mut() {
            pool.edges.clear();
            pool.tags.clear();
            pool.owner.clear();
        }
        self.p = 0;
        self.up = 0;
        self.ds.clear();
        self.ds2.clear();
        self.xse.clear();
        self.doomed.iter_mut().for_each(|d| *d = false);
    }

    // --- graph utilities ---

    /// Recomputes all back indices from the edge targets.
    pub fn construct_relations(&mut self) {
        for i in 0..self.p {
            for j in 0..self.order(i) {
                let k = self.ed(i, j) as usize;
                if let Some(l) = (0..self.order(k)).find(|&l| self.ed(k, l) == i as i32) {
                    self.set_rel(i, j, l);
                }
            }
        }
    }

    /// Verifies `ed(ed(i, j), rel(i, j)) == i` for every edge.
    pub fn check_relations(&self) -> Result<()> {
        for i in 0..self.p {
            for j in 0..self.order(i) {
                let k = self.link(i, j)?;
                if k >= self.p || self.rel(i, j) >= self.order(k) {
                    return Err(VoroError::Internal("edge leads outside the live vertices"));
                }
                if self.ed(k, self.rel(i, j)) != i as i32 {
                    return Err(VoroError::Internal("edge back index does not match"));
                }
            }
        }
        Ok(())
    }

    /// Verifies that no vertex is connected twice to the same neighbor.
    pub fn check_duplicates(&self) -> Result<()> {
        for i in 0..self.p {
            for j in 1..self.order(i) {
                for k in 0..j {
                    if self.ed(i, j) == self.ed(i, k) {
                        return Err(VoroError::Internal("duplicate edge between two vertices"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Visits every face once as its cycle of half-edges `(vertex, edge index)`.
    ///
    /// The first half-edge of each cycle carries the face tag.
    pub(crate) fn trace_faces(&self, mut visit: impl FnMut(&[(usize, usize)])) {
        if self.p == 0 {
            return;
        }
        let mut offsets = Vec::with_capacity(self.p + 1);
        let mut total = 0;
        for v in 0..self.p {
            offsets.push(total);
            total += self.order(v);
        }
        let mut seen = vec![false; total];
        let mut face = Vec::with_capacity(16);
        for i in 1..self.p {
            for j in 0..self.order(i) {
                if seen[offsets[i] + j] {
                    continue;
                }
                face.clear();
                let (mut k, mut l) = (i, j);
                loop {
                    seen[offsets[k] + l] = true;
                    face.push((k, l));
                    let m = self.ed(k, l) as usize;
                    l = self.cycle_up(self.rel(k, l), m);
                    k = m;
                    if k == i {
                        break;
                    }
                }
                visit(&face);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> VoronoiCell {
        VoronoiCell::new_box([-0.5; 3], [0.5; 3], Config::default())
    }

    #[test]
    fn test_box_graph_is_consistent() {
        let cell = unit_box();
        assert_eq!(cell.vertex_count(), 8);
        cell.check_relations().unwrap();
        cell.check_duplicates().unwrap();
        for v in 0..8 {
            assert_eq!(cell.order(v), 3);
        }
    }

    #[test]
    fn test_box_face_tags() {
        let cell = NeighborCell::new_box([0.0; 3], [1.0; 3], Config::default());
        let mut n = cell.neighbors();
        n.sort();
        assert_eq!(n, vec![-6, -5, -4, -3, -2, -1]);
    }

    #[test]
    fn test_pool_free_moves_tail() {
        let mut cell = unit_box();
        let h0 = cell.handles[0];
        let h7 = cell.handles[7];
        assert_eq!(h7.slot, 7);
        let targets: Vec<i32> = (0..3).map(|e| cell.ed(7, e)).collect();
        cell.free(h0);
        assert_eq!(cell.handles[7].slot, h0.slot);
        let moved: Vec<i32> = (0..3).map(|e| cell.ed(7, e)).collect();
        assert_eq!(targets, moved);
        assert_eq!(cell.pools[3].len(), 7);
    }

    #[test]
    fn test_shapes_have_consistent_relations() {
        let mut cell = NeighborCell::new(1.0, Config::default());
        cell.init_octahedron(1.0);
        cell.check_relations().unwrap();
        assert_eq!(cell.number_of_faces(), 8);
        cell.init_tetrahedron([1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, -1.0], [1.0, -1.0, -1.0]);
        cell.check_relations().unwrap();
        assert_eq!(cell.number_of_faces(), 4);
        cell.init_l_shape();
        cell.check_relations().unwrap();
        assert_eq!(cell.number_of_faces(), 8);
        let mut ids = cell.neighbors();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_copy_shape_retags_faces() {
        let source = unit_box();
        let mut cell = NeighborCell::new(3.0, Config::default());
        cell.copy_shape(&source, 42);
        cell.check_relations().unwrap();
        assert!((cell.volume() - 1.0).abs() < 1e-12);
        assert!(cell.neighbors().iter().all(|&n| n == 42));
    }
}
