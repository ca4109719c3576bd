//! Fully periodic container with a triclinic (sheared) unit cell.
//!
//! The lattice vectors are `a = (bx, 0, 0)`, `b = (bxy, by, 0)` and `c = (bxz, byz, bz)`.
//! Particles live in the primary box `[0, bx) × [0, by) × [0, bz)`, which tiles space under
//! the lattice. The block grid is padded by `ey` rows in y and `ez` layers in z on each side;
//! those halo blocks hold shifted copies of primary particles and are filled the first time
//! the search touches them.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use log::{debug, warn};

use super::{parse_record, Block, ContainerKind, Particle};
use crate::cell::{Cell, FaceTag, VoronoiCell};
use crate::compute::{self, Domain, SearchContext, SearchGrid, Target};
use crate::config::Config;
use crate::error::{Result, VoroError};
use crate::radius::{Mono, Poly};
use crate::tessellation::{CellReport, ParticleContainer};

/// Face id reported by ghost cells for faces shared with their own periodic images.
pub const GHOST_SELF_ID: i32 = -1;

/// Lattice vectors of a triclinic domain, in lower-triangular form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lattice {
    pub bx: f64,
    pub bxy: f64,
    pub by: f64,
    pub bxz: f64,
    pub byz: f64,
    pub bz: f64,
}

impl Lattice {
    pub fn new(bx: f64, bxy: f64, by: f64, bxz: f64, byz: f64, bz: f64) -> Self {
        Self { bx, bxy, by, bxz, byz, bz }
    }

    /// Rectangular lattice with side lengths `l`.
    pub fn orthogonal(l: [f64; 3]) -> Self {
        Self::new(l[0], 0.0, l[1], 0.0, 0.0, l[2])
    }

    /// Image displacement `i a + j b + k c`.
    #[inline]
    pub fn image(&self, i: i32, j: i32, k: i32) -> [f64; 3] {
        let (i, j, k) = (i as f64, j as f64, k as f64);
        [i * self.bx + j * self.bxy + k * self.bxz, j * self.by + k * self.byz, k * self.bz]
    }

    pub fn volume(&self) -> f64 {
        self.bx * self.by * self.bz
    }

    fn validate(&self) -> Result<()> {
        let all = [self.bx, self.bxy, self.by, self.bxz, self.byz, self.bz];
        if all.iter().any(|v| !v.is_finite()) || !(self.bx > 0.0 && self.by > 0.0 && self.bz > 0.0) {
            return Err(VoroError::InvalidGrid(format!("degenerate lattice {:?}", self)));
        }
        Ok(())
    }
}

/// Image offsets of shell `l` of the lattice, one of each `±` pair.
fn shell(l: i32) -> Vec<[i32; 3]> {
    let mut out = vec![[l, 0, 0]];
    for i in 1..l {
        out.push([l, i, 0]);
        out.push([-l, i, 0]);
    }
    for i in -l..=l {
        out.push([i, l, 0]);
    }
    for i in 1..l {
        for j in (-l + 1)..=l {
            out.push([l, j, i]);
            out.push([-j, l, i]);
            out.push([-l, -j, i]);
            out.push([j, -l, i]);
        }
    }
    for i in -l..=l {
        for j in -l..=l {
            out.push([i, j, l]);
        }
    }
    out
}

/// Voronoi cell of a lattice point among its own images.
///
/// Returns the cell and the reach of the cell in y and z: the largest coordinate an image
/// point may have and still cut the cell of any particle.
fn unit_cell(lattice: &Lattice, config: &Config) -> Result<(VoronoiCell, f64, f64)> {
    let shells = config.max_unit_voro_shells as i32;
    let s = shells as f64;
    let half = [s * lattice.bx, s * lattice.by, s * lattice.bz];
    let mut cell = VoronoiCell::new_box([-half[0], -half[1], -half[2]], half, *config);
    let mut l = 1;
    while l < 2 * shells {
        let images: Vec<[f64; 3]> = shell(l).iter().map(|o| lattice.image(o[0], o[1], o[2])).collect();
        let cuts = images.iter().any(|x| cell.plane_intersects(*x, x[0] * x[0] + x[1] * x[1] + x[2] * x[2]));
        if !cuts {
            let mut max_y: f64 = 0.0;
            let mut max_z: f64 = 0.0;
            for v in cell.vertices() {
                let q = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                max_y = max_y.max(v[1] + q);
                max_z = max_z.max(v[2] + q);
            }
            debug!("unit cell bounded after {} shells", l - 1);
            return Ok((cell, max_y, max_z));
        }
        for x in images {
            let rsq = x[0] * x[0] + x[1] * x[1] + x[2] * x[2];
            let back = [-x[0], -x[1], -x[2]];
            if !cell.cut(x, rsq, 0)? || !cell.cut(back, rsq, 0)? {
                return Err(VoroError::Internal("lattice images removed the unit cell"));
            }
        }
        l += 1;
    }
    Err(VoroError::Memory { what: "unit cell shells", limit: config.max_unit_voro_shells })
}

/// A triclinic domain, periodic along all three lattice vectors.
#[derive(Debug)]
pub struct PeriodicContainer {
    lattice: Lattice,
    grid: [usize; 3],
    ey: usize,
    ez: usize,
    oy: usize,
    oz: usize,
    kind: ContainerKind,
    /// Primary blocks, x fastest.
    blocks: Vec<Block>,
    /// Halo blocks over the padded grid; entries inside the primary domain stay unused.
    images: Vec<OnceLock<Result<Block>>>,
    /// Set once any halo block has been filled.
    images_built: AtomicBool,
    lookup: HashMap<i32, (usize, usize)>,
    max_radius: f64,
    max_len_sq: f64,
    unit: VoronoiCell,
    config: Config,
    search: SearchGrid,
}

impl PeriodicContainer {
    /// Creates a new `PeriodicContainer`.
    ///
    /// # Arguments
    ///
    /// * `lattice` - The lattice vectors.
    /// * `grid` - Number of blocks of the primary domain along each axis.
    /// * `kind` - Whether particles carry radii.
    pub fn new(lattice: Lattice, grid: [usize; 3], kind: ContainerKind) -> Result<Self> {
        Self::with_config(lattice, grid, kind, Config::default())
    }

    pub fn with_config(lattice: Lattice, grid: [usize; 3], kind: ContainerKind, config: Config) -> Result<Self> {
        lattice.validate()?;
        if grid.contains(&0) {
            return Err(VoroError::InvalidGrid(format!("block counts must be positive, got {:?}", grid)));
        }
        let (unit, max_y, max_z) = unit_cell(&lattice, &config)?;
        let box_size = [
            lattice.bx / grid[0] as f64,
            lattice.by / grid[1] as f64,
            lattice.bz / grid[2] as f64,
        ];
        let ey = (max_y / box_size[1] + 1.0) as usize;
        let ez = (max_z / box_size[2] + 1.0) as usize;
        let oy = grid[1] + 2 * ey;
        let oz = grid[2] + 2 * ez;
        let poly = kind == ContainerKind::Poly;
        let blocks = (0..grid[0] * grid[1] * grid[2])
            .map(|_| Block::with_capacity(config.init_particle_memory, poly))
            .collect();
        let images = (0..grid[0] * oy * oz).map(|_| OnceLock::new()).collect();
        debug!("triclinic container {:?} with {:?} blocks, halo ({}, {})", lattice, grid, ey, ez);
        Ok(Self {
            lattice,
            grid,
            ey,
            ez,
            oy,
            oz,
            kind,
            blocks,
            images,
            images_built: AtomicBool::new(false),
            lookup: HashMap::new(),
            max_radius: 0.0,
            max_len_sq: 4.0 * unit.max_radius_squared(),
            unit,
            config,
            search: SearchGrid::new(box_size, [2 * grid[0] + 1, 2 * ey + 1, 2 * ez + 1]),
        })
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    /// Halo depth in blocks along y and z.
    pub fn halo(&self) -> [usize; 2] {
        [self.ey, self.ez]
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Voronoi cell of a lattice point among its own images.
    pub fn unit_cell(&self) -> &VoronoiCell {
        &self.unit
    }

    #[inline]
    fn block_index(&self, b: [usize; 3]) -> usize {
        b[0] + self.grid[0] * (b[1] + self.grid[1] * b[2])
    }

    fn block_coords(&self, index: usize) -> [usize; 3] {
        let nx = self.grid[0];
        let ny = self.grid[1];
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    /// Maps `pos` into the primary domain, z first, then y, then x.
    fn remap(&self, pos: [f64; 3]) -> ([usize; 3], [f64; 3]) {
        let lat = &self.lattice;
        let inv = self.search.inv;
        let n = [self.grid[0] as i64, self.grid[1] as i64, self.grid[2] as i64];
        let mut p = pos;

        let mut k = (p[2] * inv[2]).floor() as i64;
        if k < 0 || k >= n[2] {
            let ak = k.div_euclid(n[2]);
            let s = ak as f64;
            p[2] -= s * lat.bz;
            p[1] -= s * lat.byz;
            p[0] -= s * lat.bxz;
            k -= ak * n[2];
        }
        let mut j = (p[1] * inv[1]).floor() as i64;
        if j < 0 || j >= n[1] {
            let aj = j.div_euclid(n[1]);
            let s = aj as f64;
            p[1] -= s * lat.by;
            p[0] -= s * lat.bxy;
            j -= aj * n[1];
        }
        let mut i = (p[0] * inv[0]).floor() as i64;
        if i < 0 || i >= n[0] {
            let ai = i.div_euclid(n[0]);
            p[0] -= ai as f64 * lat.bx;
            i -= ai * n[0];
        }
        let b = [
            i.clamp(0, n[0] - 1) as usize,
            j.clamp(0, n[1] - 1) as usize,
            k.clamp(0, n[2] - 1) as usize,
        ];
        (b, p)
    }

    /// Rejects a particle that coincides with one already stored, across periodic
    /// boundaries included.
    fn check_duplicate(&self, id: i32, pos: [f64; 3]) -> Result<()> {
        let tol = self.config.duplicate_tolerance_sq;
        let eps = tol.sqrt();
        for sz in [-eps, 0.0, eps] {
            for sy in [-eps, 0.0, eps] {
                for sx in [-eps, 0.0, eps] {
                    let (b, mapped) = self.remap([pos[0] + sx, pos[1] + sy, pos[2] + sz]);
                    let image = [mapped[0] - sx, mapped[1] - sy, mapped[2] - sz];
                    let block = &self.blocks[self.block_index(b)];
                    for l in 0..block.len() {
                        let q = block.pos[l];
                        let d = [q[0] - image[0], q[1] - image[1], q[2] - image[2]];
                        if d[0] * d[0] + d[1] * d[1] + d[2] * d[2] < tol {
                            return Err(VoroError::DuplicateParticle { id, other: block.ids[l], position: pos });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, id: i32, pos: [f64; 3], radius: Option<f64>) -> Result<()> {
        if pos.iter().any(|v| !v.is_finite()) {
            warn!("particle {} at {:?} lies outside the domain", id, pos);
            return Err(VoroError::OutsideDomain { id, position: pos });
        }
        self.check_duplicate(id, pos)?;
        let (b, x) = self.remap(pos);
        let index = self.block_index(b);
        let slot = self.blocks[index].push(id, x, radius, self.config.max_particle_memory)?;
        self.lookup.insert(id, (index, slot));
        if let Some(r) = radius {
            self.max_radius = self.max_radius.max(r);
        }
        self.invalidate_images();
        Ok(())
    }

    /// Drops the halo blocks built from the previous particle set.
    fn invalidate_images(&mut self) {
        if !std::mem::replace(self.images_built.get_mut(), false) {
            return;
        }
        for image in self.images.iter_mut() {
            image.take();
        }
    }

    /// Removes all particles.
    pub fn clear(&mut self) {
        for block in &mut self.blocks {
            block.ids.clear();
            block.pos.clear();
            block.radii.clear();
        }
        self.lookup.clear();
        self.max_radius = 0.0;
        self.invalidate_images();
    }

    /// Inserts a particle, mapping it into the primary domain.
    pub fn put(&mut self, id: i32, pos: [f64; 3]) -> Result<()> {
        let radius = (self.kind == ContainerKind::Poly).then_some(0.0);
        self.insert(id, pos, radius)
    }

    /// Inserts a particle with a radius. The radius is ignored by a
    /// [`ContainerKind::Mono`] container.
    pub fn put_poly(&mut self, id: i32, pos: [f64; 3], radius: f64) -> Result<()> {
        let radius = (self.kind == ContainerKind::Poly).then_some(radius);
        self.insert(id, pos, radius)
    }

    /// Reads particle records, see [`super::Container::import`].
    pub fn import<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let poly = self.kind == ContainerKind::Poly;
        let mut count = 0;
        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| VoroError::Parse { line: n + 1, message: e.to_string() })?;
            if let Some((id, pos, r)) = parse_record(&line, n + 1, poly)? {
                self.put_poly(id, pos, r)?;
                count += 1;
            }
        }
        debug!("imported {} particles", count);
        Ok(count)
    }

    pub fn total_particles(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }

    /// Particle count of every primary block, x fastest.
    pub fn region_count(&self) -> Vec<usize> {
        self.blocks.iter().map(Block::len).collect()
    }

    pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
        self.blocks.iter().flat_map(|b| (0..b.len()).map(move |l| b.particle(l)))
    }

    pub fn particle(&self, id: i32) -> Option<Particle> {
        self.lookup.get(&id).map(|&(b, l)| self.blocks[b].particle(l))
    }

    /// Every point lies in some periodic image of the domain.
    pub fn point_inside(&self, _pos: [f64; 3]) -> bool {
        true
    }

    /// Fills the halo block at padded coordinates `(di, dj, dk)`.
    fn build_image(&self, di: usize, dj: usize, dk: usize) -> Result<Block> {
        let lat = &self.lattice;
        let [nx, ny, nz] = [self.grid[0] as i64, self.grid[1] as i64, self.grid[2] as i64];
        let inv = self.search.inv;
        let box_y = self.search.box_size[1];
        let tj = dj as i64 - self.ey as i64;
        let tk = dk as i64 - self.ez as i64;
        let di = di as i64;

        let ak = tk.div_euclid(nz);
        let layer = (tk - ak * nz) as usize;
        let sy = ak as f64 * lat.byz;
        let r0 = ((tj as f64 * box_y - sy) * inv[1]).floor() as i64;
        let mut rows: Vec<usize> = (r0 - 1..=r0 + 1).map(|r| r.rem_euclid(ny) as usize).collect();
        rows.sort_unstable();
        rows.dedup();

        let mut out = Block::with_capacity(self.config.init_particle_memory, self.kind == ContainerKind::Poly);
        let poly = self.kind == ContainerKind::Poly;
        for row in rows {
            for col in 0..self.grid[0] {
                let block = &self.blocks[self.block_index([col, row, layer])];
                for l in 0..block.len() {
                    let p = block.pos[l];
                    let i0 = ((p[1] + sy) * inv[1]).floor() as i64;
                    if (tj - i0).rem_euclid(ny) != 0 {
                        continue;
                    }
                    let aj = (tj - i0).div_euclid(ny);
                    let sx = ak as f64 * lat.bxz + aj as f64 * lat.bxy;
                    let i0x = ((p[0] + sx) * inv[0]).floor() as i64;
                    if (di - i0x).rem_euclid(nx) != 0 {
                        continue;
                    }
                    let ai = (di - i0x).div_euclid(nx);
                    let image = [
                        p[0] + sx + ai as f64 * lat.bx,
                        p[1] + sy + aj as f64 * lat.by,
                        p[2] + ak as f64 * lat.bz,
                    ];
                    let radius = poly.then(|| block.radius(l));
                    out.push(block.ids[l], image, radius, self.config.max_particle_memory)?;
                }
            }
        }
        debug!("periodic image block ({}, {}, {}) holds {} particles", di, dj, dk, out.len());
        Ok(out)
    }

    /// Halo block at padded coordinates `(i, j, k)`, built on first access.
    fn image_block(&self, i: usize, j: usize, k: usize) -> Result<&Block> {
        let slot = &self.images[i + self.grid[0] * (j + self.oy * k)];
        let built = slot.get_or_init(|| {
            self.images_built.store(true, Ordering::Relaxed);
            self.build_image(i, j, k)
        });
        match built {
            Ok(block) => Ok(block),
            Err(e) => Err(e.clone()),
        }
    }

    #[inline]
    fn is_primary(&self, j: usize, k: usize) -> bool {
        (self.ey..self.ey + self.grid[1]).contains(&j) && (self.ez..self.ez + self.grid[2]).contains(&k)
    }

    /// Builds every halo block up front.
    pub fn create_all_images(&self) -> Result<()> {
        for k in 0..self.oz {
            for j in 0..self.oy {
                if self.is_primary(j, k) {
                    continue;
                }
                for i in 0..self.grid[0] {
                    self.image_block(i, j, k)?;
                }
            }
        }
        Ok(())
    }

    fn target<'a>(&'a self, b: [usize; 3], pos: [f64; 3], radius: f64, skip: Option<usize>) -> Target<'a> {
        let bs = self.search.box_size;
        Target {
            pos,
            radius,
            home: &self.blocks[self.block_index(b)],
            skip,
            block: [b[0] as i32, (b[1] + self.ey) as i32, (b[2] + self.ez) as i32],
            origin: [self.grid[0] as i32, self.ey as i32, self.ez as i32],
            frac: [
                pos[0] - bs[0] * b[0] as f64,
                pos[1] - bs[1] * b[1] as f64,
                pos[2] - bs[2] * b[2] as f64,
            ],
        }
    }

    fn run<T: FaceTag>(&self, ctx: &mut SearchContext, cell: &mut Cell<T>, target: &Target<'_>, id: i32) -> Result<bool> {
        cell.copy_shape(&self.unit, id);
        match self.kind {
            ContainerKind::Mono => compute::compute_cell(self, ctx, cell, target, &mut Mono),
            ContainerKind::Poly => compute::compute_cell(self, ctx, cell, target, &mut Poly::default()),
        }
    }

    fn compute_slot_cell<T: FaceTag>(&self, ctx: &mut SearchContext, index: usize, slot: usize) -> Result<CellReport<T>> {
        let particle = self.blocks[index].particle(slot);
        let mut cell = Cell::new(self.max_len_sq, self.config);
        let target = self.target(self.block_coords(index), particle.position, particle.radius, Some(slot));
        if !self.run(ctx, &mut cell, &target, particle.id)? {
            cell.clear();
        }
        Ok(CellReport { id: particle.id, position: particle.position, radius: particle.radius, cell })
    }

    /// Computes the cell of the particle with the given id, or `None` if it is not stored.
    pub fn compute_cell<T: FaceTag>(&self, id: i32) -> Result<Option<CellReport<T>>> {
        let Some(&(index, slot)) = self.lookup.get(&id) else {
            return Ok(None);
        };
        let mut ctx = SearchContext::new();
        self.compute_slot_cell(&mut ctx, index, slot).map(Some)
    }

    /// Computes the cell a particle at `pos` would have, without inserting it.
    ///
    /// The cell is centered on `pos` mapped into the primary domain. Faces shared with
    /// the virtual particle's own images report [`GHOST_SELF_ID`].
    pub fn compute_ghost_cell<T: FaceTag>(&self, pos: [f64; 3], radius: f64) -> Result<Option<Cell<T>>> {
        if pos.iter().any(|v| !v.is_finite()) {
            return Ok(None);
        }
        let (b, x) = self.remap(pos);
        let mut ctx = SearchContext::new();
        let mut cell = Cell::new(self.max_len_sq, self.config);
        let radius = if self.kind == ContainerKind::Poly { radius } else { 0.0 };
        let target = self.target(b, x, radius, None);
        Ok(self.run(&mut ctx, &mut cell, &target, GHOST_SELF_ID)?.then_some(cell))
    }

    /// Computes every cell sequentially, in storage order.
    pub fn compute_all_cells<T: FaceTag>(&self) -> Result<Vec<CellReport<T>>> {
        let mut ctx = SearchContext::new();
        let mut out = Vec::with_capacity(self.total_particles());
        for (index, block) in self.blocks.iter().enumerate() {
            for slot in 0..block.len() {
                out.push(self.compute_slot_cell(&mut ctx, index, slot)?);
            }
        }
        Ok(out)
    }

    /// Sum of all cell volumes; equals the lattice cell volume.
    pub fn sum_cell_volumes(&self) -> Result<f64> {
        let mut ctx = SearchContext::new();
        let mut total = 0.0;
        for (index, block) in self.blocks.iter().enumerate() {
            for slot in 0..block.len() {
                let report: CellReport<()> = self.compute_slot_cell(&mut ctx, index, slot)?;
                total += report.cell.volume();
            }
        }
        Ok(total)
    }

    /// Finds the particle whose cell contains `pos`, with the position of its image
    /// closest to `pos`.
    pub fn find_voronoi_cell(&self, pos: [f64; 3]) -> Result<Option<(i32, [f64; 3])>> {
        if pos.iter().any(|v| !v.is_finite()) {
            return Ok(None);
        }
        let (b, x) = self.remap(pos);
        let mut ctx = SearchContext::new();
        let target = self.target(b, x, 0.0, None);
        let limit = self.config.max_list_memory;
        let found = match self.kind {
            ContainerKind::Mono => compute::find_voronoi_cell(self, &mut ctx, &target, &mut Mono, limit)?,
            ContainerKind::Poly => compute::find_voronoi_cell(self, &mut ctx, &target, &mut Poly::default(), limit)?,
        };
        let back = [pos[0] - x[0], pos[1] - x[1], pos[2] - x[2]];
        Ok(found.map(|(id, p)| (id, [p[0] + back[0], p[1] + back[1], p[2] + back[2]])))
    }
}

impl Domain for PeriodicContainer {
    fn search(&self) -> &SearchGrid {
        &self.search
    }

    fn region(&self, home: [i32; 3], e: [i32; 3]) -> Result<(&Block, [f64; 3])> {
        let nx = self.grid[0] as i32;
        let mut qi = home[0] + e[0] - nx;
        let qj = home[1] + e[1] - self.ey as i32;
        let qk = home[2] + e[2] - self.ez as i32;
        if qj < 0 || qj >= self.oy as i32 || qk < 0 || qk >= self.oz as i32 {
            return Err(VoroError::Internal("block search left the periodic halo"));
        }
        let iv = qi.div_euclid(nx);
        qi -= iv * nx;
        let shift = [iv as f64 * self.lattice.bx, 0.0, 0.0];
        let (qi, qj, qk) = (qi as usize, qj as usize, qk as usize);
        if self.is_primary(qj, qk) {
            return Ok((&self.blocks[self.block_index([qi, qj - self.ey, qk - self.ez])], shift));
        }
        Ok((self.image_block(qi, qj, qk)?, shift))
    }

    fn max_radius(&self) -> f64 {
        self.max_radius
    }
}

impl ParticleContainer for PeriodicContainer {
    fn total_particles(&self) -> usize {
        PeriodicContainer::total_particles(self)
    }

    fn slots(&self) -> Vec<(usize, usize)> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(index, block)| (0..block.len()).map(move |slot| (index, slot)))
            .collect()
    }

    fn compute_slot<T: FaceTag>(&self, ctx: &mut SearchContext, slot: (usize, usize)) -> Result<CellReport<T>> {
        self.compute_slot_cell(ctx, slot.0, slot.1)
    }
}
