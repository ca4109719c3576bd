//! Particle storage on a rectangular block grid.
//!
//! [`Container`] holds an axis-aligned domain, periodic or not per axis, with optional walls.
//! [`PeriodicContainer`] holds a triclinic domain that is periodic along all three lattice
//! vectors. Both sort particles into blocks so that the cell search can visit neighbors in
//! order of distance.

pub mod periodic;

pub use periodic::PeriodicContainer;

use std::collections::HashMap;
use std::io::BufRead;

use log::{debug, warn};

use crate::bounds::BoundingBox;
use crate::cell::{Cell, FaceTag};
use crate::compute::{self, Domain, SearchContext, SearchGrid, Target};
use crate::config::{grow, Config};
use crate::error::{Result, VoroError};
use crate::radius::{Mono, Poly};
use crate::tessellation::{CellReport, ParticleContainer};
use crate::wall::Wall;

/// Plain Voronoi or radical tessellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainerKind {
    #[default]
    Mono,
    /// Particles carry radii and cells follow the radical (power) distance.
    Poly,
}

/// A stored particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub id: i32,
    pub position: [f64; 3],
    pub radius: f64,
}

/// Particles of one block, stored as parallel arrays.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub(crate) ids: Vec<i32>,
    pub(crate) pos: Vec<[f64; 3]>,
    /// Empty unless the container stores radii.
    pub(crate) radii: Vec<f64>,
}

impl Block {
    pub(crate) fn with_capacity(n: usize, poly: bool) -> Self {
        Self {
            ids: Vec::with_capacity(n),
            pos: Vec::with_capacity(n),
            radii: if poly { Vec::with_capacity(n) } else { Vec::new() },
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub(crate) fn radius(&self, l: usize) -> f64 {
        self.radii.get(l).copied().unwrap_or(0.0)
    }

    pub(crate) fn particle(&self, l: usize) -> Particle {
        Particle { id: self.ids[l], position: self.pos[l], radius: self.radius(l) }
    }

    /// Appends a particle, doubling the block storage when full.
    pub(crate) fn push(&mut self, id: i32, pos: [f64; 3], radius: Option<f64>, limit: usize) -> Result<usize> {
        if self.ids.len() == self.ids.capacity() {
            let next = grow("particle", self.ids.capacity(), limit)?;
            let extra = next - self.ids.len();
            self.ids.reserve_exact(extra);
            self.pos.reserve_exact(extra);
            if radius.is_some() {
                self.radii.reserve_exact(extra);
            }
        }
        self.ids.push(id);
        self.pos.push(pos);
        if let Some(r) = radius {
            self.radii.push(r);
        }
        Ok(self.ids.len() - 1)
    }
}

/// Parses one `id x y z [r]` record.
pub(crate) fn parse_record(line: &str, number: usize, with_radius: bool) -> Result<Option<(i32, [f64; 3], f64)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = if with_radius { 5 } else { 4 };
    if fields.len() != expected {
        return Err(VoroError::Parse {
            line: number,
            message: format!("expected {} fields, found {}", expected, fields.len()),
        });
    }
    let id = fields[0].parse::<i32>().map_err(|e| VoroError::Parse { line: number, message: format!("id: {}", e) })?;
    let mut values = [0.0; 4];
    for (v, field) in values.iter_mut().zip(&fields[1..]) {
        *v = field
            .parse::<f64>()
            .map_err(|e| VoroError::Parse { line: number, message: format!("{:?}: {}", field, e) })?;
    }
    Ok(Some((id, [values[0], values[1], values[2]], values[3])))
}

/// An axis-aligned box divided into blocks, periodic or not along each axis.
#[derive(Debug)]
pub struct Container {
    bounds: BoundingBox<3>,
    periodic: [bool; 3],
    grid: [usize; 3],
    kind: ContainerKind,
    blocks: Vec<Block>,
    walls: Vec<Wall>,
    lookup: HashMap<i32, (usize, usize)>,
    max_radius: f64,
    config: Config,
    search: SearchGrid,
}

impl Container {
    /// Creates a new `Container`.
    ///
    /// # Arguments
    ///
    /// * `bounds` - The domain.
    /// * `grid` - Number of blocks along each axis, see [`crate::config::optimal_grid`].
    /// * `periodic` - Periodicity of each axis.
    /// * `kind` - Whether particles carry radii.
    pub fn new(bounds: BoundingBox<3>, grid: [usize; 3], periodic: [bool; 3], kind: ContainerKind) -> Result<Self> {
        Self::with_config(bounds, grid, periodic, kind, Config::default())
    }

    pub fn with_config(
        bounds: BoundingBox<3>,
        grid: [usize; 3],
        periodic: [bool; 3],
        kind: ContainerKind,
        config: Config,
    ) -> Result<Self> {
        bounds.validate()?;
        if grid.contains(&0) {
            return Err(VoroError::InvalidGrid(format!("block counts must be positive, got {:?}", grid)));
        }
        let extent = bounds.extent();
        let box_size = [
            extent[0] / grid[0] as f64,
            extent[1] / grid[1] as f64,
            extent[2] / grid[2] as f64,
        ];
        let mut window = grid;
        for a in 0..3 {
            if periodic[a] {
                window[a] = 2 * grid[a] + 1;
            }
        }
        let poly = kind == ContainerKind::Poly;
        let blocks = (0..grid[0] * grid[1] * grid[2])
            .map(|_| Block::with_capacity(config.init_particle_memory, poly))
            .collect();
        debug!("container {:?} with {:?} blocks, periodic {:?}", bounds, grid, periodic);
        Ok(Self {
            bounds,
            periodic,
            grid,
            kind,
            blocks,
            walls: Vec::with_capacity(config.init_wall_size),
            lookup: HashMap::new(),
            max_radius: 0.0,
            config,
            search: SearchGrid::new(box_size, window),
        })
    }

    pub fn bounds(&self) -> &BoundingBox<3> {
        &self.bounds
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Adds a wall; every cell computed afterwards is clipped by it.
    pub fn add_wall(&mut self, wall: Wall) {
        self.walls.push(wall);
    }

    pub fn clear_walls(&mut self) {
        self.walls.clear();
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

    /// Block containing `pos` and the position mapped into the primary domain.
    ///
    /// Returns `None` if `pos` is not finite or lies outside a non-periodic axis.
    fn locate(&self, pos: [f64; 3]) -> Option<([usize; 3], [f64; 3])> {
        if !pos.iter().all(|c| c.is_finite()) {
            return None;
        }
        let extent = self.bounds.extent();
        let mut b = [0usize; 3];
        let mut x = pos;
        for a in 0..3 {
            let n = self.grid[a] as i64;
            let mut i = ((x[a] - self.bounds.min[a]) * self.search.inv[a]).floor() as i64;
            if self.periodic[a] {
                if i < 0 || i >= n {
                    let w = i.div_euclid(n);
                    x[a] -= w as f64 * extent[a];
                    i -= w * n;
                }
            } else if x[a] < self.bounds.min[a] || x[a] > self.bounds.max[a] {
                return None;
            }
            b[a] = i.clamp(0, n - 1) as usize;
        }
        Some((b, x))
    }

    /// Rejects a particle that coincides with one already stored.
    fn check_duplicate(&self, id: i32, b: [usize; 3], pos: [f64; 3]) -> Result<()> {
        let tol = self.config.duplicate_tolerance_sq;
        let extent = self.bounds.extent();
        for dk in -1..=1i64 {
            for dj in -1..=1i64 {
                for di in -1..=1i64 {
                    let d = [di, dj, dk];
                    let mut q = [0usize; 3];
                    let mut shift = [0.0; 3];
                    let mut valid = true;
                    for a in 0..3 {
                        let n = self.grid[a] as i64;
                        let mut c = b[a] as i64 + d[a];
                        if c < 0 || c >= n {
                            if !self.periodic[a] {
                                valid = false;
                                break;
                            }
                            let w = c.div_euclid(n);
                            c -= w * n;
                            shift[a] = w as f64 * extent[a];
                        }
                        q[a] = c as usize;
                    }
                    if !valid {
                        continue;
                    }
                    let block = &self.blocks[self.block_index(q)];
                    for l in 0..block.len() {
                        let p = block.pos[l];
                        let dx = p[0] + shift[0] - pos[0];
                        let dy = p[1] + shift[1] - pos[1];
                        let dz = p[2] + shift[2] - pos[2];
                        if dx * dx + dy * dy + dz * dz < tol {
                            return Err(VoroError::DuplicateParticle { id, other: block.ids[l], position: pos });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, id: i32, pos: [f64; 3], radius: Option<f64>) -> Result<()> {
        let Some((b, x)) = self.locate(pos) else {
            warn!("particle {} at {:?} lies outside the domain", id, pos);
            return Err(VoroError::OutsideDomain { id, position: pos });
        };
        self.check_duplicate(id, b, x)?;
        let index = self.block_index(b);
        let slot = self.blocks[index].push(id, x, radius, self.config.max_particle_memory)?;
        self.lookup.insert(id, (index, slot));
        if let Some(r) = radius {
            self.max_radius = self.max_radius.max(r);
        }
        Ok(())
    }

    /// Inserts a particle, wrapping it into the primary domain along periodic axes.
    ///
    /// In a [`ContainerKind::Poly`] container the particle gets radius zero.
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

    /// Reads `id x y z` records, or `id x y z r` records for a
    /// [`ContainerKind::Poly`] container, one per line. Blank lines and lines starting
    /// with `#` are skipped.
    ///
    /// Returns the number of particles inserted.
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

    /// Removes every particle, keeping walls and grid.
    pub fn clear(&mut self) {
        for block in self.blocks.iter_mut() {
            block.ids.clear();
            block.pos.clear();
            block.radii.clear();
        }
        self.lookup.clear();
        self.max_radius = 0.0;
    }

    pub fn total_particles(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }

    /// Particle count of every block, x fastest.
    pub fn region_count(&self) -> Vec<usize> {
        self.blocks.iter().map(Block::len).collect()
    }

    pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
        self.blocks.iter().flat_map(|b| (0..b.len()).map(move |l| b.particle(l)))
    }

    pub fn particle(&self, id: i32) -> Option<Particle> {
        self.lookup.get(&id).map(|&(b, l)| self.blocks[b].particle(l))
    }

    /// True if `pos` lies inside the domain (bounds inclusive on non-periodic axes) and
    /// inside every wall.
    pub fn point_inside(&self, pos: [f64; 3]) -> bool {
        for a in 0..3 {
            if !self.periodic[a] && (pos[a] < self.bounds.min[a] || pos[a] > self.bounds.max[a]) {
                return false;
            }
        }
        self.walls.iter().all(|w| w.contains(&pos))
    }

    /// Squared length scale used for the cell tolerance; periodic axes count half.
    fn squared_length(&self) -> f64 {
        let extent = self.bounds.extent();
        (0..3)
            .map(|a| {
                let l = if self.periodic[a] { 0.5 * extent[a] } else { extent[a] };
                l * l
            })
            .sum()
    }

    /// Resets `cell` to the domain box around `pos` and applies the walls.
    fn init_cell<T: FaceTag>(&self, cell: &mut Cell<T>, pos: [f64; 3]) -> Result<bool> {
        let extent = self.bounds.extent();
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for a in 0..3 {
            if self.periodic[a] {
                lo[a] = -0.5 * extent[a];
                hi[a] = 0.5 * extent[a];
            } else {
                lo[a] = self.bounds.min[a] - pos[a];
                hi[a] = self.bounds.max[a] - pos[a];
            }
        }
        cell.init_box(lo[0], hi[0], lo[1], hi[1], lo[2], hi[2]);
        for wall in &self.walls {
            if !wall.apply(cell, &pos)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn target<'a>(&'a self, b: [usize; 3], pos: [f64; 3], radius: f64, skip: Option<usize>) -> Target<'a> {
        let mut origin = [0i32; 3];
        let mut frac = [0.0; 3];
        for a in 0..3 {
            origin[a] = if self.periodic[a] { self.grid[a] as i32 } else { b[a] as i32 };
            frac[a] = pos[a] - self.bounds.min[a] - self.search.box_size[a] * b[a] as f64;
        }
        Target {
            pos,
            radius,
            home: &self.blocks[self.block_index(b)],
            skip,
            block: [b[0] as i32, b[1] as i32, b[2] as i32],
            origin,
            frac,
        }
    }

    fn run<T: FaceTag>(&self, ctx: &mut SearchContext, cell: &mut Cell<T>, target: &Target<'_>) -> Result<bool> {
        if !self.init_cell(cell, target.pos)? {
            return Ok(false);
        }
        match self.kind {
            ContainerKind::Mono => compute::compute_cell(self, ctx, cell, target, &mut Mono),
            ContainerKind::Poly => compute::compute_cell(self, ctx, cell, target, &mut Poly::default()),
        }
    }

    /// Computes the cell of the particle in `slot` of block `index`.
    fn compute_slot_cell<T: FaceTag>(&self, ctx: &mut SearchContext, index: usize, slot: usize) -> Result<CellReport<T>> {
        let particle = self.blocks[index].particle(slot);
        let mut cell = Cell::new(self.squared_length(), self.config);
        let target = self.target(self.block_coords(index), particle.position, particle.radius, Some(slot));
        if !self.run(ctx, &mut cell, &target)? {
            cell.clear();
        }
        Ok(CellReport { id: particle.id, position: particle.position, radius: particle.radius, cell })
    }

    /// Computes the cell of the particle with the given id.
    ///
    /// Returns `None` if no such particle is stored. The cell is empty if walls remove
    /// it completely.
    pub fn compute_cell<T: FaceTag>(&self, id: i32) -> Result<Option<CellReport<T>>> {
        let Some(&(index, slot)) = self.lookup.get(&id) else {
            return Ok(None);
        };
        let mut ctx = SearchContext::new();
        self.compute_slot_cell(&mut ctx, index, slot).map(Some)
    }

    /// Computes the cell a particle at `pos` would have, without inserting it.
    ///
    /// Returns `None` if `pos` lies outside the domain or the cell is empty.
    pub fn compute_ghost_cell<T: FaceTag>(&self, pos: [f64; 3], radius: f64) -> Result<Option<Cell<T>>> {
        let Some((b, x)) = self.locate(pos) else {
            return Ok(None);
        };
        let mut ctx = SearchContext::new();
        let mut cell = Cell::new(self.squared_length(), self.config);
        let radius = if self.kind == ContainerKind::Poly { radius } else { 0.0 };
        let target = self.target(b, x, radius, None);
        Ok(self.run(&mut ctx, &mut cell, &target)?.then_some(cell))
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

    /// Sum of all cell volumes; equals the domain volume when no wall cuts it.
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

    /// Finds the particle whose cell contains `pos`.
    ///
    /// Returns the particle id and the position of its image closest to `pos`, or `None`
    /// if `pos` is outside the domain or the container is empty.
    pub fn find_voronoi_cell(&self, pos: [f64; 3]) -> Result<Option<(i32, [f64; 3])>> {
        let Some((b, x)) = self.locate(pos) else {
            return Ok(None);
        };
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

impl Domain for Container {
    fn search(&self) -> &SearchGrid {
        &self.search
    }

    fn region(&self, home: [i32; 3], e: [i32; 3]) -> Result<(&Block, [f64; 3])> {
        let extent = self.bounds.extent();
        let mut b = [0usize; 3];
        let mut shift = [0.0; 3];
        for a in 0..3 {
            let n = self.grid[a] as i32;
            let mut q = if self.periodic[a] { home[a] + e[a] - n } else { e[a] };
            if q < 0 || q >= n {
                if !self.periodic[a] {
                    return Err(VoroError::Internal("block search left a non-periodic domain"));
                }
                let w = q.div_euclid(n);
                q -= w * n;
                shift[a] = w as f64 * extent[a];
            }
            b[a] = q as usize;
        }
        Ok((&self.blocks[self.block_index(b)], shift))
    }

    fn max_radius(&self) -> f64 {
        self.max_radius
    }
}

impl ParticleContainer for Container {
    fn total_particles(&self) -> usize {
        Container::total_particles(self)
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
