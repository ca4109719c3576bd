//! Neighbor search driving the plane cuts of a single cell.
//!
//! A cell starts as the domain box (clipped by walls) and is cut by the other particles of
//! its own block. The blocks of the precomputed worklist follow, nearest first, and the
//! search stops once the worklist bound proves that no remaining block can reach the cell.
//! If the worklist runs out first, a breadth-first search over blocks takes over; every
//! queued block is first probed with a few planes through its corners before its particles
//! are tested.

use std::collections::VecDeque;

use crate::cell::{Cell, FaceTag};
use crate::config::grow;
use crate::container::Block;
use crate::error::{Result, VoroError};
use crate::radius::RadiusPolicy;
use crate::worklist::{face_bit, Worklists, FGRID, HGRID};

/// Worklist positions at which the cell radius is recomputed.
const COUNT_LIST: [usize; 8] = [7, 11, 15, 19, 26, 35, 45, 59];

#[inline]
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn norm2(a: [f64; 3]) -> f64 {
    a[0] * a[0] + a[1] * a[1] + a[2] * a[2]
}

/// Block geometry and search window shared by all cells of a container.
///
/// Window coordinates address the blocks a search may visit. For non-periodic axes they
/// coincide with block indices; periodic axes extend the window over neighboring images.
#[derive(Clone, Debug)]
pub(crate) struct SearchGrid {
    pub(crate) box_size: [f64; 3],
    pub(crate) inv: [f64; 3],
    pub(crate) window: [i32; 3],
    pub(crate) worklists: Worklists,
}

impl SearchGrid {
    pub(crate) fn new(box_size: [f64; 3], window: [usize; 3]) -> Self {
        Self {
            box_size,
            inv: [1.0 / box_size[0], 1.0 / box_size[1], 1.0 / box_size[2]],
            window: [window[0] as i32, window[1] as i32, window[2] as i32],
            worklists: Worklists::new(box_size),
        }
    }

    fn window_len(&self) -> usize {
        self.window.iter().map(|&w| w as usize).product()
    }

    #[inline]
    fn window_index(&self, e: [i32; 3]) -> Option<usize> {
        if (0..3).any(|a| e[a] < 0 || e[a] >= self.window[a]) {
            return None;
        }
        let w = self.window;
        Some((e[0] + w[0] * (e[1] + w[1] * e[2])) as usize)
    }
}

/// Particle storage as seen by the search.
pub(crate) trait Domain: Sync {
    fn search(&self) -> &SearchGrid;

    /// Block at window coordinates `e` for a search started in block `home`, together with
    /// the displacement to add to its particle positions.
    fn region(&self, home: [i32; 3], e: [i32; 3]) -> Result<(&Block, [f64; 3])>;

    /// Largest particle radius stored; zero for plain Voronoi containers.
    fn max_radius(&self) -> f64;
}

/// The particle (or query point) a search is centered on.
pub(crate) struct Target<'a> {
    pub(crate) pos: [f64; 3],
    pub(crate) radius: f64,
    pub(crate) home: &'a Block,
    /// Slot of the particle itself inside `home`.
    pub(crate) skip: Option<usize>,
    /// Block coordinates of `home` in the container.
    pub(crate) block: [i32; 3],
    /// Window coordinates of `home`.
    pub(crate) origin: [i32; 3],
    /// Position relative to the lower corner of `home`.
    pub(crate) frac: [f64; 3],
}

/// Scratch state of the block search: visit mask with a generation counter and the
/// block queue.
///
/// One context serves any number of consecutive searches on any container; bulk
/// tessellations create one per worker thread.
#[derive(Debug, Default)]
pub struct SearchContext {
    mask: Vec<u32>,
    mv: u32,
    queue: VecDeque<[i32; 3]>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, len: usize) {
        if self.mask.len() != len {
            self.mask = vec![0; len];
            self.mv = 0;
        }
        self.mv = self.mv.wrapping_add(1);
        if self.mv == 0 {
            self.mask.fill(0);
            self.mv = 1;
        }
        self.queue.clear();
    }

    /// Marks `e` and queues it unless already seen.
    #[inline]
    fn visit(&mut self, grid: &SearchGrid, e: [i32; 3], limit: usize) -> Result<()> {
        let Some(ix) = grid.window_index(e) else {
            return Ok(());
        };
        if self.mask[ix] == self.mv {
            return Ok(());
        }
        self.mask[ix] = self.mv;
        if self.queue.len() == self.queue.capacity() {
            let next = grow("list", self.queue.capacity(), limit)?;
            self.queue.reserve_exact(next - self.queue.len());
        }
        self.queue.push_back(e);
        Ok(())
    }

    #[inline]
    fn mark(&mut self, grid: &SearchGrid, e: [i32; 3]) {
        if let Some(ix) = grid.window_index(e) {
            self.mask[ix] = self.mv;
        }
    }
}

/// Worklist choice for a position inside its block: the subregion in the stored octant,
/// the axes to mirror, and the squared distances to the far side of the block per axis.
fn subregion(grid: &SearchGrid, frac: [f64; 3], far_side: bool) -> ([usize; 3], [bool; 3], [f64; 3]) {
    let mut sub = [0usize; 3];
    let mut flip = [false; 3];
    let mut side = [0.0; 3];
    for a in 0..3 {
        let d = (frac[a] * grid.inv[a] * FGRID as f64).floor().max(0.0) as usize;
        let (upper, lower) = (grid.box_size[a] - frac[a], frac[a]);
        if d >= HGRID {
            flip[a] = true;
            sub[a] = (FGRID - 1).saturating_sub(d);
            side[a] = if far_side { lower } else { upper };
        } else {
            sub[a] = d;
            side[a] = if far_side { upper } else { lower };
        }
    }
    (sub, flip, side)
}

/// Squared minimum and maximum distance from the target to the block at offset `d`.
///
/// Returns `None` if the block is out of reach at the minimum distance.
fn min_max_radius<R: RadiusPolicy>(
    grid: &SearchGrid,
    policy: &R,
    d: [i32; 3],
    frac: [f64; 3],
    gs: [f64; 3],
    mrs: f64,
) -> Option<f64> {
    let mut near = 0.0;
    let mut far = 0.0;
    for a in 0..3 {
        let b = grid.box_size[a];
        if d[a] > 0 {
            let lo = d[a] as f64 * b - frac[a];
            near += lo * lo;
            far += (lo + b) * (lo + b);
        } else if d[a] < 0 {
            let lo = (d[a] + 1) as f64 * b - frac[a];
            near += lo * lo;
            far += (lo - b) * (lo - b);
        } else {
            far += gs[a];
        }
    }
    if policy.ctest(near, mrs) { None } else { Some(far) }
}

fn min_radius(grid: &SearchGrid, d: [i32; 3], frac: [f64; 3]) -> f64 {
    let mut crs = 0.0;
    for a in 0..3 {
        let b = grid.box_size[a];
        let t = if d[a] > 0 {
            d[a] as f64 * b - frac[a]
        } else if d[a] < 0 {
            (d[a] + 1) as f64 * b - frac[a]
        } else {
            0.0
        };
        crs += t * t;
    }
    crs
}

/// Cuts `cell` by every particle of `block`. With `mrs` set, particles that cannot
/// reach the cell are skipped. Returns `Ok(false)` once the cell is destroyed.
fn cut_block<T: FaceTag, R: RadiusPolicy>(
    cell: &mut Cell<T>,
    policy: &R,
    block: &Block,
    shift: [f64; 3],
    pos: [f64; 3],
    skip: Option<usize>,
    mrs: Option<f64>,
) -> Result<bool> {
    let origin = sub(pos, shift);
    for l in 0..block.len() {
        if skip == Some(l) {
            continue;
        }
        let rel = sub(block.pos[l], origin);
        let rs = norm2(rel);
        let scaled = match mrs {
            None => policy.scale(rs, block.radius(l)),
            Some(mrs) => match policy.scale_check(rs, block.radius(l), mrs) {
                Some(s) => s,
                None => continue,
            },
        };
        if !cell.cut(rel, scaled, block.ids[l])? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Probes the cell with planes through points of a block.
///
/// `l` holds the block coordinates nearest to the target, `h` the furthest; axes with a
/// zero offset contribute their full extent. Returns true if no particle in the block can
/// cut the cell.
fn block_out_of_reach<T: FaceTag, R: RadiusPolicy>(
    cell: &mut Cell<T>,
    policy: &mut R,
    d: [i32; 3],
    lo: [f64; 3],
    hi: [f64; 3],
) -> bool {
    let mut l = lo;
    let mut h = hi;
    for a in 0..3 {
        if d[a] < 0 {
            l[a] = hi[a];
            h[a] = lo[a];
        }
    }
    let active = [d[0] != 0, d[1] != 0, d[2] != 0];
    let points: &[[bool; 3]] = match active {
        [true, true, true] => &[
            [true, false, false],
            [true, true, false],
            [false, true, false],
            [false, true, true],
            [false, false, true],
            [true, false, true],
        ],
        [false, true, true] => &[
            [false, false, true],
            [true, false, true],
            [true, false, false],
            [false, false, false],
            [false, true, false],
            [true, true, false],
        ],
        [true, false, true] => &[
            [false, false, true],
            [false, true, true],
            [false, true, false],
            [false, false, false],
            [true, false, false],
            [true, true, false],
        ],
        [true, true, false] => &[
            [false, true, false],
            [false, true, true],
            [false, false, true],
            [false, false, false],
            [true, false, false],
            [true, false, true],
        ],
        [true, false, false] => &[[false, false, false], [false, false, true], [false, true, true], [false, true, false]],
        [false, true, false] => &[[false, false, false], [false, false, true], [true, false, true], [true, false, false]],
        [false, false, true] => &[[false, false, false], [false, true, false], [true, true, false], [true, false, false]],
        [false, false, false] => return false,
    };

    let mut prime = 0.0;
    for a in 0..3 {
        if active[a] {
            prime += l[a] * l[a];
        }
    }
    policy.prime(prime);
    for (n, pick) in points.iter().enumerate() {
        let mut v = [0.0; 3];
        let mut rsq = 0.0;
        for a in 0..3 {
            v[a] = if pick[a] { h[a] } else { l[a] };
            if active[a] {
                rsq += l[a] * v[a];
            }
        }
        let rsq = policy.cutoff(rsq);
        let hit = if n == 0 {
            cell.plane_intersects_guess(v, rsq)
        } else {
            cell.plane_intersects(v, rsq)
        };
        if hit {
            return false;
        }
    }
    true
}

#[inline]
fn offset(origin: [i32; 3], d: [i32; 3]) -> [i32; 3] {
    [origin[0] + d[0], origin[1] + d[1], origin[2] + d[2]]
}

/// Queues the neighbors of `e` that the worklist entry marks as not listed.
fn seed_open_faces(ctx: &mut SearchContext, grid: &SearchGrid, e: [i32; 3], open: u8, limit: usize) -> Result<()> {
    for axis in 0..3 {
        for positive in [false, true] {
            if open & face_bit(axis, positive) != 0 {
                let mut n = e;
                n[axis] += if positive { 1 } else { -1 };
                ctx.visit(grid, n, limit)?;
            }
        }
    }
    Ok(())
}

fn queue_neighbors(ctx: &mut SearchContext, grid: &SearchGrid, e: [i32; 3], limit: usize) -> Result<()> {
    for axis in [2, 1, 0] {
        for step in [-1, 1] {
            let mut n = e;
            n[axis] += step;
            ctx.visit(grid, n, limit)?;
        }
    }
    Ok(())
}

/// Computes the cell of `target` given a cell already initialized to the domain.
///
/// Returns `Ok(false)` if the cell was cut away completely.
pub(crate) fn compute_cell<D, T, R>(
    domain: &D,
    ctx: &mut SearchContext,
    cell: &mut Cell<T>,
    target: &Target<'_>,
    policy: &mut R,
) -> Result<bool>
where
    D: Domain + ?Sized,
    T: FaceTag,
    R: RadiusPolicy,
{
    let grid = domain.search();
    let limit = cell.config().max_list_memory;
    let pos = target.pos;
    policy.init(target.radius, domain.max_radius().max(target.radius));

    if !cut_block(cell, policy, target.home, [0.0; 3], pos, target.skip, None)? {
        return Ok(false);
    }
    let mut mrs = 4.0 * cell.max_radius_squared();

    let (sub_index, flip, far) = subregion(grid, target.frac, true);
    let gs = [far[0] * far[0], far[1] * far[1], far[2] * far[2]];
    let list = grid.worklists.get(sub_index);

    let mut next_count = 3;
    let mut count_i = 0;
    let mut g = 0;

    // Blocks whose neighbors are all listed: no bookkeeping for the queue.
    while g < list.inner {
        if g == next_count {
            mrs = 4.0 * cell.max_radius_squared();
            if let Some(&c) = COUNT_LIST.get(count_i) {
                next_count = c;
                count_i += 1;
            }
        }
        if policy.ctest(list.bounds[g], mrs) {
            return Ok(true);
        }
        let entry = list.entries[g].reflected(flip);
        g += 1;
        let e = offset(target.origin, entry.offset);
        if grid.window_index(e).is_none() {
            continue;
        }
        let Some(crs) = min_max_radius(grid, policy, entry.offset, target.frac, gs, mrs) else {
            continue;
        };
        let (block, shift) = domain.region(target.block, e)?;
        let check = policy.ctest(crs, mrs).then_some(mrs);
        if !cut_block(cell, policy, block, shift, pos, None, check)? {
            return Ok(false);
        }
    }

    ctx.begin(grid.window_len());
    ctx.mark(grid, target.origin);
    for entry in &list.entries[..list.inner] {
        let e = offset(target.origin, entry.reflected(flip).offset);
        ctx.mark(grid, e);
    }

    while g < list.entries.len() {
        if g == next_count {
            mrs = 4.0 * cell.max_radius_squared();
            if let Some(&c) = COUNT_LIST.get(count_i) {
                next_count = c;
                count_i += 1;
            }
        }
        if policy.ctest(list.bounds[g], mrs) {
            return Ok(true);
        }
        let entry = list.entries[g].reflected(flip);
        g += 1;
        let e = offset(target.origin, entry.offset);
        if grid.window_index(e).is_none() {
            continue;
        }
        ctx.mark(grid, e);
        let Some(crs) = min_max_radius(grid, policy, entry.offset, target.frac, gs, mrs) else {
            continue;
        };
        let (block, shift) = domain.region(target.block, e)?;
        let check = policy.ctest(crs, mrs).then_some(mrs);
        if !cut_block(cell, policy, block, shift, pos, None, check)? {
            return Ok(false);
        }
        seed_open_faces(ctx, grid, e, entry.open, limit)?;
    }

    if policy.ctest(list.bounds[list.entries.len()], mrs) {
        return Ok(true);
    }

    while let Some(e) = ctx.queue.pop_front() {
        let d = [e[0] - target.origin[0], e[1] - target.origin[1], e[2] - target.origin[2]];
        if d == [0, 0, 0] {
            return Err(VoroError::Internal("block search revisited the home block"));
        }
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for a in 0..3 {
            lo[a] = d[a] as f64 * grid.box_size[a] - target.frac[a];
            hi[a] = lo[a] + grid.box_size[a];
        }
        if block_out_of_reach(cell, policy, d, lo, hi) {
            continue;
        }
        let (block, shift) = domain.region(target.block, e)?;
        if !cut_block(cell, policy, block, shift, pos, None, None)? {
            return Ok(false);
        }
        queue_neighbors(ctx, grid, e, limit)?;
    }
    Ok(true)
}

/// Closest particle under the (radical) distance.
struct Nearest {
    rs: f64,
    found: Option<(i32, [f64; 3])>,
}

impl Nearest {
    fn scan<R: RadiusPolicy>(&mut self, policy: &R, block: &Block, shift: [f64; 3], pos: [f64; 3]) {
        for l in 0..block.len() {
            let image = [block.pos[l][0] + shift[0], block.pos[l][1] + shift[1], block.pos[l][2] + shift[2]];
            let rs = policy.current_sub(norm2(sub(image, pos)), block.radius(l));
            if rs < self.rs {
                self.rs = rs;
                self.found = Some((block.ids[l], image));
            }
        }
    }
}

/// Finds the particle whose cell contains `target.pos`.
///
/// Returns the particle id and the position of the image closest to the query.
pub(crate) fn find_voronoi_cell<D, R>(
    domain: &D,
    ctx: &mut SearchContext,
    target: &Target<'_>,
    policy: &mut R,
    limit: usize,
) -> Result<Option<(i32, [f64; 3])>>
where
    D: Domain + ?Sized,
    R: RadiusPolicy,
{
    let grid = domain.search();
    let pos = target.pos;
    policy.init(0.0, domain.max_radius());
    let mut best = Nearest { rs: f64::MAX, found: None };
    best.scan(policy, target.home, [0.0; 3], pos);

    let (sub_index, flip, near) = subregion(grid, target.frac, false);
    let rs = policy.max_add(best.rs);
    if near.iter().all(|&m| m * m > rs) {
        return Ok(best.found);
    }
    let list = grid.worklists.get(sub_index);

    let mut g = 0;
    while g < list.inner {
        if policy.max_add(best.rs) < list.bounds[g] {
            return Ok(best.found);
        }
        let entry = list.entries[g].reflected(flip);
        g += 1;
        let e = offset(target.origin, entry.offset);
        if grid.window_index(e).is_none() {
            continue;
        }
        if min_radius(grid, entry.offset, target.frac) > policy.max_add(best.rs) {
            continue;
        }
        let (block, shift) = domain.region(target.block, e)?;
        best.scan(policy, block, shift, pos);
    }

    ctx.begin(grid.window_len());
    ctx.mark(grid, target.origin);
    for entry in &list.entries[..list.inner] {
        ctx.mark(grid, offset(target.origin, entry.reflected(flip).offset));
    }

    while g < list.entries.len() {
        if policy.max_add(best.rs) < list.bounds[g] {
            return Ok(best.found);
        }
        let entry = list.entries[g].reflected(flip);
        g += 1;
        let e = offset(target.origin, entry.offset);
        if grid.window_index(e).is_none() {
            continue;
        }
        ctx.mark(grid, e);
        if min_radius(grid, entry.offset, target.frac) > policy.max_add(best.rs) {
            continue;
        }
        let (block, shift) = domain.region(target.block, e)?;
        best.scan(policy, block, shift, pos);
        seed_open_faces(ctx, grid, e, entry.open, limit)?;
    }

    if policy.max_add(best.rs) < list.bounds[list.entries.len()] {
        return Ok(best.found);
    }

    while let Some(e) = ctx.queue.pop_front() {
        let d = [e[0] - target.origin[0], e[1] - target.origin[1], e[2] - target.origin[2]];
        if min_radius(grid, d, target.frac) > policy.max_add(best.rs) {
            continue;
        }
        let (block, shift) = domain.region(target.block, e)?;
        best.scan(policy, block, shift, pos);
        queue_neighbors(ctx, grid, e, limit)?;
    }
    Ok(best.found)
}
