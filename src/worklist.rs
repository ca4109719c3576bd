//! Block visiting orders for the cell search.
//!
//! The home block is split into `FGRID³` subregions. For each subregion of the lower octant
//! (`HGRID³` of them) a worklist holds the nearest neighbor block offsets, sorted by their
//! minimum distance from the subregion, together with suffix minima of that distance.
//! Particles in the upper half along an axis reuse the list of the mirrored subregion with
//! that offset component negated.

/// Subregions per axis in the lower half of a block.
pub const HGRID: usize = 4;
/// Subregions per axis across a whole block.
pub const FGRID: usize = 8;
/// Maximum number of entries per worklist.
pub const SEQ_LENGTH: usize = 63;

const REACH: i32 = 8;

/// Neighbor bit for face `2 * axis + (1 if positive side)`.
#[inline]
pub const fn face_bit(axis: usize, positive: bool) -> u8 {
    1 << (2 * axis + positive as usize)
}

/// One block to visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkEntry {
    pub offset: [i32; 3],
    /// Faces whose neighbor block is neither in the list nor the home block.
    pub open: u8,
}

impl WorkEntry {
    /// The entry for a particle in the mirrored half of the block along the flagged axes.
    #[inline]
    pub fn reflected(self, flip: [bool; 3]) -> Self {
        let mut offset = self.offset;
        let mut open = self.open;
        for axis in 0..3 {
            if flip[axis] {
                offset[axis] = -offset[axis];
                let lo = open & face_bit(axis, false) != 0;
                let hi = open & face_bit(axis, true) != 0;
                open &= !(face_bit(axis, false) | face_bit(axis, true));
                if lo {
                    open |= face_bit(axis, true);
                }
                if hi {
                    open |= face_bit(axis, false);
                }
            }
        }
        Self { offset, open }
    }
}

/// Visiting order for one subregion.
#[derive(Clone, Debug)]
pub struct Worklist {
    pub entries: Vec<WorkEntry>,
    /// `bounds[g]` is a lower bound on the squared distance from the subregion to entry `g`
    /// and every block after it; `bounds[entries.len()]` covers all blocks not listed.
    pub bounds: Vec<f64>,
    /// Leading entries whose six neighbors are all listed; they never seed the block queue.
    pub inner: usize,
}

#[derive(Clone, Debug)]
pub struct Worklists {
    lists: Vec<Worklist>,
}

impl Worklists {
    /// Builds the worklists for blocks of the given size.
    pub fn new(block: [f64; 3]) -> Self {
        let mut lists = Vec::with_capacity(HGRID * HGRID * HGRID);
        for dk in 0..HGRID {
            for dj in 0..HGRID {
                for di in 0..HGRID {
                    lists.push(Self::generate([di, dj, dk], block));
                }
            }
        }
        Self { lists }
    }

    /// Worklist of subregion `(di, dj, dk)`, each in `0..HGRID`.
    #[inline]
    pub fn get(&self, sub: [usize; 3]) -> &Worklist {
        &self.lists[sub[0] + HGRID * (sub[1] + HGRID * sub[2])]
    }

    fn generate(sub: [usize; 3], block: [f64; 3]) -> Worklist {
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for a in 0..3 {
            lo[a] = sub[a] as f64 / FGRID as f64 * block[a];
            hi[a] = (sub[a] + 1) as f64 / FGRID as f64 * block[a];
        }
        let min_dist = |d: [i32; 3]| -> f64 {
            let mut s = 0.0;
            for a in 0..3 {
                let gap = if d[a] > 0 {
                    d[a] as f64 * block[a] - hi[a]
                } else if d[a] < 0 {
                    lo[a] - (d[a] + 1) as f64 * block[a]
                } else {
                    0.0
                };
                s += gap * gap;
            }
            s
        };
        let max_dist = |d: [i32; 3]| -> f64 {
            let mut s = 0.0;
            for a in 0..3 {
                let far = ((d[a] + 1) as f64 * block[a] - lo[a]).abs().max((d[a] as f64 * block[a] - hi[a]).abs());
                s += far * far;
            }
            s
        };

        let mut candidates = Vec::new();
        for k in -REACH..=REACH {
            for j in -REACH..=REACH {
                for i in -REACH..=REACH {
                    if i == 0 && j == 0 && k == 0 {
                        continue;
                    }
                    let d = [i, j, k];
                    candidates.push((min_dist(d), max_dist(d), d));
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let n = SEQ_LENGTH.min(candidates.len());
        let width = (2 * REACH + 1) as usize;
        let index = |d: [i32; 3]| -> Option<usize> {
            if d.iter().any(|&c| c.abs() > REACH) {
                return None;
            }
            let u = |c: i32| (c + REACH) as usize;
            Some(u(d[0]) + width * (u(d[1]) + width * u(d[2])))
        };
        let mut listed = vec![false; width * width * width];
        if let Some(home) = index([0, 0, 0]) {
            listed[home] = true;
        }
        for c in &candidates[..n] {
            if let Some(ix) = index(c.2) {
                listed[ix] = true;
            }
        }

        let mut entries = Vec::with_capacity(n);
        for c in &candidates[..n] {
            let mut open = 0u8;
            for axis in 0..3 {
                for positive in [false, true] {
                    let mut d = c.2;
                    d[axis] += if positive { 1 } else { -1 };
                    if !index(d).is_some_and(|ix| listed[ix]) {
                        open |= face_bit(axis, positive);
                    }
                }
            }
            entries.push(WorkEntry { offset: c.2, open });
        }
        let inner = entries.iter().take_while(|e| e.open == 0).count();

        let mut shell = f64::INFINITY;
        for a in 0..3 {
            let r = REACH as f64 * block[a];
            shell = shell.min(r * r);
        }
        let beyond = candidates.get(n).map_or(shell, |c| c.0.min(shell));
        let mut bounds = vec![0.0; n + 1];
        bounds[n] = beyond;
        for g in (0..n).rev() {
            bounds[g] = candidates[g].0.min(bounds[g + 1]);
        }

        Worklist { entries, bounds, inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worklists_cover_face_neighbors_first() {
        let lists = Worklists::new([1.0, 1.0, 1.0]);
        let wl = lists.get([0, 0, 0]);
        assert_eq!(wl.entries.len(), SEQ_LENGTH);
        assert_eq!(wl.bounds.len(), SEQ_LENGTH + 1);
        // the three faces touching the corner subregion come first at distance zero
        for e in &wl.entries[..3] {
            assert_eq!(e.offset.iter().map(|c| c.abs()).sum::<i32>(), 1);
            assert!(e.offset.iter().all(|&c| c <= 0));
        }
        assert!(wl.inner >= 1);
        assert!(wl.inner < wl.entries.len());
    }

    #[test]
    fn test_bounds_are_monotone() {
        let lists = Worklists::new([1.0, 0.5, 2.0]);
        for dk in 0..HGRID {
            for dj in 0..HGRID {
                for di in 0..HGRID {
                    let wl = lists.get([di, dj, dk]);
                    for w in wl.bounds.windows(2) {
                        assert!(w[0] <= w[1]);
                    }
                    assert!(wl.bounds[wl.entries.len()] > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_inner_entries_have_listed_neighbors() {
        let lists = Worklists::new([1.0, 1.0, 1.0]);
        let wl = lists.get([3, 3, 3]);
        let listed: Vec<[i32; 3]> = wl.entries.iter().map(|e| e.offset).collect();
        for e in &wl.entries[..wl.inner] {
            for axis in 0..3 {
                for step in [-1, 1] {
                    let mut d = e.offset;
                    d[axis] += step;
                    assert!(d == [0, 0, 0] || listed.contains(&d), "{:?} missing", d);
                }
            }
        }
    }

    #[test]
    fn test_reflection_swaps_faces() {
        let e = WorkEntry { offset: [1, -2, 0], open: face_bit(0, true) | face_bit(2, false) };
        let r = e.reflected([true, false, true]);
        assert_eq!(r.offset, [-1, -2, 0]);
        assert_eq!(r.open, face_bit(0, false) | face_bit(2, true));
    }
}
