//! Cutting a cell by a plane.
//!
//! Vertices are classified against the plane `2 v·n = rsq` as kept (0), marginal (1) or
//! removed (2) within the tolerance band. The search walks uphill from the hint vertex
//! until it crosses the plane, a new facet is stitched around the intersection, every
//! vertex on the far side is deleted and the survivors are compacted to `0..p`.

use super::{Cell, FaceTag};
use crate::error::{Result, VoroError};

const KEPT: u32 = 0;
const MARGINAL: u32 = 1;
const REMOVED: u32 = 2;

/// Crossing found by the initial search: `lp` is on the kept side, `up` (the cell's hint)
/// on the far side, joined by edge `ls` of `lp` and `us` of `up`.
#[derive(Clone, Copy, Debug, Default)]
struct Crossing {
    lp: usize,
    ls: usize,
    l: f64,
    lw: u32,
    us: usize,
    u: f64,
    uw: u32,
}

impl<T: FaceTag> Cell<T> {
    /// Cuts the cell by the plane `normal·x = rsq / 2`, keeping the side containing the
    /// origin. New faces are tagged with `id`.
    ///
    /// Returns `Ok(false)` if the cell was removed completely.
    pub fn cut(&mut self, normal: [f64; 3], rsq: f64, id: i32) -> Result<bool> {
        if self.p == 0 {
            return Ok(false);
        }
        let alive = self.nplane(normal, rsq, T::from_id(id))?;
        if !alive {
            self.clear();
        }
        Ok(alive)
    }

    /// Cuts by the bisector between the generator and a neighbor at relative position `rel`.
    pub fn cut_through(&mut self, rel: [f64; 3], id: i32) -> Result<bool> {
        let rsq = rel[0] * rel[0] + rel[1] * rel[1] + rel[2] * rel[2];
        self.cut(rel, rsq, id)
    }

    /// Cuts by the plane through `point` (relative to the generator) with outward normal `normal_out`.
    pub fn cut_plane(&mut self, point: [f64; 3], normal_out: [f64; 3], id: i32) -> Result<bool> {
        let rsq = 2.0 * (point[0] * normal_out[0] + point[1] * normal_out[1] + point[2] * normal_out[2]);
        self.cut(normal_out, rsq, id)
    }

    // --- plane classification ---

    fn reset_mask(&mut self) {
        self.mask.iter_mut().for_each(|m| *m = 0);
        self.maskc = 4;
    }

    #[inline]
    fn m_calc(&mut self, n: usize) -> (u32, f64) {
        let v = self.pts[n];
        let ans = 2.0 * (v[0] * self.plane[0] + v[1] * self.plane[1] + v[2] * self.plane[2]) - self.prsq;
        let class = if ans < -self.tol {
            KEPT
        } else if ans > self.tol {
            REMOVED
        } else {
            MARGINAL
        };
        self.dist[n] = ans;
        self.mask[n] = self.maskc | class;
        (class, ans)
    }

    #[inline]
    fn m_test(&mut self, n: usize) -> (u32, f64) {
        if self.mask[n] >= self.maskc {
            (self.mask[n] & 3, self.dist[n])
        } else {
            self.m_calc(n)
        }
    }

    /// Like `m_test`, but queues kept vertices lying close to the plane for the
    /// secondary facet search.
    #[inline]
    fn m_testx(&mut self, n: usize) -> Result<(u32, f64)> {
        let (class, ans) = self.m_test(n);
        if class == KEPT && ans > -self.big_tol && self.marks[n] != -1 {
            self.marks[n] = -1;
            self.push_xse(n)?;
        }
        Ok((class, ans))
    }

    #[inline]
    fn flip(&mut self, n: usize) {
        self.marks[n] = -1 - self.marks[n];
    }

    fn push_ds(&mut self, n: usize) -> Result<()> {
        if self.ds.len() >= self.config.max_delete_size {
            return Err(VoroError::Memory { what: "delete stack", limit: self.config.max_delete_size });
        }
        self.ds.push(n);
        Ok(())
    }

    fn push_ds2(&mut self, n: usize) -> Result<()> {
        if self.ds2.len() >= self.config.max_delete2_size {
            return Err(VoroError::Memory { what: "marginal stack", limit: self.config.max_delete2_size });
        }
        self.ds2.push(n);
        Ok(())
    }

    fn push_xse(&mut self, n: usize) -> Result<()> {
        if self.xse.len() >= self.config.max_xse_size {
            return Err(VoroError::Memory { what: "extra search stack", limit: self.config.max_xse_size });
        }
        self.xse.push(n);
        Ok(())
    }

    // --- main routine ---

    fn nplane(&mut self, normal: [f64; 3], rsq: f64, tag: T) -> Result<bool> {
        self.ds.clear();
        self.ds2.clear();
        self.xse.clear();
        self.plane = normal;
        self.prsq = rsq;
        self.maskc = self.maskc.wrapping_add(4);
        if self.maskc < 4 {
            self.reset_mask();
        }

        self.up = 0;
        let mut cr = Crossing::default();
        let (uw, u) = self.m_test(self.up);
        cr.uw = uw;
        cr.u = u;
        let start = match uw {
            REMOVED => {
                if !self.search_downward(&mut cr)? {
                    return Ok(false);
                }
                if cr.lw == MARGINAL {
                    self.up = cr.lp;
                    None
                } else {
                    Some(cr.lp)
                }
            }
            KEPT => {
                if !self.search_upward(&mut cr)? {
                    return Ok(true);
                }
                if cr.uw == MARGINAL { None } else { Some(cr.lp) }
            }
            _ => None,
        };

        self.ds.clear();
        let op = self.p;
        if self.create_facet(start, cr.ls, cr.l, cr.us, cr.u, tag)? {
            return Ok(false);
        }

        // Kept vertices close to the plane may border further facets of a degenerate cut.
        let mut k = 0;
        while k < self.xse.len() {
            let lp = self.xse[k];
            k += 1;
            let mut ls = 0;
            while ls < self.order(lp) {
                let up = self.link(lp, ls)?;
                self.up = up;
                if up >= op {
                    ls += 1;
                    continue;
                }
                let (uw, u) = self.m_test(up);
                if uw == KEPT {
                    if u > -self.big_tol && self.marks[up] != -1 {
                        self.marks[up] = -1;
                        self.push_xse(up)?;
                    }
                } else if uw == MARGINAL {
                    if self.create_facet(None, 0, 0.0, 0, u, tag)? {
                        return Ok(false);
                    }
                } else {
                    let us = self.rel(lp, ls);
                    let (_, l) = self.m_test(lp);
                    if self.create_facet(Some(lp), ls, l, us, u, tag)? {
                        return Ok(false);
                    }
                }
                ls += 1;
            }
        }

        for k in 0..self.xse.len() {
            let j = self.xse[k];
            self.marks[j] = j as i32;
        }

        // Collect the doomed vertices without duplicates.
        let mut dsp = 0;
        while dsp < self.ds.len() {
            let j = self.ds[dsp];
            if self.doomed[j] {
                self.ds.swap_remove(dsp);
            } else {
                self.doomed[j] = true;
                dsp += 1;
            }
        }
        for k in 0..self.ds2.len() {
            let j = self.ds2[k];
            self.marks[j] = j as i32;
            if !self.doomed[j] {
                self.doomed[j] = true;
                self.push_ds(j)?;
            }
        }
        let mut dsp = 0;
        while dsp < self.ds.len() {
            let cp = self.ds[dsp];
            dsp += 1;
            for e in 0..self.order(cp) {
                let qp = self.ed(cp, e);
                if qp >= 0 && !self.doomed[qp as usize] {
                    self.doomed[qp as usize] = true;
                    self.push_ds(qp as usize)?;
                }
            }
        }

        // Fill the holes left by doomed vertices from the tail.
        self.up = 0;
        while let Some(up) = self.ds.pop() {
            self.p = self.p.checked_sub(1).ok_or(VoroError::Internal("every vertex marked for deletion"))?;
            while self.doomed[self.p] {
                let h = self.handles[self.p];
                self.free(h);
                self.doomed[self.p] = false;
                self.p = self.p.checked_sub(1).ok_or(VoroError::Internal("every vertex marked for deletion"))?;
            }
            self.up = up;
            if up < self.p {
                let p = self.p;
                self.pts[up] = self.pts[p];
                let old = self.handles[up];
                self.free(old);
                self.doomed[up] = false;
                let h = self.handles[p];
                self.adopt(up, h);
                for i in 0..h.order {
                    let n = self.ed(up, i) as usize;
                    let r = self.rel(up, i);
                    self.set_ed(n, r, up as i32);
                }
                self.marks[up] = up as i32;
            } else {
                self.up = self.p;
                self.p += 1;
            }
        }

        if self.pools.first().is_some_and(|pool| pool.len() > 0) {
            return Err(VoroError::Internal("zero order vertex formed"));
        }

        self.collapse_order2()
    }

    /// Starting from a vertex on the kept side, walks uphill until an edge crosses the plane.
    ///
    /// Returns `Ok(false)` if the cell lies entirely on the kept side.
    fn search_upward(&mut self, cr: &mut Crossing) -> Result<bool> {
        cr.lp = self.up;
        cr.l = cr.u;

        let mut ls = 0;
        while ls < self.order(cr.lp) {
            self.up = self.link(cr.lp, ls)?;
            (cr.uw, cr.u) = self.m_test(self.up);
            if cr.u > cr.l {
                break;
            }
            ls += 1;
        }
        cr.ls = ls;
        if cr.ls == self.order(cr.lp) && self.definite_max(cr)? {
            self.up = cr.lp;
            return Ok(false);
        }

        while cr.uw == KEPT {
            let vs = self.rel(cr.lp, cr.ls);
            cr.lp = self.up;
            cr.l = cr.u;
            let mut ls = 0;
            while ls < self.order(cr.lp) {
                if ls != vs {
                    self.up = self.link(cr.lp, ls)?;
                    (cr.uw, cr.u) = self.m_test(self.up);
                    if cr.u > cr.l {
                        break;
                    }
                }
                ls += 1;
            }
            cr.ls = ls;
            if cr.ls == self.order(cr.lp) && self.definite_max(cr)? {
                self.up = cr.lp;
                return Ok(false);
            }
        }
        cr.us = self.rel(cr.lp, cr.ls);
        Ok(true)
    }

    /// Starting from a vertex on the removed side, walks downhill until an edge crosses the plane.
    ///
    /// Returns `Ok(false)` if every vertex is on the removed side.
    fn search_downward(&mut self, cr: &mut Crossing) -> Result<bool> {
        let mut us = 0;
        while us < self.order(self.up) {
            cr.lp = self.link(self.up, us)?;
            (cr.lw, cr.l) = self.m_test(cr.lp);
            if cr.u > cr.l {
                break;
            }
            us += 1;
        }
        cr.us = us;
        if cr.us == self.order(self.up) && self.definite_min(cr)? {
            return Ok(false);
        }

        while cr.lw == REMOVED {
            let vs = self.rel(self.up, cr.us);
            self.up = cr.lp;
            cr.u = cr.l;
            let mut us = 0;
            while us < self.order(self.up) {
                if us != vs {
                    cr.lp = self.link(self.up, us)?;
                    (cr.lw, cr.l) = self.m_test(cr.lp);
                    if cr.u > cr.l {
                        break;
                    }
                }
                us += 1;
            }
            cr.us = us;
            if cr.us == self.order(self.up) && self.definite_min(cr)? {
                return Ok(false);
            }
        }
        cr.ls = self.rel(self.up, cr.us);
        Ok(true)
    }

    /// Checks whether `cr.lp` is a local maximum of the plane distance over its plateau of
    /// near-equal neighbors. On `Ok(false)` the crossing is moved to a higher vertex.
    fn definite_max(&mut self, cr: &mut Crossing) -> Result<bool> {
        let tp = cr.lp;
        let mut ts = 0;
        let mut qp = 0;
        while ts < self.order(tp) {
            qp = self.link(tp, ts)?;
            let (_, q) = self.m_test(qp);
            if q > cr.l - self.big_tol {
                break;
            }
            ts += 1;
        }
        if ts == self.order(tp) {
            return Ok(true);
        }

        self.ds.clear();
        self.ds.push(qp);
        self.flip(cr.lp);
        self.flip(qp);
        ts += 1;
        while ts < self.order(tp) {
            qp = self.link(tp, ts)?;
            let (_, q) = self.m_test(qp);
            if q > cr.l - self.big_tol {
                self.push_ds(self.up)?;
                self.flip(self.up);
            }
            ts += 1;
        }

        let mut spp = 0;
        while spp < self.ds.len() {
            let tp = self.ds[spp];
            spp += 1;
            for ts in 0..self.order(tp) {
                let qp = self.link(tp, ts)?;
                if self.marks[qp] < 0 {
                    continue;
                }
                let (qw, q) = self.m_test(qp);
                if q > cr.l {
                    self.flip(cr.lp);
                    cr.lp = tp;
                    cr.ls = ts;
                    (_, cr.l) = self.m_test(cr.lp);
                    self.up = qp;
                    cr.uw = qw;
                    cr.u = q;
                    self.unflip_stack();
                    return Ok(false);
                }
                if q > cr.l - self.big_tol {
                    self.push_ds(qp)?;
                    self.flip(qp);
                }
            }
        }

        self.flip(cr.lp);
        self.unflip_stack();
        Ok(true)
    }

    /// Mirror image of `definite_max` for the downhill search.
    fn definite_min(&mut self, cr: &mut Crossing) -> Result<bool> {
        let tp = self.up;
        let mut ts = 0;
        let mut qp = 0;
        while ts < self.order(tp) {
            qp = self.link(tp, ts)?;
            let (_, q) = self.m_test(qp);
            if q < cr.u + self.big_tol {
                break;
            }
            ts += 1;
        }
        if ts == self.order(tp) {
            return Ok(true);
        }

        self.ds.clear();
        self.ds.push(qp);
        self.flip(self.up);
        self.flip(qp);
        ts += 1;
        while ts < self.order(tp) {
            qp = self.link(tp, ts)?;
            let (_, q) = self.m_test(qp);
            if q < cr.u + self.big_tol {
                self.push_ds(cr.lp)?;
                self.flip(cr.lp);
            }
            ts += 1;
        }

        let mut spp = 0;
        while spp < self.ds.len() {
            let tp = self.ds[spp];
            spp += 1;
            for ts in 0..self.order(tp) {
                let qp = self.link(tp, ts)?;
                if self.marks[qp] < 0 {
                    continue;
                }
                let (qw, q) = self.m_test(qp);
                if q < cr.u {
                    self.flip(self.up);
                    self.up = tp;
                    cr.us = ts;
                    (_, cr.u) = self.m_test(self.up);
                    cr.lp = qp;
                    cr.lw = qw;
                    cr.l = q;
                    self.unflip_stack();
                    return Ok(false);
                }
                if q < cr.u + self.big_tol {
                    self.push_ds(qp)?;
                    self.flip(qp);
                }
            }
        }

        self.flip(self.up);
        self.unflip_stack();
        Ok(true)
    }

    fn unflip_stack(&mut self) {
        for k in 0..self.ds.len() {
            let v = self.ds[k];
            self.flip(v);
        }
        self.ds.clear();
    }

    /// Breadth-first search over marginal vertices for one with an edge to a kept vertex.
    ///
    /// On success `self.up` is that marginal vertex.
    fn search_for_outside_edge(&mut self) -> Result<bool> {
        let base = self.ds2.len();
        self.push_ds2(self.up)?;
        let mut j = base;
        while j < self.ds2.len() {
            let u = self.ds2[j];
            j += 1;
            for i in 0..self.order(u) {
                let lp = self.link(u, i)?;
                let (lw, _) = self.m_test(lp);
                if lw == KEPT {
                    self.ds2.truncate(base);
                    self.up = u;
                    return Ok(true);
                } else if lw == MARGINAL && !self.ds2[base..].contains(&lp) {
                    self.push_ds2(lp)?;
                }
            }
        }
        self.ds2.truncate(base);
        Ok(false)
    }

    /// Copies edge `src_e` of `src` into slot `dst_e` of `dst` and rewires the far end.
    #[inline]
    fn move_edge(&mut self, src: usize, src_e: usize, dst: usize, dst_e: usize) -> Result<()> {
        let qp = self.link(src, src_e)?;
        let qs = self.rel(src, src_e);
        let tag = self.tag(src, src_e);
        self.set_tag(dst, dst_e, tag);
        self.set_ed(dst, dst_e, qp as i32);
        self.set_rel(dst, dst_e, qs);
        self.set_ed(qp, qs, dst as i32);
        self.set_rel(qp, qs, dst_e);
        self.set_ed(src, src_e, -1);
        Ok(())
    }

    /// Adds one facet of the cutting plane to the cell.
    ///
    /// With `lp == Some(v)` the facet starts on the edge from kept vertex `v` to the
    /// removed vertex `self.up`; with `None` it starts at the marginal vertex `self.up`.
    /// Returns `Ok(true)` if the plane turned out to remove the whole cell.
    fn create_facet(&mut self, lp: Option<usize>, ls: usize, l: f64, us: usize, u: f64, tag: T) -> Result<bool> {
        let mut double_edge = false;
        let mut us = us;
        let mut qp;
        let mut qs;
        let mut q;
        let mut cp;
        let mut cs;
        let rp;

        self.reserve_vertex()?;
        match lp {
            None => {
                if !self.search_for_outside_edge()? {
                    return Ok(true);
                }
                let up = self.up;
                let p = self.p;
                self.pts[p] = self.pts[up];
                let nu_up = self.order(up);

                let mut i = 0;
                let mut lp = self.link(up, 0)?;
                let (mut lw, _) = self.m_testx(lp)?;
                let mut k = 1;
                if lw != KEPT {
                    let rw = lw;
                    loop {
                        i += 1;
                        if i == nu_up {
                            return Ok(true);
                        }
                        lp = self.link(up, i)?;
                        (lw, _) = self.m_testx(lp)?;
                        if lw == KEPT {
                            break;
                        }
                    }
                    let mut j = i + 1;
                    while j < nu_up {
                        lp = self.link(up, j)?;
                        (lw, _) = self.m_testx(lp)?;
                        if lw != KEPT {
                            break;
                        }
                        j += 1;
                    }
                    let order = if j == nu_up && i == 1 && rw == MARGINAL {
                        double_edge = true;
                        nu_up
                    } else {
                        j - i + 2
                    };
                    let h = self.alloc(order, p)?;
                    self.handles[p] = h;
                    self.marks[p] = p as i32;
                    self.doomed[p] = false;

                    us = self.cycle_down(i, up);
                    while i < j {
                        self.move_edge(up, i, p, k)?;
                        i += 1;
                        k += 1;
                    }
                    qs = if i == nu_up { 0 } else { i };
                } else {
                    i = nu_up - 1;
                    lp = self.link(up, i)?;
                    (lw, _) = self.m_testx(lp)?;
                    while lw == KEPT {
                        i -= 1;
                        if i == 0 {
                            return Ok(false);
                        }
                        lp = self.link(up, i)?;
                        (lw, _) = self.m_testx(lp)?;
                    }
                    let mut j = 1;
                    let mut qv = self.link(up, j)?;
                    let (mut qw, _) = self.m_testx(qv)?;
                    while qw == KEPT {
                        j += 1;
                        qv = self.link(up, j)?;
                        (qw, _) = self.m_testx(qv)?;
                    }
                    let order = if i == j && qw == MARGINAL {
                        double_edge = true;
                        nu_up
                    } else {
                        nu_up - i + j + 1
                    };
                    let h = self.alloc(order, p)?;
                    self.handles[p] = h;
                    self.marks[p] = p as i32;
                    self.doomed[p] = false;

                    us = i;
                    i += 1;
                    while i < nu_up {
                        self.move_edge(up, i, p, k)?;
                        i += 1;
                        k += 1;
                    }
                    i = 0;
                    while i < j {
                        self.move_edge(up, i, p, k)?;
                        i += 1;
                        k += 1;
                    }
                    qs = j;
                }
                let carried = self.tag(up, qs);
                if double_edge {
                    self.set_tag(p, 0, carried);
                } else {
                    self.set_tag(p, k, carried);
                    self.set_tag(p, 0, tag);
                }

                self.push_ds2(up)?;
                cs = k;
                qp = up;
                q = u;
                let next = self.link(up, us)?;
                us = self.rel(up, us);
                self.up = next;
                self.marks[qp] = -(p as i32);
            }
            Some(lp) => {
                let up = self.up;
                let p = self.p;
                self.push_ds(up)?;
                let r = u / (u - l);
                let lr = 1.0 - r;
                let (a, b) = (self.pts[lp], self.pts[up]);
                self.pts[p] = [a[0] * r + b[0] * lr, a[1] * r + b[1] * lr, a[2] * r + b[2] * lr];
                let h = self.alloc(3, p)?;
                self.handles[p] = h;
                self.marks[p] = p as i32;
                self.doomed[p] = false;
                let (t_up, t_lp) = (self.tag(up, us), self.tag(lp, ls));
                self.set_tag(p, 0, tag);
                self.set_tag(p, 1, t_up);
                self.set_tag(p, 2, t_lp);
                self.set_ed(up, us, -1);
                self.set_ed(lp, ls, p as i32);
                self.set_rel(lp, ls, 1);
                self.set_ed(p, 1, lp as i32);
                self.set_rel(p, 1, ls);
                cs = 2;
                qs = self.cycle_up(us, up);
                qp = up;
                q = u;
            }
        }
        cp = self.p;
        rp = self.p;
        self.p += 1;

        // Walk around the facet, adding an intersection vertex for every crossing edge and
        // splicing marginal vertices in place.
        while qp != self.up || qs != us {
            let lp = self.link(qp, qs)?;
            let (lw, l) = self.m_testx(lp)?;
            if lw == REMOVED {
                qs = self.cycle_up(self.rel(qp, qs), lp);
                qp = lp;
                q = l;
                self.push_ds(qp)?;
            } else if lw == KEPT {
                self.reserve_vertex()?;
                let p = self.p;
                let r = q / (q - l);
                let lr = 1.0 - r;
                let (a, b) = (self.pts[lp], self.pts[qp]);
                self.pts[p] = [a[0] * r + b[0] * lr, a[1] * r + b[1] * lr, a[2] * r + b[2] * lr];
                let ls = self.rel(qp, qs);
                let h = self.alloc(3, p)?;
                self.handles[p] = h;
                self.marks[p] = p as i32;
                self.doomed[p] = false;
                let (t_qp, t_lp) = (self.tag(qp, qs), self.tag(lp, ls));
                self.set_tag(p, 0, tag);
                self.set_tag(p, 1, t_qp);
                self.set_tag(p, 2, t_lp);
                self.set_ed(p, 0, cp as i32);
                self.set_ed(p, 1, lp as i32);
                self.set_rel(p, 0, cs);
                self.set_rel(p, 1, ls);
                self.set_ed(lp, ls, p as i32);
                self.set_rel(lp, ls, 1);
                self.set_ed(cp, cs, p as i32);
                self.set_rel(cp, cs, 0);
                self.set_ed(qp, qs, -1);
                qs = self.cycle_up(qs, qp);
                cp = p;
                self.p += 1;
                cs = 2;
            } else {
                // Marginal vertex: count the kept edges that will move onto its copy.
                self.reserve_vertex()?;
                let mut k = if double_edge { 0 } else { 1 };
                qs = self.rel(qp, qs);
                qp = lp;
                let iqs = qs;
                let mut lp;
                let mut lw;
                loop {
                    k += 1;
                    qs = self.cycle_up(qs, qp);
                    lp = self.link(qp, qs)?;
                    (lw, _) = self.m_testx(lp)?;
                    if lw != KEPT {
                        break;
                    }
                }

                let j = -self.marks[qp];
                let new_double_edge;
                if qp == self.up && qs == us {
                    new_double_edge = false;
                    if j > 0 {
                        k += self.order(j as usize);
                    }
                } else if j > 0 {
                    k += self.order(j as usize);
                    if lw == MARGINAL {
                        let i = -self.marks[lp];
                        if i > 0 {
                            let iu = i as usize;
                            if self.ed(iu, self.order(iu) - 1) == j {
                                new_double_edge = true;
                                k -= 1;
                            } else {
                                new_double_edge = false;
                            }
                        } else if j as usize == rp && lp == self.up && self.rel(qp, qs) == us {
                            new_double_edge = true;
                            k -= 1;
                        } else {
                            new_double_edge = false;
                        }
                    } else {
                        new_double_edge = false;
                    }
                } else if lw == MARGINAL && -self.marks[lp] == cp as i32 {
                    new_double_edge = true;
                    k -= 1;
                } else {
                    new_double_edge = false;
                }

                let jv;
                let mut i;
                if j > 0 {
                    jv = j as usize;
                    let old = self.handles[jv];
                    i = old.order;
                    if old.order != k {
                        self.resize_vertex(jv, k)?;
                    }
                } else {
                    let p = self.p;
                    let h = self.alloc(k, p)?;
                    self.handles[p] = h;
                    self.marks[p] = p as i32;
                    self.doomed[p] = false;
                    self.push_ds2(qp)?;
                    self.pts[p] = self.pts[qp];
                    self.marks[qp] = -(p as i32);
                    jv = p;
                    self.p += 1;
                    i = 0;
                }

                if !double_edge {
                    self.set_ed(jv, i, cp as i32);
                    self.set_rel(jv, i, cs);
                    self.set_tag(jv, i, tag);
                    self.set_ed(cp, cs, jv as i32);
                    self.set_rel(cp, cs, i);
                    i += 1;
                }

                qs = iqs;
                let limit = if new_double_edge { k } else { k - 1 };
                while i < limit {
                    qs = self.cycle_up(qs, qp);
                    self.move_edge(qp, qs, jv, i)?;
                    i += 1;
                }
                qs = self.cycle_up(qs, qp);
                cs = i;
                cp = jv;
                let carried = self.tag(qp, qs);
                self.set_tag(jv, if new_double_edge { 0 } else { cs }, carried);
                double_edge = new_double_edge;
            }
        }

        self.set_ed(cp, cs, rp as i32);
        self.set_ed(rp, 0, cp as i32);
        self.set_rel(cp, cs, 0);
        self.set_rel(rp, 0, cs);
        Ok(false)
    }

    /// Moves vertex `v` into a record of a larger order, keeping its existing edges.
    fn resize_vertex(&mut self, v: usize, order: usize) -> Result<()> {
        let old = self.handles[v];
        let new = self.alloc(order, v)?;
        for e in 0..old.order {
            let base_old = old.slot * 2 * old.order;
            let base_new = new.slot * 2 * order;
            let (target, back) = {
                let pool = &self.pools[old.order];
                (pool.edges[base_old + e], pool.edges[base_old + old.order + e])
            };
            let t = self.pools[old.order].tags[old.slot * old.order + e];
            let pool = &mut self.pools[order];
            pool.edges[base_new + e] = target;
            pool.edges[base_new + order + e] = back;
            pool.tags[new.slot * order + e] = t;
        }
        self.free(old);
        self.handles[v] = new;
        Ok(())
    }

    // --- clean-up of low order vertices ---

    /// Removes order-2 vertices by joining their two neighbors, then order-1 vertices.
    fn collapse_order2(&mut self) -> Result<bool> {
        if !self.collapse_order1()? {
            return Ok(false);
        }
        while self.pools.len() > 2 && self.pools[2].len() > 0 {
            let (j, k, a, b, i) = {
                let pool = &mut self.pools[2];
                let last = pool.len() - 1;
                let r = &pool.edges[4 * last..4 * last + 4];
                let rec = (r[0] as usize, r[1] as usize, r[2] as usize, r[3] as usize, pool.owner[last]);
                pool.edges.truncate(4 * last);
                pool.tags.truncate(2 * last);
                pool.owner.truncate(last);
                rec
            };
            if j == k {
                log::warn!("Order two vertex joins a vertex to itself");
                return Ok(false);
            }

            let connected = (0..self.order(j)).any(|l| self.ed(j, l) == k as i32);
            if !connected {
                self.set_ed(j, a, k as i32);
                self.set_ed(k, b, j as i32);
                self.set_rel(j, a, b);
                self.set_rel(k, b, a);
            } else {
                if !self.delete_connection(j, a, false)? {
                    return Ok(false);
                }
                if !self.delete_connection(k, b, true)? {
                    return Ok(false);
                }
            }

            self.remove_vertex_slot(i);
            if !self.collapse_order1()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn collapse_order1(&mut self) -> Result<bool> {
        while self.pools.len() > 1 && self.pools[1].len() > 0 {
            self.up = 0;
            log::debug!("Order one collapse");
            let (j, k, i) = {
                let pool = &mut self.pools[1];
                let last = pool.len() - 1;
                let rec = (pool.edges[2 * last] as usize, pool.edges[2 * last + 1] as usize, pool.owner[last]);
                pool.edges.truncate(2 * last);
                pool.tags.truncate(last);
                pool.owner.truncate(last);
                rec
            };
            if !self.delete_connection(j, k, false)? {
                return Ok(false);
            }
            self.remove_vertex_slot(i);
        }
        Ok(true)
    }

    /// Fills the index of a vertex whose record was already dropped with the last vertex.
    fn remove_vertex_slot(&mut self, i: usize) {
        self.p -= 1;
        if self.up == i {
            self.up = 0;
        }
        let p = self.p;
        if p != i {
            if self.up == p {
                self.up = i;
            }
            self.pts[i] = self.pts[p];
            let h = self.handles[p];
            self.adopt(i, h);
            for e in 0..h.order {
                let n = self.ed(i, e) as usize;
                let r = self.rel(i, e);
                self.set_ed(n, r, i as i32);
            }
            self.marks[i] = i as i32;
        }
    }

    /// Removes edge `k` from vertex `j`, lowering its order by one.
    ///
    /// `hand` selects which of the two faces meeting at the edge keeps its tag.
    fn delete_connection(&mut self, j: usize, k: usize, hand: bool) -> Result<bool> {
        let q = if hand { k } else { self.cycle_up(k, j) };
        let old = self.handles[j];
        let n = old.order;
        if n < 2 {
            log::warn!("Zero order vertex formed");
            return Ok(false);
        }
        let i = n - 1;
        let mut edges = vec![0i32; 2 * i];
        let mut tags = vec![T::default(); i];
        for l in 0..i {
            tags[l] = self.tag(j, if l < q { l } else { l + 1 });
        }
        for l in 0..i {
            if l < k {
                edges[l] = self.ed(j, l);
                edges[i + l] = self.rel(j, l) as i32;
            } else {
                let m = self.ed(j, l + 1);
                let back = self.rel(j, l + 1);
                edges[l] = m;
                edges[i + l] = back as i32;
                if m >= 0 {
                    let m = m as usize;
                    let r = self.rel(m, back);
                    self.set_rel(m, back, r - 1);
                }
            }
        }
        let new = self.alloc(i, j)?;
        {
            let pool = &mut self.pools[i];
            pool.edges[new.slot * 2 * i..(new.slot + 1) * 2 * i].copy_from_slice(&edges);
            pool.tags[new.slot * i..(new.slot + 1) * i].copy_from_slice(&tags);
        }
        self.free(old);
        self.handles[j] = new;
        Ok(true)
    }
}
