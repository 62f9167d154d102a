//! Structured grids distributed over a process grid.
//!
//! The global vector of a grid stores the points owned by rank 0 first, then those of rank 1,
//! and so on. Within a rank the x index runs fastest and the degrees of freedom of a point are
//! stored next to each other. Ranks are numbered `pi + m * (pj + n * pk)` where `(pi, pj, pk)`
//! is the position of the rank in the `m x n x p` process grid.

use std::cell::{Cell, RefCell};

use super::layout::{split_ownership, Layout};
use super::mat::{self, MatAssemblyType, MatData, MatOption};
use super::scatter::{Scatter, ScatterPending};
use super::vec::VecData;
use super::viewer::{self, ViewerData};
use super::{check_valid, sys, ClassId, PetscHeader};
use crate::comm::{Communicator, Rank};
use crate::{InsertMode, PetscInt, PetscScalar};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DMType {
    DMDA,
}

/// What lies beyond the edge of the grid along one axis.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DMBoundaryType {
    /// No ghost points beyond the edge.
    #[default]
    DM_BOUNDARY_NONE,
    /// Ghost points exist beyond the edge but are never filled by the exchange.
    DM_BOUNDARY_GHOSTED,
    /// Ghost points mirror the points next to the edge.
    DM_BOUNDARY_MIRROR,
    /// The grid wraps around.
    DM_BOUNDARY_PERIODIC,
}

/// Which neighbors a point couples to.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DMDAStencilType {
    /// Only neighbors along the axes, corner ghost points are not exchanged.
    DMDA_STENCIL_STAR,
    /// Every neighbor in the surrounding box.
    #[default]
    DMDA_STENCIL_BOX,
}

/// Sizes and corners of the part of a grid seen by one process. Unused dimensions have
/// size 1 and start 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DMDALocalInfo {
    pub dim: PetscInt,
    pub dof: PetscInt,
    pub sw: PetscInt,
    /// Global grid sizes.
    pub mx: PetscInt,
    pub my: PetscInt,
    pub mz: PetscInt,
    /// First owned point.
    pub xs: PetscInt,
    pub ys: PetscInt,
    pub zs: PetscInt,
    /// Number of owned points.
    pub xm: PetscInt,
    pub ym: PetscInt,
    pub zm: PetscInt,
    /// First point of the ghosted region.
    pub gxs: PetscInt,
    pub gys: PetscInt,
    pub gzs: PetscInt,
    /// Number of points in the ghosted region.
    pub gxm: PetscInt,
    pub gym: PetscInt,
    pub gzm: PetscInt,
    pub bx: DMBoundaryType,
    pub by: DMBoundaryType,
    pub bz: DMBoundaryType,
    pub st: DMDAStencilType,
}

/// Geometry computed by set up.
#[derive(Debug)]
pub(crate) struct DaSetup {
    pub procs: [PetscInt; 3],
    /// Owned points per process along each axis.
    pub counts: [Vec<PetscInt>; 3],
    starts: [Vec<PetscInt>; 3],
    pub pcoord: [PetscInt; 3],
    pub xs: [PetscInt; 3],
    pub xm: [PetscInt; 3],
    pub gxs: [PetscInt; 3],
    pub gxm: [PetscInt; 3],
    pub global: Layout,
    /// Global index of each slot of a local vector, -1 for slots that are never filled.
    ltog: Vec<PetscInt>,
    g2l: Scatter,
}

impl DaSetup {
    fn rank_of(&self, p: [PetscInt; 3]) -> Rank {
        (p[0] + self.procs[0] * (p[1] + self.procs[1] * p[2])) as Rank
    }

    fn local_len(&self, dof: PetscInt) -> usize {
        (self.gxm[0] * self.gxm[1] * self.gxm[2] * dof) as usize
    }

    /// The global index of in-domain point `g`, component `c`.
    fn global_index(&self, g: [PetscInt; 3], c: PetscInt, dof: PetscInt) -> PetscInt {
        let mut p = [0; 3];
        let mut l = [0; 3];
        let mut m = [0; 3];
        for a in 0..3 {
            let starts = &self.starts[a];
            p[a] = starts.partition_point(|&s| s <= g[a]) as PetscInt - 1;
            l[a] = g[a] - starts[p[a] as usize];
            m[a] = self.counts[a][p[a] as usize];
        }
        let offset = self.global.range[self.rank_of(p) as usize];
        offset + ((l[2] * m[1] + l[1]) * m[0] + l[0]) * dof + c
    }

    /// Local vector slots of the owned points, in global order.
    fn owned_slots(&self, dof: PetscInt) -> impl Iterator<Item = usize> + '_ {
        let (xs, xm, gxs, gxm) = (self.xs, self.xm, self.gxs, self.gxm);
        (0..xm[2]).flat_map(move |k| (0..xm[1]).flat_map(move |j| (0..xm[0]).flat_map(move |i| {
            let base = (((k + xs[2] - gxs[2]) * gxm[1] + (j + xs[1] - gxs[1])) * gxm[0] + (i + xs[0] - gxs[0])) * dof;
            (0..dof).map(move |c| (base + c) as usize)
        })))
    }
}

#[derive(Debug)]
enum Halo {
    GlobalToLocal(ScatterPending, InsertMode),
    LocalToGlobalAdd(ScatterPending),
    LocalToGlobalInsert(Vec<PetscScalar>),
    LocalToLocal(ScatterPending, InsertMode),
}

impl Halo {
    fn name(&self) -> &'static str {
        match self {
            Halo::GlobalToLocal(..) => "global_to_local",
            Halo::LocalToGlobalAdd(_) | Halo::LocalToGlobalInsert(_) => "local_to_global",
            Halo::LocalToLocal(..) => "local_to_local",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct DmData {
    pub(crate) hdr: PetscHeader,
    pub(crate) dm_type: Option<DMType>,
    pub(crate) dim: usize,
    sizes: [PetscInt; 3],
    procs: [Option<PetscInt>; 3],
    bx: [DMBoundaryType; 3],
    stencil: DMDAStencilType,
    s: PetscInt,
    dof: PetscInt,
    ranges: [Option<Vec<PetscInt>>; 3],
    field_names: Vec<Option<String>>,
    coord_names: [Option<String>; 3],
    pub(crate) setup: Option<DaSetup>,
    local_pool: RefCell<Vec<VecData>>,
    global_pool: RefCell<Vec<VecData>>,
    outstanding: Cell<usize>,
    halo: RefCell<Option<Halo>>,
}

impl DmData {
    pub(crate) fn geometry(&self) -> crate::Result<&DaSetup> {
        check_valid(&self.hdr, "DM")?;
        self.setup.as_ref().ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "Must call DM::set_up() first"))
    }

    fn check_not_set_up(&self) -> crate::Result<()> {
        check_valid(&self.hdr, "DM")?;
        if self.setup.is_some() {
            return Err(petsc_err!(ARG_WRONGSTATE, "This function must be called before DM::set_up()"));
        }
        Ok(())
    }
}

pub(crate) fn da_create(_comm: &Communicator, dim: usize) -> crate::Result<DmData> {
    if !(1..=3).contains(&dim) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "DMDA dimension must be 1, 2 or 3, not {}", dim));
    }
    Ok(DmData {
        hdr: PetscHeader::new(ClassId::DM)?,
        dm_type: Some(DMType::DMDA),
        dim,
        sizes: [1; 3],
        s: 1,
        dof: 1,
        field_names: vec![None],
        ..Default::default()
    })
}

/// Releases the grid and its pooled vectors. Fails if vectors are still lent out.
pub(crate) fn destroy(dm: &mut DmData) -> crate::Result<()> {
    let outstanding = dm.outstanding.get();
    let pending = dm.halo.get_mut().as_ref().map(Halo::name);
    *dm = DmData::default();
    if outstanding > 0 {
        return Err(petsc_err!(ARG_WRONGSTATE, "DM destroyed while {} vector(s) borrowed from it were not returned", outstanding));
    }
    if let Some(op) = pending {
        return Err(petsc_err!(ARG_WRONGSTATE, "DM destroyed between {}_begin() and {}_end()", op, op));
    }
    Ok(())
}

pub(crate) fn set_sizes(_comm: &Communicator, dm: &mut DmData, m: PetscInt, n: PetscInt, p: PetscInt) -> crate::Result<()> {
    dm.check_not_set_up()?;
    for (a, &v) in [m, n, p].iter().enumerate() {
        if v < 1 {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Grid size {} along axis {} must be positive", v, a));
        }
    }
    dm.sizes = [m, n, p];
    Ok(())
}

pub(crate) fn get_sizes(_comm: &Communicator, dm: &DmData) -> crate::Result<[PetscInt; 3]> {
    check_valid(&dm.hdr, "DM")?;
    Ok(dm.sizes)
}

pub(crate) fn set_num_procs(_comm: &Communicator, dm: &mut DmData, procs: [Option<PetscInt>; 3]) -> crate::Result<()> {
    dm.check_not_set_up()?;
    dm.procs = procs;
    Ok(())
}

pub(crate) fn get_num_procs(_comm: &Communicator, dm: &DmData) -> crate::Result<[Option<PetscInt>; 3]> {
    check_valid(&dm.hdr, "DM")?;
    Ok(match &dm.setup {
        Some(setup) => [Some(setup.procs[0]), Some(setup.procs[1]), Some(setup.procs[2])],
        None => dm.procs,
    })
}

pub(crate) fn set_boundary_type(_comm: &Communicator, dm: &mut DmData, bx: [DMBoundaryType; 3]) -> crate::Result<()> {
    dm.check_not_set_up()?;
    dm.bx = bx;
    Ok(())
}

pub(crate) fn get_boundary_type(_comm: &Communicator, dm: &DmData) -> crate::Result<[DMBoundaryType; 3]> {
    check_valid(&dm.hdr, "DM")?;
    Ok(dm.bx)
}

pub(crate) fn set_dof(_comm: &Communicator, dm: &mut DmData, dof: PetscInt) -> crate::Result<()> {
    dm.check_not_set_up()?;
    if dof < 1 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Must have 1 or more degrees of freedom per node: {}", dof));
    }
    dm.dof = dof;
    dm.field_names.resize(dof as usize, None);
    Ok(())
}

pub(crate) fn set_stencil_type(_comm: &Communicator, dm: &mut DmData, st: DMDAStencilType) -> crate::Result<()> {
    dm.check_not_set_up()?;
    dm.stencil = st;
    Ok(())
}

pub(crate) fn get_stencil_type(_comm: &Communicator, dm: &DmData) -> crate::Result<DMDAStencilType> {
    check_valid(&dm.hdr, "DM")?;
    Ok(dm.stencil)
}

pub(crate) fn set_stencil_width(_comm: &Communicator, dm: &mut DmData, s: PetscInt) -> crate::Result<()> {
    dm.check_not_set_up()?;
    if s < 0 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Stencil width cannot be negative: {}", s));
    }
    dm.s = s;
    Ok(())
}

pub(crate) fn get_stencil_width(_comm: &Communicator, dm: &DmData) -> crate::Result<PetscInt> {
    check_valid(&dm.hdr, "DM")?;
    Ok(dm.s)
}

pub(crate) fn set_ownership_ranges(_comm: &Communicator, dm: &mut DmData, ranges: [Option<Vec<PetscInt>>; 3]) -> crate::Result<()> {
    dm.check_not_set_up()?;
    for r in ranges.iter().flatten() {
        if r.iter().any(|&n| n < 0) {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Ownership ranges cannot be negative: {:?}", r));
        }
    }
    dm.ranges = ranges;
    Ok(())
}

/// Owned points per process along each axis. Unused axes give an empty list.
pub(crate) fn get_ownership_ranges(_comm: &Communicator, dm: &DmData) -> crate::Result<[Vec<PetscInt>; 3]> {
    let setup = dm.geometry()?;
    let mut out = setup.counts.clone();
    for axis in out.iter_mut().skip(dm.dim) {
        axis.clear();
    }
    Ok(out)
}

pub(crate) fn set_field_name(_comm: &Communicator, dm: &mut DmData, nf: PetscInt, name: &str) -> crate::Result<()> {
    check_valid(&dm.hdr, "DM")?;
    if nf < 0 || nf >= dm.dof {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Invalid field number: {}", nf));
    }
    dm.field_names[nf as usize] = Some(name.to_string());
    Ok(())
}

pub(crate) fn get_field_name(_comm: &Communicator, dm: &DmData, nf: PetscInt) -> crate::Result<Option<String>> {
    check_valid(&dm.hdr, "DM")?;
    if nf < 0 || nf >= dm.dof {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Invalid field number: {}", nf));
    }
    Ok(dm.field_names[nf as usize].clone())
}

pub(crate) fn set_coordinate_name(_comm: &Communicator, dm: &mut DmData, nf: usize, name: &str) -> crate::Result<()> {
    check_valid(&dm.hdr, "DM")?;
    if nf >= dm.dim {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Invalid coordinate number: {}", nf));
    }
    dm.coord_names[nf] = Some(name.to_string());
    Ok(())
}

pub(crate) fn get_coordinate_name(_comm: &Communicator, dm: &DmData, nf: usize) -> crate::Result<Option<String>> {
    check_valid(&dm.hdr, "DM")?;
    if nf >= dm.dim {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Invalid coordinate number: {}", nf));
    }
    Ok(dm.coord_names[nf].clone())
}

pub(crate) fn set_from_options(comm: &Communicator, dm: &mut DmData) -> crate::Result<()> {
    check_valid(&dm.hdr, "DM")?;
    if dm.setup.is_some() {
        return Ok(());
    }
    const AXES: [&str; 3] = ["x", "y", "z"];
    for a in 0..dm.dim {
        if let Some(m) = sys::with_options(|db| db.get_int(&format!("-da_grid_{}", AXES[a])))? {
            if m < 1 {
                return Err(petsc_err!(ARG_OUTOFRANGE, "-da_grid_{} must be positive: {}", AXES[a], m));
            }
            dm.sizes[a] = m;
        }
        if let Some(p) = sys::with_options(|db| db.get_int(&format!("-da_processors_{}", AXES[a])))? {
            dm.procs[a] = Some(p);
        }
    }
    if let Some(s) = sys::with_options(|db| db.get_int("-da_stencil_width"))? {
        set_stencil_width(comm, dm, s)?;
    }
    Ok(())
}

/// Picks the process grid with the least cut surface for the free axes.
fn decide_procs(size: PetscInt, dim: usize, sizes: [PetscInt; 3], fixed: [Option<PetscInt>; 3]) -> crate::Result<[PetscInt; 3]> {
    let mut best: Option<([PetscInt; 3], PetscInt)> = None;
    for m in (1..=size).rev() {
        for n in (1..=size / m).rev() {
            if size % (m * n) != 0 {
                continue;
            }
            let p = size / (m * n);
            let cand = [m, n, p];
            let fits = (0..3).all(|a| {
                let want = if a < dim { fixed[a] } else { Some(1) };
                want.map_or(cand[a] <= sizes[a], |w| cand[a] == w)
            });
            if !fits {
                continue;
            }
            let cost = (cand[0] - 1) * sizes[1] * sizes[2] + (cand[1] - 1) * sizes[0] * sizes[2]
                + (cand[2] - 1) * sizes[0] * sizes[1];
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((cand, cost));
            }
        }
    }
    best.map(|(procs, _)| procs).ok_or_else(|| petsc_err!(ARG_INCOMP,
        "Cannot split {} processes over a {}x{}x{} grid with process counts {:?}", size, sizes[0], sizes[1], sizes[2], fixed))
}

struct Geometry {
    procs: [PetscInt; 3],
    counts: [Vec<PetscInt>; 3],
    starts: [Vec<PetscInt>; 3],
    pcoord: [PetscInt; 3],
    xs: [PetscInt; 3],
    xm: [PetscInt; 3],
    gxs: [PetscInt; 3],
    gxm: [PetscInt; 3],
}

fn geometry(comm: &Communicator, dm: &DmData) -> crate::Result<Geometry> {
    let size = comm.size() as PetscInt;
    let dim = dm.dim;
    let mut fixed = dm.procs;
    for a in 0..dim {
        if let Some(r) = &dm.ranges[a] {
            let n = r.len() as PetscInt;
            if fixed[a].map_or(false, |p| p != n) {
                return Err(petsc_err!(ARG_INCOMP, "Ownership ranges along axis {} have {} entries for {} processes", a, n, fixed[a].unwrap_or(n)));
            }
            fixed[a] = Some(n);
        }
    }
    let procs = if (0..dim).all(|a| fixed[a].is_some()) {
        let mut procs = [1; 3];
        for a in 0..dim {
            procs[a] = fixed[a].unwrap_or(1);
        }
        if procs.iter().product::<PetscInt>() != size {
            return Err(petsc_err!(ARG_INCOMP, "Results of specified processor counts {}x{}x{} do not match the number of processes {}",
                procs[0], procs[1], procs[2], size));
        }
        procs
    } else {
        decide_procs(size, dim, dm.sizes, fixed)?
    };

    let rank = comm.rank() as PetscInt;
    let pcoord = [rank % procs[0], (rank / procs[0]) % procs[1], rank / (procs[0] * procs[1])];
    let mut counts: [Vec<PetscInt>; 3] = Default::default();
    let mut starts: [Vec<PetscInt>; 3] = Default::default();
    let (mut xs, mut xm, mut gxs, mut gxm) = ([0; 3], [1; 3], [0; 3], [1; 3]);
    for a in 0..3 {
        let big = dm.sizes[a];
        counts[a] = match dm.ranges[a].as_ref().filter(|_| a < dim) {
            Some(r) => {
                let sum: PetscInt = r.iter().sum();
                if sum != big {
                    return Err(petsc_err!(ARG_INCOMP, "Ownership ranges along axis {} sum to {}, the grid has {} points", a, sum, big));
                }
                r.clone()
            }
            None => {
                if procs[a] > big {
                    return Err(petsc_err!(ARG_OUTOFRANGE, "Partition along axis {} is too fine! {} points for {} processes", a, big, procs[a]));
                }
                (0..procs[a]).map(|p| split_ownership(big, procs[a] as Rank, p as Rank)).collect()
            }
        };
        starts[a] = std::iter::once(0).chain(counts[a].iter().scan(0, |acc, &c| { *acc += c; Some(*acc) })).collect();

        let p = pcoord[a] as usize;
        xs[a] = starts[a][p];
        xm[a] = counts[a][p];
        let s = if a < dim { dm.s } else { 0 };
        if a < dim && xm[a] < s && (procs[a] > 1 || dm.bx[a] == DMBoundaryType::DM_BOUNDARY_PERIODIC) {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Local width {} along axis {} is smaller than stencil width {}", xm[a], a, s));
        }
        let (lo, hi) = if dm.bx[a] == DMBoundaryType::DM_BOUNDARY_NONE || a >= dim {
            ((xs[a] - s).max(0), (xs[a] + xm[a] + s).min(big))
        } else {
            (xs[a] - s, xs[a] + xm[a] + s)
        };
        gxs[a] = lo;
        gxm[a] = hi - lo;
    }
    Ok(Geometry { procs, counts, starts, pcoord, xs, xm, gxs, gxm })
}

/// Maps a coordinate outside of `[0, big)` back into the grid, if the boundary does that.
fn wrap(g: PetscInt, big: PetscInt, bx: DMBoundaryType) -> Option<PetscInt> {
    if (0..big).contains(&g) {
        return Some(g);
    }
    let w = match bx {
        DMBoundaryType::DM_BOUNDARY_PERIODIC => g.rem_euclid(big),
        DMBoundaryType::DM_BOUNDARY_MIRROR => if g < 0 { -g } else { 2 * (big - 1) - g },
        DMBoundaryType::DM_BOUNDARY_NONE | DMBoundaryType::DM_BOUNDARY_GHOSTED => return None,
    };
    Some(w).filter(|w| (0..big).contains(w))
}

/// Computes the process grid, the global layout and the ghost scatter. Collective.
pub(crate) fn set_up(comm: &Communicator, dm: &mut DmData) -> crate::Result<()> {
    check_valid(&dm.hdr, "DM")?;
    if dm.setup.is_some() {
        return Ok(());
    }
    if dm.dim == 0 {
        return Err(petsc_err!(ARG_WRONGSTATE, "DM dimension not set"));
    }
    let geo = comm.agree(geometry(comm, dm))?;
    let dof = dm.dof;
    let nlocal = geo.xm.iter().product::<PetscInt>() * dof;
    let nglobal = dm.sizes.iter().product::<PetscInt>() * dof;
    let global = Layout::setup(comm, Some(nlocal), Some(nglobal))?;

    let mut setup = DaSetup {
        procs: geo.procs,
        counts: geo.counts,
        starts: geo.starts,
        pcoord: geo.pcoord,
        xs: geo.xs,
        xm: geo.xm,
        gxs: geo.gxs,
        gxm: geo.gxm,
        global,
        ltog: vec![],
        g2l: Scatter::default(),
    };

    let star = dm.stencil == DMDAStencilType::DMDA_STENCIL_STAR;
    let mut ltog = Vec::with_capacity(setup.local_len(dof));
    for k in setup.gxs[2]..setup.gxs[2] + setup.gxm[2] {
        for j in setup.gxs[1]..setup.gxs[1] + setup.gxm[1] {
            for i in setup.gxs[0]..setup.gxs[0] + setup.gxm[0] {
                let g = [i, j, k];
                let outside = (0..3).filter(|&a| g[a] < setup.xs[a] || g[a] >= setup.xs[a] + setup.xm[a]).count();
                let mapped = if star && outside > 1 {
                    None
                } else {
                    let w = [wrap(i, dm.sizes[0], dm.bx[0]), wrap(j, dm.sizes[1], dm.bx[1]), wrap(k, dm.sizes[2], dm.bx[2])];
                    match w {
                        [Some(a), Some(b), Some(c)] => Some([a, b, c]),
                        _ => None,
                    }
                };
                for c in 0..dof {
                    ltog.push(mapped.map_or(-1, |g| setup.global_index(g, c, dof)));
                }
            }
        }
    }
    setup.g2l = Scatter::create(comm, &setup.global, &ltog)?;
    setup.ltog = ltog;
    log::debug!("[{}] DMDA set up: {:?} grid on a {:?} process grid, owned box at {:?} of size {:?}",
        comm.rank(), &dm.sizes[..dm.dim], &setup.procs[..dm.dim], &setup.xs[..dm.dim], &setup.xm[..dm.dim]);
    dm.setup = Some(setup);
    Ok(())
}

pub(crate) fn get_info(_comm: &Communicator, dm: &DmData) -> crate::Result<DMDALocalInfo> {
    let g = dm.geometry()?;
    Ok(DMDALocalInfo {
        dim: dm.dim as PetscInt,
        dof: dm.dof,
        sw: dm.s,
        mx: dm.sizes[0], my: dm.sizes[1], mz: dm.sizes[2],
        xs: g.xs[0], ys: g.xs[1], zs: g.xs[2],
        xm: g.xm[0], ym: g.xm[1], zm: g.xm[2],
        gxs: g.gxs[0], gys: g.gxs[1], gzs: g.gxs[2],
        gxm: g.gxm[0], gym: g.gxm[1], gzm: g.gxm[2],
        bx: dm.bx[0], by: dm.bx[1], bz: dm.bx[2],
        st: dm.stencil,
    })
}

/// Ranks of the neighboring processes, x fastest, including this one in the middle. -1 where
/// there is no neighbor. 3, 9 or 27 entries depending on the dimension.
pub(crate) fn get_neighbors(_comm: &Communicator, dm: &DmData) -> crate::Result<Vec<Rank>> {
    let g = dm.geometry()?;
    let offsets = |a: usize| if a < dm.dim { -1..=1 } else { 0..=0 };
    let mut out = vec![];
    for dk in offsets(2) {
        for dj in offsets(1) {
            for di in offsets(0) {
                let mut p = [0; 3];
                let mut ok = true;
                for (a, d) in [di, dj, dk].into_iter().enumerate() {
                    p[a] = g.pcoord[a] + d;
                    if !(0..g.procs[a]).contains(&p[a]) {
                        if dm.bx[a] == DMBoundaryType::DM_BOUNDARY_PERIODIC {
                            p[a] = p[a].rem_euclid(g.procs[a]);
                        } else {
                            ok = false;
                        }
                    }
                }
                out.push(if ok { g.rank_of(p) } else { -1 });
            }
        }
    }
    Ok(out)
}

pub(crate) fn create_global_vector(_comm: &Communicator, dm: &DmData) -> crate::Result<VecData> {
    let g = dm.geometry()?;
    VecData::with_layout(g.global.clone(), vec![0.0; g.global.n as usize])
}

pub(crate) fn create_local_vector(comm: &Communicator, dm: &DmData) -> crate::Result<VecData> {
    let g = dm.geometry()?;
    super::vec::create_seq(comm, g.local_len(dm.dof) as PetscInt)
}

/// Lends out a pooled global vector. Its values are whatever they were when it was returned.
pub(crate) fn get_global_vector(comm: &Communicator, dm: &DmData) -> crate::Result<VecData> {
    let v = match dm.global_pool.borrow_mut().pop() {
        Some(v) => v,
        None => create_global_vector(comm, dm)?,
    };
    dm.outstanding.set(dm.outstanding.get() + 1);
    Ok(v)
}

pub(crate) fn get_local_vector(comm: &Communicator, dm: &DmData) -> crate::Result<VecData> {
    let v = match dm.local_pool.borrow_mut().pop() {
        Some(v) => v,
        None => create_local_vector(comm, dm)?,
    };
    dm.outstanding.set(dm.outstanding.get() + 1);
    Ok(v)
}

fn restore(dm: &DmData, pool: &RefCell<Vec<VecData>>, v: VecData, expected: usize) -> crate::Result<()> {
    check_valid(&v.hdr, "Vec")?;
    if v.layout()?.n as usize != expected {
        return Err(petsc_err!(ARG_INCOMP, "Vector of local size {} does not come from this DM", v.layout()?.n));
    }
    pool.borrow_mut().push(v);
    dm.outstanding.set(dm.outstanding.get().saturating_sub(1));
    Ok(())
}

pub(crate) fn restore_global_vector(_comm: &Communicator, dm: &DmData, v: VecData) -> crate::Result<()> {
    let n = dm.geometry()?.global.n as usize;
    restore(dm, &dm.global_pool, v, n)
}

pub(crate) fn restore_local_vector(_comm: &Communicator, dm: &DmData, v: VecData) -> crate::Result<()> {
    let n = dm.geometry()?.local_len(dm.dof);
    restore(dm, &dm.local_pool, v, n)
}

fn check_global(dm: &DmData, v: &VecData) -> crate::Result<()> {
    let g = dm.geometry()?;
    if !v.layout()?.compatible(&g.global) {
        return Err(petsc_err!(ARG_INCOMP, "Vector is not a global vector of this DM"));
    }
    Ok(())
}

fn check_local(dm: &DmData, v: &VecData) -> crate::Result<()> {
    let g = dm.geometry()?;
    if v.layout()?.n as usize != g.local_len(dm.dof) {
        return Err(petsc_err!(ARG_INCOMP, "Vector of local size {} is not a local vector of this DM (local size {})",
            v.layout()?.n, g.local_len(dm.dof)));
    }
    Ok(())
}

fn start_halo(dm: &DmData, halo: Halo) -> crate::Result<()> {
    let mut slot = dm.halo.borrow_mut();
    if let Some(prev) = slot.as_ref() {
        return Err(petsc_err!(ARG_WRONGSTATE, "{}_begin() called before the pending {}_end()", halo.name(), prev.name()));
    }
    *slot = Some(halo);
    Ok(())
}

fn take_halo(dm: &DmData, op: &'static str) -> crate::Result<Halo> {
    let mut slot = dm.halo.borrow_mut();
    match slot.take() {
        Some(halo) if halo.name() == op => Ok(halo),
        Some(other) => {
            let name = other.name();
            *slot = Some(other);
            Err(petsc_err!(ARG_WRONGSTATE, "{}_end() called while {} is pending", op, name))
        }
        None => Err(petsc_err!(ARG_WRONGSTATE, "{}_end() called without {}_begin()", op, op)),
    }
}

fn check_mode(begun: InsertMode, given: InsertMode, op: &str) -> crate::Result<()> {
    if begun != given {
        return Err(petsc_err!(ARG_INCOMP, "{}_end() mode {:?} does not match {}_begin() mode {:?}", op, given, op, begun));
    }
    Ok(())
}

pub(crate) fn global_to_local_begin(comm: &Communicator, dm: &DmData, g: &VecData, mode: InsertMode) -> crate::Result<()> {
    check_global(dm, g)?;
    let pending = dm.geometry()?.g2l.forward_begin(comm, g.local(), mode)?;
    start_halo(dm, Halo::GlobalToLocal(pending, mode))
}

pub(crate) fn global_to_local_end(comm: &Communicator, dm: &DmData, l: &mut VecData, mode: InsertMode) -> crate::Result<()> {
    check_local(dm, l)?;
    match take_halo(dm, "global_to_local")? {
        Halo::GlobalToLocal(pending, begun) => {
            check_mode(begun, mode, "global_to_local")?;
            dm.geometry()?.g2l.forward_end(comm, pending, l.local_mut())
        }
        _ => Err(petsc_err!(PLIB, "halo exchange state is corrupt")),
    }
}

/// Ghost values are added to their owners with `ADD_VALUES` and ignored with `INSERT_VALUES`.
pub(crate) fn local_to_global_begin(comm: &Communicator, dm: &DmData, l: &VecData, mode: InsertMode) -> crate::Result<()> {
    check_local(dm, l)?;
    let setup = dm.geometry()?;
    let halo = match mode {
        InsertMode::ADD_VALUES => Halo::LocalToGlobalAdd(setup.g2l.reverse_begin(comm, l.local(), mode)?),
        InsertMode::INSERT_VALUES => {
            let local = l.local();
            Halo::LocalToGlobalInsert(setup.owned_slots(dm.dof).map(|s| local[s]).collect())
        }
    };
    start_halo(dm, halo)
}

pub(crate) fn local_to_global_end(comm: &Communicator, dm: &DmData, g: &mut VecData, mode: InsertMode) -> crate::Result<()> {
    check_global(dm, g)?;
    match take_halo(dm, "local_to_global")? {
        Halo::LocalToGlobalAdd(pending) => {
            check_mode(InsertMode::ADD_VALUES, mode, "local_to_global")?;
            dm.geometry()?.g2l.reverse_end(comm, pending, g.local_mut())
        }
        Halo::LocalToGlobalInsert(values) => {
            check_mode(InsertMode::INSERT_VALUES, mode, "local_to_global")?;
            g.local_mut().copy_from_slice(&values);
            Ok(())
        }
        _ => Err(petsc_err!(PLIB, "halo exchange state is corrupt")),
    }
}

/// Fills `to`, ghost points included, from the owned points of `from`.
pub(crate) fn local_to_local_begin(comm: &Communicator, dm: &DmData, from: &VecData, mode: InsertMode) -> crate::Result<()> {
    check_local(dm, from)?;
    let setup = dm.geometry()?;
    let local = from.local();
    let owned = setup.owned_slots(dm.dof).map(|s| local[s]).collect::<Vec<_>>();
    let pending = setup.g2l.forward_begin(comm, &owned, mode)?;
    start_halo(dm, Halo::LocalToLocal(pending, mode))
}

pub(crate) fn local_to_local_end(comm: &Communicator, dm: &DmData, to: &mut VecData, mode: InsertMode) -> crate::Result<()> {
    check_local(dm, to)?;
    match take_halo(dm, "local_to_local")? {
        Halo::LocalToLocal(pending, begun) => {
            check_mode(begun, mode, "local_to_local")?;
            dm.geometry()?.g2l.forward_end(comm, pending, to.local_mut())
        }
        _ => Err(petsc_err!(PLIB, "halo exchange state is corrupt")),
    }
}

/// A matrix with the nonzero pattern of the stencil, assembled with zeros. Collective.
pub(crate) fn create_matrix(comm: &Communicator, dm: &DmData) -> crate::Result<MatData> {
    let setup = dm.geometry()?;
    let dof = dm.dof;
    let dim = dm.dim;
    let s = dm.s;

    let mut offsets = vec![];
    let range = |a: usize| if a < dim { -s..=s } else { 0..=0 };
    for dk in range(2) {
        for dj in range(1) {
            for di in range(0) {
                let d = [di, dj, dk];
                let nonzero_axes = d.iter().filter(|&&x| x != 0).count();
                if dm.stencil == DMDAStencilType::DMDA_STENCIL_STAR && nonzero_axes > 1 {
                    continue;
                }
                offsets.push(d);
            }
        }
    }

    let mut a = mat::create(comm)?;
    mat::set_layouts(&mut a, setup.global.clone(), setup.global.clone());
    let mut cols = vec![];
    for k in setup.xs[2]..setup.xs[2] + setup.xm[2] {
        for j in setup.xs[1]..setup.xs[1] + setup.xm[1] {
            for i in setup.xs[0]..setup.xs[0] + setup.xm[0] {
                cols.clear();
                for d in &offsets {
                    let n = [
                        wrap(i + d[0], dm.sizes[0], dm.bx[0].periodic_only()),
                        wrap(j + d[1], dm.sizes[1], dm.bx[1].periodic_only()),
                        wrap(k + d[2], dm.sizes[2], dm.bx[2].periodic_only()),
                    ];
                    if let [Some(x), Some(y), Some(z)] = n {
                        cols.extend((0..dof).map(|c| setup.global_index([x, y, z], c, dof)));
                    }
                }
                let rows = (0..dof).map(|c| setup.global_index([i, j, k], c, dof)).collect::<Vec<_>>();
                let zeros = vec![0.0; rows.len() * cols.len()];
                mat::set_values(comm, &mut a, &rows, &cols, &zeros, InsertMode::INSERT_VALUES)?;
            }
        }
    }
    mat::assembly_begin(comm, &mut a, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    mat::assembly_end(comm, &mut a, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    mat::set_option(comm, &mut a, MatOption::MAT_NEW_NONZERO_ALLOCATION_ERR, true)?;
    Ok(a)
}

impl DMBoundaryType {
    /// Only periodic boundaries couple points across the edge of the grid.
    fn periodic_only(self) -> Self {
        match self {
            DMBoundaryType::DM_BOUNDARY_PERIODIC => self,
            _ => DMBoundaryType::DM_BOUNDARY_NONE,
        }
    }
}

pub(crate) fn view(comm: &Communicator, dm: &DmData, viewer: &ViewerData) -> crate::Result<()> {
    let setup = dm.geometry()?;
    let header = format!("DM Object: {} {} MPI process{}\n  type: da\n", dm.hdr.name(), comm.size(),
        if comm.size() == 1 { "" } else { "es" });
    let mut body = format!("Processor [{}] M {} N {} P {} m {} n {} p {} w {} s {}\n", comm.rank(),
        dm.sizes[0], dm.sizes[1], dm.sizes[2], setup.procs[0], setup.procs[1], setup.procs[2], dm.dof, dm.s);
    let axes = ["X", "Y", "Z"];
    let ranges = (0..dm.dim)
        .map(|a| format!("{} range of indices: {} {}", axes[a], setup.xs[a], setup.xs[a] + setup.xm[a]))
        .collect::<Vec<_>>();
    body += &ranges.join(", ");
    body.push('\n');
    viewer::ascii_write_object(comm, viewer, &header, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm;

    fn da_1d(world: &Communicator, m: PetscInt, bx: DMBoundaryType, s: PetscInt) -> DmData {
        let mut dm = da_create(world, 1).unwrap();
        set_sizes(world, &mut dm, m, 1, 1).unwrap();
        set_boundary_type(world, &mut dm, [bx, DMBoundaryType::DM_BOUNDARY_NONE, DMBoundaryType::DM_BOUNDARY_NONE]).unwrap();
        set_stencil_width(world, &mut dm, s).unwrap();
        set_up(world, &mut dm).unwrap();
        dm
    }

    #[test]
    fn process_grid_prefers_fewer_cuts() {
        assert_eq!(decide_procs(4, 2, [100, 4, 1], [None, None, None]).unwrap(), [4, 1, 1]);
        assert_eq!(decide_procs(4, 2, [8, 8, 1], [None, None, None]).unwrap(), [2, 2, 1]);
        assert_eq!(decide_procs(6, 2, [8, 8, 1], [Some(3), None, None]).unwrap(), [3, 2, 1]);
        assert!(decide_procs(5, 1, [3, 1, 1], [None, None, None]).is_err());
    }

    #[test]
    fn periodic_ghosts_wrap() {
        let res = comm::run_group(2, |world| {
            sys::initialize(world.rank(), Default::default()).unwrap();
            let dm = da_1d(&world, 6, DMBoundaryType::DM_BOUNDARY_PERIODIC, 1);
            let setup = dm.geometry().unwrap();
            (setup.gxs[0], setup.gxm[0], setup.ltog.clone())
        });
        let all: Vec<_> = res.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(all[0], (-1, 5, vec![5, 0, 1, 2, 3]));
        assert_eq!(all[1], (2, 5, vec![2, 3, 4, 5, 0]));
    }

    #[test]
    fn ghosted_boundary_slots_are_never_filled() {
        let world = Communicator::world();
        sys::initialize(0, Default::default()).unwrap();
        let dm = da_1d(&world, 3, DMBoundaryType::DM_BOUNDARY_GHOSTED, 1);
        assert_eq!(dm.geometry().unwrap().ltog, vec![-1, 0, 1, 2, -1]);
        let mirror = da_1d(&world, 3, DMBoundaryType::DM_BOUNDARY_MIRROR, 1);
        assert_eq!(mirror.geometry().unwrap().ltog, vec![1, 0, 1, 2, 1]);
        sys::finalize();
    }
}
