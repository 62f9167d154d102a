//! Distributed sparse matrices in compressed row storage.
//!
//! Entries are staged per owned row until assembly, which ships off-process entries to their
//! owners and rebuilds the compressed rows and the scatter that gathers the off-process part of
//! `x` needed by `mult`.

use std::collections::BTreeMap;

use super::layout::Layout;
use super::scatter::Scatter;
use super::vec::VecData;
use super::{check_valid, ClassId, PetscHeader};
use crate::comm::{Communicator, Exchange};
use crate::{InsertMode, PetscInt, PetscScalar};

/// Matrix storage formats. Every one of them stores compressed rows.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatType {
    MATAIJ,
    MATSEQAIJ,
    MATMPIAIJ,
}

impl MatType {
    pub(crate) fn name(self) -> &'static str {
        match self {
            MatType::MATAIJ => "aij",
            MatType::MATSEQAIJ => "seqaij",
            MatType::MATMPIAIJ => "mpiaij",
        }
    }

    pub(crate) fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "aij" => Ok(MatType::MATAIJ),
            "seqaij" => Ok(MatType::MATSEQAIJ),
            "mpiaij" => Ok(MatType::MATMPIAIJ),
            _ => Err(petsc_err!(ARG_UNKNOWN_TYPE, "Unknown Mat type given: {}", name)),
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatAssemblyType {
    /// Makes the staged entries visible, more entries will follow.
    MAT_FLUSH_ASSEMBLY,
    /// Ends the insertion phase.
    MAT_FINAL_ASSEMBLY,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatOption {
    MAT_SYMMETRIC,
    /// Inserting an entry outside of the nonzero pattern of a final assembly is an error.
    MAT_NEW_NONZERO_ALLOCATION_ERR,
    /// Entries for rows owned by other processes are dropped.
    MAT_IGNORE_OFF_PROC_ENTRIES,
    /// Zeros are not added to the nonzero pattern.
    MAT_IGNORE_ZERO_ENTRIES,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MatOptions {
    pub symmetric: bool,
    pub new_nonzero_err: bool,
    pub ignore_off_proc: bool,
    pub ignore_zero: bool,
}

/// Compressed rows of the local part. Column indices point into `[owned x | ghost x]`.
#[derive(Debug, Default)]
pub(crate) struct Csr {
    pub row_ptr: Vec<usize>,
    pub cols: Vec<usize>,
    pub vals: Vec<PetscScalar>,
    pub ghosts: Vec<PetscInt>,
}

type StashEntry = (PetscInt, PetscInt, PetscScalar);

#[derive(Debug, Default)]
pub(crate) struct MatData {
    pub(crate) hdr: PetscHeader,
    sizes: [Option<PetscInt>; 4],
    pub(crate) mat_type: Option<MatType>,
    pub(crate) rmap: Option<Layout>,
    pub(crate) cmap: Option<Layout>,
    rows: Vec<BTreeMap<PetscInt, PetscScalar>>,
    stash: Vec<StashEntry>,
    stash_mode: Option<InsertMode>,
    pending: Option<(Exchange<Vec<StashEntry>>, InsertMode)>,
    pub(crate) assembled: bool,
    structure_final: bool,
    pub(crate) csr: Csr,
    mvctx: Option<Scatter>,
    pub(crate) options: MatOptions,
}

impl MatData {
    pub(crate) fn layouts(&self) -> crate::Result<(&Layout, &Layout)> {
        check_valid(&self.hdr, "Mat")?;
        match (&self.rmap, &self.cmap) {
            (Some(r), Some(c)) => Ok((r, c)),
            _ => Err(petsc_err!(ARG_WRONGSTATE, "Must call set_sizes() and set_up() first")),
        }
    }

    pub(crate) fn check_assembled(&self) -> crate::Result<()> {
        self.layouts()?;
        if !self.assembled {
            return Err(petsc_err!(ARG_WRONGSTATE, "Not for unassembled matrix"));
        }
        Ok(())
    }

    /// Iterates the stored entries of local row `i` as `(global column, value)`.
    pub(crate) fn row_entries(&self, i: usize) -> impl Iterator<Item = (PetscInt, PetscScalar)> + '_ {
        self.rows[i].iter().map(|(&c, &v)| (c, v))
    }

    fn insert(&mut self, row: PetscInt, col: PetscInt, val: PetscScalar, mode: InsertMode) -> crate::Result<()> {
        let rstart = self.rmap.as_ref().map_or(0, |r| r.rstart);
        let entries = &mut self.rows[(row - rstart) as usize];
        match entries.get_mut(&col) {
            Some(dst) => mode.apply(dst, val),
            None => {
                if self.options.ignore_zero && val == 0.0 {
                    return Ok(());
                }
                if self.structure_final && self.options.new_nonzero_err {
                    return Err(petsc_err!(ARG_OUTOFRANGE,
                        "Inserting a new nonzero at global row/column ({}, {}) into matrix", row, col));
                }
                entries.insert(col, val);
                self.structure_final = false;
            }
        }
        Ok(())
    }
}

pub(crate) fn create(_comm: &Communicator) -> crate::Result<MatData> {
    Ok(MatData { hdr: PetscHeader::new(ClassId::Mat)?, ..Default::default() })
}

pub(crate) fn destroy(m: &mut MatData) -> crate::Result<()> {
    *m = MatData::default();
    Ok(())
}

pub(crate) fn set_sizes(_comm: &Communicator, m: &mut MatData, local_rows: Option<PetscInt>, local_cols: Option<PetscInt>,
    global_rows: Option<PetscInt>, global_cols: Option<PetscInt>) -> crate::Result<()>
{
    check_valid(&m.hdr, "Mat")?;
    if m.rmap.is_some() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Cannot change/reset matrix sizes after set up"));
    }
    m.sizes = [local_rows, local_cols, global_rows, global_cols];
    Ok(())
}

pub(crate) fn set_type(_comm: &Communicator, m: &mut MatData, mat_type: MatType) -> crate::Result<()> {
    check_valid(&m.hdr, "Mat")?;
    m.mat_type = Some(mat_type);
    Ok(())
}

pub(crate) fn set_from_options(comm: &Communicator, m: &mut MatData) -> crate::Result<()> {
    check_valid(&m.hdr, "Mat")?;
    if let Some(name) = super::sys::with_options(|db| db.get_string("-mat_type")) {
        m.mat_type = Some(MatType::from_name(&name)?);
    }
    if m.mat_type.is_none() {
        m.mat_type = Some(MatType::MATAIJ);
    }
    if super::sys::with_options(|db| db.get_bool("-mat_ignore_off_proc_entries"))? == Some(true) {
        m.options.ignore_off_proc = true;
    }
    if m.rmap.is_none() && m.sizes.iter().any(Option::is_some) {
        set_up(comm, m)?;
    }
    Ok(())
}

/// Builds the row and column layouts. Collective, does nothing if already set up.
pub(crate) fn set_up(comm: &Communicator, m: &mut MatData) -> crate::Result<()> {
    check_valid(&m.hdr, "Mat")?;
    if m.rmap.is_some() {
        return Ok(());
    }
    let [lr, lc, gr, gc] = m.sizes;
    let rmap = Layout::setup(comm, lr, gr)?;
    let cmap = Layout::setup(comm, lc, gc)?;
    set_layouts(m, rmap, cmap);
    Ok(())
}

pub(crate) fn set_layouts(m: &mut MatData, rmap: Layout, cmap: Layout) {
    m.sizes = [Some(rmap.n), Some(cmap.n), Some(rmap.big_n), Some(cmap.big_n)];
    m.rows = vec![BTreeMap::new(); rmap.n as usize];
    m.rmap = Some(rmap);
    m.cmap = Some(cmap);
    m.mat_type.get_or_insert(MatType::MATAIJ);
}

pub(crate) fn get_option(_comm: &Communicator, m: &MatData, option: MatOption) -> crate::Result<bool> {
    check_valid(&m.hdr, "Mat")?;
    Ok(match option {
        MatOption::MAT_SYMMETRIC => m.options.symmetric,
        MatOption::MAT_NEW_NONZERO_ALLOCATION_ERR => m.options.new_nonzero_err,
        MatOption::MAT_IGNORE_OFF_PROC_ENTRIES => m.options.ignore_off_proc,
        MatOption::MAT_IGNORE_ZERO_ENTRIES => m.options.ignore_zero,
    })
}

pub(crate) fn set_option(_comm: &Communicator, m: &mut MatData, option: MatOption, flg: bool) -> crate::Result<()> {
    check_valid(&m.hdr, "Mat")?;
    match option {
        MatOption::MAT_SYMMETRIC => m.options.symmetric = flg,
        MatOption::MAT_NEW_NONZERO_ALLOCATION_ERR => m.options.new_nonzero_err = flg,
        MatOption::MAT_IGNORE_OFF_PROC_ENTRIES => m.options.ignore_off_proc = flg,
        MatOption::MAT_IGNORE_ZERO_ENTRIES => m.options.ignore_zero = flg,
    }
    Ok(())
}

/// Stages a dense `idxm.len()` by `idxn.len()` block of values given in row major order.
pub(crate) fn set_values(_comm: &Communicator, m: &mut MatData, idxm: &[PetscInt], idxn: &[PetscInt],
    v: &[PetscScalar], mode: InsertMode) -> crate::Result<()>
{
    if v.len() != idxm.len() * idxn.len() {
        return Err(petsc_err!(ARG_SIZ, "Expected {} values for a {}x{} block, got {}",
            idxm.len() * idxn.len(), idxm.len(), idxn.len(), v.len()));
    }
    let (rmap, cmap) = m.layouts()?;
    let (big_m, big_n) = (rmap.big_n, cmap.big_n);
    let owned = rmap.rstart..rmap.rend;
    match (m.stash_mode, mode) {
        (Some(InsertMode::ADD_VALUES), InsertMode::INSERT_VALUES) =>
            return Err(petsc_err!(ARG_WRONGSTATE, "You have already added values; you cannot now insert")),
        (Some(InsertMode::INSERT_VALUES), InsertMode::ADD_VALUES) =>
            return Err(petsc_err!(ARG_WRONGSTATE, "You have already inserted values; you cannot now add")),
        _ => (),
    }
    m.stash_mode = Some(mode);
    m.assembled = false;

    for (i, &row) in idxm.iter().enumerate() {
        if row < 0 {
            continue;
        }
        if row >= big_m {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Row too large: row {} max {}", row, big_m - 1));
        }
        for (j, &col) in idxn.iter().enumerate() {
            if col < 0 {
                continue;
            }
            if col >= big_n {
                return Err(petsc_err!(ARG_OUTOFRANGE, "Column too large: col {} max {}", col, big_n - 1));
            }
            let val = v[i * idxn.len() + j];
            if owned.contains(&row) {
                m.insert(row, col, val, mode)?;
            } else if !m.options.ignore_off_proc {
                m.stash.push((row, col, val));
            }
        }
    }
    Ok(())
}

/// Sends stashed entries to the owners of their rows. Collective.
pub(crate) fn assembly_begin(comm: &Communicator, m: &mut MatData, _ty: MatAssemblyType) -> crate::Result<()> {
    let rmap = m.layouts()?.0.clone();
    if m.pending.is_some() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Matrix assembly already begun, call assembly_end() first"));
    }
    let modes = comm.all_gather(m.stash_mode)?;
    let adds = modes.iter().any(|md| *md == Some(InsertMode::ADD_VALUES));
    let inserts = modes.iter().any(|md| *md == Some(InsertMode::INSERT_VALUES));
    if adds && inserts {
        return Err(petsc_err!(ARG_WRONGSTATE, "Some processors inserted values while others added"));
    }
    if adds || inserts {
        let mode = if adds { InsertMode::ADD_VALUES } else { InsertMode::INSERT_VALUES };
        let mut outgoing = vec![vec![]; rmap.nranks()];
        for entry in m.stash.drain(..) {
            outgoing[rmap.owner(entry.0) as usize].push(entry);
        }
        m.pending = Some((comm.post_all_to_all(outgoing)?, mode));
    }
    Ok(())
}

/// Receives stashed entries and rebuilds the compressed rows. Collective.
pub(crate) fn assembly_end(comm: &Communicator, m: &mut MatData, ty: MatAssemblyType) -> crate::Result<()> {
    m.layouts()?;
    let mut res = Ok(());
    if let Some((exchange, mode)) = m.pending.take() {
        for (row, col, val) in comm.complete(exchange)?.into_iter().flatten() {
            if let Err(err) = m.insert(row, col, val, mode) {
                res = Err(err);
                break;
            }
        }
    }
    comm.agree(res)?;
    m.stash.clear();
    m.stash_mode = None;

    build_csr(comm, m)?;
    m.assembled = true;
    if ty == MatAssemblyType::MAT_FINAL_ASSEMBLY {
        m.structure_final = true;
    }
    log::debug!("[{}] matrix {} assembled ({:?}), {} local nonzeros", comm.rank(), m.hdr.name(), ty, m.csr.vals.len());
    Ok(())
}

fn build_csr(comm: &Communicator, m: &mut MatData) -> crate::Result<()> {
    let (_, cmap) = m.layouts()?;
    let cmap = cmap.clone();
    let nlocal = cmap.n as usize;

    let mut ghosts = m.rows.iter()
        .flat_map(|row| row.keys().copied())
        .filter(|&c| !cmap.owns(c))
        .collect::<Vec<_>>();
    ghosts.sort_unstable();
    ghosts.dedup();

    let mut csr = Csr { row_ptr: Vec::with_capacity(m.rows.len() + 1), ghosts, ..Default::default() };
    csr.row_ptr.push(0);
    for row in &m.rows {
        for (&c, &v) in row {
            let col = if cmap.owns(c) {
                (c - cmap.rstart) as usize
            } else {
                // ghosts is sorted and holds every off-process column
                nlocal + csr.ghosts.binary_search(&c).unwrap_or_default()
            };
            csr.cols.push(col);
            csr.vals.push(v);
        }
        csr.row_ptr.push(csr.cols.len());
    }

    m.mvctx = Some(Scatter::create(comm, &cmap, &csr.ghosts)?);
    m.csr = csr;
    Ok(())
}

fn check_vec(v: &VecData, map: &Layout, which: &str) -> crate::Result<()> {
    let vm = v.layout()?;
    if vm.n != map.n || vm.big_n != map.big_n {
        return Err(petsc_err!(ARG_SIZ, "Nonconforming object sizes: Mat {} dim {} (local {}), Vec dim {} (local {})",
            which, map.big_n, map.n, vm.big_n, vm.n));
    }
    Ok(())
}

/// y = A x. Collective.
pub(crate) fn mult(comm: &Communicator, m: &MatData, x: &VecData, y: &mut VecData) -> crate::Result<()> {
    m.check_assembled()?;
    let (rmap, cmap) = m.layouts()?;
    check_vec(x, cmap, "columns")?;
    check_vec(y, rmap, "rows")?;

    let mut xfull = Vec::with_capacity(cmap.n as usize + m.csr.ghosts.len());
    xfull.extend_from_slice(x.local());
    xfull.resize(cmap.n as usize + m.csr.ghosts.len(), 0.0);
    if let Some(mvctx) = &m.mvctx {
        let (_, ghost) = xfull.split_at_mut(cmap.n as usize);
        mvctx.forward(comm, x.local(), ghost, InsertMode::INSERT_VALUES)?;
    }

    let csr = &m.csr;
    for (i, yi) in y.local_mut().iter_mut().enumerate() {
        let (lo, hi) = (csr.row_ptr[i], csr.row_ptr[i + 1]);
        *yi = csr.cols[lo..hi].iter().zip(&csr.vals[lo..hi]).fold(0.0, |acc: PetscScalar, (&c, &v)| acc + v * xfull[c]);
    }
    Ok(())
}

pub(crate) fn zero_entries(_comm: &Communicator, m: &mut MatData) -> crate::Result<()> {
    m.layouts()?;
    for row in m.rows.iter_mut() {
        row.values_mut().for_each(|v| *v = 0.0);
    }
    m.csr.vals.iter_mut().for_each(|v| *v = 0.0);
    Ok(())
}

/// Reads entries of locally owned rows. Entries that are not stored are zero.
pub(crate) fn get_values(_comm: &Communicator, m: &MatData, idxm: &[PetscInt], idxn: &[PetscInt]) -> crate::Result<Vec<PetscScalar>> {
    let (rmap, _) = m.layouts()?;
    let mut out = Vec::with_capacity(idxm.len() * idxn.len());
    for &row in idxm {
        if row >= 0 && !rmap.owns(row) {
            return Err(petsc_err!(SUP, "Only local values currently supported, row {} is not in {}..{}",
                row, rmap.rstart, rmap.rend));
        }
        for &col in idxn {
            if row < 0 || col < 0 {
                out.push(0.0);
            } else {
                out.push(m.rows[(row - rmap.rstart) as usize].get(&col).copied().unwrap_or(0.0));
            }
        }
    }
    Ok(out)
}

pub(crate) fn get_diagonal(_comm: &Communicator, m: &MatData, d: &mut VecData) -> crate::Result<()> {
    m.check_assembled()?;
    let (rmap, _) = m.layouts()?;
    check_vec(d, rmap, "rows")?;
    let rstart = rmap.rstart;
    for (i, di) in d.local_mut().iter_mut().enumerate() {
        *di = m.rows[i].get(&(rstart + i as PetscInt)).copied().unwrap_or(0.0);
    }
    Ok(())
}

/// Vectors `(x, y)` that can be used in `y = A x`.
pub(crate) fn create_vecs(_comm: &Communicator, m: &MatData) -> crate::Result<(VecData, VecData)> {
    let (rmap, cmap) = m.layouts()?;
    let right = VecData::with_layout(cmap.clone(), vec![0.0; cmap.n as usize])?;
    let left = VecData::with_layout(rmap.clone(), vec![0.0; rmap.n as usize])?;
    Ok((right, left))
}

pub(crate) fn get_size(_comm: &Communicator, m: &MatData) -> crate::Result<(PetscInt, PetscInt)> {
    let (r, c) = m.layouts()?;
    Ok((r.big_n, c.big_n))
}

pub(crate) fn get_local_size(_comm: &Communicator, m: &MatData) -> crate::Result<(PetscInt, PetscInt)> {
    let (r, c) = m.layouts()?;
    Ok((r.n, c.n))
}

pub(crate) fn get_ownership_range(_comm: &Communicator, m: &MatData) -> crate::Result<std::ops::Range<PetscInt>> {
    let (r, _) = m.layouts()?;
    Ok(r.rstart..r.rend)
}

pub(crate) fn get_ownership_ranges(_comm: &Communicator, m: &MatData) -> crate::Result<Vec<std::ops::Range<PetscInt>>> {
    Ok(m.layouts()?.0.ownership_ranges())
}

pub(crate) fn get_ownership_range_column(_comm: &Communicator, m: &MatData) -> crate::Result<std::ops::Range<PetscInt>> {
    let (_, c) = m.layouts()?;
    Ok(c.rstart..c.rend)
}

pub(crate) fn get_ownership_ranges_column(_comm: &Communicator, m: &MatData) -> crate::Result<Vec<std::ops::Range<PetscInt>>> {
    Ok(m.layouts()?.1.ownership_ranges())
}
