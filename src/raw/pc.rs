//! Preconditioners. Every type here works on the diagonal block of the local rows, so
//! applying one never communicates.

use super::mat::MatData;
use super::vec::VecData;
use super::viewer::{self, ViewerData};
use super::{check_valid, sys, ClassId, PetscHeader};
use crate::comm::Communicator;
use crate::{PetscInt, PetscReal, PetscScalar};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PCType {
    /// The identity.
    PCNONE,
    /// Diagonal scaling.
    PCJACOBI,
    /// Symmetric successive over-relaxation on the local rows.
    PCSOR,
    /// Block Jacobi with one block per process, each factored with ILU(0).
    PCBJACOBI,
}

impl PCType {
    pub(crate) fn name(self) -> &'static str {
        match self {
            PCType::PCNONE => "none",
            PCType::PCJACOBI => "jacobi",
            PCType::PCSOR => "sor",
            PCType::PCBJACOBI => "bjacobi",
        }
    }

    pub(crate) fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "none" => Ok(PCType::PCNONE),
            "jacobi" => Ok(PCType::PCJACOBI),
            "sor" => Ok(PCType::PCSOR),
            "bjacobi" | "ilu" => Ok(PCType::PCBJACOBI),
            _ => Err(petsc_err!(ARG_UNKNOWN_TYPE, "Unknown PC type: {}", name)),
        }
    }
}

impl std::fmt::Display for PCType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows of the diagonal block in compressed form, columns sorted within each row.
#[derive(Debug, Default, Clone)]
struct LocalBlock {
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<PetscScalar>,
    diag: Vec<usize>,
}

impl LocalBlock {
    fn extract(m: &MatData) -> crate::Result<Self> {
        m.check_assembled()?;
        let (rmap, cmap) = m.layouts()?;
        if rmap.n != cmap.n || rmap.rstart != cmap.rstart {
            return Err(petsc_err!(SUP, "Preconditioner needs a square diagonal block, local rows {} local columns {}", rmap.n, cmap.n));
        }
        let n = rmap.n as usize;
        let csr = &m.csr;
        let mut block = LocalBlock { row_ptr: vec![0], ..Default::default() };
        for i in 0..n {
            let mut diag = None;
            for k in csr.row_ptr[i]..csr.row_ptr[i + 1] {
                let c = csr.cols[k];
                if c < n {
                    if c == i {
                        diag = Some(block.cols.len());
                    }
                    block.cols.push(c);
                    block.vals.push(csr.vals[k]);
                }
            }
            block.row_ptr.push(block.cols.len());
            let d = diag.filter(|&d| block.vals[d] != 0.0)
                .ok_or_else(|| petsc_err!(MAT_LU_ZRPVT, "Zero pivot in row {}", rmap.rstart + i as PetscInt))?;
            block.diag.push(d);
        }
        Ok(block)
    }

    fn n(&self) -> usize {
        self.diag.len()
    }

    /// Incomplete LU with the nonzero pattern of the block. L has a unit diagonal and is
    /// stored below the diagonal of each row, U on and above it.
    fn factor_ilu0(&mut self) -> crate::Result<()> {
        let n = self.n();
        let mut pos: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            let (lo, hi) = (self.row_ptr[i], self.row_ptr[i + 1]);
            for p in lo..hi {
                pos[self.cols[p]] = Some(p);
            }
            for p in lo..self.diag[i] {
                let k = self.cols[p];
                let lik = self.vals[p] / self.vals[self.diag[k]];
                self.vals[p] = lik;
                for q in self.diag[k] + 1..self.row_ptr[k + 1] {
                    if let Some(t) = pos[self.cols[q]] {
                        self.vals[t] -= lik * self.vals[q];
                    }
                }
            }
            if self.vals[self.diag[i]] == 0.0 {
                return Err(petsc_err!(MAT_LU_ZRPVT, "Zero pivot in ILU(0) at local row {}", i));
            }
            for p in lo..hi {
                pos[self.cols[p]] = None;
            }
        }
        Ok(())
    }

    fn ilu_solve(&self, r: &[PetscScalar], z: &mut [PetscScalar]) {
        let n = self.n();
        for i in 0..n {
            let mut sum = r[i];
            for p in self.row_ptr[i]..self.diag[i] {
                sum -= self.vals[p] * z[self.cols[p]];
            }
            z[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = z[i];
            for p in self.diag[i] + 1..self.row_ptr[i + 1] {
                sum -= self.vals[p] * z[self.cols[p]];
            }
            z[i] = sum / self.vals[self.diag[i]];
        }
    }

    fn sor_sweep(&self, r: &[PetscScalar], z: &mut [PetscScalar], omega: PetscReal, i: usize) {
        let mut sum = r[i];
        for p in self.row_ptr[i]..self.row_ptr[i + 1] {
            if p != self.diag[i] {
                sum -= self.vals[p] * z[self.cols[p]];
            }
        }
        z[i] = (1.0 - omega) * z[i] + omega * sum / self.vals[self.diag[i]];
    }

    /// Symmetric sweeps starting from a zero guess.
    fn ssor(&self, r: &[PetscScalar], z: &mut [PetscScalar], omega: PetscReal, its: PetscInt) {
        z.iter_mut().for_each(|zi| *zi = 0.0);
        for _ in 0..its {
            for i in 0..self.n() {
                self.sor_sweep(r, z, omega, i);
            }
            for i in (0..self.n()).rev() {
                self.sor_sweep(r, z, omega, i);
            }
        }
    }
}

#[derive(Debug)]
enum Factor {
    Identity,
    Jacobi(Vec<PetscScalar>),
    Sor(LocalBlock),
    Ilu(LocalBlock),
}

#[derive(Debug, Default)]
pub(crate) struct PcData {
    pub(crate) hdr: PetscHeader,
    pub(crate) pc_type: Option<PCType>,
    omega: PetscReal,
    sor_its: PetscInt,
    factor: Option<Factor>,
}

impl PcData {
    pub(crate) fn is_set_up(&self) -> bool {
        self.factor.is_some()
    }
}

pub(crate) fn create(_comm: &Communicator) -> crate::Result<PcData> {
    Ok(PcData { hdr: PetscHeader::new(ClassId::PC)?, omega: 1.0, sor_its: 1, ..Default::default() })
}

pub(crate) fn destroy(pc: &mut PcData) -> crate::Result<()> {
    *pc = PcData::default();
    Ok(())
}

pub(crate) fn set_type(_comm: &Communicator, pc: &mut PcData, pc_type: PCType) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    if pc.pc_type != Some(pc_type) {
        pc.pc_type = Some(pc_type);
        pc.factor = None;
    }
    Ok(())
}

pub(crate) fn get_type(_comm: &Communicator, pc: &PcData) -> crate::Result<Option<PCType>> {
    check_valid(&pc.hdr, "PC")?;
    Ok(pc.pc_type)
}

pub(crate) fn sor_set_omega(_comm: &Communicator, pc: &mut PcData, omega: PetscReal) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    if !(omega > 0.0 && omega < 2.0) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Relaxation out of range: {}", omega));
    }
    pc.omega = omega;
    Ok(())
}

pub(crate) fn sor_set_iterations(_comm: &Communicator, pc: &mut PcData, its: PetscInt) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    if its < 1 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Number of SOR sweeps must be positive: {}", its));
    }
    pc.sor_its = its;
    Ok(())
}

pub(crate) fn set_from_options(comm: &Communicator, pc: &mut PcData) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    if let Some(name) = sys::with_options(|db| db.get_string("-pc_type")) {
        set_type(comm, pc, PCType::from_name(&name)?)?;
    }
    if let Some(omega) = sys::with_options(|db| db.get_real("-pc_sor_omega"))? {
        sor_set_omega(comm, pc, omega)?;
    }
    if let Some(its) = sys::with_options(|db| db.get_int("-pc_sor_its"))? {
        sor_set_iterations(comm, pc, its)?;
    }
    Ok(())
}

/// Drops whatever was computed from the previous operator.
pub(crate) fn reset(pc: &mut PcData) {
    pc.factor = None;
}

/// Builds the preconditioner from `p`. Collective so that a zero pivot on one process
/// fails everywhere.
pub(crate) fn set_up(comm: &Communicator, pc: &mut PcData, p: &MatData) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    let pc_type = *pc.pc_type.get_or_insert(PCType::PCBJACOBI);
    let factor = match pc_type {
        PCType::PCNONE => Ok(Factor::Identity),
        PCType::PCJACOBI => jacobi_diagonal(p).map(Factor::Jacobi),
        PCType::PCSOR => LocalBlock::extract(p).map(Factor::Sor),
        PCType::PCBJACOBI => LocalBlock::extract(p).and_then(|mut b| b.factor_ilu0().map(|_| Factor::Ilu(b))),
    };
    pc.factor = Some(comm.agree(factor)?);
    log::debug!("[{}] PC {} set up as {}", comm.rank(), pc.hdr.name(), pc_type);
    Ok(())
}

fn jacobi_diagonal(p: &MatData) -> crate::Result<Vec<PetscScalar>> {
    p.check_assembled()?;
    let (rmap, _) = p.layouts()?;
    let mut inv = Vec::with_capacity(rmap.n as usize);
    let mut zeros = 0;
    for i in 0..rmap.n as usize {
        let row = rmap.rstart + i as PetscInt;
        let d = p.row_entries(i).find(|&(c, _)| c == row).map_or(0.0, |(_, v)| v);
        if d == 0.0 {
            zeros += 1;
            inv.push(1.0);
        } else {
            inv.push(1.0 / d);
        }
    }
    if zeros > 0 {
        log::info!("Zero detected in diagonal of matrix, using 1 at {} location(s)", zeros);
    }
    Ok(inv)
}

/// z = B r
pub(crate) fn apply(_comm: &Communicator, pc: &PcData, r: &VecData, z: &mut VecData) -> crate::Result<()> {
    let factor = pc.factor.as_ref().ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "PC must be set up before it is applied"))?;
    if r.layout()?.n != z.layout()?.n {
        return Err(petsc_err!(ARG_SIZ, "Nonconforming vector sizes {} and {}", r.layout()?.n, z.layout()?.n));
    }
    let src = r.local();
    let dst = z.local_mut();
    match factor {
        Factor::Identity => dst.copy_from_slice(src),
        Factor::Jacobi(inv) => dst.iter_mut().zip(src.iter().zip(inv)).for_each(|(zi, (ri, di))| *zi = ri * di),
        Factor::Sor(block) => block.ssor(src, dst, pc.omega, pc.sor_its),
        Factor::Ilu(block) => block.ilu_solve(src, dst),
    }
    Ok(())
}

pub(crate) fn view(comm: &Communicator, pc: &PcData, viewer: &ViewerData) -> crate::Result<()> {
    check_valid(&pc.hdr, "PC")?;
    let header = format!("PC Object: {} {} MPI process{}\n", pc.hdr.name(), comm.size(), if comm.size() == 1 { "" } else { "es" });
    let body = match pc.pc_type {
        None => "  type: not yet set\n".to_string(),
        Some(PCType::PCSOR) => format!("  type: sor\n    type = SYMMETRIC_SWEEP, iterations = {}, omega = {}\n", pc.sor_its, pc.omega),
        Some(PCType::PCBJACOBI) => format!("  type: bjacobi\n    number of blocks = {}\n    local blocks use ILU(0)\n", comm.size()),
        Some(t) => format!("  type: {}\n", t),
    };
    // identical on every process
    let body = if comm.rank() == 0 { body } else { String::new() };
    viewer::ascii_write_object(comm, viewer, &header, &body)
}
