//! Krylov solvers.
//!
//! Every method tests convergence on the norm of the unpreconditioned residual `b - A x`.
//! GMRES and BiCGStab are preconditioned from the right so that this norm is available
//! without extra work.

use super::mat::{self, MatData};
use super::pc::{self, PcData};
use super::vec::{self, NormType, VecData};
use super::viewer::{self, ViewerData};
use super::{check_valid, sys, ClassId, PetscHeader};
use crate::comm::Communicator;
use crate::{PetscInt, PetscReal, PetscScalar};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KSPType {
    KSPCG,
    KSPGMRES,
    KSPBCGS,
    KSPRICHARDSON,
    KSPPREONLY,
}

impl KSPType {
    pub(crate) fn name(self) -> &'static str {
        match self {
            KSPType::KSPCG => "cg",
            KSPType::KSPGMRES => "gmres",
            KSPType::KSPBCGS => "bcgs",
            KSPType::KSPRICHARDSON => "richardson",
            KSPType::KSPPREONLY => "preonly",
        }
    }

    pub(crate) fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "cg" => Ok(KSPType::KSPCG),
            "gmres" => Ok(KSPType::KSPGMRES),
            "bcgs" | "bicgstab" => Ok(KSPType::KSPBCGS),
            "richardson" => Ok(KSPType::KSPRICHARDSON),
            "preonly" | "none" => Ok(KSPType::KSPPREONLY),
            _ => Err(petsc_err!(ARG_UNKNOWN_TYPE, "Unknown KSP type: {}", name)),
        }
    }
}

impl std::fmt::Display for KSPType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a solve stopped. Positive values mean it converged, negative values that it diverged.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KSPConvergedReason {
    KSP_CONVERGED_RTOL = 2,
    KSP_CONVERGED_ATOL = 3,
    KSP_CONVERGED_ITS = 4,
    KSP_DIVERGED_NULL = -2,
    KSP_DIVERGED_ITS = -3,
    KSP_DIVERGED_DTOL = -4,
    KSP_DIVERGED_BREAKDOWN = -5,
    KSP_DIVERGED_INDEFINITE_PC = -8,
    KSP_DIVERGED_NANORINF = -9,
    KSP_DIVERGED_INDEFINITE_MAT = -10,
    KSP_CONVERGED_ITERATING = 0,
}

impl KSPConvergedReason {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_converged(self) -> bool {
        self.code() > 0
    }

    pub fn is_diverged(self) -> bool {
        self.code() < 0
    }
}

impl std::fmt::Display for KSPConvergedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = format!("{:?}", self);
        f.write_str(name.trim_start_matches("KSP_"))
    }
}

/// A per-iteration callback, given the iteration number and the residual norm.
pub(crate) type Monitor<'tl> = Box<dyn FnMut(PetscInt, PetscReal) -> crate::Result<()> + 'tl>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum KspState {
    #[default]
    Unconfigured,
    OperatorsBound,
    SetUp,
    Solved,
}

#[derive(Default)]
pub(crate) struct KspData<'tl> {
    pub(crate) hdr: PetscHeader,
    ksp_type: Option<KSPType>,
    rtol: PetscReal,
    atol: PetscReal,
    dtol: PetscReal,
    max_it: PetscInt,
    restart: PetscInt,
    richardson_scale: PetscScalar,
    guess_nonzero: bool,
    error_if_not_converged: bool,
    print_monitor: bool,
    monitors: Vec<Monitor<'tl>>,
    pub(crate) state: KspState,
    reason: Option<KSPConvergedReason>,
    its: PetscInt,
    rnorm: PetscReal,
}

impl std::fmt::Debug for KspData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KspData")
            .field("hdr", &self.hdr)
            .field("ksp_type", &self.ksp_type)
            .field("state", &self.state)
            .field("reason", &self.reason)
            .field("its", &self.its)
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

pub(crate) fn create<'tl>(_comm: &Communicator) -> crate::Result<KspData<'tl>> {
    Ok(KspData {
        hdr: PetscHeader::new(ClassId::KSP)?,
        rtol: 1e-5,
        atol: 1e-50,
        dtol: 1e5,
        max_it: 10000,
        restart: 30,
        richardson_scale: 1.0,
        ..Default::default()
    })
}

pub(crate) fn destroy(ksp: &mut KspData<'_>) -> crate::Result<()> {
    *ksp = KspData::default();
    Ok(())
}

pub(crate) fn set_type(_comm: &Communicator, ksp: &mut KspData<'_>, ksp_type: KSPType) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.ksp_type = Some(ksp_type);
    Ok(())
}

pub(crate) fn get_type(_comm: &Communicator, ksp: &KspData<'_>) -> crate::Result<Option<KSPType>> {
    check_valid(&ksp.hdr, "KSP")?;
    Ok(ksp.ksp_type)
}

pub(crate) fn set_tolerances(_comm: &Communicator, ksp: &mut KspData<'_>, rtol: Option<PetscReal>, atol: Option<PetscReal>,
    dtol: Option<PetscReal>, max_it: Option<PetscInt>) -> crate::Result<()>
{
    check_valid(&ksp.hdr, "KSP")?;
    if let Some(v) = rtol.filter(|v| !(0.0..1.0).contains(v)) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Relative tolerance {} must be non-negative and less than 1.0", v));
    }
    if let Some(v) = atol.filter(|v| *v < 0.0) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Absolute tolerance {} must be non-negative", v));
    }
    if let Some(v) = dtol.filter(|v| *v < 1.0) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Divergence tolerance {} must be larger than 1.0", v));
    }
    if let Some(v) = max_it.filter(|v| *v < 0) {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Maximum number of iterations {} must be non-negative", v));
    }
    ksp.rtol = rtol.unwrap_or(ksp.rtol);
    ksp.atol = atol.unwrap_or(ksp.atol);
    ksp.dtol = dtol.unwrap_or(ksp.dtol);
    ksp.max_it = max_it.unwrap_or(ksp.max_it);
    Ok(())
}

pub(crate) fn get_tolerances(_comm: &Communicator, ksp: &KspData<'_>) -> crate::Result<(PetscReal, PetscReal, PetscReal, PetscInt)> {
    check_valid(&ksp.hdr, "KSP")?;
    Ok((ksp.rtol, ksp.atol, ksp.dtol, ksp.max_it))
}

pub(crate) fn gmres_set_restart(_comm: &Communicator, ksp: &mut KspData<'_>, restart: PetscInt) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    if restart < 1 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Restart must be positive: {}", restart));
    }
    ksp.restart = restart;
    Ok(())
}

pub(crate) fn richardson_set_scale(_comm: &Communicator, ksp: &mut KspData<'_>, scale: PetscScalar) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.richardson_scale = scale;
    Ok(())
}

pub(crate) fn set_initial_guess_nonzero(_comm: &Communicator, ksp: &mut KspData<'_>, flg: bool) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.guess_nonzero = flg;
    Ok(())
}

pub(crate) fn set_error_if_not_converged(_comm: &Communicator, ksp: &mut KspData<'_>, flg: bool) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.error_if_not_converged = flg;
    Ok(())
}

pub(crate) fn monitor_set<'tl>(_comm: &Communicator, ksp: &mut KspData<'tl>, monitor: Monitor<'tl>) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.monitors.push(monitor);
    Ok(())
}

pub(crate) fn monitor_cancel(_comm: &Communicator, ksp: &mut KspData<'_>) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    ksp.monitors.clear();
    ksp.print_monitor = false;
    Ok(())
}

/// Reads the `-ksp_*` options and, through `pc`, the `-pc_*` options.
pub(crate) fn set_from_options(comm: &Communicator, ksp: &mut KspData<'_>, pc: &mut PcData) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    if let Some(name) = sys::with_options(|db| db.get_string("-ksp_type")) {
        ksp.ksp_type = Some(KSPType::from_name(&name)?);
    }
    let (rtol, atol, dtol, max_it) = sys::with_options(|db| -> crate::Result<_> {
        Ok((db.get_real("-ksp_rtol")?, db.get_real("-ksp_atol")?, db.get_real("-ksp_divtol")?, db.get_int("-ksp_max_it")?))
    })?;
    set_tolerances(comm, ksp, rtol, atol, dtol, max_it)?;
    if let Some(restart) = sys::with_options(|db| db.get_int("-ksp_gmres_restart"))? {
        gmres_set_restart(comm, ksp, restart)?;
    }
    if let Some(scale) = sys::with_options(|db| db.get_real("-ksp_richardson_scale"))? {
        ksp.richardson_scale = scale;
    }
    if let Some(flg) = sys::with_options(|db| db.get_bool("-ksp_initial_guess_nonzero"))? {
        ksp.guess_nonzero = flg;
    }
    if let Some(flg) = sys::with_options(|db| db.get_bool("-ksp_error_if_not_converged"))? {
        ksp.error_if_not_converged = flg;
    }
    if let Some(flg) = sys::with_options(|db| db.get_bool("-ksp_monitor"))? {
        ksp.print_monitor = flg;
    }
    pc::set_from_options(comm, pc)
}

/// Binds new operators: the preconditioner is rebuilt on the next solve.
pub(crate) fn set_operators(_comm: &Communicator, ksp: &mut KspData<'_>, pc: &mut PcData) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    pc::reset(pc);
    ksp.state = KspState::OperatorsBound;
    ksp.reason = None;
    ksp.its = 0;
    ksp.rnorm = 0.0;
    Ok(())
}

pub(crate) fn set_up(comm: &Communicator, ksp: &mut KspData<'_>, pc: &mut PcData, p: &MatData) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    if ksp.state == KspState::Unconfigured {
        return Err(petsc_err!(ARG_WRONGSTATE, "Must call set_operators() before setting up the KSP"));
    }
    ksp.ksp_type.get_or_insert(KSPType::KSPGMRES);
    if !pc.is_set_up() {
        pc::set_up(comm, pc, p)?;
    }
    if ksp.state == KspState::OperatorsBound {
        ksp.state = KspState::SetUp;
    }
    Ok(())
}

fn check_solved(ksp: &KspData<'_>) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    if ksp.state != KspState::Solved {
        return Err(petsc_err!(ARG_WRONGSTATE, "KSP has not been solved since the operators were set"));
    }
    Ok(())
}

pub(crate) fn get_iteration_number(_comm: &Communicator, ksp: &KspData<'_>) -> crate::Result<PetscInt> {
    check_solved(ksp)?;
    Ok(ksp.its)
}

pub(crate) fn get_converged_reason(_comm: &Communicator, ksp: &KspData<'_>) -> crate::Result<KSPConvergedReason> {
    check_solved(ksp)?;
    Ok(ksp.reason.unwrap_or(KSPConvergedReason::KSP_CONVERGED_ITERATING))
}

pub(crate) fn get_residual_norm(_comm: &Communicator, ksp: &KspData<'_>) -> crate::Result<PetscReal> {
    check_solved(ksp)?;
    Ok(ksp.rnorm)
}

/// Everything one solve needs, borrowed for its duration.
struct Solve<'s, 'tl> {
    comm: &'s Communicator,
    a: &'s MatData,
    pc: &'s PcData,
    rtol: PetscReal,
    atol: PetscReal,
    dtol: PetscReal,
    max_it: PetscInt,
    print_monitor: bool,
    monitors: &'s mut Vec<Monitor<'tl>>,
    rnorm0: PetscReal,
    its: PetscInt,
    rnorm: PetscReal,
}

type Reason = Option<KSPConvergedReason>;

impl Solve<'_, '_> {
    fn work(&self, like: &VecData) -> crate::Result<VecData> {
        vec::duplicate(self.comm, like)
    }

    fn mult(&self, x: &VecData, y: &mut VecData) -> crate::Result<()> {
        mat::mult(self.comm, self.a, x, y)
    }

    fn precondition(&self, r: &VecData, z: &mut VecData) -> crate::Result<()> {
        pc::apply(self.comm, self.pc, r, z)
    }

    fn norm(&self, x: &VecData) -> crate::Result<PetscReal> {
        vec::norm(self.comm, x, NormType::NORM_2)
    }

    /// r = b - A x
    fn residual(&self, b: &VecData, x: &VecData, r: &mut VecData) -> crate::Result<()> {
        self.mult(x, r)?;
        vec::aypx(self.comm, r, -1.0, b)
    }

    /// Records iteration `its` with residual norm `rnorm`, calls the monitors and applies the
    /// default convergence test.
    fn step(&mut self, its: PetscInt, rnorm: PetscReal) -> crate::Result<Reason> {
        if its == 0 {
            self.rnorm0 = rnorm;
        }
        self.its = its;
        self.rnorm = rnorm;
        log::trace!("[{}] KSP iteration {} residual norm {:e}", self.comm.rank(), its, rnorm);
        if self.print_monitor {
            crate::Petsc::print(self.comm, format!("{:4} KSP Residual norm {:.12e}\n", its, rnorm))?;
        }
        for monitor in self.monitors.iter_mut() {
            monitor(its, rnorm).map_err(|err| {
                log::debug!("[{}] KSP monitor failed at iteration {}", self.comm.rank(), its);
                err
            })?;
        }
        Ok(if !rnorm.is_finite() {
            Some(KSPConvergedReason::KSP_DIVERGED_NANORINF)
        } else if rnorm <= self.atol.max(self.rtol * self.rnorm0) {
            Some(if rnorm < self.atol { KSPConvergedReason::KSP_CONVERGED_ATOL } else { KSPConvergedReason::KSP_CONVERGED_RTOL })
        } else if self.rnorm0 > 0.0 && rnorm >= self.dtol * self.rnorm0 {
            Some(KSPConvergedReason::KSP_DIVERGED_DTOL)
        } else if its >= self.max_it {
            Some(KSPConvergedReason::KSP_DIVERGED_ITS)
        } else {
            None
        })
    }

    fn cg(&mut self, b: &VecData, x: &mut VecData) -> crate::Result<KSPConvergedReason> {
        let comm = self.comm;
        let mut r = self.work(b)?;
        let mut z = self.work(b)?;
        let mut q = self.work(b)?;
        self.residual(b, x, &mut r)?;
        if let Some(reason) = self.step(0, self.norm(&r)?)? {
            return Ok(reason);
        }
        self.precondition(&r, &mut z)?;
        let mut p = vec::duplicate(comm, &z)?;
        vec::copy(comm, &mut p, &z)?;
        let mut rz = vec::dot(comm, &r, &z)?;
        if rz < 0.0 {
            return Ok(KSPConvergedReason::KSP_DIVERGED_INDEFINITE_PC);
        }
        let mut its = 0;
        loop {
            its += 1;
            self.mult(&p, &mut q)?;
            let pq = vec::dot(comm, &p, &q)?;
            if pq <= 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_INDEFINITE_MAT);
            }
            let alpha = rz / pq;
            vec::axpy(comm, x, alpha, &p)?;
            vec::axpy(comm, &mut r, -alpha, &q)?;
            if let Some(reason) = self.step(its, self.norm(&r)?)? {
                return Ok(reason);
            }
            self.precondition(&r, &mut z)?;
            let rz_new = vec::dot(comm, &r, &z)?;
            if rz_new < 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_INDEFINITE_PC);
            }
            if rz_new == 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
            }
            let beta = rz_new / rz;
            rz = rz_new;
            vec::aypx(comm, &mut p, beta, &z)?;
        }
    }

    fn gmres(&mut self, b: &VecData, x: &mut VecData, restart: usize) -> crate::Result<KSPConvergedReason> {
        let comm = self.comm;
        let mut r = self.work(b)?;
        let mut z = self.work(b)?;
        let mut w = self.work(b)?;
        let mut basis: Vec<VecData> = Vec::with_capacity(restart + 1);
        let mut its = 0;
        let mut first = true;
        loop {
            self.residual(b, x, &mut r)?;
            let beta = self.norm(&r)?;
            if first {
                first = false;
                if let Some(reason) = self.step(0, beta)? {
                    return Ok(reason);
                }
            } else if beta == 0.0 {
                return Ok(self.step(its, beta)?.unwrap_or(KSPConvergedReason::KSP_CONVERGED_ATOL));
            }

            basis.clear();
            let mut v0 = self.work(b)?;
            vec::copy(comm, &mut v0, &r)?;
            vec::scale(comm, &mut v0, 1.0 / beta)?;
            basis.push(v0);

            // column j of the Hessenberg matrix holds j + 2 entries
            let mut h: Vec<Vec<PetscScalar>> = Vec::with_capacity(restart);
            let mut rot: Vec<(PetscScalar, PetscScalar)> = Vec::with_capacity(restart);
            let mut g = vec![0.0; restart + 1];
            g[0] = beta;
            let mut reason = None;
            let mut k = 0;
            for j in 0..restart {
                its += 1;
                self.precondition(&basis[j], &mut z)?;
                self.mult(&z, &mut w)?;
                let mut col = vec![0.0; j + 2];
                for (i, v) in basis.iter().enumerate() {
                    col[i] = vec::dot(comm, &w, v)?;
                    vec::axpy(comm, &mut w, -col[i], v)?;
                }
                col[j + 1] = self.norm(&w)?;
                let hnext = col[j + 1];

                for (i, &(c, s)) in rot.iter().enumerate() {
                    let (a, bb) = (col[i], col[i + 1]);
                    col[i] = c * a + s * bb;
                    col[i + 1] = -s * a + c * bb;
                }
                let (a, bb) = (col[j], col[j + 1]);
                let d = a.hypot(bb);
                let (c, s) = if d == 0.0 { (1.0, 0.0) } else { (a / d, bb / d) };
                col[j] = d;
                col[j + 1] = 0.0;
                g[j + 1] = -s * g[j];
                g[j] *= c;
                rot.push((c, s));
                h.push(col);
                k = j + 1;

                reason = self.step(its, g[j + 1].abs())?;
                if reason.is_some() || hnext == 0.0 {
                    break;
                }
                let mut v = self.work(b)?;
                vec::copy(comm, &mut v, &w)?;
                vec::scale(comm, &mut v, 1.0 / hnext)?;
                basis.push(v);
            }

            // back substitution on the triangular part
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut sum = g[i];
                for (l, yl) in y.iter().enumerate().skip(i + 1) {
                    sum -= h[l][i] * yl;
                }
                if h[i][i] == 0.0 {
                    return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
                }
                y[i] = sum / h[i][i];
            }
            vec::set(comm, &mut w, 0.0)?;
            for (v, &yi) in basis.iter().zip(&y) {
                vec::axpy(comm, &mut w, yi, v)?;
            }
            self.precondition(&w, &mut z)?;
            vec::axpy(comm, x, 1.0, &z)?;

            if let Some(reason) = reason {
                return Ok(reason);
            }
        }
    }

    fn bcgs(&mut self, b: &VecData, x: &mut VecData) -> crate::Result<KSPConvergedReason> {
        let comm = self.comm;
        let mut r = self.work(b)?;
        self.residual(b, x, &mut r)?;
        if let Some(reason) = self.step(0, self.norm(&r)?)? {
            return Ok(reason);
        }
        let mut rhat = self.work(b)?;
        vec::copy(comm, &mut rhat, &r)?;
        let mut p = self.work(b)?;
        let mut v = self.work(b)?;
        let mut phat = self.work(b)?;
        let mut s = self.work(b)?;
        let mut shat = self.work(b)?;
        let mut t = self.work(b)?;
        let (mut rho_old, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        let mut its = 0;
        loop {
            its += 1;
            let rho = vec::dot(comm, &rhat, &r)?;
            if rho == 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
            }
            let beta = (rho / rho_old) * (alpha / omega);
            vec::axpy(comm, &mut p, -omega, &v)?;
            vec::aypx(comm, &mut p, beta, &r)?;
            self.precondition(&p, &mut phat)?;
            self.mult(&phat, &mut v)?;
            let rv = vec::dot(comm, &rhat, &v)?;
            if rv == 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
            }
            alpha = rho / rv;
            vec::waxpy(comm, &mut s, -alpha, &v, &r)?;
            let snorm = self.norm(&s)?;
            if snorm <= self.atol.max(self.rtol * self.rnorm0) {
                vec::axpy(comm, x, alpha, &phat)?;
                if let Some(reason) = self.step(its, snorm)? {
                    return Ok(reason);
                }
            }
            self.precondition(&s, &mut shat)?;
            self.mult(&shat, &mut t)?;
            let tt = vec::dot(comm, &t, &t)?;
            if tt == 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
            }
            omega = vec::dot(comm, &t, &s)? / tt;
            vec::axpbypcz(comm, x, alpha, omega, 1.0, &phat, &shat)?;
            vec::waxpy(comm, &mut r, -omega, &t, &s)?;
            rho_old = rho;
            if let Some(reason) = self.step(its, self.norm(&r)?)? {
                return Ok(reason);
            }
            if omega == 0.0 {
                return Ok(KSPConvergedReason::KSP_DIVERGED_BREAKDOWN);
            }
        }
    }

    fn richardson(&mut self, b: &VecData, x: &mut VecData, scale: PetscScalar) -> crate::Result<KSPConvergedReason> {
        let comm = self.comm;
        let mut r = self.work(b)?;
        let mut z = self.work(b)?;
        self.residual(b, x, &mut r)?;
        if let Some(reason) = self.step(0, self.norm(&r)?)? {
            return Ok(reason);
        }
        let mut its = 0;
        loop {
            its += 1;
            self.precondition(&r, &mut z)?;
            vec::axpy(comm, x, scale, &z)?;
            self.residual(b, x, &mut r)?;
            if let Some(reason) = self.step(its, self.norm(&r)?)? {
                return Ok(reason);
            }
        }
    }
}

/// Solves `A x = b` preconditioned by `pc`, which is built from `p` if it is not set up.
/// Collective.
pub(crate) fn solve(comm: &Communicator, ksp: &mut KspData<'_>, pc: &mut PcData, a: &MatData, p: &MatData,
    b: &VecData, x: &mut VecData) -> crate::Result<()>
{
    set_up(comm, ksp, pc, p)?;
    let (amap, _) = a.layouts()?;
    if !b.layout()?.compatible(amap) || !x.layout()?.compatible(b.layout()?) {
        return Err(petsc_err!(ARG_INCOMP, "Right hand side and solution vectors must match the rows of the operator"));
    }
    if !ksp.guess_nonzero {
        vec::set(comm, x, 0.0)?;
    }
    let ksp_type = ksp.ksp_type.unwrap_or(KSPType::KSPGMRES);
    let (restart, scale) = (ksp.restart as usize, ksp.richardson_scale);
    let mut monitors = std::mem::take(&mut ksp.monitors);
    let mut solve = Solve {
        comm,
        a,
        pc,
        rtol: ksp.rtol,
        atol: ksp.atol,
        dtol: ksp.dtol,
        max_it: ksp.max_it,
        print_monitor: ksp.print_monitor,
        monitors: &mut monitors,
        rnorm0: 0.0,
        its: 0,
        rnorm: 0.0,
    };
    let res = match ksp_type {
        KSPType::KSPCG => solve.cg(b, x),
        KSPType::KSPGMRES => solve.gmres(b, x, restart),
        KSPType::KSPBCGS => solve.bcgs(b, x),
        KSPType::KSPRICHARDSON => solve.richardson(b, x, scale),
        KSPType::KSPPREONLY => solve.precondition(b, x).map(|_| {
            solve.its = 1;
            KSPConvergedReason::KSP_CONVERGED_ITS
        }),
    };
    let (its, rnorm) = (solve.its, solve.rnorm);
    ksp.monitors = monitors;
    let reason = res?;

    ksp.its = its;
    ksp.rnorm = rnorm;
    ksp.reason = Some(reason);
    ksp.state = KspState::Solved;
    log::info!("[{}] KSP {} solve {} in {} iteration(s), residual norm {:e}",
        comm.rank(), ksp_type, reason, its, rnorm);
    if reason.is_diverged() && ksp.error_if_not_converged {
        return Err(petsc_err!(NOT_CONVERGED, "KSPSolve has not converged, reason {}", reason));
    }
    Ok(())
}

pub(crate) fn view(comm: &Communicator, ksp: &KspData<'_>, viewer: &ViewerData) -> crate::Result<()> {
    check_valid(&ksp.hdr, "KSP")?;
    let header = format!("KSP Object: {} {} MPI process{}\n", ksp.hdr.name(), comm.size(), if comm.size() == 1 { "" } else { "es" });
    let mut body = String::new();
    if comm.rank() == 0 {
        match ksp.ksp_type {
            Some(t) => body += &format!("  type: {}\n", t),
            None => body += "  type: not yet set\n",
        }
        if ksp.ksp_type == Some(KSPType::KSPGMRES) {
            body += &format!("    restart={}, using Modified Gram-Schmidt Orthogonalization\n", ksp.restart);
        }
        if ksp.ksp_type == Some(KSPType::KSPRICHARDSON) {
            body += &format!("    damping factor={}\n", ksp.richardson_scale);
        }
        body += &format!("  maximum iterations={}, initial guess is {}\n", ksp.max_it,
            if ksp.guess_nonzero { "nonzero" } else { "zero" });
        body += &format!("  tolerances:  relative={:e}, absolute={:e}, divergence={:e}\n", ksp.rtol, ksp.atol, ksp.dtol);
        let side = match ksp.ksp_type {
            Some(KSPType::KSPGMRES) | Some(KSPType::KSPBCGS) => "right",
            _ => "left",
        };
        body += &format!("  {} preconditioning\n  using UNPRECONDITIONED norm type for convergence test\n", side);
    }
    viewer::ascii_write_object(comm, viewer, &header, &body)
}
