//! The scalable linear equations solvers (KSP) component provides an easy-to-use interface to the
//! combination of a Krylov subspace iterative method and a preconditioner (in the [KSP](crate::ksp) and [PC](crate::pc)
//! components, respectively).
//!
//! KSP users can set various Krylov subspace options at runtime via the options database
//! (e.g., -ksp_type cg ). KSP users can also set KSP options directly in application by directly calling
//! the KSP routines listed below (e.g., [`KSP::set_type()`] ).
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/KSP/index.html>

use crate::{
    raw,
    Result,
    PetscAsRaw,
    PetscReal,
    PetscInt,
    PetscScalar,
    comm::Communicator,
    vector::Vector,
    mat::Mat,
    pc::PC,
    viewer::{PetscViewable, Viewer},
};

pub use crate::raw::ksp::{KSPType, KSPConvergedReason};

/// Abstract PETSc object that manages all Krylov methods. This is the object that manages the linear
/// solves in PETSc.
///
/// `'tl` is the lifetime of the monitor closures and `'bl` the lifetime of the borrowed operators.
pub struct KSP<'a, 'tl, 'bl> {
    pub(crate) world: &'a Communicator,
    pub(crate) ksp_p: raw::ksp::KspData<'tl>,

    pc: Option<PC<'a>>,
    a_mat: Option<&'bl Mat<'a>>,
    p_mat: Option<&'bl Mat<'a>>,
}

impl<'a, 'tl, 'bl> KSP<'a, 'tl, 'bl> {
    /// Same as [`Petsc::ksp_create()`](crate::Petsc::ksp_create()).
    ///
    /// The default method is GMRES with a block Jacobi (ILU(0) blocks) preconditioner, with
    /// tolerances `rtol = 1e-5`, `atol = 1e-50`, `dtol = 1e5` and at most 10000 iterations.
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let ksp_p = chkerrq!(world, raw::ksp::create(world))?;
        Ok(KSP { world, ksp_p, pc: None, a_mat: None, p_mat: None })
    }

    /// Creates a named KSP configured from the options database.
    pub fn from_options(world: &'a Communicator, name: impl ToString) -> Result<Self> {
        let mut ksp = KSP::create(world)?;
        crate::PetscObject::set_name(&mut ksp, name)?;
        ksp.set_from_options()?;
        Ok(ksp)
    }

    /// Sets the [preconditioner](crate::pc)([`PC`]) to be used to calculate the application of
    /// the preconditioner on a vector.
    ///
    /// if you change the PC by calling set again, then the original will be dropped.
    pub fn set_pc(&mut self, pc: PC<'a>) -> Result<()> {
        self.pc = Some(pc);
        Ok(())
    }

    /// Returns a [`Option`] of a reference to the [`PC`] context set.
    ///
    /// If you want a [`PC`] to be created you must call [`KSP::get_pc_or_create()`].
    pub fn get_pc(&self) -> Option<&PC<'a>> {
        self.pc.as_ref()
    }

    /// Returns a mutable reference to the [`PC`] of this KSP, creating a default one if there is none.
    pub fn get_pc_or_create(&mut self) -> Result<&mut PC<'a>> {
        let pc = match self.pc.take() {
            Some(pc) => pc,
            None => PC::create(self.world)?,
        };
        Ok(self.pc.insert(pc))
    }

    /// Sets the matrix associated with the linear system and a (possibly)
    /// different one associated with the preconditioner. `None` for `p_mat` uses `a_mat`.
    ///
    /// The preconditioner is rebuilt on the next solve. It is reused by every solve
    /// until this is called again.
    pub fn set_operators(&mut self, a_mat: &'bl Mat<'a>, p_mat: impl Into<Option<&'bl Mat<'a>>>) -> Result<()> {
        let world = self.world;
        let pc = match self.pc.take() {
            Some(pc) => pc,
            None => PC::create(world)?,
        };
        let pc = self.pc.insert(pc);
        chkerrq!(world, raw::ksp::set_operators(world, &mut self.ksp_p, &mut pc.pc_p))?;
        self.a_mat = Some(a_mat);
        self.p_mat = Some(p_mat.into().unwrap_or(a_mat));
        Ok(())
    }

    /// Returns the matrices set with [`KSP::set_operators()`], `(a_mat, p_mat)`.
    pub fn get_operators(&self) -> Result<(&'bl Mat<'a>, &'bl Mat<'a>)> {
        match (self.a_mat, self.p_mat) {
            (Some(a), Some(p)) => Ok((a, p)),
            _ => chkerrq!(self.world, Err(petsc_err!(ARG_WRONGSTATE, "Must call KSP::set_operators() first"))),
        }
    }

    /// Sets the relative, absolute, divergence, and maximum iteration tolerances
    /// used by the default KSP convergence testers.
    ///
    /// Set the inputs to be `None` If you wish to use the default value of any of the tolerances.
    ///
    /// Parameters.
    ///
    /// * `rtol` - The relative convergence tolerance, relative decrease in the (possibly preconditioned) residual norm
    /// * `atol` - The absolute convergence tolerance absolute size of the (possibly preconditioned) residual norm
    /// * `dtol` - the divergence tolerance, amount (possibly preconditioned) residual norm can increase before KSPConvergedDefault() concludes that the method is diverging
    /// * `max_iters` - Maximum number of iterations to use
    pub fn set_tolerances(&mut self, rtol: impl Into<Option<PetscReal>>, atol: impl Into<Option<PetscReal>>,
        dtol: impl Into<Option<PetscReal>>, max_iters: impl Into<Option<PetscInt>>) -> Result<()>
    {
        chkerrq!(self.world, raw::ksp::set_tolerances(self.world, &mut self.ksp_p, rtol.into(), atol.into(),
            dtol.into(), max_iters.into()))
    }

    /// Sets KSP options from the options database, and PC options through the [`PC`] of this KSP.
    ///
    /// Reads `-ksp_type`, `-ksp_rtol`, `-ksp_atol`, `-ksp_divtol`, `-ksp_max_it`, `-ksp_gmres_restart`,
    /// `-ksp_richardson_scale`, `-ksp_monitor`, `-ksp_error_if_not_converged`,
    /// `-ksp_initial_guess_nonzero` and `-pc_type`.
    pub fn set_from_options(&mut self) -> Result<()> {
        let world = self.world;
        let pc = match self.pc.take() {
            Some(pc) => pc,
            None => PC::create(world)?,
        };
        let pc = self.pc.insert(pc);
        chkerrq!(world, raw::ksp::set_from_options(world, &mut self.ksp_p, &mut pc.pc_p))
    }

    /// Sets up the internal data structures for the later use of an iterative solver.
    /// The preconditioner is built here if it was not already. Collective.
    pub fn set_up(&mut self) -> Result<()> {
        let world = self.world;
        let (_, p_mat) = self.get_operators()?;
        let pc = match self.pc.take() {
            Some(pc) => pc,
            None => PC::create(world)?,
        };
        let pc = self.pc.insert(pc);
        chkerrq!(world, raw::ksp::set_up(world, &mut self.ksp_p, &mut pc.pc_p, p_mat.as_raw()))
    }

    /// Solves linear system.
    ///
    /// `x` is zeroed first unless [`KSP::set_initial_guess_nonzero()`] was set. A solve that
    /// did not converge is not an error, see [`KSP::get_converged_reason()`], unless
    /// [`KSP::set_error_if_not_converged()`] was set. Collective.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let n = 10;
    /// let mut a = Mat::from_sizes(petsc.world(), None, None, n, n)?;
    /// let range = a.get_ownership_range()?;
    /// a.assemble_with(range.clone().flat_map(|i| [(i, i-1, -1.0), (i, i, 2.0), (i, i+1, -1.0)])
    ///         .filter(|&(_, j, _)| (0..n).contains(&j)),
    ///     InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    ///
    /// let (mut x, mut b) = a.create_vecs()?;
    /// let mut u = x.duplicate()?;
    /// u.set_all(1.0)?;
    /// a.mult(&u, &mut b)?;
    ///
    /// let mut ksp = petsc.ksp_create()?;
    /// ksp.set_type(KSPType::KSPCG)?;
    /// ksp.set_tolerances(1.0e-10, None, None, None)?;
    /// ksp.set_operators(&a, &a)?;
    /// ksp.solve(&b, &mut x)?;
    ///
    /// assert!(ksp.get_converged_reason()?.is_converged());
    /// x.axpy(-1.0, &u)?;
    /// assert!(x.norm(NormType::NORM_2)? < 1.0e-8);
    /// # Ok(())
    /// # }
    /// ```
    pub fn solve(&mut self, b: &Vector, x: &mut Vector) -> Result<()> {
        let world = self.world;
        let (a_mat, p_mat) = self.get_operators()?;
        let pc = match self.pc.take() {
            Some(pc) => pc,
            None => PC::create(world)?,
        };
        let pc = self.pc.insert(pc);
        chkerrq!(world, raw::ksp::solve(world, &mut self.ksp_p, &mut pc.pc_p, a_mat.as_raw(), p_mat.as_raw(),
            b.as_raw(), &mut x.vec_p))
    }

    /// Sets an additional function to be called at every iteration to monitor the residual/error etc.
    ///
    /// The closure is given the iteration number and the residual norm. An error returned by the
    /// closure stops the solve.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # use std::cell::RefCell;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// # let n = 5;
    /// # let mut a = Mat::from_sizes(petsc.world(), None, None, n, n)?;
    /// # a.assemble_with((0..n).map(|i| (i, i, 2.0)), InsertMode::INSERT_VALUES,
    /// #     MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    /// # let (mut x, mut b) = a.create_vecs()?;
    /// # b.set_all(1.0)?;
    /// let norms = RefCell::new(vec![]);
    /// let mut ksp = petsc.ksp_create()?;
    /// ksp.monitor_set(|_it, rnorm| {
    ///     norms.borrow_mut().push(rnorm);
    ///     Ok(())
    /// })?;
    /// ksp.set_operators(&a, None)?;
    /// ksp.solve(&b, &mut x)?;
    /// drop(ksp);
    /// assert!(!norms.borrow().is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub fn monitor_set<F>(&mut self, user_f: F) -> Result<()>
    where
        F: FnMut(PetscInt, PetscReal) -> Result<()> + 'tl,
    {
        chkerrq!(self.world, raw::ksp::monitor_set(self.world, &mut self.ksp_p, Box::new(user_f)))
    }
}

impl<'a, 'tl, 'bl> KSP<'a, 'tl, 'bl> {
    wrap_simple_petsc_member_funcs! {
        raw::ksp::set_type, pub set_type, input KSPType, ksp_type, takes mut, #[doc = "Builds KSP for a particular solver."];
        raw::ksp::get_type, pub get_type, output Option<KSPType>, #[doc = "Gets the KSP type, `None` if it was never set."];
        raw::ksp::get_tolerances, pub get_tolerances, output (PetscReal, PetscReal, PetscReal, PetscInt), #[doc = "Gets the relative, absolute, divergence, and maximum iteration tolerances used by the default KSP convergence tests."];
        raw::ksp::gmres_set_restart, pub gmres_set_restart, input PetscInt, restart, takes mut, #[doc = "Sets number of iterations at which GMRES restarts (30 by default)."];
        raw::ksp::richardson_set_scale, pub richardson_set_scale, input PetscScalar, scale, takes mut, #[doc = "Set the damping factor of the Richardson iteration (1.0 by default)."];
        raw::ksp::set_initial_guess_nonzero, pub set_initial_guess_nonzero, input bool, flg, takes mut, #[doc = "Tells the iterative solver that the initial guess is nonzero; otherwise KSP assumes the initial guess is to be zero."];
        raw::ksp::set_error_if_not_converged, pub set_error_if_not_converged, input bool, flg, takes mut, #[doc = "Causes [`KSP::solve()`] to generate an error if the solver has not converged."];
        raw::ksp::monitor_cancel, pub monitor_cancel, takes mut, #[doc = "Clears all monitors for a KSP object."];
        raw::ksp::get_iteration_number, pub get_iteration_number, output PetscInt, #[doc = "Gets the current iteration number; if the [`KSP::solve()`] is complete, returns the number of iterations used."];
        raw::ksp::get_converged_reason, pub get_converged_reason, output KSPConvergedReason, #[doc = "Gets the reason the KSP iteration was stopped."];
        raw::ksp::get_residual_norm, pub get_residual_norm, output PetscReal, #[doc = "Gets the last (possibly approximate and/or preconditioned) residual norm that has been computed."];
    }
}

impl_petsc_object_traits! {
    KSP, ksp_p, raw::ksp::KspData<'tl>, raw::ksp::destroy, 'tl, 'bl;
}

impl PetscViewable for KSP<'_, '_, '_> {
    /// Views the KSP and then its [`PC`], if there is one.
    fn view_with<'vl, 'val: 'vl>(&self, viewer: impl Into<Option<&'vl Viewer<'val>>>) -> Result<()> {
        let owned_viewer;
        let viewer = match viewer.into() {
            Some(viewer) => viewer,
            None => {
                owned_viewer = Viewer::create_ascii_stdout(self.world)?;
                &owned_viewer
            }
        };
        chkerrq!(self.world, raw::ksp::view(self.world, &self.ksp_p, viewer.as_raw()))?;
        match self.pc.as_ref() {
            Some(pc) => pc.view_with(viewer),
            None => Ok(()),
        }
    }
}
