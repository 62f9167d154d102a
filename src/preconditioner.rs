//! The preconditioner used by the [KSP](crate::ksp).
//!
//! KSP users can set various preconditioning options at runtime via the options database
//! (e.g., -pc_type jacobi ). KSP users can also set PC options directly in application codes by
//! first extracting the PC context from the KSP context via [`KSP::get_pc_or_create()`](crate::ksp::KSP::get_pc_or_create()) and then directly
//! calling the PC routines listed below (e.g., [`PC::set_type()`]). PC components can be used directly
//! to create and destroy solvers; this is not needed for users but is for library developers.
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/PC/index.html>

use crate::{
    raw,
    Result,
    PetscAsRaw,
    PetscInt,
    PetscReal,
    comm::Communicator,
    vector::Vector,
    mat::Mat,
};

/// [`PC`] Type
pub use crate::raw::pc::PCType;

/// Abstract PETSc object that manages all preconditioners
pub struct PC<'a> {
    pub(crate) world: &'a Communicator,
    pub(crate) pc_p: raw::pc::PcData,
}

impl<'a> PC<'a> {
    /// Creates a preconditioner context.
    ///
    /// You will most likely create a preconditioner context from a solver type such as
    /// from a Krylov solver, [`KSP`](crate::ksp::KSP), using the
    /// [`KSP::get_pc_or_create()`](crate::ksp::KSP::get_pc_or_create()) method.
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let pc_p = chkerrq!(world, raw::pc::create(world))?;
        Ok(PC { world, pc_p })
    }

    /// Builds the preconditioner from the matrix `p`. Without a type this uses
    /// [`PCType::PCBJACOBI`]. Collective.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut mat = Mat::from_sizes(petsc.world(), None, None, 3, 3)?;
    /// mat.assemble_with((0..3).map(|i| (i, i, (i+1) as PetscScalar)),
    ///     InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    ///
    /// let mut pc = PC::create(petsc.world())?;
    /// pc.set_type(PCType::PCJACOBI)?;
    /// pc.set_up(&mat)?;
    ///
    /// let (mut r, mut z) = mat.create_vecs()?;
    /// r.set_all(6.0)?;
    /// pc.apply(&r, &mut z)?;
    /// assert_eq!(z.get_values(0..3)?, vec![6.0, 3.0, 2.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_up(&mut self, p: &Mat<'_>) -> Result<()> {
        chkerrq!(self.world, raw::pc::set_up(self.world, &mut self.pc_p, p.as_raw()))
    }

    /// Applies the preconditioner to a vector, `z = B r`.
    pub fn apply(&self, r: &Vector, z: &mut Vector) -> Result<()> {
        chkerrq!(self.world, raw::pc::apply(self.world, &self.pc_p, r.as_raw(), &mut z.vec_p))
    }

    /// Drops what was computed by [`PC::set_up()`], keeping the type and parameters.
    pub fn reset(&mut self) -> Result<()> {
        raw::pc::reset(&mut self.pc_p);
        Ok(())
    }
}

impl<'a> PC<'a> {
    wrap_simple_petsc_member_funcs! {
        raw::pc::set_type, pub set_type, input PCType, pc_type, takes mut, #[doc = "Builds PC for a particular preconditioner type"];
        raw::pc::get_type, pub get_type, output Option<PCType>, #[doc = "Gets the PC method type, `None` if it was never set."];
        raw::pc::set_from_options, pub set_from_options, takes mut, #[doc = "Sets PC options from the options database (`-pc_type`, `-pc_sor_omega`, `-pc_sor_its`)."];
        raw::pc::sor_set_omega, pub sor_set_omega, input PetscReal, omega, takes mut, #[doc = "Sets the SOR relaxation coefficient, omega (where omega = 1.0 by default). Must be in `(0, 2)`."];
        raw::pc::sor_set_iterations, pub sor_set_iterations, input PetscInt, its, takes mut, #[doc = "Sets the number of symmetric sweeps done per application."];
    }
}

impl_petsc_object_traits! {
    PC, pc_p, raw::pc::PcData, raw::pc::destroy;
}

impl_petsc_view_func! {
    PC, pc_p, raw::pc::view;
}
