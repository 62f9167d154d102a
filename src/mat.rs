//! PETSc matrices (Mat objects) are used to store Jacobians and other sparse matrices
//! in PDE-based (or other) simulations.
//!
//! The rows of a matrix are split between the processes like the entries of a vector. Values are
//! staged with [`Mat::set_values()`] and become usable after an assembly.
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/Mat/index.html>

use crate::{
    raw,
    Result,
    PetscAsRaw,
    PetscInt,
    PetscScalar,
    InsertMode,
    comm::Communicator,
    vector::Vector,
    viewer::Viewer,
};

pub use crate::raw::mat::{MatAssemblyType, MatOption, MatType};

/// Abstract PETSc matrix object used to manage all linear operators in PETSc, even those
/// without an explicit sparse representation (such as matrix-free operators).
pub struct Mat<'a> {
    pub(crate) world: &'a Communicator,
    pub(crate) mat_p: raw::mat::MatData,
}

impl<'a> Mat<'a> {
    /// Same as [`Petsc::mat_create()`](crate::Petsc::mat_create).
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let mat_p = chkerrq!(world, raw::mat::create(world))?;
        Ok(Mat { world, mat_p })
    }

    pub(crate) fn from_raw(world: &'a Communicator, mat_p: raw::mat::MatData) -> Self {
        Mat { world, mat_p }
    }

    /// Creates a matrix with the given sizes, set up from the options database. Collective.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mat = Mat::from_sizes(petsc.world(), None, None, Some(4), Some(6))?;
    /// assert_eq!(mat.get_size()?, (4, 6));
    /// assert_eq!(mat.get_ownership_range_column()?, 0..6);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_sizes(world: &'a Communicator, local_rows: impl Into<Option<PetscInt>>,
        local_cols: impl Into<Option<PetscInt>>, global_rows: impl Into<Option<PetscInt>>,
        global_cols: impl Into<Option<PetscInt>>) -> Result<Self>
    {
        let mut mat = Mat::create(world)?;
        mat.set_sizes(local_rows.into(), local_cols.into(), global_rows.into(), global_cols.into())?;
        mat.set_from_options()?;
        mat.set_up()?;
        Ok(mat)
    }

    /// Sets the local and global sizes, and checks to determine compatibility
    ///
    /// For rows and columns, local and global cannot be both None. If one processor calls this with a global of None then all processors must, otherwise the program will hang.
    /// If None is not used for the local sizes, then the user must ensure that they are chosen to be compatible with the vectors.
    pub fn set_sizes(&mut self, local_rows: Option<PetscInt>, local_cols: Option<PetscInt>,
        global_rows: Option<PetscInt>, global_cols: Option<PetscInt>) -> Result<()>
    {
        chkerrq!(self.world, raw::mat::set_sizes(self.world, &mut self.mat_p, local_rows, local_cols, global_rows, global_cols))
    }

    /// Inserts or adds a block of values into a matrix.
    ///
    /// `v` holds the `idxm.len()` by `idxn.len()` block in row major order. Rows owned by other
    /// processes are sent to them during assembly. Negative indices are ignored.
    /// [`Mat::assembly_begin()`] and [`Mat::assembly_end()`] MUST be called after all calls
    /// to [`Mat::set_values()`] have been completed.
    pub fn set_values(&mut self, idxm: &[PetscInt], idxn: &[PetscInt], v: &[PetscScalar], addv: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::mat::set_values(self.world, &mut self.mat_p, idxm, idxn, v, addv))
    }

    /// Assembles the matrix by calling [`Mat::assembly_begin()`] then [`Mat::assembly_end()`]
    pub fn assemble(&mut self, assembly_type: MatAssemblyType) -> Result<()> {
        self.assembly_begin(assembly_type)?;
        self.assembly_end(assembly_type)
    }

    /// Sets the entries given by `(row, column, value)` triples and assembles the matrix.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let n = 5;
    /// let mut mat = Mat::from_sizes(petsc.world(), None, None, n, n)?;
    /// mat.assemble_with((0..n).map(|i| (-1..=1).map(move |j| (i, i+j)))
    ///         .flatten()
    ///         .filter(|&(i, j)| i < n && j < n)
    ///         .map(|(i, j)| if i == j { (i, j, 2.0) } else { (i, j, -1.0) }),
    ///     InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    ///
    /// assert_eq!(mat.get_values(0..n, 0..n)?, vec![
    ///      2.0, -1.0,  0.0,  0.0,  0.0,
    ///     -1.0,  2.0, -1.0,  0.0,  0.0,
    ///      0.0, -1.0,  2.0, -1.0,  0.0,
    ///      0.0,  0.0, -1.0,  2.0, -1.0,
    ///      0.0,  0.0,  0.0, -1.0,  2.0,
    /// ]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn assemble_with<I>(&mut self, iter_builder: I, addv: InsertMode, assembly_type: MatAssemblyType) -> Result<()>
    where
        I: IntoIterator<Item = (PetscInt, PetscInt, PetscScalar)>,
    {
        for (idxm, idxn, v) in iter_builder {
            self.set_values(&[idxm], &[idxn], &[v], addv)?;
        }
        self.assemble(assembly_type)
    }

    /// Computes the matrix-vector product, `y = Ax`. Collective.
    pub fn mult(&self, x: &Vector, y: &mut Vector) -> Result<()> {
        chkerrq!(self.world, raw::mat::mult(self.world, &self.mat_p, x.as_raw(), &mut y.vec_p))
    }

    /// Gets a block of values from locally owned rows, in row major order.
    /// Entries outside the nonzero pattern read as zero.
    pub fn get_values<T1, T2>(&self, idxm: T1, idxn: T2) -> Result<Vec<PetscScalar>>
    where
        T1: IntoIterator<Item = PetscInt>,
        T2: IntoIterator<Item = PetscInt>,
    {
        let idxm = idxm.into_iter().collect::<Vec<_>>();
        let idxn = idxn.into_iter().collect::<Vec<_>>();
        chkerrq!(self.world, raw::mat::get_values(self.world, &self.mat_p, &idxm, &idxn))
    }

    /// Gets the diagonal of the matrix, into a vector laid out like the rows.
    pub fn get_diagonal(&self, d: &mut Vector) -> Result<()> {
        chkerrq!(self.world, raw::mat::get_diagonal(self.world, &self.mat_p, &mut d.vec_p))
    }

    /// Gets vectors compatible with the matrix, `(x, y)` such that `y = A x` can be computed.
    pub fn create_vecs(&self) -> Result<(Vector<'a>, Vector<'a>)> {
        let (right, left) = chkerrq!(self.world, raw::mat::create_vecs(self.world, &self.mat_p))?;
        Ok((Vector::from_raw(self.world, right), Vector::from_raw(self.world, left)))
    }

    /// Loads a matrix written with a binary [`Viewer`]. The matrix must have no sizes or
    /// sizes that match the file. Collective.
    pub fn load(&mut self, viewer: &Viewer) -> Result<()> {
        chkerrq!(self.world, raw::viewer::mat_load(self.world, &mut self.mat_p, viewer.as_raw()))
    }
}

impl<'a> Mat<'a> {
    wrap_simple_petsc_member_funcs! {
        raw::mat::set_type, pub set_type, input MatType, mat_type, takes mut, #[doc = "Sets the storage type of the matrix."];
        raw::mat::set_from_options, pub set_from_options, takes mut, #[doc = "Configures the Mat from the options database (`-mat_type`, `-mat_ignore_off_proc_entries`)."];
        raw::mat::set_up, pub set_up, takes mut, #[doc = "Sets up the internal matrix data structures for later use. Collective."];
        raw::mat::set_option, pub set_option, input MatOption, option, input bool, flg, takes mut, #[doc = "Sets a parameter option for a matrix."];
        raw::mat::get_option, pub get_option, input MatOption, option, output bool, #[doc = "Gets the value of an option set with [`Mat::set_option()`]."];
        raw::mat::assembly_begin, pub assembly_begin, input MatAssemblyType, assembly_type, takes mut, #[doc = "Begins assembling the matrix. This routine should be called after completing all calls to [`Mat::set_values()`]."];
        raw::mat::assembly_end, pub assembly_end, input MatAssemblyType, assembly_type, takes mut, #[doc = "Completes assembling the matrix. This routine should be called after [`Mat::assembly_begin()`]. Collective."];
        raw::mat::zero_entries, pub zero_entries, takes mut, #[doc = "Zeros all entries of a matrix, keeping the nonzero pattern."];
        raw::mat::get_size, pub get_size, output (PetscInt, PetscInt), #[doc = "Returns the numbers of rows and columns in a matrix."];
        raw::mat::get_local_size, pub get_local_size, output (PetscInt, PetscInt), #[doc = "Returns the number of local rows and local columns of a matrix."];
        raw::mat::get_ownership_range, pub get_ownership_range, output std::ops::Range<PetscInt>, #[doc = "Returns the range of matrix rows owned by this processor, assuming that the matrix is laid\n\
            out with the first n1 rows on the first processor, the next n2 rows on the second, etc."];
        raw::mat::get_ownership_ranges, pub get_ownership_ranges, output Vec<std::ops::Range<PetscInt>>, #[doc = "Returns the range of matrix rows owned by EACH processor."];
        raw::mat::get_ownership_range_column, pub get_ownership_range_column, output std::ops::Range<PetscInt>, #[doc = "Returns the range of matrix columns associated with rows of a vector\n\
            owned by this processor, the part of `x` in `y = A x` this process holds."];
        raw::mat::get_ownership_ranges_column, pub get_ownership_ranges_column, output Vec<std::ops::Range<PetscInt>>, #[doc = "Returns the range of matrix columns associated with rows of a vector owned by EACH processor."];
    }
}

impl_petsc_object_traits! {
    Mat, mat_p, raw::mat::MatData, raw::mat::destroy;
}

impl_petsc_view_func! {
    Mat, mat_p, raw::viewer::mat_view;
}
