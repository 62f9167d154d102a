//! Structured grids (DMDA) in one, two and three dimensions, spread over a grid of processes.
//!
//! A grid hands out global vectors (no ghost points, distributed) and local vectors (with ghost points,
//! one per process) and moves values between them, see [`DM::global_to_local()`]. It also builds
//! matrices with the nonzero pattern of its stencil and keeps a pool of scratch vectors.
//!
//! ```
//! # use petsc_raii::prelude::*;
//! # fn main() -> petsc_raii::Result<()> {
//! # let petsc = Petsc::init_no_args()?;
//! let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_PERIODIC, 5, 1, 1, None)?;
//! dm.set_up()?;
//! let (gxs, _, _, gxm, _, _) = dm.da_get_ghost_corners()?;
//! assert_eq!((gxs, gxm), (-1, 7));
//! # Ok(())
//! # }
//! ```

use crate::{
    raw,
    Result,
    PetscAsRaw,
    PetscInt,
    InsertMode,
    comm::{Communicator, Rank},
    vector::{Vector, VectorView, VectorViewMut, BorrowVectorMut},
    mat::Mat,
};

pub use crate::raw::da::{DMBoundaryType, DMDAStencilType, DMDALocalInfo, DMType};

/// A structured grid, and the layout of the vectors and matrices that live on it.
pub struct DM<'a> {
    pub(crate) world: &'a Communicator,
    pub(crate) dm_p: raw::da::DmData,
}

impl<'a> DM<'a> {
    /// Creates an empty DMDA of dimension `dim` (1, 2 or 3). Use the `da_set_*` methods and then
    /// [`DM::set_up()`] before using it.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut dm = DM::da_create(petsc.world(), 2)?;
    /// dm.da_set_sizes(4, 3, 1)?;
    /// dm.da_set_dof(2)?;
    /// dm.set_up()?;
    ///
    /// let global = dm.create_global_vector()?;
    /// assert_eq!(global.get_global_size()?, 4*3*2);
    /// assert_eq!(dm.get_dimension()?, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn da_create(world: &'a Communicator, dim: PetscInt) -> Result<Self> {
        if dim < 1 {
            seterrq!(world, crate::PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE,
                format!("DMDA dimension must be 1, 2 or 3, not {}", dim))?;
        }
        let dm_p = chkerrq!(world, raw::da::da_create(world, dim as usize))?;
        Ok(DM { world, dm_p })
    }

    /// Creates an object that will manage the communication of one-dimensional regular array data
    /// that is distributed across some processors.
    ///
    /// # Parameters
    /// * `world` - the communicator the grid lives on
    /// * `bx` - type of ghost cells at the boundary the array should have, if any
    /// * `nx` - global dimension of the array (that is the number of grid points)
    /// * `dof` - number of degrees of freedom per node
    /// * `s` - stencil width
    /// * `lx` _(optional)_ - array containing number of nodes in the x direction on each processor, or `None`.
    /// If `Some(...)`, must be of length as the number of processes in the world (i.e. `world.size()`).
    /// The sum of these entries must equal `nx`.
    ///
    /// [`DM::set_up()`] must be called before the grid is used.
    pub fn da_create_1d<'ll>(world: &'a Communicator, bx: DMBoundaryType, nx: PetscInt, dof: PetscInt,
        s: PetscInt, lx: impl Into<Option<&'ll [PetscInt]>>) -> Result<Self>
    {
        let mut dm = DM::da_create(world, 1)?;
        dm.da_set_sizes(nx, 1, 1)?;
        dm.da_set_boundary_type(bx, DMBoundaryType::DM_BOUNDARY_NONE, DMBoundaryType::DM_BOUNDARY_NONE)?;
        dm.da_set_dof(dof)?;
        dm.da_set_stencil_width(s)?;
        dm.da_set_ownership_ranges(lx, None, None)?;
        Ok(dm)
    }

    /// Creates an object that will manage the communication of two-dimensional regular array data
    /// that is distributed across some processors.
    ///
    /// # Parameters
    /// * `world` - the communicator the grid lives on
    /// * `bx, by` - type of ghost cells at the boundary the array should have, if any
    /// * `stencil_type` - stencil type
    /// * `nx, ny` - global dimension in each direction of the array (that is the number of grid points)
    /// * `px, py` - corresponding number of processors in each dimension (or `None` to have calculated).
    /// * `dof` - number of degrees of freedom per node
    /// * `s` - stencil width
    /// * `lx, ly` _(optional)_ - arrays containing the number of nodes in each cell along the x and y
    /// coordinates, or `None`. If `Some(...)`, these must the same length as `px` and `py`.
    /// The sum of the `lx` entries must be `nx`, and the sum of the `ly` entries must be `ny`.
    ///
    /// [`DM::set_up()`] must be called before the grid is used.
    pub fn da_create_2d<'ll1, 'll2>(world: &'a Communicator, bx: DMBoundaryType, by: DMBoundaryType, stencil_type: DMDAStencilType,
        nx: PetscInt, ny: PetscInt, px: impl Into<Option<PetscInt>>, py: impl Into<Option<PetscInt>>, dof: PetscInt, s: PetscInt,
        lx: impl Into<Option<&'ll1 [PetscInt]>>, ly: impl Into<Option<&'ll2 [PetscInt]>>) -> Result<Self>
    {
        let mut dm = DM::da_create(world, 2)?;
        dm.da_set_sizes(nx, ny, 1)?;
        dm.da_set_num_procs(px, py, None)?;
        dm.da_set_boundary_type(bx, by, DMBoundaryType::DM_BOUNDARY_NONE)?;
        dm.da_set_stencil_type(stencil_type)?;
        dm.da_set_dof(dof)?;
        dm.da_set_stencil_width(s)?;
        dm.da_set_ownership_ranges(lx, ly, None)?;
        Ok(dm)
    }

    /// Creates an object that will manage the communication of three-dimensional regular array data
    /// that is distributed across some processors.
    ///
    /// # Parameters
    /// * `world` - the communicator the grid lives on
    /// * `bx, by, bz` - type of ghost cells at the boundary the array should have, if any
    /// * `stencil_type` - stencil type
    /// * `nx, ny, nz` - global dimension in each direction of the array (that is the number of grid points)
    /// * `px, py, pz` - corresponding number of processors in each dimension (or `None` to have calculated).
    /// * `dof` - number of degrees of freedom per node
    /// * `s` - stencil width
    /// * `lx, ly, lz` _(optional)_ - arrays containing the number of nodes in each cell along the x, y, and z
    /// coordinates, or `None`. The sum of the `lx` entries must be `nx`,
    /// the sum of the `ly` entries must be `ny`, and the sum of the `lz` entries must be `nz`.
    ///
    /// [`DM::set_up()`] must be called before the grid is used.
    pub fn da_create_3d<'ll1, 'll2, 'll3>(world: &'a Communicator, bx: DMBoundaryType, by: DMBoundaryType, bz: DMBoundaryType, stencil_type: DMDAStencilType,
        nx: PetscInt, ny: PetscInt, nz: PetscInt, px: impl Into<Option<PetscInt>>, py: impl Into<Option<PetscInt>>, pz: impl Into<Option<PetscInt>>, dof: PetscInt, s: PetscInt,
        lx: impl Into<Option<&'ll1 [PetscInt]>>, ly: impl Into<Option<&'ll2 [PetscInt]>>, lz: impl Into<Option<&'ll3 [PetscInt]>>) -> Result<Self>
    {
        let mut dm = DM::da_create(world, 3)?;
        dm.da_set_sizes(nx, ny, nz)?;
        dm.da_set_num_procs(px, py, pz)?;
        dm.da_set_boundary_type(bx, by, bz)?;
        dm.da_set_stencil_type(stencil_type)?;
        dm.da_set_dof(dof)?;
        dm.da_set_stencil_width(s)?;
        dm.da_set_ownership_ranges(lx, ly, lz)?;
        Ok(dm)
    }

    /// Sets the number of processes in each direction, `None` to have it calculated.
    pub fn da_set_num_procs(&mut self, px: impl Into<Option<PetscInt>>, py: impl Into<Option<PetscInt>>,
        pz: impl Into<Option<PetscInt>>) -> Result<()>
    {
        chkerrq!(self.world, raw::da::set_num_procs(self.world, &mut self.dm_p, [px.into(), py.into(), pz.into()]))
    }

    /// Sets the type of boundary along each axis. Unused axes are ignored.
    pub fn da_set_boundary_type(&mut self, bx: DMBoundaryType, by: DMBoundaryType, bz: DMBoundaryType) -> Result<()> {
        chkerrq!(self.world, raw::da::set_boundary_type(self.world, &mut self.dm_p, [bx, by, bz]))
    }

    /// Sets the number of nodes owned by each process along each axis, `None` to have them calculated.
    pub fn da_set_ownership_ranges<'ll1, 'll2, 'll3>(&mut self, lx: impl Into<Option<&'ll1 [PetscInt]>>,
        ly: impl Into<Option<&'ll2 [PetscInt]>>, lz: impl Into<Option<&'ll3 [PetscInt]>>) -> Result<()>
    {
        let ranges = [lx.into().map(<[_]>::to_vec), ly.into().map(<[_]>::to_vec), lz.into().map(<[_]>::to_vec)];
        chkerrq!(self.world, raw::da::set_ownership_ranges(self.world, &mut self.dm_p, ranges))
    }

    /// Gets the number of processes in each direction. Before [`DM::set_up()`] these are the
    /// values that were set.
    pub fn da_get_num_procs(&self) -> Result<(Option<PetscInt>, Option<PetscInt>, Option<PetscInt>)> {
        let [px, py, pz] = chkerrq!(self.world, raw::da::get_num_procs(self.world, &self.dm_p))?;
        Ok((px, py, pz))
    }

    /// Gets the global sizes `(nx, ny, nz)` of the grid. Unused dimensions have size 1.
    pub fn da_get_sizes(&self) -> Result<(PetscInt, PetscInt, PetscInt)> {
        let [m, n, p] = chkerrq!(self.world, raw::da::get_sizes(self.world, &self.dm_p))?;
        Ok((m, n, p))
    }

    /// Gets the type of boundary along each axis.
    pub fn da_get_boundary_type(&self) -> Result<(DMBoundaryType, DMBoundaryType, DMBoundaryType)> {
        let [bx, by, bz] = chkerrq!(self.world, raw::da::get_boundary_type(self.world, &self.dm_p))?;
        Ok((bx, by, bz))
    }

    /// Returns the dimension of the DM
    pub fn get_dimension(&self) -> Result<PetscInt> {
        Ok(self.dm_p.dim as PetscInt)
    }

    /// The type of the DM, [`DMType::DMDA`] for every grid made by this module.
    pub fn get_type(&self) -> Result<DMType> {
        self.dm_p.dm_type.ok_or_else(|| crate::PetscError::new(crate::PetscErrorKind::PETSC_ERROR_ARG_TYPENOTSET,
            "DM type not set"))
    }

    /// Creates a global vector from a DM object. Collective.
    pub fn create_global_vector(&self) -> Result<Vector<'a>> {
        let vec_p = chkerrq!(self.world, raw::da::create_global_vector(self.world, &self.dm_p))?;
        Ok(Vector::from_raw(self.world, vec_p))
    }

    /// Creates a local vector from a DM object.
    ///
    /// A local vector holds the points owned by this process and its ghost points. It is
    /// sequential, its values only live on this process.
    pub fn create_local_vector(&self) -> Result<Vector<'a>> {
        let vec_p = chkerrq!(self.world, raw::da::create_local_vector(self.world, &self.dm_p))?;
        Ok(Vector::from_raw(self.world, vec_p))
    }

    /// Gets a PETSc vector that may be used with the DM local routines.
    ///
    /// This vector has spaces for the ghost values.
    ///
    /// The vector values are NOT initialized and may have values from an earlier use, so you may
    /// need to zero them. This is intended to be used for vectors you need for a short time, like
    /// within a single function call. For vectors that you intend to keep around or pass around large
    /// parts of your code you should use [`DM::create_local_vector()`]. The vector is given back to
    /// the DM when the returned value is dropped.
    pub fn get_local_vector(&self) -> Result<BorrowVectorMut<'a, '_>> {
        let vec_p = chkerrq!(self.world, raw::da::get_local_vector(self.world, &self.dm_p))?;
        Ok(BorrowVectorMut::new(Vector::from_raw(self.world, vec_p), Some(Box::new(move |borrow_vec: &mut Vector<'a>| {
            let vec_p = std::mem::take(&mut borrow_vec.vec_p);
            if let Err(err) = chkerrq!(self.world, raw::da::restore_local_vector(self.world, &self.dm_p, vec_p)) {
                log::error!("[{}] failed to restore local vector: {}", self.world.rank(), err.message());
            }
        }))))
    }

    /// Gets a global vector from the DM pool. See [`DM::get_local_vector()`].
    pub fn get_global_vector(&self) -> Result<BorrowVectorMut<'a, '_>> {
        let vec_p = chkerrq!(self.world, raw::da::get_global_vector(self.world, &self.dm_p))?;
        Ok(BorrowVectorMut::new(Vector::from_raw(self.world, vec_p), Some(Box::new(move |borrow_vec: &mut Vector<'a>| {
            let vec_p = std::mem::take(&mut borrow_vec.vec_p);
            if let Err(err) = chkerrq!(self.world, raw::da::restore_global_vector(self.world, &self.dm_p, vec_p)) {
                log::error!("[{}] failed to restore global vector: {}", self.world.rank(), err.message());
            }
        }))))
    }

    /// Gets empty Jacobian for a DM
    ///
    /// The nonzero pattern of the stencil is already in the matrix, with zero values, so it can
    /// be filled with [`Mat::set_values()`] without new allocations.
    /// The rows and columns use the PETSc ordering of the global vectors. Collective.
    pub fn create_matrix(&self) -> Result<Mat<'a>> {
        let mat_p = chkerrq!(self.world, raw::da::create_matrix(self.world, &self.dm_p))?;
        Ok(Mat::from_raw(self.world, mat_p))
    }

    /// Updates local vectors from global vectors.
    ///
    /// Fills the owned points and the ghost points of `local`. Collective.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_PERIODIC, 5, 1, 1, None)?;
    /// dm.set_up()?;
    ///
    /// let mut global = dm.create_global_vector()?;
    /// global.assemble_with((0..5).map(|i| (i, i as PetscScalar)), InsertMode::INSERT_VALUES)?;
    /// let mut local = dm.get_local_vector()?;
    /// dm.global_to_local(&global, InsertMode::INSERT_VALUES, &mut local)?;
    ///
    /// // the ghost points wrap around
    /// assert_eq!(local.view()?.as_slice().unwrap(), &[4.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn global_to_local(&self, global: &Vector<'a>, mode: InsertMode, local: &mut Vector<'a>) -> Result<()> {
        self.global_to_local_begin(global, mode)?;
        self.global_to_local_end(local, mode)
    }

    /// Begins updating a local vector from a global vector. The global vector can be
    /// changed again once this returns.
    pub fn global_to_local_begin(&self, global: &Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::global_to_local_begin(self.world, &self.dm_p, global.as_raw(), mode))
    }

    /// Ends updating a local vector from a global vector. Collective.
    pub fn global_to_local_end(&self, local: &mut Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::global_to_local_end(self.world, &self.dm_p, &mut local.vec_p, mode))
    }

    /// Updates global vectors from local vectors.
    ///
    /// With [`ADD_VALUES`](InsertMode::ADD_VALUES) the ghost points are added to the points they
    /// are copies of, you normally would zero the receiving vector before beginning this operation.
    /// With [`INSERT_VALUES`](InsertMode::INSERT_VALUES) only the owned points are copied. Collective.
    pub fn local_to_global(&self, local: &Vector<'a>, mode: InsertMode, global: &mut Vector<'a>) -> Result<()> {
        self.local_to_global_begin(local, mode)?;
        self.local_to_global_end(global, mode)
    }

    /// Begins updating a global vector from a local vector.
    pub fn local_to_global_begin(&self, local: &Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::local_to_global_begin(self.world, &self.dm_p, local.as_raw(), mode))
    }

    /// Ends updating a global vector from a local vector. Collective.
    pub fn local_to_global_end(&self, global: &mut Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::local_to_global_end(self.world, &self.dm_p, &mut global.vec_p, mode))
    }

    /// Maps one local vector to another. Every point of `to`, ghost points included, gets the
    /// value its owner has in `from`. Collective.
    pub fn local_to_local(&self, from: &Vector<'a>, mode: InsertMode, to: &mut Vector<'a>) -> Result<()> {
        self.local_to_local_begin(from, mode)?;
        self.local_to_local_end(to, mode)
    }

    /// Begins a local to local update.
    pub fn local_to_local_begin(&self, from: &Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::local_to_local_begin(self.world, &self.dm_p, from.as_raw(), mode))
    }

    /// Ends a local to local update. Collective.
    pub fn local_to_local_end(&self, to: &mut Vector<'a>, mode: InsertMode) -> Result<()> {
        chkerrq!(self.world, raw::da::local_to_local_end(self.world, &self.dm_p, &mut to.vec_p, mode))
    }

    /// Checks that `vec` is a global or local vector of this grid and returns the sizes of the
    /// block it covers, in row major order.
    fn vec_view_shape(&self, vec: &Vector<'a>) -> Result<Vec<usize>> {
        let info = self.da_get_info()?;
        let (xm, ym, zm, dof) = (info.xm, info.ym, info.zm, info.dof);
        let local_size = vec.get_local_size()?;

        let (gxm, gym, gzm) = if local_size == xm*ym*zm*dof {
            (xm, ym, zm)
        } else {
            (info.gxm, info.gym, info.gzm)
        };

        if local_size != gxm*gym*gzm*dof {
            seterrq!(self.world, crate::PetscErrorKind::PETSC_ERROR_ARG_INCOMP,
                format!("Vector local size {} is not compatible with DMDA local sizes {} or {}",
                    local_size, xm*ym*zm*dof, gxm*gym*gzm*dof))?;
        }

        let dim = info.dim as usize;
        if !(1..=3).contains(&dim) {
            seterrq!(self.world, crate::PetscErrorKind::PETSC_ERROR_ARG_CORRUPT,
                format!("DMDA dimension not 1, 2, or 3, it is {}", dim))?;
        }

        let dims_r = [gzm as usize, gym as usize, (gxm*dof) as usize];
        Ok(dims_r[(3-dim)..].to_vec())
    }

    /// Returns a multi-dimension immutable view of the local part of `vec`, indexed as `[x, y, z]`.
    ///
    /// # Note
    ///
    /// Indices start at zero on every process, not at the first owned grid point. Add the offsets
    /// from [`DM::da_get_corners()`] (or [`DM::da_get_ghost_corners()`] for a local vector) to get
    /// grid coordinates.
    ///
    /// The x index runs fastest in memory, so the view is column major and `[x, y]` indexing follows
    /// the storage order best. With more than one degree of freedom the first axis has `xm*dof` entries.
    ///
    /// A local vector includes its ghost points, so its view is larger than the one of a global vector
    /// and starts at the first ghost point.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # use ndarray::{Dimension, array, s};
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// // Note, this example runs on a single process, but it will also work on a
    /// // group of processes.
    /// let (m, n) = (5,2);
    ///
    /// let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
    ///     DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_BOX, m, n,
    ///     None, None, 1, 1, None, None)?;
    /// dm.set_from_options()?;
    /// dm.set_up()?;
    ///
    /// let mut global = dm.create_global_vector()?;
    ///
    /// let gs = global.get_global_size()?;
    /// let osr = global.get_ownership_range()?;
    /// let osr_usize = osr.start as usize ..osr.end as usize;
    /// // values follow the storage order of the global vector, rank by rank
    /// global.assemble_with((0..gs)
    ///         .filter(|i| osr.contains(i))
    ///         .map(|i| (i, i as PetscReal)),
    ///     InsertMode::INSERT_VALUES)?;
    ///
    /// // creates immutable 2d view
    /// let g_view = dm.da_vec_view(&global)?;
    ///
    /// let (xs, ys, _zs, xm, ym, _zm) = dm.da_get_corners()?;
    ///
    /// // a global vector has no ghost points
    /// assert_eq!(global.get_local_size()?, xm*ym);
    ///
    /// // the view is column major, not standard (row major) layout
    /// if g_view.dim().slice()[0] > 1 {
    ///     assert!(!g_view.is_standard_layout());
    /// }
    ///
    /// assert_eq!(g_view.ndim(), 2);
    /// assert_eq!(g_view.dim().slice(), &[xm as usize, ym as usize]);
    /// // reversing the axes gives a row major view of the same memory, which has a slice
    /// assert_eq!(g_view.view().reversed_axes().as_slice().unwrap(),
    ///     &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0][osr_usize.clone()]);
    ///
    /// // indexed as [x, y] the grid holds
    /// if petsc.world().size() == 1 {
    ///     let rhs_array = array![[0.0, 5.0],
    ///                            [1.0, 6.0],
    ///                            [2.0, 7.0],
    ///                            [3.0, 8.0],
    ///                            [4.0, 9.0]];
    ///     assert_eq!(g_view.slice(s![.., ..]).dim(), rhs_array.dim());
    ///     assert_eq!(g_view.slice(s![.., ..]), rhs_array.slice(s![xs.., ys..]));
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn da_vec_view<'b>(&self, vec: &'b Vector<'a>) -> Result<VectorView<'a, 'b>> {
        let shape_r = self.vec_view_shape(vec)?;
        VectorView::new(vec, &shape_r)
    }

    /// Returns a multi-dimension mutable view that shares data with the underlying vector and is indexed using
    /// the local dimensions. See [`DM::da_vec_view()`] for the layout.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # use ndarray::{Dimension, array, s};
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let (m, n) = (5,2);
    ///
    /// let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
    ///     DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_BOX, m, n,
    ///     None, None, 1, 1, None, None)?;
    /// dm.set_from_options()?;
    /// dm.set_up()?;
    ///
    /// let mut global = dm.create_global_vector()?;
    /// global.set_all(0.0)?;
    ///
    /// let (xs, ys, _zs, xm, ym, _zm) = dm.da_get_corners()?;
    ///
    /// let mut g_view = dm.da_vec_view_mut(&mut global)?;
    ///
    /// // Note, this automatically accounts for the column major layout.
    /// g_view.indexed_iter_mut().map(|(pat, v)| {
    ///         let s = pat.slice();
    ///         ((s[0]+xs as usize, s[1]+ys as usize), v)
    ///     })
    ///     .for_each(|((i,j), v)| *v = (i*2+j) as PetscReal);
    ///
    /// let rhs_array = array![[0.0, 1.0],
    ///                        [2.0, 3.0],
    ///                        [4.0, 5.0],
    ///                        [6.0, 7.0],
    ///                        [8.0, 9.0]];
    /// assert_eq!(g_view.slice(s![.., ..]).dim(),
    ///     rhs_array.slice(s![xs..(xs+xm), ys..(ys+ym)]).dim());
    /// assert_eq!(g_view.slice(s![.., ..]), rhs_array.slice(s![xs..(xs+xm), ys..(ys+ym)]));
    /// # Ok(())
    /// # }
    /// ```
    pub fn da_vec_view_mut<'b>(&self, vec: &'b mut Vector<'a>) -> Result<VectorViewMut<'a, 'b>> {
        let shape_r = self.vec_view_shape(vec)?;
        VectorViewMut::new(vec, &shape_r)
    }

    /// Returns the global (x,y,z) indices of the lower left corner and size of the local region, excluding ghost points.
    ///
    /// Returns `(x,y,z,m,n,p)`. Unused dimensions have start 0 and size 1.
    pub fn da_get_corners(&self) -> Result<(PetscInt, PetscInt, PetscInt, PetscInt, PetscInt, PetscInt)> {
        let info = self.da_get_info()?;
        Ok((info.xs, info.ys, info.zs, info.xm, info.ym, info.zm))
    }

    /// Returns the global (x,y,z) indices of the lower left corner and size of the local region, including ghost points.
    ///
    /// Returns `(x,y,z,m,n,p)`. With periodic or mirror boundaries the corner can be negative.
    pub fn da_get_ghost_corners(&self) -> Result<(PetscInt, PetscInt, PetscInt, PetscInt, PetscInt, PetscInt)> {
        let info = self.da_get_info()?;
        Ok((info.gxs, info.gys, info.gzs, info.gxm, info.gym, info.gzm))
    }

    /// Gets the ranges of indices in the x, y and z direction that are owned by each process
    ///
    /// Note: these correspond to the optional final arguments passed to [`DM::da_create_1d()`],
    /// [`DM::da_create_2d()`], and [`DM::da_create_3d()`].
    ///
    /// These numbers are NOT multiplied by the number of dof per node. Unused dimensions give an empty `Vec`.
    pub fn da_get_ownership_ranges(&self) -> Result<(Vec<PetscInt>, Vec<PetscInt>, Vec<PetscInt>)> {
        let [lx, ly, lz] = chkerrq!(self.world, raw::da::get_ownership_ranges(self.world, &self.dm_p))?;
        Ok((lx, ly, lz))
    }

    /// Sets the names of individual field components in multicomponent vectors associated with a DMDA.
    ///
    /// # Parameters
    ///
    /// * `nf` - field number for the DMDA (0, 1, ... dof-1), where dof indicates the number of
    /// degrees of freedom per node within the DMDA.
    /// * `name` - the name of the field (component)
    pub fn da_set_field_name<T: ToString>(&mut self, nf: PetscInt, name: T) -> Result<()> {
        chkerrq!(self.world, raw::da::set_field_name(self.world, &mut self.dm_p, nf, &name.to_string()))
    }

    /// Gets the name of a field component, `None` if it was never set.
    pub fn da_get_field_name(&self, nf: PetscInt) -> Result<Option<String>> {
        chkerrq!(self.world, raw::da::get_field_name(self.world, &self.dm_p, nf))
    }

    /// Sets the name of a coordinate direction, `0` for x.
    pub fn da_set_coordinate_name<T: ToString>(&mut self, nf: usize, name: T) -> Result<()> {
        chkerrq!(self.world, raw::da::set_coordinate_name(self.world, &mut self.dm_p, nf, &name.to_string()))
    }

    /// Gets the name of a coordinate direction, `None` if it was never set.
    pub fn da_get_coordinate_name(&self, nf: usize) -> Result<Option<String>> {
        chkerrq!(self.world, raw::da::get_coordinate_name(self.world, &self.dm_p, nf))
    }
}

impl<'a> DM<'a> {
    wrap_simple_petsc_member_funcs! {
        raw::da::set_from_options, pub set_from_options, takes mut, #[doc = "Configures the grid from the options database (`-da_grid_x`, `-da_grid_y`, `-da_grid_z`, \
            `-da_processors_x`, `-da_processors_y`, `-da_processors_z`, `-da_stencil_width`). Does nothing after [`DM::set_up()`]."];
        raw::da::set_up, pub set_up, takes mut, #[doc = "Sets up the data structures inside the DM object. Collective."];
        raw::da::set_sizes, pub da_set_sizes, input PetscInt, nx, input PetscInt, ny, input PetscInt, nz, takes mut, #[doc = "Sets the number of grid points in the three dimensional directions. Unused dimensions must be 1."];
        raw::da::set_dof, pub da_set_dof, input PetscInt, dof, takes mut, #[doc = "Sets the number of degrees of freedom per vertex"];
        raw::da::set_stencil_type, pub da_set_stencil_type, input DMDAStencilType, stype, takes mut, #[doc = "Sets the type of the communication stencil"];
        raw::da::get_stencil_type, pub da_get_stencil_type, output DMDAStencilType, #[doc = "Gets the type of the communication stencil"];
        raw::da::set_stencil_width, pub da_set_stencil_width, input PetscInt, width, takes mut, #[doc = "Sets the width of the communication stencil"];
        raw::da::get_stencil_width, pub da_get_stencil_width, output PetscInt, #[doc = "Gets the width of the communication stencil"];
        raw::da::get_info, pub da_get_info, output DMDALocalInfo, #[doc = "Gets information about the grid and the part of it this process sees."];
        raw::da::get_neighbors, pub da_get_neighbors, output Vec<Rank>, #[doc = "Gets the ranks of the neighboring processes, x fastest, with this process in the middle.\n\n\
            There are 3, 9 or 27 entries depending on the dimension, `-1` where there is no neighbor."];
    }
}

impl_petsc_object_traits! {
    DM, dm_p, raw::da::DmData, raw::da::destroy;
}

impl_petsc_view_func! {
    DM, dm_p, raw::da::view;
}
