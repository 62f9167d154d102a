//! PETSc vectors (Vec objects) are used to store the field variables in PDE-based (or other) simulations.
//!
//! A vector is split into contiguous blocks, one per process, in rank order. The block of this
//! process can be accessed with [`Vector::view()`] and [`Vector::view_mut()`], which give
//! [`ndarray`] views that release the array when dropped.
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/Vec/index.html>

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use ndarray::{ArrayViewD, ArrayViewMutD, IxDyn};

use crate::{
    raw::{self, layout::Layout, scatter::Scatter, vec::ArrayLock},
    Result,
    PetscAsRaw,
    PetscInt,
    PetscReal,
    PetscScalar,
    InsertMode,
    comm::Communicator,
    indexset::IS,
    viewer::Viewer,
};

pub use crate::raw::vec::NormType;

/// Abstract PETSc vector object
pub struct Vector<'a> {
    pub(crate) world: &'a Communicator,
    pub(crate) vec_p: raw::vec::VecData,
}

/// How a mutable view will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayAccessMode {
    /// The current values can be read and written.
    ReadWrite,
    /// Only writes are intended. The view may start with any values.
    WriteOnly,
}

/// A immutable view of the local part of a vector. The array is released on drop.
pub struct VectorView<'a, 'b> {
    pub(crate) vec: &'b Vector<'a>,
    lock: &'b ArrayLock,
    offset: PetscInt,
    pub(crate) ndarray: ArrayViewD<'b, PetscScalar>,
}

/// A mutable view of the local part of a vector. The array is released on drop.
///
/// Only one mutable view of a vector can exist at a time:
///
/// ```compile_fail
/// # use petsc_raii::prelude::*;
/// # fn main() -> petsc_raii::Result<()> {
/// # let petsc = Petsc::init_no_args()?;
/// let mut v = Vector::from_global_size(petsc.world(), 4, "v")?;
/// let mut first = v.view_mut()?;
/// let mut second = v.view_mut()?;
/// first[0] = 1.0;
/// second[0] = 2.0;
/// # Ok(())
/// # }
/// ```
pub struct VectorViewMut<'a, 'b> {
    world: &'a Communicator,
    lock: &'b ArrayLock,
    offset: PetscInt,
    pub(crate) ndarray: ArrayViewMutD<'b, PetscScalar>,
}

/// A vector lent out by another object for as long as `'bv`, see for example
/// [`DM::get_local_vector()`](crate::dm::DM::get_local_vector()) and [`Vector::get_sub_vector()`].
///
/// When it is dropped the vector is given back to the object it came from.
pub struct BorrowVectorMut<'a, 'bv> {
    vec: Vector<'a>,
    drop_func: Option<Box<dyn FnOnce(&mut Vector<'a>) + 'bv>>,
}

/// A read-only version of [`BorrowVectorMut`].
pub struct BorrowVector<'a, 'bv> {
    vec: Vector<'a>,
    drop_func: Option<Box<dyn FnOnce(&mut Vector<'a>) + 'bv>>,
    _borrow: PhantomData<&'bv Vector<'a>>,
}

impl<'a> Vector<'a> {
    /// Creates an empty vector object. The sizes can then be set with [`Vector::set_sizes()`]
    /// and the vector built with [`Vector::set_up()`] or [`Vector::set_from_options()`].
    /// Same as [`Petsc::vec_create()`](crate::Petsc::vec_create()).
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// let petsc = Petsc::init_no_args().unwrap();
    ///
    /// Vector::create(petsc.world()).unwrap();
    /// ```
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let vec_p = chkerrq!(world, raw::vec::create(world))?;
        Ok(Vector { world, vec_p })
    }

    /// Creates a vector that is set up with the given sizes and name.
    ///
    /// `None` lets the size be decided from the other one, but they cannot both be `None`.
    /// When the global size is decided every process gets a block of
    /// `N/size` entries, with the first `N%size` processes getting one more.
    pub fn from_sizes(world: &'a Communicator, local_size: impl Into<Option<PetscInt>>,
        global_size: impl Into<Option<PetscInt>>, name: impl ToString) -> Result<Self>
    {
        let mut vec = Vector::create(world)?;
        vec.set_sizes(local_size.into(), global_size.into())?;
        vec.set_up()?;
        crate::PetscObject::set_name(&mut vec, name)?;
        Ok(vec)
    }

    /// Same as [`Vector::from_sizes()`] with only the local size.
    pub fn from_local_size(world: &'a Communicator, local_size: PetscInt, name: impl ToString) -> Result<Self> {
        Vector::from_sizes(world, local_size, None, name)
    }

    /// Same as [`Vector::from_sizes()`] with only the global size.
    pub fn from_global_size(world: &'a Communicator, global_size: PetscInt, name: impl ToString) -> Result<Self> {
        Vector::from_sizes(world, None, global_size, name)
    }

    pub(crate) fn from_raw(world: &'a Communicator, vec_p: raw::vec::VecData) -> Self {
        Vector { world, vec_p }
    }

    /// Creates a new vector of the same layout as an existing vector.
    /// [`duplicate`](Vector::duplicate) DOES NOT COPY the vector entries, the new vector is zero.
    /// Use [`Vector::copy_data_from()`] or [`Vector::copy()`] to copy a vector.
    pub fn duplicate(&self) -> Result<Self> {
        let vec_p = chkerrq!(self.world, raw::vec::duplicate(self.world, &self.vec_p))?;
        Ok(Vector { world: self.world, vec_p })
    }

    /// Makes a new vector with the same layout and values.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut x = Vector::from_global_size(petsc.world(), 5, "x")?;
    /// x.set_all(3.0)?;
    /// let mut y = x.copy()?;
    /// y.scale(2.0)?;
    ///
    /// assert_eq!(x.sum()?, 15.0);
    /// assert_eq!(y.sum()?, 30.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn copy(&self) -> Result<Self> {
        let mut new = self.duplicate()?;
        new.copy_data_from(self)?;
        Ok(new)
    }

    /// Sets the local and global sizes, and checks to determine compatibility
    /// The inputs can be `None` to have PETSc decide the size.
    /// `local_size` and `global_size` cannot be both `None`. If one processor calls this with
    /// `global_size` of `None` then all processors must.
    pub fn set_sizes(&mut self, local_size: Option<PetscInt>, global_size: Option<PetscInt>) -> Result<()> {
        chkerrq!(self.world, raw::vec::set_sizes(self.world, &mut self.vec_p, local_size, global_size))
    }

    ///  Assembling the vector by calling [`Vector::assembly_begin()`] then [`Vector::assembly_end()`]
    pub fn assemble(&mut self) -> Result<()> {
        self.assembly_begin()?;
        self.assembly_end()
    }

    /// Sets the given values with [`Vector::set_values()`] and assembles the vector.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut v = Vector::from_global_size(petsc.world(), 10, "v")?;
    /// v.assemble_with((0..10).map(|i| (i, i as PetscScalar)), InsertMode::INSERT_VALUES)?;
    /// assert_eq!(v.sum()?, 45.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn assemble_with<I>(&mut self, iter_builder: I, iora: InsertMode) -> Result<()>
    where
        I: IntoIterator<Item = (PetscInt, PetscScalar)>,
    {
        let (ix, v): (Vec<_>, Vec<_>) = iter_builder.into_iter().unzip();
        self.set_values(&ix, &v, iora)?;
        self.assemble()
    }

    /// Gets values from certain locations of a vector. Only values owned by this process can be read.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # let petsc = Petsc::init_no_args().unwrap();
    /// let mut v = petsc.vec_create().unwrap();
    /// v.set_sizes(None, Some(10)).unwrap(); // create vector of size 10
    /// v.set_from_options().unwrap();
    ///
    /// let ix = [0, 2, 7, 9];
    /// v.set_values(&ix, &[1.1, 2.2, 3.3, 4.4], InsertMode::INSERT_VALUES).unwrap();
    /// v.assemble().unwrap();
    ///
    /// assert_eq!(&v.get_values(ix).unwrap()[..], &[1.1, 2.2, 3.3, 4.4]);
    /// assert_eq!(&v.get_values(vec![2, 0, 9, 7]).unwrap()[..], &[2.2, 1.1, 4.4, 3.3]);
    /// assert_eq!(&v.get_values(0..10).unwrap()[..], &[1.1,0.0,2.2,0.0,0.0,0.0,0.0,3.3,0.0,4.4]);
    /// assert_eq!(&v.get_values((0..5).map(|v| v*2)).unwrap()[..], &[1.1,2.2,0.0,0.0,0.0]);
    /// ```
    pub fn get_values<T>(&self, ix: T) -> Result<Vec<PetscScalar>>
    where
        T: IntoIterator<Item = PetscInt>,
    {
        let ix = ix.into_iter().collect::<Vec<_>>();
        chkerrq!(self.world, raw::vec::get_values(self.world, &self.vec_p, &ix))
    }

    /// Returns the range of indices owned by EACH processor, in rank order.
    pub fn get_ownership_ranges(&self) -> Result<Vec<std::ops::Range<PetscInt>>> {
        chkerrq!(self.world, raw::vec::get_ownership_ranges(self.world, &self.vec_p))
    }

    /// Gets an immutable view of the local part of the vector.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut v = Vector::from_global_size(petsc.world(), 4, "v")?;
    /// v.set_all(1.0)?;
    /// {
    ///     let mut view = v.view_mut()?;
    ///     view[1] = 5.0;
    /// }
    /// let view = v.view()?;
    /// assert_eq!(view.as_slice().unwrap(), &[1.0, 5.0, 1.0, 1.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn view<'b>(&'b self) -> Result<VectorView<'a, 'b>> {
        let n = self.get_local_size()? as usize;
        VectorView::new(self, &[n])
    }

    /// Gets a mutable view of the local part of the vector, for reading and writing.
    pub fn view_mut<'b>(&'b mut self) -> Result<VectorViewMut<'a, 'b>> {
        self.view_mut_with(ArrayAccessMode::ReadWrite)
    }

    /// Gets a mutable view of the local part of the vector.
    ///
    /// With [`ArrayAccessMode::WriteOnly`] the caller promises to overwrite every entry it
    /// cares about, so the starting values are not guaranteed.
    pub fn view_mut_with<'b>(&'b mut self, mode: ArrayAccessMode) -> Result<VectorViewMut<'a, 'b>> {
        let n = self.get_local_size()? as usize;
        log::trace!("[{}] mutable view of {} ({:?})", self.world.rank(), self.vec_p.hdr.name(), mode);
        VectorViewMut::new(self, &[n])
    }

    /// Gets a vector made of the entries of this vector named by `is`, in the order of `is`.
    ///
    /// The entries are copied out; changes made through the returned vector are written back
    /// when it is dropped. Collective.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut v = Vector::from_global_size(petsc.world(), 6, "v")?;
    /// v.assemble_with((0..6).map(|i| (i, i as PetscScalar)), InsertMode::INSERT_VALUES)?;
    ///
    /// let is = IS::create_general(petsc.world(), &[4, 1], CopyMode::PETSC_COPY_VALUES)?;
    /// {
    ///     let mut sub = v.get_sub_vector(&is)?;
    ///     assert_eq!(sub.view()?.as_slice().unwrap(), &[4.0, 1.0]);
    ///     sub.scale(10.0)?;
    /// }
    /// assert_eq!(v.view()?.as_slice().unwrap(), &[0.0, 10.0, 2.0, 3.0, 40.0, 5.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get_sub_vector<'bv>(&'bv mut self, is: &IS<'_, '_>) -> Result<BorrowVectorMut<'a, 'bv>> {
        let world = self.world;
        let (scatter, sub) = self.gather_sub_vector(is)?;
        Ok(BorrowVectorMut::new(sub, Some(Box::new(move |sub: &mut Vector<'a>| {
            if std::thread::panicking() {
                log::warn!("[{}] unwinding, changes to the sub-vector of {} are not written back",
                    world.rank(), self.vec_p.hdr.name());
                return;
            }
            let res = scatter.reverse(world, sub.vec_p.local(), self.vec_p.local_mut(), InsertMode::INSERT_VALUES);
            if let Err(err) = chkerrq!(world, res) {
                log::error!("[{}] failed to restore sub-vector: {}", world.rank(), err.message());
            }
        }))))
    }

    /// Same as [`Vector::get_sub_vector()`] but the entries are never written back.
    pub fn get_sub_vector_read<'bv>(&'bv self, is: &IS<'_, '_>) -> Result<BorrowVector<'a, 'bv>> {
        let (_, sub) = self.gather_sub_vector(is)?;
        Ok(BorrowVector::new(sub, None))
    }

    fn gather_sub_vector(&self, is: &IS<'_, '_>) -> Result<(Scatter, Vector<'a>)> {
        let world = self.world;
        let indices = is.to_vec()?;
        let map = chkerrq!(world, self.vec_p.layout())?;
        let scatter = chkerrq!(world, Scatter::create(world, map, &indices))?;
        let sub_map = chkerrq!(world, if map.seq {
            Layout::sequential(world, indices.len() as PetscInt)
        } else {
            Layout::setup(world, Some(indices.len() as PetscInt), None)
        })?;
        let mut vals = vec![0.0; indices.len()];
        chkerrq!(world, scatter.forward(world, self.vec_p.local(), &mut vals, InsertMode::INSERT_VALUES))?;
        let vec_p = chkerrq!(world, raw::vec::VecData::with_layout(sub_map, vals))?;
        Ok((scatter, Vector { world, vec_p }))
    }

    /// Loads a vector written with a binary [`Viewer`].
    ///
    /// If the vector has no sizes it takes the size found in the file. Collective.
    pub fn load(&mut self, viewer: &Viewer) -> Result<()> {
        chkerrq!(self.world, raw::viewer::vec_load(self.world, &mut self.vec_p, viewer.as_raw()))
    }
}

impl<'a> Vector<'a> {
    wrap_simple_petsc_member_funcs! {
        raw::vec::set_from_options, pub set_from_options, takes mut, #[doc = "Configures the vector from the options database."];
        raw::vec::set_up, pub set_up, takes mut, #[doc = "Sets up the internal vector data structures for the later use. Collective."];
        raw::vec::assembly_begin, pub assembly_begin, takes mut, #[doc = "Begins assembling the vector. This routine should be called after completing all calls to [`Vector::set_values()`]."];
        raw::vec::assembly_end, pub assembly_end, takes mut, #[doc = "Completes assembling the vector. This routine should be called after [`Vector::assembly_begin()`]."];
        raw::vec::set, pub set_all, input PetscScalar, alpha, takes mut, #[doc = "Sets all components of a vector to a single scalar value.\n\n\
            You CANNOT call this after you have called [`Vector::set_values()`] without assembling."];
        raw::vec::get_local_size, pub get_local_size, output PetscInt, #[doc = "Returns the number of elements of the vector stored in local memory."];
        raw::vec::get_global_size, pub get_global_size, output PetscInt, #[doc = "Returns the global number of elements of the vector."];
        raw::vec::get_ownership_range, pub get_ownership_range, output std::ops::Range<PetscInt>, #[doc = "Returns the range of indices owned by this processor."];
        raw::vec::copy, pub copy_data_from, input &Vector, x .as_raw, takes mut, #[doc = "Copies the values of `x` into this vector, which must have the same layout."];
    }

    wrap_simple_petsc_member_funcs! {
        raw::vec::set_values, pub set_values, input &[PetscInt], ix, input &[PetscScalar], v, input InsertMode, iora, takes mut,
            #[doc = "Inserts or adds values into certain locations of a vector.\n\n\
            Entries owned by other processes are sent to them during assembly, negative indices are ignored. \
            Inserting and adding cannot be mixed without assembling in between.\n\n\
            # Example\n\n\
            ```\n\
            # use petsc_raii::prelude::*;\n\
            # let petsc = Petsc::init_no_args().unwrap();\n\
            let mut v = petsc.vec_create().unwrap();\n\
            v.set_sizes(None, Some(10)).unwrap();\n\
            v.set_from_options().unwrap();\n\n\
            v.set_values(&[0, 3, 7, 9], &[1.1, 2.2, 3.3, 4.4], InsertMode::INSERT_VALUES).unwrap();\n\
            v.assemble().unwrap();\n\
            assert_eq!(&v.get_values(0..10).unwrap()[..], &[1.1,0.0,0.0,2.2,0.0,0.0,0.0,3.3,0.0,4.4]);\n\n\
            v.set_values(&[0, 2, 8, 9], &[1.0, 2.0, 3.0, 4.0], InsertMode::ADD_VALUES).unwrap();\n\
            v.assemble().unwrap();\n\
            assert_eq!(&v.get_values(0..10).unwrap()[..], &[2.1,0.0,2.0,2.2,0.0,0.0,0.0,3.3,3.0,8.4]);\n\
            ```"];
    }

    wrap_simple_petsc_member_funcs! {
        raw::vec::axpy, pub axpy, input PetscScalar, alpha, input &Vector, x .as_raw, takes mut, #[doc = "Computes `self += alpha * x`"];
        raw::vec::aypx, pub aypx, input PetscScalar, beta, input &Vector, x .as_raw, takes mut, #[doc = "Computes `self = x + beta * self`"];
        raw::vec::axpby, pub axpby, input PetscScalar, alpha, input PetscScalar, beta, input &Vector, x .as_raw, takes mut, #[doc = "Computes `self = alpha * x + beta * self`"];
        raw::vec::axpbypcz, pub axpbypcz, input PetscScalar, alpha, input PetscScalar, beta, input PetscScalar, gamma, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut,
            #[doc = "Computes `self = alpha * x + beta * y + gamma * self`"];
        raw::vec::waxpy, pub waxpy, input PetscScalar, alpha, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut, #[doc = "Computes `self = alpha * x + y`"];
        raw::vec::pointwise_mult, pub pointwise_mult, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut, #[doc = "Computes the componentwise multiplication `self = x .* y`"];
        raw::vec::pointwise_divide, pub pointwise_divide, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut, #[doc = "Computes the componentwise division `self = x ./ y`. A zero in `y` gives a zero."];
        raw::vec::pointwise_max, pub pointwise_max, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut, #[doc = "Computes the componentwise maximum `self = max(x, y)`"];
        raw::vec::pointwise_min, pub pointwise_min, input &Vector, x .as_raw, input &Vector, y .as_raw, takes mut, #[doc = "Computes the componentwise minimum `self = min(x, y)`"];
        raw::vec::scale, pub scale, input PetscScalar, alpha, takes mut, #[doc = "Scales a vector, `self *= alpha`"];
        raw::vec::shift, pub shift, input PetscScalar, alpha, takes mut, #[doc = "Shifts all of the components of a vector, `self += alpha`"];
        raw::vec::abs, pub abs, takes mut, #[doc = "Replaces every element in a vector with its absolute value."];
        raw::vec::reciprocal, pub reciprocal, takes mut, #[doc = "Replaces each component of a vector by its reciprocal. Zero entries are left alone."];
        raw::vec::normalize, pub normalize, output PetscReal, takes mut, #[doc = "Normalizes a vector by its 2-norm and returns the norm before scaling."];
    }

    wrap_simple_petsc_member_funcs! {
        raw::vec::norm, pub norm, input NormType, norm_type, output PetscReal, #[doc = "Computes the vector norm. Collective, every process gets the same value."];
        raw::vec::dot, pub dot, input &Vector, y .as_raw, output PetscScalar, #[doc = "Computes the vector dot product. Collective."];
        raw::vec::tdot, pub tdot, input &Vector, y .as_raw, output PetscScalar, #[doc = "Computes the indefinite vector dot product. Collective."];
        raw::vec::sum, pub sum, output PetscScalar, #[doc = "Computes the sum of all the components of a vector. Collective."];
        raw::vec::max, pub max, output (PetscInt, PetscReal), #[doc = "Determines the vector component with maximum real part and its location.\n\n\
            Returns `(global index, value)`; ties go to the lowest index. Collective."];
        raw::vec::min, pub min, output (PetscInt, PetscReal), #[doc = "Determines the vector component with minimum real part and its location.\n\n\
            Returns `(global index, value)`; ties go to the lowest index. Collective."];
    }
}

impl_petsc_object_traits! {
    Vector, vec_p, raw::vec::VecData, raw::vec::destroy;
}

impl_petsc_view_func! {
    Vector, vec_p, raw::viewer::vec_view;
}

impl<'a, 'b> VectorView<'a, 'b> {
    /// `shape_r` is the shape in row major order; the view gets the reversed axes.
    pub(crate) fn new(vec: &'b Vector<'a>, shape_r: &[usize]) -> Result<Self> {
        let world = vec.world;
        let (array, lock) = chkerrq!(world, raw::vec::get_array_read(world, &vec.vec_p))?;
        let offset = vec.vec_p.layout().map_or(0, |map| map.rstart);
        match ArrayViewD::from_shape(IxDyn(shape_r), array) {
            Ok(ndarray) => Ok(VectorView { vec, lock, offset, ndarray: ndarray.reversed_axes() }),
            Err(err) => {
                lock.release_read();
                chkerrq!(world, Err(petsc_err!(ARG_SIZ, "Local array of length {} does not fit shape {:?}: {}",
                    array.len(), shape_r, err)))
            }
        }
    }

    /// Iterates over the entries in memory order, with the global index of each.
    ///
    /// The global index of an entry is only meaningful for global vectors.
    pub fn global_indexed_iter(&self) -> impl Iterator<Item = (PetscInt, &PetscScalar)> + '_ {
        let offset = self.offset;
        self.ndarray.as_slice_memory_order().into_iter().flatten().enumerate()
            .map(move |(i, v)| (offset + i as PetscInt, v))
    }

    /// The vector the view was taken from.
    pub fn vector(&self) -> &'b Vector<'a> {
        self.vec
    }
}

impl<'a, 'b> VectorViewMut<'a, 'b> {
    /// `shape_r` is the shape in row major order; the view gets the reversed axes.
    pub(crate) fn new(vec: &'b mut Vector<'a>, shape_r: &[usize]) -> Result<Self> {
        let world = vec.world;
        let offset = vec.vec_p.layout().map_or(0, |map| map.rstart);
        let (array, lock) = chkerrq!(world, raw::vec::get_array_mut(world, &mut vec.vec_p))?;
        let len = array.len();
        match ArrayViewMutD::from_shape(IxDyn(shape_r), array) {
            Ok(ndarray) => Ok(VectorViewMut { world, lock, offset, ndarray: ndarray.reversed_axes() }),
            Err(err) => {
                lock.release_write();
                chkerrq!(world, Err(petsc_err!(ARG_SIZ, "Local array of length {} does not fit shape {:?}: {}",
                    len, shape_r, err)))
            }
        }
    }

    /// Iterates over the entries in memory order, with the global index of each.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let mut v = Vector::from_global_size(petsc.world(), 5, "v")?;
    /// v.view_mut()?.global_indexed_iter_mut().for_each(|(i, v)| *v = (i * i) as PetscScalar);
    /// assert_eq!(v.get_values(0..5)?, vec![0.0, 1.0, 4.0, 9.0, 16.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn global_indexed_iter_mut(&mut self) -> impl Iterator<Item = (PetscInt, &mut PetscScalar)> + '_ {
        let offset = self.offset;
        self.ndarray.as_slice_memory_order_mut().into_iter().flatten().enumerate()
            .map(move |(i, v)| (offset + i as PetscInt, v))
    }
}

impl Drop for VectorView<'_, '_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl Drop for VectorViewMut<'_, '_> {
    fn drop(&mut self) {
        log::trace!("[{}] releasing mutable view", self.world.rank());
        self.lock.release_write();
    }
}

impl<'b> Deref for VectorView<'_, 'b> {
    type Target = ArrayViewD<'b, PetscScalar>;
    fn deref(&self) -> &ArrayViewD<'b, PetscScalar> {
        &self.ndarray
    }
}

impl<'b> Deref for VectorViewMut<'_, 'b> {
    type Target = ArrayViewMutD<'b, PetscScalar>;
    fn deref(&self) -> &ArrayViewMutD<'b, PetscScalar> {
        &self.ndarray
    }
}

impl<'b> DerefMut for VectorViewMut<'_, 'b> {
    fn deref_mut(&mut self) -> &mut ArrayViewMutD<'b, PetscScalar> {
        &mut self.ndarray
    }
}

impl std::fmt::Debug for VectorView<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.ndarray.fmt(f)
    }
}

impl std::fmt::Debug for VectorViewMut<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.ndarray.fmt(f)
    }
}

impl<'a, 'bv> BorrowVectorMut<'a, 'bv> {
    /// `drop_func` is given the vector when the borrow ends.
    pub(crate) fn new(vec: Vector<'a>, drop_func: Option<Box<dyn FnOnce(&mut Vector<'a>) + 'bv>>) -> Self {
        BorrowVectorMut { vec, drop_func }
    }
}

impl<'a, 'bv> BorrowVector<'a, 'bv> {
    pub(crate) fn new(vec: Vector<'a>, drop_func: Option<Box<dyn FnOnce(&mut Vector<'a>) + 'bv>>) -> Self {
        BorrowVector { vec, drop_func, _borrow: PhantomData }
    }
}

impl Drop for BorrowVectorMut<'_, '_> {
    fn drop(&mut self) {
        if let Some(drop_func) = self.drop_func.take() {
            drop_func(&mut self.vec);
        }
    }
}

impl Drop for BorrowVector<'_, '_> {
    fn drop(&mut self) {
        if let Some(drop_func) = self.drop_func.take() {
            drop_func(&mut self.vec);
        }
    }
}

impl<'a> Deref for BorrowVectorMut<'a, '_> {
    type Target = Vector<'a>;
    fn deref(&self) -> &Vector<'a> {
        &self.vec
    }
}

impl<'a> DerefMut for BorrowVectorMut<'a, '_> {
    fn deref_mut(&mut self) -> &mut Vector<'a> {
        &mut self.vec
    }
}

impl<'a> Deref for BorrowVector<'a, '_> {
    type Target = Vector<'a>;
    fn deref(&self) -> &Vector<'a> {
        &self.vec
    }
}

impl std::fmt::Debug for Vector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vector")
            .field("name", &self.vec_p.hdr.name())
            .field("layout", &self.vec_p.map)
            .finish()
    }
}
