//! Index set (IS) objects are used to index into vectors and matrices and to setup vector scatters.
//!
//! An index set can borrow its indices from the caller for `'bv`
//! (see [`CopyMode::PETSC_USE_POINTER`]) or own them.
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/IS/index.html>

use std::borrow::Cow;
use std::ops::Deref;

use crate::{
    raw::{self, vec::ArrayLock},
    Result,
    PetscInt,
    comm::Communicator,
};

pub use crate::raw::is::{ISType, CopyMode};

/// Abstract PETSc object that allows indexing.
pub struct IS<'a, 'bv> {
    pub(crate) world: &'a Communicator,
    pub(crate) is_p: raw::is::IsData<'bv>,
}

/// The indices of an [`IS`], released when dropped.
///
/// Created with [`IS::get_indices()`].
pub struct ISIndices<'s> {
    indices: Cow<'s, [PetscInt]>,
    lock: &'s ArrayLock,
}

impl<'a, 'bv> IS<'a, 'bv> {
    /// Creates an index set object with no type.
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let is_p = chkerrq!(world, raw::is::create(world))?;
        Ok(IS { world, is_p })
    }

    /// Creates an index set from a list of integers.
    ///
    /// With [`CopyMode::PETSC_USE_POINTER`] the index set keeps using `idx`, which is why
    /// the slice must live as long as `'bv`. [`CopyMode::PETSC_OWN_POINTER`] is only
    /// accepted by [`IS::create_general_owned()`].
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let idx = [3, 1, 4, 1, 5];
    /// let is = IS::create_general(petsc.world(), &idx, CopyMode::PETSC_USE_POINTER)?;
    /// assert_eq!(is.get_local_size()?, 5);
    /// assert_eq!(&is.get_indices()?[..], &idx);
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_general(world: &'a Communicator, idx: &'bv [PetscInt], mode: CopyMode) -> Result<Self> {
        let mut is = IS::create(world)?;
        is.set_type(ISType::ISGENERAL)?;
        chkerrq!(world, raw::is::general_set_indices(world, &mut is.is_p, idx, mode))?;
        Ok(is)
    }

    /// Creates an index set that owns `idx`.
    pub fn create_general_owned(world: &'a Communicator, idx: Vec<PetscInt>) -> Result<Self> {
        let mut is = IS::create(world)?;
        is.set_type(ISType::ISGENERAL)?;
        chkerrq!(world, raw::is::general_set_indices_owned(world, &mut is.is_p, idx))?;
        Ok(is)
    }

    /// Creates a data structure for an index set containing a list of evenly spaced integers.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let is = IS::create_stride(petsc.world(), 4, 10, 3)?;
    /// assert_eq!(is.get_type()?, ISType::ISSTRIDE);
    /// assert_eq!(&is.get_indices()?[..], &[10, 13, 16, 19]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_stride(world: &'a Communicator, n: PetscInt, first: PetscInt, step: PetscInt) -> Result<Self> {
        let mut is = IS::create(world)?;
        is.set_type(ISType::ISSTRIDE)?;
        is.stride_set_stride(n, first, step)?;
        Ok(is)
    }

    /// Creates an index set where each entry of `idx` names `bs` consecutive indices,
    /// `idx[i]*bs .. idx[i]*bs + bs`.
    pub fn create_block(world: &'a Communicator, bs: PetscInt, idx: &'bv [PetscInt], mode: CopyMode) -> Result<Self> {
        let mut is = IS::create(world)?;
        is.set_type(ISType::ISBLOCK)?;
        chkerrq!(world, raw::is::block_set_indices(world, &mut is.is_p, bs, idx, mode))?;
        Ok(is)
    }

    /// Same as [`IS::create_block()`] but the index set owns the block indices.
    pub fn create_block_owned(world: &'a Communicator, bs: PetscInt, idx: Vec<PetscInt>) -> Result<Self> {
        let mut is = IS::create(world)?;
        is.set_type(ISType::ISBLOCK)?;
        chkerrq!(world, raw::is::block_set_indices_owned(world, &mut is.is_p, bs, idx))?;
        Ok(is)
    }

    /// Sets the indices of a general index set, replacing the old ones.
    pub fn general_set_indices(&mut self, idx: &'bv [PetscInt], mode: CopyMode) -> Result<()> {
        chkerrq!(self.world, raw::is::general_set_indices(self.world, &mut self.is_p, idx, mode))
    }

    /// Sets the block size and block indices of a block index set.
    pub fn block_set_indices(&mut self, bs: PetscInt, idx: &'bv [PetscInt], mode: CopyMode) -> Result<()> {
        chkerrq!(self.world, raw::is::block_set_indices(self.world, &mut self.is_p, bs, idx, mode))
    }

    /// Returns the indices, expanded for stride and block index sets.
    ///
    /// The index set cannot be changed or destroyed until the returned value is dropped.
    pub fn get_indices(&self) -> Result<ISIndices<'_>> {
        let (indices, lock) = chkerrq!(self.world, raw::is::get_indices(self.world, &self.is_p))?;
        Ok(ISIndices { indices, lock })
    }

    /// Copies the indices into a new `Vec`.
    pub fn to_vec(&self) -> Result<Vec<PetscInt>> {
        chkerrq!(self.world, raw::is::to_vec(self.world, &self.is_p))
    }

    /// Creates a copy of the index set that owns its indices.
    pub fn duplicate<'b>(&self) -> Result<IS<'a, 'b>> {
        let is_p = chkerrq!(self.world, raw::is::duplicate(self.world, &self.is_p))?;
        Ok(IS { world: self.world, is_p })
    }

    /// Copies the indices of this index set into `dest`, which must have the same type and local size.
    pub fn copy_to(&self, dest: &mut IS<'_, '_>) -> Result<()> {
        chkerrq!(self.world, raw::is::copy_to(self.world, &self.is_p, &mut dest.is_p))
    }
}

impl<'a, 'bv> IS<'a, 'bv> {
    wrap_simple_petsc_member_funcs! {
        raw::is::set_type, pub set_type, input ISType, is_type, takes mut, #[doc = "Sets the type of the index set. An index set of a new type starts out empty."];
        raw::is::get_type, pub get_type, output ISType, #[doc = "Gets the type of the index set."];
        raw::is::stride_set_stride, pub stride_set_stride, input PetscInt, n, input PetscInt, first, input PetscInt, step, takes mut, #[doc = "Sets the length, first index and step of a stride index set."];
        raw::is::get_local_size, pub get_local_size, output PetscInt, #[doc = "Returns the number of indices on this process."];
        raw::is::get_size, pub get_size, output PetscInt, #[doc = "Returns the number of indices over all processes. Collective."];
        raw::is::get_block_size, pub get_block_size, output PetscInt, #[doc = "Returns the block size, 1 for non-block index sets."];
    }
}

impl_petsc_object_traits! {
    IS, is_p, raw::is::IsData<'bv>, raw::is::destroy, 'bv;
}

impl_petsc_view_func! {
    IS, is_p, raw::is::view, 'bv;
}

impl Deref for ISIndices<'_> {
    type Target = [PetscInt];

    fn deref(&self) -> &[PetscInt] {
        &self.indices
    }
}

impl Drop for ISIndices<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl std::fmt::Debug for ISIndices<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.indices.fmt(f)
    }
}
