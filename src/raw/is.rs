//! Index sets.

use std::borrow::Cow;

use super::vec::ArrayLock;
use super::viewer::{self, ViewerData};
use super::{check_valid, ClassId, PetscHeader};
use crate::comm::{Communicator, ReduceOp};
use crate::PetscInt;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ISType {
    /// An arbitrary list of indices.
    ISGENERAL,
    /// `first, first + step, first + 2 step, ...`
    ISSTRIDE,
    /// Each index names a block of `bs` consecutive indices.
    ISBLOCK,
}

impl ISType {
    fn name(self) -> &'static str {
        match self {
            ISType::ISGENERAL => "general",
            ISType::ISSTRIDE => "stride",
            ISType::ISBLOCK => "block",
        }
    }
}

/// Who owns the array an index set is created from.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyMode {
    /// The index set keeps its own copy.
    PETSC_COPY_VALUES,
    /// The index set takes ownership of the array.
    PETSC_OWN_POINTER,
    /// The index set uses the caller's array, which must outlive it.
    PETSC_USE_POINTER,
}

#[derive(Debug, Clone)]
pub(crate) enum IsKind<'a> {
    General(Cow<'a, [PetscInt]>),
    Stride { first: PetscInt, step: PetscInt, n: PetscInt },
    Block { bs: PetscInt, idx: Cow<'a, [PetscInt]> },
}

impl IsKind<'_> {
    fn is_type(&self) -> ISType {
        match self {
            IsKind::General(_) => ISType::ISGENERAL,
            IsKind::Stride { .. } => ISType::ISSTRIDE,
            IsKind::Block { .. } => ISType::ISBLOCK,
        }
    }

    fn len(&self) -> PetscInt {
        match self {
            IsKind::General(idx) => idx.len() as PetscInt,
            IsKind::Stride { n, .. } => *n,
            IsKind::Block { bs, idx } => bs * idx.len() as PetscInt,
        }
    }

    fn to_owned_kind<'b>(&self) -> IsKind<'b> {
        match self {
            IsKind::General(idx) => IsKind::General(Cow::Owned(idx.to_vec())),
            IsKind::Stride { first, step, n } => IsKind::Stride { first: *first, step: *step, n: *n },
            IsKind::Block { bs, idx } => IsKind::Block { bs: *bs, idx: Cow::Owned(idx.to_vec()) },
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct IsData<'a> {
    pub(crate) hdr: PetscHeader,
    kind: Option<IsKind<'a>>,
    lock: ArrayLock,
}

fn indices_from<'a>(idx: &'a [PetscInt], mode: CopyMode) -> crate::Result<Cow<'a, [PetscInt]>> {
    match mode {
        CopyMode::PETSC_COPY_VALUES => Ok(Cow::Owned(idx.to_vec())),
        CopyMode::PETSC_USE_POINTER => Ok(Cow::Borrowed(idx)),
        CopyMode::PETSC_OWN_POINTER => Err(petsc_err!(ARG_WRONG,
            "PETSC_OWN_POINTER needs an owned array, use the `_owned` variant of this function")),
    }
}

impl<'a> IsData<'a> {
    fn kind(&self) -> crate::Result<&IsKind<'a>> {
        check_valid(&self.hdr, "IS")?;
        self.kind.as_ref().ok_or_else(|| petsc_err!(ARG_TYPENOTSET, "IS type not set, call set_type() first"))
    }

    fn set_kind(&mut self, kind: IsKind<'a>) -> crate::Result<()> {
        check_valid(&self.hdr, "IS")?;
        if self.lock.is_locked() {
            return Err(petsc_err!(ARG_WRONGSTATE, "Cannot change an index set while its indices are borrowed"));
        }
        self.kind = Some(kind);
        Ok(())
    }

    fn expect_type(&self, ty: ISType) -> crate::Result<()> {
        let actual = self.kind()?.is_type();
        if actual != ty {
            return Err(petsc_err!(ARG_WRONG, "Index set is of type {}, expected {}", actual.name(), ty.name()));
        }
        Ok(())
    }
}

pub(crate) fn create<'a>(_comm: &Communicator) -> crate::Result<IsData<'a>> {
    Ok(IsData { hdr: PetscHeader::new(ClassId::IS)?, ..Default::default() })
}

pub(crate) fn destroy(is: &mut IsData<'_>) -> crate::Result<()> {
    if is.lock.is_locked() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Index set destroyed while its indices are borrowed"));
    }
    *is = IsData::default();
    Ok(())
}

/// Sets the shape of the index set; it starts out empty.
pub(crate) fn set_type(_comm: &Communicator, is: &mut IsData<'_>, ty: ISType) -> crate::Result<()> {
    if is.kind.as_ref().map(IsKind::is_type) == Some(ty) {
        return Ok(());
    }
    is.set_kind(match ty {
        ISType::ISGENERAL => IsKind::General(Cow::Owned(vec![])),
        ISType::ISSTRIDE => IsKind::Stride { first: 0, step: 1, n: 0 },
        ISType::ISBLOCK => IsKind::Block { bs: 1, idx: Cow::Owned(vec![]) },
    })
}

pub(crate) fn get_type(_comm: &Communicator, is: &IsData<'_>) -> crate::Result<ISType> {
    Ok(is.kind()?.is_type())
}

pub(crate) fn general_set_indices<'a>(_comm: &Communicator, is: &mut IsData<'a>, idx: &'a [PetscInt], mode: CopyMode) -> crate::Result<()> {
    is.expect_type(ISType::ISGENERAL)?;
    is.set_kind(IsKind::General(indices_from(idx, mode)?))
}

pub(crate) fn general_set_indices_owned(_comm: &Communicator, is: &mut IsData<'_>, idx: Vec<PetscInt>) -> crate::Result<()> {
    is.expect_type(ISType::ISGENERAL)?;
    is.set_kind(IsKind::General(Cow::Owned(idx)))
}

pub(crate) fn stride_set_stride(_comm: &Communicator, is: &mut IsData<'_>, n: PetscInt, first: PetscInt, step: PetscInt) -> crate::Result<()> {
    is.expect_type(ISType::ISSTRIDE)?;
    if n < 0 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Negative length {} not valid", n));
    }
    is.set_kind(IsKind::Stride { first, step, n })
}

pub(crate) fn block_set_indices<'a>(_comm: &Communicator, is: &mut IsData<'a>, bs: PetscInt, idx: &'a [PetscInt], mode: CopyMode) -> crate::Result<()> {
    is.expect_type(ISType::ISBLOCK)?;
    if bs < 1 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Block size {} must be positive", bs));
    }
    is.set_kind(IsKind::Block { bs, idx: indices_from(idx, mode)? })
}

pub(crate) fn block_set_indices_owned(_comm: &Communicator, is: &mut IsData<'_>, bs: PetscInt, idx: Vec<PetscInt>) -> crate::Result<()> {
    is.expect_type(ISType::ISBLOCK)?;
    if bs < 1 {
        return Err(petsc_err!(ARG_OUTOFRANGE, "Block size {} must be positive", bs));
    }
    is.set_kind(IsKind::Block { bs, idx: Cow::Owned(idx) })
}

pub(crate) fn get_local_size(_comm: &Communicator, is: &IsData<'_>) -> crate::Result<PetscInt> {
    Ok(is.kind()?.len())
}

/// The total number of indices over every process. Collective.
pub(crate) fn get_size(comm: &Communicator, is: &IsData<'_>) -> crate::Result<PetscInt> {
    let n = comm.agree(is.kind().map(IsKind::len))?;
    comm.all_reduce(n, ReduceOp::Sum)
}

pub(crate) fn get_block_size(_comm: &Communicator, is: &IsData<'_>) -> crate::Result<PetscInt> {
    Ok(match is.kind()? {
        IsKind::Block { bs, .. } => *bs,
        _ => 1,
    })
}

/// The indices, expanded for stride and block sets. Release with [`ArrayLock::release_read()`].
pub(crate) fn get_indices<'s>(_comm: &Communicator, is: &'s IsData<'_>) -> crate::Result<(Cow<'s, [PetscInt]>, &'s ArrayLock)> {
    let indices = match is.kind()? {
        IsKind::General(idx) => Cow::Borrowed(&idx[..]),
        IsKind::Stride { first, step, n } => Cow::Owned((0..*n).map(|i| first + i * step).collect()),
        IsKind::Block { bs, idx } => Cow::Owned(idx.iter().flat_map(|b| (0..*bs).map(move |j| b * bs + j)).collect()),
    };
    is.lock.acquire_read()?;
    Ok((indices, &is.lock))
}

pub(crate) fn to_vec(comm: &Communicator, is: &IsData<'_>) -> crate::Result<Vec<PetscInt>> {
    let (indices, lock) = get_indices(comm, is)?;
    let out = indices.into_owned();
    lock.release_read();
    Ok(out)
}

/// A new index set of the same shape with its own copy of the indices.
pub(crate) fn duplicate<'b>(_comm: &Communicator, is: &IsData<'_>) -> crate::Result<IsData<'b>> {
    let kind = is.kind()?.to_owned_kind();
    Ok(IsData { hdr: PetscHeader::new(ClassId::IS)?, kind: Some(kind), ..Default::default() })
}

/// Copies the indices of `src` into `dst`, which must have the same type and size.
pub(crate) fn copy_to(_comm: &Communicator, src: &IsData<'_>, dst: &mut IsData<'_>) -> crate::Result<()> {
    let (s, d) = (src.kind()?, dst.kind()?);
    if s.is_type() != d.is_type() {
        return Err(petsc_err!(ARG_INCOMP, "Index sets have different types: {} and {}", s.is_type().name(), d.is_type().name()));
    }
    if s.len() != d.len() {
        return Err(petsc_err!(ARG_SIZ, "Index sets have different local sizes {} != {}", s.len(), d.len()));
    }
    let kind = s.to_owned_kind();
    dst.set_kind(kind)
}

pub(crate) fn view(comm: &Communicator, is: &IsData<'_>, viewer: &ViewerData) -> crate::Result<()> {
    let kind = is.kind()?;
    let header = format!("IS Object: {} {} MPI process{}\n  type: {}\n", is.hdr.name(), comm.size(),
        if comm.size() == 1 { "" } else { "es" }, kind.is_type().name());
    let prefix = if comm.size() > 1 { format!("[{}] ", comm.rank()) } else { String::new() };

    let mut body = String::new();
    if let IsKind::Block { bs, .. } = kind {
        body += &format!("{}Block size {}\n", prefix, bs);
    }
    let (indices, lock) = get_indices(comm, is)?;
    body += &format!("{}Number of indices in {}set {}\n", prefix,
        if kind.is_type() == ISType::ISSTRIDE { "(stride) " } else { "" }, indices.len());
    for (i, idx) in indices.iter().enumerate() {
        body += &format!("{}{} {}\n", prefix, i, idx);
    }
    lock.release_read();
    viewer::ascii_write_object(comm, viewer, &header, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_expand() {
        let world = Communicator::world();
        crate::raw::sys::initialize(0, Default::default()).unwrap();
        let mut is = create(&world).unwrap();
        set_type(&world, &mut is, ISType::ISBLOCK).unwrap();
        block_set_indices_owned(&world, &mut is, 2, vec![0, 3]).unwrap();
        assert_eq!(to_vec(&world, &is).unwrap(), vec![0, 1, 6, 7]);
        assert_eq!(get_size(&world, &is).unwrap(), 4);

        set_type(&world, &mut is, ISType::ISSTRIDE).unwrap();
        stride_set_stride(&world, &mut is, 3, 5, -2).unwrap();
        assert_eq!(to_vec(&world, &is).unwrap(), vec![5, 3, 1]);

        let err = general_set_indices(&world, &mut is, &[1], CopyMode::PETSC_COPY_VALUES).unwrap_err();
        assert_eq!(err.kind(), crate::PetscErrorKind::PETSC_ERROR_ARG_WRONG);
        crate::raw::sys::finalize();
    }
}
