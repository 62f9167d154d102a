//! Distributed dense vectors.

use std::cell::Cell;

use super::layout::Layout;
use super::{check_valid, ClassId, PetscHeader};
use crate::comm::{Communicator, Exchange, ReduceOp};
use crate::{InsertMode, PetscInt, PetscReal, PetscScalar};

/// Which norm to compute.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormType {
    /// Sum of absolute values.
    NORM_1,
    /// Square root of the sum of squares.
    NORM_2,
    /// Same as [`NORM_2`](NormType::NORM_2) for vectors.
    NORM_FROBENIUS,
    /// Largest absolute value.
    NORM_INFINITY,
}

/// Counts the outstanding views of an array.
#[derive(Debug, Default)]
pub(crate) struct ArrayLock {
    readers: Cell<u32>,
    writer: Cell<bool>,
}

impl ArrayLock {
    pub(crate) fn acquire_read(&self) -> crate::Result<()> {
        if self.writer.get() {
            return Err(petsc_err!(ARG_WRONGSTATE, "Vector array is already borrowed for writing"));
        }
        self.readers.set(self.readers.get() + 1);
        Ok(())
    }

    pub(crate) fn acquire_write(&self) -> crate::Result<()> {
        if self.writer.get() || self.readers.get() > 0 {
            return Err(petsc_err!(ARG_WRONGSTATE, "Vector array is already borrowed"));
        }
        self.writer.set(true);
        Ok(())
    }

    pub(crate) fn release_read(&self) {
        self.readers.set(self.readers.get().saturating_sub(1));
    }

    pub(crate) fn release_write(&self) {
        self.writer.set(false);
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.writer.get() || self.readers.get() > 0
    }
}

#[derive(Debug, Default)]
pub(crate) struct VecData {
    pub(crate) hdr: PetscHeader,
    pub(crate) map: Option<Layout>,
    pub(crate) sizes: (Option<PetscInt>, Option<PetscInt>),
    array: Vec<PetscScalar>,
    lock: ArrayLock,
    stash: Vec<(PetscInt, PetscScalar)>,
    stash_mode: Option<InsertMode>,
    pending: Option<(Exchange<Vec<(PetscInt, PetscScalar)>>, InsertMode)>,
    pub(crate) state: u64,
    norm_cache: Cell<Option<(u64, NormType, PetscReal)>>,
}

impl VecData {
    /// A set up vector with the given layout and values.
    pub(crate) fn with_layout(map: Layout, array: Vec<PetscScalar>) -> crate::Result<Self> {
        if array.len() != map.n as usize {
            return Err(petsc_err!(ARG_SIZ, "Array of length {} does not match local size {}", array.len(), map.n));
        }
        Ok(VecData {
            hdr: PetscHeader::new(ClassId::Vec)?,
            sizes: (Some(map.n), Some(map.big_n)),
            map: Some(map),
            array,
            ..Default::default()
        })
    }

    pub(crate) fn layout(&self) -> crate::Result<&Layout> {
        check_valid(&self.hdr, "Vec")?;
        self.map.as_ref().ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "Vector sizes not set, call set_sizes() and set_up() first"))
    }

    pub(crate) fn local(&self) -> &[PetscScalar] {
        &self.array
    }

    pub(crate) fn local_mut(&mut self) -> &mut [PetscScalar] {
        self.touch();
        &mut self.array
    }

    fn touch(&mut self) {
        self.state += 1;
    }

    fn check_unlocked(&self) -> crate::Result<()> {
        if self.lock.is_locked() {
            Err(petsc_err!(ARG_WRONGSTATE, "Vector is locked by an outstanding view"))
        } else {
            Ok(())
        }
    }
}

fn check_compatible(x: &VecData, y: &VecData) -> crate::Result<()> {
    let (xm, ym) = (x.layout()?, y.layout()?);
    if !xm.compatible(ym) {
        return Err(petsc_err!(ARG_INCOMP, "Incompatible vector global lengths parameter # 1 global size {} != parameter # 2 global size {} (local sizes {} and {})",
            xm.big_n, ym.big_n, xm.n, ym.n));
    }
    Ok(())
}

/// Only single-process vectors keep their norm cached, every process of a parallel vector
/// always takes part in the reduction.
fn cacheable(map: &Layout, comm: &Communicator) -> bool {
    map.seq || comm.size() == 1
}

pub(crate) fn create(_comm: &Communicator) -> crate::Result<VecData> {
    Ok(VecData { hdr: PetscHeader::new(ClassId::Vec)?, ..Default::default() })
}

/// A vector private to this process.
pub(crate) fn create_seq(comm: &Communicator, n: PetscInt) -> crate::Result<VecData> {
    VecData::with_layout(Layout::sequential(comm, n)?, vec![0.0; n.max(0) as usize])
}

pub(crate) fn destroy(v: &mut VecData) -> crate::Result<()> {
    if v.lock.is_locked() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Vector destroyed while its array is borrowed"));
    }
    *v = VecData::default();
    Ok(())
}

pub(crate) fn set_sizes(_comm: &Communicator, v: &mut VecData, local: Option<PetscInt>, global: Option<PetscInt>) -> crate::Result<()> {
    check_valid(&v.hdr, "Vec")?;
    if v.map.is_some() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Cannot change/reset vector sizes to {:?} global {:?} after set up", local, global));
    }
    v.sizes = (local, global);
    Ok(())
}

/// Builds the layout and allocates the storage. Collective, does nothing if already set up.
pub(crate) fn set_up(comm: &Communicator, v: &mut VecData) -> crate::Result<()> {
    check_valid(&v.hdr, "Vec")?;
    if v.map.is_some() {
        return Ok(());
    }
    let map = Layout::setup(comm, v.sizes.0, v.sizes.1)?;
    v.array = vec![0.0; map.n as usize];
    v.sizes = (Some(map.n), Some(map.big_n));
    v.map = Some(map);
    Ok(())
}

pub(crate) fn set_from_options(comm: &Communicator, v: &mut VecData) -> crate::Result<()> {
    check_valid(&v.hdr, "Vec")?;
    if v.map.is_none() && (v.sizes.0.is_some() || v.sizes.1.is_some()) {
        set_up(comm, v)?;
    }
    Ok(())
}

pub(crate) fn duplicate(_comm: &Communicator, v: &VecData) -> crate::Result<VecData> {
    let map = v.layout()?.clone();
    let n = map.n as usize;
    VecData::with_layout(map, vec![0.0; n])
}

pub(crate) fn copy(_comm: &Communicator, y: &mut VecData, x: &VecData) -> crate::Result<()> {
    check_compatible(x, y)?;
    y.array.copy_from_slice(&x.array);
    y.touch();
    Ok(())
}

pub(crate) fn get_local_size(_comm: &Communicator, v: &VecData) -> crate::Result<PetscInt> {
    Ok(v.layout()?.n)
}

pub(crate) fn get_global_size(_comm: &Communicator, v: &VecData) -> crate::Result<PetscInt> {
    Ok(v.layout()?.big_n)
}

pub(crate) fn get_ownership_range(_comm: &Communicator, v: &VecData) -> crate::Result<std::ops::Range<PetscInt>> {
    let map = v.layout()?;
    Ok(map.rstart..map.rend)
}

pub(crate) fn get_ownership_ranges(_comm: &Communicator, v: &VecData) -> crate::Result<Vec<std::ops::Range<PetscInt>>> {
    Ok(v.layout()?.ownership_ranges())
}

/// Borrows the local part for reading. Release with [`ArrayLock::release_read()`].
pub(crate) fn get_array_read<'v>(_comm: &Communicator, v: &'v VecData) -> crate::Result<(&'v [PetscScalar], &'v ArrayLock)> {
    v.layout()?;
    v.lock.acquire_read()?;
    Ok((&v.array, &v.lock))
}

/// Borrows the local part for writing. Release with [`ArrayLock::release_write()`].
pub(crate) fn get_array_mut<'v>(_comm: &Communicator, v: &'v mut VecData) -> crate::Result<(&'v mut [PetscScalar], &'v ArrayLock)> {
    v.layout()?;
    v.lock.acquire_write()?;
    v.state += 1;
    let VecData { array, lock, .. } = v;
    Ok((array.as_mut_slice(), &*lock))
}

// BLAS-1

macro_rules! vec_binary_op {
    ($( $(#[$att:meta])* $name:ident ( $($arg:ident : $ty:ty),* ) |$yi:ident, $xi:ident| $body:expr; )*) => {$(
        $(#[$att])*
        pub(crate) fn $name(_comm: &Communicator, y: &mut VecData, $($arg: $ty,)* x: &VecData) -> crate::Result<()> {
            check_compatible(x, y)?;
            y.check_unlocked()?;
            for ($yi, &$xi) in y.array.iter_mut().zip(x.array.iter()) {
                *$yi = $body;
            }
            y.touch();
            Ok(())
        }
    )*};
}

vec_binary_op! {
    /// y = alpha x + y
    axpy(alpha: PetscScalar) |yi, xi| alpha * xi + *yi;
    /// y = x + beta y
    aypx(beta: PetscScalar) |yi, xi| xi + beta * *yi;
    /// y = alpha x + beta y
    axpby(alpha: PetscScalar, beta: PetscScalar) |yi, xi| alpha * xi + beta * *yi;
}

/// z = alpha x + beta y + gamma z
pub(crate) fn axpbypcz(_comm: &Communicator, z: &mut VecData, alpha: PetscScalar, beta: PetscScalar, gamma: PetscScalar,
    x: &VecData, y: &VecData) -> crate::Result<()>
{
    check_compatible(x, z)?;
    check_compatible(y, z)?;
    z.check_unlocked()?;
    for ((zi, &xi), &yi) in z.array.iter_mut().zip(&x.array).zip(&y.array) {
        *zi = alpha * xi + beta * yi + gamma * *zi;
    }
    z.touch();
    Ok(())
}

macro_rules! vec_ternary_op {
    ($( $(#[$att:meta])* $name:ident ( $($arg:ident : $ty:ty),* ) |$xi:ident, $yi:ident| $body:expr; )*) => {$(
        $(#[$att])*
        pub(crate) fn $name(_comm: &Communicator, w: &mut VecData, $($arg: $ty,)* x: &VecData, y: &VecData) -> crate::Result<()> {
            check_compatible(x, w)?;
            check_compatible(y, w)?;
            w.check_unlocked()?;
            for ((wi, &$xi), &$yi) in w.array.iter_mut().zip(&x.array).zip(&y.array) {
                *wi = $body;
            }
            w.touch();
            Ok(())
        }
    )*};
}

vec_ternary_op! {
    /// w = alpha x + y
    waxpy(alpha: PetscScalar) |xi, yi| alpha * xi + yi;
    /// w = x .* y
    pointwise_mult() |xi, yi| xi * yi;
    /// w = x ./ y, where a zero in y gives a zero
    pointwise_divide() |xi, yi| if yi != 0.0 { xi / yi } else { 0.0 };
    pointwise_max() |xi, yi| xi.max(yi);
    pointwise_min() |xi, yi| xi.min(yi);
}

macro_rules! vec_unary_op {
    ($( $(#[$att:meta])* $name:ident ( $($arg:ident : $ty:ty),* ) |$xi:ident| $body:expr; )*) => {$(
        $(#[$att])*
        pub(crate) fn $name(_comm: &Communicator, x: &mut VecData, $($arg: $ty),*) -> crate::Result<()> {
            x.layout()?;
            x.check_unlocked()?;
            for $xi in x.array.iter_mut() {
                *$xi = $body;
            }
            x.touch();
            Ok(())
        }
    )*};
}

vec_unary_op! {
    scale(alpha: PetscScalar) |xi| alpha * *xi;
    shift(alpha: PetscScalar) |xi| *xi + alpha;
    set(alpha: PetscScalar) |_xi| alpha;
    abs() |xi| xi.abs();
    /// x = 1/x, zeros are left alone
    reciprocal() |xi| if *xi != 0.0 { 1.0 / *xi } else { 0.0 };
}

// Reductions

pub(crate) fn dot(comm: &Communicator, x: &VecData, y: &VecData) -> crate::Result<PetscScalar> {
    check_compatible(x, y)?;
    let local = x.array.iter().zip(&y.array).fold(0.0, |acc: PetscScalar, (a, b)| acc + a * b);
    reduce(comm, x, local, ReduceOp::Sum)
}

/// Same as [`dot()`] for real scalars.
pub(crate) fn tdot(comm: &Communicator, x: &VecData, y: &VecData) -> crate::Result<PetscScalar> {
    dot(comm, x, y)
}

pub(crate) fn sum(comm: &Communicator, x: &VecData) -> crate::Result<PetscScalar> {
    x.layout()?;
    // summing from +0.0 keeps empty parts from turning the total into -0.0
    reduce(comm, x, x.array.iter().fold(0.0, |acc: PetscScalar, v| acc + v), ReduceOp::Sum)
}

fn reduce<T: crate::comm::Reduce>(comm: &Communicator, x: &VecData, local: T, op: ReduceOp) -> crate::Result<T> {
    if x.layout()?.seq {
        Ok(local)
    } else {
        comm.all_reduce(local, op)
    }
}

pub(crate) fn norm(comm: &Communicator, x: &VecData, norm_type: NormType) -> crate::Result<PetscReal> {
    let map = x.layout()?;
    let cache = cacheable(map, comm);
    if cache {
        if let Some((state, ty, val)) = x.norm_cache.get() {
            if state == x.state && ty == norm_type {
                return Ok(val);
            }
        }
    }
    let val = match norm_type {
        NormType::NORM_1 => reduce(comm, x, x.array.iter().fold(0.0, |acc: PetscReal, v| acc + v.abs()), ReduceOp::Sum)?,
        NormType::NORM_2 | NormType::NORM_FROBENIUS =>
            reduce(comm, x, x.array.iter().fold(0.0, |acc: PetscReal, v| acc + v * v), ReduceOp::Sum)?.sqrt(),
        NormType::NORM_INFINITY => reduce(comm, x, x.array.iter().fold(0.0, |m: PetscReal, v| {
            if v.is_nan() || m.is_nan() { PetscReal::NAN } else { m.max(v.abs()) }
        }), ReduceOp::Max)?,
    };
    if cache {
        x.norm_cache.set(Some((x.state, norm_type, val)));
    }
    Ok(val)
}

/// Scales to unit 2-norm and returns the norm before scaling. A zero vector is left alone.
pub(crate) fn normalize(comm: &Communicator, x: &mut VecData) -> crate::Result<PetscReal> {
    let n2 = norm(comm, x, NormType::NORM_2)?;
    if n2 == 0.0 {
        log::info!("[{}] vector of zero norm can not be normalized, returning only the zero norm", comm.rank());
    } else {
        scale(comm, x, 1.0 / n2)?;
    }
    Ok(n2)
}

fn extremum(comm: &Communicator, x: &VecData, better: fn(PetscReal, PetscReal) -> bool, empty: PetscReal)
    -> crate::Result<(PetscInt, PetscReal)>
{
    let map = x.layout()?;
    let mut best = (-1, empty);
    for (i, &v) in x.array.iter().enumerate() {
        if best.0 < 0 || better(v, best.1) {
            best = (map.rstart + i as PetscInt, v);
        }
    }
    if map.seq {
        return Ok(best);
    }
    // ties go to the lowest global index, which is the first in rank order
    let all = comm.all_gather(best)?;
    Ok(all.into_iter().fold((-1, empty), |acc, cur| {
        if cur.0 >= 0 && (acc.0 < 0 || better(cur.1, acc.1)) { cur } else { acc }
    }))
}

/// The largest entry and its global index. An empty vector gives `(-1, -inf)`.
pub(crate) fn max(comm: &Communicator, x: &VecData) -> crate::Result<(PetscInt, PetscReal)> {
    extremum(comm, x, |a, b| a > b, PetscReal::NEG_INFINITY)
}

/// The smallest entry and its global index. An empty vector gives `(-1, inf)`.
pub(crate) fn min(comm: &Communicator, x: &VecData) -> crate::Result<(PetscInt, PetscReal)> {
    extremum(comm, x, |a, b| a < b, PetscReal::INFINITY)
}

// Insertion and assembly

pub(crate) fn set_values(_comm: &Communicator, x: &mut VecData, ix: &[PetscInt], y: &[PetscScalar], mode: InsertMode) -> crate::Result<()> {
    if ix.len() != y.len() {
        return Err(petsc_err!(ARG_SIZ, "Number of indices {} does not match number of values {}", ix.len(), y.len()));
    }
    let map = x.layout()?;
    let (rstart, big_n) = (map.rstart, map.big_n);
    let owned = map.rstart..map.rend;
    match (x.stash_mode, mode) {
        (Some(InsertMode::ADD_VALUES), InsertMode::INSERT_VALUES) =>
            return Err(petsc_err!(ARG_WRONGSTATE, "You have already added values; you cannot now insert")),
        (Some(InsertMode::INSERT_VALUES), InsertMode::ADD_VALUES) =>
            return Err(petsc_err!(ARG_WRONGSTATE, "You have already inserted values; you cannot now add")),
        _ => (),
    }
    x.check_unlocked()?;
    x.stash_mode = Some(mode);

    for (&i, &val) in ix.iter().zip(y) {
        if i < 0 {
            continue;
        }
        if i >= big_n {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Out of range index value {} maximum {}", i, big_n));
        }
        if owned.contains(&i) {
            mode.apply(&mut x.array[(i - rstart) as usize], val);
        } else {
            x.stash.push((i, val));
        }
    }
    x.touch();
    Ok(())
}

pub(crate) fn get_values(_comm: &Communicator, x: &VecData, ix: &[PetscInt]) -> crate::Result<Vec<PetscScalar>> {
    let map = x.layout()?;
    ix.iter().map(|&i| {
        if i < 0 {
            Ok(0.0)
        } else if map.owns(i) {
            Ok(x.array[(i - map.rstart) as usize])
        } else {
            Err(petsc_err!(ARG_OUTOFRANGE, "Can only get local values, trying {} (owned range {}..{})", i, map.rstart, map.rend))
        }
    }).collect()
}

/// Sends stashed off-process entries to their owners. Collective.
pub(crate) fn assembly_begin(comm: &Communicator, x: &mut VecData) -> crate::Result<()> {
    let map = x.layout()?.clone();
    if x.pending.is_some() {
        return Err(petsc_err!(ARG_WRONGSTATE, "Vector assembly already begun, call assembly_end() first"));
    }
    if map.seq {
        return Ok(());
    }
    let nranks = map.nranks();
    let modes = comm.all_gather(x.stash_mode)?;
    let adds = modes.iter().any(|m| *m == Some(InsertMode::ADD_VALUES));
    let inserts = modes.iter().any(|m| *m == Some(InsertMode::INSERT_VALUES));
    if adds && inserts {
        return Err(petsc_err!(ARG_WRONGSTATE, "Some processors inserted values while others added"));
    }
    if !adds && !inserts {
        return Ok(());
    }
    let mode = if adds { InsertMode::ADD_VALUES } else { InsertMode::INSERT_VALUES };

    let mut outgoing = vec![vec![]; nranks];
    for (i, val) in x.stash.drain(..) {
        let owner = map.owner(i) as usize;
        outgoing[owner].push((i, val));
    }
    let exchange = comm.post_all_to_all(outgoing)?;
    x.pending = Some((exchange, mode));
    log::debug!("[{}] vector assembly begun", comm.rank());
    Ok(())
}

pub(crate) fn assembly_end(comm: &Communicator, x: &mut VecData) -> crate::Result<()> {
    let rstart = x.layout()?.rstart;
    if let Some((exchange, mode)) = x.pending.take() {
        for (i, val) in comm.complete(exchange)?.into_iter().flatten() {
            mode.apply(&mut x.array[(i - rstart) as usize], val);
        }
    }
    x.stash.clear();
    x.stash_mode = None;
    x.touch();
    Ok(())
}
