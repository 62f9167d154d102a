//! Communication between the processes of a group.
//!
//! A [`Communicator`] is one participant's handle on a group of processes. Objects created on it
//! are distributed over every process in the group, and collective operations must be called by
//! every process in the same order.
//!
//! The group can be simulated inside a single program with [`run_group()`], which runs one thread
//! per rank:
//!
//! ```
//! use petsc_raii::comm::{self, ReduceOp};
//!
//! let sums = comm::run_group(3, |world| {
//!     world.all_reduce(world.rank() + 1, ReduceOp::Sum).unwrap()
//! });
//! for sum in sums {
//!     assert_eq!(sum.unwrap(), 6);
//! }
//! ```

use std::any::Any;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::{PetscError, Result};

/// Index of a process within a group.
pub type Rank = i32;

/// Reduction applied by [`Communicator::all_reduce()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

/// Values that can be combined by a reduction.
pub trait Reduce: Copy + Send + 'static {
    fn reduce(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reduce_int {
    ($($t:ty),*) => {$(
        impl Reduce for $t {
            #[inline]
            fn reduce(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Max => self.max(other),
                    ReduceOp::Min => self.min(other),
                }
            }
        }
    )*};
}

macro_rules! impl_reduce_float {
    ($($t:ty),*) => {$(
        impl Reduce for $t {
            // NaN wins so that every process sees a failure in any one of them.
            #[inline]
            fn reduce(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Max => if self.is_nan() || other.is_nan() { <$t>::NAN } else { self.max(other) },
                    ReduceOp::Min => if self.is_nan() || other.is_nan() { <$t>::NAN } else { self.min(other) },
                }
            }
        }
    )*};
}

impl_reduce_int!(i32, i64, u32, u64, usize);
impl_reduce_float!(f32, f64);

impl Reduce for bool {
    #[inline]
    fn reduce(self, other: Self, op: ReduceOp) -> Self {
        match op {
            ReduceOp::Sum | ReduceOp::Max => self || other,
            ReduceOp::Min => self && other,
        }
    }
}

impl<A: Reduce, B: Reduce> Reduce for (A, B) {
    #[inline]
    fn reduce(self, other: Self, op: ReduceOp) -> Self {
        (self.0.reduce(other.0, op), self.1.reduce(other.1, op))
    }
}

struct Envelope {
    op: &'static str,
    payload: Box<dyn Any + Send>,
}

#[derive(Default)]
struct Mailbox {
    queues: HashMap<(Rank, Rank, u64), VecDeque<Envelope>>,
    departed: Vec<bool>,
    aborted: Option<(Rank, i32)>,
}

struct Group {
    size: Rank,
    mailbox: Mutex<Mailbox>,
    arrived: Condvar,
    simulated: bool,
}

impl Group {
    fn new(size: usize, simulated: bool) -> Self {
        Group {
            size: size as Rank,
            mailbox: Mutex::new(Mailbox { departed: vec![false; size], ..Default::default() }),
            arrived: Condvar::new(),
            simulated,
        }
    }

    fn depart(&self, rank: Rank, failed: bool) {
        let mut mailbox = self.mailbox.lock();
        mailbox.departed[rank as usize] = true;
        if failed && mailbox.aborted.is_none() {
            mailbox.aborted = Some((rank, 1));
        }
        drop(mailbox);
        self.arrived.notify_all();
    }
}

/// Marks a simulated rank as gone when its thread finishes, so that no peer waits on it forever.
struct Departure {
    group: Arc<Group>,
    rank: Rank,
}

impl Drop for Departure {
    fn drop(&mut self) {
        let failed = std::thread::panicking();
        if failed {
            log::error!("[{}] rank panicked, aborting the group", self.rank);
        }
        self.group.depart(self.rank, failed);
    }
}

/// One process's handle on a group of processes.
pub struct Communicator {
    group: Arc<Group>,
    rank: Rank,
    seq: Cell<u64>,
}

/// An all-to-all exchange that was started with [`Communicator::post_all_to_all()`]
/// and has not been completed yet.
#[derive(Debug)]
pub struct Exchange<T> {
    tag: u64,
    own: T,
}

const USER_TAG_BIT: u64 = 1 << 63;

impl Communicator {
    fn new(group: Arc<Group>, rank: Rank) -> Self {
        Communicator { group, rank, seq: Cell::new(0) }
    }

    /// A group made of only this process.
    pub fn world() -> Self {
        Communicator::new(Arc::new(Group::new(1, false)), 0)
    }

    /// The rank of this process in the group.
    #[inline]
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// The number of processes in the group.
    #[inline]
    pub fn size(&self) -> Rank {
        self.group.size
    }

    fn next_tag(&self) -> u64 {
        let tag = self.seq.get() + 1;
        self.seq.set(tag);
        tag
    }

    fn post<T: Send + 'static>(&self, dst: Rank, tag: u64, op: &'static str, value: T) -> Result<()> {
        let mut mailbox = self.group.mailbox.lock();
        if let Some((rank, code)) = mailbox.aborted {
            return Err(petsc_err!(MPI, "process group was aborted by rank {} with error code {}", rank, code));
        }
        mailbox.queues.entry((self.rank, dst, tag)).or_default()
            .push_back(Envelope { op, payload: Box::new(value) });
        drop(mailbox);
        self.group.arrived.notify_all();
        Ok(())
    }

    fn wait<T: 'static>(&self, src: Rank, tag: u64, op: &'static str) -> Result<T> {
        let key = (src, self.rank, tag);
        let mut mailbox = self.group.mailbox.lock();
        let envelope = loop {
            if let Some((rank, code)) = mailbox.aborted {
                return Err(petsc_err!(MPI, "process group was aborted by rank {} with error code {}", rank, code));
            }
            if let Some(envelope) = mailbox.queues.get_mut(&key).and_then(VecDeque::pop_front) {
                if mailbox.queues.get(&key).map_or(false, VecDeque::is_empty) {
                    mailbox.queues.remove(&key);
                }
                break envelope;
            }
            if mailbox.departed[src as usize] {
                return Err(petsc_err!(MPI, "rank {} exited before sending the message rank {} waits for in {}",
                    src, self.rank, op));
            }
            self.group.arrived.wait(&mut mailbox);
        };
        drop(mailbox);

        if envelope.op != op {
            return Err(petsc_err!(MPI, "collective mismatch: rank {} called {} while rank {} called {}",
                self.rank, op, src, envelope.op));
        }
        envelope.payload.downcast::<T>()
            .map(|b| *b)
            .map_err(|_| petsc_err!(MPI, "collective mismatch: rank {} sent a different type in {}", src, op))
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank < 0 || rank >= self.size() {
            Err(petsc_err!(ARG_OUTOFRANGE, "rank {} is not in the group of size {}", rank, self.size()))
        } else {
            Ok(())
        }
    }

    /// Every process gets every process's value, in rank order.
    pub fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        let tag = self.next_tag();
        for dst in (0..self.size()).filter(|&r| r != self.rank) {
            self.post(dst, tag, "all_gather", value.clone())?;
        }
        let mut own = Some(value);
        (0..self.size()).map(|src| {
            if src == self.rank {
                own.take().ok_or_else(|| petsc_err!(PLIB, "own value already taken"))
            } else {
                self.wait(src, tag, "all_gather")
            }
        }).collect()
    }

    /// Combines the value of every process. Every process gets the same result, the values are
    /// combined in rank order.
    pub fn all_reduce<T: Reduce>(&self, value: T, op: ReduceOp) -> Result<T> {
        let all = self.all_gather(value)?;
        Ok(all.into_iter().reduce(|a, b| a.reduce(b, op)).unwrap_or(value))
    }

    /// Combines the values of the processes with lower ranks. The first process gets `None`.
    pub fn exclusive_scan<T: Reduce>(&self, value: T, op: ReduceOp) -> Result<Option<T>> {
        let all = self.all_gather(value)?;
        Ok(all.into_iter().take(self.rank as usize).reduce(|a, b| a.reduce(b, op)))
    }

    /// Sends `values[r]` to rank `r` and returns what every rank sent to this one, in rank order.
    pub fn all_to_all<T: Send + 'static>(&self, values: Vec<T>) -> Result<Vec<T>> {
        let exchange = self.post_all_to_all(values)?;
        self.complete(exchange)
    }

    /// Starts an all-to-all exchange. Other collectives can be called before it is completed
    /// with [`Communicator::complete()`].
    pub fn post_all_to_all<T: Send + 'static>(&self, values: Vec<T>) -> Result<Exchange<T>> {
        if values.len() != self.size() as usize {
            return Err(petsc_err!(ARG_SIZ, "all_to_all needs one value per rank, got {} for {} ranks",
                values.len(), self.size()));
        }
        let tag = self.next_tag();
        let mut own = None;
        for (dst, value) in values.into_iter().enumerate() {
            let dst = dst as Rank;
            if dst == self.rank {
                own = Some(value);
            } else {
                self.post(dst, tag, "all_to_all", value)?;
            }
        }
        let own = own.ok_or_else(|| petsc_err!(PLIB, "no value for own rank"))?;
        Ok(Exchange { tag, own })
    }

    /// Finishes an exchange started with [`Communicator::post_all_to_all()`].
    pub fn complete<T: Send + 'static>(&self, exchange: Exchange<T>) -> Result<Vec<T>> {
        let Exchange { tag, own } = exchange;
        let mut own = Some(own);
        (0..self.size()).map(|src| {
            if src == self.rank {
                own.take().ok_or_else(|| petsc_err!(PLIB, "own value already taken"))
            } else {
                self.wait(src, tag, "all_to_all")
            }
        }).collect()
    }

    /// Sends the value of `root` to every process. Only `root` has to give a value.
    pub fn broadcast<T: Clone + Send + 'static>(&self, root: Rank, value: Option<T>) -> Result<T> {
        self.check_rank(root)?;
        let tag = self.next_tag();
        let value = if self.rank == root {
            for dst in (0..self.size()).filter(|&r| r != root) {
                self.post(dst, tag, "broadcast", value.clone())?;
            }
            value
        } else {
            self.wait::<Option<T>>(root, tag, "broadcast")?
        };
        value.ok_or_else(|| petsc_err!(ARG_NULL, "rank {} did not give a value to broadcast", root))
    }

    /// Collects the value of every process on `root`, in rank order. Other processes get `None`.
    pub fn gather<T: Send + 'static>(&self, root: Rank, value: T) -> Result<Option<Vec<T>>> {
        self.check_rank(root)?;
        let tag = self.next_tag();
        if self.rank != root {
            self.post(root, tag, "gather", value)?;
            return Ok(None);
        }
        let mut own = Some(value);
        let all = (0..self.size()).map(|src| {
            if src == self.rank {
                own.take().ok_or_else(|| petsc_err!(PLIB, "own value already taken"))
            } else {
                self.wait(src, tag, "gather")
            }
        }).collect::<Result<Vec<_>>>()?;
        Ok(Some(all))
    }

    /// Blocks until every process reached the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.all_gather(()).map(|_| ())
    }

    /// Sends a value to one process. Does not block.
    pub fn send<T: Send + 'static>(&self, dst: Rank, tag: u32, value: T) -> Result<()> {
        self.check_rank(dst)?;
        self.post(dst, USER_TAG_BIT | tag as u64, "send", value)
    }

    /// Receives a value sent by `src` with [`Communicator::send()`] using the same tag.
    /// Messages with the same source and tag arrive in the order they were sent.
    pub fn receive<T: Send + 'static>(&self, src: Rank, tag: u32) -> Result<T> {
        self.check_rank(src)?;
        self.wait(src, USER_TAG_BIT | tag as u64, "send")
    }

    /// Makes a local result collective: if any process has an error, every process returns an error.
    ///
    /// Processes that failed keep their own error, the others get an error naming the first rank
    /// that failed. This keeps processes from entering later collectives that a failed process will
    /// never join.
    pub fn agree<T>(&self, local: Result<T>) -> Result<T> {
        let summary = local.as_ref().err().map(|e| (e.kind(), e.message()));
        let all = self.all_gather(summary)?;
        match local {
            Err(err) => Err(err),
            Ok(val) => match all.into_iter().enumerate().find_map(|(r, s)| s.map(|s| (r, s))) {
                Some((rank, (kind, msg))) => Err(PetscError::new(kind, format!("rank {} failed: {}", rank, msg))),
                None => Ok(val),
            },
        }
    }

    /// Aborts every process in the group with the given error code.
    ///
    /// Processes blocked in communication with this one return an error. When the group is
    /// simulated with [`run_group()`] the calling thread panics, otherwise the process exits.
    pub fn abort(&self, code: i32) -> ! {
        {
            let mut mailbox = self.group.mailbox.lock();
            if mailbox.aborted.is_none() {
                mailbox.aborted = Some((self.rank, code));
            }
        }
        self.group.arrived.notify_all();
        log::error!("[{}] aborting with error code {}", self.rank, code);
        if self.group.simulated {
            panic!("rank {} aborted the process group with error code {}", self.rank, code);
        }
        std::process::exit(code)
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator").field("rank", &self.rank).field("size", &self.group.size).finish()
    }
}

/// Runs `f` on `size` ranks of a new group, one thread per rank, and returns the result of
/// each rank in rank order.
///
/// A rank that panics aborts the group, so the others return errors instead of waiting on it.
///
/// ```
/// use petsc_raii::comm;
///
/// let res = comm::run_group(2, |world| {
///     if world.rank() == 0 {
///         world.send(1, 7, String::from("hello")).unwrap();
///         None
///     } else {
///         Some(world.receive::<String>(0, 7).unwrap())
///     }
/// });
/// assert_eq!(res[1].as_ref().unwrap().as_deref(), Some("hello"));
/// ```
pub fn run_group<F, R>(size: usize, f: F) -> Vec<std::thread::Result<R>>
where
    F: Fn(Communicator) -> R + Sync,
    R: Send,
{
    let group = Arc::new(Group::new(size.max(1), true));
    let f = &f;
    std::thread::scope(|s| {
        let handles = (0..size).map(|rank| {
            let comm = Communicator::new(group.clone(), rank as Rank);
            let spawned = std::thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn_scoped(s, move || {
                    let _departure = Departure { group: comm.group.clone(), rank: comm.rank };
                    f(comm)
                });
            if spawned.is_err() {
                group.depart(rank as Rank, true);
            }
            spawned
        }).collect::<Vec<_>>();

        handles.into_iter().map(|handle| match handle {
            Ok(handle) => handle.join(),
            Err(err) => Err(Box::new(format!("could not spawn rank thread: {}", err)) as Box<dyn Any + Send>),
        }).collect()
    })
}

