//! How the entries of a distributed object are split between the processes.

use crate::comm::{Communicator, Rank};
use crate::PetscInt;

/// A contiguous split of `[0, big_n)` in rank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    pub n: PetscInt,
    pub big_n: PetscInt,
    pub rstart: PetscInt,
    pub rend: PetscInt,
    /// `range[r]..range[r+1]` is owned by rank `r`.
    pub range: Vec<PetscInt>,
    /// Sequential layouts are private to one process.
    pub seq: bool,
    pub rank: Rank,
}

/// The local size rank `rank` gets when `big_n` entries are split over `size` processes.
pub(crate) fn split_ownership(big_n: PetscInt, size: Rank, rank: Rank) -> PetscInt {
    let size = size as PetscInt;
    let rank = rank as PetscInt;
    big_n / size + if big_n % size > rank { 1 } else { 0 }
}

impl Layout {
    /// Computes the layout from the local and/or global size. Collective.
    ///
    /// `None` lets the size be decided from the other one.
    pub(crate) fn setup(comm: &Communicator, local: Option<PetscInt>, global: Option<PetscInt>) -> crate::Result<Self> {
        let n = match (local, global) {
            (None, None) => Err(petsc_err!(ARG_WRONG, "Both local and global sizes cannot be PETSC_DECIDE")),
            (Some(n), _) if n < 0 => Err(petsc_err!(ARG_OUTOFRANGE, "Local size {} cannot be negative", n)),
            (_, Some(big_n)) if big_n < 0 => Err(petsc_err!(ARG_OUTOFRANGE, "Global size {} cannot be negative", big_n)),
            (Some(n), _) => Ok(n),
            (None, Some(big_n)) => Ok(split_ownership(big_n, comm.size(), comm.rank())),
        };
        let n = comm.agree(n)?;

        let all = comm.all_gather((n, global))?;
        let mut range = Vec::with_capacity(all.len() + 1);
        range.push(0);
        for (local_n, _) in &all {
            range.push(range[range.len() - 1] + local_n);
        }
        let sum = range[all.len()];
        for (rank, (_, other_global)) in all.iter().enumerate() {
            if let Some(big_n) = other_global {
                if *big_n != sum {
                    return Err(petsc_err!(ARG_INCOMP,
                        "Sum of local lengths {} does not equal global length {}, rank {} has local length {}",
                        sum, big_n, rank, all[rank].0));
                }
            }
        }

        let rank = comm.rank() as usize;
        Ok(Layout { n, big_n: sum, rstart: range[rank], rend: range[rank + 1], range, seq: false, rank: comm.rank() })
    }

    /// A layout owned entirely by this process.
    pub(crate) fn sequential(comm: &Communicator, n: PetscInt) -> crate::Result<Self> {
        if n < 0 {
            return Err(petsc_err!(ARG_OUTOFRANGE, "Local size {} cannot be negative", n));
        }
        Ok(Layout { n, big_n: n, rstart: 0, rend: n, range: vec![0, n], seq: true, rank: comm.rank() })
    }

    /// The rank owning global index `idx`, which must be in `[0, big_n)`.
    pub(crate) fn owner(&self, idx: PetscInt) -> Rank {
        if self.seq {
            return self.rank;
        }
        (self.range.partition_point(|&r| r <= idx) - 1) as Rank
    }

    #[inline]
    pub(crate) fn owns(&self, idx: PetscInt) -> bool {
        self.rstart <= idx && idx < self.rend
    }

    /// The number of ranks the layout is split over.
    pub(crate) fn nranks(&self) -> usize {
        self.range.len() - 1
    }

    /// Same local and global sizes.
    pub(crate) fn compatible(&self, other: &Layout) -> bool {
        self.n == other.n && self.big_n == other.big_n
    }

    pub(crate) fn ownership_ranges(&self) -> Vec<std::ops::Range<PetscInt>> {
        self.range.windows(2).map(|w| w[0]..w[1]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sums_to_global() {
        for big_n in 0..40 {
            for size in 1..7 {
                let total: PetscInt = (0..size).map(|r| split_ownership(big_n, size, r)).sum();
                assert_eq!(total, big_n);
            }
        }
        assert_eq!(split_ownership(10, 3, 0), 4);
        assert_eq!(split_ownership(10, 3, 2), 3);
    }

    #[test]
    fn owner_skips_empty_ranks() {
        let comm = Communicator::world();
        let mut layout = Layout::sequential(&comm, 5).unwrap();
        layout.seq = false;
        layout.range = vec![0, 3, 3, 5];
        assert_eq!(layout.owner(0), 0);
        assert_eq!(layout.owner(2), 0);
        assert_eq!(layout.owner(3), 2);
        assert_eq!(layout.owner(4), 2);
    }
}
