//! Gathers entries of a distributed array into a process-local buffer, and scatters them back.
//!
//! A scatter is built once from the global indices each local slot wants, and can then be run
//! any number of times. Running it is split into a begin and an end part so other work can
//! happen while the messages are in flight.

use super::layout::Layout;
use crate::comm::{Communicator, Exchange};
use crate::{InsertMode, PetscInt, PetscScalar};

#[derive(Debug, Default)]
pub(crate) struct Scatter {
    /// `(source offset, destination slot)` for entries owned by this process.
    local: Vec<(usize, usize)>,
    /// Destination slots filled by each rank, in the order that rank sends them.
    recv_slots: Vec<Vec<usize>>,
    /// Source offsets sent to each rank.
    send_idx: Vec<Vec<usize>>,
    seq: bool,
}

/// A scatter between its begin and end.
#[derive(Debug)]
pub(crate) struct ScatterPending {
    exchange: Option<Exchange<Vec<PetscScalar>>>,
    local: Vec<(usize, PetscScalar)>,
    mode: InsertMode,
    reverse: bool,
}

fn apply(dst: &mut [PetscScalar], slot: usize, val: PetscScalar, mode: InsertMode) {
    mode.apply(&mut dst[slot], val)
}

impl Scatter {
    /// Slot `i` of the destination wants entry `wanted[i]` of the source, negative entries are
    /// skipped. Collective unless the source layout is sequential.
    pub(crate) fn create(comm: &Communicator, layout: &Layout, wanted: &[PetscInt]) -> crate::Result<Self> {
        let nranks = layout.nranks().max(comm.size() as usize);
        let mut local = vec![];
        let mut requests: Vec<Vec<PetscInt>> = vec![vec![]; nranks];
        let mut recv_slots: Vec<Vec<usize>> = vec![vec![]; nranks];

        let mut check = Ok(());
        for (slot, &g) in wanted.iter().enumerate() {
            if g < 0 {
                continue;
            }
            if g >= layout.big_n {
                check = Err(petsc_err!(ARG_OUTOFRANGE, "Index {} is out of range [0, {})", g, layout.big_n));
                break;
            }
            let owner = layout.owner(g);
            if owner == comm.rank() || layout.seq {
                local.push(((g - layout.rstart) as usize, slot));
            } else {
                requests[owner as usize].push(g);
                recv_slots[owner as usize].push(slot);
            }
        }

        if layout.seq {
            check?;
            return Ok(Scatter { local, recv_slots: vec![], send_idx: vec![], seq: true });
        }
        comm.agree(check)?;

        let asked = comm.all_to_all(requests)?;
        let send_idx = asked.into_iter()
            .map(|idx| idx.into_iter().map(|g| (g - layout.rstart) as usize).collect())
            .collect();
        Ok(Scatter { local, recv_slots, send_idx, seq: false })
    }

    /// Starts moving `src` entries into destination slots.
    pub(crate) fn forward_begin(&self, comm: &Communicator, src: &[PetscScalar], mode: InsertMode) -> crate::Result<ScatterPending> {
        let local = self.local.iter().map(|&(o, slot)| (slot, src[o])).collect();
        let exchange = if self.seq {
            None
        } else {
            let outgoing = self.send_idx.iter()
                .map(|idx| idx.iter().map(|&o| src[o]).collect())
                .collect();
            Some(comm.post_all_to_all(outgoing)?)
        };
        Ok(ScatterPending { exchange, local, mode, reverse: false })
    }

    /// Finishes a forward scatter into the destination.
    pub(crate) fn forward_end(&self, comm: &Communicator, pending: ScatterPending, dst: &mut [PetscScalar]) -> crate::Result<()> {
        if pending.reverse {
            return Err(petsc_err!(ARG_WRONGSTATE, "Scatter was started in reverse mode"));
        }
        for (slot, val) in pending.local {
            apply(dst, slot, val, pending.mode);
        }
        if let Some(exchange) = pending.exchange {
            for (slots, vals) in self.recv_slots.iter().zip(comm.complete(exchange)?) {
                for (&slot, val) in slots.iter().zip(vals) {
                    apply(dst, slot, val, pending.mode);
                }
            }
        }
        Ok(())
    }

    /// Starts moving destination slots back to the source entries they came from.
    pub(crate) fn reverse_begin(&self, comm: &Communicator, dst: &[PetscScalar], mode: InsertMode) -> crate::Result<ScatterPending> {
        let local = self.local.iter().map(|&(o, slot)| (o, dst[slot])).collect();
        let exchange = if self.seq {
            None
        } else {
            let outgoing = self.recv_slots.iter()
                .map(|slots| slots.iter().map(|&s| dst[s]).collect())
                .collect();
            Some(comm.post_all_to_all(outgoing)?)
        };
        Ok(ScatterPending { exchange, local, mode, reverse: true })
    }

    /// Finishes a reverse scatter into the source.
    pub(crate) fn reverse_end(&self, comm: &Communicator, pending: ScatterPending, src: &mut [PetscScalar]) -> crate::Result<()> {
        if !pending.reverse {
            return Err(petsc_err!(ARG_WRONGSTATE, "Scatter was started in forward mode"));
        }
        for (o, val) in pending.local {
            apply(src, o, val, pending.mode);
        }
        if let Some(exchange) = pending.exchange {
            for (offsets, vals) in self.send_idx.iter().zip(comm.complete(exchange)?) {
                for (&o, val) in offsets.iter().zip(vals) {
                    apply(src, o, val, pending.mode);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn forward(&self, comm: &Communicator, src: &[PetscScalar], dst: &mut [PetscScalar], mode: InsertMode) -> crate::Result<()> {
        let pending = self.forward_begin(comm, src, mode)?;
        self.forward_end(comm, pending, dst)
    }

    pub(crate) fn reverse(&self, comm: &Communicator, dst: &[PetscScalar], src: &mut [PetscScalar], mode: InsertMode) -> crate::Result<()> {
        let pending = self.reverse_begin(comm, dst, mode)?;
        self.reverse_end(comm, pending, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm;

    #[test]
    fn gather_and_add_back() {
        let res = comm::run_group(2, |world| {
            let layout = Layout::setup(&world, None, Some(4)).unwrap();
            let src: Vec<PetscScalar> = (layout.rstart..layout.rend).map(|i| i as PetscScalar).collect();
            // each rank wants every entry, in reverse
            let scatter = Scatter::create(&world, &layout, &[3, 2, 1, 0, -1]).unwrap();
            let mut dst = vec![-7.0; 5];
            scatter.forward(&world, &src, &mut dst, InsertMode::INSERT_VALUES).unwrap();
            assert_eq!(dst, vec![3.0, 2.0, 1.0, 0.0, -7.0]);

            let mut back = vec![0.0; layout.n as usize];
            scatter.reverse(&world, &dst, &mut back, InsertMode::ADD_VALUES).unwrap();
            back
        });
        let back: Vec<Vec<PetscScalar>> = res.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(back, vec![vec![0.0, 2.0], vec![4.0, 6.0]]);
    }
}
