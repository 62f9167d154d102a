//! Per-process state: the options database and the registry of live objects.
//!
//! Each simulated process is one thread, so the state is thread local.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::ClassId;
use crate::comm::Rank;
use crate::options::OptionsDb;

struct SysState {
    options: OptionsDb,
    live: BTreeMap<ClassId, usize>,
    next_id: u64,
    rank: Rank,
}

thread_local! {
    static STATE: RefCell<Option<SysState>> = RefCell::new(None);
}

pub(crate) fn initialize(rank: Rank, options: OptionsDb) -> crate::Result<()> {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.is_some() {
            return Err(petsc_err!(ARG_WRONGSTATE, "PetscInitialize() has already been called on this process"));
        }
        *state = Some(SysState { options, live: BTreeMap::new(), next_id: 0, rank });
        Ok(())
    })
}

/// Tears down the state and returns the count of objects per class that are still alive,
/// or `None` if the process was not initialized.
pub(crate) fn finalize() -> Option<Vec<(&'static str, usize)>> {
    STATE.with(|state| state.borrow_mut().take()).map(|state| {
        state.live.into_iter()
            .filter(|&(_, count)| count > 0)
            .map(|(class, count)| (class.name(), count))
            .collect()
    })
}

pub(crate) fn rank() -> Rank {
    STATE.with(|state| state.borrow().as_ref().map_or(0, |s| s.rank))
}

pub(crate) fn register(class: ClassId) -> crate::Result<u64> {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let state = state.as_mut()
            .ok_or_else(|| petsc_err!(ARG_WRONGSTATE, "PetscInitialize() must be called before creating a {}", class.name()))?;
        state.next_id += 1;
        *state.live.entry(class).or_default() += 1;
        Ok(state.next_id)
    })
}

pub(crate) fn unregister(class: ClassId) {
    // Objects released after finalize were already reported as leaks.
    STATE.with(|state| {
        if let Some(state) = state.borrow_mut().as_mut() {
            if let Some(count) = state.live.get_mut(&class) {
                *count = count.saturating_sub(1);
            }
        }
    })
}

#[cfg(test)]
pub(crate) fn live_count(class: ClassId) -> usize {
    STATE.with(|state| state.borrow().as_ref().and_then(|s| s.live.get(&class).copied()).unwrap_or(0))
}

/// Runs `f` on the options database. An uninitialized process has an empty database.
pub(crate) fn with_options<R>(f: impl FnOnce(&OptionsDb) -> R) -> R {
    STATE.with(|state| match state.borrow().as_ref() {
        Some(state) => f(&state.options),
        None => f(&OptionsDb::default()),
    })
}

/// Runs `f` on the options database. Changing options needs an initialized process.
pub(crate) fn with_options_mut<R>(f: impl FnOnce(&mut OptionsDb) -> R) -> crate::Result<R> {
    STATE.with(|state| match state.borrow_mut().as_mut() {
        Some(state) => Ok(f(&mut state.options)),
        None => Err(petsc_err!(ARG_WRONGSTATE, "PetscInitialize() must be called before setting options")),
    })
}
