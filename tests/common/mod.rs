//! Helpers shared by the integration tests.

#![allow(dead_code)]

use petsc_raii::prelude::*;

/// Runs `f` on every rank of a simulated group of `size` processes, each with its own
/// [`Petsc`], and returns the results in rank order.
///
/// Panics if any rank panics or returns an error.
pub fn on_group<F, R>(size: usize, f: F) -> Vec<R>
where
    F: Fn(&Petsc) -> petsc_raii::Result<R> + Sync,
    R: Send,
{
    comm::run_group(size, |world| {
        let petsc = Petsc::builder().world(world).init()?;
        f(&petsc)
    })
    .into_iter()
    .enumerate()
    .map(|(rank, res)| match res {
        Ok(Ok(val)) => val,
        Ok(Err(err)) => panic!("rank {} failed:\n{}", rank, err),
        Err(_) => panic!("rank {} panicked", rank),
    })
    .collect()
}

/// Same as [`on_group`] but returns the error kind of each rank instead of panicking on errors.
pub fn on_group_err<F, R>(size: usize, f: F) -> Vec<std::result::Result<R, PetscErrorKind>>
where
    F: Fn(&Petsc) -> petsc_raii::Result<R> + Sync,
    R: Send,
{
    comm::run_group(size, |world| {
        let petsc = Petsc::builder().world(world).init()?;
        f(&petsc)
    })
    .into_iter()
    .enumerate()
    .map(|(rank, res)| match res {
        Ok(res) => res.map_err(|err| err.kind()),
        Err(_) => panic!("rank {} panicked", rank),
    })
    .collect()
}

/// A path in the temp directory that is unique to this test process.
pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("petsc-raii-{}-{}", std::process::id(), name))
}
