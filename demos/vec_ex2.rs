//! Builds a parallel vector with 1 component on the first process, 2 on the second, etc.
//! Then each process adds one to all elements except the last rank.
//!
//! Concepts: vectors^assembling vectors;
//! Processors: n
//!
//! The processes are simulated with threads, `-procs <n>` sets how many.
//!
//! To run:
//! ```text
//! $ cargo run --example vec-ex2
//! $ cargo run --example vec-ex2 -- -procs 5
//! ```

static HELP_MSG: &str = "Builds a parallel vector with 1 component on the first processor, 2 on the second, etc.\n\
    Then each processor adds one to all elements except the last rank.\n\n";

use petsc_raii::prelude::*;
use petsc_raii::options::OptionsDb;

fn run(petsc: &Petsc) -> petsc_raii::Result<()> {
    let rank = petsc.world().rank() as PetscInt;

    let mut x = petsc.vec_create()?;
    x.set_sizes(Some(rank+1), None)?;
    x.set_from_options()?;
    x.set_up()?;
    let size = x.get_global_size()?;
    x.set_all(1.0)?;

    x.assemble_with((0..size-rank).map(|i| (i, 1.0)), InsertMode::ADD_VALUES)?;

    let viewer = Viewer::create_ascii_stdout(petsc.world())?;
    x.view_with(&viewer)
}

fn main() -> petsc_raii::Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    let mut options = OptionsDb::default();
    options.insert_args(args.iter().cloned());
    let procs = options.get_int("-procs")?.unwrap_or(2).max(1) as usize;

    let results = comm::run_group(procs, |world| -> petsc_raii::Result<()> {
        let petsc = Petsc::builder()
            .world(world)
            .args(args.iter().cloned())
            .help_msg(HELP_MSG)
            .init()?;
        run(&petsc)
    });

    for res in results {
        match res {
            Ok(res) => res?,
            Err(_) => return Err(PetscError::new(PetscErrorKind::PETSC_ERROR_PLIB, "a process panicked")),
        }
    }
    Ok(())
}
