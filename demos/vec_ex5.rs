//! Views a few entries of a parallel vector through an index set.
//!
//! Concepts: vectors^sub-vectors;
//! Concepts: index sets^creating general index sets;
//! Processors: n
//!
//! The processes are simulated with threads, `-procs <n>` sets how many.
//!
//! To run:
//! ```text
//! $ cargo run --example vec-ex5
//! $ cargo run --example vec-ex5 -- -procs 3
//! ```

static HELP_MSG: &str = "Views a few entries of a parallel vector through an index set.\n\n";

use petsc_raii::prelude::*;
use petsc_raii::options::OptionsDb;

fn fill_vector(vec: &mut Vector) -> petsc_raii::Result<()> {
    petsc_println!(vec.world(), "Vector:")?;

    {
        let mut view = vec.view_mut()?;
        for (i, v) in view.global_indexed_iter_mut() {
            *v = i as PetscScalar;
        }
    }
    vec.view_with(None)
}

/// Each process picks three of its own entries, starting `rank + 1` past its first one.
/// A process that owns nothing picks nothing.
fn local_indices(vec: &Vector) -> petsc_raii::Result<Vec<PetscInt>> {
    let rank = vec.world().rank() as PetscInt;
    let range = vec.get_ownership_range()?;
    if range.is_empty() {
        return Ok(vec![]);
    }
    Ok((1..=3).map(|d| (range.start + rank + d).min(range.end - 1)).collect())
}

fn view_subvector(vec: &mut Vector, is: &IS) -> petsc_raii::Result<()> {
    petsc_println!(vec.world(), "\nSubVector:")?;

    let sub = vec.get_sub_vector(is)?;
    sub.view_with(None)
}

fn run(petsc: &Petsc) -> petsc_raii::Result<()> {
    let world = petsc.world();
    let mut x = Vector::from_global_size(world, 9, "x")?;
    fill_vector(&mut x)?;

    let indices = local_indices(&x)?;
    let mut is = IS::create(world)?;
    is.set_type(ISType::ISGENERAL)?;
    is.general_set_indices(&indices, CopyMode::PETSC_COPY_VALUES)?;
    {
        let idx = is.get_indices()?;
        let lines = idx.iter().map(|i| format!("{}\n", i)).collect::<String>();
        petsc_println_sync!(world, "\nPrinting indices directly, process [{}]\n{}", world.rank(), lines.trim_end())?;
    }

    view_subvector(&mut x, &is)
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
