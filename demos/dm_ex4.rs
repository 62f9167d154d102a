//! Fills a vector of a 3D grid, saves it to a binary file with MPI-IO and loads it back.
//!
//! Concepts: DMDA^using distributed arrays;
//! Concepts: viewers^MPI-IO binary files;
//! Processors: n
//!
//! The processes are simulated with threads, `-procs <n>` sets how many.
//!
//! To run:
//! ```text
//! $ cargo run --example dm-ex4
//! $ cargo run --example dm-ex4 -- -procs 4 -da_grid_x 6
//! ```

static HELP_MSG: &str = "Saves a vector of a 3D grid to a binary file with MPI-IO and loads it back.\n\n";

use petsc_raii::prelude::*;
use petsc_raii::options::OptionsDb;

const OUTPUT_FILENAME: &str = "ex4_out";

/// Sets every point to its index in the natural ordering of the grid.
fn fill_vector<'a>(dm: &DM<'a>, vec: &mut Vector<'a>) -> petsc_raii::Result<()> {
    let (xs, ys, zs, _, _, _) = dm.da_get_corners()?;
    let (m, n, _) = dm.da_get_sizes()?;
    let dof = dm.da_get_info()?.dof;

    let mut view = dm.da_vec_view_mut(vec)?;
    for (pat, v) in view.indexed_iter_mut() {
        // the first axis holds x and the degrees of freedom
        let (ixl, j, k) = (pat[0] as PetscInt, pat[1] as PetscInt + ys, pat[2] as PetscInt + zs);
        let (i, l) = (ixl / dof + xs, ixl % dof);
        *v = (l + dof * (i + m * (j + n * k))) as PetscScalar;
    }
    Ok(())
}

fn save_backup(vec: &Vector) -> petsc_raii::Result<()> {
    let mut viewer = Viewer::binary_open(vec.world(), OUTPUT_FILENAME, FileMode::FILE_MODE_WRITE)?;
    viewer.binary_set_use_mpiio(true)?;
    viewer.binary_set_skip_info(true)?;
    viewer.binary_set_skip_header(true)?;

    vec.view_with(&viewer)
}

fn load_backup(vec: &mut Vector) -> petsc_raii::Result<()> {
    let mut viewer = Viewer::binary_open(vec.world(), OUTPUT_FILENAME, FileMode::FILE_MODE_READ)?;
    viewer.binary_set_use_mpiio(true)?;
    viewer.binary_set_skip_info(true)?;
    // must match the flags the file was written with
    viewer.binary_set_skip_header(true)?;

    vec.load(&viewer)
}

fn compare_vectors(lhs: &Vector, rhs: &Vector) -> petsc_raii::Result<()> {
    let world = lhs.world();
    petsc_println!(world, "Vectors comparison:")?;

    let (l_argmin, l_min) = lhs.min()?;
    let (l_argmax, l_max) = lhs.max()?;
    petsc_println!(world, "  min(a)     = {:+1.2e} [argmin {}]", l_min, l_argmin)?;
    petsc_println!(world, "  max(a)     = {:+1.2e} [argmax {}]", l_max, l_argmax)?;

    let (r_argmin, r_min) = rhs.min()?;
    let (r_argmax, r_max) = rhs.max()?;
    petsc_println!(world, "  min(b)     = {:+1.2e} [argmin {}]", r_min, r_argmin)?;
    petsc_println!(world, "  max(b)     = {:+1.2e} [argmax {}]", r_max, r_argmax)?;

    let mut diff = lhs.duplicate()?;
    diff.waxpy(-1.0, rhs, lhs)?;
    let diff = diff.norm(NormType::NORM_INFINITY)?;
    if diff > 1.0e-10 {
        petsc_println!(world, "  ERROR: max(|a-b|) > 1.0e-10")?;
        petsc_println!(world, "  max(|a-b|) = {:+1.10e}", diff)
    } else {
        petsc_println!(world, "  max(|a-b|) < 1.0e-10")
    }
}

fn run(petsc: &Petsc) -> petsc_raii::Result<()> {
    let mut dm = DM::da_create_3d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, DMBoundaryType::DM_BOUNDARY_NONE,
        DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_BOX, 2, 3, 4, None, None, None, 1, 1,
        None, None, None)?;
    dm.set_from_options()?;
    dm.set_up()?;

    let mut x = dm.create_global_vector()?;
    fill_vector(&dm, &mut x)?;

    save_backup(&x)?;

    let mut y = x.duplicate()?;
    load_backup(&mut y)?;

    compare_vectors(&x, &y)
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
        petsc.abort_on_error(run(&petsc));
        Ok(())
    });

    for res in results {
        match res {
            Ok(res) => res?,
            Err(_) => return Err(PetscError::new(PetscErrorKind::PETSC_ERROR_PLIB, "a process panicked")),
        }
    }
    Ok(())
}
