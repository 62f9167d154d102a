//! Takes one component of a 3D grid vector through an index set, saves it to a binary file
//! with MPI-IO and loads it back.
//!
//! Concepts: DMDA^using distributed arrays;
//! Concepts: vectors^sub-vectors;
//! Concepts: viewers^MPI-IO binary files;
//! Processors: n
//!
//! The processes are simulated with threads, `-procs <n>` sets how many.
//!
//! To run:
//! ```text
//! $ cargo run --example dm-ex6
//! $ cargo run --example dm-ex6 -- -procs 4
//! ```

static HELP_MSG: &str = "Saves one component of a vector of a 3D grid to a binary file with MPI-IO and loads it back.\n\n";

use petsc_raii::prelude::*;
use petsc_raii::options::OptionsDb;

const OUTPUT_FILENAME: &str = "ex6_out";

/// Sets every entry to its global index.
fn fill_vector(vec: &mut Vector) -> petsc_raii::Result<()> {
    let mut view = vec.view_mut()?;
    for (i, v) in view.global_indexed_iter_mut() {
        *v = i as PetscScalar;
    }
    Ok(())
}

/// Component 1 of the local points on the middle `y` plane. Processes that own no part of
/// the plane pick nothing.
fn component_indices(dm: &DM) -> petsc_raii::Result<Vec<PetscInt>> {
    let (xs, ys, zs, xm, ym, zm) = dm.da_get_corners()?;
    let (m, n, _) = dm.da_get_sizes()?;
    let dof = dm.da_get_info()?.dof;
    let (comp, j) = (1, n / 2);
    if !(ys..ys + ym).contains(&j) {
        return Ok(vec![]);
    }

    Ok((zs..zs + zm)
        .flat_map(|k| (xs..xs + xm).map(move |i| comp + dof * (i + m * (j + n * k))))
        .collect())
}

fn save_component(vec: &Vector) -> petsc_raii::Result<()> {
    let mut viewer = Viewer::binary_open(vec.world(), OUTPUT_FILENAME, FileMode::FILE_MODE_WRITE)?;
    viewer.binary_set_use_mpiio(true)?;
    viewer.binary_set_skip_info(true)?;
    viewer.binary_set_skip_header(true)?;

    vec.view_with(&viewer)
}

fn load_component(vec: &mut Vector) -> petsc_raii::Result<()> {
    let mut viewer = Viewer::binary_open(vec.world(), OUTPUT_FILENAME, FileMode::FILE_MODE_READ)?;
    viewer.binary_set_use_mpiio(true)?;
    viewer.binary_set_skip_info(true)?;
    viewer.binary_set_skip_header(true)?;

    vec.load(&viewer)
}

fn compare_components(lhs: &Vector, rhs: &Vector) -> petsc_raii::Result<()> {
    let world = lhs.world();
    petsc_println!(world, "Vector slices comparison:")?;

    let mut diff = lhs.duplicate()?;
    diff.waxpy(-1.0, rhs, lhs)?;
    let (argmax, max) = {
        diff.abs()?;
        diff.max()?
    };
    if max > 1.0e-10 {
        petsc_println!(world, "  ERROR: max(|a-b|) > 1.0e-10")?;
        petsc_println!(world, "  max(|a-b|) = {:+1.10e}, at {}", max, argmax)
    } else {
        petsc_println!(world, "  max(|a-b|) < 1.0e-10")
    }
}

fn run(petsc: &Petsc) -> petsc_raii::Result<()> {
    let world = petsc.world();
    let mut dm = DM::da_create_3d(world, DMBoundaryType::DM_BOUNDARY_NONE, DMBoundaryType::DM_BOUNDARY_NONE,
        DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_BOX, 2, 3, 4, None, None, None, 3, 1,
        None, None, None)?;
    dm.set_from_options()?;
    dm.set_up()?;

    let mut x = dm.create_global_vector()?;
    fill_vector(&mut x)?;

    let indices = component_indices(&dm)?;
    let mut is = IS::create(world)?;
    is.set_type(ISType::ISGENERAL)?;
    is.general_set_indices(&indices, CopyMode::PETSC_COPY_VALUES)?;

    let sub = x.get_sub_vector(&is)?;
    save_component(&sub)?;

    // same split as the sub-vector, so the two can be compared entry by entry
    let mut x_comp = Vector::from_sizes(world, is.get_local_size()?, is.get_size()?, "x_comp")?;
    load_component(&mut x_comp)?;

    compare_components(&sub, &x_comp)
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
