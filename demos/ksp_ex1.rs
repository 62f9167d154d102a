//! Solves a tridiagonal linear system with KSP.
//!
//! Concepts: KSP^solving a system of linear equations
//! Processors: 1
//!
//! To run:
//! ```text
//! $ cargo run --example ksp-ex1
//! Norm of error 2.41202e-15, Iters 5
//! $ cargo run --example ksp-ex1 -- -n 100 -ksp_type cg -ksp_monitor
//! ```

static HELP_MSG: &str = "Solves a tridiagonal linear system with KSP.\n\n\
    Options:\n  -n <size> : number of unknowns (default 10)\n\n";

use petsc_raii::prelude::*;

fn main() -> petsc_raii::Result<()> {
    let petsc = Petsc::builder()
        .args(std::env::args())
        .help_msg(HELP_MSG)
        .init()?;

    let n = petsc.options_try_get_int("-n")?.unwrap_or(10);

    /*
        Create vectors. Note that we form 1 vector from scratch and
        then duplicate as needed.
    */
    let mut x = petsc.vec_create()?;
    x.set_name("Solution")?;
    x.set_sizes(None, Some(n))?;
    x.set_from_options()?;
    x.set_up()?;
    let mut b = x.duplicate()?;
    let mut u = x.duplicate()?;

    #[allow(non_snake_case)]
    let mut A = petsc.mat_create()?;
    A.set_sizes(None, None, Some(n), Some(n))?;
    A.set_from_options()?;
    A.set_up()?;

    A.assemble_with((0..n).flat_map(|i| (-1..=1).map(move |j| (i, i+j)))
            .filter(|&(_, j)| j >= 0 && j < n)
            .map(|(i, j)| if i == j { (i, j, 2.0) } else { (i, j, -1.0) }),
        InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;

    // exact solution, then the right-hand side
    u.set_all(1.0)?;
    A.mult(&u, &mut b)?;

    let mut ksp = petsc.ksp_create()?;
    ksp.set_operators(&A, &A)?;

    /*
        Set linear solver defaults for this problem. These can be overridden at runtime with
        `-ksp_type <type> -pc_type <type> -ksp_rtol <rtol>` because
        KSP::set_from_options() is called after them.
    */
    ksp.get_pc_or_create()?.set_type(PCType::PCJACOBI)?;
    ksp.set_tolerances(1.0e-5, None, None, None)?;
    ksp.set_from_options()?;

    ksp.solve(&b, &mut x)?;

    let viewer = Viewer::create_ascii_stdout(petsc.world())?;
    ksp.view_with(&viewer)?;

    x.axpy(-1.0, &u)?;
    let x_norm = x.norm(NormType::NORM_2)?;
    let iters = ksp.get_iteration_number()?;
    petsc_println!(petsc.world(), "Norm of error {:.5e}, Iters {}", x_norm, iters)?;

    Ok(())
}
