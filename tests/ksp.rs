use std::cell::RefCell;

use petsc_raii::prelude::*;

mod common;
use common::on_group;

/// The `n` by `n` tridiagonal matrix `[-1, diag, -1]`, each rank setting its own rows.
fn tridiagonal(world: &Communicator, n: PetscInt, diag: PetscScalar) -> petsc_raii::Result<Mat<'_>> {
    let mut a = Mat::from_sizes(world, None, None, n, n)?;
    let range = a.get_ownership_range()?;
    a.assemble_with(range.flat_map(|i| [(i, i - 1, -1.0), (i, i, diag), (i, i + 1, -1.0)])
            .filter(|&(_, j, _)| (0..n).contains(&j)),
        InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    Ok(a)
}

/// Solves `A x = A u` for `u = [1, 2, 3, ...]` with a KSP set up by `configure`, and returns
/// the 2-norm of the error and the number of iterations.
fn solve_known<'a>(world: &'a Communicator, a: &Mat<'a>, configure: impl FnOnce(&mut KSP) -> petsc_raii::Result<()>)
    -> petsc_raii::Result<(PetscReal, PetscInt)>
{
    let (mut x, mut b) = a.create_vecs()?;
    let mut u = x.duplicate()?;
    {
        let mut view = u.view_mut()?;
        for (i, v) in view.global_indexed_iter_mut() {
            *v = (i + 1) as PetscScalar;
        }
    }
    a.mult(&u, &mut b)?;

    let mut ksp = KSP::create(world)?;
    ksp.set_operators(a, None)?;
    configure(&mut ksp)?;
    ksp.solve(&b, &mut x)?;
    assert!(ksp.get_converged_reason()?.is_converged(), "{}", ksp.get_converged_reason()?);
    let its = ksp.get_iteration_number()?;

    x.axpy(-1.0, &u)?;
    Ok((x.norm(NormType::NORM_2)?, its))
}

#[test]
fn every_method_finds_the_solution() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();
    let a = tridiagonal(world, 20, 2.0)?;

    let combos = [
        (KSPType::KSPCG, PCType::PCNONE),
        (KSPType::KSPCG, PCType::PCJACOBI),
        (KSPType::KSPCG, PCType::PCSOR),
        (KSPType::KSPCG, PCType::PCBJACOBI),
        (KSPType::KSPGMRES, PCType::PCNONE),
        (KSPType::KSPGMRES, PCType::PCBJACOBI),
        (KSPType::KSPBCGS, PCType::PCJACOBI),
        (KSPType::KSPBCGS, PCType::PCSOR),
    ];
    for (ksp_type, pc_type) in combos {
        let (err, its) = solve_known(world, &a, |ksp| {
            ksp.set_type(ksp_type)?;
            ksp.get_pc_or_create()?.set_type(pc_type)?;
            ksp.set_tolerances(1.0e-12, None, None, None)
        })?;
        assert!(err < 1.0e-7, "{} with {}: error {}", ksp_type, pc_type, err);
        assert!(its > 0);
    }

    // CG needs at most n steps in exact arithmetic
    let (_, its) = solve_known(world, &a, |ksp| ksp.set_type(KSPType::KSPCG))?;
    assert!(its <= 20 + 2, "{} iterations", its);
    Ok(())
}

#[test]
fn restarted_gmres_and_richardson() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();

    let a = tridiagonal(world, 20, 2.0)?;
    let (err, _) = solve_known(world, &a, |ksp| {
        ksp.set_type(KSPType::KSPGMRES)?;
        ksp.gmres_set_restart(5)?;
        ksp.set_tolerances(1.0e-12, None, None, None)
    })?;
    assert!(err < 1.0e-7);

    // Jacobi Richardson converges for diagonally dominant matrices
    let a = tridiagonal(world, 20, 4.0)?;
    let (err, its) = solve_known(world, &a, |ksp| {
        ksp.set_type(KSPType::KSPRICHARDSON)?;
        ksp.get_pc_or_create()?.set_type(PCType::PCJACOBI)?;
        ksp.set_tolerances(1.0e-10, None, None, None)
    })?;
    assert!(err < 1.0e-8);
    assert!(its > 5);
    Ok(())
}

#[test]
fn preonly_with_an_exact_factorization() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    // ILU(0) of a tridiagonal matrix is its LU factorization
    let a = tridiagonal(petsc.world(), 10, 2.0)?;
    let (err, its) = solve_known(petsc.world(), &a, |ksp| {
        ksp.set_type(KSPType::KSPPREONLY)?;
        ksp.get_pc_or_create()?.set_type(PCType::PCBJACOBI)
    })?;
    assert!(err < 1.0e-10);
    assert_eq!(its, 1);
    Ok(())
}

#[test]
fn defaults() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 4, 2.0)?;
    let mut ksp = petsc.ksp_create()?;
    assert_eq!(ksp.get_type()?, None);
    assert_eq!(ksp.get_tolerances()?, (1.0e-5, 1.0e-50, 1.0e5, 10000));
    assert!(ksp.get_pc().is_none());

    ksp.set_operators(&a, None)?;
    ksp.set_up()?;
    assert_eq!(ksp.get_type()?, Some(KSPType::KSPGMRES));
    assert_eq!(ksp.get_pc().map(|pc| pc.get_type()).transpose()?, Some(Some(PCType::PCBJACOBI)));

    // unset tolerances keep their value
    ksp.set_tolerances(None, 1.0e-20, None, 50)?;
    assert_eq!(ksp.get_tolerances()?, (1.0e-5, 1.0e-20, 1.0e5, 50));
    assert_eq!(ksp.set_tolerances(2.0, None, None, None).unwrap_err().kind(),
        PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    assert_eq!(ksp.gmres_set_restart(0).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    Ok(())
}

#[test]
fn wrong_order_of_calls() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 4, 2.0)?;
    let (mut x, b) = a.create_vecs()?;
    let mut ksp = petsc.ksp_create()?;

    assert_eq!(ksp.solve(&b, &mut x).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    assert_eq!(ksp.set_up().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    assert_eq!(ksp.get_operators().map(|_| ()).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

    ksp.set_operators(&a, None)?;
    assert_eq!(ksp.get_iteration_number().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    assert_eq!(ksp.get_converged_reason().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

    let wrong = Vector::from_global_size(petsc.world(), 5, "wrong")?;
    assert_eq!(ksp.solve(&wrong, &mut x).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_INCOMP);

    ksp.solve(&b, &mut x)?;
    assert_eq!(ksp.get_iteration_number()?, 0);
    assert_eq!(ksp.get_residual_norm()?, 0.0);
    Ok(())
}

#[test]
fn options_database() -> petsc_raii::Result<()> {
    let petsc = Petsc::builder()
        .args(["ksp-test", "-ksp_type", "cg", "-pc_type", "jacobi", "-ksp_rtol", "1e-9", "-ksp_max_it", "200"]
            .iter().map(|s| s.to_string()))
        .init()?;

    let a = tridiagonal(petsc.world(), 10, 2.0)?;
    let mut ksp = KSP::from_options(petsc.world(), "solver")?;
    assert_eq!(ksp.get_name()?, "solver");
    assert_eq!(ksp.get_type()?, Some(KSPType::KSPCG));
    assert_eq!(ksp.get_tolerances()?, (1.0e-9, 1.0e-50, 1.0e5, 200));
    assert_eq!(ksp.get_pc_or_create()?.get_type()?, Some(PCType::PCJACOBI));

    // values set in code after the options win
    ksp.set_type(KSPType::KSPBCGS)?;
    ksp.set_operators(&a, None)?;
    let (mut x, b) = a.create_vecs()?;
    ksp.solve(&b, &mut x)?;
    assert_eq!(ksp.get_type()?, Some(KSPType::KSPBCGS));
    Ok(())
}

#[test]
fn options_set_in_code() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    petsc.options_set_value("-ksp_type", "richardson".to_string())?;
    petsc.options_set_value("-ksp_max_it", "7".to_string())?;

    let ksp = KSP::from_options(petsc.world(), "solver")?;
    assert_eq!(ksp.get_type()?, Some(KSPType::KSPRICHARDSON));
    assert_eq!(ksp.get_tolerances()?.3, 7);
    drop(ksp);

    // the options database belongs to the thread that initialized the context
    let kind = std::thread::spawn(move || {
        petsc.options_set_value("-ksp_type", "cg".to_string()).unwrap_err().kind()
    }).join().unwrap();
    assert_eq!(kind, PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    Ok(())
}

#[test]
fn unknown_types_in_options() -> petsc_raii::Result<()> {
    let petsc = Petsc::builder()
        .args(["ksp-test", "-ksp_type", "lsqr"].iter().map(|s| s.to_string()))
        .init()?;

    let err = KSP::from_options(petsc.world(), "solver").map(|_| ()).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_UNKNOWN_TYPE);
    Ok(())
}

#[test]
fn not_converging() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 20, 2.0)?;
    let (mut x, mut b) = a.create_vecs()?;
    b.set_all(1.0)?;
    let mut ksp = petsc.ksp_create()?;
    ksp.set_type(KSPType::KSPCG)?;
    ksp.get_pc_or_create()?.set_type(PCType::PCNONE)?;
    ksp.set_tolerances(None, None, None, 1)?;
    ksp.set_operators(&a, None)?;

    // stopping early is not an error by default
    ksp.solve(&b, &mut x)?;
    assert_eq!(ksp.get_converged_reason()?, KSPConvergedReason::KSP_DIVERGED_ITS);
    assert!(ksp.get_converged_reason()?.is_diverged());
    assert_eq!(ksp.get_iteration_number()?, 1);
    assert!(ksp.get_residual_norm()? > 0.0);

    ksp.set_error_if_not_converged(true)?;
    let err = ksp.solve(&b, &mut x).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_NOT_CONVERGED);
    Ok(())
}

#[test]
fn monitors_see_every_iteration() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 10, 2.0)?;
    let (mut x, mut b) = a.create_vecs()?;
    b.set_all(1.0)?;
    let b_norm = b.norm(NormType::NORM_2)?;

    let seen = RefCell::new(vec![]);
    let its = {
        let mut ksp = petsc.ksp_create()?;
        ksp.set_type(KSPType::KSPCG)?;
        ksp.monitor_set(|it, rnorm| {
            seen.borrow_mut().push((it, rnorm));
            Ok(())
        })?;
        ksp.set_operators(&a, None)?;
        ksp.solve(&b, &mut x)?;
        ksp.get_iteration_number()?
    };

    let seen = seen.into_inner();
    assert_eq!(seen.len() as PetscInt, its + 1);
    assert_eq!(seen[0], (0, b_norm));
    assert!(seen.iter().enumerate().all(|(i, &(it, _))| it == i as PetscInt));
    assert!(seen[seen.len() - 1].1 <= 1.0e-5 * b_norm);
    Ok(())
}

#[test]
fn a_failing_monitor_stops_the_solve() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 10, 2.0)?;
    let (mut x, mut b) = a.create_vecs()?;
    b.set_all(1.0)?;

    let calls = RefCell::new(0);
    let mut ksp = petsc.ksp_create()?;
    ksp.set_type(KSPType::KSPCG)?;
    ksp.get_pc_or_create()?.set_type(PCType::PCNONE)?;
    ksp.monitor_set(|it, _| {
        *calls.borrow_mut() += 1;
        if it == 2 {
            return Err(PetscError::new(PetscErrorKind::PETSC_ERROR_USER, "enough"));
        }
        Ok(())
    })?;
    ksp.set_operators(&a, None)?;
    let err = ksp.solve(&b, &mut x).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_USER);
    assert_eq!(*calls.borrow(), 3);

    // without monitors the same KSP solves fine
    ksp.monitor_cancel()?;
    ksp.solve(&b, &mut x)?;
    assert!(ksp.get_converged_reason()?.is_converged());
    drop(ksp);
    assert_eq!(*calls.borrow(), 3);
    Ok(())
}

#[test]
fn preconditioners_by_hand() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();

    let mut a = Mat::from_sizes(world, None, None, 3, 3)?;
    a.assemble_with([(0, 0, 2.0), (1, 1, 0.0), (2, 2, 4.0), (0, 2, 1.0)],
        InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    let (mut r, mut z) = a.create_vecs()?;
    r.set_all(1.0)?;

    // a zero on the diagonal is replaced by one
    let mut pc = PC::create(world)?;
    pc.set_type(PCType::PCJACOBI)?;
    assert_eq!(pc.apply(&r, &mut z).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    pc.set_up(&a)?;
    pc.apply(&r, &mut z)?;
    assert_eq!(z.get_values(0..3)?, vec![0.5, 1.0, 0.25]);

    // but factorizations need a pivot
    pc.set_type(PCType::PCSOR)?;
    assert_eq!(pc.set_up(&a).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_MAT_LU_ZRPVT);
    pc.set_type(PCType::PCBJACOBI)?;
    assert_eq!(pc.set_up(&a).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_MAT_LU_ZRPVT);

    assert_eq!(pc.sor_set_omega(2.0).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    assert_eq!(pc.sor_set_iterations(0).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    Ok(())
}

#[test]
fn a_pc_can_be_handed_to_the_ksp() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let a = tridiagonal(petsc.world(), 20, 2.0)?;
    let (err, _) = solve_known(petsc.world(), &a, |ksp| {
        let mut pc = PC::create(ksp.world())?;
        pc.set_type(PCType::PCSOR)?;
        pc.sor_set_omega(1.2)?;
        pc.sor_set_iterations(2)?;
        ksp.set_pc(pc)?;
        ksp.set_type(KSPType::KSPCG)?;
        ksp.set_tolerances(1.0e-12, None, None, None)
    })?;
    assert!(err < 1.0e-7);
    Ok(())
}

#[test]
fn parallel_solves() {
    let res = on_group(3, |petsc| {
        let world = petsc.world();
        let a = tridiagonal(world, 30, 2.0)?;
        let (gmres_err, gmres_its) = solve_known(world, &a, |ksp| ksp.set_tolerances(1.0e-12, None, None, None))?;
        let (cg_err, cg_its) = solve_known(world, &a, |ksp| {
            ksp.set_type(KSPType::KSPCG)?;
            ksp.get_pc_or_create()?.set_type(PCType::PCJACOBI)?;
            ksp.set_tolerances(1.0e-12, None, None, None)
        })?;
        assert!(gmres_err < 1.0e-6, "gmres error {}", gmres_err);
        assert!(cg_err < 1.0e-6, "cg error {}", cg_err);
        Ok((gmres_its, cg_its))
    });
    // every rank runs the same iterations
    assert!(res.iter().all(|r| *r == res[0]));
}
