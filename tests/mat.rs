use petsc_raii::prelude::*;

mod common;
use common::{on_group, on_group_err};

/// Assembles the `n` by `n` tridiagonal matrix `[-1, 2, -1]`, each rank setting its own rows.
fn laplacian_1d<'a>(world: &'a Communicator, n: PetscInt) -> petsc_raii::Result<Mat<'a>> {
    let mut a = Mat::from_sizes(world, None, None, n, n)?;
    let range = a.get_ownership_range()?;
    a.assemble_with(range.flat_map(|i| [(i, i - 1, -1.0), (i, i, 2.0), (i, i + 1, -1.0)])
            .filter(|&(_, j, _)| j < n),
        InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    Ok(a)
}

#[test]
fn laplacian_times_ones() {
    for size in [1, 3] {
        let res = on_group(size, |petsc| {
            let n = 500;
            let a = laplacian_1d(petsc.world(), n)?;
            let (mut x, mut y) = a.create_vecs()?;
            x.set_all(1.0)?;
            a.mult(&x, &mut y)?;

            let range = y.get_ownership_range()?;
            let vals = y.get_values(range.clone())?;
            for (i, v) in range.zip(vals) {
                let expected = if i == 0 || i == n - 1 { 1.0 } else { 0.0 };
                assert_eq!(v, expected, "row {}", i);
            }
            y.sum()
        });
        assert_eq!(res, vec![2.0; size]);
    }
}

#[test]
fn mult_before_assembly_is_an_error() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut a = Mat::from_sizes(petsc.world(), None, None, 2, 2)?;
    a.set_values(&[0, 1], &[0, 1], &[1.0, 2.0, 3.0, 4.0], InsertMode::INSERT_VALUES)?;
    let (x, mut y) = a.create_vecs()?;
    let err = a.mult(&x, &mut y).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

    a.assemble(MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    assert_eq!(a.get_values(0..2, 0..2)?, vec![1.0, 2.0, 3.0, 4.0]);
    a.mult(&x, &mut y)?;
    Ok(())
}

#[test]
fn flush_then_switch_modes() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut a = Mat::from_sizes(petsc.world(), None, None, 2, 2)?;
    a.set_values(&[0], &[0], &[1.0], InsertMode::INSERT_VALUES)?;
    let err = a.set_values(&[0], &[0], &[1.0], InsertMode::ADD_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

    a.assemble(MatAssemblyType::MAT_FLUSH_ASSEMBLY)?;
    a.set_values(&[0, 1], &[0], &[4.0, 5.0], InsertMode::ADD_VALUES)?;
    a.assemble(MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    assert_eq!(a.get_values([0, 1], [0, 1])?, vec![5.0, 0.0, 5.0, 0.0]);

    let mut d = a.create_vecs()?.1;
    a.get_diagonal(&mut d)?;
    assert_eq!(d.view()?.as_slice().unwrap(), &[5.0, 0.0]);

    a.zero_entries()?;
    assert_eq!(a.get_values([0, 1], [0])?, vec![0.0, 0.0]);
    Ok(())
}

#[test]
fn new_nonzeros_can_be_forbidden() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut a = Mat::from_sizes(petsc.world(), None, None, 3, 3)?;
    a.assemble_with((0..3).map(|i| (i, i, 1.0)), InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    a.set_option(MatOption::MAT_NEW_NONZERO_ALLOCATION_ERR, true)?;
    assert!(a.get_option(MatOption::MAT_NEW_NONZERO_ALLOCATION_ERR)?);
    assert!(!a.get_option(MatOption::MAT_SYMMETRIC)?);

    // existing entries can still change
    a.set_values(&[1], &[1], &[7.0], InsertMode::INSERT_VALUES)?;
    let err = a.set_values(&[0], &[2], &[1.0], InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    Ok(())
}

#[test]
fn off_process_rows_are_added_up() {
    let res = on_group(3, |petsc| {
        let world = petsc.world();
        let mut a = Mat::from_sizes(world, None, None, 3, 3)?;
        // every rank adds to every diagonal entry
        a.assemble_with((0..3).map(|i| (i, i, 1.0)), InsertMode::ADD_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
        let r = world.rank() as PetscInt;
        a.get_values([r], [r])
    });
    assert_eq!(res, vec![vec![3.0]; 3]);
}

#[test]
fn off_process_rows_can_be_ignored() {
    let res = on_group(2, |petsc| {
        let world = petsc.world();
        let mut a = Mat::from_sizes(world, None, None, 2, 2)?;
        a.set_option(MatOption::MAT_IGNORE_OFF_PROC_ENTRIES, true)?;
        a.assemble_with((0..2).map(|i| (i, i, 1.0)), InsertMode::ADD_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
        let r = world.rank() as PetscInt;
        a.get_values([r], [r])
    });
    assert_eq!(res, vec![vec![1.0]; 2]);
}

#[test]
fn rectangular_ownership() {
    let res = on_group(2, |petsc| {
        let a = Mat::from_sizes(petsc.world(), None, None, 5, 3)?;
        Ok((a.get_local_size()?, a.get_ownership_range()?, a.get_ownership_range_column()?,
            a.get_ownership_ranges()?, a.get_ownership_ranges_column()?))
    });
    assert_eq!(res[0].0, (3, 2));
    assert_eq!(res[1].0, (2, 1));
    assert_eq!(res[0].1, 0..3);
    assert_eq!(res[1].2, 2..3);
    assert_eq!(res[1].3, vec![0..3, 3..5]);
    assert_eq!(res[0].4, vec![0..2, 2..3]);
}

#[test]
fn mult_with_wrong_vector_sizes() {
    let res = on_group_err(2, |petsc| {
        let a = laplacian_1d(petsc.world(), 4)?;
        let x = Vector::from_global_size(petsc.world(), 5, "x")?;
        let mut y = Vector::from_global_size(petsc.world(), 4, "y")?;
        a.mult(&x, &mut y)
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_SIZ); 2]);
}

#[test]
fn get_values_of_other_rows() {
    let res = on_group_err(2, |petsc| {
        let a = laplacian_1d(petsc.world(), 4)?;
        a.get_values([0], [0])
    });
    assert_eq!(res[0], Ok(vec![2.0]));
    assert_eq!(res[1], Err(PetscErrorKind::PETSC_ERROR_SUP));
}
