use approx::assert_relative_eq;
use petsc_raii::prelude::*;

mod common;
use common::{on_group, on_group_err};

#[test]
fn duplicate_and_copy_do_not_share_storage() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 6, "x")?;
    x.set_all(2.0)?;
    let mut y = x.duplicate()?;
    assert_eq!(y.sum()?, 0.0);
    assert_eq!(y.get_ownership_range()?, x.get_ownership_range()?);

    let mut z = x.copy()?;
    y.copy_data_from(&x)?;
    y.shift(1.0)?;
    z.scale(-1.0)?;
    x.set_all(7.0)?;

    assert_eq!(x.view()?.as_slice().unwrap(), &[7.0; 6]);
    assert_eq!(y.view()?.as_slice().unwrap(), &[3.0; 6]);
    assert_eq!(z.view()?.as_slice().unwrap(), &[-2.0; 6]);
    Ok(())
}

#[test]
fn writes_through_a_mutable_view_are_seen_later() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 4, "x")?;
    x.set_all(1.0)?;
    assert_eq!(x.norm(NormType::NORM_1)?, 4.0);
    {
        let mut view = x.view_mut()?;
        view.iter_mut().for_each(|v| *v *= 3.0);
    }
    // the cached norm must not survive the write
    assert_eq!(x.norm(NormType::NORM_1)?, 12.0);

    {
        let mut view = x.view_mut_with(ArrayAccessMode::WriteOnly)?;
        for (i, v) in view.global_indexed_iter_mut() {
            *v = i as PetscScalar;
        }
    }
    let view = x.view()?;
    assert_eq!(view.as_slice().unwrap(), &[0.0, 1.0, 2.0, 3.0]);
    let pairs = view.global_indexed_iter().map(|(i, v)| (i, *v)).collect::<Vec<_>>();
    assert_eq!(pairs, vec![(0, 0.0), (1, 1.0), (2, 2.0), (3, 3.0)]);
    Ok(())
}

#[test]
fn arithmetic() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 3, "x")?;
    x.assemble_with([(0, 1.0), (1, -2.0), (2, 4.0)], InsertMode::INSERT_VALUES)?;
    let mut y = x.duplicate()?;
    y.set_all(2.0)?;
    let mut w = x.duplicate()?;

    w.waxpy(2.0, &x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[4.0, -2.0, 10.0]);

    w.axpby(1.0, 0.5, &x)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[3.0, -3.0, 9.0]);

    w.aypx(2.0, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[8.0, -4.0, 20.0]);

    w.axpbypcz(1.0, 1.0, 0.0, &x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[3.0, 0.0, 6.0]);

    w.pointwise_mult(&x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[2.0, -4.0, 8.0]);
    w.pointwise_divide(&x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[0.5, -1.0, 2.0]);
    w.pointwise_max(&x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[2.0, 2.0, 4.0]);
    w.pointwise_min(&x, &y)?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[1.0, -2.0, 2.0]);

    w.abs()?;
    w.reciprocal()?;
    assert_eq!(w.view()?.as_slice().unwrap(), &[1.0, 0.5, 0.5]);

    assert_eq!(x.dot(&y)?, 6.0);
    assert_eq!(x.tdot(&y)?, 6.0);
    assert_eq!(x.max()?, (2, 4.0));
    assert_eq!(x.min()?, (1, -2.0));
    assert_eq!(x.norm(NormType::NORM_INFINITY)?, 4.0);
    assert_relative_eq!(x.norm(NormType::NORM_2)?, 21.0f64.sqrt() as PetscReal, epsilon = 1e-12);

    let norm = x.normalize()?;
    assert_relative_eq!(norm, 21.0f64.sqrt() as PetscReal, epsilon = 1e-12);
    assert_relative_eq!(x.norm(NormType::NORM_2)?, 1.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn incompatible_layouts_are_rejected() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 3, "x")?;
    let y = Vector::from_global_size(petsc.world(), 4, "y")?;
    let err = x.axpy(1.0, &y).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_INCOMP);
    assert_eq!(err.code(), 75);
    assert!(err.location().is_some());
    Ok(())
}

#[test]
fn inserting_after_adding_fails() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 3, "x")?;
    x.set_values(&[0], &[1.0], InsertMode::ADD_VALUES)?;
    let err = x.set_values(&[1], &[1.0], InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    x.assemble()?;

    // after assembly the other mode is fine again
    x.set_values(&[1, -1], &[5.0, 9.0], InsertMode::INSERT_VALUES)?;
    x.assemble()?;
    assert_eq!(x.get_values(0..3)?, vec![1.0, 5.0, 0.0]);

    let err = x.set_values(&[3], &[1.0], InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    Ok(())
}

#[test]
fn decided_sizes_split_in_rank_order() {
    let ranges = on_group(3, |petsc| {
        let x = Vector::from_global_size(petsc.world(), 10, "x")?;
        Ok((x.get_local_size()?, x.get_ownership_range()?, x.get_ownership_ranges()?))
    });
    assert_eq!(ranges[0].0, 4);
    assert_eq!(ranges[1].0, 3);
    assert_eq!(ranges[2].0, 3);
    assert_eq!(ranges[0].1, 0..4);
    assert_eq!(ranges[1].1, 4..7);
    assert_eq!(ranges[2].1, 7..10);
    for (_, _, all) in &ranges {
        assert_eq!(all, &vec![0..4, 4..7, 7..10]);
    }
}

#[test]
fn inconsistent_sizes_fail_on_every_rank() {
    let res = on_group_err(2, |petsc| {
        Vector::from_sizes(petsc.world(), 2, 5, "x").map(|_| ())
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_INCOMP); 2]);
}

#[test]
fn off_process_values_are_assembled() {
    let sums = on_group(3, |petsc| {
        let world = petsc.world();
        let mut x = Vector::from_local_size(world, world.rank() as PetscInt + 1, "x")?;
        let n = x.get_global_size()?;
        assert_eq!(n, 6);
        x.set_all(1.0)?;
        // every rank adds one to every entry, most of which it does not own
        x.assemble_with((0..n).map(|i| (i, 1.0)), InsertMode::ADD_VALUES)?;

        let range = x.get_ownership_range()?;
        assert_eq!(x.get_values(range.clone())?, vec![4.0; (range.end - range.start) as usize]);
        x.sum()
    });
    assert_eq!(sums, vec![24.0; 3]);
}

#[test]
fn reductions_agree_across_ranks() {
    let res = on_group(4, |petsc| {
        let mut x = Vector::from_global_size(petsc.world(), 9, "x")?;
        let range = x.get_ownership_range()?;
        {
            let mut view = x.view_mut()?;
            for (i, v) in view.global_indexed_iter_mut() {
                *v = if i == 5 { -10.0 } else { i as PetscScalar };
            }
        }
        assert!(range.end - range.start >= 2);
        Ok((x.max()?, x.min()?, x.sum()?, x.norm(NormType::NORM_1)?))
    });
    for r in &res {
        assert_eq!(r, &((8, 8.0), (5, -10.0), 21.0, 41.0));
    }
}

#[test]
fn get_values_is_local_only() {
    let res = on_group_err(2, |petsc| {
        let x = Vector::from_global_size(petsc.world(), 4, "x")?;
        // rank 0 owns 0..2, rank 1 owns 2..4
        x.get_values([3]).map(|_| ())
    });
    assert_eq!(res[0], Err(PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE));
    assert_eq!(res[1], Ok(()));
}

#[test]
fn sub_vector_gathers_and_writes_back() {
    let res = on_group(2, |petsc| {
        let world = petsc.world();
        let mut v = Vector::from_global_size(world, 8, "v")?;
        {
            let mut view = v.view_mut()?;
            for (i, x) in view.global_indexed_iter_mut() {
                *x = i as PetscScalar;
            }
        }

        // each rank asks for entries the other rank owns
        let idx = if world.rank() == 0 { vec![7, 5] } else { vec![0, 2, 1] };
        let is = IS::create_general(world, &idx, CopyMode::PETSC_COPY_VALUES)?;
        {
            let sub = v.get_sub_vector_read(&is)?;
            assert_eq!(sub.get_local_size()?, idx.len() as PetscInt);
            assert_eq!(sub.get_global_size()?, 5);
            let expected = idx.iter().map(|&i| i as PetscScalar).collect::<Vec<_>>();
            assert_eq!(sub.view()?.as_slice().unwrap(), &expected[..]);
        }
        {
            let mut sub = v.get_sub_vector(&is)?;
            sub.scale(-1.0)?;
        }
        let local = v.view()?.iter().copied().collect::<Vec<_>>();
        Ok(local)
    });
    assert_eq!(res[0], vec![-0.0, -1.0, -2.0, 3.0]);
    assert_eq!(res[1], vec![4.0, -5.0, 6.0, -7.0]);
}

#[test]
fn empty_local_parts() {
    let res = on_group(3, |petsc| {
        let world = petsc.world();
        let local = if world.rank() == 1 { 0 } else { 2 };
        let mut x = Vector::from_local_size(world, local, "x")?;
        x.set_all(1.0)?;
        let len = x.view()?.len();
        Ok((x.get_ownership_range()?, len, x.norm(NormType::NORM_1)?))
    });
    assert_eq!(res[0], (0..2, 2, 4.0));
    assert_eq!(res[1], (2..2, 0, 4.0));
    assert_eq!(res[2], (2..4, 2, 4.0));
}

#[test]
fn reductions_of_an_empty_vector_are_positive_zero() {
    let res = on_group(3, |petsc| {
        let x = Vector::from_global_size(petsc.world(), 0, "empty")?;
        let y = x.duplicate()?;
        Ok([x.sum()?, x.norm(NormType::NORM_1)?, x.norm(NormType::NORM_2)?,
            x.norm(NormType::NORM_INFINITY)?, x.dot(&y)?])
    });
    for vals in res {
        for v in vals {
            assert_eq!(v, 0.0);
            assert!(v.is_sign_positive(), "{:?}", vals);
        }
    }
}

#[test]
fn names() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut x = Vector::from_global_size(petsc.world(), 2, "solution")?;
    assert_eq!(x.get_name()?, "solution");
    assert_eq!(x.get_class_name(), "Vec");
    x.set_name("rhs")?;
    assert_eq!(x.get_name()?, "rhs");
    Ok(())
}

#[test]
fn sub_vectors_on_ranks_that_own_nothing() {
    let res = on_group(4, |petsc| {
        let world = petsc.world();
        let mut v = Vector::from_global_size(world, 2, "v")?;
        v.set_all(3.0)?;
        let range = v.get_ownership_range()?;
        let idx = if range.is_empty() { vec![] } else { vec![range.start] };
        let is = IS::create_general(world, &idx, CopyMode::PETSC_COPY_VALUES)?;
        let sub = v.get_sub_vector_read(&is)?;
        Ok((range, sub.get_local_size()?, sub.get_global_size()?, sub.sum()?))
    });
    assert_eq!(res[0], (0..1, 1, 2, 6.0));
    assert_eq!(res[1], (1..2, 1, 2, 6.0));
    assert_eq!(res[2], (2..2, 0, 2, 6.0));
    assert_eq!(res[3], (2..2, 0, 2, 6.0));
}
