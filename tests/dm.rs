use petsc_raii::prelude::*;

mod common;
use common::{on_group, on_group_err};

/// A set up 1d grid with one dof and stencil width 1.
fn grid_1d(world: &Communicator, bx: DMBoundaryType, n: PetscInt) -> petsc_raii::Result<DM<'_>> {
    let mut dm = DM::da_create_1d(world, bx, n, 1, 1, None)?;
    dm.set_from_options()?;
    dm.set_up()?;
    Ok(dm)
}

/// Fills a global vector of `dm` with the global index of each entry and scatters it to a local
/// vector that starts out as `fill`. Returns the local values.
fn ghosted_values(dm: &DM, fill: PetscScalar) -> petsc_raii::Result<Vec<PetscScalar>> {
    let mut global = dm.create_global_vector()?;
    {
        let mut view = global.view_mut()?;
        for (i, v) in view.global_indexed_iter_mut() {
            *v = i as PetscScalar;
        }
    }
    let mut local = dm.create_local_vector()?;
    local.set_all(fill)?;
    dm.global_to_local(&global, InsertMode::INSERT_VALUES, &mut local)?;
    let values = local.view()?.iter().copied().collect();
    Ok(values)
}

#[test]
fn periodic_ghosts_wrap_around() {
    let res = on_group(2, |petsc| {
        let dm = grid_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_PERIODIC, 8)?;
        assert_eq!(dm.da_get_ghost_corners()?.3, 6);
        ghosted_values(&dm, -1.0)
    });
    assert_eq!(res[0], vec![7.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(res[1], vec![3.0, 4.0, 5.0, 6.0, 7.0, 0.0]);
}

#[test]
fn boundary_kinds() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();

    let none = grid_1d(world, DMBoundaryType::DM_BOUNDARY_NONE, 4)?;
    assert_eq!(ghosted_values(&none, -1.0)?, vec![0.0, 1.0, 2.0, 3.0]);

    let ghosted = grid_1d(world, DMBoundaryType::DM_BOUNDARY_GHOSTED, 4)?;
    assert_eq!(ghosted.da_get_ghost_corners()?.0, -1);
    assert_eq!(ghosted_values(&ghosted, -1.0)?, vec![-1.0, 0.0, 1.0, 2.0, 3.0, -1.0]);

    let mirror = grid_1d(world, DMBoundaryType::DM_BOUNDARY_MIRROR, 4)?;
    assert_eq!(ghosted_values(&mirror, -1.0)?, vec![1.0, 0.0, 1.0, 2.0, 3.0, 2.0]);

    let periodic = grid_1d(world, DMBoundaryType::DM_BOUNDARY_PERIODIC, 4)?;
    assert_eq!(ghosted_values(&periodic, -1.0)?, vec![3.0, 0.0, 1.0, 2.0, 3.0, 0.0]);
    Ok(())
}

#[test]
fn local_to_global_modes() {
    let res = on_group(2, |petsc| {
        let dm = grid_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 4)?;
        let mut local = dm.create_local_vector()?;
        local.set_all(1.0)?;
        let mut global = dm.create_global_vector()?;

        dm.local_to_global(&local, InsertMode::ADD_VALUES, &mut global)?;
        let added = global.view()?.iter().copied().collect::<Vec<_>>();

        global.set_all(0.0)?;
        dm.local_to_global_begin(&local, InsertMode::INSERT_VALUES)?;
        dm.local_to_global_end(&mut global, InsertMode::INSERT_VALUES)?;
        let inserted = global.view()?.iter().copied().collect::<Vec<_>>();
        Ok((added, inserted))
    });
    assert_eq!(res[0], (vec![1.0, 2.0], vec![1.0, 1.0]));
    assert_eq!(res[1], (vec![2.0, 1.0], vec![1.0, 1.0]));
}

#[test]
fn local_to_local_refreshes_ghosts() {
    let res = on_group(2, |petsc| {
        let dm = grid_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 4)?;
        let rank = petsc.world().rank();
        let mut from = dm.create_local_vector()?;
        from.set_all(10.0 * (rank + 1) as PetscScalar)?;
        let mut to = dm.create_local_vector()?;
        dm.local_to_local(&from, InsertMode::INSERT_VALUES, &mut to)?;
        let values = to.view()?.iter().copied().collect::<Vec<_>>();
        Ok(values)
    });
    // the ghost point holds the owner's value
    assert_eq!(res[0], vec![10.0, 10.0, 20.0]);
    assert_eq!(res[1], vec![10.0, 20.0, 20.0]);
}

#[test]
fn halo_end_needs_a_begin() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let dm = grid_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 4)?;
    let global = dm.create_global_vector()?;
    let mut local = dm.create_local_vector()?;
    let err = dm.global_to_local_end(&mut local, InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

    dm.global_to_local_begin(&global, InsertMode::INSERT_VALUES)?;
    let err = dm.global_to_local_end(&mut local, InsertMode::ADD_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_INCOMP);

    let wrong = Vector::from_global_size(petsc.world(), 3, "wrong")?;
    let err = dm.global_to_local_begin(&wrong, InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_INCOMP);
    Ok(())
}

#[test]
fn star_stencil_skips_corner_ghosts() {
    for stencil in [DMDAStencilType::DMDA_STENCIL_STAR, DMDAStencilType::DMDA_STENCIL_BOX] {
        let res = on_group(4, |petsc| {
            let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
                DMBoundaryType::DM_BOUNDARY_NONE, stencil, 4, 4, None, None, 1, 1, None, None)?;
            dm.set_up()?;
            assert_eq!(dm.da_get_num_procs()?, (Some(2), Some(2), Some(1)));

            let (xs, ys, _, _, _, _) = dm.da_get_corners()?;
            let mut global = dm.create_global_vector()?;
            {
                let mut view = dm.da_vec_view_mut(&mut global)?;
                // natural ordering, 1 based so that untouched ghosts stand out
                for (pat, v) in view.indexed_iter_mut() {
                    let (i, j) = (pat[0] as PetscInt + xs, pat[1] as PetscInt + ys);
                    *v = (1 + i + 4 * j) as PetscScalar;
                }
            }
            let mut local = dm.create_local_vector()?;
            local.set_all(-1.0)?;
            dm.global_to_local(&global, InsertMode::INSERT_VALUES, &mut local)?;

            let (gxs, gys, _, gxm, gym, _) = dm.da_get_ghost_corners()?;
            let view = dm.da_vec_view(&local)?;
            assert_eq!(view.shape(), &[gxm as usize, gym as usize]);
            let edge = view[[(2 - gxs) as usize, (1 - gys) as usize]];
            let corner = view[[(2 - gxs) as usize, (2 - gys) as usize]];
            Ok((petsc.world().rank(), edge, corner))
        });
        // on rank 0, the point (2, 1) is an edge ghost and (2, 2) a corner ghost
        let (rank, edge, corner) = res[0];
        assert_eq!(rank, 0);
        assert_eq!(edge, 7.0);
        match stencil {
            DMDAStencilType::DMDA_STENCIL_STAR => assert_eq!(corner, -1.0),
            DMDAStencilType::DMDA_STENCIL_BOX => assert_eq!(corner, 11.0),
        }
    }
}

#[test]
fn grid_queries() {
    let res = on_group(4, |petsc| {
        let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
            DMBoundaryType::DM_BOUNDARY_PERIODIC, DMDAStencilType::DMDA_STENCIL_BOX, 6, 4, None, None, 2, 1,
            None, None)?;
        dm.set_up()?;
        let info = dm.da_get_info()?;
        let ranges = dm.da_get_ownership_ranges()?;
        let neighbors = dm.da_get_neighbors()?;
        let global = dm.create_global_vector()?;
        Ok((info, ranges, neighbors, global.get_local_size()?))
    });

    let (info, ranges, neighbors, local_size) = &res[0];
    assert_eq!((info.dim, info.dof, info.sw), (2, 2, 1));
    assert_eq!((info.mx, info.my, info.mz), (6, 4, 1));
    assert_eq!((info.xs, info.ys, info.xm, info.ym), (0, 0, 3, 2));
    // periodic in y, so the ghost region goes below zero
    assert_eq!((info.gxs, info.gys, info.gxm, info.gym), (0, -1, 4, 4));
    assert_eq!(info.by, DMBoundaryType::DM_BOUNDARY_PERIODIC);
    assert_eq!(ranges, &(vec![3, 3], vec![2, 2], vec![]));
    assert_eq!(neighbors, &vec![-1, 2, 3, -1, 0, 1, -1, 2, 3]);
    assert_eq!(*local_size, 3 * 2 * 2);

    let (info, _, neighbors, _) = &res[3];
    assert_eq!((info.xs, info.ys), (3, 2));
    assert_eq!(neighbors, &vec![0, 1, -1, 2, 3, -1, 0, 1, -1]);
}

#[test]
fn explicit_ownership_ranges() {
    let res = on_group(2, |petsc| {
        let lx: [PetscInt; 2] = [1, 4];
        let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 5, 1, 1, &lx[..])?;
        dm.set_up()?;
        let (xs, _, _, xm, _, _) = dm.da_get_corners()?;
        Ok((xs, xm, dm.da_get_ownership_ranges()?.0))
    });
    assert_eq!(res[0], (0, 1, vec![1, 4]));
    assert_eq!(res[1], (1, 4, vec![1, 4]));
}

#[test]
fn bad_partitions_fail_on_every_rank() {
    // three processes can not split two points
    let res = on_group_err(3, |petsc| {
        let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 2, 1, 1, None)?;
        dm.set_up()
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_INCOMP); 3]);

    // the last two processes own less than the stencil width
    let res = on_group_err(3, |petsc| {
        let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 4, 1, 2, None)?;
        dm.set_up()
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE); 3]);

    let res = on_group_err(3, |petsc| {
        let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
            DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_STAR, 2, 6, 3, None, 1, 0, None, None)?;
        dm.set_up()
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE); 3]);

    let res = on_group_err(2, |petsc| {
        let lx: [PetscInt; 2] = [2, 2];
        let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 5, 1, 1, &lx[..])?;
        dm.set_up()
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_INCOMP); 2]);
}

#[test]
fn pooled_vectors_are_reused() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let dm = grid_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_GHOSTED, 4)?;
    {
        let mut local = dm.get_local_vector()?;
        assert_eq!(local.get_local_size()?, 6);
        local.set_all(3.0)?;
        let mut global = dm.get_global_vector()?;
        assert_eq!(global.get_local_size()?, 4);
        dm.local_to_global(&local, InsertMode::INSERT_VALUES, &mut global)?;
        assert_eq!(global.sum()?, 12.0);
    }
    // the same vector comes back, with the values it was returned with
    let local = dm.get_local_vector()?;
    assert_eq!(local.sum()?, 18.0);
    Ok(())
}

#[test]
fn matrix_follows_the_stencil() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut dm = DM::da_create_2d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE,
        DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_STAR, 3, 3, None, None, 1, 1, None, None)?;
    dm.set_up()?;
    let mut a = dm.create_matrix()?;
    assert_eq!(a.get_size()?, (9, 9));

    // the center couples to its four axis neighbors
    a.set_values(&[4], &[1, 3, 4, 5, 7], &[-1.0, -1.0, 4.0, -1.0, -1.0], InsertMode::INSERT_VALUES)?;
    let err = a.set_values(&[4], &[0], &[1.0], InsertMode::INSERT_VALUES).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);
    a.assemble(MatAssemblyType::MAT_FINAL_ASSEMBLY)?;

    let mut x = dm.create_global_vector()?;
    x.set_all(1.0)?;
    let mut y = dm.create_global_vector()?;
    a.mult(&x, &mut y)?;
    assert_eq!(y.sum()?, 0.0);
    Ok(())
}

#[test]
fn options_and_names() -> petsc_raii::Result<()> {
    let petsc = Petsc::builder()
        .args(["dm-test", "-da_grid_x", "7", "-da_stencil_width", "2"].iter().map(|s| s.to_string()))
        .init()?;

    let mut dm = DM::da_create_1d(petsc.world(), DMBoundaryType::DM_BOUNDARY_NONE, 4, 2, 1, None)?;
    dm.set_from_options()?;
    dm.da_set_field_name(1, "pressure")?;
    dm.da_set_coordinate_name(0, "x")?;
    dm.set_up()?;

    assert_eq!(dm.da_get_sizes()?, (7, 1, 1));
    assert_eq!(dm.da_get_stencil_width()?, 2);
    assert_eq!(dm.get_dimension()?, 1);
    assert_eq!(dm.get_type()?, dm::DMType::DMDA);
    assert_eq!(dm.da_get_field_name(0)?, None);
    assert_eq!(dm.da_get_field_name(1)?.as_deref(), Some("pressure"));
    assert_eq!(dm.da_get_coordinate_name(0)?.as_deref(), Some("x"));
    assert_eq!(dm.da_get_field_name(2).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_OUTOFRANGE);

    // the grid can not change once it is set up
    let err = dm.da_set_sizes(3, 1, 1).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    Ok(())
}
