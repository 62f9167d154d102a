use petsc_raii::prelude::*;

mod common;
use common::{on_group, on_group_err, temp_path};

const VEC_FILE_CLASSID: i32 = 1211214;

fn ramp<'a>(world: &'a Communicator, n: PetscInt) -> petsc_raii::Result<Vector<'a>> {
    let mut x = Vector::from_global_size(world, n, "ramp")?;
    {
        let mut view = x.view_mut()?;
        for (i, v) in view.global_indexed_iter_mut() {
            *v = i as PetscScalar * 0.5;
        }
    }
    Ok(x)
}

#[test]
#[cfg(all(not(feature = "petsc-int-i64"), not(feature = "petsc-real-f32")))]
fn vector_file_layout() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let path = temp_path("vector_file_layout.bin");
    let name = path.to_str().unwrap();

    let x = ramp(petsc.world(), 3)?;
    {
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        x.view_with(&viewer)?;
    }

    // big endian class id, size and values
    let bytes = std::fs::read(&path).unwrap();
    let mut expected = vec![];
    expected.extend_from_slice(&VEC_FILE_CLASSID.to_be_bytes());
    expected.extend_from_slice(&3i32.to_be_bytes());
    for v in [0.0f64, 0.5, 1.0] {
        expected.extend_from_slice(&v.to_be_bytes());
    }
    assert_eq!(bytes, expected);
    assert!(std::path::Path::new(&format!("{}.info", name)).exists());
    Ok(())
}

#[test]
fn vectors_load_on_a_different_number_of_processes() {
    let path = temp_path("vectors_load.bin");
    let name = path.to_str().unwrap();

    on_group(3, |petsc| {
        let x = ramp(petsc.world(), 10)?;
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        x.view_with(&viewer)
    });

    let res = on_group(2, |petsc| {
        let mut y = Vector::create(petsc.world())?;
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
        y.load(&viewer)?;
        let range = y.get_ownership_range()?;
        Ok((y.get_global_size()?, range.clone(), y.get_values(range)?))
    });
    assert_eq!(res[0], (10, 0..5, vec![0.0, 0.5, 1.0, 1.5, 2.0]));
    assert_eq!(res[1], (10, 5..10, vec![2.5, 3.0, 3.5, 4.0, 4.5]));
}

#[test]
fn several_objects_in_one_file() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let path = temp_path("several_objects.bin");
    let name = path.to_str().unwrap();

    let x = ramp(petsc.world(), 4)?;
    let mut a = Mat::from_sizes(petsc.world(), None, None, 2, 3)?;
    a.assemble_with([(0, 2, 1.0), (1, 0, -2.0), (1, 1, 3.0)], InsertMode::INSERT_VALUES,
        MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
    {
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        x.view_with(&viewer)?;
        a.view_with(&viewer)?;
        viewer.binary_write(&[7i32, 8])?;
    }

    let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
    let mut y = Vector::create(petsc.world())?;
    y.load(&viewer)?;
    assert_eq!(y.get_values(0..4)?, x.get_values(0..4)?);
    let mut b = Mat::create(petsc.world())?;
    b.load(&viewer)?;
    assert_eq!(b.get_size()?, (2, 3));
    assert_eq!(b.get_values(0..2, 0..3)?, vec![0.0, 0.0, 1.0, -2.0, 3.0, 0.0]);
    assert_eq!(viewer.binary_read::<i32>(2)?, vec![7, 8]);
    Ok(())
}

#[test]
fn matrices_round_trip_in_parallel() {
    let path = temp_path("matrices_parallel.bin");
    let name = path.to_str().unwrap();
    let n = 7;

    let written = on_group(2, |petsc| {
        let mut a = Mat::from_sizes(petsc.world(), None, None, n, n)?;
        let range = a.get_ownership_range()?;
        a.assemble_with(range.clone().flat_map(|i| [(i, i, 1.0 + i as PetscScalar), (i, (i * 3) % n, 0.25)]),
            InsertMode::ADD_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        a.view_with(&viewer)?;
        a.get_values(range, 0..n)
    });

    let info = std::fs::read_to_string(format!("{}.info", name)).unwrap();
    assert!(info.contains("-matload_block_size 1"));

    let read = on_group(2, |petsc| {
        let mut a = Mat::create(petsc.world())?;
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
        a.load(&viewer)?;
        let range = a.get_ownership_range()?;
        a.get_values(range, 0..n)
    });
    assert_eq!(written, read);
}

#[test]
fn skipped_headers_and_info() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let path = temp_path("skipped_headers.bin");
    let name = path.to_str().unwrap();

    let x = ramp(petsc.world(), 5)?;
    {
        let mut viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        viewer.binary_set_skip_header(true)?;
        viewer.binary_set_skip_info(true)?;
        x.view_with(&viewer)?;
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 5 * std::mem::size_of::<PetscScalar>() as u64);
    assert!(!std::path::Path::new(&format!("{}.info", name)).exists());

    // without a header the vector must already have its size
    let mut viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
    viewer.binary_set_skip_header(true)?;
    let mut y = Vector::from_global_size(petsc.world(), 5, "y")?;
    y.load(&viewer)?;
    assert_eq!(y.get_values(0..5)?, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    Ok(())
}

#[test]
fn unexpected_contents() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let path = temp_path("unexpected_contents.bin");
    let name = path.to_str().unwrap();

    {
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        ramp(petsc.world(), 4)?.view_with(&viewer)?;
    }

    let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
    let mut a = Mat::create(petsc.world())?;
    assert_eq!(a.load(&viewer).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_FILE_UNEXPECTED);

    let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
    let mut y = Vector::from_global_size(petsc.world(), 6, "y")?;
    assert_eq!(y.load(&viewer).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_SIZ);

    let missing = temp_path("does_not_exist.bin");
    let viewer = Viewer::binary_open(petsc.world(), missing.to_str().unwrap(), FileMode::FILE_MODE_READ)?;
    let mut y = Vector::create(petsc.world())?;
    assert_eq!(y.load(&viewer).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_FILE_OPEN);
    Ok(())
}

#[test]
fn mpiio_parts_and_offsets() {
    let path = temp_path("mpiio_parts.bin");
    let name = path.to_str().unwrap();

    let res = on_group(3, |petsc| {
        let world = petsc.world();
        let rank = world.rank() as i64;
        let mine = (0..=rank).map(|i| 10 * rank + i).collect::<Vec<i64>>();
        let offset = {
            let mut viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_WRITE)?;
            viewer.binary_set_use_mpiio(true)?;
            viewer.binary_set_skip_info(true)?;
            viewer.binary_write(&[42i32])?;
            viewer.binary_write_all(&mine, None, None)?;
            viewer.binary_get_mpiio_offset()?
        };

        let mut viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_READ)?;
        viewer.binary_set_use_mpiio(true)?;
        assert!(viewer.binary_get_use_mpiio()?);
        let head = viewer.binary_read::<i32>(1)?;
        // every process reads the part of the next one
        let count = (rank as usize + 1) % 3 + 1;
        let start: u64 = [1, 3, 0][rank as usize];
        let part = viewer.binary_read_all::<i64>(count, start, 6u64)?;
        Ok((offset, head, part))
    });
    for (offset, head, _) in &res {
        assert_eq!(*offset, 4 + 6 * 8);
        assert_eq!(head, &vec![42]);
    }
    assert_eq!(res[0].2, vec![10, 11]);
    assert_eq!(res[1].2, vec![20, 21, 22]);
    assert_eq!(res[2].2, vec![0]);
}

#[test]
fn gathered_parts_without_mpiio() {
    let path = temp_path("gathered_parts.bin");
    let name = path.to_str().unwrap();

    let res = on_group(2, |petsc| {
        let world = petsc.world();
        let mine = if world.rank() == 0 { vec![1.0, 2.0] } else { vec![3.0] };
        {
            let viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_WRITE)?;
            viewer.binary_write_all::<f64>(&mine, None, None)?;
            viewer.binary_write(&[-1i32])?;
            // only the first process holds the file
            let fd = viewer.binary_get_descriptor();
            assert_eq!(fd.is_ok(), world.rank() == 0);
        }
        let viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_READ)?;
        let all = viewer.binary_read::<f64>(3)?;
        let tail = viewer.binary_read::<i32>(1)?;
        let err = viewer.binary_get_mpiio_offset().unwrap_err().kind();
        Ok((all, tail, err))
    });
    for (all, tail, err) in res {
        assert_eq!(all, vec![1.0, 2.0, 3.0]);
        assert_eq!(tail, vec![-1]);
        assert_eq!(err, PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    }
}

#[test]
fn flags_that_must_be_set_before_opening() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let path = temp_path("flags_before_open.bin");

    let mut viewer = Viewer::binary_open(petsc.world(), path.to_str().unwrap(), FileMode::FILE_MODE_WRITE)?;
    assert_eq!(viewer.get_type()?, Some(ViewerType::PETSCVIEWERBINARY));
    assert_eq!(viewer.file_get_mode()?, Some(FileMode::FILE_MODE_WRITE));
    assert_eq!(viewer.file_get_name()?.as_deref(), path.to_str());
    viewer.set_up()?;

    assert_eq!(viewer.binary_set_use_mpiio(true).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    assert_eq!(viewer.binary_set_skip_info(true).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    assert_eq!(viewer.file_set_mode(FileMode::FILE_MODE_READ).unwrap_err().kind(),
        PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    // headers can be switched at any time
    viewer.binary_set_skip_header(true)?;
    assert!(viewer.binary_get_skip_header()?);

    let mut ascii = Viewer::create_ascii_stdout(petsc.world())?;
    assert_eq!(ascii.binary_set_skip_header(true).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_SUP);

    let untyped = Viewer::create(petsc.world())?;
    assert_eq!(untyped.set_up().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_TYPENOTSET);
    Ok(())
}

#[test]
fn ascii_files() {
    let path = temp_path("ascii_files.txt");
    let name = path.to_str().unwrap();

    on_group(2, |petsc| {
        let world = petsc.world();
        let x = ramp(world, 3)?;
        let mut a = Mat::from_sizes(world, None, None, 2, 2)?;
        a.set_name("A")?;
        a.assemble_with([(0, 0, 1.0), (1, 1, 2.5)], InsertMode::INSERT_VALUES, MatAssemblyType::MAT_FINAL_ASSEMBLY)?;

        let mut viewer = Viewer::create_ascii_file(world, name)?;
        x.view_with(&viewer)?;
        viewer.push_format(ViewerFormat::PETSC_VIEWER_ASCII_INFO)?;
        a.view_with(&viewer)?;
        viewer.pop_format()?;
        assert_eq!(viewer.get_format()?, ViewerFormat::PETSC_VIEWER_DEFAULT);
        a.view_with(&viewer)
    });

    let text = std::fs::read_to_string(&path).unwrap();
    let expected_vec = "Vec Object: ramp 2 MPI processes\n  type: mpi\nProcess [0]\n0.\n0.5\nProcess [1]\n1.\n";
    assert!(text.starts_with(expected_vec), "{}", text);
    assert!(text.contains("  rows=2, cols=2\n  total: nonzeros=2, allocated nonzeros=2\n"), "{}", text);
    assert!(text.contains("Mat Object: A 2 MPI processes\n  type: mpiaij\n"), "{}", text);
    assert!(text.contains("row 0: (0, 1.) \nrow 1: (1, 2.5) \n"), "{}", text);
}

#[test]
fn format_stack() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let mut viewer = Viewer::create_ascii_stdout(petsc.world())?;
    viewer.push_format(ViewerFormat::PETSC_VIEWER_ASCII_DENSE)?;
    viewer.push_format(ViewerFormat::PETSC_VIEWER_ASCII_INFO)?;
    assert_eq!(viewer.get_format()?, ViewerFormat::PETSC_VIEWER_ASCII_INFO);
    viewer.pop_format()?;
    assert_eq!(viewer.get_format()?, ViewerFormat::PETSC_VIEWER_ASCII_DENSE);
    viewer.pop_format()?;
    assert_eq!(viewer.pop_format().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    Ok(())
}

#[test]
fn objects_that_a_viewer_can_not_take() {
    let path = temp_path("objects_not_taken.bin");
    let name = path.to_str().unwrap();

    let res = on_group_err(2, |petsc| {
        let world = petsc.world();
        let mut dm = DM::da_create_1d(world, DMBoundaryType::DM_BOUNDARY_NONE, 6, 1, 1, None)?;
        dm.set_up()?;
        let local = dm.create_local_vector()?;
        let viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_WRITE)?;
        local.view_with(&viewer)
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_ARG_NOTSAMECOMM); 2]);

    let res = on_group_err(1, |petsc| {
        let ksp = petsc.ksp_create()?;
        let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
        ksp.view_with(&viewer)
    });
    assert_eq!(res, vec![Err(PetscErrorKind::PETSC_ERROR_SUP)]);
}

#[test]
fn viewers_from_options() -> petsc_raii::Result<()> {
    let petsc = Petsc::builder()
        .args(["viewer-test", "-viewer_type", "binary", "-viewer_binary_skip_info", "-viewer_binary_mpiio"]
            .iter().map(|s| s.to_string()))
        .init()?;

    let mut viewer = Viewer::create(petsc.world())?;
    viewer.set_from_options()?;
    assert_eq!(viewer.get_type()?, Some(ViewerType::PETSCVIEWERBINARY));
    assert!(viewer.binary_get_skip_info()?);
    assert!(viewer.binary_get_use_mpiio()?);
    assert!(!viewer.binary_get_skip_header()?);
    Ok(())
}

#[test]
fn a_grid_component_round_trips_through_mpiio() {
    for procs in 1..=4 {
        let path = temp_path(&format!("grid_component_{}.bin", procs));
        let name = path.to_str().unwrap();

        let res = on_group(procs, |petsc| {
            let world = petsc.world();
            let mut dm = DM::da_create_3d(world, DMBoundaryType::DM_BOUNDARY_NONE, DMBoundaryType::DM_BOUNDARY_NONE,
                DMBoundaryType::DM_BOUNDARY_NONE, DMDAStencilType::DMDA_STENCIL_BOX, 2, 3, 4, None, None, None, 3, 1,
                None, None, None)?;
            dm.set_up()?;
            let mut x = dm.create_global_vector()?;
            {
                let mut view = x.view_mut()?;
                for (i, v) in view.global_indexed_iter_mut() {
                    *v = i as PetscScalar;
                }
            }

            // component 1 on the plane y = 1, from the ranks that own part of it
            let (xs, ys, zs, xm, ym, zm) = dm.da_get_corners()?;
            let zs_plane = if (ys..ys + ym).contains(&1) { zs..zs + zm } else { 0..0 };
            let idx = zs_plane
                .flat_map(|k| (xs..xs + xm).map(move |i| 1 + 3 * (i + 2 * (1 + 3 * k))))
                .collect::<Vec<PetscInt>>();
            let is = IS::create_general(world, &idx, CopyMode::PETSC_COPY_VALUES)?;
            let sub = x.get_sub_vector(&is)?;
            {
                let mut viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_WRITE)?;
                viewer.binary_set_use_mpiio(true)?;
                viewer.binary_set_skip_info(true)?;
                viewer.binary_set_skip_header(true)?;
                sub.view_with(&viewer)?;
            }

            let mut back = Vector::from_sizes(world, is.get_local_size()?, is.get_size()?, "back")?;
            let mut viewer = Viewer::binary_open(world, name, FileMode::FILE_MODE_READ)?;
            viewer.binary_set_use_mpiio(true)?;
            viewer.binary_set_skip_header(true)?;
            back.load(&viewer)?;

            let mut diff = back.duplicate()?;
            diff.waxpy(-1.0, &back, &sub)?;
            Ok((diff.norm(NormType::NORM_INFINITY)?, back.get_values(back.get_ownership_range()?)?, idx.clone()))
        });

        for (diff, values, idx) in res {
            assert_eq!(diff, 0.0);
            assert_eq!(values, idx.iter().map(|&i| i as PetscScalar).collect::<Vec<_>>());
        }
        // eight values, no header
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * std::mem::size_of::<PetscScalar>() as u64);
    }
}
