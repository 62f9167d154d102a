use petsc_raii::prelude::*;

mod common;
use common::on_group;

#[test]
fn shapes() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();

    let general = IS::create_general_owned(world, vec![5, 2, 9])?;
    assert_eq!(general.get_type()?, ISType::ISGENERAL);
    assert_eq!(general.to_vec()?, vec![5, 2, 9]);
    assert_eq!(general.get_block_size()?, 1);

    let stride = IS::create_stride(world, 3, 1, -1)?;
    assert_eq!(&stride.get_indices()?[..], &[1, 0, -1]);

    let blocks = [2, 0];
    let block = IS::create_block(world, 3, &blocks, CopyMode::PETSC_USE_POINTER)?;
    assert_eq!(block.get_block_size()?, 3);
    assert_eq!(block.get_local_size()?, 6);
    assert_eq!(block.to_vec()?, vec![6, 7, 8, 0, 1, 2]);

    let owned_block = IS::create_block_owned(world, 2, vec![1])?;
    assert_eq!(owned_block.to_vec()?, vec![2, 3]);
    Ok(())
}

#[test]
fn own_pointer_needs_an_owned_array() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let idx = [1, 2];
    let err = IS::create_general(petsc.world(), &idx, CopyMode::PETSC_OWN_POINTER).map(|_| ()).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONG);
    Ok(())
}

#[test]
fn set_type_then_fill() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let idx = vec![4, 4, 1];
    let mut is = IS::create(petsc.world())?;
    assert_eq!(is.get_local_size().unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_TYPENOTSET);

    is.set_type(ISType::ISGENERAL)?;
    is.general_set_indices(&idx, CopyMode::PETSC_USE_POINTER)?;
    assert_eq!(is.get_size()?, 3);

    // a stride setter on a general index set is rejected
    let err = is.stride_set_stride(2, 0, 1).unwrap_err();
    assert_eq!(err.kind(), PetscErrorKind::PETSC_ERROR_ARG_WRONG);

    is.set_type(ISType::ISSTRIDE)?;
    is.stride_set_stride(2, 10, 5)?;
    assert_eq!(is.to_vec()?, vec![10, 15]);

    let mut blocks = IS::create(petsc.world())?;
    blocks.set_type(ISType::ISBLOCK)?;
    blocks.block_set_indices(2, &idx, CopyMode::PETSC_COPY_VALUES)?;
    assert_eq!(blocks.to_vec()?, vec![8, 9, 8, 9, 2, 3]);
    Ok(())
}

#[test]
fn duplicate_and_copy_to() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;
    let world = petsc.world();

    let dup = {
        let idx = vec![3, 1];
        let is = IS::create_general(world, &idx, CopyMode::PETSC_USE_POINTER)?;
        // the duplicate owns its indices, so it outlives `idx`
        is.duplicate()?
    };
    assert_eq!(dup.to_vec()?, vec![3, 1]);

    let mut dest = IS::create_general_owned(world, vec![0, 0])?;
    let src = IS::create_general_owned(world, vec![7, 8])?;
    src.copy_to(&mut dest)?;
    assert_eq!(dest.to_vec()?, vec![7, 8]);

    let mut wrong_size = IS::create_general_owned(world, vec![0])?;
    assert_eq!(src.copy_to(&mut wrong_size).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_SIZ);

    let mut wrong_type = IS::create_stride(world, 2, 0, 1)?;
    assert_eq!(src.copy_to(&mut wrong_type).unwrap_err().kind(), PetscErrorKind::PETSC_ERROR_ARG_INCOMP);
    Ok(())
}

#[test]
fn borrowed_indices_lock_the_index_set() -> petsc_raii::Result<()> {
    let petsc = Petsc::init_no_args()?;

    let is = IS::create_stride(petsc.world(), 4, 0, 2)?;
    let first = is.get_indices()?;
    let second = is.get_indices()?;
    assert_eq!(first.iter().sum::<PetscInt>(), 12);
    assert_eq!(&first[..], &second[..]);
    drop(first);
    drop(second);
    Ok(())
}

#[test]
fn global_size_sums_over_ranks() {
    let res = on_group(3, |petsc| {
        let world = petsc.world();
        let n = world.rank() as PetscInt;
        let is = IS::create_stride(world, n, 0, 1)?;
        Ok((is.get_local_size()?, is.get_size()?))
    });
    assert_eq!(res, vec![(0, 3), (1, 3), (2, 3)]);
}
