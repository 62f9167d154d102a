//! PETSc viewers export information and data from PETSc objects.
//!
//! An ASCII viewer prints objects to standard out or to a file. A binary viewer stores vectors
//! and matrices in the big-endian PETSc binary format, and can load them back with
//! [`Vector::load()`](crate::vector::Vector::load()) and [`Mat::load()`](crate::mat::Mat::load()).
//!
//! PETSc C API docs: <https://petsc.org/release/docs/manualpages/Viewer/index.html>

use crate::{
    raw,
    Result,
    comm::Communicator,
};

pub use crate::raw::viewer::{ViewerType, FileMode, ViewerFormat, PetscBinaryData};

/// Abstract PETSc object that helps view (in ASCII, binary, etc.) PETSc objects.
pub struct Viewer<'a> {
    pub(crate) world: &'a Communicator,
    pub(crate) viewer_p: raw::viewer::ViewerData,
}

/// Objects that can be printed or saved with a [`Viewer`].
pub trait PetscViewable {
    /// Views the object with a viewer. With `None` the object is printed to standard out.
    fn view_with<'vl, 'val: 'vl>(&self, viewer: impl Into<Option<&'vl Viewer<'val>>>) -> Result<()>;
}

impl<'a> Viewer<'a> {
    /// Creates a viewer with no type. Use [`Viewer::set_type()`] and the file setters before using it.
    pub fn create(world: &'a Communicator) -> Result<Self> {
        let viewer_p = chkerrq!(world, raw::viewer::create(world))?;
        Ok(Viewer { world, viewer_p })
    }

    /// Creates an ASCII viewer shared by all processors in a communicator that writes to standard out.
    pub fn create_ascii_stdout(world: &'a Communicator) -> Result<Self> {
        let mut viewer = Viewer::create(world)?;
        viewer.set_type(ViewerType::PETSCVIEWERASCII)?;
        Ok(viewer)
    }

    /// Opens an ASCII file for writing, truncating it. Collective.
    pub fn create_ascii_file(world: &'a Communicator, name: &str) -> Result<Self> {
        let mut viewer = Viewer::create(world)?;
        viewer.set_type(ViewerType::PETSCVIEWERASCII)?;
        viewer.file_set_mode(FileMode::FILE_MODE_WRITE)?;
        viewer.file_set_name(name)?;
        viewer.set_up()?;
        Ok(viewer)
    }

    /// Creates a binary viewer for the named file.
    ///
    /// The file is opened the first time the viewer is used (or by [`Viewer::set_up()`]), so the
    /// binary flags can still be changed after this call.
    ///
    /// # Example
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// # fn main() -> petsc_raii::Result<()> {
    /// # let petsc = Petsc::init_no_args()?;
    /// let path = std::env::temp_dir().join(format!("viewer-doc-{}.bin", std::process::id()));
    /// let name = path.to_str().unwrap();
    ///
    /// let mut x = Vector::from_global_size(petsc.world(), 4, "x")?;
    /// x.set_all(1.5)?;
    /// let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_WRITE)?;
    /// x.view_with(&viewer)?;
    /// drop(viewer);
    ///
    /// let mut y = Vector::create(petsc.world())?;
    /// let viewer = Viewer::binary_open(petsc.world(), name, FileMode::FILE_MODE_READ)?;
    /// y.load(&viewer)?;
    /// assert_eq!(y.get_global_size()?, 4);
    /// assert_eq!(y.view()?.as_slice().unwrap(), &[1.5; 4]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn binary_open(world: &'a Communicator, name: &str, mode: FileMode) -> Result<Self> {
        let mut viewer = Viewer::create(world)?;
        viewer.set_type(ViewerType::PETSCVIEWERBINARY)?;
        viewer.file_set_mode(mode)?;
        viewer.file_set_name(name)?;
        Ok(viewer)
    }

    /// Reads `count` items written with [`Viewer::binary_write()`]. Every process gets the
    /// same items. Collective.
    pub fn binary_read<T: PetscBinaryData>(&self, count: usize) -> Result<Vec<T>> {
        chkerrq!(self.world, raw::viewer::binary_read(self.world, &self.viewer_p, count))
    }

    /// Writes `data` once, from the first process. Every process must call this with the same
    /// data. Collective.
    pub fn binary_write<T: PetscBinaryData>(&self, data: &[T]) -> Result<()> {
        chkerrq!(self.world, raw::viewer::binary_write(self.world, &self.viewer_p, data))
    }

    /// Reads `count` items on each process. The items of a process start at item `start` of a
    /// block of `total` items; `None` takes the parts in rank order and the sum of the counts.
    /// Collective.
    pub fn binary_read_all<T: PetscBinaryData>(&self, count: usize, start: impl Into<Option<u64>>,
        total: impl Into<Option<u64>>) -> Result<Vec<T>>
    {
        chkerrq!(self.world, raw::viewer::binary_read_all(self.world, &self.viewer_p, count,
            start.into(), total.into()))
    }

    /// Writes the `data` of each process, see [`Viewer::binary_read_all()`] for the placement.
    /// Collective.
    pub fn binary_write_all<T: PetscBinaryData>(&self, data: &[T], start: impl Into<Option<u64>>,
        total: impl Into<Option<u64>>) -> Result<()>
    {
        chkerrq!(self.world, raw::viewer::binary_write_all(self.world, &self.viewer_p, data,
            start.into(), total.into()))
    }

    /// Gets the file descriptor of the binary file.
    ///
    /// Without MPI-IO only the first process holds the file, the others get an error.
    #[cfg(unix)]
    pub fn binary_get_descriptor(&self) -> Result<std::os::unix::io::RawFd> {
        chkerrq!(self.world, raw::viewer::binary_get_descriptor(self.world, &self.viewer_p))
    }
}

impl<'a> Viewer<'a> {
    wrap_simple_petsc_member_funcs! {
        raw::viewer::set_type, pub set_type, input ViewerType, vtype, takes mut, #[doc = "Builds the viewer, for a particular implementation."];
        raw::viewer::get_type, pub get_type, output Option<ViewerType>, #[doc = "Gets the viewer type, `None` if it was never set."];
        raw::viewer::file_set_mode, pub file_set_mode, input FileMode, mode, takes mut, #[doc = "Sets the file mode. Must be called before the file is opened."];
        raw::viewer::file_get_mode, pub file_get_mode, output Option<FileMode>, #[doc = "Gets the file mode."];
        raw::viewer::file_set_name, pub file_set_name, input &str, name, takes mut, #[doc = "Sets the name of the file the viewer uses, closing a file that was open."];
        raw::viewer::file_get_name, pub file_get_name, output Option<String>, #[doc = "Gets the name of the file the viewer uses."];
        raw::viewer::set_from_options, pub set_from_options, takes mut, #[doc = "Sets the viewer from the options database (`-viewer_type`, `-viewer_binary_skip_info`, `-viewer_binary_skip_options`, `-viewer_binary_skip_header`, `-viewer_binary_mpiio`)."];
        raw::viewer::set_up, pub set_up, #[doc = "Opens the file now instead of at the first use. Collective."];
        raw::viewer::push_format, pub push_format, input ViewerFormat, format, takes mut, #[doc = "Sets the format for the following views, keeping the previous one on a stack."];
        raw::viewer::pop_format, pub pop_format, takes mut, #[doc = "Resets the format to the one before the last [`Viewer::push_format()`]."];
        raw::viewer::get_format, pub get_format, output ViewerFormat, #[doc = "Gets the current format."];
    }

    wrap_simple_petsc_member_funcs! {
        raw::viewer::binary_set_skip_header, pub binary_set_skip_header, input bool, skip, takes mut, #[doc = "Do not write or read the class id and sizes before the data.\n\n\
            A file written without headers must be read without headers, the mismatch is not detected."];
        raw::viewer::binary_get_skip_header, pub binary_get_skip_header, output bool, #[doc = "Whether headers are skipped."];
        raw::viewer::binary_set_skip_info, pub binary_set_skip_info, input bool, skip, takes mut, #[doc = "Do not write or read the `.info` file next to the binary file."];
        raw::viewer::binary_get_skip_info, pub binary_get_skip_info, output bool, #[doc = "Whether the `.info` file is skipped."];
        raw::viewer::binary_set_skip_options, pub binary_set_skip_options, input bool, skip, takes mut, #[doc = "Do not load the options found in the `.info` file."];
        raw::viewer::binary_get_skip_options, pub binary_get_skip_options, output bool, #[doc = "Whether options from the `.info` file are skipped."];
        raw::viewer::binary_set_use_mpiio, pub binary_set_use_mpiio, input bool, use_mpiio, takes mut, #[doc = "Every process accesses its own part of the file instead of sending it through the first process.\n\n\
            Must be set before the file is opened."];
        raw::viewer::binary_get_use_mpiio, pub binary_get_use_mpiio, output bool, #[doc = "Whether MPI-IO is used."];
        raw::viewer::binary_get_mpiio_offset, pub binary_get_mpiio_offset, output u64, #[doc = "The byte offset the next parallel access starts at. Only for MPI-IO viewers."];
        raw::viewer::binary_add_mpiio_offset, pub binary_add_mpiio_offset, input u64, delta, #[doc = "Moves the offset of the next parallel access, on this process. Only for MPI-IO viewers."];
    }
}

impl_petsc_object_traits! {
    Viewer, viewer_p, raw::viewer::ViewerData, raw::viewer::destroy;
}

impl_petsc_view_func! {
    Viewer, viewer_p, raw::viewer::view;
}
