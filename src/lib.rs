//! # petsc-raii: RAII handles for distributed linear algebra
//!
//! This crate exposes distributed vectors ([`Vector`](vector::Vector)), sparse matrices
//! ([`Mat`](mat::Mat)), index sets ([`IS`](indexset::IS)), structured grids ([`DM`](dm::DM)),
//! Krylov solvers ([`KSP`](ksp::KSP)) and viewers ([`Viewer`](viewer::Viewer)) as move-only
//! handles. Every handle owns exactly one native object and releases it when dropped. Access
//! to the process-local part of a distributed object goes through scoped views which are
//! restored when they go out of scope.
//!
//! Each participant of a process group is driven by a [`Communicator`](comm::Communicator).
//! A group can be simulated inside one process with [`comm::run_group()`], one thread per rank.
//!
//! ## Basic usage
//!
//! ```
//! use petsc_raii::prelude::*;
//!
//! # fn main() -> petsc_raii::Result<()> {
//! let petsc = Petsc::init_no_args()?;
//!
//! let mut x = Vector::from_global_size(petsc.world(), 10, "x")?;
//! x.set_all(2.0)?;
//! assert_eq!(x.norm(NormType::NORM_1)?, 20.0);
//!
//! petsc_println!(petsc.world(), "Hello from {} process(es)", petsc.world().size())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error handling
//!
//! Every fallible call returns [`Result`]. Errors carry a [`PetscErrorKind`] (which has the
//! same numeric code as the matching PETSc error), a message and the location it was raised
//! at. The kinds group as follows:
//!
//! | situation | kind |
//! |-----------|------|
//! | bad sizes or partitions at creation | `PETSC_ERROR_ARG_SIZ`, `PETSC_ERROR_ARG_INCOMP` |
//! | invalid argument | `PETSC_ERROR_ARG_WRONG`, `PETSC_ERROR_ARG_OUTOFRANGE` |
//! | object not assembled or set up | `PETSC_ERROR_ARG_WRONGSTATE` |
//! | collective called inconsistently, group aborted | `PETSC_ERROR_MPI` |
//! | file access | `PETSC_ERROR_FILE_OPEN`, `PETSC_ERROR_FILE_READ`, `PETSC_ERROR_FILE_WRITE` |
//! | solver did not converge (only when requested) | `PETSC_ERROR_NOT_CONVERGED` |

#![macro_use]
pub(crate) mod internal_macros;

pub(crate) mod raw;

pub mod comm;
pub mod options;
pub mod vector;
pub mod mat;
pub mod indexset;
pub mod dm;
pub mod ksp;
mod preconditioner;
pub mod pc { pub use crate::preconditioner::*; }
pub mod viewer;

pub mod prelude {
    //! Everything needed to write programs with this crate.
    pub use crate::{
        Petsc,
        PetscError,
        PetscErrorKind,
        PetscObject,
        PetscInt,
        PetscReal,
        PetscScalar,
        InsertMode,
        petsc_println,
        petsc_println_sync,
        comm::{self, Communicator, Rank, ReduceOp, },
        options::PetscOpt,
        vector::{self, Vector, NormType, VectorView, VectorViewMut, BorrowVectorMut, BorrowVector, ArrayAccessMode, },
        mat::{self, Mat, MatAssemblyType, MatOption, MatType, },
        indexset::{self, IS, ISIndices, ISType, CopyMode, },
        dm::{self, DM, DMBoundaryType, DMDAStencilType, DMDALocalInfo, },
        ksp::{self, KSP, KSPType, KSPConvergedReason, },
        pc::{self, PC, PCType, },
        viewer::{self, Viewer, ViewerType, FileMode, ViewerFormat, PetscViewable, PetscBinaryData, },
    };
}

use comm::Communicator;

/// Integer type used for indices and sizes.
#[cfg(not(feature = "petsc-int-i64"))]
pub type PetscInt = i32;
/// Integer type used for indices and sizes.
#[cfg(feature = "petsc-int-i64")]
pub type PetscInt = i64;

/// Floating point type.
#[cfg(not(feature = "petsc-real-f32"))]
pub type PetscReal = f64;
/// Floating point type.
#[cfg(feature = "petsc-real-f32")]
pub type PetscReal = f32;

/// Scalar type stored in vectors and matrices.
pub type PetscScalar = PetscReal;

/// Prints to standard out, only from the first processor in the communicator.
/// Calls from other processes are ignored.
///
/// Evaluates to a [`Result<()>`](crate::Result).
#[macro_export]
macro_rules! petsc_println {
    ($world:expr) => ($crate::Petsc::print($world, "\n"));
    ($world:expr, $($arg:tt)*) => ({
        $crate::Petsc::print($world, format!("{}\n", format_args!($($arg)*)))
    })
}

/// Prints to standard out from every process, in rank order.
///
/// This is collective, every process in the communicator must call it.
/// Evaluates to a [`Result<()>`](crate::Result).
#[macro_export]
macro_rules! petsc_println_sync {
    ($world:expr) => ($crate::Petsc::print_sync($world, "\n"));
    ($world:expr, $($arg:tt)*) => ({
        $crate::Petsc::print_sync($world, format!("{}\n", format_args!($($arg)*)))
    })
}

/// PETSc result
pub type Result<T> = std::result::Result<T, PetscError>;

/// Where an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub line: u32,
    pub function: &'static str,
    pub file: &'static str,
}

/// PETSc Error.
/// Can created with [`Petsc::set_error`].
///
/// [`Petsc::set_error`]: Petsc::set_error
#[derive(Debug)]
pub struct PetscError {
    pub(crate) kind: PetscErrorKind,
    pub(crate) error: Box<dyn std::error::Error + Send + Sync>,
    pub(crate) location: Option<ErrorLocation>,
}

/// The kinds of errors. The discriminants are the PETSc error codes.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(i32)]
pub enum PetscErrorKind {
    #[error("Out of memory")]
    PETSC_ERROR_MEM = 55,
    #[error("No support for this operation for this object type")]
    PETSC_ERROR_SUP = 56,
    #[error("Operation done in wrong order")]
    PETSC_ERROR_ORDER = 58,
    #[error("Nonconforming object sizes")]
    PETSC_ERROR_ARG_SIZ = 60,
    #[error("Argument aliasing not permitted")]
    PETSC_ERROR_ARG_IDN = 61,
    #[error("Invalid argument")]
    PETSC_ERROR_ARG_WRONG = 62,
    #[error("Argument out of range")]
    PETSC_ERROR_ARG_OUTOFRANGE = 63,
    #[error("Corrupt argument")]
    PETSC_ERROR_ARG_CORRUPT = 64,
    #[error("Unable to open file")]
    PETSC_ERROR_FILE_OPEN = 65,
    #[error("Read from file failed")]
    PETSC_ERROR_FILE_READ = 66,
    #[error("Write to file failed")]
    PETSC_ERROR_FILE_WRITE = 67,
    #[error("Zero pivot in LU factorization")]
    PETSC_ERROR_MAT_LU_ZRPVT = 71,
    #[error("Object is in wrong state")]
    PETSC_ERROR_ARG_WRONGSTATE = 73,
    #[error("Arguments are incompatible")]
    PETSC_ERROR_ARG_INCOMP = 75,
    #[error("Petsc has generated inconsistent data")]
    PETSC_ERROR_PLIB = 77,
    #[error("Unexpected data in file")]
    PETSC_ERROR_FILE_UNEXPECTED = 79,
    #[error("Arguments must have same communicators")]
    PETSC_ERROR_ARG_NOTSAMECOMM = 80,
    #[error("Error in user-provided function")]
    PETSC_ERROR_USER = 83,
    #[error("Null argument, when expecting valid pointer")]
    PETSC_ERROR_ARG_NULL = 85,
    #[error("Unknown type. Check for miss-spelling or missing package")]
    PETSC_ERROR_ARG_UNKNOWN_TYPE = 86,
    #[error("Error in system call")]
    PETSC_ERROR_SYS = 88,
    #[error("Object Type not set")]
    PETSC_ERROR_ARG_TYPENOTSET = 89,
    #[error("Solver did not converge")]
    PETSC_ERROR_NOT_CONVERGED = 91,
    #[error("Wrong number of processes")]
    PETSC_ERROR_WRONG_MPI_SIZE = 94,
    #[error("General MPI error")]
    PETSC_ERROR_MPI = 98,
}

impl PetscErrorKind {
    /// The numeric PETSc error code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up the kind for a numeric error code.
    ///
    /// ```
    /// # use petsc_raii::PetscErrorKind;
    /// let kind = PetscErrorKind::from_code(73).unwrap();
    /// assert_eq!(kind, PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);
    /// assert_eq!(kind.to_string(), "Object is in wrong state");
    /// assert!(PetscErrorKind::from_code(1).is_none());
    /// ```
    pub fn from_code(code: i32) -> Option<Self> {
        use PetscErrorKind::*;
        const ALL: &[PetscErrorKind] = &[PETSC_ERROR_MEM, PETSC_ERROR_SUP, PETSC_ERROR_ORDER,
            PETSC_ERROR_ARG_SIZ, PETSC_ERROR_ARG_IDN, PETSC_ERROR_ARG_WRONG, PETSC_ERROR_ARG_OUTOFRANGE,
            PETSC_ERROR_ARG_CORRUPT, PETSC_ERROR_FILE_OPEN, PETSC_ERROR_FILE_READ, PETSC_ERROR_FILE_WRITE,
            PETSC_ERROR_MAT_LU_ZRPVT, PETSC_ERROR_ARG_WRONGSTATE, PETSC_ERROR_ARG_INCOMP, PETSC_ERROR_PLIB,
            PETSC_ERROR_FILE_UNEXPECTED, PETSC_ERROR_ARG_NOTSAMECOMM, PETSC_ERROR_USER, PETSC_ERROR_ARG_NULL, PETSC_ERROR_ARG_UNKNOWN_TYPE, PETSC_ERROR_SYS,
            PETSC_ERROR_ARG_TYPENOTSET, PETSC_ERROR_NOT_CONVERGED, PETSC_ERROR_WRONG_MPI_SIZE,
            PETSC_ERROR_MPI];
        ALL.iter().copied().find(|k| k.code() == code)
    }
}

impl PetscError {
    /// Creates an error, for example to stop a solve from a monitor callback.
    pub fn new<E>(kind: PetscErrorKind, err_msg: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>
    {
        PetscError { kind, error: err_msg.into(), location: None }
    }

    pub(crate) fn at(mut self, line: u32, function: &'static str, file: &'static str) -> Self {
        self.location = Some(ErrorLocation { line, function, file });
        self
    }

    /// The kind of error.
    pub fn kind(&self) -> PetscErrorKind {
        self.kind
    }

    /// The numeric PETSc error code.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// The human readable message given when the error was raised.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Where the error was raised, if known.
    pub fn location(&self) -> Option<ErrorLocation> {
        self.location
    }

    /// Prints the error and aborts every process in `world`.
    ///
    /// Use this for errors that can not be handled, so that no other process is left
    /// waiting in a collective operation forever.
    pub fn abort(self, world: &Communicator) -> ! {
        eprintln!("[{}]{}", world.rank(), self);
        log::error!("[{}] aborting process group: {}", world.rank(), self.message());
        world.abort(self.code())
    }
}

impl std::fmt::Display for PetscError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PETSC ERROR: {}", self.error)?;
        write!(f, "PETSC ERROR: {} (error code {})", self.kind, self.code())?;
        if let Some(loc) = self.location {
            write!(f, "\nPETSC ERROR: {}() at {}:{}", loc.function, loc.file, loc.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for PetscError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Either [`INSERT_VALUES`](InsertMode::INSERT_VALUES) to replace existing entries
/// or [`ADD_VALUES`](InsertMode::ADD_VALUES) to add to them.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertMode {
    INSERT_VALUES,
    ADD_VALUES,
}

impl InsertMode {
    #[inline]
    pub(crate) fn apply(self, dst: &mut PetscScalar, val: PetscScalar) {
        match self {
            InsertMode::INSERT_VALUES => *dst = val,
            InsertMode::ADD_VALUES => *dst += val,
        }
    }
}

#[derive(Default)]
pub struct PetscBuilder
{
    world: Option<Communicator>,
    args: Option<Vec<String>>,
    file: Option<String>,
    help_msg: Option<String>,
}

/// Allows you to call [`PetscBuilder::init`] with optional parameters.
///
/// ```
/// # use petsc_raii::prelude::*;
/// let petsc = Petsc::builder()
///     .args(std::env::args())
///     .help_msg("Hello, this is a help message\n")
///     .init().unwrap();
/// ```
///
/// [`PetscBuilder::init`]: PetscBuilder::init
impl PetscBuilder
{
    /// Initializes the options database and the object registry of this process.
    /// Must be called once per process before any object is created, and the
    /// returned [`Petsc`] must outlive every object.
    pub fn init(self) -> Result<Petsc>
    {
        let world = self.world.unwrap_or_else(Communicator::world);

        let mut options = options::OptionsDb::default();
        if let Some(args) = self.args {
            options.insert_args(args);
        }
        if let Some(file) = self.file.as_ref().filter(|f| !f.is_empty()) {
            chkerrq!(&world, options.insert_file(file))?;
        }
        if let Some(file) = options.get_string("-options_file") {
            chkerrq!(&world, options.insert_file(&file))?;
        }
        let show_help = options.has_name("-help");

        chkerrq!(&world, raw::sys::initialize(world.rank(), options))?;
        log::debug!("[{}] PETSc initialized on a group of {} process(es)", world.rank(), world.size());

        let petsc = Petsc { world };
        if show_help {
            if let Some(help) = self.help_msg {
                Petsc::print(petsc.world(), help)?;
            }
        }

        Ok(petsc)
    }

    /// The command line arguments
    /// Must start with the name of the program (the first `String` of `std::env::args()`).
    /// Most of the time just use `std::env::args()` as input.
    pub fn args<T>(mut self, args: T) -> Self
    where
        T: std::iter::IntoIterator<Item = String>
    {
        self.args = Some(args.into_iter().collect());
        self
    }

    /// Sets the communicator PETSc runs on. By default this is
    /// [`Communicator::world()`], a group with only this process.
    pub fn world(mut self, world: Communicator) -> Self
    {
        self.world = Some(world);
        self
    }

    /// Help message to print when `-help` is given.
    pub fn help_msg<T: ToString>(mut self, help_msg: T) -> Self
    {
        self.help_msg = Some(help_msg.to_string());
        self
    }

    /// Options database file. Each line is of the form `-name value`, and `#` starts a comment.
    /// Use empty string (or don't call this method) to not read a file.
    pub fn file<T: ToString>(mut self, file: T) -> Self
    {
        self.file = Some(file.to_string());
        self
    }
}

/// A Petsc is a wrapper around PETSc initialization and Finalization.
/// Also stores the communicator the process runs on.
pub struct Petsc {
    pub(crate) world: Communicator,
}

// Destructor
impl Drop for Petsc {
    fn drop(&mut self) {
        if let Some(leaks) = raw::sys::finalize() {
            for (class, count) in leaks {
                log::warn!("[{}] {} {} object(s) were not destroyed before PetscFinalize()",
                    self.world.rank(), count, class);
            }
        }
        log::debug!("[{}] PETSc finalized", self.world.rank());
    }
}

impl Petsc {
    /// Creates a [`PetscBuilder`] which allows you to specify arguments.
    pub fn builder() -> PetscBuilder
    {
        PetscBuilder::default()
    }

    /// Initializes without command line arguments, on [`Communicator::world()`].
    ///
    /// If you want to pass in Arguments use [`Petsc::builder`].
    ///
    /// ```
    /// let petsc = petsc_raii::Petsc::init_no_args();
    /// ```
    ///
    /// [`Petsc::builder`]: Petsc::builder
    pub fn init_no_args() -> Result<Self> {
        Petsc::builder().init()
    }

    /// Gets a reference to the communicator every object is created on.
    pub fn world<'a>(&'a self) -> &'a Communicator {
        &self.world
    }

    /// Internal error checker
    /// replacement for the CHKERRQ macro in the C api.
    ///
    /// Records where the error was seen if it has no location yet, and logs a traceback line.
    #[doc(hidden)]
    pub(crate) fn check_error<T>(world: &Communicator, line: u32, func_name: &'static str, file_name: &'static str,
        res: Result<T>) -> Result<T>
    {
        res.map_err(|mut err| {
            log::debug!("[{}] PETSC ERROR: {}() at {}:{} {}", world.rank(), func_name, file_name, line, err.kind);
            if err.location.is_none() {
                err.location = Some(ErrorLocation { line, function: func_name, file: file_name });
            }
            err
        })
    }

    /// Function to call when an error has been detected.
    /// replacement for the SETERRQ macro in the C api.
    /// Will always return an `Err`.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// let petsc = petsc_raii::Petsc::init_no_args().unwrap();
    /// if petsc.world().size() == 1 {
    ///     assert!(Petsc::set_error(petsc.world(), PetscErrorKind::PETSC_ERROR_WRONG_MPI_SIZE, "This is a multiprocessor example only!").is_err());
    /// }
    /// ```
    pub fn set_error<E>(world: &Communicator, error_kind: PetscErrorKind, err_msg: E) -> Result<()>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>
    {
        Petsc::set_error2(world, None, None, None, error_kind, err_msg)
    }

    /// Same as [`Petsc::set_error()`] but records the location. Used by the `seterrq!` macro.
    #[doc(hidden)]
    pub(crate) fn set_error2<E>(world: &Communicator, line: Option<u32>, func_name: Option<&'static str>,
        file_name: Option<&'static str>, error_kind: PetscErrorKind, err_msg: E) -> Result<()>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>
    {
        let mut error = PetscError::new(error_kind, err_msg);
        if let (Some(line), Some(function), Some(file)) = (line, func_name, file_name) {
            error = error.at(line, function, file);
        }
        log::debug!("[{}] PETSC ERROR: {}", world.rank(), error.error);
        Err(error)
    }

    /// Prints the error and aborts the group if `res` is an error, otherwise returns the value.
    pub fn abort_on_error<T>(&self, res: Result<T>) -> T {
        match res {
            Ok(val) => val,
            Err(err) => err.abort(self.world()),
        }
    }

    /// replacement for the `PetscPrintf` function in the C api. You can also use the [`petsc_println`] macro
    /// to have string formatting.
    /// Prints to standard out, only from the first processor in the communicator. Calls from other processes are ignored.
    ///
    /// [`petsc_println`]: petsc_println
    pub fn print<T: ToString>(world: &Communicator, msg: T) -> Result<()> {
        if world.rank() == 0 {
            use std::io::Write;
            let mut out = std::io::stdout().lock();
            let res = out.write_all(msg.to_string().as_bytes()).and_then(|_| out.flush());
            if let Err(e) = res {
                return seterrq!(world, PetscErrorKind::PETSC_ERROR_SYS, format!("Unable to write to stdout: {}", e));
            }
        }
        Ok(())
    }

    /// replacement for the `PetscSynchronizedPrintf` and `PetscSynchronizedFlush` pair in the C api.
    /// Every process gives a message and they are printed by the first process in rank order.
    ///
    /// This is collective.
    pub fn print_sync<T: ToString>(world: &Communicator, msg: T) -> Result<()> {
        let all = world.gather(0, msg.to_string())?;
        if let Some(all) = all {
            Petsc::print(world, all.concat())?;
        }
        Ok(())
    }

    /// Gets a boolean option from the options database.
    ///
    /// A name given without a value counts as `true`.
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// let petsc = Petsc::builder()
    ///     .args(["prog", "-use_jacobi", "-view", "false"].iter().map(|s| s.to_string()))
    ///     .init().unwrap();
    /// assert_eq!(petsc.options_try_get_bool("-use_jacobi").unwrap(), Some(true));
    /// assert_eq!(petsc.options_try_get_bool("-view").unwrap(), Some(false));
    /// assert_eq!(petsc.options_try_get_bool("-missing").unwrap(), None);
    /// ```
    pub fn options_try_get_bool(&self, name: &str) -> Result<Option<bool>> {
        chkerrq!(self.world(), raw::sys::with_options(|db| db.get_bool(name)))
    }

    /// Gets an integer option from the options database.
    pub fn options_try_get_int(&self, name: &str) -> Result<Option<PetscInt>> {
        chkerrq!(self.world(), raw::sys::with_options(|db| db.get_int(name)))
    }

    /// Gets a real option from the options database.
    pub fn options_try_get_real(&self, name: &str) -> Result<Option<PetscReal>> {
        chkerrq!(self.world(), raw::sys::with_options(|db| db.get_real(name)))
    }

    /// Gets a string option from the options database.
    pub fn options_try_get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(raw::sys::with_options(|db| db.get_string(name)))
    }

    /// Checks if an option was given, with or without a value.
    pub fn options_has_name(&self, name: &str) -> bool {
        raw::sys::with_options(|db| db.has_name(name))
    }

    /// Sets an option in the database, overriding what was given on the command line.
    ///
    /// Fails with [`PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE`] on a thread where this
    /// context was not initialized.
    pub fn options_set_value(&self, name: &str, value: impl Into<Option<String>>) -> Result<()> {
        let value = value.into();
        chkerrq!(self.world(), raw::sys::with_options_mut(|db| db.set_value(name, value)))
    }

    /// Creates an empty vector object.
    /// Same as [`Vector::create`](crate::vector::Vector::create).
    ///
    /// ```
    /// # use petsc_raii::prelude::*;
    /// let petsc = Petsc::init_no_args().unwrap();
    /// petsc.vec_create().unwrap();
    /// ```
    pub fn vec_create(&self) -> Result<crate::vector::Vector> {
        crate::vector::Vector::create(self.world())
    }

    /// Creates an empty matrix object.
    /// Same as [`Mat::create`](crate::mat::Mat::create).
    pub fn mat_create(&self) -> Result<crate::mat::Mat> {
        crate::mat::Mat::create(self.world())
    }

    /// Creates the default KSP context.
    /// Same as [`KSP::create`](crate::ksp::KSP::create).
    pub fn ksp_create<'a, 'tl, 'bl>(&'a self) -> Result<crate::ksp::KSP<'a, 'tl, 'bl>> {
        crate::ksp::KSP::create(self.world())
    }
}

/// Gives the wrapper access to the backend object it owns.
///
/// Only used at the boundary with the backend, never exposed to crate users.
pub(crate) trait PetscAsRaw {
    type Raw;

    fn as_raw(&self) -> &Self::Raw;
}

/// Mutable version of [`PetscAsRaw`].
pub(crate) trait PetscAsRawMut: PetscAsRaw {
    fn as_raw_mut(&mut self) -> &mut Self::Raw;
}

/// Methods shared by every PETSc object.
pub trait PetscObject<'a> {
    /// The communicator the object lives on.
    fn world(&self) -> &'a Communicator;

    /// Gets the name of the object. Objects that were never named get a generated name.
    fn get_name(&self) -> Result<String>;

    /// Sets the name of the object, used when viewing it.
    fn set_name<T: ToString>(&mut self, name: T) -> Result<()>;

    /// The class name, for example `"Vec"`.
    fn get_class_name(&self) -> &'static str;
}
