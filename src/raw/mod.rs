//! The native objects behind the public handles.
//!
//! Every function here takes the communicator of the object it works on and returns
//! [`crate::Result`]. Nothing in this module is visible outside of the crate; the handle
//! types reach it through [`PetscAsRaw`](crate::PetscAsRaw).

pub(crate) mod sys;
pub(crate) mod layout;
pub(crate) mod vec;
pub(crate) mod scatter;
pub(crate) mod mat;
pub(crate) mod is;
pub(crate) mod da;
pub(crate) mod pc;
pub(crate) mod ksp;
pub(crate) mod viewer;

/// Short names for the error kinds, used by `petsc_err!`.
#[allow(unused_imports)]
pub(crate) mod kind {
    pub(crate) use crate::PetscErrorKind::{
        PETSC_ERROR_MEM as MEM,
        PETSC_ERROR_SUP as SUP,
        PETSC_ERROR_ORDER as ORDER,
        PETSC_ERROR_ARG_SIZ as ARG_SIZ,
        PETSC_ERROR_ARG_IDN as ARG_IDN,
        PETSC_ERROR_ARG_WRONG as ARG_WRONG,
        PETSC_ERROR_ARG_OUTOFRANGE as ARG_OUTOFRANGE,
        PETSC_ERROR_ARG_CORRUPT as ARG_CORRUPT,
        PETSC_ERROR_FILE_OPEN as FILE_OPEN,
        PETSC_ERROR_FILE_READ as FILE_READ,
        PETSC_ERROR_FILE_WRITE as FILE_WRITE,
        PETSC_ERROR_MAT_LU_ZRPVT as MAT_LU_ZRPVT,
        PETSC_ERROR_ARG_WRONGSTATE as ARG_WRONGSTATE,
        PETSC_ERROR_ARG_INCOMP as ARG_INCOMP,
        PETSC_ERROR_PLIB as PLIB,
        PETSC_ERROR_FILE_UNEXPECTED as FILE_UNEXPECTED,
        PETSC_ERROR_ARG_NOTSAMECOMM as ARG_NOTSAMECOMM,
        PETSC_ERROR_USER as USER,
        PETSC_ERROR_ARG_NULL as ARG_NULL,
        PETSC_ERROR_ARG_UNKNOWN_TYPE as ARG_UNKNOWN_TYPE,
        PETSC_ERROR_SYS as SYS,
        PETSC_ERROR_ARG_TYPENOTSET as ARG_TYPENOTSET,
        PETSC_ERROR_NOT_CONVERGED as NOT_CONVERGED,
        PETSC_ERROR_WRONG_MPI_SIZE as WRONG_MPI_SIZE,
        PETSC_ERROR_MPI as MPI,
    };
}

/// The classes of objects the registry keeps count of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ClassId {
    Vec,
    Mat,
    IS,
    DM,
    KSP,
    PC,
    Viewer,
    VecScatter,
}

impl ClassId {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ClassId::Vec => "Vec",
            ClassId::Mat => "Mat",
            ClassId::IS => "IS",
            ClassId::DM => "DM",
            ClassId::KSP => "KSP",
            ClassId::PC => "PC",
            ClassId::Viewer => "Viewer",
            ClassId::VecScatter => "VecScatter",
        }
    }
}

/// Common part of every native object. A header without a class is the null object.
#[derive(Debug, Default)]
pub(crate) struct PetscHeader {
    id: u64,
    class: Option<ClassId>,
    name: Option<String>,
}

impl PetscHeader {
    /// Registers a new live object of the given class.
    pub(crate) fn new(class: ClassId) -> crate::Result<Self> {
        let id = sys::register(class)?;
        log::debug!("[{}] created {} {}", sys::rank(), class.name(), id);
        Ok(PetscHeader { id, class: Some(class), name: None })
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.class.is_none()
    }

    pub(crate) fn class_name(&self) -> &'static str {
        self.class.map_or("(null)", ClassId::name)
    }

    pub(crate) fn name(&self) -> String {
        match (&self.name, self.class) {
            (Some(name), _) => name.clone(),
            (None, Some(class)) => format!("{}_{}", class.name(), self.id),
            (None, None) => String::new(),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

impl Drop for PetscHeader {
    fn drop(&mut self) {
        if let Some(class) = self.class.take() {
            log::debug!("[{}] destroyed {} {}", sys::rank(), class.name(), self.id);
            sys::unregister(class);
        }
    }
}

/// Fails with a null argument error if the object was released or moved out.
pub(crate) fn check_valid(hdr: &PetscHeader, what: &str) -> crate::Result<()> {
    if hdr.is_null() {
        Err(petsc_err!(ARG_NULL, "Null object: {}", what))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_counted_until_dropped() {
        assert_eq!(PetscHeader::new(ClassId::Vec).unwrap_err().kind(), crate::PetscErrorKind::PETSC_ERROR_ARG_WRONGSTATE);

        sys::initialize(0, crate::options::OptionsDb::default()).unwrap();
        let mut a = PetscHeader::new(ClassId::Vec).unwrap();
        let b = PetscHeader::new(ClassId::Vec).unwrap();
        assert_eq!(sys::live_count(ClassId::Vec), 2);
        assert!(a.name().starts_with("Vec_"));
        a.set_name("x".into());
        assert_eq!(a.name(), "x");

        drop(b);
        assert_eq!(sys::live_count(ClassId::Vec), 1);
        assert!(check_valid(&PetscHeader::default(), "x").is_err());

        let leaks = sys::finalize().unwrap();
        assert_eq!(leaks, vec![("Vec", 1)]);
        drop(a);
    }
}
