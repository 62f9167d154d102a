//! Macros for internal use.
//!
//! This could be for generating wrappers or for things that shouldn't be exposed to crate users.

#![macro_use]

/// Internal macro used to make wrappers of "simple" backend functions
///
/// This macro wraps a "simple" function of the `raw` backend that takes the communicator,
/// the object and any number of inputs, and returns a `crate::Result` of its output.
/// You can also set if the function takes a mutable reference to self or immutable.
/// These can be repeated multiple times to define multiple methods in one macro call.
/// Also supports doc strings.
/// It is "simple" if no type conversion is needed between the wrapper types and the ones used by
/// the backend, other than `.into()`.
///
/// # Usage
///
/// Say we have a backend function like `raw::vec::norm` which is defined to be
/// `pub(crate) fn norm(comm: &Communicator, x: &VecData, ty: NormType) -> crate::Result<PetscReal>`
/// and we want our rust wrapper to be `pub fn norm(&self, norm_type: NormType) -> crate::Result<PetscReal>`.
/// We can then use this macro in the following way:
///
/// ```ignore
/// wrap_simple_petsc_member_funcs! {
///     raw::vec::norm, pub norm, input NormType, norm_type,
///         output PetscReal, #[doc = "Computes the vector norm."];
/// }
/// ```
///
/// For a more general case, say the backend function takes a second object:
/// ```ignore
/// impl Vector<'_> {
///     wrap_simple_petsc_member_funcs! {
///         raw::vec::axpy, pub axpy, input PetscScalar, alpha, input &Vector,
///             other .as_raw, takes mut, #[doc = "doc-string"];
/// //                 ^          ^
/// //                 │          └ If you want the method to take a `&mut self` put `takes mut,`
/// //                 └ apply a simple method to an input before the `.into()`
///     }
/// }
/// ```
///
/// The number of inputs, the output and if it takes a mutable reference to self are
/// all optional.
///
/// Note, for the macro to work, the type must implement `crate::PetscAsRaw` and have a `world` member.
/// This can be done with the [`impl_petsc_object_traits!`] macro.
macro_rules! wrap_simple_petsc_member_funcs {
    (@raw $self:ident mut) => { crate::PetscAsRawMut::as_raw_mut($self) };
    (@raw $self:ident) => { crate::PetscAsRaw::as_raw($self) };
    {$(
        $raw_func:path, $vis_par:vis $new_func:ident,
        $(input $param_type:ty, $param_name:ident $(.$as_raw_fn:ident)? ,)*
        $(output $ret_type:ty,)?
        $(takes $mut_tag:tt,)? $( #[$att:meta] )+;
    )*} => {
$(
    $( #[$att] )+
    #[allow(unused_parens)]
    $vis_par fn $new_func(& $($mut_tag)? self, $( $param_name: $param_type ),*)
        -> crate::Result<($( $ret_type )?)>
    {
        let world = self.world;
        chkerrq!(world, $raw_func(
            world,
            wrap_simple_petsc_member_funcs!(@raw self $($mut_tag)?),
            $( $param_name $(.$as_raw_fn())?.into() ),*
        ))
    }
)*
    };
}

/// Implements [`PetscAsRaw`](crate::PetscAsRaw), [`PetscAsRawMut`](crate::PetscAsRawMut),
/// [`PetscObject`](crate::PetscObject) and [`Drop`](::std::ops::Drop).
///
/// The raw type must have a `hdr: raw::PetscHeader` member and the destroy function has the
/// signature `fn(&mut Raw) -> Result<()>`.
///
/// You can run this macro on multiple structs at a time:
/// ```ignore
/// impl_petsc_object_traits! {
///     Vector, vec_p, raw::vec::VecData, raw::vec::destroy;
///     IS, is_p, raw::is::IsData<'bv>, raw::is::destroy, 'bv;
/// }
/// ```
macro_rules! impl_petsc_object_traits {
    {$(
        $struct_name:ident, $raw_var:ident, $raw_ty:ty, $raw_destroy_func:path $(, $add_lt:lifetime)* ;
    )*} => {
    $(
        impl<'a $(, $add_lt)*> crate::PetscAsRaw for $struct_name<'a, $( $add_lt ),*> {
            type Raw = $raw_ty;

            #[inline]
            fn as_raw(&self) -> &Self::Raw {
                &self.$raw_var
            }
        }

        impl<'a $(, $add_lt)*> crate::PetscAsRawMut for $struct_name<'a, $( $add_lt ),*> {
            #[inline]
            fn as_raw_mut(&mut self) -> &mut Self::Raw {
                &mut self.$raw_var
            }
        }

        impl<'a $(, $add_lt)*> crate::PetscObject<'a> for $struct_name<'a, $( $add_lt ),*> {
            #[inline]
            fn world(&self) -> &'a crate::comm::Communicator {
                self.world
            }

            fn get_name(&self) -> crate::Result<String> {
                Ok(self.$raw_var.hdr.name())
            }

            fn set_name<T: ToString>(&mut self, name: T) -> crate::Result<()> {
                self.$raw_var.hdr.set_name(name.to_string());
                Ok(())
            }

            fn get_class_name(&self) -> &'static str {
                self.$raw_var.hdr.class_name()
            }
        }

        impl<'a $(, $add_lt)*> ::std::ops::Drop for $struct_name<'a, $( $add_lt ),*> {
            fn drop(&mut self) {
                let res = $raw_destroy_func(&mut self.$raw_var);
                if let Err(err) = chkerrq!(self.world, res) {
                    log::error!("[{}] failed to destroy {}: {}", self.world.rank(),
                        stringify!($struct_name), err.message());
                }
            }
        }
    )*
    };
}

/// Implements [`viewer::PetscViewable`](crate::viewer::PetscViewable) with a backend view
/// function of the signature `fn(&Communicator, &Raw, &ViewerData) -> Result<()>`.
///
/// Viewing without a viewer writes to standard out.
///
/// ```ignore
/// impl_petsc_view_func! {
///     Vector, vec_p, raw::viewer::vec_view;
///     IS, is_p, raw::is::view, 'bv;
/// }
/// ```
macro_rules! impl_petsc_view_func {
    {$(
        $struct_name:ident, $raw_var:ident, $raw_view_func:path $(, $add_lt:lifetime)* ;
    )*} => {
    $(
        impl<'a $(, $add_lt)*> crate::viewer::PetscViewable for $struct_name<'a, $( $add_lt ),*> {
            /// Views the object with a viewer
            fn view_with<'vl, 'val: 'vl>(&self, viewer: impl Into<Option<&'vl crate::viewer::Viewer<'val>>>) -> crate::Result<()> {
                let owned_viewer;
                let viewer = match viewer.into() {
                    Some(viewer) => viewer,
                    None => {
                        owned_viewer = crate::viewer::Viewer::create_ascii_stdout(self.world)?;
                        &owned_viewer
                    }
                };
                chkerrq!(self.world, $raw_view_func(self.world, &self.$raw_var, crate::PetscAsRaw::as_raw(viewer)))
            }
        }
    )*
    };
}

/// This macro returns the name of the enclosing function. As the internal
/// implementation is based on the [`std::any::type_name`], this macro
/// derives all the limitations of this function.
///
/// Rust doesn't have a built in way of doing this yet: <https://github.com/rust-lang/rfcs/issues/1743>.
macro_rules! function_name {
    () => {{
        #[allow(dead_code)]
        fn f() {}
        #[allow(dead_code)]
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        &name[..name.len() - 3]
    }};
}

/// Calls [`Petsc::check_error()`](crate::Petsc::check_error()) with the line number, function name, and file name added.
///
/// Because [`Petsc::check_error`](crate::Petsc::check_error()) and [`function_name!`] are not exposed to create users
/// this macro is only intended for internal use.
macro_rules! chkerrq {
    ($world:expr, $res:expr) => {{
        crate::Petsc::check_error(
            $world,
            line!(),
            function_name!(),
            file!(),
            $res,
        )
    }};
}

/// Calls [`Petsc::set_error2()`](crate::Petsc::set_error2()) with the line number, function name, and file name added.
///
/// For now, this macro is only intended for internal use.
macro_rules! seterrq {
    ($world:expr, $err_kind:expr, $err_msg:expr) => {{
        crate::Petsc::set_error2(
            $world,
            Some(line!()),
            Some(function_name!()),
            Some(file!()),
            $err_kind,
            $err_msg,
        )
    }};
}

/// Builds a [`PetscError`](crate::PetscError) located at the call site, from a kind and a format string.
///
/// The backend uses this where it has no communicator at hand; the short kind name drops the
/// `PETSC_ERROR_` prefix.
///
/// ```ignore
/// return Err(petsc_err!(ARG_OUTOFRANGE, "index {} out of range [0, {})", i, n));
/// ```
macro_rules! petsc_err {
    ($kind:ident, $($arg:tt)*) => {{
        crate::PetscError::new(crate::raw::kind::$kind, format!($($arg)*))
            .at(line!(), function_name!(), file!())
    }};
}
