//! The options database.
//!
//! Options come from the command line given to [`PetscBuilder::args()`](crate::PetscBuilder::args()),
//! from an options file, or are set with [`Petsc::options_set_value()`](crate::Petsc::options_set_value()).
//! Objects read them in their `set_from_options` methods.
//!
//! An option is a name starting with `-`, optionally followed by a value:
//! `-ksp_type gmres -ksp_rtol 1e-8 -ksp_monitor`. Names are case insensitive.

use std::collections::HashMap;
use std::str::FromStr;

use crate::{Petsc, PetscInt, PetscReal, Result};

/// Types that can be built from the options database.
///
/// ```
/// # use petsc_raii::prelude::*;
/// struct Opt { m: PetscInt, view: bool }
///
/// impl PetscOpt for Opt {
///     fn from_petsc(petsc: &Petsc) -> petsc_raii::Result<Self> {
///         Ok(Opt {
///             m: petsc.options_try_get_int("-m")?.unwrap_or(8),
///             view: petsc.options_try_get_bool("-view")?.unwrap_or(false),
///         })
///     }
/// }
///
/// let petsc = Petsc::builder()
///     .args(["prog", "-m", "20"].iter().map(|s| s.to_string()))
///     .init().unwrap();
/// let opt = Opt::from_petsc(&petsc).unwrap();
/// assert_eq!(opt.m, 20);
/// assert!(!opt.view);
/// ```
pub trait PetscOpt: Sized {
    fn from_petsc(petsc: &Petsc) -> Result<Self>;
}

/// Names mapped to optional values.
#[derive(Debug, Default, Clone)]
pub struct OptionsDb {
    values: HashMap<String, Option<String>>,
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('-').to_ascii_lowercase()
}

fn is_option_name(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1 && token.parse::<f64>().is_err()
}

impl OptionsDb {
    /// Adds options from command line arguments. The first argument is the program name and is skipped.
    ///
    /// ```
    /// # use petsc_raii::options::OptionsDb;
    /// let mut db = OptionsDb::default();
    /// db.insert_args(["prog", "-n", "-3", "-ksp_monitor", "-KSP_TYPE", "cg"].iter().map(|s| s.to_string()));
    /// assert_eq!(db.get_int("-n").unwrap(), Some(-3));
    /// assert!(db.has_name("-ksp_monitor"));
    /// assert_eq!(db.get_string("-ksp_type").as_deref(), Some("cg"));
    /// ```
    pub fn insert_args<I>(&mut self, args: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut tokens = args.into_iter().skip(1).peekable();
        while let Some(token) = tokens.next() {
            if !is_option_name(&token) {
                log::warn!("ignoring command line argument `{}`, it is not an option name", token);
                continue;
            }
            let value = match tokens.peek() {
                Some(next) if !is_option_name(next) => tokens.next(),
                _ => None,
            };
            self.values.insert(normalize(&token), value);
        }
    }

    /// Adds options from a file with one `-name value` per line. `#` starts a comment.
    pub fn insert_file(&mut self, path: &str) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| petsc_err!(FILE_OPEN, "Unable to open options file {}: {}", path, e))?;
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or("");
            if !is_option_name(name) {
                return Err(petsc_err!(FILE_UNEXPECTED, "{}:{}: expected an option name, found `{}`",
                    path, lineno + 1, name));
            }
            let value = parts.next().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
            self.values.insert(normalize(name), value);
        }
        Ok(())
    }

    /// Was the option given, with or without a value.
    pub fn has_name(&self, name: &str) -> bool {
        self.values.contains_key(&normalize(name))
    }

    /// Sets or replaces an option.
    pub fn set_value(&mut self, name: &str, value: Option<String>) {
        self.values.insert(normalize(name), value);
    }

    /// Removes an option.
    pub fn clear_value(&mut self, name: &str) {
        self.values.remove(&normalize(name));
    }

    /// The value of an option. An option given without a value gives an empty string.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.values.get(&normalize(name)).map(|v| v.clone().unwrap_or_default())
    }

    /// A boolean option. An option given without a value is `true`.
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.values.get(&normalize(name)) {
            None => Ok(None),
            Some(None) => Ok(Some(true)),
            Some(Some(v)) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(petsc_err!(ARG_WRONG, "Unknown logical value `{}` for option {}", v, name)),
            },
        }
    }

    fn parse<T: FromStr>(&self, name: &str, what: &str) -> Result<Option<T>> {
        match self.values.get(&normalize(name)) {
            None => Ok(None),
            Some(None) => Err(petsc_err!(ARG_WRONG, "Option {} needs a {} value", name, what)),
            Some(Some(v)) => v.parse().map(Some)
                .map_err(|_| petsc_err!(ARG_WRONG, "Input string `{}` for option {} is not a {}", v, name, what)),
        }
    }

    /// An integer option.
    pub fn get_int(&self, name: &str) -> Result<Option<PetscInt>> {
        self.parse(name, "integer")
    }

    /// A real option.
    pub fn get_real(&self, name: &str) -> Result<Option<PetscReal>> {
        self.parse(name, "real")
    }

    /// Every option as `(name, value)`, sorted by name.
    pub fn entries(&self) -> Vec<(String, Option<String>)> {
        let mut all = self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>();
        all.sort();
        all
    }
}
