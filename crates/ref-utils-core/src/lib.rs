//! # ref-utils
//!
//! Helpers for automated exercise-submission tests.
//!
//! This crate provides small, independent building blocks:
//! - Privilege dropping, either in place or scoped to a forked child
//! - Exception-free file assertions that report and return `bool`
//! - Colored verdict lines on stdout
//! - Subprocess runners with optional timeouts and output checks
//! - pylint / mypy wrappers and the "script prints the flag" check
//! - A tiny registry for environment and submission tests

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod assertion;
pub mod checks;
pub mod config;
pub mod environ;
pub mod error;
pub mod hook;
pub mod output;
pub mod pipe;
pub mod privilege;
pub mod process;
pub mod result;
pub mod suite;

pub use assertion::{assert_is_dir, assert_is_exec, assert_is_file};
pub use checks::{Checker, check_all_python_files, contains_flag, run_mypy, run_pylint};
pub use config::{CheckConfig, Environment, RunOptions};
pub use error::RefUtilsError;
pub use hook::install_non_leaking_panic_hook;
pub use output::{print_err, print_ok, print_warn};
pub use privilege::{Identity, Privileges, drop_to, with_privileges};
pub use process::{run, run_shell};
pub use result::ProcessOutput;
pub use suite::TestSuite;

/// Crate-level result type
pub type Result<T> = std::result::Result<T, RefUtilsError>;

/// Outcome value for passing checks
pub const SUCCESS: bool = true;
/// Outcome value for failing checks
pub const FAILURE: bool = false;
