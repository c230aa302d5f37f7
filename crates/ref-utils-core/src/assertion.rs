//! Exception-free file assertions.
//!
//! Each check returns `false` instead of failing, and prints an
//! `AssertionError` line so the student sees what was missing. Errors while
//! inspecting the path (missing, permission denied) count as `false`.

use crate::output::print_err;
use nix::unistd::{AccessFlags, access};
use std::path::Path;

fn check(condition: bool, message: impl FnOnce() -> String) -> bool {
    if !condition {
        print_err(format!("AssertionError: {}", message()));
    }
    condition
}

/// Path exists and is a regular file (symlinks are followed)
pub fn assert_is_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    check(path.is_file(), || format!("File {} not found", path.display()))
}

/// Path exists and is a directory
pub fn assert_is_dir(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    check(path.is_dir(), || {
        format!("Directory {} not found", path.display())
    })
}

/// Path is a regular file the current process may execute
pub fn assert_is_exec(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let executable = path.is_file() && access(path, AccessFlags::X_OK).is_ok();
    check(executable, || {
        format!(
            "Executable file {} not found or not executable",
            path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("solution.py");
        fs::write(&file, "print('hi')\n").unwrap();

        assert!(assert_is_file(&file));
        assert!(!assert_is_dir(&file));
        assert!(!assert_is_file(dir.path().join("missing.py")));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(assert_is_dir(dir.path()));
        assert!(!assert_is_file(dir.path()));
        assert!(!assert_is_exec(dir.path()));
        assert!(!assert_is_dir(dir.path().join("nope")));
    }

    #[test]
    fn executable_bit_decides() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\necho ok\n").unwrap();

        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!assert_is_exec(&script));

        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(assert_is_exec(&script));
    }
}
