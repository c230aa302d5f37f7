//! Runs the `ref-utils` binary the way a grading script would

use std::process::{Command, Output};

fn ref_utils(args: &[&str], no_lint: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ref-utils"));
    cmd.arg("--inherit").args(args).env_remove("NO_LINT");
    if let Some(value) = no_lint {
        cmd.env("NO_LINT", value);
    }
    cmd.output().expect("failed to start ref-utils")
}

const MISSING_PYLINT: &[&str] = &["pylint", "--pylint", "/nonexistent/pylint", "solution.py"];
const MISSING_MYPY: &[&str] = &["mypy", "--mypy", "/nonexistent/mypy", "solution.py"];

#[test]
fn no_lint_skips_missing_linters() {
    assert!(ref_utils(MISSING_PYLINT, Some("1")).status.success());
    assert!(ref_utils(MISSING_MYPY, Some("1")).status.success());
}

#[test]
fn linting_runs_without_no_lint() {
    assert!(!ref_utils(MISSING_PYLINT, None).status.success());
    assert!(!ref_utils(MISSING_PYLINT, Some("0")).status.success());
    assert!(!ref_utils(MISSING_MYPY, Some("yes")).status.success());
}

#[test]
fn no_lint_covers_check_python() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "print(1)\n").unwrap();
    let root = dir.path().to_string_lossy().into_owned();

    let args = [
        "check-python",
        root.as_str(),
        "--pylint",
        "/nonexistent/pylint",
        "--mypy",
        "/nonexistent/mypy",
    ];
    let skipped = ref_utils(&args, Some("1"));
    let attempted = ref_utils(&args, None);

    assert!(skipped.status.success());
    assert!(!attempted.status.success());
}

#[test]
fn run_passes_binary_output_through() {
    let output = ref_utils(&["--inherit-env", "run", "printf", "\\377\\000ok"], None);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"\xff\x00ok");
}
