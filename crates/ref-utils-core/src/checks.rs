//! Checks a submission test typically runs: pylint, mypy and the flag check

use crate::config::CheckConfig;
use crate::output::{indent_block, print_err, print_ok, print_warn};
use crate::process::{self, render_command};
use crate::{FAILURE, RefUtilsError, SUCCESS};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Runs checks with a fixed [`CheckConfig`]
#[derive(Debug, Clone)]
pub struct Checker {
    config: CheckConfig,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new(CheckConfig::from_env())
    }
}

impl Checker {
    #[must_use]
    pub const fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run the submitted script and look for `flag` in what it prints.
    ///
    /// A crash, non-zero exit or timeout counts as not found.
    pub fn contains_flag(&self, flag: &str, script: &Path, silent: bool) -> bool {
        let argv = [self.config.python.as_os_str(), script.as_os_str()];
        let mut options = self.config.run_options();
        options.check = true;
        options.timeout = Some(self.config.flag_timeout);

        let output = match process::run(&argv, &options) {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(script = %script.display(), "flag check run failed: {}", err);
                report_run_error(&err);
                return FAILURE;
            }
        };

        if !output.contains(flag) {
            if !silent {
                print_err("[!] Failed to find flag");
            }
            return FAILURE;
        }

        if !silent {
            print_ok("[+] Correct flag found");
        }
        SUCCESS
    }

    /// Lint `files` with pylint and the configured rcfile
    pub fn run_pylint(&self, files: &[PathBuf]) -> bool {
        if self.skip_lint("pylint", files) {
            return SUCCESS;
        }

        let mut argv: Vec<OsString> = vec![
            self.config.pylint.clone().into(),
            "--exit-zero".into(),
            "--rcfile".into(),
            self.config.pylintrc.clone().into(),
        ];
        argv.extend(absolute(files));

        self.lint("pylint's syntax and coding style checks", &argv)
    }

    /// Type-check `files` with mypy and the configured config file
    pub fn run_mypy(&self, files: &[PathBuf]) -> bool {
        if self.skip_lint("mypy", files) {
            return SUCCESS;
        }

        let mut argv: Vec<OsString> = vec![
            self.config.mypy.clone().into(),
            "--no-error-summary".into(),
            "--config-file".into(),
            self.config.mypy_config.clone().into(),
        ];
        argv.extend(absolute(files));

        self.lint("mypy's type checks", &argv)
    }

    /// Run pylint and mypy over every visible `*.py` file below `root`
    pub fn check_all_python_files(&self, root: &Path) -> bool {
        let files = python_files(root);
        if files.is_empty() {
            return SUCCESS;
        }

        print_ok(format!("[+] Testing {} Python source code files", files.len()));
        let pylint = self.run_pylint(&files);
        let mypy = self.run_mypy(&files);
        pylint && mypy
    }

    fn skip_lint(&self, tool: &str, files: &[PathBuf]) -> bool {
        if self.config.lint_disabled {
            tracing::debug!(tool, "linting disabled via NO_LINT");
            return true;
        }
        files.is_empty()
    }

    fn lint(&self, label: &str, argv: &[OsString]) -> bool {
        tracing::debug!(command = %render_command(argv), "running linter");

        let output = match process::run(argv, &self.config.run_options()) {
            Ok(output) => output,
            Err(err) => {
                report_run_error(&err);
                return FAILURE;
            }
        };

        let text = output.stdout_str();
        let text = text.trim();
        if !text.is_empty() {
            print_warn(format!("[!] {label} failed:"));
            print_warn(indent_block(text));
            return FAILURE;
        }

        print_ok(format!("[+] {label} passed"));
        SUCCESS
    }
}

/// Visible `*.py` files below `root`, sorted
#[must_use]
pub fn python_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && name.ends_with(".py")
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

fn absolute(files: &[PathBuf]) -> impl Iterator<Item = OsString> + '_ {
    files.iter().map(|file| {
        file.canonicalize()
            .unwrap_or_else(|_| file.clone())
            .into_os_string()
    })
}

fn report_run_error(err: &RefUtilsError) {
    match err {
        RefUtilsError::Timeout { .. } | RefUtilsError::Process(_) => print_err(err.to_string()),
        other => print_err(format!("[!] Unexpected error: {other}")),
    }
}

/// [`Checker::contains_flag`] with configuration from the environment
pub fn contains_flag(flag: &str, script: &Path, silent: bool) -> bool {
    Checker::default().contains_flag(flag, script, silent)
}

/// [`Checker::run_pylint`] with configuration from the environment
pub fn run_pylint(files: &[PathBuf]) -> bool {
    Checker::default().run_pylint(files)
}

/// [`Checker::run_mypy`] with configuration from the environment
pub fn run_mypy(files: &[PathBuf]) -> bool {
    Checker::default().run_mypy(files)
}

/// [`Checker::check_all_python_files`] with configuration from the environment
pub fn check_all_python_files(root: &Path) -> bool {
    Checker::default().check_all_python_files(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::Privileges;
    use std::fs;
    use std::time::Duration;

    fn local() -> crate::config::CheckConfigBuilder {
        CheckConfig::builder().privileges(Privileges::Inherit)
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn disabled_lint_never_spawns() {
        let checker = Checker::new(
            local()
                .pylint("/nonexistent/pylint")
                .mypy("/nonexistent/mypy")
                .lint_disabled(true)
                .build(),
        );
        let files = vec![PathBuf::from("solution.py")];
        assert!(checker.run_pylint(&files));
        assert!(checker.run_mypy(&files));
    }

    #[test]
    fn no_files_pass_trivially() {
        let checker = Checker::new(local().pylint("/nonexistent/pylint").build());
        assert!(checker.run_pylint(&[]));
    }

    #[test]
    fn silent_linter_passes_and_chatty_one_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = script(dir.path(), "a.py", "x = 1\n");

        let quiet = Checker::new(local().pylint("true").mypy("true").build());
        assert!(quiet.run_pylint(std::slice::from_ref(&file)));
        assert!(quiet.run_mypy(std::slice::from_ref(&file)));

        // echo repeats its arguments, which reads as lint findings
        let chatty = Checker::new(local().pylint("echo").mypy("echo").build());
        assert!(!chatty.run_pylint(std::slice::from_ref(&file)));
        assert!(!chatty.run_mypy(std::slice::from_ref(&file)));
    }

    #[test]
    fn missing_linter_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = script(dir.path(), "a.py", "x = 1\n");
        let checker = Checker::new(local().pylint("/nonexistent/pylint").build());
        assert!(!checker.run_pylint(&[file]));
    }

    #[test]
    fn flag_must_appear_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let good = script(dir.path(), "good.sh", "echo 'flag{r3f_0k}'\n");
        let bad = script(dir.path(), "bad.sh", "echo 'flag{wrong}'\n");

        let checker = Checker::new(local().python("/bin/sh").build());
        assert!(checker.contains_flag("flag{r3f_0k}", &good, true));
        assert!(!checker.contains_flag("flag{r3f_0k}", &bad, true));
    }

    #[test]
    fn crashing_script_has_no_flag() {
        let dir = tempfile::tempdir().unwrap();
        let crash = script(dir.path(), "crash.sh", "echo 'flag{r3f_0k}'; exit 1\n");
        let slow = script(dir.path(), "slow.sh", "sleep 5; echo 'flag{r3f_0k}'\n");

        let checker = Checker::new(
            local()
                .python("/bin/sh")
                .flag_timeout(Duration::from_millis(200))
                .build(),
        );
        assert!(!checker.contains_flag("flag{r3f_0k}", &crash, true));
        assert!(!checker.contains_flag("flag{r3f_0k}", &slow, true));
    }

    #[test]
    fn python_files_skip_hidden_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        script(dir.path(), "main.py", "");
        script(dir.path(), ".hidden.py", "");
        script(dir.path(), "notes.txt", "");
        script(&dir.path().join("pkg"), "util.py", "");

        let found = python_files(dir.path());
        assert_eq!(
            found,
            vec![dir.path().join("main.py"), dir.path().join("pkg/util.py")]
        );
    }

    #[test]
    fn check_all_combines_both_linters() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "main.py", "print(1)\n");

        let passing = Checker::new(local().pylint("true").mypy("true").build());
        assert!(passing.check_all_python_files(dir.path()));

        let failing = Checker::new(local().pylint("true").mypy("echo").build());
        assert!(!failing.check_all_python_files(dir.path()));

        let empty = tempfile::tempdir().unwrap();
        assert!(failing.check_all_python_files(empty.path()));
    }
}
