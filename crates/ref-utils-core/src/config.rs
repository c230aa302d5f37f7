//! Run and check configuration

use crate::privilege::Privileges;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that disables the lint runners when set to `"1"`
pub const NO_LINT_VAR: &str = "NO_LINT";

/// Environment variable overriding where the user environment dump lives
pub const USER_ENVIRON_VAR: &str = "REF_UTILS_USER_ENVIRON";

/// Source of a spawned command's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    /// The submitting user's `printenv` dump, plus `_` set to the program.
    ///
    /// A missing dump yields [`crate::environ::FALLBACK_ENV`]; the caller's
    /// variables are never passed on.
    User(PathBuf),
    /// The caller's own environment
    Inherit,
}

impl Default for Environment {
    fn default() -> Self {
        Self::User(default_user_environ_path())
    }
}

/// Options for a single subprocess run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Identity the command runs under
    pub privileges: Privileges,

    /// Treat a non-zero exit as an error
    pub check: bool,

    /// Treat death by signal as an error
    pub check_signal: bool,

    /// Redirect stderr into stdout
    pub merge_stderr: bool,

    /// Kill the command after this long (None = wait forever)
    pub timeout: Option<Duration>,

    /// Bytes written to the command's stdin
    pub input: Option<Vec<u8>>,

    /// Where the command's environment comes from
    pub environment: Environment,

    /// Extra environment variables, applied last
    pub env: Vec<(String, String)>,

    /// Working directory for the command
    pub workdir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            privileges: Privileges::default(),
            check: false,
            check_signal: false,
            merge_stderr: true,
            timeout: None,
            input: None,
            environment: Environment::default(),
            env: vec![],
            workdir: None,
        }
    }
}

impl RunOptions {
    /// Create a new options builder
    #[must_use]
    pub fn builder() -> RunOptionsBuilder {
        RunOptionsBuilder::default()
    }
}

/// Builder for RunOptions
#[derive(Debug, Default)]
pub struct RunOptionsBuilder {
    options: RunOptions,
}

impl RunOptionsBuilder {
    #[must_use]
    pub fn privileges(mut self, privileges: Privileges) -> Self {
        self.options.privileges = privileges;
        self
    }

    /// Keep the caller's identity instead of dropping privileges
    #[must_use]
    pub fn inherit_privileges(self) -> Self {
        self.privileges(Privileges::Inherit)
    }

    #[must_use]
    pub fn check(mut self, check: bool) -> Self {
        self.options.check = check;
        self
    }

    #[must_use]
    pub fn check_signal(mut self, check: bool) -> Self {
        self.options.check_signal = check;
        self
    }

    #[must_use]
    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.options.merge_stderr = merge;
        self
    }

    #[must_use]
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.options.timeout = Some(duration);
        self
    }

    #[must_use]
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    #[must_use]
    pub fn input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.options.input = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.options.environment = environment;
        self
    }

    /// Take the user environment from the dump at `path`
    #[must_use]
    pub fn env_file(self, path: impl Into<PathBuf>) -> Self {
        self.environment(Environment::User(path.into()))
    }

    /// Pass the caller's environment through unchanged
    #[must_use]
    pub fn inherit_env(self) -> Self {
        self.environment(Environment::Inherit)
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.workdir = Some(path.into());
        self
    }

    #[must_use]
    pub fn build(self) -> RunOptions {
        self.options
    }
}

/// Configuration for the lint and flag checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Interpreter used to run submitted scripts
    pub python: PathBuf,

    /// pylint executable
    pub pylint: PathBuf,

    /// pylint rcfile
    pub pylintrc: PathBuf,

    /// mypy executable
    pub mypy: PathBuf,

    /// mypy config file
    pub mypy_config: PathBuf,

    /// Time budget for a submitted script
    pub flag_timeout: Duration,

    /// Identity the checks run under
    pub privileges: Privileges,

    /// Environment for every spawned check
    pub environment: Environment,

    /// Skip pylint and mypy entirely
    pub lint_disabled: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            pylint: PathBuf::from("pylint"),
            pylintrc: PathBuf::from("/etc/pylintrc"),
            mypy: PathBuf::from("mypy"),
            mypy_config: PathBuf::from("/etc/mypyrc"),
            flag_timeout: Duration::from_secs(10),
            privileges: Privileges::default(),
            environment: Environment::default(),
            lint_disabled: false,
        }
    }
}

impl CheckConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::default()
    }

    /// Defaults, with `NO_LINT` taken from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lint_disabled: lint_disabled_from_env(),
            ..Self::default()
        }
    }

    /// Options used for every command a check spawns
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::builder()
            .privileges(self.privileges)
            .environment(self.environment.clone())
            .build()
    }
}

/// Builder for CheckConfig
#[derive(Debug, Default)]
pub struct CheckConfigBuilder {
    config: CheckConfig,
}

impl CheckConfigBuilder {
    #[must_use]
    pub fn python(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.python = path.into();
        self
    }

    #[must_use]
    pub fn pylint(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pylint = path.into();
        self
    }

    #[must_use]
    pub fn pylintrc(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pylintrc = path.into();
        self
    }

    #[must_use]
    pub fn mypy(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mypy = path.into();
        self
    }

    #[must_use]
    pub fn mypy_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mypy_config = path.into();
        self
    }

    #[must_use]
    pub fn flag_timeout(mut self, duration: Duration) -> Self {
        self.config.flag_timeout = duration;
        self
    }

    #[must_use]
    pub fn privileges(mut self, privileges: Privileges) -> Self {
        self.config.privileges = privileges;
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    /// Pass the caller's environment through to checks
    #[must_use]
    pub fn inherit_env(self) -> Self {
        self.environment(Environment::Inherit)
    }

    #[must_use]
    pub fn lint_disabled(mut self, disabled: bool) -> Self {
        self.config.lint_disabled = disabled;
        self
    }

    #[must_use]
    pub fn build(self) -> CheckConfig {
        self.config
    }
}

/// Interpret a `NO_LINT` value; only `"1"` disables linting
#[must_use]
pub fn lint_disabled_from(value: Option<&str>) -> bool {
    value == Some("1")
}

/// Read `NO_LINT` from the process environment
#[must_use]
pub fn lint_disabled_from_env() -> bool {
    lint_disabled_from(std::env::var(NO_LINT_VAR).ok().as_deref())
}

/// Get the user environment dump path from REF_UTILS_USER_ENVIRON or the default
///
/// Returns:
/// - `$REF_UTILS_USER_ENVIRON` if set
/// - `/tmp/.user_environ` otherwise
pub fn default_user_environ_path() -> PathBuf {
    std::env::var(USER_ENVIRON_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/.user_environ"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_disables_lint() {
        assert!(lint_disabled_from(Some("1")));
        assert!(!lint_disabled_from(Some("0")));
        assert!(!lint_disabled_from(Some("true")));
        assert!(!lint_disabled_from(Some("")));
        assert!(!lint_disabled_from(None));
    }

    #[test]
    fn run_defaults_drop_and_merge() {
        let options = RunOptions::default();
        assert_eq!(options.privileges, Privileges::default());
        assert!(options.merge_stderr);
        assert!(!options.check);
        assert!(options.timeout.is_none());
        assert_eq!(
            options.environment,
            Environment::User(default_user_environ_path())
        );
    }

    #[test]
    fn checks_use_the_user_environment_unless_told_otherwise() {
        let config = CheckConfig::default();
        assert_eq!(
            config.run_options().environment,
            Environment::User(default_user_environ_path())
        );

        let config = CheckConfig::builder().inherit_env().build();
        assert_eq!(config.run_options().environment, Environment::Inherit);

        let options = RunOptions::builder().env_file("/srv/env").build();
        assert_eq!(options.environment, Environment::User("/srv/env".into()));
    }

    #[test]
    fn builders_apply_settings() {
        let options = RunOptions::builder()
            .inherit_privileges()
            .check(true)
            .timeout_secs(3)
            .input("payload")
            .env("LANG", "C")
            .build();
        assert_eq!(options.privileges, Privileges::Inherit);
        assert!(options.check);
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.input.as_deref(), Some(&b"payload"[..]));
        assert_eq!(options.env, vec![("LANG".into(), "C".into())]);

        let config = CheckConfig::builder()
            .python("/usr/bin/python3.11")
            .lint_disabled(true)
            .privileges(Privileges::Inherit)
            .build();
        assert!(config.lint_disabled);
        assert_eq!(config.run_options().privileges, Privileges::Inherit);
        assert_eq!(config.pylintrc, PathBuf::from("/etc/pylintrc"));
    }
}
