//! ref-utils CLI - submission checks from the command line

use clap::{Args, Parser, Subcommand, ValueEnum};
use ref_utils::config::{CheckConfig, Environment};
use ref_utils::privilege::{DEFAULT_DROP_GID, DEFAULT_DROP_UID};
use ref_utils::{Checker, Identity, Privileges, RunOptions, hook, process};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ref-utils")]
#[command(author, version, about = "Helpers for exercise submission tests")]
struct Cli {
    /// Run as the current user instead of dropping privileges
    #[arg(long, global = true)]
    inherit: bool,

    /// UID to drop to
    #[arg(long, global = true, default_value_t = DEFAULT_DROP_UID)]
    uid: u32,

    /// Pass our environment to spawned commands instead of the user's dump
    #[arg(long, global = true)]
    inherit_env: bool,

    /// GID to drop to
    #[arg(long, global = true, default_value_t = DEFAULT_DROP_GID)]
    gid: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    File,
    Dir,
    Exec,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a path is a file, directory or executable
    Assert {
        kind: Kind,
        path: PathBuf,
    },

    /// Run a command (argument list, or a shell string with --shell)
    Run {
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,

        /// Pass the command through /bin/sh -c
        #[arg(long)]
        shell: bool,

        /// Fail on non-zero exit codes
        #[arg(long)]
        check: bool,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run pylint on Python files
    Pylint {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        tools: Tools,
    },

    /// Run mypy on Python files
    Mypy {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        tools: Tools,
    },

    /// Run pylint and mypy on every Python file below a directory
    CheckPython {
        #[arg(default_value = "/home/user")]
        root: PathBuf,

        #[command(flatten)]
        tools: Tools,
    },

    /// Run a script and check its output contains the flag
    Flag {
        flag: String,
        script: PathBuf,

        /// Interpreter used to run the script
        #[arg(long, default_value = "python3")]
        python: PathBuf,

        /// Do not print the verdict
        #[arg(long)]
        silent: bool,
    },
}

/// Linter executables
#[derive(Args)]
struct Tools {
    /// pylint executable
    #[arg(long, default_value = "pylint")]
    pylint: PathBuf,

    /// mypy executable
    #[arg(long, default_value = "mypy")]
    mypy: PathBuf,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ref_utils=info".parse()?),
        )
        .init();
    hook::install_non_leaking_panic_hook();

    let cli = Cli::parse();
    let privileges = if cli.inherit {
        Privileges::Inherit
    } else {
        Privileges::Drop(Identity::new(cli.uid, cli.gid))
    };
    let environment = if cli.inherit_env {
        Environment::Inherit
    } else {
        Environment::default()
    };
    let base = CheckConfig {
        privileges,
        environment: environment.clone(),
        ..CheckConfig::from_env()
    };
    tracing::debug!(?privileges, lint_disabled = base.lint_disabled, "configuration loaded");

    let passed = match cli.command {
        Commands::Assert { kind, path } => match kind {
            Kind::File => ref_utils::assert_is_file(&path),
            Kind::Dir => ref_utils::assert_is_dir(&path),
            Kind::Exec => ref_utils::assert_is_exec(&path),
        },

        Commands::Run {
            cmd,
            shell,
            check,
            timeout,
            json,
        } => {
            let mut builder = RunOptions::builder()
                .privileges(privileges)
                .environment(environment)
                .check(check);
            if let Some(secs) = timeout {
                builder = builder.timeout_secs(secs);
            }
            let options = builder.build();

            let result = if shell {
                process::run_shell(&cmd.join(" "), &options)
            } else {
                process::run(&cmd, &options)
            };

            match result {
                Ok(output) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    } else {
                        std::io::stdout().write_all(&output.stdout)?;
                        std::io::stderr().write_all(&output.stderr)?;
                    }
                    output.is_success()
                }
                Err(err) => {
                    tracing::warn!(command = %cmd.join(" "), "run failed: {}", err);
                    hook::report(&err);
                    false
                }
            }
        }

        Commands::Pylint { files, tools } => with_tools(base, tools).run_pylint(&files),

        Commands::Mypy { files, tools } => with_tools(base, tools).run_mypy(&files),

        Commands::CheckPython { root, tools } => {
            with_tools(base, tools).check_all_python_files(&root)
        }

        Commands::Flag {
            flag,
            script,
            python,
            silent,
        } => Checker::new(CheckConfig { python, ..base }).contains_flag(&flag, &script, silent),
    };

    tracing::debug!(passed, "command finished");

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn with_tools(base: CheckConfig, tools: Tools) -> Checker {
    Checker::new(CheckConfig {
        pylint: tools.pylint,
        mypy: tools.mypy,
        ..base
    })
}
