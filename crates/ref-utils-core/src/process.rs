//! Subprocess runners.
//!
//! Every runner applies [`RunOptions::privileges`] first, so by default the
//! command is spawned from a forked child that already dropped to the
//! unprivileged identity. Failures propagate: spawn errors as
//! [`RefUtilsError::Io`], checked exits as [`RefUtilsError::Process`],
//! expired timeouts as [`RefUtilsError::Timeout`].

use crate::config::{Environment, RunOptions};
use crate::error::ProcessFailure;
use crate::output::print_ok;
use crate::pipe::create_pipe;
use crate::privilege::with_privileges;
use crate::result::contains_bytes;
use crate::{ProcessOutput, RefUtilsError, Result, environ};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// Shell used by [`run_shell`]
pub const SHELL: &str = "/bin/sh";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run an argument list and wait for it to exit
pub fn run<S: AsRef<OsStr>>(argv: &[S], options: &RunOptions) -> Result<ProcessOutput> {
    let argv: Vec<OsString> = argv.iter().map(|arg| arg.as_ref().to_os_string()).collect();
    if argv.is_empty() {
        return Err(RefUtilsError::Config("empty command".into()));
    }

    let output = with_privileges(options.privileges, || spawn_and_wait(&argv, options))?;
    check_output(output, options)
}

/// Run a command line through `/bin/sh -c`
pub fn run_shell(command: &str, options: &RunOptions) -> Result<ProcessOutput> {
    run(&[SHELL, "-c", command], options)
}

/// Run with stderr folded into stdout and signal deaths treated as errors.
///
/// Returns `(exit code, output)`.
pub fn run_capture_output<S: AsRef<OsStr>>(
    argv: &[S],
    options: &RunOptions,
) -> Result<(i32, Vec<u8>)> {
    let options = RunOptions {
        merge_stderr: true,
        check_signal: true,
        ..options.clone()
    };
    let output = run(argv, &options)?;
    Ok((output.code(), output.stdout))
}

/// Run a helper program whose output becomes the payload for a target.
///
/// A helper that exits non-zero is an error.
pub fn payload_from_executable<S: AsRef<OsStr>>(
    argv: &[S],
    options: &RunOptions,
    verbose: bool,
) -> Result<(i32, Vec<u8>)> {
    if verbose {
        print_ok(format!(
            "[+] Executing {} and using its output as payload for the target..",
            render_command(argv)
        ));
    }
    let options = RunOptions {
        check: true,
        ..options.clone()
    };
    run_capture_output(argv, &options)
}

/// Feed `payload` to a target on stdin and optionally require `expected` in its output
pub fn run_with_payload<S: AsRef<OsStr>>(
    argv: &[S],
    payload: Option<&[u8]>,
    expected: Option<&[u8]>,
    options: &RunOptions,
) -> Result<(i32, Vec<u8>)> {
    let options = RunOptions {
        input: payload.map(<[u8]>::to_vec),
        ..options.clone()
    };
    let (code, output) = run_capture_output(argv, &options)?;

    if let Some(expected) = expected {
        if !contains_bytes(&output, expected) {
            return Err(RefUtilsError::WrongOutput(
                String::from_utf8_lossy(&output).into_owned(),
            ));
        }
    }

    Ok((code, output))
}

/// Space-joined rendering of an argument list for messages
pub fn render_command<S: AsRef<OsStr>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| arg.as_ref().to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_and_wait(argv: &[OsString], options: &RunOptions) -> Result<ProcessOutput> {
    let command = render_command(argv);
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| RefUtilsError::Config("empty command".into()))?;

    let mut cmd = Command::new(program);
    cmd.args(args);

    if options.timeout.is_some() {
        // Own process group so a timeout can take down grandchildren too
        cmd.process_group(0);
    }
    if let Some(dir) = &options.workdir {
        cmd.current_dir(dir);
    }
    if let Environment::User(path) = &options.environment {
        cmd.env_clear()
            .envs(environ::user_env_or_fallback(path)?)
            .env("_", program);
    }
    cmd.envs(options.env.iter().map(|(k, v)| (k, v)));

    cmd.stdin(if options.input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let merged = if options.merge_stderr {
        let (reader, writer) = create_pipe()?;
        cmd.stdout(Stdio::from(writer.try_clone()?))
            .stderr(Stdio::from(writer));
        Some(reader)
    } else {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        None
    };

    tracing::debug!(%command, timeout = ?options.timeout, "spawning command");

    let started = Instant::now();
    let mut child = cmd.spawn()?;
    // Release our copies of the write ends, otherwise the readers never see EOF
    drop(cmd);

    let stdin = child.stdin.take();
    let stdout: Box<dyn Read + Send> = match merged {
        Some(reader) => Box::new(reader),
        None => Box::new(
            child
                .stdout
                .take()
                .ok_or_else(|| RefUtilsError::Ipc("stdout not captured".into()))?,
        ),
    };
    let stderr = child.stderr.take();
    let input = options.input.as_deref().unwrap_or_default();

    let (status, timed_out, stdout, stderr) = thread::scope(|scope| -> Result<_> {
        let feeder = stdin.map(|mut pipe| {
            scope.spawn(move || {
                // The child may exit before consuming all input
                let _ = pipe.write_all(input);
            })
        });
        let out = scope.spawn(move || drain(stdout));
        let err = stderr.map(|pipe| scope.spawn(move || drain(pipe)));

        let (status, timed_out) = wait_for(&mut child, options.timeout)?;

        let stdout = join_reader(out)?;
        let stderr = match err {
            Some(handle) => join_reader(handle)?,
            None => Vec::new(),
        };
        if let Some(feeder) = feeder {
            let _ = feeder.join();
        }

        Ok((status, timed_out, stdout, stderr))
    })?;

    let output = ProcessOutput {
        command,
        exit_code: status.code(),
        signal: status.signal(),
        stdout,
        stderr,
        duration: started.elapsed(),
        timed_out,
    };

    tracing::debug!(
        command = %output.command,
        code = output.code(),
        elapsed = ?output.duration,
        "command finished"
    );

    Ok(output)
}

fn wait_for(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(limit) = timeout else {
        return Ok((child.wait()?, false));
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            return Ok((child.wait()?, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[allow(clippy::cast_possible_wrap)]
fn kill_group(child: &Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        tracing::warn!(pgid = pgid.as_raw(), "failed to kill timed out command: {}", e);
    }
}

fn drain(mut source: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    source.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join_reader(handle: ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| RefUtilsError::Ipc("output reader panicked".into()))?
        .map_err(RefUtilsError::from)
}

fn check_output(output: ProcessOutput, options: &RunOptions) -> Result<ProcessOutput> {
    if output.timed_out {
        tracing::warn!(command = %output.command, "command timed out");
        return Err(RefUtilsError::Timeout {
            command: output.command,
            timeout: options.timeout.unwrap_or_default(),
        });
    }

    let signaled = options.check_signal && output.signal.is_some();
    let failed = options.check && !output.is_success();
    if signaled || failed {
        tracing::warn!(command = %output.command, code = output.code(), "command failed");
        return Err(RefUtilsError::Process(Box::new(ProcessFailure {
            command: output.command,
            exit_code: output.exit_code,
            signal: output.signal,
            stdout: output.stdout,
            stderr: output.stderr,
        })));
    }

    Ok(output)
}
