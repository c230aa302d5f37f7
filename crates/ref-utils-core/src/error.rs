//! Error types for ref-utils

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefUtilsError {
    #[error("failed to {op}: {source}")]
    Privilege {
        op: String,
        #[source]
        source: nix::Error,
    },

    #[error("privileged child failed: {0}")]
    Child(String),

    #[error("{0}")]
    Process(Box<ProcessFailure>),

    #[error("[!] Timeout error for: {command} (after {timeout:?})")]
    Timeout { command: String, timeout: Duration },

    #[error("[!] Wrong output: {0}")]
    WrongOutput(String),

    #[error("ipc error: {0}")]
    Ipc(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A subprocess that exited unsuccessfully while the caller asked for checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFailure {
    pub command: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessFailure {
    /// Exit status the way a shell reports it: the code, or `-N (SIGNAME)`
    #[must_use]
    pub fn status_label(&self) -> String {
        match (self.exit_code, self.signal) {
            (_, Some(sig)) => {
                let name = nix::sys::signal::Signal::try_from(sig)
                    .map_or("unknown signal", nix::sys::signal::Signal::as_str);
                format!("-{sig} ({name})")
            }
            (Some(code), None) => code.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[!] Execution of {} failed with exitcode {}.",
            self.command,
            self.status_label()
        )?;
        writeln!(f, "--------------------- STDOUT ---------------------")?;
        writeln!(f, "{}", String::from_utf8_lossy(&self.stdout))?;
        writeln!(f, "--------------------- STDERR ---------------------")?;
        write!(f, "{}", String::from_utf8_lossy(&self.stderr))
    }
}

/// Wire form of [`RefUtilsError`], used to forward failures out of a forked child
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SerializedError {
    Privilege { op: String, errno: i32 },
    Child(String),
    Process(ProcessFailure),
    Timeout { command: String, timeout: Duration },
    WrongOutput(String),
    Ipc(String),
    Io { raw_os_error: Option<i32>, message: String },
    Nix(i32),
    Config(String),
}

impl From<RefUtilsError> for SerializedError {
    fn from(err: RefUtilsError) -> Self {
        match err {
            RefUtilsError::Privilege { op, source } => Self::Privilege {
                op,
                errno: source as i32,
            },
            RefUtilsError::Child(msg) => Self::Child(msg),
            RefUtilsError::Process(failure) => Self::Process(*failure),
            RefUtilsError::Timeout { command, timeout } => Self::Timeout { command, timeout },
            RefUtilsError::WrongOutput(msg) => Self::WrongOutput(msg),
            RefUtilsError::Ipc(msg) => Self::Ipc(msg),
            RefUtilsError::Io(e) => Self::Io {
                raw_os_error: e.raw_os_error(),
                message: e.to_string(),
            },
            RefUtilsError::Nix(errno) => Self::Nix(errno as i32),
            RefUtilsError::Config(msg) => Self::Config(msg),
        }
    }
}

impl From<SerializedError> for RefUtilsError {
    fn from(err: SerializedError) -> Self {
        use nix::errno::Errno;

        match err {
            SerializedError::Privilege { op, errno } => Self::Privilege {
                op,
                source: Errno::from_raw(errno),
            },
            SerializedError::Child(msg) => Self::Child(msg),
            SerializedError::Process(failure) => Self::Process(Box::new(failure)),
            SerializedError::Timeout { command, timeout } => Self::Timeout { command, timeout },
            SerializedError::WrongOutput(msg) => Self::WrongOutput(msg),
            SerializedError::Ipc(msg) => Self::Ipc(msg),
            SerializedError::Io {
                raw_os_error: Some(code),
                ..
            } => Self::Io(std::io::Error::from_raw_os_error(code)),
            SerializedError::Io {
                raw_os_error: None,
                message,
            } => Self::Io(std::io::Error::other(message)),
            SerializedError::Nix(errno) => Self::Nix(Errno::from_raw(errno)),
            SerializedError::Config(msg) => Self::Config(msg),
        }
    }
}
