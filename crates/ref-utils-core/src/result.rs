//! Subprocess result types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of running a command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Command line as it was run, space-joined
    pub command: String,

    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,

    /// Terminating signal, if the process was killed
    pub signal: Option<i32>,

    /// Standard output (includes stderr when merged)
    pub stdout: Vec<u8>,

    /// Standard error (empty when merged into stdout)
    pub stderr: Vec<u8>,

    /// Wall clock duration
    pub duration: Duration,

    /// Whether the process was killed due to timeout
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Get stdout as UTF-8 string, lossy conversion
    #[must_use]
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as UTF-8 string, lossy conversion
    #[must_use]
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Whether stdout contains `needle` as a byte substring
    #[must_use]
    pub fn contains(&self, needle: impl AsRef<[u8]>) -> bool {
        contains_bytes(&self.stdout, needle.as_ref())
    }

    /// Exit code as a shell would report it: negative signal number on kills
    #[must_use]
    pub fn code(&self) -> i32 {
        match (self.exit_code, self.signal) {
            (Some(code), _) => code,
            (None, Some(sig)) => -sig,
            (None, None) => -1,
        }
    }

    /// Check if execution was successful (exit code 0, no timeout)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

pub(crate) fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

impl Default for ProcessOutput {
    fn default() -> Self {
        Self {
            command: String::new(),
            exit_code: None,
            signal: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration: Duration::ZERO,
            timed_out: false,
        }
    }
}
