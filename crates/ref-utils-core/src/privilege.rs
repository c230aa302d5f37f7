//! Dropping user/group identity.
//!
//! Two entry points with different contracts:
//! - [`drop_to`] changes the identity of the *current* process. It is
//!   irreversible: nothing restores the old identity afterwards.
//! - [`with_privileges`] forks, drops identity in the child only, runs the
//!   closure there and ships its result back over a pipe. The caller's
//!   identity is never touched.
//!
//! GID is always changed before UID; once the UID is gone the process can no
//! longer change its groups.

use crate::pipe::{self, Frame};
use crate::{RefUtilsError, Result};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Gid, Pid, Uid, fork, getgroups, setgroups, setresgid, setresuid};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// UID used when no explicit identity is given
pub const DEFAULT_DROP_UID: u32 = 9999;
/// GID used when no explicit identity is given
pub const DEFAULT_DROP_GID: u32 = 9999;

/// Target user/group identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new(DEFAULT_DROP_UID, DEFAULT_DROP_GID)
    }
}

/// Which identity an operation runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privileges {
    /// Fork and run under the given identity
    Drop(Identity),
    /// Run in the current process as whoever we are
    Inherit,
}

impl Default for Privileges {
    fn default() -> Self {
        Self::Drop(Identity::default())
    }
}

/// Check if the current process runs as root
#[must_use]
pub fn is_root() -> bool {
    Uid::effective().is_root()
}

/// Irreversibly switch the current process to `identity`.
///
/// Sets real, effective and saved GID, strips group 0 from the
/// supplementary groups, then sets real, effective and saved UID.
pub fn drop_to(identity: Identity) -> Result<()> {
    let gid = Gid::from_raw(identity.gid);
    let uid = Uid::from_raw(identity.uid);

    setresgid(gid, gid, gid).map_err(|source| RefUtilsError::Privilege {
        op: format!("setresgid({})", identity.gid),
        source,
    })?;

    let groups: Vec<Gid> = getgroups()?
        .into_iter()
        .filter(|g| g.as_raw() != 0)
        .collect();
    setgroups(&groups).map_err(|source| RefUtilsError::Privilege {
        op: "setgroups".into(),
        source,
    })?;

    setresuid(uid, uid, uid).map_err(|source| RefUtilsError::Privilege {
        op: format!("setresuid({})", identity.uid),
        source,
    })?;

    tracing::info!(uid = identity.uid, gid = identity.gid, "privileges dropped");
    Ok(())
}

/// Run `f` under `privileges` and return its result.
///
/// With [`Privileges::Drop`] the closure runs in a forked child, so anything
/// it mutates (globals, cwd, open files) stays in the child. Its return value
/// and errors cross back serialized.
pub fn with_privileges<T, F>(privileges: Privileges, f: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    match privileges {
        Privileges::Inherit => f(),
        Privileges::Drop(identity) => run_as(identity, f),
    }
}

fn run_as<T, F>(identity: Identity, f: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    let (mut receiver, mut sender) = pipe::result_channel()?;

    tracing::debug!(uid = identity.uid, gid = identity.gid, "forking unprivileged child");

    // SAFETY: the child only runs `f`, writes one frame and leaves via _exit
    match unsafe { fork() }? {
        ForkResult::Child => {
            drop(receiver);
            let outcome = drop_to(identity).and_then(|()| {
                panic::catch_unwind(AssertUnwindSafe(f))
                    .unwrap_or_else(|_| Err(RefUtilsError::Child("closure panicked".into())))
            });
            let code = i32::from(sender.send(&Frame::from(outcome)).is_err());
            // SAFETY: terminate the child without running the parent's destructors
            unsafe { libc::_exit(code) }
        }
        ForkResult::Parent { child } => {
            drop(sender);
            let frame = receiver.recv::<T>();
            // Close our end first: a child still writing gets EPIPE instead of blocking
            drop(receiver);
            let status = wait_child(child)?;

            match frame {
                Ok(frame) => frame.into_result(),
                Err(err @ RefUtilsError::Ipc(_)) => {
                    tracing::warn!(pid = child.as_raw(), ?status, "rejected result frame: {}", err);
                    Err(err)
                }
                Err(err) => {
                    tracing::warn!(pid = child.as_raw(), ?status, "child exited without a result");
                    Err(RefUtilsError::Child(format!(
                        "{} ({err})",
                        describe_status(status)
                    )))
                }
            }
        }
    }
}

fn wait_child(child: Pid) -> Result<WaitStatus> {
    loop {
        match waitpid(child, None) {
            Err(Errno::EINTR) => continue,
            other => return other.map_err(RefUtilsError::from),
        }
    }
}

fn describe_status(status: WaitStatus) -> String {
    match status {
        WaitStatus::Exited(pid, code) => format!("child {pid} exited with {code}"),
        WaitStatus::Signaled(pid, sig, _) => format!("child {pid} killed by {sig}"),
        other => format!("child stopped in state {other:?}"),
    }
}
