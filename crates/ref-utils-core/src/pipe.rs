//! Pipe-based result delivery from a forked child back to its parent

use crate::error::SerializedError;
use crate::{RefUtilsError, Result};
use nix::fcntl::OFlag;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};

/// Largest frame the parent accepts from a child
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// One message from child to parent: the closure's value or its error
#[derive(Debug, Serialize, Deserialize)]
pub enum Frame<T> {
    Value(T),
    Failure(SerializedError),
}

impl<T> From<Result<T>> for Frame<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Failure(err.into()),
        }
    }
}

impl<T> Frame<T> {
    /// Unwrap the frame back into the caller-facing result
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failure(err) => Err(err.into()),
        }
    }
}

/// Create a result channel (returns parent end, child end)
pub fn result_channel() -> Result<(ResultReceiver, ResultSender)> {
    let (read_end, write_end) = create_pipe()?;
    Ok((
        ResultReceiver { rx: read_end },
        ResultSender { tx: write_end },
    ))
}

/// Parent end of the channel
#[derive(Debug)]
pub struct ResultReceiver {
    rx: File,
}

impl ResultReceiver {
    /// Block until the child delivers a frame
    pub fn recv<T: DeserializeOwned>(&mut self) -> Result<Frame<T>> {
        // Read length prefix (4 bytes, big-endian)
        let mut len_bytes = [0u8; 4];
        self.rx.read_exact(&mut len_bytes)?;

        let len = u32::from_be_bytes(len_bytes) as usize;

        if len > MAX_FRAME_LEN {
            return Err(RefUtilsError::Ipc(format!("frame too large: {len} bytes")));
        }

        let mut payload = vec![0u8; len];
        self.rx.read_exact(&mut payload)?;

        rmp_serde::from_slice(&payload)
            .map_err(|e| RefUtilsError::Ipc(format!("failed to decode frame: {e}")))
    }
}

/// Child end of the channel
#[derive(Debug)]
pub struct ResultSender {
    tx: File,
}

impl ResultSender {
    /// Send a frame to the parent
    pub fn send<T: Serialize>(&mut self, frame: &Frame<T>) -> Result<()> {
        let mut payload = rmp_serde::to_vec(frame)
            .map_err(|e| RefUtilsError::Ipc(format!("failed to encode frame: {e}")))?;

        if payload.len() > MAX_FRAME_LEN {
            // Tell the parent why instead of shipping a frame it will refuse
            let refusal: Frame<T> = Frame::Failure(SerializedError::Ipc(format!(
                "frame too large: {} bytes (limit {MAX_FRAME_LEN})",
                payload.len()
            )));
            payload = rmp_serde::to_vec(&refusal)
                .map_err(|e| RefUtilsError::Ipc(format!("failed to encode frame: {e}")))?;
        }

        let len = u32::try_from(payload.len())
            .map_err(|_| RefUtilsError::Ipc(format!("frame too large: {} bytes", payload.len())))?;

        self.tx.write_all(&len.to_be_bytes())?;
        self.tx.write_all(&payload)?;
        self.tx.flush()?;

        Ok(())
    }
}

/// Create a close-on-exec pipe (returns read end, write end)
pub fn create_pipe() -> Result<(File, File)> {
    let (read_end, write_end) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
    Ok((File::from(read_end), File::from(write_end)))
}
