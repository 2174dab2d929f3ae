use std::fmt;

use gobox_vfs::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("guest did not register a cancellation hook")]
    CancellationUnavailable,

    #[error("failed to set up the WebAssembly engine: {0:#}")]
    Engine(anyhow::Error),
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::CancellationUnavailable => ErrorKind::CancellationUnavailable,
            SandboxError::Engine(_) => ErrorKind::NotImplemented,
        }
    }
}

/// Trap payload raised by `rt_exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GuestExit(pub i32);

impl fmt::Display for GuestExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guest exited with code {}", self.0)
    }
}

impl std::error::Error for GuestExit {}

/// Trap payload raised once a guest's cancellation hook has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("guest cancelled")
    }
}

impl std::error::Error for Cancelled {}
