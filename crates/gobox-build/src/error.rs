use gobox_vfs::{ErrorKind, FileType, FsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build {path}: unsupported source kind {kind:?}")]
    UnsupportedSource { path: String, kind: FileType },

    #[error("{tool} exited with code {code}")]
    ToolFailure { tool: String, code: i32 },

    #[error("build plan {path} was not written")]
    PlanMissing { path: String },

    #[error("malformed build plan {path}: {reason}")]
    Plan { path: String, reason: String },

    #[error(transparent)]
    Fs(#[from] FsError),
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::UnsupportedSource { .. } => ErrorKind::InvalidArgument,
            BuildError::ToolFailure { .. } => ErrorKind::ToolFailure,
            BuildError::PlanMissing { .. } => ErrorKind::NotFound,
            BuildError::Plan { .. } => ErrorKind::DecodeFailure,
            BuildError::Fs(err) => err.kind(),
        }
    }
}

/// Boolean view of a build outcome.
pub trait Succeeded {
    fn succeeded(&self) -> bool;
}

impl Succeeded for Result<(), BuildError> {
    fn succeeded(&self) -> bool {
        self.is_ok()
    }
}
