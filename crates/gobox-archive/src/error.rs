use gobox_vfs::{ErrorKind, FsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("malformed archive: {0}")]
    Decode(String),

    #[error("unsafe archive entry name: {0:?}")]
    UnsafeName(String),

    #[error("failed to encode archive: {0}")]
    Encode(#[source] zip::result::ZipError),

    #[error(transparent)]
    Fs(#[from] FsError),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Decode(_) | ArchiveError::UnsafeName(_) => ErrorKind::DecodeFailure,
            // duplicate entry names are the usual cause
            ArchiveError::Encode(_) => ErrorKind::InvalidArgument,
            ArchiveError::Fs(err) => err.kind(),
        }
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        ArchiveError::Decode(err.to_string())
    }
}
