use std::fmt;

use gobox_contracts as c;
use thiserror::Error;

/// Failure categories shared by every gobox component.
///
/// The presentation layer picks retry/abort/prompt behavior from this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotImplemented,
    InvalidArgument,
    ToolFailure,
    DecodeFailure,
    CancellationUnavailable,
    AlreadyExists,
    NotEmpty,
    NotADirectory,
    IsADirectory,
    BadDescriptor,
    SymlinkLoop,
    UnsupportedBackend,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::ToolFailure => "tool-failure",
            ErrorKind::DecodeFailure => "decode-failure",
            ErrorKind::CancellationUnavailable => "cancellation-unavailable",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::NotEmpty => "not-empty",
            ErrorKind::NotADirectory => "not-a-directory",
            ErrorKind::IsADirectory => "is-a-directory",
            ErrorKind::BadDescriptor => "bad-descriptor",
            ErrorKind::SymlinkLoop => "symlink-loop",
            ErrorKind::UnsupportedBackend => "unsupported-backend",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem errors with errno semantics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("bad file descriptor: {0}")]
    BadDescriptor(i32),

    #[error("too many levels of symbolic links: {0}")]
    SymlinkLoop(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("storage backend {0:?} not yet implemented")]
    UnsupportedBackend(String),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::NotEmpty(_) => ErrorKind::NotEmpty,
            FsError::NotADirectory(_) => ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => ErrorKind::IsADirectory,
            FsError::BadDescriptor(_) => ErrorKind::BadDescriptor,
            FsError::SymlinkLoop(_) => ErrorKind::SymlinkLoop,
            FsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FsError::NotImplemented(_) => ErrorKind::NotImplemented,
            FsError::UnsupportedBackend(_) => ErrorKind::UnsupportedBackend,
        }
    }

    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => c::ENOENT,
            FsError::AlreadyExists(_) => c::EEXIST,
            FsError::NotEmpty(_) => c::ENOTEMPTY,
            FsError::NotADirectory(_) => c::ENOTDIR,
            FsError::IsADirectory(_) => c::EISDIR,
            FsError::BadDescriptor(_) => c::EBADF,
            FsError::SymlinkLoop(_) => c::ELOOP,
            FsError::InvalidArgument(_) => c::EINVAL,
            FsError::NotImplemented(_) => c::ENOSYS,
            FsError::UnsupportedBackend(_) => c::ENOSYS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "ENOENT",
            FsError::AlreadyExists(_) => "EEXIST",
            FsError::NotEmpty(_) => "ENOTEMPTY",
            FsError::NotADirectory(_) => "ENOTDIR",
            FsError::IsADirectory(_) => "EISDIR",
            FsError::BadDescriptor(_) => "EBADF",
            FsError::SymlinkLoop(_) => "ELOOP",
            FsError::InvalidArgument(_) => "EINVAL",
            FsError::NotImplemented(_) | FsError::UnsupportedBackend(_) => "ENOSYS",
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
