//! In-memory POSIX-like filesystem instances with descriptor semantics, a
//! shared working directory and normalized stat results.

mod backend;
mod cache;
mod error;
mod flags;
pub mod path;
mod process;
mod progress;
mod registry;
mod stat;
mod tree;
mod vfs;

pub use backend::BackendKind;
pub use error::{ErrorKind, FsError, Result};
pub use flags::OpenMode;
pub use process::ProcessShim;
pub use progress::Progress;
pub use registry::Registry;
pub use stat::{FileType, Stat};
pub use vfs::{FileRef, OutputSink, Vfs, VfsConfig};
