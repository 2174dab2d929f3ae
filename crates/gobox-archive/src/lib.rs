//! Bulk transfer of filesystem subtrees to and from ZIP archives.

mod error;
mod export;
mod import;

pub use error::ArchiveError;
pub use export::export_zip;
pub use import::import_zip;
