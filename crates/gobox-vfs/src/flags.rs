use gobox_contracts::{O_APPEND, O_CREAT, O_EXCL, O_RDWR, O_TRUNC, O_WRONLY};

use crate::error::{FsError, Result};

/// String-style open mode a numeric flag set translates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `wx`
    WriteExclusive,
    /// `r+`
    ReadWrite,
    /// `w+`
    ReadWriteCreateTruncate,
    /// `wx+`
    ReadWriteCreateTruncateExclusive,
}

impl OpenMode {
    /// Translates a numeric flag set with fixed precedence: write-only, then
    /// read-write, then append. Anything unmatched opens read-only.
    pub fn from_flags(flags: i32) -> Result<OpenMode> {
        if flags & O_WRONLY != 0 {
            if flags & O_EXCL != 0 {
                return Ok(OpenMode::WriteExclusive);
            }
            return Ok(OpenMode::Write);
        }
        if flags & O_RDWR != 0 {
            if flags & O_CREAT != 0 && flags & O_TRUNC != 0 {
                if flags & O_EXCL != 0 {
                    return Ok(OpenMode::ReadWriteCreateTruncateExclusive);
                }
                return Ok(OpenMode::ReadWriteCreateTruncate);
            }
            return Ok(OpenMode::ReadWrite);
        }
        if flags & O_APPEND != 0 {
            return Err(FsError::NotImplemented("open in append mode"));
        }
        Ok(OpenMode::Read)
    }

    pub fn parse(s: &str) -> Option<OpenMode> {
        match s {
            "r" => Some(OpenMode::Read),
            "w" => Some(OpenMode::Write),
            "wx" => Some(OpenMode::WriteExclusive),
            "r+" => Some(OpenMode::ReadWrite),
            "w+" => Some(OpenMode::ReadWriteCreateTruncate),
            "wx+" => Some(OpenMode::ReadWriteCreateTruncateExclusive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
            OpenMode::WriteExclusive => "wx",
            OpenMode::ReadWrite => "r+",
            OpenMode::ReadWriteCreateTruncate => "w+",
            OpenMode::ReadWriteCreateTruncateExclusive => "wx+",
        }
    }

    pub fn readable(self) -> bool {
        matches!(
            self,
            OpenMode::Read
                | OpenMode::ReadWrite
                | OpenMode::ReadWriteCreateTruncate
                | OpenMode::ReadWriteCreateTruncateExclusive
        )
    }

    pub fn writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    pub fn creates(self) -> bool {
        !matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn truncates(self) -> bool {
        self.creates()
    }

    pub fn exclusive(self) -> bool {
        matches!(
            self,
            OpenMode::WriteExclusive | OpenMode::ReadWriteCreateTruncateExclusive
        )
    }
}
