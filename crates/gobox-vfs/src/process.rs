use gobox_contracts::{SENTINEL_GID, SENTINEL_PID, SENTINEL_UID};

use crate::error::{FsError, Result};
use crate::vfs::Vfs;

/// Process identity synthesized for guests, bound to one filesystem instance.
///
/// There is no real process behind a guest: ids are fixed sentinels and the
/// working directory is the instance's shared one.
#[derive(Debug, Clone)]
pub struct ProcessShim {
    fs: Vfs,
}

impl ProcessShim {
    pub fn new(fs: Vfs) -> Self {
        ProcessShim { fs }
    }

    pub fn fs(&self) -> &Vfs {
        &self.fs
    }

    pub fn getuid(&self) -> i32 {
        SENTINEL_UID
    }

    pub fn getgid(&self) -> i32 {
        SENTINEL_GID
    }

    pub fn geteuid(&self) -> i32 {
        SENTINEL_UID
    }

    pub fn getegid(&self) -> i32 {
        SENTINEL_GID
    }

    pub fn pid(&self) -> i32 {
        SENTINEL_PID
    }

    pub fn ppid(&self) -> i32 {
        SENTINEL_PID
    }

    pub fn getgroups(&self) -> Result<Vec<i32>> {
        Err(FsError::NotImplemented("getgroups"))
    }

    pub fn umask(&self, _mask: u32) -> Result<u32> {
        Err(FsError::NotImplemented("umask"))
    }

    pub fn cwd(&self) -> String {
        self.fs.getcwd()
    }

    pub fn chdir(&self, path: &str) -> Result<()> {
        self.fs.chdir(path)
    }
}
