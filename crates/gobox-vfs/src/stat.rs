use std::time::{SystemTime, UNIX_EPOCH};

use gobox_contracts::{S_IFCHR, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG, STAT_BLKSIZE, STAT_RECORD_SIZE};
use serde::Serialize;

use crate::tree::{Ino, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    CharDevice,
}

/// Normalized stat result: millisecond timestamps and a fixed block size,
/// whatever the backing node looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: i32,
    pub gid: i32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime_ms: i64,
    pub mtime_ms: i64,
    pub ctime_ms: i64,
    pub birthtime_ms: i64,
}

impl Stat {
    pub(crate) fn from_node(ino: Ino, node: &Node) -> Self {
        let size = node.size();
        Stat {
            dev: 0,
            ino,
            mode: node.mode(),
            nlink: node.nlink,
            uid: node.uid as i32,
            gid: node.gid as i32,
            rdev: 0,
            size,
            blksize: STAT_BLKSIZE,
            blocks: blocks_for(size),
            atime_ms: millis(node.times.atime),
            mtime_ms: millis(node.times.mtime),
            ctime_ms: millis(node.times.ctime),
            birthtime_ms: millis(node.times.birthtime),
        }
    }

    /// Stat reported for the diverted standard descriptors.
    pub(crate) fn stdio(fd: i32) -> Self {
        let now = millis(SystemTime::now());
        Stat {
            dev: 0,
            ino: 0,
            mode: S_IFCHR | 0o620,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: fd as u64,
            size: 0,
            blksize: STAT_BLKSIZE,
            blocks: 0,
            atime_ms: now,
            mtime_ms: now,
            ctime_ms: now,
            birthtime_ms: now,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self.mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            S_IFCHR => FileType::CharDevice,
            _ => FileType::File,
        }
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    /// Little-endian wire record handed to guests.
    pub fn to_record(&self) -> [u8; STAT_RECORD_SIZE] {
        let mut out = [0u8; STAT_RECORD_SIZE];
        let mut off = 0usize;
        let mut put = |bytes: &[u8]| {
            out[off..off + bytes.len()].copy_from_slice(bytes);
            off += bytes.len();
        };
        put(&self.dev.to_le_bytes());
        put(&self.ino.to_le_bytes());
        put(&self.mode.to_le_bytes());
        put(&self.nlink.to_le_bytes());
        put(&self.uid.to_le_bytes());
        put(&self.gid.to_le_bytes());
        put(&self.rdev.to_le_bytes());
        put(&self.size.to_le_bytes());
        put(&self.blksize.to_le_bytes());
        put(&self.blocks.to_le_bytes());
        put(&self.atime_ms.to_le_bytes());
        put(&self.mtime_ms.to_le_bytes());
        put(&self.ctime_ms.to_le_bytes());
        put(&self.birthtime_ms.to_le_bytes());
        out
    }
}

fn blocks_for(size: u64) -> u64 {
    size.div_ceil(STAT_BLKSIZE)
}

pub(crate) fn millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

pub(crate) fn from_millis(ms: i64) -> SystemTime {
    let d = std::time::Duration::from_millis(ms.unsigned_abs());
    if ms >= 0 {
        UNIX_EPOCH + d
    } else {
        UNIX_EPOCH - d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    #[test]
    fn block_size_is_fixed_and_blocks_round_up() {
        let mut node = Node::file(0o644);
        if let crate::tree::NodeKind::File(data) = &mut node.kind {
            data.resize(4097, 0);
        }
        let st = Stat::from_node(7, &node);
        assert_eq!(st.blksize, 4096);
        assert_eq!(st.blocks, 2);
        assert_eq!(st.size, 4097);
        assert!(st.is_file());
    }

    #[test]
    fn timestamps_are_milliseconds() {
        let t = UNIX_EPOCH + std::time::Duration::from_millis(1_234_567);
        assert_eq!(millis(t), 1_234_567);
        assert_eq!(from_millis(1_234_567), t);
    }

    #[test]
    fn record_layout_is_stable() {
        let node = Node::directory(0o755);
        let st = Stat::from_node(3, &node);
        let rec = st.to_record();
        assert_eq!(rec.len(), 96);
        assert_eq!(u64::from_le_bytes(rec[8..16].try_into().unwrap()), 3);
        assert_eq!(
            u32::from_le_bytes(rec[16..20].try_into().unwrap()),
            S_IFDIR | 0o755
        );
        assert_eq!(u64::from_le_bytes(rec[48..56].try_into().unwrap()), 4096);
    }
}
