use std::collections::HashMap;
use std::sync::Arc;

use crate::tree::Ino;

#[derive(Debug, Clone)]
struct Entry {
    ino: Ino,
    generation: u64,
    bytes: Arc<[u8]>,
}

/// Whole-file buffers for large files, keyed by resolved path.
///
/// An entry is only served while the path still names the same inode at the
/// same content generation; anything else is a miss and evicts it.
#[derive(Debug)]
pub(crate) struct ReadCache {
    threshold: usize,
    entries: HashMap<String, Entry>,
}

impl ReadCache {
    pub fn new(threshold: usize) -> Self {
        ReadCache {
            threshold,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str, ino: Ino, generation: u64) -> Option<Arc<[u8]>> {
        let entry = self.entries.get(path)?;
        if entry.ino == ino && entry.generation == generation {
            return Some(entry.bytes.clone());
        }
        self.entries.remove(path);
        None
    }

    /// Whether a buffer of `len` bytes is large enough to be worth keeping.
    pub fn admits(&self, len: usize) -> bool {
        len > self.threshold
    }

    pub fn store(&mut self, path: &str, ino: Ino, generation: u64, bytes: &Arc<[u8]>) {
        if !self.admits(bytes.len()) {
            self.entries.remove(path);
            return;
        }
        tracing::trace!(target: "gobox::vfs", path, len = bytes.len(), "caching large file");
        self.entries.insert(
            path.to_string(),
            Entry {
                ino,
                generation,
                bytes: bytes.clone(),
            },
        );
    }

    pub fn evict(&mut self, path: &str) {
        self.entries.remove(path);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
