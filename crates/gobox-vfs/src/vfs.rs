use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use gobox_contracts::{DEFAULT_FILE_MODE, DEFAULT_READ_CACHE_THRESHOLD, MAX_FILE_SIZE};

use crate::cache::ReadCache;
use crate::error::{FsError, Result};
use crate::flags::OpenMode;
use crate::path;
use crate::process::ProcessShim;
use crate::stat::{self, Stat};
use crate::tree::{Ino, Node, NodeKind, Tree};

/// Descriptors below this number are the diverted standard streams.
const STDIO_FDS: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsConfig {
    /// Files strictly larger than this are kept whole in the read cache.
    pub read_cache_threshold: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        VfsConfig {
            read_cache_threshold: DEFAULT_READ_CACHE_THRESHOLD,
        }
    }
}

/// End offset of `len` bytes starting at `pos`. Files never grow past
/// `MAX_FILE_SIZE`.
fn span_end(pos: u64, len: usize, abs: &str) -> Result<usize> {
    let end = u64::try_from(len).ok().and_then(|len| pos.checked_add(len));
    match end {
        Some(end) if end <= MAX_FILE_SIZE => {
            usize::try_from(end).map_err(|_| FsError::InvalidArgument(abs.to_string()))
        }
        _ => Err(FsError::InvalidArgument(abs.to_string())),
    }
}

/// Receives one complete line written to descriptors 0-2, without the newline.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

fn default_sink() -> OutputSink {
    Arc::new(|line| tracing::info!(target: "gobox::guest", "{line}"))
}

/// Argument of [`Vfs::fstat`]: callers further up may already have turned a
/// descriptor into a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Fd(i32),
    Path(String),
}

impl From<i32> for FileRef {
    fn from(fd: i32) -> Self {
        FileRef::Fd(fd)
    }
}

impl From<&str> for FileRef {
    fn from(path: &str) -> Self {
        FileRef::Path(path.to_string())
    }
}

impl From<String> for FileRef {
    fn from(path: String) -> Self {
        FileRef::Path(path)
    }
}

#[derive(Debug)]
enum Descriptor {
    Stdio(i32),
    File(OpenFile),
}

#[derive(Debug)]
struct OpenFile {
    ino: Ino,
    path: String,
    mode: OpenMode,
    position: u64,
}

#[derive(Debug)]
struct State {
    tree: Tree,
    cwd: String,
    fds: BTreeMap<i32, Descriptor>,
    next_fd: i32,
    cache: ReadCache,
    line_buf: Vec<u8>,
}

impl State {
    fn abs(&self, p: &str) -> String {
        path::normalize(&path::resolve(&self.cwd, p))
    }

    fn is_open(&self, ino: Ino) -> bool {
        self.fds
            .values()
            .any(|d| matches!(d, Descriptor::File(f) if f.ino == ino))
    }

    fn create_node(&mut self, abs: &str, node: Node) -> Result<Ino> {
        let (parent, name) = self.tree.lookup_parent(abs)?;
        let Some(name) = name else {
            return Err(FsError::AlreadyExists(abs.to_string()));
        };
        if self.tree.child(parent, &name).is_some() {
            return Err(FsError::AlreadyExists(abs.to_string()));
        }
        let ino = self.tree.alloc(node);
        self.tree.insert_child(parent, &name, ino)?;
        Ok(ino)
    }

    fn create_file(&mut self, abs: &str, perm: u32) -> Result<Ino> {
        // a dangling symlink occupies the name but resolves to nothing
        if self.tree.lookup(abs, false).is_ok() {
            return Err(FsError::NotFound(abs.to_string()));
        }
        self.create_node(abs, Node::file(perm))
    }

    /// Detaches `name` from `parent` and drops its link.
    fn detach(&mut self, parent: Ino, name: &str) -> Result<Ino> {
        let ino = self.tree.remove_child(parent, name)?;
        let open = self.is_open(ino);
        self.tree.release(ino, open)?;
        Ok(ino)
    }
}

struct Inner {
    id: String,
    state: Mutex<State>,
    sink: Mutex<OutputSink>,
    queue: Arc<tokio::sync::Mutex<()>>,
}

/// Handle to one in-memory filesystem instance.
///
/// Clones share the same node tree, descriptor table and working directory.
#[derive(Clone)]
pub struct Vfs {
    inner: Arc<Inner>,
}

impl fmt::Debug for Vfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vfs")
            .field("id", &self.inner.id)
            .field("cwd", &self.getcwd())
            .finish()
    }
}

impl Vfs {
    pub fn new(id: impl Into<String>, config: &VfsConfig) -> Self {
        let mut fds = BTreeMap::new();
        for fd in 0..STDIO_FDS {
            fds.insert(fd, Descriptor::Stdio(fd));
        }
        let state = State {
            tree: Tree::new(),
            cwd: path::ROOT.to_string(),
            fds,
            next_fd: STDIO_FDS,
            cache: ReadCache::new(config.read_cache_threshold),
            line_buf: Vec::new(),
        };
        Vfs {
            inner: Arc::new(Inner {
                id: id.into(),
                state: Mutex::new(state),
                sink: Mutex::new(default_sink()),
                queue: Arc::new(tokio::sync::Mutex::new(())),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_output_sink(&self, sink: impl Fn(&str) + Send + Sync + 'static) {
        let mut slot = self.inner.sink.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(sink);
    }

    /// Lock that serializes cwd-dependent work (guest runs) on this instance.
    pub fn execution_queue(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.inner.queue.clone()
    }

    pub fn process(&self) -> ProcessShim {
        ProcessShim::new(self.clone())
    }

    pub fn same_instance(&self, other: &Vfs) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------
    // Working directory
    // -------------------------

    pub fn getcwd(&self) -> String {
        self.state().cwd.clone()
    }

    pub fn chdir(&self, p: &str) -> Result<()> {
        let mut st = self.state();
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, true)?;
        if !st.tree.node(ino)?.is_dir() {
            return Err(FsError::NotADirectory(abs));
        }
        tracing::trace!(target: "gobox::vfs", instance = %self.inner.id, cwd = %abs, "chdir");
        st.cwd = abs;
        Ok(())
    }

    /// Absolute paths come back unchanged; relative ones are joined onto the
    /// current directory and normalized.
    pub fn resolve(&self, p: &str) -> String {
        path::resolve(&self.state().cwd, p)
    }

    // -------------------------
    // Descriptors
    // -------------------------

    pub fn open(&self, p: &str, flags: i32, perm: u32) -> Result<i32> {
        let mode = OpenMode::from_flags(flags)?;
        self.open_mode(p, mode, perm)
    }

    pub fn open_mode(&self, p: &str, mode: OpenMode, perm: u32) -> Result<i32> {
        let mut guard = self.state();
        let st = &mut *guard;
        let abs = st.abs(p);
        let ino = match st.tree.lookup(&abs, true) {
            Ok(ino) => {
                if mode.exclusive() {
                    return Err(FsError::AlreadyExists(abs));
                }
                let node = st.tree.node_mut(ino)?;
                if node.is_dir() && mode.writable() {
                    return Err(FsError::IsADirectory(abs));
                }
                if mode.truncates() {
                    let truncated = match &mut node.kind {
                        NodeKind::File(data) if !data.is_empty() => {
                            data.clear();
                            true
                        }
                        _ => false,
                    };
                    if truncated {
                        node.touch_modified();
                    }
                }
                ino
            }
            Err(FsError::NotFound(_)) if mode.creates() => st.create_file(&abs, perm)?,
            Err(err) => return Err(err),
        };

        let fd = st.next_fd;
        st.next_fd += 1;
        st.fds.insert(
            fd,
            Descriptor::File(OpenFile {
                ino,
                path: abs,
                mode,
                position: 0,
            }),
        );
        Ok(fd)
    }

    pub fn close(&self, fd: i32) -> Result<()> {
        let mut st = self.state();
        match st.fds.get(&fd) {
            None => return Err(FsError::BadDescriptor(fd)),
            // standard streams stay open for the life of the instance
            Some(Descriptor::Stdio(_)) => return Ok(()),
            Some(Descriptor::File(_)) => {}
        }
        if let Some(Descriptor::File(file)) = st.fds.remove(&fd) {
            if !st.is_open(file.ino) {
                st.tree.reap_if_unlinked(file.ino);
            }
        }
        Ok(())
    }

    /// Reads into `buf` at `position`, or at the descriptor's offset (which
    /// then advances) when `position` is `None`.
    pub fn read(&self, fd: i32, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        let mut guard = self.state();
        let st = &mut *guard;
        let file = match st.fds.get_mut(&fd) {
            None => return Err(FsError::BadDescriptor(fd)),
            Some(Descriptor::Stdio(_)) => return Ok(0),
            Some(Descriptor::File(file)) => file,
        };
        if !file.mode.readable() {
            return Err(FsError::BadDescriptor(fd));
        }
        let node = st.tree.node_mut(file.ino)?;
        let pos = position.unwrap_or(file.position);
        let n = match &node.kind {
            NodeKind::File(data) => {
                let start = usize::try_from(pos).unwrap_or(usize::MAX).min(data.len());
                let n = (data.len() - start).min(buf.len());
                buf[..n].copy_from_slice(&data[start..start + n]);
                n
            }
            NodeKind::Directory(_) => return Err(FsError::IsADirectory(file.path.clone())),
            NodeKind::Symlink(_) => return Err(FsError::InvalidArgument(file.path.clone())),
        };
        node.times.atime = SystemTime::now();
        if position.is_none() {
            file.position = pos + n as u64;
        }
        Ok(n)
    }

    /// Writes `data` at `position`, or at the descriptor's offset when
    /// `position` is `None`. Descriptors 0-2 go to the output sink line by line.
    pub fn write(&self, fd: i32, data: &[u8], position: Option<u64>) -> Result<usize> {
        let lines = {
            let mut guard = self.state();
            let st = &mut *guard;
            match st.fds.get_mut(&fd) {
                None => return Err(FsError::BadDescriptor(fd)),
                Some(Descriptor::Stdio(_)) => {
                    if position.is_some() {
                        return Err(FsError::NotImplemented("positional write to a standard stream"));
                    }
                    st.line_buf.extend_from_slice(data);
                    take_lines(&mut st.line_buf)
                }
                Some(Descriptor::File(file)) => {
                    if !file.mode.writable() {
                        return Err(FsError::BadDescriptor(fd));
                    }
                    let node = st.tree.node_mut(file.ino)?;
                    let NodeKind::File(content) = &mut node.kind else {
                        return Err(FsError::IsADirectory(file.path.clone()));
                    };
                    let end = span_end(position.unwrap_or(file.position), data.len(), &file.path)?;
                    let pos = end - data.len();
                    if content.len() < end {
                        content.resize(end, 0);
                    }
                    content[pos..end].copy_from_slice(data);
                    node.touch_modified();
                    if position.is_none() {
                        file.position = end as u64;
                    }
                    return Ok(data.len());
                }
            }
        };
        self.emit(lines);
        Ok(data.len())
    }

    /// Emits whatever partial line is still buffered for the standard streams.
    pub fn flush_output(&self) {
        let rest = std::mem::take(&mut self.state().line_buf);
        if !rest.is_empty() {
            self.emit(vec![String::from_utf8_lossy(&rest).into_owned()]);
        }
    }

    fn emit(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let sink = self
            .inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for line in lines {
            sink(&line);
        }
    }

    // -------------------------
    // Stat
    // -------------------------

    pub fn stat(&self, p: &str) -> Result<Stat> {
        self.stat_with(p, true)
    }

    pub fn lstat(&self, p: &str) -> Result<Stat> {
        self.stat_with(p, false)
    }

    fn stat_with(&self, p: &str, follow: bool) -> Result<Stat> {
        let st = self.state();
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, follow)?;
        Ok(Stat::from_node(ino, st.tree.node(ino)?))
    }

    pub fn fstat(&self, file: impl Into<FileRef>) -> Result<Stat> {
        let fd = match file.into() {
            FileRef::Path(p) => return self.stat(&p),
            FileRef::Fd(fd) => fd,
        };
        let st = self.state();
        match st.fds.get(&fd) {
            None => Err(FsError::BadDescriptor(fd)),
            Some(Descriptor::Stdio(n)) => Ok(Stat::stdio(*n)),
            Some(Descriptor::File(f)) => Ok(Stat::from_node(f.ino, st.tree.node(f.ino)?)),
        }
    }

    pub fn exists(&self, p: &str) -> bool {
        self.stat(p).is_ok()
    }

    // -------------------------
    // Directories
    // -------------------------

    pub fn readdir(&self, p: &str) -> Result<Vec<String>> {
        let st = self.state();
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, true)?;
        Ok(st.tree.children(ino, &abs)?.keys().cloned().collect())
    }

    pub fn mkdir(&self, p: &str, perm: u32) -> Result<()> {
        let mut st = self.state();
        let abs = st.abs(p);
        st.create_node(&abs, Node::directory(perm))?;
        Ok(())
    }

    pub fn rmdir(&self, p: &str) -> Result<()> {
        let mut guard = self.state();
        let st = &mut *guard;
        let abs = st.abs(p);
        let (parent, name) = st.tree.lookup_parent(&abs)?;
        let Some(name) = name else {
            return Err(FsError::InvalidArgument("cannot remove the root directory".into()));
        };
        let ino = st
            .tree
            .child(parent, &name)
            .ok_or_else(|| FsError::NotFound(abs.clone()))?;
        match &st.tree.node(ino)?.kind {
            NodeKind::Directory(children) if !children.is_empty() => {
                return Err(FsError::NotEmpty(abs))
            }
            NodeKind::Directory(_) => {}
            _ => return Err(FsError::NotADirectory(abs)),
        }
        st.detach(parent, &name)?;
        Ok(())
    }

    // -------------------------
    // Names
    // -------------------------

    pub fn unlink(&self, p: &str) -> Result<()> {
        let mut guard = self.state();
        let st = &mut *guard;
        let abs = st.abs(p);
        let (parent, name) = st.tree.lookup_parent(&abs)?;
        let Some(name) = name else {
            return Err(FsError::IsADirectory(abs));
        };
        let ino = st
            .tree
            .child(parent, &name)
            .ok_or_else(|| FsError::NotFound(abs.clone()))?;
        if st.tree.node(ino)?.is_dir() {
            return Err(FsError::IsADirectory(abs));
        }
        st.detach(parent, &name)?;
        st.cache.evict(&abs);
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut guard = self.state();
        let st = &mut *guard;
        let from_abs = st.abs(from);
        let to_abs = st.abs(to);

        let (from_parent, from_name) = st.tree.lookup_parent(&from_abs)?;
        let Some(from_name) = from_name else {
            return Err(FsError::InvalidArgument("cannot rename the root directory".into()));
        };
        let ino = st
            .tree
            .child(from_parent, &from_name)
            .ok_or_else(|| FsError::NotFound(from_abs.clone()))?;
        let (to_parent, to_name) = st.tree.lookup_parent(&to_abs)?;
        let Some(to_name) = to_name else {
            return Err(FsError::InvalidArgument("cannot replace the root directory".into()));
        };
        if from_parent == to_parent && from_name == to_name {
            return Ok(());
        }

        let moving_dir = st.tree.node(ino)?.is_dir();
        if moving_dir && to_abs.starts_with(&format!("{from_abs}/")) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {from_abs} into its own subdirectory"
            )));
        }

        if let Some(existing) = st.tree.child(to_parent, &to_name) {
            if existing == ino {
                return Ok(());
            }
            match (moving_dir, &st.tree.node(existing)?.kind) {
                (true, NodeKind::Directory(children)) if !children.is_empty() => {
                    return Err(FsError::NotEmpty(to_abs))
                }
                (true, NodeKind::Directory(_)) => {}
                (true, _) => return Err(FsError::NotADirectory(to_abs)),
                (false, NodeKind::Directory(_)) => return Err(FsError::IsADirectory(to_abs)),
                (false, _) => {}
            }
            st.detach(to_parent, &to_name)?;
        }

        st.tree.remove_child(from_parent, &from_name)?;
        st.tree.insert_child(to_parent, &to_name, ino)?;
        st.tree.node_mut(ino)?.touch_changed();
        st.cache.evict(&from_abs);
        st.cache.evict(&to_abs);
        Ok(())
    }

    pub fn link(&self, existing: &str, new: &str) -> Result<()> {
        let mut guard = self.state();
        let st = &mut *guard;
        let existing_abs = st.abs(existing);
        let new_abs = st.abs(new);
        let ino = st.tree.lookup(&existing_abs, false)?;
        if st.tree.node(ino)?.is_dir() {
            return Err(FsError::InvalidArgument(format!(
                "cannot hard link directory {existing_abs}"
            )));
        }
        let (parent, name) = st.tree.lookup_parent(&new_abs)?;
        let Some(name) = name else {
            return Err(FsError::AlreadyExists(new_abs));
        };
        if st.tree.child(parent, &name).is_some() {
            return Err(FsError::AlreadyExists(new_abs));
        }
        st.tree.insert_child(parent, &name, ino)?;
        let node = st.tree.node_mut(ino)?;
        node.nlink += 1;
        node.touch_changed();
        Ok(())
    }

    /// Creates `link` pointing at `target`. Relative targets are resolved
    /// against the current directory like every other path argument.
    pub fn symlink(&self, target: &str, link: &str) -> Result<()> {
        let mut st = self.state();
        let target = path::resolve(&st.cwd, target);
        let abs = st.abs(link);
        st.create_node(&abs, Node::symlink(target))?;
        Ok(())
    }

    pub fn readlink(&self, p: &str) -> Result<String> {
        let st = self.state();
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, false)?;
        match &st.tree.node(ino)?.kind {
            NodeKind::Symlink(target) => Ok(target.clone()),
            _ => Err(FsError::InvalidArgument(format!("not a symlink: {abs}"))),
        }
    }

    // -------------------------
    // Metadata
    // -------------------------

    fn with_node<T>(
        &self,
        p: &str,
        follow: bool,
        f: impl FnOnce(&mut Node, &str) -> Result<T>,
    ) -> Result<T> {
        let mut st = self.state();
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, follow)?;
        f(st.tree.node_mut(ino)?, &abs)
    }

    /// Permission bits are recorded and reported, never enforced.
    pub fn chmod(&self, p: &str, perm: u32) -> Result<()> {
        self.with_node(p, true, |node, _| {
            node.perm = perm & 0o7777;
            node.touch_changed();
            Ok(())
        })
    }

    pub fn chown(&self, p: &str, uid: u32, gid: u32) -> Result<()> {
        self.with_node(p, true, |node, _| {
            node.uid = uid;
            node.gid = gid;
            node.touch_changed();
            Ok(())
        })
    }

    pub fn lchown(&self, p: &str, uid: u32, gid: u32) -> Result<()> {
        self.with_node(p, false, |node, _| {
            node.uid = uid;
            node.gid = gid;
            node.touch_changed();
            Ok(())
        })
    }

    pub fn truncate(&self, p: &str, len: u64) -> Result<()> {
        self.with_node(p, true, |node, abs| {
            let NodeKind::File(data) = &mut node.kind else {
                return Err(FsError::IsADirectory(abs.to_string()));
            };
            data.resize(span_end(len, 0, abs)?, 0);
            node.touch_modified();
            Ok(())
        })
    }

    pub fn utimes(&self, p: &str, atime_ms: i64, mtime_ms: i64) -> Result<()> {
        self.with_node(p, true, |node, _| {
            node.times.atime = stat::from_millis(atime_ms);
            node.times.mtime = stat::from_millis(mtime_ms);
            node.touch_changed();
            Ok(())
        })
    }

    // -------------------------
    // Whole files
    // -------------------------

    pub fn read_file(&self, p: &str) -> Result<Arc<[u8]>> {
        let mut guard = self.state();
        let st = &mut *guard;
        let abs = st.abs(p);
        let ino = st.tree.lookup(&abs, true)?;
        let node = st.tree.node(ino)?;
        let NodeKind::File(data) = &node.kind else {
            return Err(FsError::IsADirectory(abs));
        };
        if let Some(hit) = st.cache.get(&abs, ino, node.generation) {
            return Ok(hit);
        }
        let bytes: Arc<[u8]> = Arc::from(data.as_slice());
        st.cache.store(&abs, ino, node.generation, &bytes);
        Ok(bytes)
    }

    /// Creates or replaces the file at `p`. Large contents go straight into
    /// the read cache.
    pub fn write_file(&self, p: &str, data: &[u8]) -> Result<()> {
        let mut guard = self.state();
        let st = &mut *guard;
        let abs = st.abs(p);
        let ino = match st.tree.lookup(&abs, true) {
            Ok(ino) => ino,
            Err(FsError::NotFound(_)) => st.create_file(&abs, DEFAULT_FILE_MODE)?,
            Err(err) => return Err(err),
        };
        let node = st.tree.node_mut(ino)?;
        let NodeKind::File(content) = &mut node.kind else {
            return Err(FsError::IsADirectory(abs));
        };
        content.clear();
        content.extend_from_slice(data);
        node.touch_modified();
        let generation = node.generation;
        if st.cache.admits(data.len()) {
            let bytes: Arc<[u8]> = Arc::from(data);
            st.cache.store(&abs, ino, generation, &bytes);
        } else {
            st.cache.evict(&abs);
        }
        Ok(())
    }

    // -------------------------
    // Recursive helpers
    // -------------------------

    /// Depth-first traversal rooted at `p`. Directories are visited on entry
    /// (`true`) and on exit (`false`); everything else once, on entry.
    /// Symlinks below the root are not followed. Returns `Ok(false)` when
    /// `visit` stopped the walk early.
    pub fn walk<F>(&self, p: &str, mut visit: F) -> Result<bool>
    where
        F: FnMut(&str, &Stat, bool) -> bool,
    {
        let root = self.state().abs(p);
        let stat = self.stat(&root)?;
        self.walk_from(&root, stat, &mut visit)
    }

    fn walk_from(
        &self,
        p: &str,
        stat: Stat,
        visit: &mut dyn FnMut(&str, &Stat, bool) -> bool,
    ) -> Result<bool> {
        if !stat.is_directory() {
            return Ok(visit(p, &stat, true));
        }
        if !visit(p, &stat, true) {
            return Ok(false);
        }
        for name in self.readdir(p)? {
            let child = path::join(p, &name);
            let child_stat = self.lstat(&child)?;
            if !self.walk_from(&child, child_stat, visit)? {
                return Ok(false);
            }
        }
        Ok(visit(p, &stat, false))
    }

    /// Removes `p` and everything below it. A missing path is not an error;
    /// the root itself is emptied but kept.
    pub fn remove_all(&self, p: &str) -> Result<()> {
        let abs = self.state().abs(p);
        let stat = match self.lstat(&abs) {
            Ok(stat) => stat,
            Err(FsError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };
        if !stat.is_directory() {
            return self.unlink(&abs);
        }
        for name in self.readdir(&abs)? {
            self.remove_all(&path::join(&abs, &name))?;
        }
        if abs == path::ROOT {
            return Ok(());
        }
        self.rmdir(&abs)
    }

    /// Creates `p` and any missing parents.
    pub fn mkdir_all(&self, p: &str, perm: u32) -> Result<()> {
        let abs = self.state().abs(p);
        let mut cur = String::with_capacity(abs.len());
        for seg in path::segments(&abs) {
            cur.push(path::SEP);
            cur.push_str(seg);
            match self.mkdir(&cur, perm) {
                Ok(()) | Err(FsError::AlreadyExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if !self.stat(&abs)?.is_directory() {
            return Err(FsError::NotADirectory(abs));
        }
        Ok(())
    }
}

fn take_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(idx) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=idx).collect();
        lines.push(String::from_utf8_lossy(&line[..idx]).into_owned());
    }
    lines
}
