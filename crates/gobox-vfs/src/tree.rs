use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::SystemTime;

use gobox_contracts::{DEFAULT_DIR_MODE, S_IFDIR, S_IFLNK, S_IFREG};

use crate::error::{FsError, Result};
use crate::path;

pub(crate) type Ino = u64;

pub(crate) const ROOT_INO: Ino = 1;

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Times {
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
}

impl Times {
    fn now() -> Self {
        let now = SystemTime::now();
        Times {
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    File(Vec<u8>),
    Directory(BTreeMap<String, Ino>),
    Symlink(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub times: Times,
    /// Bumped on every content change; read cache entries are checked against it.
    pub generation: u64,
}

impl Node {
    pub fn file(perm: u32) -> Self {
        Self::new(NodeKind::File(Vec::new()), perm)
    }

    pub fn directory(perm: u32) -> Self {
        let mut node = Self::new(NodeKind::Directory(BTreeMap::new()), perm);
        node.nlink = 2;
        node
    }

    pub fn symlink(target: String) -> Self {
        Self::new(NodeKind::Symlink(target), 0o777)
    }

    fn new(kind: NodeKind, perm: u32) -> Self {
        Node {
            kind,
            perm: perm & 0o7777,
            uid: 0,
            gid: 0,
            nlink: 1,
            times: Times::now(),
            generation: 0,
        }
    }

    pub fn mode(&self) -> u32 {
        let ty = match self.kind {
            NodeKind::File(_) => S_IFREG,
            NodeKind::Directory(_) => S_IFDIR,
            NodeKind::Symlink(_) => S_IFLNK,
        };
        ty | self.perm
    }

    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File(data) => data.len() as u64,
            NodeKind::Directory(children) => children.len() as u64,
            NodeKind::Symlink(target) => target.len() as u64,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn touch_modified(&mut self) {
        let now = SystemTime::now();
        self.times.mtime = now;
        self.times.ctime = now;
        self.generation += 1;
    }

    pub fn touch_changed(&mut self) {
        self.times.ctime = SystemTime::now();
    }
}

/// Inode table rooted at [`ROOT_INO`].
#[derive(Debug)]
pub(crate) struct Tree {
    nodes: HashMap<Ino, Node>,
    next_ino: Ino,
}

impl Tree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_INO, Node::directory(DEFAULT_DIR_MODE));
        Tree {
            nodes,
            next_ino: ROOT_INO + 1,
        }
    }

    pub fn node(&self, ino: Ino) -> Result<&Node> {
        self.nodes
            .get(&ino)
            .ok_or_else(|| FsError::NotFound(format!("inode {ino}")))
    }

    pub fn node_mut(&mut self, ino: Ino) -> Result<&mut Node> {
        self.nodes
            .get_mut(&ino)
            .ok_or_else(|| FsError::NotFound(format!("inode {ino}")))
    }

    pub fn alloc(&mut self, node: Node) -> Ino {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.nodes.insert(ino, node);
        ino
    }

    pub fn children(&self, ino: Ino, shown: &str) -> Result<&BTreeMap<String, Ino>> {
        match &self.node(ino)?.kind {
            NodeKind::Directory(children) => Ok(children),
            _ => Err(FsError::NotADirectory(shown.to_string())),
        }
    }

    fn children_mut(&mut self, ino: Ino, shown: &str) -> Result<&mut BTreeMap<String, Ino>> {
        match &mut self.node_mut(ino)?.kind {
            NodeKind::Directory(children) => Ok(children),
            _ => Err(FsError::NotADirectory(shown.to_string())),
        }
    }

    /// Walks an absolute path. Intermediate symlinks are always followed; the
    /// final one only when `follow_last` is set.
    pub fn lookup(&self, abs: &str, follow_last: bool) -> Result<Ino> {
        if abs.is_empty() {
            return Err(FsError::NotFound(String::new()));
        }
        let mut remaining: VecDeque<String> = path::segments(abs).map(str::to_string).collect();
        let mut stack: Vec<Ino> = vec![ROOT_INO];
        let mut hops = 0usize;

        while let Some(seg) = remaining.pop_front() {
            let cur = stack.last().copied().unwrap_or(ROOT_INO);
            if seg == ".." {
                if stack.len() > 1 {
                    stack.pop();
                }
                continue;
            }
            let child = *self
                .children(cur, abs)?
                .get(&seg)
                .ok_or_else(|| FsError::NotFound(abs.to_string()))?;

            if let NodeKind::Symlink(target) = &self.node(child)?.kind {
                if !remaining.is_empty() || follow_last {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(FsError::SymlinkLoop(abs.to_string()));
                    }
                    if path::is_absolute(target) {
                        stack.truncate(1);
                    }
                    for s in path::segments(target).collect::<Vec<_>>().into_iter().rev() {
                        remaining.push_front(s.to_string());
                    }
                    continue;
                }
            }
            stack.push(child);
        }
        Ok(stack.last().copied().unwrap_or(ROOT_INO))
    }

    /// Resolves the directory that holds the last segment of `abs`.
    ///
    /// Returns `None` for the name when `abs` names the root.
    pub fn lookup_parent(&self, abs: &str) -> Result<(Ino, Option<String>)> {
        let normalized = path::normalize(abs);
        let Some((parent, name)) = path::split_parent(&normalized) else {
            return Ok((ROOT_INO, None));
        };
        let parent_ino = self.lookup(parent, true)?;
        if !self.node(parent_ino)?.is_dir() {
            return Err(FsError::NotADirectory(parent.to_string()));
        }
        Ok((parent_ino, Some(name.to_string())))
    }

    pub fn child(&self, dir: Ino, name: &str) -> Option<Ino> {
        match &self.nodes.get(&dir)?.kind {
            NodeKind::Directory(children) => children.get(name).copied(),
            _ => None,
        }
    }

    pub fn insert_child(&mut self, dir: Ino, name: &str, ino: Ino) -> Result<()> {
        let child_is_dir = self.node(ino)?.is_dir();
        let children = self.children_mut(dir, name)?;
        children.insert(name.to_string(), ino);
        let parent = self.node_mut(dir)?;
        if child_is_dir {
            parent.nlink += 1;
        }
        parent.touch_modified();
        Ok(())
    }

    pub fn remove_child(&mut self, dir: Ino, name: &str) -> Result<Ino> {
        let children = self.children_mut(dir, name)?;
        let ino = children
            .remove(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let child_is_dir = self.node(ino)?.is_dir();
        let parent = self.node_mut(dir)?;
        if child_is_dir {
            parent.nlink = parent.nlink.saturating_sub(1);
        }
        parent.touch_modified();
        Ok(ino)
    }

    /// Drops one link to `ino`, freeing the node once nothing references it.
    pub fn release(&mut self, ino: Ino, still_open: bool) -> Result<()> {
        let node = self.node_mut(ino)?;
        node.nlink = if node.is_dir() {
            0
        } else {
            node.nlink.saturating_sub(1)
        };
        node.touch_changed();
        if node.nlink == 0 && !still_open {
            self.nodes.remove(&ino);
        }
        Ok(())
    }

    pub fn reap_if_unlinked(&mut self, ino: Ino) {
        if self.nodes.get(&ino).is_some_and(|n| n.nlink == 0) {
            self.nodes.remove(&ino);
        }
    }
}
