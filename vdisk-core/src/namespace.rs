//! Namespace: the hierarchical directory/file tree.
//!
//! Represented as a flat arena (`Vec<Entry>`) addressed by `NodeId` handles
//! rather than as an owned recursive tree, per the specification's own
//! Design Notes: this sidesteps the aliasing problem of an open file
//! surviving a later `mv`, and makes the tree trivial to flatten into (and
//! rebuild from) the nested `NodeDoc` shape the metadata file uses on disk.
//!
//! Node 0 is always the root directory, named `"/"`, with no parent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};
use crate::oft::OpenFileTable;

/// Handle into the namespace arena. Stable across `mv` (the handle itself
/// never changes, only which directory's children map contains it).
pub type NodeId = usize;

/// The root directory's handle.
pub const ROOT_ID: NodeId = 0;

#[derive(Debug, Clone)]
enum Entry {
    Dir {
        name: String,
        children: BTreeMap<String, NodeId>,
    },
    File {
        name: String,
        size: u64,
        first_block: i64,
    },
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Dir { name, .. } => name,
            Entry::File { name, .. } => name,
        }
    }
}

/// Whether a namespace entry is a directory or a file; used by `ls` and
/// `search` to format output without exposing the arena's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Directory entry.
    Dir,
    /// File entry.
    File,
}

/// The wire-format shape of a single namespace node, matching the
/// `metadata.json` schema described in the storage core's external
/// interfaces: `name`, `type` (`"dir"`/`"file"`), and either `children` or
/// `size`+`first_block`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeDoc {
    /// A directory node and its children.
    #[serde(rename = "dir")]
    Dir {
        /// This directory's name.
        name: String,
        /// Child nodes keyed by name.
        children: BTreeMap<String, NodeDoc>,
    },
    /// A file node.
    #[serde(rename = "file")]
    File {
        /// This file's name.
        name: String,
        /// Size in bytes.
        size: u64,
        /// Index of the first block in the file's chain, or `-1`.
        first_block: i64,
    },
}

/// Validate a name per the data model: non-empty, and containing no `/`.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// Split a raw path string typed at the command surface into an absolute
/// sequence of directory/file names, applying `.`/`..`/leading-`/`
/// resolution against `cwd`. This is used both for `cd`'s single-component
/// argument and for `mv`'s general path arguments.
pub fn resolve_components(raw: &str, cwd: &[String]) -> Vec<String> {
    let mut comps: Vec<String> = if raw.starts_with('/') {
        Vec::new()
    } else {
        cwd.to_vec()
    };
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                comps.pop();
            }
            name => comps.push(name.to_string()),
        }
    }
    comps
}

/// The in-memory directory tree, plus the current working directory.
/// The current working directory is never persisted (see the storage
/// core's persistence coordinator).
#[derive(Debug, Clone)]
pub struct Namespace {
    arena: Vec<Entry>,
    cwd: Vec<String>,
}

impl Namespace {
    /// A fresh namespace: just the empty root directory.
    pub fn new() -> Namespace {
        Namespace {
            arena: vec![Entry::Dir {
                name: "/".to_string(),
                children: BTreeMap::new(),
            }],
            cwd: Vec::new(),
        }
    }

    /// Rebuild a namespace from the persisted tree shape.
    pub fn from_doc(doc: NodeDoc) -> Namespace {
        let mut arena = Vec::new();
        build_arena(&mut arena, doc);
        Namespace {
            arena,
            cwd: Vec::new(),
        }
    }

    /// Flatten this namespace back into the persisted tree shape.
    pub fn to_doc(&self) -> NodeDoc {
        self.entry_to_doc(ROOT_ID)
    }

    fn entry_to_doc(&self, id: NodeId) -> NodeDoc {
        match &self.arena[id] {
            Entry::Dir { name, children } => NodeDoc::Dir {
                name: name.clone(),
                children: children
                    .iter()
                    .map(|(k, &child_id)| (k.clone(), self.entry_to_doc(child_id)))
                    .collect(),
            },
            Entry::File {
                name,
                size,
                first_block,
            } => NodeDoc::File {
                name: name.clone(),
                size: *size,
                first_block: *first_block,
            },
        }
    }

    /// The current working directory as an absolute path string (`"/"` at
    /// root, `"/a/b"` otherwise).
    pub fn cwd_path(&self) -> String {
        if self.cwd.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.cwd.join("/"))
        }
    }

    fn children(&self, id: NodeId) -> Result<&BTreeMap<String, NodeId>> {
        match &self.arena[id] {
            Entry::Dir { children, .. } => Ok(children),
            Entry::File { name, .. } => Err(FsError::NotADirectory(name.clone())),
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut BTreeMap<String, NodeId>> {
        match &mut self.arena[id] {
            Entry::Dir { children, .. } => Ok(children),
            Entry::File { name, .. } => Err(FsError::NotADirectory(name.clone())),
        }
    }

    /// Walk `components` from the root, requiring every intermediate (and
    /// final) entry to be a directory. Returns that directory's `NodeId`.
    fn resolve_dir(&self, components: &[String]) -> Result<NodeId> {
        let mut cur = ROOT_ID;
        for name in components {
            let next = *self
                .children(cur)?
                .get(name)
                .ok_or_else(|| FsError::NotFound(name.clone()))?;
            if !matches!(self.arena[next], Entry::Dir { .. }) {
                return Err(FsError::NotADirectory(name.clone()));
            }
            cur = next;
        }
        Ok(cur)
    }

    /// Current working directory's `NodeId`. Cannot fail: `cd` never
    /// commits a `cwd` that does not resolve.
    fn cwd_id(&self) -> NodeId {
        self.resolve_dir(&self.cwd)
            .expect("current working directory must always resolve")
    }

    /// `mkdir <name>`: insert a new, empty directory under the current
    /// directory.
    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        if !valid_name(name) {
            return Err(FsError::InvalidCommand(format!("invalid name '{}'", name)));
        }
        let cwd = self.cwd_id();
        if self.children(cwd)?.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let id = self.arena.len();
        self.arena.push(Entry::Dir {
            name: name.to_string(),
            children: BTreeMap::new(),
        });
        self.children_mut(cwd)?.insert(name.to_string(), id);
        Ok(())
    }

    /// `cd <name>`: update the current directory per the storage core's
    /// path resolution rules. `cd ..` at root and `cd /` are always valid.
    pub fn cd(&mut self, arg: &str) -> Result<()> {
        let target = resolve_components(arg, &self.cwd);
        self.resolve_dir(&target)?;
        self.cwd = target;
        Ok(())
    }

    /// `ls`: list the current directory's children, sorted by name.
    pub fn ls(&self) -> Vec<(String, Kind, Option<u64>)> {
        let cwd = self.cwd_id();
        let children = self.children(cwd).expect("cwd is always a directory");
        children
            .iter()
            .map(|(name, &id)| match &self.arena[id] {
                Entry::Dir { .. } => (name.clone(), Kind::Dir, None),
                Entry::File { size, .. } => (name.clone(), Kind::File, Some(*size)),
            })
            .collect()
    }

    /// `create <name>`: insert a new, empty file under the current
    /// directory.
    pub fn create(&mut self, name: &str) -> Result<()> {
        if !valid_name(name) {
            return Err(FsError::InvalidCommand(format!("invalid name '{}'", name)));
        }
        let cwd = self.cwd_id();
        if self.children(cwd)?.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let id = self.arena.len();
        self.arena.push(Entry::File {
            name: name.to_string(),
            size: 0,
            first_block: -1,
        });
        self.children_mut(cwd)?.insert(name.to_string(), id);
        Ok(())
    }

    /// Resolve `name` within the current directory, returning its
    /// `NodeId`. Does not check file-vs-directory.
    pub fn lookup_in_cwd(&self, name: &str) -> Result<NodeId> {
        let cwd = self.cwd_id();
        self.children(cwd)?
            .get(name)
            .copied()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Read-only access to a file's `(size, first_block)`, for `open`.
    pub fn file_info(&self, id: NodeId) -> Result<(u64, i64)> {
        match &self.arena[id] {
            Entry::File { size, first_block, .. } => Ok((*size, *first_block)),
            Entry::Dir { name, .. } => Err(FsError::IsDirectory(name.clone())),
        }
    }

    /// Update a file's `size`/`first_block` after a write.
    pub fn set_file_info(&mut self, id: NodeId, size: u64, first_block: i64) {
        if let Entry::File {
            size: s,
            first_block: fb,
            ..
        } = &mut self.arena[id]
        {
            *s = size;
            *fb = first_block;
        }
    }

    /// `delete <name>`: remove the named child of the current directory.
    /// Returns the file's `first_block` so the caller can free its chain
    /// (directories have no blocks to free); fails `NotEmpty` for a
    /// non-empty directory. Also drops any open-file-table entry keyed by
    /// `name`.
    pub fn delete(&mut self, name: &str, oft: &mut OpenFileTable) -> Result<Option<i64>> {
        let cwd = self.cwd_id();
        let id = *self
            .children(cwd)?
            .get(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let first_block = match &self.arena[id] {
            Entry::Dir { children, .. } => {
                if !children.is_empty() {
                    return Err(FsError::NotEmpty(name.to_string()));
                }
                None
            }
            Entry::File { first_block, .. } => Some(*first_block),
        };

        self.children_mut(cwd)?.remove(name);
        oft.close_quietly(name);
        Ok(first_block)
    }

    /// `search <name>`: depth-first scan of the whole tree for every node
    /// whose local name exactly matches `name`. Returns `(absolute_path,
    /// kind)` pairs in the order discovered.
    pub fn search(&self, name: &str) -> Vec<(String, Kind)> {
        let mut matches = Vec::new();
        self.search_from(ROOT_ID, "", name, &mut matches);
        matches
    }

    fn search_from(&self, id: NodeId, prefix: &str, needle: &str, out: &mut Vec<(String, Kind)>) {
        match &self.arena[id] {
            Entry::Dir { name, children } => {
                let here = if id == ROOT_ID {
                    "/".to_string()
                } else {
                    format!("{}/{}", prefix, name)
                };
                if id != ROOT_ID && name == needle {
                    out.push((here.clone(), Kind::Dir));
                }
                let next_prefix = if id == ROOT_ID { "".to_string() } else { here };
                for &child in children.values() {
                    self.search_from(child, &next_prefix, needle, out);
                }
            }
            Entry::File { name, .. } => {
                if name == needle {
                    out.push((format!("{}/{}", prefix, name), Kind::File));
                }
            }
        }
    }

    /// `mv <src> <dst>`: resolve, classify, and perform a move/rename per
    /// §4.3's five-case destination classification. Returns `true` if an
    /// open handle under the source basename was implicitly closed.
    pub fn mv(&mut self, src: &str, dst: &str, oft: &mut OpenFileTable) -> Result<bool> {
        let src_components = resolve_components(src, &self.cwd);
        let (src_parent, src_name) = split_last(&src_components)
            .ok_or_else(|| FsError::InvalidDestination(src.to_string()))?;
        let src_parent_id = self.resolve_dir(src_parent)?;
        let moved_id = *self
            .children(src_parent_id)?
            .get(&src_name)
            .ok_or_else(|| FsError::NotFound(src.to_string()))?;

        let (target_dir_id, target_name) = self.classify_destination(dst, &src_name)?;

        if self.children(target_dir_id)?.contains_key(&target_name) {
            return Err(FsError::AlreadyExists(target_name));
        }

        self.children_mut(src_parent_id)?.remove(&src_name);
        match &mut self.arena[moved_id] {
            Entry::Dir { name, .. } => *name = target_name.clone(),
            Entry::File { name, .. } => *name = target_name.clone(),
        }
        self.children_mut(target_dir_id)?
            .insert(target_name, moved_id);

        Ok(oft.close_quietly(&src_name))
    }

    /// Classify a `mv` destination string into `(target_directory,
    /// target_name)` per §4.3's five cases.
    fn classify_destination(&self, dst: &str, src_basename: &str) -> Result<(NodeId, String)> {
        if dst == "/" {
            return Ok((ROOT_ID, src_basename.to_string()));
        }
        if dst == "." {
            return Ok((self.cwd_id(), src_basename.to_string()));
        }

        let dst_components = resolve_components(dst, &self.cwd);
        if dst_components == self.cwd {
            return Ok((self.cwd_id(), src_basename.to_string()));
        }
        if dst_components.is_empty() {
            return Ok((ROOT_ID, src_basename.to_string()));
        }

        let (parent, last) = split_last(&dst_components)
            .ok_or_else(|| FsError::InvalidDestination(dst.to_string()))?;
        let parent_id = self
            .resolve_dir(parent)
            .map_err(|_| FsError::InvalidDestination(dst.to_string()))?;

        match self.children(parent_id)?.get(&last) {
            Some(&existing) => match &self.arena[existing] {
                Entry::Dir { .. } => Ok((existing, src_basename.to_string())),
                Entry::File { .. } => Err(FsError::AlreadyExists(last)),
            },
            None => Ok((parent_id, last)),
        }
    }
}

impl Default for Namespace {
    fn default() -> Namespace {
        Namespace::new()
    }
}

fn split_last(components: &[String]) -> Option<(&[String], String)> {
    components.split_last().map(|(last, rest)| (rest, last.clone()))
}

fn build_arena(arena: &mut Vec<Entry>, doc: NodeDoc) -> NodeId {
    match doc {
        NodeDoc::File {
            name,
            size,
            first_block,
        } => {
            let id = arena.len();
            arena.push(Entry::File {
                name,
                size,
                first_block,
            });
            id
        }
        NodeDoc::Dir { name, children } => {
            let id = arena.len();
            // Reserve the slot before recursing so a directory's own id is
            // always lower than any of its descendants'.
            arena.push(Entry::Dir {
                name,
                children: BTreeMap::new(),
            });
            let mut built = BTreeMap::new();
            for (child_name, child_doc) in children {
                built.insert(child_name, build_arena(arena, child_doc));
            }
            if let Entry::Dir { children, .. } = &mut arena[id] {
                *children = built;
            }
            id
        }
    }
}
