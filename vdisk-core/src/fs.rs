//! Top-level orchestrator tying the allocation layer, namespace, open-file
//! table, and persistence coordinator into the operations the command
//! surface dispatches.
//!
//! Every mutating operation (`mkdir`, `create`, `write`, `delete`, `mv`)
//! ends by calling the persistence coordinator; `cd`, `ls`, `open`,
//! `close`, `read`, and `search` never do (§4.7).

use std::path::PathBuf;

use log::info;

use crate::alloc::BlockVolume;
use crate::error::{FsError, Result};
use crate::namespace::{Kind, Namespace};
use crate::oft::OpenFileTable;
use crate::persistence;

/// Owns the entire in-memory filesystem state for one run of the command
/// surface. Constructed once at startup and dropped (after a final save)
/// at `exit`.
pub struct VirtualFs {
    base_dir: PathBuf,
    volume: BlockVolume,
    namespace: Namespace,
    oft: OpenFileTable,
}

impl VirtualFs {
    /// Load (or freshly initialize) the filesystem rooted at `base_dir`.
    pub fn open(base_dir: PathBuf) -> Result<VirtualFs> {
        let (volume, namespace) = persistence::load(&base_dir)?;
        Ok(VirtualFs {
            base_dir,
            volume,
            namespace,
            oft: OpenFileTable::new(),
        })
    }

    /// Absolute current working directory, for the prompt.
    pub fn cwd_path(&self) -> String {
        self.namespace.cwd_path()
    }

    fn save(&self) -> Result<()> {
        persistence::save(&self.base_dir, &self.volume, &self.namespace)
    }

    /// `mkdir <name>`.
    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        self.namespace.mkdir(name)?;
        self.save()
    }

    /// `cd <name>`.
    pub fn cd(&mut self, arg: &str) -> Result<()> {
        self.namespace.cd(arg)
    }

    /// `ls`.
    pub fn ls(&self) -> Vec<(String, Kind, Option<u64>)> {
        self.namespace.ls()
    }

    /// `create <name>`.
    pub fn create(&mut self, name: &str) -> Result<()> {
        self.namespace.create(name)?;
        self.save()
    }

    /// `open <name>`.
    pub fn open_file(&mut self, name: &str) -> Result<()> {
        let id = self.namespace.lookup_in_cwd(name)?;
        self.namespace.file_info(id)?;
        self.oft.open(name, id)
    }

    /// `close <name>`.
    pub fn close_file(&mut self, name: &str) -> Result<()> {
        self.oft.close(name)
    }

    /// `write <name> <payload>`. Requires `name` to be open. Replaces the
    /// file's content entirely from offset 0 (§4.5).
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let entry = *self.oft.get(name)?;
        let (_, first_block) = self.namespace.file_info(entry.node)?;

        let new_head = self.volume.write_chain(first_block, data)?;
        self.namespace
            .set_file_info(entry.node, data.len() as u64, new_head);
        info!("write_file: {} bytes written to '{}'", data.len(), name);
        self.save()
    }

    /// `read <name>`. Requires `name` to be open.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = *self.oft.get(name)?;
        let (size, first_block) = self.namespace.file_info(entry.node)?;
        self.volume.read_chain(first_block, size)
    }

    /// `delete <name>`. Frees the file's chain (if any); fails
    /// `NotEmpty` for a non-empty directory.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let freed = self.namespace.delete(name, &mut self.oft)?;
        if let Some(first_block) = freed {
            self.volume.free_chain(first_block)?;
        }
        self.save()
    }

    /// `mv <src> <dst>`. Returns `true` if the move implicitly closed an
    /// open handle under the source basename (§4.3, §9 OQ4).
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<bool> {
        let closed = self.namespace.mv(src, dst, &mut self.oft)?;
        self.save()?;
        Ok(closed)
    }

    /// `search <name>`.
    pub fn search(&self, name: &str) -> Vec<(String, Kind)> {
        self.namespace.search(name)
    }

    /// Run the final save performed on `exit`. Idempotent: the state is
    /// already persisted after the last mutating command, but §6 names
    /// this as an explicit step of the exit path.
    pub fn final_save(&self) -> Result<()> {
        self.save()
    }

    /// Number of currently-free blocks. Exposed for tests that check the
    /// allocation layer's free-block invariant from outside the crate.
    pub fn free_block_count(&self) -> usize {
        self.volume.free_count()
    }
}
