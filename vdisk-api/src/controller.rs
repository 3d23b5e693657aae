//! Implementation of the block device backing the virtual disk.
//!
//! Unlike the memory-mapped `Device` this crate's lineage started from, this
//! device keeps its contents as a plain in-memory byte buffer and is only
//! ever written to or read from its backing file explicitly, at the
//! Persistence Coordinator's direction (see `vdisk_core::persistence`).
//! There is no continuous mmap and no flush-on-drop: a crash between two
//! explicit saves is expected to lose at most the most recent mutation, not
//! tear a write in progress.

use super::error::{ApiError, Result};
use super::types::{Block, BLOCK_SIZE, DISK_SIZE};
use std::fs;
use std::path::Path;

/// In-memory image of the virtual disk: exactly `DISK_SIZE` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    contents: Vec<u8>,
}

impl Device {
    /// A fresh, all-zero device of exactly `DISK_SIZE` bytes.
    pub fn new() -> Device {
        Device {
            contents: vec![0u8; DISK_SIZE as usize],
        }
    }

    /// Load the device image from `path`. If the file is shorter than
    /// `DISK_SIZE`, the result is zero-padded; if longer, it is truncated.
    /// Used by the Persistence Coordinator when a `virtual_disk.bin` file
    /// already exists.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Device> {
        let mut contents = fs::read(path)?;
        contents.resize(DISK_SIZE as usize, 0);
        Ok(Device { contents })
    }

    /// Dump the entire device image to `path`, overwriting any existing
    /// contents. Always writes exactly `DISK_SIZE` bytes.
    pub fn save_image<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, &self.contents)?;
        Ok(())
    }

    fn check_index(&self, index: u64) -> Result<()> {
        let num_blocks = DISK_SIZE / BLOCK_SIZE;
        if index >= num_blocks {
            return Err(ApiError::BlockRangeError {
                index,
                num_blocks,
            });
        }
        Ok(())
    }

    fn addr_of(index: u64) -> usize {
        (index * BLOCK_SIZE) as usize
    }

    /// Read the block with index `index` from the device.
    pub fn read_block(&self, index: u64) -> Result<Block> {
        self.check_index(index)?;
        let start = Self::addr_of(index);
        let end = start + BLOCK_SIZE as usize;
        Ok(Block::new(index, &self.contents[start..end]))
    }

    /// Write `payload` into block `index`, zero-padding if shorter than
    /// `BLOCK_SIZE` and truncating if longer.
    pub fn write_block(&mut self, index: u64, payload: &[u8]) -> Result<()> {
        self.check_index(index)?;
        let start = Self::addr_of(index);
        let end = start + BLOCK_SIZE as usize;
        let n = payload.len().min(BLOCK_SIZE as usize);
        self.contents[start..start + n].copy_from_slice(&payload[..n]);
        for byte in &mut self.contents[start + n..end] {
            *byte = 0;
        }
        Ok(())
    }
}

impl Default for Device {
    fn default() -> Device {
        Device::new()
    }
}
