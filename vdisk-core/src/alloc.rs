//! Allocation layer: the free-block bitmap and the File Allocation Table,
//! plus the chain-level algorithms built on top of them (allocate, extend,
//! traverse, free), and the chunked chain read/write helpers used by the
//! filesystem layer's `write`/`read` operations.
//!
//! Block index `-2` marks a free block, `-1` marks the end of a chain, and
//! any value in `[0, NUM_BLOCKS)` is the index of the next block in the
//! chain. `free_map` and `fat` must always agree: `free_map[i]` is `true`
//! iff `fat[i] == FREE`.

use log::{debug, trace, warn};
use vdisk_api::controller::Device;
use vdisk_api::types::{BLOCK_SIZE, NUM_BLOCKS};

use crate::error::{FsError, Result};

/// FAT sentinel marking a free block.
pub const FREE: i64 = -2;
/// FAT sentinel marking the terminal block of a chain.
pub const END_OF_CHAIN: i64 = -1;

/// Owns the block device together with the free-block bitmap and FAT that
/// describe how its blocks are chained into files.
#[derive(Debug, Clone)]
pub struct BlockVolume {
    device: Device,
    free_map: Vec<bool>,
    fat: Vec<i64>,
}

impl BlockVolume {
    /// A fresh volume: an all-zero device, every block free.
    pub fn new() -> BlockVolume {
        BlockVolume {
            device: Device::new(),
            free_map: vec![true; NUM_BLOCKS as usize],
            fat: vec![FREE; NUM_BLOCKS as usize],
        }
    }

    /// Assemble a volume from already-loaded/deserialized parts, as done by
    /// the Persistence Coordinator on startup.
    pub fn from_parts(device: Device, free_map: Vec<bool>, fat: Vec<i64>) -> BlockVolume {
        BlockVolume {
            device,
            free_map,
            fat,
        }
    }

    /// Borrow the underlying device (used by the Persistence Coordinator).
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Borrow the free-block bitmap (used by the Persistence Coordinator).
    pub fn free_map(&self) -> &[bool] {
        &self.free_map
    }

    /// Borrow the FAT (used by the Persistence Coordinator).
    pub fn fat(&self) -> &[i64] {
        &self.fat
    }

    /// Number of currently-free blocks.
    pub fn free_count(&self) -> usize {
        self.free_map.iter().filter(|&&f| f).count()
    }

    /// Allocate `n` free blocks, lowest index first, and chain them
    /// together. Returns the ordered list of allocated block indices (the
    /// first element is the chain head). Fails with `NoSpace` and leaves
    /// `free_map`/`fat` untouched if fewer than `n` blocks are free.
    pub fn allocate(&mut self, n: u64) -> Result<Vec<u64>> {
        let candidates: Vec<u64> = (0..NUM_BLOCKS).filter(|&i| self.free_map[i as usize]).collect();
        if (candidates.len() as u64) < n {
            warn!("allocate: requested {} blocks, only {} free", n, candidates.len());
            return Err(FsError::NoSpace);
        }
        let allocated: Vec<u64> = candidates.into_iter().take(n as usize).collect();
        for &b in &allocated {
            self.free_map[b as usize] = false;
            self.fat[b as usize] = END_OF_CHAIN;
        }
        for pair in allocated.windows(2) {
            self.fat[pair[0] as usize] = pair[1] as i64;
        }
        debug!("allocated {} blocks starting at {:?}", allocated.len(), allocated.first());
        Ok(allocated)
    }

    /// Extend the chain starting at `first_block` (`-1` if the file
    /// currently has no blocks) by `k` blocks. Returns the chain's
    /// (possibly new) first block. On allocation failure, no state changes.
    pub fn extend_chain(&mut self, first_block: i64, k: u64) -> Result<i64> {
        let new_blocks = self.allocate(k)?;
        let new_head = new_blocks[0] as i64;

        if first_block == END_OF_CHAIN {
            return Ok(new_head);
        }

        let tail = self
            .traverse_chain(first_block)
            .last()
            .copied()
            .expect("a non-empty chain always visits at least one block");
        self.fat[tail as usize] = new_head;
        Ok(first_block)
    }

    /// Follow the FAT from `first_block` until `END_OF_CHAIN` (or a
    /// defensively-treated `FREE` sentinel found mid-chain), returning the
    /// ordered list of visited block indices.
    pub fn traverse_chain(&self, first_block: i64) -> Vec<u64> {
        let mut blocks = Vec::new();
        let mut cur = first_block;
        while cur != END_OF_CHAIN && cur != FREE {
            let idx = cur as u64;
            blocks.push(idx);
            cur = self.fat[idx as usize];
        }
        trace!("traversed chain from {} -> {:?}", first_block, blocks);
        blocks
    }

    /// Free every block in the chain starting at `first_block`, zeroing
    /// their contents and marking them free in both `free_map` and `fat`.
    pub fn free_chain(&mut self, first_block: i64) -> Result<()> {
        let mut cur = first_block;
        while cur != END_OF_CHAIN && cur != FREE {
            let idx = cur as u64;
            let next = self.fat[idx as usize];
            self.free_map[idx as usize] = true;
            self.fat[idx as usize] = FREE;
            self.device.write_block(idx, &[])?;
            cur = next;
        }
        debug!("freed chain starting at {}", first_block);
        Ok(())
    }

    /// Write `data` across the chain starting at `first_block` (extending
    /// it first if necessary), zeroing any already-allocated tail blocks
    /// beyond `data`'s length. Returns the chain's (possibly new) first
    /// block. Implements §4.5 of the storage core's write semantics.
    pub fn write_chain(&mut self, first_block: i64, data: &[u8]) -> Result<i64> {
        let blocks_needed = if data.is_empty() {
            1
        } else {
            (data.len() as u64 + BLOCK_SIZE - 1) / BLOCK_SIZE
        };

        let current_len = self.traverse_chain(first_block).len() as u64;
        let first_block = if blocks_needed > current_len {
            self.extend_chain(first_block, blocks_needed - current_len)?
        } else {
            first_block
        };

        let chain = self.traverse_chain(first_block);
        for (i, &block) in chain.iter().enumerate() {
            let start = i * BLOCK_SIZE as usize;
            let end = (start + BLOCK_SIZE as usize).min(data.len());
            let payload = if start < data.len() { &data[start..end] } else { &[] };
            self.device.write_block(block, payload)?;
        }
        Ok(first_block)
    }

    /// Read `size` bytes back from the chain starting at `first_block`, per
    /// §4.6. Returns an empty vector if `first_block == -1` or `size == 0`.
    pub fn read_chain(&self, first_block: i64, size: u64) -> Result<Vec<u8>> {
        if first_block == END_OF_CHAIN || size == 0 {
            return Ok(Vec::new());
        }
        let chain = self.traverse_chain(first_block);
        let mut out = Vec::with_capacity(size as usize);
        let mut remaining = size;
        for &block in &chain {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(BLOCK_SIZE) as usize;
            let b = self.device.read_block(block)?;
            out.extend_from_slice(&b.contents_as_ref()[..take]);
            remaining -= take as u64;
        }
        Ok(out)
    }
}

impl Default for BlockVolume {
    fn default() -> BlockVolume {
        BlockVolume::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_lowest_indices_and_chains_them() {
        let mut vol = BlockVolume::new();
        let blocks = vol.allocate(3).unwrap();
        assert_eq!(blocks, vec![0, 1, 2]);
        assert_eq!(vol.fat[0], 1);
        assert_eq!(vol.fat[1], 2);
        assert_eq!(vol.fat[2], END_OF_CHAIN);
        assert!(!vol.free_map[0] && !vol.free_map[1] && !vol.free_map[2]);
    }

    #[test]
    fn allocate_out_of_space_leaves_state_untouched() {
        let mut vol = BlockVolume::new();
        let before = vol.clone_state();
        let err = vol.allocate(NUM_BLOCKS + 1);
        assert!(err.is_err());
        assert_eq!(before, vol.clone_state());
    }

    #[test]
    fn extend_chain_from_scratch_and_further() {
        let mut vol = BlockVolume::new();
        let head = vol.extend_chain(END_OF_CHAIN, 2).unwrap();
        assert_eq!(vol.traverse_chain(head).len(), 2);

        let head2 = vol.extend_chain(head, 1).unwrap();
        assert_eq!(head2, head);
        assert_eq!(vol.traverse_chain(head).len(), 3);
    }

    #[test]
    fn free_chain_reclaims_and_zeroes() {
        let mut vol = BlockVolume::new();
        let head = vol.extend_chain(END_OF_CHAIN, 2).unwrap();
        vol.write_chain(head, b"hello").unwrap();
        let before_free = vol.free_count();

        vol.free_chain(head).unwrap();
        assert_eq!(vol.free_count(), before_free + 2);
        assert_eq!(vol.fat[head as usize], FREE);
    }

    #[test]
    fn write_then_read_roundtrip() {
        let mut vol = BlockVolume::new();
        let data = b"hello from the RAM disk".to_vec();
        let head = vol.write_chain(END_OF_CHAIN, &data).unwrap();
        let read_back = vol.read_chain(head, data.len() as u64).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn write_never_shrinks_the_chain() {
        let mut vol = BlockVolume::new();
        let long = vec![1u8; (BLOCK_SIZE * 3) as usize];
        let head = vol.write_chain(END_OF_CHAIN, &long).unwrap();
        let long_len = vol.traverse_chain(head).len();

        let head = vol.write_chain(head, b"short").unwrap();
        assert_eq!(vol.traverse_chain(head).len(), long_len);
    }

    #[test]
    fn empty_write_still_reserves_one_block() {
        let mut vol = BlockVolume::new();
        let head = vol.write_chain(END_OF_CHAIN, &[]).unwrap();
        assert_eq!(vol.traverse_chain(head).len(), 1);
    }

    impl BlockVolume {
        fn clone_state(&self) -> (Vec<bool>, Vec<i64>) {
            (self.free_map.clone(), self.fat.clone())
        }
    }
}
