//! Module containing the types shared by the device layer: the disk
//! geometry constants and the `Block` buffer abstraction built on top of
//! them.

/// Total size of the virtual disk image, in bytes.
pub const DISK_SIZE: u64 = 1024 * 1024;

/// Size of a single block, in bytes.
pub const BLOCK_SIZE: u64 = 512;

/// Number of addressable blocks on the disk (`DISK_SIZE / BLOCK_SIZE`).
pub const NUM_BLOCKS: u64 = DISK_SIZE / BLOCK_SIZE;

/// Block abstraction, representing a single `BLOCK_SIZE`-sized region of
/// the disk read from or about to be written to the device.
///
/// The reason this wraps a boxed slice rather than a `Vec` is that a
/// block's length never changes once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Index of this block on the disk.
    pub block_no: u64,
    contents: Box<[u8]>,
}

impl Block {
    /// Create a block for `block_no`, copying `data` and zero-padding or
    /// truncating it to exactly `BLOCK_SIZE` bytes.
    pub fn new(block_no: u64, data: &[u8]) -> Block {
        let mut contents = vec![0u8; BLOCK_SIZE as usize];
        let n = data.len().min(BLOCK_SIZE as usize);
        contents[..n].copy_from_slice(&data[..n]);
        Block {
            block_no,
            contents: contents.into_boxed_slice(),
        }
    }

    /// Borrow this block's contents.
    pub fn contents_as_ref(&self) -> &[u8] {
        &self.contents
    }
}
