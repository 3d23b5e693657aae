//! Error type used by the device layer.
//!
//! Follows the same shape as the provided `error_given` module in the
//! teaching codebase this crate grew out of: a single `thiserror`-derived
//! enum, one named variant per failure mode, with `#[from] io::Error` so the
//! `?` operator just works on top of `std::fs` calls. No catch-all variant
//! is provided on purpose; every fallible path in this crate has a name.

use std::io;
use thiserror::Error;

/// Error type for the block device (`controller`) and block (`types`) layers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// IO failure while loading or saving the backing image file.
    #[error("IO error in the device layer: {0}")]
    Io(#[from] io::Error),

    /// A block index fell outside `[0, NUM_BLOCKS)`.
    #[error("block index {index} out of range (device has {num_blocks} blocks)")]
    BlockRangeError {
        /// The offending index.
        index: u64,
        /// Number of blocks the device actually has.
        num_blocks: u64,
    },
}

/// Shorthand for a `Result` with the device layer's error type.
pub type Result<T> = std::result::Result<T, ApiError>;
