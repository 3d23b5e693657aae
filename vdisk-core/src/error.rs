//! Error type used throughout the allocation, namespace, open-file-table,
//! and persistence layers.
//!
//! One named variant per user-visible error kind from the storage core's
//! error handling design, each carrying the context needed to format the
//! command surface's `Error: ...` line. Errors from the device layer are
//! wrapped in, never swallowed by, `Storage`.

use thiserror::Error;
use vdisk_api::error::ApiError;

/// Error type for the filesystem core.
#[derive(Error, Debug)]
pub enum FsError {
    /// A child with this name already exists under the target directory.
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// No entry with this name exists where one was expected.
    #[error("'{0}' not found")]
    NotFound(String),

    /// An operation that requires a directory was given a file.
    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    /// An operation that requires a file was given a directory.
    #[error("'{0}' is a directory")]
    IsDirectory(String),

    /// Attempted to delete a non-empty directory.
    #[error("directory '{0}' is not empty")]
    NotEmpty(String),

    /// Attempted to read/write/close a file that is not open.
    #[error("'{0}' is not open")]
    NotOpen(String),

    /// Attempted to open a file that is already open.
    #[error("'{0}' is already open")]
    AlreadyOpen(String),

    /// Not enough free blocks to satisfy an allocation.
    #[error("not enough space on disk")]
    NoSpace,

    /// `metadata.json`'s `block_size` does not match this build's constant.
    #[error("metadata file does not match this build's block size")]
    ConfigurationMismatch,

    /// A `mv` destination could not be resolved to a valid target.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Unknown command or wrong number of arguments.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Failure from the underlying block device or (de)serialization layer.
    #[error("storage error: {0}")]
    Storage(#[from] ApiError),

    /// Failure (de)serializing the metadata document.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Shorthand for a `Result` with the filesystem core's error type.
pub type Result<T> = std::result::Result<T, FsError>;
