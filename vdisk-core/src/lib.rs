//! Filesystem core built on top of `vdisk_api`'s block device: allocation,
//! namespace, open-file table, persistence coordinator, the orchestrator
//! that ties them together, and the line-oriented command surface.

pub mod alloc;
pub mod cli;
pub mod error;
pub mod fs;
pub mod namespace;
pub mod oft;
pub mod persistence;
