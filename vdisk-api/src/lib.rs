//! Device layer of the virtual disk: a fixed-size block device, the `Block`
//! buffer abstraction built on top of it, and the error type shared by both.
//!
//! This crate deliberately knows nothing about files, directories, or the
//! FAT; it only ever talks in terms of block indices and raw bytes. The
//! layers that build the actual filesystem on top of it live in
//! `vdisk_core`.

pub mod controller;
pub mod error;
pub mod types;
