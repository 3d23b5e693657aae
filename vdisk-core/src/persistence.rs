//! Persistence Coordinator: keeps `metadata.json` and `virtual_disk.bin` as
//! a consistent snapshot of the allocation layer and namespace.
//!
//! Saves are synchronous whole-file rewrites, run at the tail of every
//! mutating operation (see `fs::VirtualFs`); there is no journaling and no
//! write-then-rename atomicity. A crash between the two file writes leaves
//! whichever completed last, which is accepted rather than worked around.
//! The open-file table and current working directory are never persisted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vdisk_api::controller::Device;
use vdisk_api::types::{BLOCK_SIZE, NUM_BLOCKS};

use crate::alloc::BlockVolume;
use crate::error::{FsError, Result};
use crate::namespace::{Namespace, NodeDoc};

/// Fixed name of the binary block-device image on disk.
pub const IMAGE_FILE_NAME: &str = "virtual_disk.bin";
/// Fixed name of the structured metadata document on disk.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// The full wire-format shape of `metadata.json`.
#[derive(Debug, Serialize, Deserialize)]
struct MetadataDoc {
    block_size: u64,
    num_blocks: u64,
    root: NodeDoc,
    free_map: Vec<bool>,
    fat: Vec<i64>,
}

/// Load (or freshly initialize) the allocation layer and namespace from
/// `dir`, per §4.7's startup protocol.
///
/// If the image file is missing, the device starts all-zero; if present
/// but mismatched in length, it is padded/truncated by the device layer
/// itself. If the metadata file is missing, a pristine namespace and FAT
/// are installed and immediately saved. If present, `block_size` is
/// validated against this build's constant; a mismatch is fatal
/// (`ConfigurationMismatch`).
pub fn load(dir: &Path) -> Result<(BlockVolume, Namespace)> {
    let image_path = dir.join(IMAGE_FILE_NAME);
    let metadata_path = dir.join(METADATA_FILE_NAME);

    let device = if image_path.exists() {
        Device::load_image(&image_path)?
    } else {
        Device::new()
    };

    if !metadata_path.exists() {
        let volume = BlockVolume::from_parts(
            device,
            vec![true; NUM_BLOCKS as usize],
            vec![-2; NUM_BLOCKS as usize],
        );
        let namespace = Namespace::new();
        save(dir, &volume, &namespace)?;
        return Ok((volume, namespace));
    }

    let text = fs::read_to_string(&metadata_path).map_err(|e| FsError::Storage(e.into()))?;
    let doc: MetadataDoc = serde_json::from_str(&text)?;
    if doc.block_size != BLOCK_SIZE {
        return Err(FsError::ConfigurationMismatch);
    }

    let volume = BlockVolume::from_parts(device, doc.free_map, doc.fat);
    let namespace = Namespace::from_doc(doc.root);
    Ok((volume, namespace))
}

/// Write a consistent snapshot of `volume` and `namespace` to `dir`: the
/// metadata document first, then the raw block image. Called after every
/// mutating command-surface operation.
pub fn save(dir: &Path, volume: &BlockVolume, namespace: &Namespace) -> Result<()> {
    let doc = MetadataDoc {
        block_size: BLOCK_SIZE,
        num_blocks: NUM_BLOCKS,
        root: namespace.to_doc(),
        free_map: volume.free_map().to_vec(),
        fat: volume.fat().to_vec(),
    };
    let text = serde_json::to_string_pretty(&doc)?;
    fs::write(metadata_path(dir), text).map_err(|e| FsError::Storage(e.into()))?;
    volume.device().save_image(image_path(dir))?;
    Ok(())
}

fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE_NAME)
}

fn image_path(dir: &Path) -> PathBuf {
    dir.join(IMAGE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_directory_initializes_and_saves() {
        let dir = tempdir().unwrap();
        let (volume, namespace) = load(dir.path()).unwrap();

        assert_eq!(volume.free_count(), NUM_BLOCKS as usize);
        assert!(namespace.ls().is_empty());
        assert!(dir.path().join(IMAGE_FILE_NAME).exists());
        assert!(dir.path().join(METADATA_FILE_NAME).exists());
    }

    #[test]
    fn round_trips_namespace_and_allocation_state() {
        let dir = tempdir().unwrap();
        let (mut volume, mut namespace) = load(dir.path()).unwrap();

        namespace.mkdir("docs").unwrap();
        namespace.cd("docs").unwrap();
        namespace.create("notes.txt").unwrap();
        let id = namespace.lookup_in_cwd("notes.txt").unwrap();
        let head = volume.write_chain(-1, b"hello").unwrap();
        namespace.set_file_info(id, 5, head);

        save(dir.path(), &volume, &namespace).unwrap();

        let (volume2, mut namespace2) = load(dir.path()).unwrap();
        assert_eq!(volume2.free_map(), volume.free_map());
        assert_eq!(volume2.fat(), volume.fat());

        namespace2.cd("docs").unwrap();
        assert_eq!(
            namespace2.ls(),
            vec![("notes.txt".to_string(), crate::namespace::Kind::File, Some(5))]
        );
    }

    #[test]
    fn mismatched_block_size_is_fatal() {
        let dir = tempdir().unwrap();
        let (volume, namespace) = load(dir.path()).unwrap();
        save(dir.path(), &volume, &namespace).unwrap();

        let bad = MetadataDoc {
            block_size: BLOCK_SIZE + 1,
            num_blocks: NUM_BLOCKS,
            root: namespace.to_doc(),
            free_map: volume.free_map().to_vec(),
            fat: volume.fat().to_vec(),
        };
        fs::write(
            metadata_path(dir.path()),
            serde_json::to_string(&bad).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            load(dir.path()),
            Err(FsError::ConfigurationMismatch)
        ));
    }
}
