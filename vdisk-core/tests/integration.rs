//! End-to-end scenarios run against a fresh, `tempfile`-isolated base
//! directory per test, driving `VirtualFs` the way the command surface
//! would.

use tempfile::tempdir;
use vdisk_api::types::{BLOCK_SIZE, DISK_SIZE, NUM_BLOCKS};
use vdisk_core::error::FsError;
use vdisk_core::fs::VirtualFs;
use vdisk_core::namespace::Kind;

fn open_fresh() -> (tempfile::TempDir, VirtualFs) {
    let dir = tempdir().unwrap();
    let vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
    (dir, vfs)
}

#[test]
fn s1_mkdir_cd_ls() {
    let (_dir, mut vfs) = open_fresh();
    vfs.mkdir("docs").unwrap();
    assert_eq!(vfs.ls(), vec![("docs".to_string(), Kind::Dir, None)]);

    vfs.cd("docs").unwrap();
    assert!(vfs.ls().is_empty());
}

#[test]
fn s2_write_close_restart_open_read() {
    let dir = tempdir().unwrap();
    {
        let mut vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
        vfs.mkdir("docs").unwrap();
        vfs.cd("docs").unwrap();
        vfs.create("notes.txt").unwrap();
        vfs.open_file("notes.txt").unwrap();
        vfs.write_file("notes.txt", b"hello from the RAM disk").unwrap();
        vfs.close_file("notes.txt").unwrap();
    }

    let mut vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
    vfs.cd("docs").unwrap();
    vfs.open_file("notes.txt").unwrap();
    let data = vfs.read_file("notes.txt").unwrap();
    assert_eq!(data, b"hello from the RAM disk");
}

#[test]
fn s3_search_finds_file_under_docs() {
    let (_dir, mut vfs) = open_fresh();
    vfs.mkdir("docs").unwrap();
    vfs.cd("docs").unwrap();
    vfs.create("notes.txt").unwrap();

    let hits = vfs.search("notes.txt");
    assert_eq!(hits, vec![("/docs/notes.txt".to_string(), Kind::File)]);
}

#[test]
fn s4_mv_within_docs_renames_and_is_searchable() {
    let (_dir, mut vfs) = open_fresh();
    vfs.mkdir("docs").unwrap();
    vfs.cd("docs").unwrap();
    vfs.create("notes.txt").unwrap();

    vfs.mv("notes.txt", "ideas.txt").unwrap();
    assert_eq!(vfs.ls(), vec![("ideas.txt".to_string(), Kind::File, Some(0))]);
    assert_eq!(vfs.search("ideas.txt").len(), 1);
}

#[test]
fn s5_delete_reclaims_free_blocks() {
    let (_dir, mut vfs) = open_fresh();
    vfs.mkdir("docs").unwrap();
    vfs.cd("docs").unwrap();
    vfs.create("ideas.txt").unwrap();
    vfs.open_file("ideas.txt").unwrap();
    vfs.write_file("ideas.txt", b"some content").unwrap();
    vfs.close_file("ideas.txt").unwrap();

    let before = free_count(&vfs);
    vfs.delete("ideas.txt").unwrap();
    assert!(vfs.ls().is_empty());
    assert_eq!(free_count(&vfs), before + 1);
}

#[test]
fn s6_delete_empty_then_nonempty_docs() {
    let (_dir, mut vfs) = open_fresh();
    vfs.mkdir("docs").unwrap();
    vfs.cd("docs").unwrap();
    vfs.create("f").unwrap();
    vfs.cd("/").unwrap();

    assert!(matches!(vfs.delete("docs"), Err(FsError::NotEmpty(_))));

    vfs.cd("docs").unwrap();
    vfs.delete("f").unwrap();
    vfs.cd("/").unwrap();
    vfs.delete("docs").unwrap();
    assert!(vfs.ls().is_empty());
}

#[test]
fn fill_disk_scenario_fails_no_space_and_leaves_file_empty() {
    let (_dir, mut vfs) = open_fresh();
    vfs.create("big").unwrap();
    vfs.open_file("big").unwrap();

    let huge = vec![0xABu8; (DISK_SIZE + 1) as usize];
    assert!(matches!(vfs.write_file("big", &huge), Err(FsError::NoSpace)));
    assert_eq!(vfs.ls(), vec![("big".to_string(), Kind::File, Some(0))]);
}

#[test]
fn invariant_write_read_roundtrip_is_byte_identical() {
    let (_dir, mut vfs) = open_fresh();
    vfs.create("f").unwrap();
    vfs.open_file("f").unwrap();

    let payload: Vec<u8> = (0..(BLOCK_SIZE * 5 + 37) as usize)
        .map(|i| (i % 251) as u8)
        .collect();
    vfs.write_file("f", &payload).unwrap();
    vfs.close_file("f").unwrap();

    vfs.open_file("f").unwrap();
    let read_back = vfs.read_file("f").unwrap();
    assert_eq!(read_back, payload);
}

#[test]
fn invariant_move_preserves_content() {
    let (_dir, mut vfs) = open_fresh();
    vfs.create("a").unwrap();
    vfs.open_file("a").unwrap();
    vfs.write_file("a", b"payload").unwrap();
    vfs.close_file("a").unwrap();

    vfs.mv("a", "b").unwrap();
    vfs.open_file("b").unwrap();
    assert_eq!(vfs.read_file("b").unwrap(), b"payload");
}

#[test]
fn invariant_persistence_idempotence() {
    let dir = tempdir().unwrap();
    {
        let mut vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
        vfs.mkdir("docs").unwrap();
        vfs.cd("docs").unwrap();
        vfs.create("f").unwrap();
        vfs.open_file("f").unwrap();
        vfs.write_file("f", b"stable content").unwrap();
        vfs.close_file("f").unwrap();
    }

    let first_free = {
        let vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
        free_count(&vfs)
    };
    let second_free = {
        let vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
        free_count(&vfs)
    };
    assert_eq!(first_free, second_free);

    let mut vfs = VirtualFs::open(dir.path().to_path_buf()).unwrap();
    vfs.cd("docs").unwrap();
    vfs.open_file("f").unwrap();
    assert_eq!(vfs.read_file("f").unwrap(), b"stable content");
}

#[test]
fn mv_implicitly_closes_open_handle_and_is_reported() {
    let (_dir, mut vfs) = open_fresh();
    vfs.create("a").unwrap();
    vfs.open_file("a").unwrap();

    let closed = vfs.mv("a", "b").unwrap();
    assert!(closed);
    assert!(matches!(vfs.read_file("a"), Err(FsError::NotOpen(_))));
}

#[test]
fn double_open_and_unopened_close_fail() {
    let (_dir, mut vfs) = open_fresh();
    vfs.create("a").unwrap();
    vfs.open_file("a").unwrap();
    assert!(matches!(vfs.open_file("a"), Err(FsError::AlreadyOpen(_))));

    vfs.close_file("a").unwrap();
    assert!(matches!(vfs.close_file("a"), Err(FsError::NotOpen(_))));
}

#[test]
fn num_blocks_matches_disk_and_block_size() {
    assert_eq!(NUM_BLOCKS, DISK_SIZE / BLOCK_SIZE);
}

fn free_count(vfs: &VirtualFs) -> usize {
    vfs.free_block_count()
}
