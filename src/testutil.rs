//! Test-only helpers shared across module test suites: an in-memory
//! [`crate::image::Store`] and a builder for small synthetic FAT32 images,
//! used in place of a real disk image.

use std::cell::RefCell;
use std::io;

use io_at::{ReadAt, WriteAt};

use crate::image::Store;

/// A trivial in-memory `Store`. `RefCell` lets `ReadAt`/`WriteAt` keep
/// their `&self` receiver (matching `io-at`'s pread/pwrite-style API)
/// while still allowing writes.
pub struct MemStore(pub RefCell<Vec<u8>>);

impl MemStore {
    pub fn new(len: usize) -> Self {
        MemStore(RefCell::new(vec![0u8; len]))
    }

    pub fn from_vec(v: Vec<u8>) -> Self {
        MemStore(RefCell::new(v))
    }
}

impl ReadAt for MemStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let data = self.0.borrow();
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }
}

impl WriteAt for MemStore {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        let mut data = self.0.borrow_mut();
        let start = offset as usize;
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

impl Store for MemStore {
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.0.borrow().len() as u64)
    }
}

/// Parameters for [`build_image`].
pub struct ImageSpec {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub sectors_per_fat: u32,
    pub root_cluster: u32,
    pub total_clusters: u32,
}

impl Default for ImageSpec {
    fn default() -> Self {
        ImageSpec {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            fat_count: 2,
            sectors_per_fat: 8,
            root_cluster: 2,
            total_clusters: 64,
        }
    }
}

/// Builds a minimal, valid, empty-root-directory FAT32 image in memory:
/// boot sector + backup, FSInfo, `fat_count` identical FATs (with cluster 2
/// allocated and EOC-terminated for the root directory), and a zeroed
/// cluster heap. Used by scandisk and directory-decode tests that need a
/// real geometry to parse rather than hand-built byte slices.
pub fn build_image(spec: &ImageSpec) -> Vec<u8> {
    let fat_bytes = spec.sectors_per_fat as usize * spec.bytes_per_sector as usize;
    let data_area_start =
        (spec.reserved_sectors as usize + spec.fat_count as usize * spec.sectors_per_fat as usize)
            * spec.bytes_per_sector as usize;
    let cluster_size = spec.bytes_per_sector as usize * spec.sectors_per_cluster as usize;
    let total_len = data_area_start + spec.total_clusters as usize * cluster_size;

    let mut img = vec![0u8; total_len];

    // boot sector (offset 0) and its backup (sector 6, conventional FAT32 layout)
    for sector in [0usize, 6] {
        let off = sector * spec.bytes_per_sector as usize;
        img[off + 0x0b..off + 0x0d].copy_from_slice(&spec.bytes_per_sector.to_le_bytes());
        img[off + 0x0d] = spec.sectors_per_cluster;
        img[off + 0x0e..off + 0x10].copy_from_slice(&spec.reserved_sectors.to_le_bytes());
        img[off + 0x10] = spec.fat_count;
        img[off + 0x20..off + 0x24].copy_from_slice(&(total_len as u32 / spec.bytes_per_sector as u32).to_le_bytes());
        img[off + 0x24..off + 0x28].copy_from_slice(&spec.sectors_per_fat.to_le_bytes());
        img[off + 0x2c..off + 0x30].copy_from_slice(&spec.root_cluster.to_le_bytes());
        img[off + 0x30..off + 0x32].copy_from_slice(&1u16.to_le_bytes());
        img[off + 0x32..off + 0x34].copy_from_slice(&6u16.to_le_bytes());
        img[off + 0x1fe] = 0x55;
        img[off + 0x1ff] = 0xaa;
    }

    // FSInfo at sector 1
    let fsinfo_off = spec.bytes_per_sector as usize;
    img[fsinfo_off..fsinfo_off + 4].copy_from_slice(&0x4161_5252u32.to_le_bytes());
    img[fsinfo_off + 0x1e4..fsinfo_off + 0x1e8].copy_from_slice(&0x6141_7272u32.to_le_bytes());
    img[fsinfo_off + 0x1e8..fsinfo_off + 0x1ec]
        .copy_from_slice(&(spec.total_clusters - 1).to_le_bytes());
    img[fsinfo_off + 0x1ec..fsinfo_off + 0x1f0].copy_from_slice(&3u32.to_le_bytes());
    img[fsinfo_off + 0x1fc..fsinfo_off + 0x1fe].copy_from_slice(&0x55AAu16.to_le_bytes()[..]);
    img[fsinfo_off + 0x1fc] = 0x00;
    img[fsinfo_off + 0x1fd] = 0x00;
    img[fsinfo_off + 0x1fe] = 0x55;
    img[fsinfo_off + 0x1ff] = 0xaa;

    // root directory occupies cluster `root_cluster`, EOC-terminated, in every FAT copy
    for i in 0..spec.fat_count as usize {
        let fat_off = (spec.reserved_sectors as usize + i * spec.sectors_per_fat as usize)
            * spec.bytes_per_sector as usize;
        let entry_off = fat_off + spec.root_cluster as usize * 4;
        img[entry_off..entry_off + 4].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
    }
    debug_assert_eq!(fat_bytes, spec.sectors_per_fat as usize * spec.bytes_per_sector as usize);

    img
}
