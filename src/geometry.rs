//! L2: Volume Metadata.
//!
//! Parses and validates the boot sector and FSInfo sector, and exposes the
//! geometry (bytes/sector, sectors/cluster, reserved sectors, FAT count,
//! sectors/FAT, root cluster, FSInfo sector) every higher layer needs to
//! turn a cluster number or FAT index into an absolute byte offset.
//!
//! `BootSector`/`FsInfo` keep the teacher's `BootSector` shape: an owned
//! fixed-size raw buffer plus accessor methods, because (as the teacher's
//! own doc comment puts it) "block devices don't have byte-level access",
//! so the whole sector has to be read and written back as a unit anyway.

use index_fixed::index_fixed;

use crate::error::{Error, Result};
use crate::image::{Image, Store};

/// A 512-byte FAT32 boot sector (BPB + extended BPB). FAT32 always uses a
/// 512-byte boot sector regardless of the volume's actual sector size —
/// only the *fields* (e.g. `bytes_per_sector_shift`-style values elsewhere
/// in the FAT family) vary; FAT32's BPB has no such shift encoding and
/// states the sector size directly.
pub struct BootSector {
    raw: [u8; 512],
}

impl BootSector {
    pub fn read_at<S: Store>(image: &Image<S>, offset: u64) -> Result<Self> {
        let mut raw = [0u8; 512];
        image.read_into(offset, &mut raw)?;
        BootSector { raw }.validate()
    }

    pub fn raw(&self) -> &[u8; 512] {
        &self.raw
    }

    /// offset 0x0b, size 2. Power of 2, typically 512.
    pub fn bytes_per_sector(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 0x0b, .. 0x0d))
    }

    /// offset 0x0d, size 1. Power of 2.
    pub fn sectors_per_cluster(&self) -> u8 {
        self.raw[0x0d]
    }

    /// offset 0x0e, size 2.
    pub fn reserved_sectors(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 0x0e, .. 0x10))
    }

    /// offset 0x10, size 1. Number of FAT copies, at least 1.
    pub fn fat_count(&self) -> u8 {
        self.raw[0x10]
    }

    /// offset 0x13 (16-bit) falling back to offset 0x20 (32-bit) when the
    /// 16-bit field is zero, as every FAT32 BPB in the wild requires (the
    /// 16-bit total-sector field is a FAT12/16 holdover).
    pub fn total_sectors(&self) -> u32 {
        let small = u16::from_le_bytes(*index_fixed!(&self.raw; 0x13, .. 0x15));
        if small != 0 {
            small as u32
        } else {
            u32::from_le_bytes(*index_fixed!(&self.raw; 0x20, .. 0x24))
        }
    }

    /// offset 0x24, size 4. FAT32's replacement for the FAT12/16
    /// `sectors_per_fat16` field, which is always zero on FAT32.
    pub fn sectors_per_fat(&self) -> u32 {
        u32::from_le_bytes(*index_fixed!(&self.raw; 0x24, .. 0x28))
    }

    /// offset 0x28, size 2. Low 4 bits name the active FAT when bit 7 is
    /// set (mirroring disabled); we only need the active-FAT index.
    pub fn active_fat_number(&self) -> u8 {
        let flags = u16::from_le_bytes(*index_fixed!(&self.raw; 0x28, .. 0x2a));
        if flags & 0x80 != 0 {
            (flags & 0x0f) as u8
        } else {
            0
        }
    }

    /// offset 0x2c, size 4. At least 2.
    pub fn root_first_cluster(&self) -> u32 {
        u32::from_le_bytes(*index_fixed!(&self.raw; 0x2c, .. 0x30))
    }

    /// offset 0x30, size 2. Sector (relative to volume start) of the
    /// FSInfo structure.
    pub fn fs_info_sector(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 0x30, .. 0x32))
    }

    /// offset 0x32, size 2. Sector of the backup boot sector, 0 if none.
    pub fn backup_boot_sector(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 0x32, .. 0x34))
    }

    fn validate(self) -> Result<Self> {
        let sig = index_fixed!(&self.raw; 0x1fe, .. 0x200);
        if sig != &[0x55, 0xaa] {
            return Err(Error::invalid_image(Error::describe_bad_signature(
                "boot sector signature",
                sig,
            )));
        }
        if !self.bytes_per_sector().is_power_of_two() {
            return Err(Error::invalid_image(format!(
                "bytes_per_sector {} is not a power of two",
                self.bytes_per_sector()
            )));
        }
        if !self.sectors_per_cluster().is_power_of_two() {
            return Err(Error::invalid_image(format!(
                "sectors_per_cluster {} is not a power of two",
                self.sectors_per_cluster()
            )));
        }
        if self.fat_count() == 0 {
            return Err(Error::invalid_image("fat_count is zero"));
        }
        if self.root_first_cluster() < 2 {
            return Err(Error::invalid_image(format!(
                "root_first_cluster {} is less than 2",
                self.root_first_cluster()
            )));
        }
        Ok(self)
    }
}

/// The 512-byte FSInfo sector: three fixed signatures plus the free-cluster
/// count and next-free hint, both rewritten on every allocation.
pub struct FsInfo {
    raw: [u8; 512],
}

const FSINFO_LEAD_SIG: [u8; 4] = *b"RRaA";
const FSINFO_STRUCT_SIG: [u8; 4] = *b"rrAa";
const FSINFO_TRAIL_SIG: [u8; 4] = [0x00, 0x00, 0x55, 0xaa];

impl FsInfo {
    pub fn read_at<S: Store>(image: &Image<S>, offset: u64) -> Result<Self> {
        let mut raw = [0u8; 512];
        image.read_into(offset, &mut raw)?;
        FsInfo { raw }.validate()
    }

    fn validate(self) -> Result<Self> {
        let lead = index_fixed!(&self.raw; 0, .. 4);
        let mid = index_fixed!(&self.raw; 0x1e4, .. 0x1e8);
        let trail = index_fixed!(&self.raw; 0x1fc, .. 0x200);
        if lead != &FSINFO_LEAD_SIG || mid != &FSINFO_STRUCT_SIG || trail != &FSINFO_TRAIL_SIG {
            return Err(Error::invalid_image("FSInfo signature mismatch"));
        }
        Ok(self)
    }

    /// `None` means "unknown" (on-disk value `0xFFFFFFFF`).
    pub fn free_cluster_count(&self) -> Option<u32> {
        let v = u32::from_le_bytes(*index_fixed!(&self.raw; 0x1e8, .. 0x1ec));
        if v == 0xFFFF_FFFF { None } else { Some(v) }
    }

    /// `None` means "unknown" (on-disk value `0xFFFFFFFF`).
    pub fn next_free_hint(&self) -> Option<u32> {
        let v = u32::from_le_bytes(*index_fixed!(&self.raw; 0x1ec, .. 0x1f0));
        if v == 0xFFFF_FFFF { None } else { Some(v) }
    }

    pub fn set_free_cluster_count(&mut self, v: Option<u32>) {
        self.raw[0x1e8.. 0x1ec].copy_from_slice(&v.unwrap_or(0xFFFF_FFFF).to_le_bytes());
    }

    pub fn set_next_free_hint(&mut self, v: Option<u32>) {
        self.raw[0x1ec.. 0x1f0].copy_from_slice(&v.unwrap_or(0xFFFF_FFFF).to_le_bytes());
    }

    pub fn raw(&self) -> &[u8; 512] {
        &self.raw
    }
}

/// Immutable, derived volume geometry, computed once at open and threaded
/// into every layer above. Mutations to geometry are never allowed after
/// open (spec §3's lifecycle rule).
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_count: u8,
    pub active_fat_number: u8,
    pub sectors_per_fat: u32,
    pub root_first_cluster: u32,
    pub fs_info_sector: u32,
    pub backup_boot_sector: u32,
    pub total_sectors: u32,
    pub cluster_size: u32,
    pub data_area_start_byte: u64,
}

impl Geometry {
    pub fn from_boot_sector(bs: &BootSector) -> Result<Self> {
        let bytes_per_sector = bs.bytes_per_sector() as u32;
        let sectors_per_cluster = bs.sectors_per_cluster() as u32;
        let reserved_sectors = bs.reserved_sectors() as u32;
        let fat_count = bs.fat_count();
        let sectors_per_fat = bs.sectors_per_fat();

        if sectors_per_fat == 0 {
            return Err(Error::invalid_image("sectors_per_fat is zero"));
        }

        let data_area_start_byte =
            (reserved_sectors as u64 + fat_count as u64 * sectors_per_fat as u64)
                * bytes_per_sector as u64;

        let geom = Geometry {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            active_fat_number: bs.active_fat_number(),
            sectors_per_fat,
            root_first_cluster: bs.root_first_cluster(),
            fs_info_sector: bs.fs_info_sector() as u32,
            backup_boot_sector: bs.backup_boot_sector() as u32,
            total_sectors: bs.total_sectors(),
            cluster_size: bytes_per_sector * sectors_per_cluster,
            data_area_start_byte,
        };
        log::debug!(
            "geometry: cluster_size={} data_area_start_byte={} fat_count={}",
            geom.cluster_size,
            geom.data_area_start_byte,
            geom.fat_count
        );
        Ok(geom)
    }

    /// Absolute byte range `[start, end)` of cluster `n` (n >= 2).
    pub fn cluster_byte_range(&self, n: u32) -> std::ops::Range<u64> {
        let start =
            self.data_area_start_byte + (n as u64 - 2) * self.cluster_size as u64;
        start.. start + self.cluster_size as u64
    }

    /// Absolute byte range of the `i`-th FAT copy (0-indexed).
    pub fn fat_copy_byte_range(&self, i: u8) -> std::ops::Range<u64> {
        let start = (self.reserved_sectors as u64 + i as u64 * self.sectors_per_fat as u64)
            * self.bytes_per_sector as u64;
        let len = self.sectors_per_fat as u64 * self.bytes_per_sector as u64;
        start.. start + len
    }

    pub fn fsinfo_offset(&self) -> u64 {
        self.fs_info_sector as u64 * self.bytes_per_sector as u64
    }

    pub fn total_data_clusters(&self) -> u32 {
        let data_bytes = (self.total_sectors as u64 * self.bytes_per_sector as u64)
            .saturating_sub(self.data_area_start_byte);
        (data_bytes / self.cluster_size as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{build_image, ImageSpec, MemStore};

    #[test]
    fn parses_geometry_from_synthetic_image() {
        let spec = ImageSpec::default();
        let img = Image::new(MemStore::from_vec(build_image(&spec)));
        let bs = BootSector::read_at(&img, 0).unwrap();
        let geom = Geometry::from_boot_sector(&bs).unwrap();
        assert_eq!(geom.bytes_per_sector, 512);
        assert_eq!(geom.cluster_size, 512);
        assert_eq!(geom.root_first_cluster, 2);
        assert_eq!(geom.fat_count, 2);
    }

    #[test]
    fn rejects_bad_boot_signature() {
        let mut raw = vec![0u8; 512];
        raw[0x10] = 2; // otherwise-plausible fat_count
        let img = Image::new(MemStore::from_vec(raw));
        assert!(BootSector::read_at(&img, 0).is_err());
    }

    #[test]
    fn fsinfo_round_trips_unknown_sentinel() {
        let spec = ImageSpec::default();
        let img = Image::new(MemStore::from_vec(build_image(&spec)));
        let mut fsinfo = FsInfo::read_at(&img, 512).unwrap();
        fsinfo.set_free_cluster_count(None);
        assert_eq!(fsinfo.free_cluster_count(), None);
        fsinfo.set_free_cluster_count(Some(7));
        assert_eq!(fsinfo.free_cluster_count(), Some(7));
    }
}
