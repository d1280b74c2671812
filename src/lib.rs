//! A FAT32 on-disk engine: boot/FSInfo parsing and validation, cluster-chain
//! traversal, free-cluster allocation, directory-entry encoding/decoding
//! (including Long File Name chains with checksums), atomic mutation of the
//! multi-FAT metadata, and the scandisk repair algorithms (lost-cluster
//! reclamation, cross-linked-chain repair, oversized-declared-size
//! truncation).
//!
//! General layout of a FAT32 volume:
//!
//! ```text
//! .                        | offs (sectors)     | size
//! boot sector              | 0                   | 1
//! FSInfo                   | 1                   | 1
//! backup boot sector       | 6 (conventional)    | 1
//! (reserved)                |                     | reserved_sectors - ...
//! FAT copy 1                | reserved_sectors    | sectors_per_fat
//! FAT copy 2 (if fat_count)  | + sectors_per_fat   | sectors_per_fat
//! ...
//! cluster heap (data area)  | + fat_count * sectors_per_fat |
//! ```
//!
//! The crate is organized as a stack of layers, each depending only on
//! those below it:
//!
//! - [`image`] (L1) — byte-addressable image I/O.
//! - [`geometry`] (L2) — boot sector / FSInfo parsing, derived geometry.
//! - [`fat`] (L3) — the FAT table: classification, chain walking, allocation.
//! - [`direntry`], [`datetime`], [`codepage`], [`shortname`], [`file`] (L4) —
//!   directory-entry encode/decode and the in-memory file/directory tree.
//! - [`scandisk`] (L5) — the three repair passes.
//!
//! [`volume::Volume`] ties all five layers together behind a single opened
//! handle.

pub mod codepage;
pub mod datetime;
pub mod direntry;
pub mod error;
pub mod fat;
pub mod file;
pub mod geometry;
pub mod image;
pub mod scandisk;
pub mod shortname;
pub mod testutil;
pub mod volume;

pub use error::{Error, Result};
pub use file::{File, FileId, Tree};
pub use image::{BlockDeviceStore, Image, Store};
pub use scandisk::{ClusterCensus, PassCounters, ScandiskOptions, ScandiskReport};
pub use volume::{ScanMode, Volume, VolumeOptions};
