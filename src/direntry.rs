//! L4 (part 1): 32-byte directory entry encode/decode, including LFN parts.
//!
//! Decode accumulator logic (the `0x00`/`0xE5`/`0x05` handling, LFN prepend
//! order, VOLUME_ID skip) is grounded in
//! `original_source/fat_editor.py::_parse_dir_files`/`get_lfn_part`; encode
//! (short-entry field layout, LFN part emission, the `0xE5`→`0x05` escape)
//! in `original_source/fsobjects.py::to_directory_entries`/`to_lfn_parts`/
//! `_write_short_name`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::codepage;
use crate::datetime;
use crate::error::Result;
use crate::shortname;

pub const ENTRY_SIZE: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LFN: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

/// A decoded standard (non-LFN) directory entry. Name/extension are
/// cp866-decoded and space-trimmed already; `file.rs` combines them into
/// `SHORT[.EXT]` once it knows the `DIRECTORY` bit (spec §4.4: "no dot if
/// `DIRECTORY` bit set").
#[derive(Debug, Clone)]
pub struct ShortEntry {
    pub name: String,
    pub ext: String,
    pub attributes: u8,
    pub create_datetime: Option<NaiveDateTime>,
    pub last_access_date: Option<NaiveDate>,
    pub change_datetime: Option<NaiveDateTime>,
    pub size_bytes: u32,
    pub first_cluster: u32,
}

/// A decoded LFN entry: one 13-code-unit fragment of a long name.
#[derive(Debug, Clone)]
pub struct LfnPart {
    pub ordinal: u8,
    pub is_last: bool,
    pub checksum: u8,
    pub fragment: String,
}

/// One parsed 32-byte slot, after the `0x05`→`0xE5` escape has already been
/// applied to the raw bytes.
pub enum Slot {
    End,
    Deleted,
    Lfn(LfnPart),
    /// Root volume label (spec.md §9: a future version "could expose the
    /// volume label" — this crate reads it, per SPEC_FULL.md's supplement).
    Volume(String),
    Standard(ShortEntry, [u8; 11]),
}

const UTF16_POSITIONS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

fn decode_lfn_part(raw: &[u8; ENTRY_SIZE]) -> LfnPart {
    let ordinal = raw[0] & 0x1f;
    let is_last = raw[0] & 0x40 != 0;
    let checksum = raw[13];

    let mut units = Vec::with_capacity(13);
    for &pos in &UTF16_POSITIONS {
        let unit = u16::from_le_bytes([raw[pos], raw[pos + 1]]);
        if unit == 0x0000 || unit == 0xFFFF {
            break;
        }
        units.push(unit);
    }
    let fragment = String::from_utf16_lossy(&units);

    LfnPart { ordinal, is_last, checksum, fragment }
}

fn decode_short_entry(raw: &[u8; ENTRY_SIZE]) -> ShortEntry {
    let name = codepage::decode_866(&raw[0..8]).trim_end().to_string();
    let ext = codepage::decode_866(&raw[8..11]).trim_end().to_string();
    let attributes = raw[11];
    let centi = raw[13];
    let create_time = u16::from_le_bytes([raw[14], raw[15]]);
    let create_date = u16::from_le_bytes([raw[16], raw[17]]);
    let create_datetime = datetime::decode_creation(create_time, create_date, centi);

    let access_date_raw = u16::from_le_bytes([raw[18], raw[19]]);
    let last_access_date = datetime::decode_date(access_date_raw);

    let mod_time = u16::from_le_bytes([raw[22], raw[23]]);
    let mod_date = u16::from_le_bytes([raw[24], raw[25]]);
    let change_datetime = datetime::decode_datetime(mod_time, mod_date);

    let hi = u16::from_le_bytes([raw[20], raw[21]]);
    let lo = u16::from_le_bytes([raw[26], raw[27]]);
    let first_cluster = (((hi as u32) << 16) | lo as u32) & 0x0FFF_FFFF;

    let size_bytes = u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]);

    ShortEntry {
        name,
        ext,
        attributes,
        create_datetime,
        last_access_date,
        change_datetime,
        size_bytes,
        first_cluster,
    }
}

/// Parses one 32-byte slot, applying the `0x00`/`0xE5`/`0x05` rules from
/// spec §3's "First byte semantics".
pub fn decode_slot(raw: &[u8; ENTRY_SIZE]) -> Slot {
    if raw[0] == 0x00 {
        return Slot::End;
    }
    let mut raw = *raw;
    let is_deleted = raw[0] == 0xE5;
    if raw[0] == 0x05 {
        raw[0] = 0xE5;
    }
    if is_deleted {
        return Slot::Deleted;
    }
    if raw[11] == ATTR_LFN {
        return Slot::Lfn(decode_lfn_part(&raw));
    }
    if raw[11] & ATTR_VOLUME_ID != 0 {
        let label = codepage::decode_866(&raw[0..11]).trim_end().to_string();
        return Slot::Volume(label);
    }
    let mut name_ext = [0u8; 11];
    name_ext.copy_from_slice(&raw[0..11]);
    Slot::Standard(decode_short_entry(&raw), name_ext)
}

/// Result of decoding one directory's worth of raw entry bytes. Each entry
/// carries the byte offset (within the directory's flattened cluster-chain
/// content) of its standard 32-byte slot, so a repair pass can patch the
/// on-disk `size`/`first_cluster` fields in place.
pub struct DecodedDirectory {
    pub entries: Vec<(ShortEntry, Option<String>, usize)>,
    pub volume_label: Option<String>,
}

/// Decodes every slot in `data` (a directory's full cluster-chain content),
/// maintaining the LFN accumulator spec §4.4 describes: prepend each part's
/// fragment (parts are stored highest-ordinal-first), remember its
/// checksum, and warn (not fail) on a checksum mismatch against the
/// following short entry.
pub fn decode_directory(data: &[u8]) -> DecodedDirectory {
    let mut entries = Vec::new();
    let mut volume_label = None;
    let mut lfn_fragment = String::new();
    let mut lfn_checksum: Option<u8> = None;

    for (idx, chunk) in data.chunks_exact(ENTRY_SIZE).enumerate() {
        let raw: [u8; ENTRY_SIZE] = chunk.try_into().expect("chunks_exact(32)");
        match decode_slot(&raw) {
            Slot::End => break,
            Slot::Deleted => {
                lfn_fragment.clear();
                lfn_checksum = None;
            }
            Slot::Volume(label) => {
                if volume_label.is_none() {
                    volume_label = Some(label);
                }
            }
            Slot::Lfn(part) => {
                if let Some(prev) = lfn_checksum {
                    if prev != part.checksum {
                        log::warn!(
                            "LFN checksum changed mid-accumulation ({prev:#x} -> {:#x}); accepting latest",
                            part.checksum
                        );
                    }
                }
                lfn_checksum = Some(part.checksum);
                lfn_fragment = format!("{}{}", part.fragment, lfn_fragment);
            }
            Slot::Standard(short, name_ext) => {
                let long_name = if !lfn_fragment.is_empty() || lfn_checksum.is_some() {
                    let computed = shortname::checksum(&name_ext);
                    if let Some(remembered) = lfn_checksum {
                        if remembered != computed {
                            log::warn!(
                                "LFN checksum {remembered:#x} does not match short-name checksum {computed:#x} for {}.{}",
                                short.name, short.ext
                            );
                        }
                    }
                    Some(std::mem::take(&mut lfn_fragment))
                } else {
                    None
                };
                lfn_checksum = None;
                entries.push((short, long_name, idx * ENTRY_SIZE));
            }
        }
    }

    DecodedDirectory { entries, volume_label }
}

/// Packs `name`/`ext` into the padded 11-byte field pair, cp866-encoded,
/// applying the `0xE5`→`0x05` escape to the first byte (spec §3).
pub fn pack_name11(name: &str, ext: &str) -> Result<[u8; 11]> {
    let name_bytes = codepage::encode_866(name)?;
    let ext_bytes = codepage::encode_866(ext)?;
    let mut buf = [b' '; 11];
    buf[..name_bytes.len().min(8)].copy_from_slice(&name_bytes[..name_bytes.len().min(8)]);
    buf[8..8 + ext_bytes.len().min(3)].copy_from_slice(&ext_bytes[..ext_bytes.len().min(3)]);
    if buf[0] == 0xE5 {
        buf[0] = 0x05;
    }
    Ok(buf)
}

/// Parameters for [`encode_short_entry`] — every field a standard entry
/// carries besides the name, which is passed separately since callers
/// (directory-content synthesis) sometimes supply `.`/`..` directly.
pub struct ShortEntrySpec<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub attributes: u8,
    pub create_datetime: NaiveDateTime,
    pub last_access_date: NaiveDate,
    pub change_datetime: NaiveDateTime,
    pub size_bytes: u32,
    pub first_cluster: u32,
}

pub fn encode_short_entry(spec: &ShortEntrySpec) -> Result<[u8; ENTRY_SIZE]> {
    let name11 = pack_name11(spec.name, spec.ext)?;
    let mut buf = [0u8; ENTRY_SIZE];
    buf[0..11].copy_from_slice(&name11);
    buf[11] = spec.attributes;

    let (ct, cd, centi) = datetime::encode_creation(spec.create_datetime);
    buf[13] = centi;
    buf[14..16].copy_from_slice(&ct.to_le_bytes());
    buf[16..18].copy_from_slice(&cd.to_le_bytes());

    let ad = datetime::encode_date(spec.last_access_date);
    buf[18..20].copy_from_slice(&ad.to_le_bytes());

    let hi = ((spec.first_cluster >> 16) & 0xFFFF) as u16;
    buf[20..22].copy_from_slice(&hi.to_le_bytes());

    let (mt, md) = datetime::encode_datetime(spec.change_datetime);
    buf[22..24].copy_from_slice(&mt.to_le_bytes());
    buf[24..26].copy_from_slice(&md.to_le_bytes());

    let lo = (spec.first_cluster & 0xFFFF) as u16;
    buf[26..28].copy_from_slice(&lo.to_le_bytes());

    buf[28..32].copy_from_slice(&spec.size_bytes.to_le_bytes());

    Ok(buf)
}

/// Splits `long_name`'s UTF-16 code units into 13-unit LFN groups, applying
/// spec §4.4's terminator rule: pad a short final group with `0x0000` then
/// `0xFFFF`; if the length is an exact multiple of 13, append one more
/// all-`0xFFFF` group to carry the terminator.
fn lfn_groups(long_name: &str) -> Vec<[u16; 13]> {
    let units: Vec<u16> = long_name.encode_utf16().collect();
    let mut groups = Vec::new();
    let mut i = 0;
    while i < units.len() {
        let mut group = [0xFFFFu16; 13];
        let mut terminated = false;
        for slot in group.iter_mut() {
            if i < units.len() {
                *slot = units[i];
                i += 1;
            } else if !terminated {
                *slot = 0x0000;
                terminated = true;
            }
        }
        groups.push(group);
    }
    if units.len() % 13 == 0 {
        groups.push([0xFFFFu16; 13]);
    }
    groups
}

fn build_lfn_part(ordinal: u8, is_last: bool, checksum: u8, group: &[u16; 13]) -> [u8; ENTRY_SIZE] {
    let mut buf = [0u8; ENTRY_SIZE];
    buf[0] = ordinal | if is_last { 0x40 } else { 0 };
    for (slot, &pos) in UTF16_POSITIONS.iter().enumerate() {
        let bytes = group[slot].to_le_bytes();
        buf[pos] = bytes[0];
        buf[pos + 1] = bytes[1];
    }
    buf[11] = ATTR_LFN;
    buf[13] = checksum;
    buf
}

/// Emits LFN parts for `long_name` in on-disk order (highest ordinal
/// first), stamped with `checksum` (the associated short entry's checksum).
pub fn encode_lfn_parts(long_name: &str, checksum: u8) -> Vec<[u8; ENTRY_SIZE]> {
    let groups = lfn_groups(long_name);
    let n = groups.len();
    let mut parts: Vec<_> = groups
        .iter()
        .enumerate()
        .map(|(idx, g)| build_lfn_part((idx + 1) as u8, idx + 1 == n, checksum, g))
        .collect();
    parts.reverse();
    parts
}

/// Decodes an LFN-encoded name back to a `String`, for the round-trip
/// property spec §8 asserts ("decoding `encode_lfn(s)` yields `s`
/// verbatim").
pub fn decode_lfn_parts(parts: &[[u8; ENTRY_SIZE]]) -> String {
    let mut buf = String::new();
    for raw in parts {
        let part = decode_lfn_part(raw);
        buf = format!("{}{}", part.fragment, buf);
    }
    buf
}
