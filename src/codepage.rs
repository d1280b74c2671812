//! Code-page 866 transcoding for 8.3 short names.
//!
//! Spec §3/§4.4 require short names (and their extensions) to be stored in
//! "code-page-866" — `original_source/fsobjects.py`'s `_write_short_name`
//! calls Python's built-in `cp866` codec directly
//! (`name_part.encode(encoding="cp866", errors="strict")`), and
//! `fat_editor.py`'s `parse_file_info` decodes with the same codec. Neither
//! the teacher crate nor spec.md names a Rust crate for this; `oem_cp` is
//! the crate the wider FAT/DOS-archive ecosystem (legacy zip readers,
//! fatfs-adjacent tools) reaches for to round-trip this exact table.

use oem_cp::code_table::DECODING_TABLE_CP866;
use oem_cp::{decode_string_complete_table, encode_string_checked};

use crate::error::{Error, Result};

/// Decodes `bytes` (already stripped of padding) as cp866, per spec §3's
/// "short name ... code-page-866" requirement. cp866 never produces decode
/// errors for arbitrary 8-bit input — every byte value maps to something —
/// so this never fails.
pub fn decode_866(bytes: &[u8]) -> String {
    decode_string_complete_table(bytes, &DECODING_TABLE_CP866)
}

/// Encodes `s` as cp866. Returns `InvalidName` for the first codepoint with
/// no cp866 representation, mirroring Python's `UnicodeEncodeError` under
/// `errors="strict"` (`fsobjects.py::_write_short_name`).
pub fn encode_866(s: &str) -> Result<Vec<u8>> {
    encode_string_checked(s, &DECODING_TABLE_CP866)
        .ok_or_else(|| Error::InvalidName(s.chars().next().unwrap_or('\0')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trips() {
        let enc = encode_866("SHORT").unwrap();
        assert_eq!(decode_866(&enc), "SHORT");
    }

    #[test]
    fn cyrillic_round_trips() {
        let enc = encode_866("ИИ").unwrap();
        assert_eq!(decode_866(&enc), "ИИ");
    }
}
