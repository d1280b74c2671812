//! Packed FAT date/time encoding.
//!
//! Bit layouts and the creation-time centisecond rule are grounded in
//! `original_source/bytes_parsers.py` (`parse_date`/`parse_time`/
//! `date_to_bits`/`time_to_bits`) and `fat_editor.py::parse_creation_datetime`
//! (which adds the centisecond byte as *milliseconds*, not as tenths of a
//! second scaled by 10 the way the official FAT spec does — spec.md's
//! concrete scenario 1 — `.076` from a `0x4C` = 76 byte — pins this down,
//! so the engine follows the source rather than the official spec here).

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Decodes a packed 16-bit FAT date. Returns `None` for an out-of-range
/// month/day rather than failing — spec §4.4: "if any packed date/time is
/// out of range, store `None` for that field rather than fail."
pub fn decode_date(v: u16) -> Option<NaiveDate> {
    let year = 1980 + (v >> 9) as i32;
    let month = ((v >> 5) & 0x0f) as u32;
    let day = (v & 0x1f) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn encode_date(d: NaiveDate) -> u16 {
    let year_bits = ((d.year() - 1980).max(0) as u16) & 0x7f;
    let month_bits = (d.month() as u16) & 0x0f;
    let day_bits = (d.day() as u16) & 0x1f;
    (year_bits << 9) | (month_bits << 5) | day_bits
}

/// Decodes a packed 16-bit FAT time. `second` is always even (2-second
/// granularity); `None` on an out-of-range hour/minute/second.
pub fn decode_time(v: u16) -> Option<NaiveTime> {
    let hour = (v >> 11) as u32;
    let minute = ((v >> 5) & 0x3f) as u32;
    let second = ((v & 0x1f) as u32) * 2;
    NaiveTime::from_hms_opt(hour, minute, second)
}

pub fn encode_time(t: NaiveTime) -> u16 {
    let hour_bits = (t.hour() as u16) & 0x1f;
    let minute_bits = (t.minute() as u16) & 0x3f;
    let second_bits = ((t.second() / 2) as u16) & 0x1f;
    (hour_bits << 11) | (minute_bits << 5) | second_bits
}

/// Decodes a packed date+time pair (`last_modification`/other non-creation
/// timestamps, which carry no centisecond byte).
pub fn decode_datetime(time: u16, date: u16) -> Option<NaiveDateTime> {
    Some(NaiveDateTime::new(decode_date(date)?, decode_time(time)?))
}

pub fn encode_datetime(dt: NaiveDateTime) -> (u16, u16) {
    (encode_time(dt.time()), encode_date(dt.date()))
}

/// Decodes a creation timestamp: packed time + packed date + a centisecond
/// byte, added as milliseconds (see module doc).
pub fn decode_creation(time: u16, date: u16, centi: u8) -> Option<NaiveDateTime> {
    let base = decode_datetime(time, date)?;
    base.checked_add_signed(chrono::Duration::milliseconds(centi as i64))
}

/// Encodes a creation timestamp, splitting off the sub-2-second remainder
/// into the centisecond byte (clamped to the 0..199 range spec §3 allows).
pub fn encode_creation(dt: NaiveDateTime) -> (u16, u16, u8) {
    let even_second = dt.second() - (dt.second() % 2);
    let truncated = dt.time().with_second(even_second).unwrap_or(dt.time());
    let truncated = truncated
        .with_nanosecond(0)
        .unwrap_or(truncated);
    let (time_bits, date_bits) = encode_datetime(NaiveDateTime::new(dt.date(), truncated));
    let remainder_ms = (dt.second() % 2) as i64 * 1000 + dt.nanosecond() as i64 / 1_000_000;
    let centi = remainder_ms.clamp(0, 199) as u8;
    (time_bits, date_bits, centi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn time_packing_matches_seed_scenarios() {
        assert_eq!(encode_time(NaiveTime::from_hms_opt(1, 25, 0).unwrap()), 0x0B20);
        assert_eq!(decode_time(0x0B20).unwrap(), NaiveTime::from_hms_opt(1, 25, 0).unwrap());

        assert_eq!(encode_time(NaiveTime::from_hms_opt(17, 35, 54).unwrap()), 0x8C7B);
        assert_eq!(decode_time(0x8C7B).unwrap(), NaiveTime::from_hms_opt(17, 35, 54).unwrap());

        assert_eq!(encode_time(NaiveTime::from_hms_opt(12, 12, 12).unwrap()), 0x6186);
        assert_eq!(decode_time(0x6186).unwrap(), NaiveTime::from_hms_opt(12, 12, 12).unwrap());
    }

    #[test]
    fn date_packing_matches_seed_scenarios() {
        assert_eq!(encode_date(NaiveDate::from_ymd_opt(2017, 8, 9).unwrap()), 0x4B09);
        assert_eq!(decode_date(0x4B09).unwrap(), NaiveDate::from_ymd_opt(2017, 8, 9).unwrap());

        assert_eq!(encode_date(NaiveDate::from_ymd_opt(1998, 10, 8).unwrap()), 0x2548);
        assert_eq!(decode_date(0x2548).unwrap(), NaiveDate::from_ymd_opt(1998, 10, 8).unwrap());

        assert_eq!(encode_date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), 0x2821);
        assert_eq!(decode_date(0x2821).unwrap(), NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn creation_seed_scenario_decodes_to_expected_millis() {
        // Bytes 14-17 of spec.md scenario 1's short entry: time `A8 76`,
        // date `FD 4A`, centisecond (byte 13) `4C` = 76.
        let time = u16::from_le_bytes([0xa8, 0x76]);
        let date = u16::from_le_bytes([0xfd, 0x4a]);
        let dt = decode_creation(time, date, 76).unwrap();
        assert_eq!(dt, NaiveDate::from_ymd_opt(2017, 7, 29).unwrap().and_hms_milli_opt(14, 53, 16, 76).unwrap());
    }

    #[test]
    fn rejects_out_of_range_date_as_none() {
        assert_eq!(decode_date(0b1111111_1111_11111), None); // month 15, day 31 -> invalid month
    }

    #[test]
    fn datetime_round_trips_for_even_seconds() {
        let dt = NaiveDate::from_ymd_opt(2023, 3, 4).unwrap().and_hms_opt(10, 20, 30).unwrap();
        let (t, d) = encode_datetime(dt);
        assert_eq!(decode_datetime(t, d).unwrap(), dt);
    }
}
