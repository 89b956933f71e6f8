//! Decoder for compiled binary zone files (TZif)
//!
//! See `tzfile(5)`. A file holds a legacy block with 4-byte transition
//! times and, for version '2' and later, a second header and block with
//! 8-byte times followed by a POSIX string footer line. Callers should
//! prefer the 64-bit block when present.

use alloc::{borrow::ToOwned, string::String, vec::Vec};
use byteorder::{BigEndian, ByteOrder};

use crate::{codec::PackedTransition, utils};

/// The UTC window covered by an inclusive year range.
pub fn year_window(years: core::ops::RangeInclusive<i32>) -> (i64, i64) {
    (
        utils::epoch_seconds_for_epoch_days(utils::epoch_days_for_year(*years.start())),
        utils::epoch_seconds_for_epoch_days(utils::epoch_days_for_year(*years.end() + 1)) - 1,
    )
}

/// The four magic bytes opening every TZif file.
pub const TZIF_MAGIC: &[u8; 4] = b"TZif";

/// The TZif decoding error
#[derive(Debug, Clone, PartialEq)]
pub enum TzifParseError {
    /// The file does not open with `TZif`
    BadMagic([u8; 4]),
    /// The data ended before a counted field
    UnexpectedEof,
    /// An indicator array length is neither zero nor the type count
    InvalidIndicatorCount { expected: u32, actual: u32 },
    /// A transition references a local time type out of range
    InvalidTypeIndex(u8),
    /// A designation index does not point at a NUL-terminated string
    InvalidDesignationIndex(u8),
    /// The version 2 footer is missing or not valid UTF-8
    InvalidFooter,
}

impl core::fmt::Display for TzifParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic(magic) => write!(f, "bad magic {magic:?}, expected \"TZif\""),
            Self::UnexpectedEof => write!(f, "unexpected end of data"),
            Self::InvalidIndicatorCount { expected, actual } => {
                write!(f, "indicator count {actual} is neither 0 nor {expected}")
            }
            Self::InvalidTypeIndex(idx) => write!(f, "transition type index {idx} out of range"),
            Self::InvalidDesignationIndex(idx) => {
                write!(f, "designation index {idx} is not NUL-terminated")
            }
            Self::InvalidFooter => write!(f, "missing or malformed POSIX string footer"),
        }
    }
}

/// The fixed TZif header: magic, version, and six big-endian counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TzifHeader {
    pub version: u8,
    pub isutcnt: u32,
    pub isstdcnt: u32,
    pub leapcnt: u32,
    pub timecnt: u32,
    pub typecnt: u32,
    pub charcnt: u32,
}

/// One local time type record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeType {
    /// Offset from universal time, in seconds
    pub utoff: i32,
    pub is_dst: bool,
    /// Byte index into the designation table
    pub desig_idx: u8,
}

/// One leap second record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeapSecond {
    /// The UTC instant at which the correction applies
    pub occurrence: i64,
    /// The cumulative correction in seconds
    pub correction: i32,
}

/// One decoded data block.
#[derive(Debug, Clone, PartialEq)]
pub struct TzifBlock {
    pub transition_times: Vec<i64>,
    pub transition_types: Vec<u8>,
    pub local_time_types: Vec<LocalTimeType>,
    pub designations: Vec<u8>,
    pub leap_seconds: Vec<LeapSecond>,
    pub std_wall: Vec<bool>,
    pub ut_local: Vec<bool>,
}

impl TzifBlock {
    /// The local time type in force after transition `i`.
    pub fn local_time_type(&self, i: usize) -> Result<&LocalTimeType, TzifParseError> {
        let idx = *self
            .transition_types
            .get(i)
            .ok_or(TzifParseError::UnexpectedEof)?;
        self.local_time_types
            .get(idx as usize)
            .ok_or(TzifParseError::InvalidTypeIndex(idx))
    }

    /// Looks up a NUL-terminated designation by byte index.
    pub fn designation(&self, desig_idx: u8) -> Result<&str, TzifParseError> {
        let start = desig_idx as usize;
        let rest = self
            .designations
            .get(start..)
            .ok_or(TzifParseError::InvalidDesignationIndex(desig_idx))?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(TzifParseError::InvalidDesignationIndex(desig_idx))?;
        core::str::from_utf8(&rest[..end])
            .map_err(|_| TzifParseError::InvalidDesignationIndex(desig_idx))
    }

    /// Extracts the transitions inside a UTC time window as packed
    /// records, keeping the last transition preceding the window so the
    /// state entering it is preserved.
    pub fn packed_transitions(
        &self,
        time_from: i64,
        time_to: i64,
    ) -> Result<Vec<PackedTransition>, TzifParseError> {
        let mut out = Vec::new();
        for (i, &time) in self.transition_times.iter().enumerate() {
            if time > time_to {
                break;
            }
            if time < time_from {
                out.clear();
            }
            let record = self.local_time_type(i)?;
            out.push(PackedTransition {
                time,
                desig_idx: record.desig_idx,
                offset_minutes: record.utoff.div_euclid(60) as i16,
                is_dst: record.is_dst,
            });
        }
        Ok(out)
    }

    /// Drops a duplicated final transition when the last two
    /// transitions share an identical type record.
    ///
    /// Compiled files often, but not always, repeat the final
    /// transition; this is a best-effort normalization, not a
    /// round-trip guarantee.
    pub fn drop_duplicate_final_transition(&mut self) -> bool {
        let n = self.transition_times.len();
        if n < 2 {
            return false;
        }
        let last = self.local_time_type(n - 1).ok().copied();
        let prev = self.local_time_type(n - 2).ok().copied();
        if last.is_some() && last == prev {
            self.transition_times.truncate(n - 1);
            self.transition_types.truncate(n - 1);
            return true;
        }
        false
    }
}

/// A fully decoded TZif file.
#[derive(Debug, Clone, PartialEq)]
pub struct Tzif {
    pub header: TzifHeader,
    pub block: TzifBlock,
    pub header2: Option<TzifHeader>,
    pub block2: Option<TzifBlock>,
    /// The POSIX string footer of a version 2+ file
    pub posix_string: Option<String>,
}

impl Tzif {
    /// Decodes a compiled zone file from a path.
    #[cfg(feature = "std")]
    pub fn from_filepath<P: AsRef<std::path::Path>>(path: P) -> Result<Self, crate::TzError> {
        Ok(Self::from_bytes(&std::fs::read(path)?)?)
    }

    /// Decodes a TZif byte image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TzifParseError> {
        let mut cursor = Cursor::new(data);
        let header = decode_header(&mut cursor)?;
        let block = decode_block(&mut cursor, &header, 4)?;

        if header.version < b'2' {
            return Ok(Self {
                header,
                block,
                header2: None,
                block2: None,
                posix_string: None,
            });
        }

        let header2 = decode_header(&mut cursor)?;
        let block2 = decode_block(&mut cursor, &header2, 8)?;
        let footer = cursor.rest();
        let posix_string = core::str::from_utf8(footer)
            .map_err(|_| TzifParseError::InvalidFooter)?
            .trim_matches('\n');

        Ok(Self {
            header,
            block,
            header2: Some(header2),
            block2: Some(block2),
            posix_string: Some(posix_string.to_owned()),
        })
    }

    /// The preferred data block: the 64-bit one when present.
    pub fn data(&self) -> &TzifBlock {
        self.block2.as_ref().unwrap_or(&self.block)
    }

    /// Mutable access to the preferred data block.
    pub fn data_mut(&mut self) -> &mut TzifBlock {
        self.block2.as_mut().unwrap_or(&mut self.block)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TzifParseError> {
        let end = self
            .position
            .checked_add(len)
            .ok_or(TzifParseError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.position..end)
            .ok_or(TzifParseError::UnexpectedEof)?;
        self.position = end;
        Ok(bytes)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

fn decode_header(cursor: &mut Cursor<'_>) -> Result<TzifHeader, TzifParseError> {
    let magic = cursor.take(4)?;
    if magic != TZIF_MAGIC {
        return Err(TzifParseError::BadMagic([
            magic[0], magic[1], magic[2], magic[3],
        ]));
    }
    let version = cursor.take(1)?[0];
    cursor.take(15)?; // Reserved
    let counts = cursor.take(24)?;
    let header = TzifHeader {
        version,
        isutcnt: BigEndian::read_u32(&counts[0..4]),
        isstdcnt: BigEndian::read_u32(&counts[4..8]),
        leapcnt: BigEndian::read_u32(&counts[8..12]),
        timecnt: BigEndian::read_u32(&counts[12..16]),
        typecnt: BigEndian::read_u32(&counts[16..20]),
        charcnt: BigEndian::read_u32(&counts[20..24]),
    };
    for actual in [header.isstdcnt, header.isutcnt] {
        if actual != 0 && actual != header.typecnt {
            return Err(TzifParseError::InvalidIndicatorCount {
                expected: header.typecnt,
                actual,
            });
        }
    }
    Ok(header)
}

fn decode_block(
    cursor: &mut Cursor<'_>,
    header: &TzifHeader,
    time_size: usize,
) -> Result<TzifBlock, TzifParseError> {
    let read_time = |bytes: &[u8]| -> i64 {
        if time_size == 8 {
            BigEndian::read_i64(bytes)
        } else {
            BigEndian::read_i32(bytes) as i64
        }
    };

    let times = cursor.take(header.timecnt as usize * time_size)?;
    let transition_times = times.chunks_exact(time_size).map(read_time).collect();

    let transition_types = cursor.take(header.timecnt as usize)?.to_vec();

    let types = cursor.take(header.typecnt as usize * 6)?;
    let local_time_types = types
        .chunks_exact(6)
        .map(|record| LocalTimeType {
            utoff: BigEndian::read_i32(&record[0..4]),
            is_dst: record[4] != 0,
            desig_idx: record[5],
        })
        .collect();

    let designations = cursor.take(header.charcnt as usize)?.to_vec();

    let leaps = cursor.take(header.leapcnt as usize * (time_size + 4))?;
    let leap_seconds = leaps
        .chunks_exact(time_size + 4)
        .map(|record| LeapSecond {
            occurrence: read_time(&record[..time_size]),
            correction: BigEndian::read_i32(&record[time_size..]),
        })
        .collect();

    let std_wall = cursor
        .take(header.isstdcnt as usize)?
        .iter()
        .map(|&b| b != 0)
        .collect();
    let ut_local = cursor
        .take(header.isutcnt as usize)?
        .iter()
        .map(|&b| b != 0)
        .collect();

    Ok(TzifBlock {
        transition_times,
        transition_types,
        local_time_types,
        designations,
        leap_seconds,
        std_wall,
        ut_local,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn header_bytes(version: u8, timecnt: u32, typecnt: u32, charcnt: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"TZif");
        out.push(version);
        out.extend_from_slice(&[0u8; 15]);
        push_u32(&mut out, 0); // isutcnt
        push_u32(&mut out, 0); // isstdcnt
        push_u32(&mut out, 0); // leapcnt
        push_u32(&mut out, timecnt);
        push_u32(&mut out, typecnt);
        push_u32(&mut out, charcnt);
        out
    }

    /// A v2 image for a zone with one LMT record and two transitions
    /// between CST and CDT, with the final transition duplicated.
    fn synthetic_v2() -> Vec<u8> {
        let designations = b"LMT\0CST\0CDT\0";
        let types: [(i32, u8, u8); 3] = [(-21036, 0, 0), (-21600, 0, 4), (-18000, 1, 8)];

        // Legacy block: empty except the type records.
        let mut image = header_bytes(b'2', 0, types.len() as u32, designations.len() as u32);
        for (utoff, is_dst, idx) in types {
            image.extend_from_slice(&utoff.to_be_bytes());
            image.push(is_dst);
            image.push(idx);
        }
        image.extend_from_slice(designations);

        // 64-bit block with three transitions, the last duplicated.
        let transitions: [(i64, u8); 3] =
            [(-2_717_647_200, 1), (-1_633_276_800, 2), (-1_615_136_400, 2)];
        image.extend_from_slice(&header_bytes(
            b'2',
            transitions.len() as u32,
            types.len() as u32,
            designations.len() as u32,
        ));
        for (time, _) in transitions {
            image.extend_from_slice(&time.to_be_bytes());
        }
        for (_, type_idx) in transitions {
            image.push(type_idx);
        }
        for (utoff, is_dst, idx) in types {
            image.extend_from_slice(&utoff.to_be_bytes());
            image.push(is_dst);
            image.push(idx);
        }
        image.extend_from_slice(designations);
        image.extend_from_slice(b"\nCST6CDT,M3.2.0,M11.1.0\n");
        image
    }

    #[test]
    fn decodes_synthetic_v2() {
        let tzif = Tzif::from_bytes(&synthetic_v2()).unwrap();
        assert_eq!(tzif.header.version, b'2');
        assert_eq!(tzif.header.timecnt, 0);

        let data = tzif.data();
        assert_eq!(
            data.transition_times,
            vec![-2_717_647_200, -1_633_276_800, -1_615_136_400]
        );
        assert_eq!(data.transition_types, vec![1, 2, 2]);

        let cst = data.local_time_type(0).unwrap();
        assert_eq!(cst.utoff, -21600);
        assert!(!cst.is_dst);
        assert_eq!(data.designation(cst.desig_idx).unwrap(), "CST");

        let cdt = data.local_time_type(1).unwrap();
        assert_eq!(cdt.utoff, -18000);
        assert!(cdt.is_dst);
        assert_eq!(data.designation(cdt.desig_idx).unwrap(), "CDT");

        assert_eq!(
            tzif.posix_string.as_deref(),
            Some("CST6CDT,M3.2.0,M11.1.0")
        );
    }

    #[test]
    fn drops_duplicated_final_transition() {
        let mut tzif = Tzif::from_bytes(&synthetic_v2()).unwrap();
        assert!(tzif.data_mut().drop_duplicate_final_transition());
        assert_eq!(tzif.data().transition_times.len(), 2);
        // A second pass leaves distinct trailing records alone.
        assert!(!tzif.data_mut().drop_duplicate_final_transition());
        assert_eq!(tzif.data().transition_times.len(), 2);
    }

    #[test]
    fn windowed_extraction_keeps_entering_state() {
        let mut tzif = Tzif::from_bytes(&synthetic_v2()).unwrap();
        tzif.data_mut().drop_duplicate_final_transition();
        let (from, to) = year_window(1918..=1918);
        let packed = tzif.data().packed_transitions(from, to).unwrap();
        // The 1883 transition survives as the state entering the window.
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].time, -2_717_647_200);
        assert_eq!(packed[0].offset_minutes, -360);
        assert!(!packed[0].is_dst);
        assert_eq!(packed[1].time, -1_633_276_800);
        assert_eq!(packed[1].offset_minutes, -300);
        assert!(packed[1].is_dst);
    }

    #[test]
    fn bad_magic_fails_fast() {
        let mut image = synthetic_v2();
        image[0] = b'X';
        assert_eq!(
            Tzif::from_bytes(&image),
            Err(TzifParseError::BadMagic(*b"XZif"))
        );
    }

    #[test]
    fn truncated_data_is_rejected() {
        let image = synthetic_v2();
        for len in [3, 20, 44, image.len() - 30] {
            assert!(Tzif::from_bytes(&image[..len]).is_err());
        }
    }

    #[test]
    fn legacy_only_file_has_no_footer() {
        let designations = b"UTC\0";
        let mut image = header_bytes(0, 0, 1, designations.len() as u32);
        image.extend_from_slice(&0i32.to_be_bytes());
        image.push(0);
        image.push(0);
        image.extend_from_slice(designations);

        let tzif = Tzif::from_bytes(&image).unwrap();
        assert!(tzif.block2.is_none());
        assert!(tzif.posix_string.is_none());
        assert_eq!(tzif.data().designation(0).unwrap(), "UTC");
    }
}
