//! Fixed-width packed transition records
//!
//! One transition packs into 8 bytes:
//!
//! | bytes | content                                             |
//! |-------|-----------------------------------------------------|
//! | 0-1   | little-endian i16: `(offset_minutes << 1) \| dst`   |
//! | 2     | designator index                                    |
//! | 3-7   | low five bytes of the little-endian i64 UTC seconds |
//!
//! Five bytes of seconds cover roughly ±17,000 years, comfortably
//! spanning the supported year range 1..=9999. Unpacking sign-extends
//! the truncated instant by replicating the top bit of byte 7.

use byteorder::{ByteOrder, LittleEndian};

/// The packed record length in bytes.
pub const PACKED_TRANSITION_LEN: usize = 8;

/// A transition in its packed representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedTransition {
    /// The UTC instant of the transition, in Unix epoch seconds
    pub time: i64,
    /// Index into the owning zone's designation table
    pub desig_idx: u8,
    /// The total offset in force after the transition, in minutes
    pub offset_minutes: i16,
    /// Whether the record transitioned into is daylight saving
    pub is_dst: bool,
}

impl PackedTransition {
    pub fn pack(&self) -> [u8; PACKED_TRANSITION_LEN] {
        let mut bytes = [0u8; PACKED_TRANSITION_LEN];
        LittleEndian::write_i16(
            &mut bytes[0..2],
            (self.offset_minutes << 1) | i16::from(self.is_dst),
        );
        bytes[2] = self.desig_idx;
        let mut time = [0u8; 8];
        LittleEndian::write_i64(&mut time, self.time);
        bytes[3..8].copy_from_slice(&time[..5]);
        bytes
    }

    pub fn unpack(bytes: &[u8; PACKED_TRANSITION_LEN]) -> Self {
        let packed_offset = LittleEndian::read_i16(&bytes[0..2]);
        let fill = if bytes[7] & 0x80 != 0 { 0xff } else { 0x00 };
        let mut time = [fill; 8];
        time[..5].copy_from_slice(&bytes[3..8]);
        Self {
            time: LittleEndian::read_i64(&time),
            desig_idx: bytes[2],
            offset_minutes: packed_offset >> 1,
            is_dst: packed_offset & 1 == 1,
        }
    }
}
