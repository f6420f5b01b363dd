//! Bit-exact packing of a [`ConfigurationRecord`] into its 16-byte block.
//!
//! The block layout is legacy and fixed. Bits are numbered MSB-first within each
//! byte (bit 7 is the most significant):
//!
//! | Byte | Bits 7 → 0 |
//! |------|------------|
//! | 0 | `block_id:4` `asdo_enabled:1` `approach_direction:2` `version[1]:1` |
//! | 1 | `version[0]:1` `application_code:7` |
//! | 2 | `door_enable:2` `stop_zone_length[9..4]:6` |
//! | 3 | `stop_zone_length[3..0]:4` `station_id[14..11]:4` |
//! | 4 | `station_id[10..3]:8` |
//! | 5 | `station_id[2..0]:3` `0:1` `platform_id:4` |
//! | 6–15 | reserved, zero |
//!
//! Rather than hand-written shifts, the layout lives in [`LAYOUT`]: one [`Segment`]
//! per contiguous run of bits a field occupies within one byte. [`encode`] and
//! [`decode`] both walk that table, so there is exactly one place the layout is defined.
//!
//! ## Truncation
//!
//! Values wider than their field are masked down to the field width, segment by
//! segment. Nothing is rejected here; see
//! [`ConfigurationRecord::validate`](crate::record::ConfigurationRecord::validate)
//! for strict checking.

use core::fmt;

use crate::consts::{BLOCK_LEN, BLOCK_PAYLOAD_LEN};
use crate::record::{ApproachDirection, ConfigurationRecord, DoorEnable, Field};

/// One run of a field's bits inside a single block byte.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Segment {
    /// Field the bits belong to.
    pub field: Field,
    /// Index of the destination byte.
    pub byte: usize,
    /// Bit position, within the byte, of the segment's least significant bit.
    pub offset: u8,
    /// Number of bits in the segment.
    pub width: u8,
    /// Bit position, within the field value, of the segment's least significant bit.
    pub source: u8,
}

impl Segment {
    const fn new(field: Field, byte: usize, offset: u8, width: u8, source: u8) -> Self {
        Self {
            field,
            byte,
            offset,
            width,
            source,
        }
    }

    /// Mask of the segment's bits once placed in its byte.
    pub const fn byte_mask(&self) -> u8 {
        (((1u16 << self.width) - 1) << self.offset) as u8
    }

    fn pack(&self, value: u32, block: &mut [u8; BLOCK_LEN]) {
        let bits = (value >> self.source) & ((1 << self.width) - 1);
        block[self.byte] |= (bits << self.offset) as u8;
    }

    fn unpack(&self, block: &[u8; BLOCK_LEN]) -> u32 {
        let bits = u32::from(block[self.byte] & self.byte_mask()) >> self.offset;
        bits << self.source
    }
}

/// The ASDO/CSDE block layout, in wire order.
pub const LAYOUT: [Segment; 13] = [
    Segment::new(Field::BlockId, 0, 4, 4, 0),
    Segment::new(Field::AsdoEnabled, 0, 3, 1, 0),
    Segment::new(Field::ApproachDirection, 0, 1, 2, 0),
    Segment::new(Field::Version, 0, 0, 1, 1),
    Segment::new(Field::Version, 1, 7, 1, 0),
    Segment::new(Field::ApplicationCode, 1, 0, 7, 0),
    Segment::new(Field::DoorEnable, 2, 6, 2, 0),
    Segment::new(Field::StopZoneLength, 2, 0, 6, 4),
    Segment::new(Field::StopZoneLength, 3, 4, 4, 0),
    Segment::new(Field::StationId, 3, 0, 4, 11),
    Segment::new(Field::StationId, 4, 0, 8, 3),
    Segment::new(Field::StationId, 5, 5, 3, 0),
    Segment::new(Field::PlatformId, 5, 0, 4, 0),
];

/// An encoded 16-byte block, as written to the tag.
#[derive(PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Block(pub [u8; BLOCK_LEN]);

impl Block {
    /// The raw bytes.
    pub const fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; BLOCK_LEN]> for Block {
    fn from(bytes: [u8; BLOCK_LEN]) -> Self {
        Block(bytes)
    }
}

/// Upper-case hex bytes separated by spaces, e.g. `0A 01 00 …`.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({self})")
    }
}

/// Encodes `record` into its block. Total and side-effect free.
pub fn encode(record: &ConfigurationRecord) -> Block {
    let mut block = [0u8; BLOCK_LEN];
    for segment in &LAYOUT {
        segment.pack(record.raw(segment.field), &mut block);
    }
    Block(block)
}

/// Extracts the masked value of `field` from `block`.
pub fn unpack_field(block: &Block, field: Field) -> u32 {
    LAYOUT
        .iter()
        .filter(|segment| segment.field == field)
        .fold(0, |value, segment| value | segment.unpack(&block.0))
}

/// Reads a record back out of `block`.
///
/// Returns `None` if the block could not have come from [`encode`]: an unassigned
/// approach code, the spare bit in byte 5 set, or non-zero reserved bytes.
pub fn decode(block: &Block) -> Option<ConfigurationRecord> {
    let layout_bits = LAYOUT
        .iter()
        .filter(|segment| segment.byte == 5)
        .fold(0u8, |mask, segment| mask | segment.byte_mask());
    if block.0[5] & !layout_bits != 0 || block.0[BLOCK_PAYLOAD_LEN..].iter().any(|&b| b != 0) {
        return None;
    }

    let narrow = |field| unpack_field(block, field) as u8;
    let wide = |field| unpack_field(block, field) as u16;
    Some(ConfigurationRecord {
        block_id: narrow(Field::BlockId),
        asdo_enabled: unpack_field(block, Field::AsdoEnabled) != 0,
        approach_direction: ApproachDirection::from_code(narrow(Field::ApproachDirection))?,
        version: narrow(Field::Version),
        application_code: narrow(Field::ApplicationCode),
        door_enable: DoorEnable::from_code(narrow(Field::DoorEnable)),
        stop_zone_length: wide(Field::StopZoneLength),
        station_id: wide(Field::StationId),
        platform_id: narrow(Field::PlatformId),
    })
}
