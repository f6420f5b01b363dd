//! The station configuration carried by an ASDO/CSDE block.
//!
//! A [`ConfigurationRecord`] is built once from caller-supplied values, handed to
//! [`encode`](crate::encoding::encode), and dropped after transmission. It holds raw
//! integers: values wider than their field are masked on encode, not rejected. Call
//! [`ConfigurationRecord::validate`] first if out-of-range input should be an error.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use core::str::FromStr;

use crate::consts::{DEFAULT_APPLICATION_CODE, DEFAULT_BLOCK_ID, DEFAULT_VERSION};
use crate::error::{OutOfRange, ParseDirectionError};

/// Side from which trains approach the station.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ApproachDirection {
    /// Northbound approach, wire code `01`.
    North,
    /// Southbound approach, wire code `10`.
    South,
}

impl ApproachDirection {
    /// The 2-bit wire code.
    pub const fn code(self) -> u8 {
        match self {
            ApproachDirection::North => 0b01,
            ApproachDirection::South => 0b10,
        }
    }

    /// Maps a 2-bit wire code back to a direction. `00` and `11` are not assigned.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0b01 => Some(ApproachDirection::North),
            0b10 => Some(ApproachDirection::South),
            _ => None,
        }
    }
}

impl FromStr for ApproachDirection {
    type Err = ParseDirectionError;

    /// Accepts the single-letter forms `N` and `S`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(ApproachDirection::North),
            "S" => Ok(ApproachDirection::South),
            _ => Err(ParseDirectionError),
        }
    }
}

/// Platform-side doors allowed to open in the stop zone (CSDE).
///
/// Behaves as a two-member flag set; combine with `|` or collect from an iterator.
///
/// ```rust
/// use asdo_tag::record::DoorEnable;
///
/// let doors: DoorEnable = [DoorEnable::Left, DoorEnable::Right].into_iter().collect();
/// assert_eq!(doors, DoorEnable::Both);
/// ```
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DoorEnable {
    /// No doors may open, wire code `00`.
    #[default]
    None,
    /// Left-side doors only, wire code `01`.
    Left,
    /// Right-side doors only, wire code `10`.
    Right,
    /// Doors on both sides, wire code `11`.
    Both,
}

impl DoorEnable {
    /// The 2-bit wire code.
    pub const fn code(self) -> u8 {
        match self {
            DoorEnable::None => 0b00,
            DoorEnable::Left => 0b01,
            DoorEnable::Right => 0b10,
            DoorEnable::Both => 0b11,
        }
    }

    /// Maps the low two bits of `code` to a door set.
    pub const fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => DoorEnable::None,
            0b01 => DoorEnable::Left,
            0b10 => DoorEnable::Right,
            _ => DoorEnable::Both,
        }
    }

    /// Whether every door in `other` is also in `self`.
    pub const fn contains(self, other: DoorEnable) -> bool {
        self.code() & other.code() == other.code()
    }
}

impl BitOr for DoorEnable {
    type Output = DoorEnable;

    fn bitor(self, rhs: DoorEnable) -> DoorEnable {
        DoorEnable::from_code(self.code() | rhs.code())
    }
}

impl BitOrAssign for DoorEnable {
    fn bitor_assign(&mut self, rhs: DoorEnable) {
        *self = *self | rhs;
    }
}

impl FromIterator<DoorEnable> for DoorEnable {
    fn from_iter<I: IntoIterator<Item = DoorEnable>>(iter: I) -> Self {
        iter.into_iter().fold(DoorEnable::None, BitOr::bitor)
    }
}

/// Names a record field, for layout tables and diagnostics.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Field {
    /// [`ConfigurationRecord::block_id`]
    BlockId,
    /// [`ConfigurationRecord::asdo_enabled`]
    AsdoEnabled,
    /// [`ConfigurationRecord::approach_direction`]
    ApproachDirection,
    /// [`ConfigurationRecord::version`]
    Version,
    /// [`ConfigurationRecord::application_code`]
    ApplicationCode,
    /// [`ConfigurationRecord::door_enable`]
    DoorEnable,
    /// [`ConfigurationRecord::stop_zone_length`]
    StopZoneLength,
    /// [`ConfigurationRecord::station_id`]
    StationId,
    /// [`ConfigurationRecord::platform_id`]
    PlatformId,
}

impl Field {
    /// Every field, in wire order.
    pub const ALL: [Field; 9] = [
        Field::BlockId,
        Field::AsdoEnabled,
        Field::ApproachDirection,
        Field::Version,
        Field::ApplicationCode,
        Field::DoorEnable,
        Field::StopZoneLength,
        Field::StationId,
        Field::PlatformId,
    ];

    /// Total width of the field on the wire, in bits.
    pub const fn width(self) -> u8 {
        match self {
            Field::BlockId => 4,
            Field::AsdoEnabled => 1,
            Field::ApproachDirection => 2,
            Field::Version => 2,
            Field::ApplicationCode => 7,
            Field::DoorEnable => 2,
            Field::StopZoneLength => 10,
            Field::StationId => 15,
            Field::PlatformId => 4,
        }
    }

    /// Largest value the field can hold without truncation.
    pub const fn max(self) -> u32 {
        (1 << self.width()) - 1
    }

    /// Lower-case field name.
    pub const fn name(self) -> &'static str {
        match self {
            Field::BlockId => "block_id",
            Field::AsdoEnabled => "asdo_enabled",
            Field::ApproachDirection => "approach_direction",
            Field::Version => "version",
            Field::ApplicationCode => "application_code",
            Field::DoorEnable => "door_enable",
            Field::StopZoneLength => "stop_zone_length",
            Field::StationId => "station_id",
            Field::PlatformId => "platform_id",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical contents of one ASDO/CSDE block.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct ConfigurationRecord {
    /// Block slot on the tag (4 bits).
    pub block_id: u8,
    /// Automatic stopping enabled.
    pub asdo_enabled: bool,
    /// Train approach side.
    pub approach_direction: ApproachDirection,
    /// Layout version (2 bits, split across bytes 0 and 1).
    pub version: u8,
    /// Consuming application (7 bits).
    pub application_code: u8,
    /// Doors allowed to open.
    pub door_enable: DoorEnable,
    /// Stop-zone length, unscaled (10 bits).
    pub stop_zone_length: u16,
    /// Station identifier (15 bits).
    pub station_id: u16,
    /// Platform within the station (4 bits).
    pub platform_id: u8,
}

impl ConfigurationRecord {
    /// Creates a record from the required fields.
    ///
    /// The rest take the writer's defaults: block `0`, ASDO enabled, version `0`,
    /// application code `1`, no doors enabled.
    pub fn new(
        approach_direction: ApproachDirection,
        stop_zone_length: u16,
        station_id: u16,
        platform_id: u8,
    ) -> Self {
        Self {
            block_id: DEFAULT_BLOCK_ID,
            asdo_enabled: true,
            approach_direction,
            version: DEFAULT_VERSION,
            application_code: DEFAULT_APPLICATION_CODE,
            door_enable: DoorEnable::None,
            stop_zone_length,
            station_id,
            platform_id,
        }
    }

    /// Sets the block slot.
    pub fn with_block_id(mut self, block_id: u8) -> Self {
        self.block_id = block_id;
        self
    }

    /// Enables or disables automatic stopping.
    pub fn with_asdo_enabled(mut self, enabled: bool) -> Self {
        self.asdo_enabled = enabled;
        self
    }

    /// Sets the layout version.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Sets the application code.
    pub fn with_application_code(mut self, application_code: u8) -> Self {
        self.application_code = application_code;
        self
    }

    /// Sets the enabled doors.
    pub fn with_door_enable(mut self, door_enable: DoorEnable) -> Self {
        self.door_enable = door_enable;
        self
    }

    /// Raw integer value of `field`, before masking.
    pub fn raw(&self, field: Field) -> u32 {
        match field {
            Field::BlockId => u32::from(self.block_id),
            Field::AsdoEnabled => u32::from(self.asdo_enabled),
            Field::ApproachDirection => u32::from(self.approach_direction.code()),
            Field::Version => u32::from(self.version),
            Field::ApplicationCode => u32::from(self.application_code),
            Field::DoorEnable => u32::from(self.door_enable.code()),
            Field::StopZoneLength => u32::from(self.stop_zone_length),
            Field::StationId => u32::from(self.station_id),
            Field::PlatformId => u32::from(self.platform_id),
        }
    }

    /// Checks every field against its wire width.
    ///
    /// Encoding never needs this; it only exists for callers that want
    /// out-of-range input rejected instead of silently truncated.
    ///
    /// # Errors
    /// The first field, in wire order, whose value does not fit.
    pub fn validate(&self) -> Result<(), OutOfRange> {
        for field in Field::ALL {
            let value = self.raw(field);
            if value > field.max() {
                return Err(OutOfRange { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_writer_defaults() {
        let record = ConfigurationRecord::new(ApproachDirection::South, 120, 4021, 2);

        assert_eq!(record.block_id, 0);
        assert!(record.asdo_enabled);
        assert_eq!(record.version, 0);
        assert_eq!(record.application_code, 1);
        assert_eq!(record.door_enable, DoorEnable::None);
        assert_eq!(record.stop_zone_length, 120);
        assert_eq!(record.station_id, 4021);
        assert_eq!(record.platform_id, 2);
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("N".parse(), Ok(ApproachDirection::North));
        assert_eq!("S".parse(), Ok(ApproachDirection::South));
        assert_eq!("n".parse::<ApproachDirection>(), Err(ParseDirectionError));
        assert_eq!("NORTH".parse::<ApproachDirection>(), Err(ParseDirectionError));
        assert_eq!(ApproachDirection::from_code(0b00), None);
        assert_eq!(ApproachDirection::from_code(0b11), None);
    }

    #[test]
    fn test_door_enable_folds_like_flags() {
        assert_eq!(DoorEnable::Left | DoorEnable::Right, DoorEnable::Both);
        assert_eq!(DoorEnable::Left | DoorEnable::Left, DoorEnable::Left);
        assert_eq!(DoorEnable::None | DoorEnable::Right, DoorEnable::Right);
        assert_eq!(core::iter::empty().collect::<DoorEnable>(), DoorEnable::None);

        let mut doors = DoorEnable::Right;
        doors |= DoorEnable::Left;
        assert!(doors.contains(DoorEnable::Left));
        assert!(doors.contains(DoorEnable::Right));
        assert!(!DoorEnable::Left.contains(DoorEnable::Right));
    }

    #[test]
    fn test_field_widths_fill_payload() {
        let bits: u32 = Field::ALL.iter().map(|f| u32::from(f.width())).sum();
        // One spare bit in byte 5 between station_id and platform_id.
        assert_eq!(bits, 47);
        assert_eq!(Field::StationId.max(), 32_767);
        assert_eq!(Field::StopZoneLength.max(), 1_023);
    }

    #[test]
    fn test_validate_reports_first_overflow() {
        let record = ConfigurationRecord::new(ApproachDirection::North, 1_023, 32_767, 15)
            .with_version(3)
            .with_application_code(127)
            .with_block_id(15);
        assert_eq!(record.validate(), Ok(()));

        let record = ConfigurationRecord::new(ApproachDirection::North, 1_024, 0, 31);
        assert_eq!(
            record.validate(),
            Err(OutOfRange {
                field: Field::StopZoneLength,
                value: 1_024
            })
        );

        let record = ConfigurationRecord::new(ApproachDirection::North, 0, 0, 0).with_version(4);
        assert_eq!(
            record.validate(),
            Err(OutOfRange {
                field: Field::Version,
                value: 4
            })
        );
    }
}
