use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{Read, Seek, Write};

use super::constants::*;
use super::cstring::{read_counted_string, read_string_array, write_counted_string, write_string_array};
use super::cursor::ByteCursor;
use super::error::LmfError;

/// Acquisition system that produced a file. Selects header and event layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DaqId {
    Hm1,
    Tdc8,
    Camac,
    DualHm1,
    DualTdc8,
    Hm1Abm,
    Tdc8hp,
    Tcpip,
    Tdc8hpRaw,
    Fadc8,
    Fadc4,
    Tdc4hm,
    Tdc8hqRaw,
    Raw32Bit,
    Simple,
}

impl DaqId {
    pub fn code(&self) -> i32 {
        match self {
            Self::Hm1 => 0x01,
            Self::Tdc8 => 0x02,
            Self::Camac => 0x03,
            Self::DualHm1 => 0x04,
            Self::DualTdc8 => 0x05,
            Self::Hm1Abm => 0x06,
            Self::Tdc8hp => 0x08,
            Self::Tcpip => 0x09,
            Self::Tdc8hpRaw => 0x10,
            Self::Fadc8 => 0x11,
            Self::Fadc4 => 0x12,
            Self::Tdc4hm => 0x13,
            Self::Tdc8hqRaw => 0x14,
            Self::Raw32Bit => 100,
            Self::Simple => 101,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0x01 => Some(Self::Hm1),
            0x02 => Some(Self::Tdc8),
            0x03 => Some(Self::Camac),
            0x04 => Some(Self::DualHm1),
            0x05 => Some(Self::DualTdc8),
            0x06 => Some(Self::Hm1Abm),
            0x08 => Some(Self::Tdc8hp),
            0x09 => Some(Self::Tcpip),
            0x10 => Some(Self::Tdc8hpRaw),
            0x11 => Some(Self::Fadc8),
            0x12 => Some(Self::Fadc4),
            0x13 => Some(Self::Tdc4hm),
            0x14 => Some(Self::Tdc8hqRaw),
            100 => Some(Self::Raw32Bit),
            101 => Some(Self::Simple),
            _ => None,
        }
    }

    /// Files without a Cobold archive header
    pub fn is_non_cobold(&self) -> bool {
        matches!(self, Self::Raw32Bit | Self::Simple)
    }
}

impl TryFrom<i32> for DaqId {
    type Error = LmfError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_code(value)
            .ok_or_else(|| LmfError::UnsupportedSource(format!("unknown DAQ id {value}")))
    }
}

impl Display for DaqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hm1 => "HM1",
            Self::Tdc8 => "TDC8",
            Self::Camac => "CAMAC",
            Self::DualHm1 => "2HM1",
            Self::DualTdc8 => "2TDC8",
            Self::Hm1Abm => "HM1_ABM",
            Self::Tdc8hp => "TDC8HP",
            Self::Tcpip => "TCPIP",
            Self::Tdc8hpRaw => "TDC8HPRAW",
            Self::Fadc8 => "FADC8",
            Self::Fadc4 => "FADC4",
            Self::Tdc4hm => "TDC4HM",
            Self::Tdc8hqRaw => "TDC8HQRAW",
            Self::Raw32Bit => "RAW32BIT",
            Self::Simple => "SIMPLE",
        };
        write!(f, "{name}")
    }
}

/// Which generation of the archive layout a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveEra {
    Era2002,
    Era2008,
}

impl ArchiveEra {
    pub fn from_marker(marker: u32) -> Option<Self> {
        match marker {
            ARCHIVE_MARKER_2002 => Some(Self::Era2002),
            ARCHIVE_MARKER_2008 => Some(Self::Era2008),
            _ => None,
        }
    }

    pub fn marker(&self) -> u32 {
        match self {
            Self::Era2002 => ARCHIVE_MARKER_2002,
            Self::Era2008 => ARCHIVE_MARKER_2008,
        }
    }

    /// Size fields are u64 in the 2008 era
    pub fn wide(&self) -> bool {
        matches!(self, Self::Era2008)
    }

    pub fn preamble(&self) -> u64 {
        match self {
            Self::Era2002 => USER_HEADER_PREAMBLE_2002,
            Self::Era2008 => USER_HEADER_PREAMBLE_2008,
        }
    }
}

/// Size in bytes of one datum in fixed event records
pub fn bytes_per_datum(data_format: i32) -> Option<u64> {
    match data_format {
        LM_USERDEF | LM_SLONG | LM_CAMAC => Some(4),
        LM_SHORT => Some(2),
        LM_DOUBLE => Some(8),
        _ => None,
    }
}

/// Everything a variant decoder may depend on besides its own bytes
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub daq_version: i32,
    pub daq_id: DaqId,
    pub era: ArchiveEra,
    pub daq_source_flag: bool,
    pub header_size: u64,
    pub user_header_size: u64,
    pub max_channels: usize,
    pub max_hits: usize,
}

impl DecodeContext {
    /// Bytes the variant body has to occupy
    pub fn expected_body_size(&self) -> u64 {
        self.user_header_size.saturating_sub(self.era.preamble())
    }
}

#[derive(Debug, Clone)]
pub struct EncodeContext {
    pub daq_version: i32,
    pub daq_id: DaqId,
    pub era: ArchiveEra,
    pub daq_source_flag: bool,
}

/// Fields common to every Cobold user header: the shared prefix, versioning, channel
/// limits and the event layout switches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DaqCommon {
    pub frequency: f64,
    pub io_address: i32,
    pub timestamp_format: i32,
    pub daq_info: String,
    pub lmf_version: i32,
    pub daq_source_strings: Vec<String>,
    pub time_reference: i32,
    /// TDC bin size in ns (sample period for ADC systems)
    pub resolution: f64,
    pub tdc_data_type: i32,
    pub number_of_channels: u64,
    pub max_number_of_hits: u64,
    pub data_format: i32,
    pub variable_event_length: i32,
}

impl DaqCommon {
    pub fn read_prefix<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> Result<Self, LmfError> {
        let frequency = cursor.read_f64()?;
        let io_address = cursor.read_i32()?;
        let timestamp_format = cursor.read_i32()?;
        if !(0..=2).contains(&timestamp_format) {
            return Err(LmfError::HeaderRead(format!(
                "invalid timestamp format {timestamp_format}"
            )));
        }
        let daq_info = read_counted_string(cursor)?;
        Ok(Self {
            frequency,
            io_address,
            timestamp_format,
            daq_info,
            ..Default::default()
        })
    }

    pub fn write_prefix<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>) -> std::io::Result<()> {
        cursor.write_f64(self.frequency)?;
        cursor.write_i32(self.io_address)?;
        cursor.write_i32(self.timestamp_format)?;
        write_counted_string(cursor, &self.daq_info)
    }

    /// Read the DAQ source strings if the archive announced them and the variant gate passes
    pub fn read_source_strings<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        gate: bool,
    ) -> Result<(), LmfError> {
        if gate && ctx.daq_source_flag {
            self.daq_source_strings = read_string_array(cursor)?;
        }
        Ok(())
    }

    pub fn write_source_strings<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        ctx: &EncodeContext,
        gate: bool,
    ) -> std::io::Result<()> {
        if gate && ctx.daq_source_flag {
            write_string_array(cursor, &self.daq_source_strings)?;
        }
        Ok(())
    }

    /// Read channel and hit limits and validate them against the session capacity
    pub fn read_limits<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        width: LimitWidth,
    ) -> Result<(), LmfError> {
        self.number_of_channels = width.read(cursor)?;
        check_channels(self.number_of_channels, ctx.max_channels)?;
        self.max_number_of_hits = width.read(cursor)?;
        check_hits(self.max_number_of_hits, ctx.max_hits)?;
        Ok(())
    }

    pub fn write_limits<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        width: LimitWidth,
    ) -> std::io::Result<()> {
        width.write(cursor, self.number_of_channels)?;
        width.write(cursor, self.max_number_of_hits)
    }

    /// Number of coordinates of a TDC record: channels times (count + hits)
    pub fn tdc_coordinates(&self) -> u64 {
        self.number_of_channels * (1 + self.max_number_of_hits)
    }
}

/// On-disk width of the channel/hit limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWidth {
    I32,
    U32,
    U64,
}

impl LimitWidth {
    /// u64 from LMF version 9 on, u32 before
    pub fn for_lmf_version(lmf_version: i32) -> Self {
        if lmf_version >= 9 {
            Self::U64
        } else {
            Self::U32
        }
    }

    fn read<T: Read + Seek>(&self, cursor: &mut ByteCursor<T>) -> Result<u64, LmfError> {
        Ok(match self {
            Self::I32 => {
                let value = cursor.read_i32()?;
                u64::try_from(value).map_err(|_| {
                    LmfError::HeaderRead(format!("negative channel or hit limit {value}"))
                })?
            }
            Self::U32 => cursor.read_u32()? as u64,
            Self::U64 => cursor.read_u64()?,
        })
    }

    fn write<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>, value: u64) -> std::io::Result<()> {
        match self {
            Self::I32 => cursor.write_i32(value as i32),
            Self::U32 => cursor.write_u32(value as u32),
            Self::U64 => cursor.write_u64(value),
        }
    }
}

pub fn check_channels(found: u64, max: usize) -> Result<(), LmfError> {
    if found > max as u64 {
        return Err(LmfError::TooManyChannels { found, max });
    }
    Ok(())
}

pub fn check_hits(found: u64, max: usize) -> Result<(), LmfError> {
    if found > max as u64 {
        return Err(LmfError::TooManyHits { found, max });
    }
    Ok(())
}

/// The seven per-card TDC8PCI2 settings, also used for the second HM1 module
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CardSettings {
    pub gate_delay: i32,
    pub open_time: i32,
    pub write_empty_events: i32,
    pub trigger_falling_edge: i32,
    pub trigger_rising_edge: i32,
    pub empty_counter: i32,
    pub empty_counter_since_last_event: i32,
}

impl CardSettings {
    pub const SIZE: u64 = 7 * 4;

    pub fn read<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<Self> {
        Ok(Self {
            gate_delay: cursor.read_i32()?,
            open_time: cursor.read_i32()?,
            write_empty_events: cursor.read_i32()?,
            trigger_falling_edge: cursor.read_i32()?,
            trigger_rising_edge: cursor.read_i32()?,
            empty_counter: cursor.read_i32()?,
            empty_counter_since_last_event: cursor.read_i32()?,
        })
    }

    pub fn write<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>) -> std::io::Result<()> {
        cursor.write_i32(self.gate_delay)?;
        cursor.write_i32(self.open_time)?;
        cursor.write_i32(self.write_empty_events)?;
        cursor.write_i32(self.trigger_falling_edge)?;
        cursor.write_i32(self.trigger_rising_edge)?;
        cursor.write_i32(self.empty_counter)?;
        cursor.write_i32(self.empty_counter_since_last_event)
    }
}

/// Read `N` consecutive i32 values
pub fn read_i32_array<T: Read + Seek, const N: usize>(
    cursor: &mut ByteCursor<T>,
) -> std::io::Result<[i32; N]> {
    let mut values = [0; N];
    for value in values.iter_mut() {
        *value = cursor.read_i32()?;
    }
    Ok(values)
}

pub fn write_i32_array<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    values: &[i32],
) -> std::io::Result<()> {
    for value in values {
        cursor.write_i32(*value)?;
    }
    Ok(())
}

pub fn read_f64_array<T: Read + Seek, const N: usize>(
    cursor: &mut ByteCursor<T>,
) -> std::io::Result<[f64; N]> {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        *value = cursor.read_f64()?;
    }
    Ok(values)
}

/// Read a u8 flag
pub fn read_bool<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<bool> {
    Ok(cursor.read_u8()? != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_daq_id_codes() {
        for code in [1, 2, 3, 4, 5, 6, 8, 9, 0x10, 0x11, 0x12, 0x13, 0x14, 100, 101] {
            let id = DaqId::try_from(code).unwrap();
            assert_eq!(id.code(), code);
        }
        assert_eq!(DaqId::try_from(7).unwrap_err().code(), 6);
        assert_eq!(DaqId::Tdc8hqRaw.to_string(), "TDC8HQRAW");
        assert!(DaqId::Simple.is_non_cobold());
    }

    #[test]
    fn test_limits_capacity() {
        let ctx = DecodeContext {
            daq_version: DAQ_VERSION_2008,
            daq_id: DaqId::Tdc8,
            era: ArchiveEra::Era2002,
            daq_source_flag: false,
            header_size: 0,
            user_header_size: 0,
            max_channels: 4,
            max_hits: 8,
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let mut common = DaqCommon::default();
        let err = common
            .read_limits(&mut cursor, &ctx, LimitWidth::U32)
            .unwrap_err();
        assert_eq!(err.code(), 16);
        // Aborted without reading the hit limit
        assert_eq!(cursor.tell(), 4);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u64.to_le_bytes());
        bytes.extend_from_slice(&9u64.to_le_bytes());
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let err = common
            .read_limits(&mut cursor, &ctx, LimitWidth::U64)
            .unwrap_err();
        assert_eq!(err.code(), 17);
    }

    #[test]
    fn test_prefix_rejects_bad_timestamp_format() {
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        let common = DaqCommon {
            frequency: 1e6,
            timestamp_format: 3,
            ..Default::default()
        };
        common.write_prefix(&mut cursor).unwrap();
        let mut cursor = ByteCursor::new(Cursor::new(cursor.into_inner().into_inner()));
        assert_eq!(DaqCommon::read_prefix(&mut cursor).unwrap_err().code(), 5);
    }
}
