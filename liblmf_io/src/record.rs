use super::archive::FileHeader;
use super::constants::*;
use super::daq::DaqId;
use super::error::LmfError;
use super::variants::VariantHeader;

/// On-disk width of a hit count or hit value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    U16,
    U32,
    I32,
    I64,
    F64,
}

impl ValueWidth {
    pub fn size(&self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Width of TDC values stored in the given data format
    pub fn for_data_format(data_format: i32) -> Option<Self> {
        match data_format {
            LM_SHORT => Some(Self::U16),
            LM_SLONG | LM_USERDEF => Some(Self::I32),
            LM_DOUBLE => Some(Self::F64),
            _ => None,
        }
    }
}

/// How the event records of a file are framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLayout {
    /// Constant size records: per channel one count and `max_hits` values of one width
    Fixed(ValueWidth),
    /// Length-prefixed records with only the recorded hits
    Variable { count: ValueWidth, value: ValueWidth },
    /// TDC8HP group mode words
    RawGroup,
    Adc4,
    Adc8,
    Camac,
    Raw32,
}

/// Everything the event reader and writer need to know about a file's records
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFormat {
    pub layout: EventLayout,
    pub timestamp_words: u32,
    pub number_of_channels: usize,
    pub max_hits: usize,
    pub number_of_coordinates: u64,
    /// Changed-parameter block present (LMF version 9 and later)
    pub changed_mask: bool,
    /// Post-event data block present (LMF version 10 and later)
    pub post_event: bool,
}

impl RecordFormat {
    pub fn new(
        daq_id: DaqId,
        file_header: &FileHeader,
        variant: &VariantHeader,
    ) -> Result<Self, LmfError> {
        let common = variant.common();
        let fixed_width = || {
            ValueWidth::for_data_format(common.data_format).ok_or_else(|| {
                LmfError::UnsupportedSource(format!(
                    "data format {} for {} events",
                    common.data_format, daq_id
                ))
            })
        };
        let variable = common.variable_event_length == 1;
        let layout = match daq_id {
            DaqId::Simple => EventLayout::Fixed(ValueWidth::I32),
            DaqId::Raw32Bit => EventLayout::Raw32,
            DaqId::Camac => EventLayout::Camac,
            DaqId::Tcpip => EventLayout::Fixed(fixed_width()?),
            DaqId::Tdc8 | DaqId::DualTdc8 | DaqId::Hm1 | DaqId::Hm1Abm | DaqId::DualHm1 => {
                if variable {
                    EventLayout::Variable {
                        count: ValueWidth::U16,
                        value: fixed_width()?,
                    }
                } else {
                    EventLayout::Fixed(fixed_width()?)
                }
            }
            DaqId::Tdc8hp => {
                if variable {
                    EventLayout::Variable {
                        count: ValueWidth::U16,
                        value: ValueWidth::I32,
                    }
                } else {
                    EventLayout::Fixed(fixed_width()?)
                }
            }
            DaqId::Tdc8hpRaw => EventLayout::RawGroup,
            DaqId::Tdc8hqRaw => EventLayout::Variable {
                count: ValueWidth::U16,
                value: ValueWidth::I64,
            },
            DaqId::Tdc4hm => EventLayout::Variable {
                count: ValueWidth::U32,
                value: ValueWidth::I64,
            },
            DaqId::Fadc4 => EventLayout::Adc4,
            DaqId::Fadc8 => EventLayout::Adc8,
        };
        Ok(Self {
            layout,
            timestamp_words: common.timestamp_format.clamp(0, 2) as u32,
            number_of_channels: common.number_of_channels as usize,
            max_hits: common.max_number_of_hits as usize,
            number_of_coordinates: file_header.number_of_coordinates,
            changed_mask: common.lmf_version >= 9,
            post_event: common.lmf_version >= 10,
        })
    }

    /// Size of one record when every record has the same size
    pub fn fixed_record_size(&self) -> Option<u64> {
        let timestamp = 4 * self.timestamp_words as u64;
        match self.layout {
            EventLayout::Fixed(width) => Some(
                timestamp
                    + self.number_of_channels as u64 * (1 + self.max_hits as u64) * width.size(),
            ),
            EventLayout::Camac => Some(timestamp + 4 * self.number_of_coordinates),
            _ => None,
        }
    }
}
