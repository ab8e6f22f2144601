use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::daq::{read_f64_array, DaqCommon, DecodeContext, LimitWidth};
use crate::error::LmfError;

pub const MAX_TDC4HM_MODULES: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tdc4hmModule {
    pub serial_number: i32,
    pub channel_start: i32,
    pub channel_count: i32,
    pub resolution: f64,
    pub trigger_edge_mask: i32,
    pub group_range_start: f64,
    pub group_range_end: f64,
    pub channel_offsets: [f64; 4],
}

/// User header of the TDC4HM. Read only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tdc4hmHeader {
    pub common: DaqCommon,
    pub driver_version: i32,
    pub modules: Vec<Tdc4hmModule>,
}

impl Tdc4hmHeader {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
    ) -> Result<Self, LmfError> {
        let mut common = DaqCommon::read_prefix(cursor)?;
        common.lmf_version = cursor.read_i32()?;
        common.read_source_strings(cursor, ctx, true)?;
        common.time_reference = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        common.tdc_data_type = cursor.read_i32()?;
        common.read_limits(cursor, ctx, LimitWidth::U64)?;
        common.data_format = cursor.read_i32()?;

        let mut header = Self {
            driver_version: cursor.read_i32()?,
            ..Default::default()
        };
        let number_of_modules = cursor.read_i32()?;
        if !(0..=MAX_TDC4HM_MODULES).contains(&number_of_modules) {
            return Err(LmfError::HeaderRead(format!(
                "invalid number of TDC4HM modules {number_of_modules}"
            )));
        }
        for _ in 0..number_of_modules {
            header.modules.push(Tdc4hmModule {
                serial_number: cursor.read_i32()?,
                channel_start: cursor.read_i32()?,
                channel_count: cursor.read_i32()?,
                resolution: cursor.read_f64()?,
                trigger_edge_mask: cursor.read_i32()?,
                group_range_start: cursor.read_f64()?,
                group_range_end: cursor.read_f64()?,
                channel_offsets: read_f64_array(cursor)?,
            });
        }
        common.variable_event_length = cursor.read_i32()?;
        header.common = common;
        Ok(header)
    }
}
