use std::io::{Read, Seek};

use super::tdc8hp::read_calibrations;
use crate::calibration::TdcCalibration;
use crate::cursor::ByteCursor;
use crate::daq::{read_bool, DaqCommon, DecodeContext, LimitWidth};
use crate::error::LmfError;

pub const MAX_TDC8HQ_CARDS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tdc8hqCard {
    pub serial_number: i32,
    pub firmware_version: i32,
    pub channel_start: i32,
    pub channel_count: i32,
    pub resolution: f64,
}

/// User header of the TDC8HQ. Read only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tdc8hqHeader {
    pub common: DaqCommon,
    pub driver_version: i32,
    pub trigger_channel: i32,
    pub trigger_edge: i32,
    pub grouping_enable: bool,
    pub group_range_start: f64,
    pub group_range_end: f64,
    pub trigger_dead_time: f64,
    pub rising_enable: u64,
    pub falling_enable: u64,
    pub cards: Vec<Tdc8hqCard>,
    pub calibrations: Vec<TdcCalibration>,
}

impl Tdc8hqHeader {
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

        let number_of_cards = cursor.read_i32()?;
        if !(0..=MAX_TDC8HQ_CARDS).contains(&number_of_cards) {
            return Err(LmfError::HeaderRead(format!(
                "invalid number of TDC8HQ cards {number_of_cards}"
            )));
        }
        let mut header = Self {
            driver_version: cursor.read_i32()?,
            trigger_channel: cursor.read_i32()?,
            trigger_edge: cursor.read_i32()?,
            grouping_enable: read_bool(cursor)?,
            group_range_start: cursor.read_f64()?,
            group_range_end: cursor.read_f64()?,
            trigger_dead_time: cursor.read_f64()?,
            rising_enable: cursor.read_u64()?,
            falling_enable: cursor.read_u64()?,
            ..Default::default()
        };
        for _ in 0..number_of_cards {
            header.cards.push(Tdc8hqCard {
                serial_number: cursor.read_i32()?,
                firmware_version: cursor.read_i32()?,
                channel_start: cursor.read_i32()?,
                channel_count: cursor.read_i32()?,
                resolution: cursor.read_f64()?,
            });
        }
        common.variable_event_length = cursor.read_i32()?;
        header.calibrations = read_calibrations(cursor)?;
        header.common = common;
        Ok(header)
    }
}
