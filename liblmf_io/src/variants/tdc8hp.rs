use std::io::{Read, Seek, Write};

use super::Layout;
use crate::calibration::TdcCalibration;
use crate::constants::*;
use crate::cstring::{read_counted_string, write_counted_string};
use crate::cursor::ByteCursor;
use crate::daq::{read_bool, DaqCommon, DecodeContext, EncodeContext, LimitWidth};
use crate::error::LmfError;

/// Base user header version implied by the DAQ version alone
fn base_user_header_version(daq_version: i32) -> i32 {
    if daq_version >= DAQ_VERSION_2008 {
        4
    } else if daq_version >= DAQ_VERSION_2007 {
        3
    } else if daq_version >= DAQ_VERSION_2006 {
        2
    } else if daq_version >= DAQ_VERSION_2002 {
        1
    } else {
        0
    }
}

/// User header version of a TDC8HP header. From version 1 on the LMF version stored in
/// the header can raise it to 5, 6 or 7.
pub fn user_header_version(daq_version: i32, lmf_version: i32) -> i32 {
    let base = base_user_header_version(daq_version);
    if base < 1 {
        return base;
    }
    match lmf_version {
        8 => 5,
        9 => 6,
        v if v >= 10 => 7,
        _ => base,
    }
}

/// User header of the TDC8HP (fixed records) and TDC8HPRAW (group mode) systems
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tdc8hpHeader {
    pub common: DaqCommon,
    pub user_header_version: i32,
    pub no_config_file_read: bool,
    pub rising_enable: u64,
    pub falling_enable: u64,
    pub trigger_edge: i32,
    pub trigger_channel: i32,
    pub output_level: bool,
    pub grouping_enable: bool,
    pub allow_overlap: bool,
    pub trigger_dead_time: f64,
    pub group_range_start: f64,
    pub group_range_end: f64,
    pub external_clock: bool,
    pub output_rollovers: bool,
    pub delay_taps: [i32; 4],
    pub inl_correction: bool,
    pub dnl_correction: bool,
    pub time_zero_offset: f64,
    pub bin_size_type: i32,
    pub config_file: String,
    pub inl_file: String,
    pub dnl_file: String,
    pub sync_validation_channel: i32,
    pub vhr_25ps: bool,
    pub group_timeout: f64,
    pub sse_enable: bool,
    pub mmx_enable: bool,
    pub dma_enable: bool,
    pub number_of_daq_loops: i32,
    pub driver_version: i32,
    pub trigger_channel_mask: i32,
    pub time_zero_channel: i32,
    pub calibrations: Vec<TdcCalibration>,
}

impl Tdc8hpHeader {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        layout: Layout,
    ) -> Result<Self, LmfError> {
        let mut common = DaqCommon::read_prefix(cursor)?;
        let mut header = Self {
            user_header_version: base_user_header_version(ctx.daq_version),
            ..Default::default()
        };
        if header.user_header_version >= 1 {
            common.lmf_version = cursor.read_i32()?;
            header.user_header_version = user_header_version(ctx.daq_version, common.lmf_version);
        }
        if header.user_header_version >= 5 {
            header.read_new_layout(cursor, ctx, layout, &mut common)?;
        } else {
            header.read_old_layout(cursor, ctx, layout, &mut common)?;
        }
        header.common = common;
        Ok(header)
    }

    fn read_old_layout<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        layout: Layout,
        common: &mut DaqCommon,
    ) -> Result<(), LmfError> {
        let uhv = self.user_header_version;
        common.time_reference = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        common.tdc_data_type = cursor.read_i32()?;
        common.read_limits(cursor, ctx, LimitWidth::I32)?;
        common.data_format = cursor.read_i32()?;
        self.no_config_file_read = cursor.read_i32()? != 0;
        self.rising_enable = cursor.read_i32()? as u32 as u64;
        self.falling_enable = cursor.read_i32()? as u32 as u64;
        self.trigger_edge = cursor.read_i32()?;
        self.trigger_channel = cursor.read_i32()?;
        self.output_level = cursor.read_i32()? != 0;
        self.grouping_enable = cursor.read_i32()? != 0;
        self.allow_overlap = cursor.read_i32()? != 0;
        self.trigger_dead_time = cursor.read_f64()?;
        self.group_range_start = cursor.read_f64()?;
        self.group_range_end = cursor.read_f64()?;
        self.external_clock = cursor.read_i32()? != 0;
        self.output_rollovers = cursor.read_i32()? != 0;
        for tap in self.delay_taps.iter_mut() {
            *tap = cursor.read_i32()?;
        }
        self.inl_correction = cursor.read_i32()? != 0;
        self.dnl_correction = cursor.read_i32()? != 0;
        if uhv >= 2 {
            self.time_zero_offset = cursor.read_f64()?;
            self.bin_size_type = cursor.read_i32()?;
        }
        if uhv >= 3 && layout != Layout::NoFileNames {
            self.config_file = read_counted_string(cursor)?;
            self.inl_file = read_counted_string(cursor)?;
            self.dnl_file = read_counted_string(cursor)?;
        }
        if uhv >= 4 {
            self.sync_validation_channel = cursor.read_i32()?;
            self.vhr_25ps = cursor.read_i32()? != 0;
        }
        Ok(())
    }

    fn read_new_layout<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        layout: Layout,
        common: &mut DaqCommon,
    ) -> Result<(), LmfError> {
        let uhv = self.user_header_version;
        common.read_source_strings(cursor, ctx, uhv >= 7)?;
        common.time_reference = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        common.tdc_data_type = cursor.read_i32()?;
        let width = if uhv >= 7 { LimitWidth::U64 } else { LimitWidth::I32 };
        common.read_limits(cursor, ctx, width)?;
        common.data_format = cursor.read_i32()?;
        self.no_config_file_read = read_bool(cursor)?;
        self.rising_enable = cursor.read_u64()?;
        self.falling_enable = cursor.read_u64()?;
        self.trigger_edge = cursor.read_i32()?;
        self.trigger_channel = cursor.read_i32()?;
        self.output_level = read_bool(cursor)?;
        self.grouping_enable = read_bool(cursor)?;
        self.allow_overlap = read_bool(cursor)?;
        self.trigger_dead_time = cursor.read_f64()?;
        self.group_range_start = cursor.read_f64()?;
        self.group_range_end = cursor.read_f64()?;
        self.external_clock = read_bool(cursor)?;
        self.output_rollovers = read_bool(cursor)?;
        for tap in self.delay_taps.iter_mut() {
            *tap = cursor.read_i32()?;
        }
        self.inl_correction = read_bool(cursor)?;
        self.dnl_correction = read_bool(cursor)?;
        self.time_zero_offset = cursor.read_f64()?;
        self.bin_size_type = cursor.read_i32()?;
        self.config_file = read_counted_string(cursor)?;
        self.inl_file = read_counted_string(cursor)?;
        self.dnl_file = read_counted_string(cursor)?;
        self.sync_validation_channel = cursor.read_i32()?;
        self.vhr_25ps = read_bool(cursor)?;
        self.group_timeout = cursor.read_f64()?;
        self.sse_enable = read_bool(cursor)?;
        self.mmx_enable = read_bool(cursor)?;
        self.dma_enable = read_bool(cursor)?;
        if uhv >= 6 {
            self.number_of_daq_loops = cursor.read_i32()?;
            self.driver_version = cursor.read_i32()?;
        }
        if uhv >= 7 {
            self.trigger_channel_mask = cursor.read_i32()?;
            self.time_zero_channel = cursor.read_i32()?;
        }
        common.variable_event_length = cursor.read_i32()?;
        if layout != Layout::NoCalibration {
            self.calibrations = read_calibrations(cursor)?;
        }
        Ok(())
    }

    pub fn write<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        ctx: &EncodeContext,
    ) -> Result<(), LmfError> {
        if ctx.daq_version < DAQ_VERSION_2008 {
            return Err(LmfError::WriteUnsupportedForDaqVersion(ctx.daq_version));
        }
        let common = &self.common;
        let uhv = user_header_version(ctx.daq_version, common.lmf_version);
        common.write_prefix(cursor)?;
        cursor.write_i32(common.lmf_version)?;
        if uhv >= 5 {
            self.write_new_layout(cursor, ctx, uhv)
        } else {
            self.write_old_layout(cursor)
        }
    }

    fn write_old_layout<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>) -> Result<(), LmfError> {
        let common = &self.common;
        cursor.write_i32(common.time_reference)?;
        cursor.write_f64(common.resolution)?;
        cursor.write_i32(common.tdc_data_type)?;
        common.write_limits(cursor, LimitWidth::I32)?;
        cursor.write_i32(common.data_format)?;
        cursor.write_i32(self.no_config_file_read as i32)?;
        cursor.write_i32(self.rising_enable as i32)?;
        cursor.write_i32(self.falling_enable as i32)?;
        cursor.write_i32(self.trigger_edge)?;
        cursor.write_i32(self.trigger_channel)?;
        cursor.write_i32(self.output_level as i32)?;
        cursor.write_i32(self.grouping_enable as i32)?;
        cursor.write_i32(self.allow_overlap as i32)?;
        cursor.write_f64(self.trigger_dead_time)?;
        cursor.write_f64(self.group_range_start)?;
        cursor.write_f64(self.group_range_end)?;
        cursor.write_i32(self.external_clock as i32)?;
        cursor.write_i32(self.output_rollovers as i32)?;
        for tap in self.delay_taps {
            cursor.write_i32(tap)?;
        }
        cursor.write_i32(self.inl_correction as i32)?;
        cursor.write_i32(self.dnl_correction as i32)?;
        // Writing is only possible from user header version 4 on
        cursor.write_f64(self.time_zero_offset)?;
        cursor.write_i32(self.bin_size_type)?;
        write_counted_string(cursor, &self.config_file)?;
        write_counted_string(cursor, &self.inl_file)?;
        write_counted_string(cursor, &self.dnl_file)?;
        cursor.write_i32(self.sync_validation_channel)?;
        cursor.write_i32(self.vhr_25ps as i32)?;
        Ok(())
    }

    fn write_new_layout<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        ctx: &EncodeContext,
        uhv: i32,
    ) -> Result<(), LmfError> {
        let common = &self.common;
        common.write_source_strings(cursor, ctx, uhv >= 7)?;
        cursor.write_i32(common.time_reference)?;
        cursor.write_f64(common.resolution)?;
        cursor.write_i32(common.tdc_data_type)?;
        let width = if uhv >= 7 { LimitWidth::U64 } else { LimitWidth::I32 };
        common.write_limits(cursor, width)?;
        cursor.write_i32(common.data_format)?;
        cursor.write_u8(self.no_config_file_read as u8)?;
        cursor.write_u64(self.rising_enable)?;
        cursor.write_u64(self.falling_enable)?;
        cursor.write_i32(self.trigger_edge)?;
        cursor.write_i32(self.trigger_channel)?;
        cursor.write_u8(self.output_level as u8)?;
        cursor.write_u8(self.grouping_enable as u8)?;
        cursor.write_u8(self.allow_overlap as u8)?;
        cursor.write_f64(self.trigger_dead_time)?;
        cursor.write_f64(self.group_range_start)?;
        cursor.write_f64(self.group_range_end)?;
        cursor.write_u8(self.external_clock as u8)?;
        cursor.write_u8(self.output_rollovers as u8)?;
        for tap in self.delay_taps {
            cursor.write_i32(tap)?;
        }
        cursor.write_u8(self.inl_correction as u8)?;
        cursor.write_u8(self.dnl_correction as u8)?;
        cursor.write_f64(self.time_zero_offset)?;
        cursor.write_i32(self.bin_size_type)?;
        write_counted_string(cursor, &self.config_file)?;
        write_counted_string(cursor, &self.inl_file)?;
        write_counted_string(cursor, &self.dnl_file)?;
        cursor.write_i32(self.sync_validation_channel)?;
        cursor.write_u8(self.vhr_25ps as u8)?;
        cursor.write_f64(self.group_timeout)?;
        cursor.write_u8(self.sse_enable as u8)?;
        cursor.write_u8(self.mmx_enable as u8)?;
        cursor.write_u8(self.dma_enable as u8)?;
        if uhv >= 6 {
            cursor.write_i32(self.number_of_daq_loops)?;
            cursor.write_i32(self.driver_version)?;
        }
        if uhv >= 7 {
            cursor.write_i32(self.trigger_channel_mask)?;
            cursor.write_i32(self.time_zero_channel)?;
        }
        cursor.write_i32(common.variable_event_length)?;
        write_calibrations(cursor, &self.calibrations)
    }
}

/// i32 block count followed by that many calibration blocks
pub fn read_calibrations<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
) -> Result<Vec<TdcCalibration>, LmfError> {
    let count = cursor.read_i32()?;
    if !(0..=MAX_CALIBRATION_BLOCKS as i32).contains(&count) {
        return Err(LmfError::HeaderRead(format!(
            "invalid number of TDC calibration blocks {count}"
        )));
    }
    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        blocks.push(TdcCalibration::read(cursor)?);
    }
    Ok(blocks)
}

pub fn write_calibrations<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    blocks: &[TdcCalibration],
) -> Result<(), LmfError> {
    let count = blocks.len().min(MAX_CALIBRATION_BLOCKS);
    cursor.write_i32(count as i32)?;
    for block in &blocks[..count] {
        block.write(cursor)?;
    }
    Ok(())
}
