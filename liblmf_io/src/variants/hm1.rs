use std::io::{Read, Seek, Write};

use super::Layout;
use crate::constants::*;
use crate::cursor::ByteCursor;
use crate::daq::{
    read_i32_array, write_i32_array, CardSettings, DaqCommon, DaqId, DecodeContext,
    EncodeContext, LimitWidth,
};
use crate::error::LmfError;

/// Size of the HM1_ABM parameter block in i32 words
pub const ABM_BLOCK_WORDS: usize = 24;

/// User header of the HM1 family (`HM1`, `HM1_ABM` and the dual module `2HM1`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hm1Header {
    pub common: DaqCommon,
    pub system_timeout: i32,
    pub fak_dll_value: i32,
    pub resolution_flag: i32,
    pub trigger_mode_for_start: i32,
    pub trigger_mode_for_stop: i32,
    pub even_open_time: i32,
    pub auto_trigger: i32,
    pub set_bits_for_gp1: i32,
    pub abm: [i32; ABM_BLOCK_WORDS],
    pub second_module: CardSettings,
    pub use_normal_method: i32,
}

impl Hm1Header {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        layout: Layout,
    ) -> Result<Self, LmfError> {
        let mut common = DaqCommon::read_prefix(cursor)?;
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            common.lmf_version = cursor.read_i32()?;
        }
        common.read_source_strings(cursor, ctx, ctx.daq_version >= DAQ_VERSION_20110208)?;
        let mut header = Self {
            system_timeout: cursor.read_i32()?,
            ..Default::default()
        };
        common.time_reference = cursor.read_i32()?;
        header.fak_dll_value = cursor.read_i32()?;
        header.resolution_flag = cursor.read_i32()?;
        header.trigger_mode_for_start = cursor.read_i32()?;
        header.trigger_mode_for_stop = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            common.tdc_data_type = cursor.read_i32()?;
        }
        common.read_limits(cursor, ctx, LimitWidth::for_lmf_version(common.lmf_version))?;
        common.data_format = cursor.read_i32()?;
        header.even_open_time = cursor.read_i32()?;
        header.auto_trigger = cursor.read_i32()?;
        header.set_bits_for_gp1 = cursor.read_i32()?;
        match ctx.daq_id {
            DaqId::Hm1Abm => header.abm = read_i32_array(cursor)?,
            DaqId::DualHm1 => header.second_module = CardSettings::read(cursor)?,
            _ => (),
        }
        if ctx.daq_version >= DAQ_VERSION_20080507 && layout != Layout::NoNormalMethod {
            header.use_normal_method = cursor.read_i32()?;
        }
        if common.lmf_version >= 9 {
            common.variable_event_length = cursor.read_i32()?;
        }
        header.common = common;
        Ok(header)
    }

    pub fn write<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        ctx: &EncodeContext,
    ) -> Result<(), LmfError> {
        let common = &self.common;
        common.write_prefix(cursor)?;
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            cursor.write_i32(common.lmf_version)?;
        }
        common.write_source_strings(cursor, ctx, ctx.daq_version >= DAQ_VERSION_20110208)?;
        cursor.write_i32(self.system_timeout)?;
        cursor.write_i32(common.time_reference)?;
        cursor.write_i32(self.fak_dll_value)?;
        cursor.write_i32(self.resolution_flag)?;
        cursor.write_i32(self.trigger_mode_for_start)?;
        cursor.write_i32(self.trigger_mode_for_stop)?;
        cursor.write_f64(common.resolution)?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            cursor.write_i32(common.tdc_data_type)?;
        }
        common.write_limits(cursor, LimitWidth::for_lmf_version(common.lmf_version))?;
        cursor.write_i32(common.data_format)?;
        cursor.write_i32(self.even_open_time)?;
        cursor.write_i32(self.auto_trigger)?;
        cursor.write_i32(self.set_bits_for_gp1)?;
        match ctx.daq_id {
            DaqId::Hm1Abm => write_i32_array(cursor, &self.abm)?,
            DaqId::DualHm1 => self.second_module.write(cursor)?,
            _ => (),
        }
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            cursor.write_i32(self.use_normal_method)?;
        }
        if common.lmf_version >= 9 {
            cursor.write_i32(common.variable_event_length)?;
        }
        Ok(())
    }

    /// HM1_ABM files of DAQ version 20080507 declare an oversized user header
    pub fn is_known_exception(&self, ctx: &DecodeContext) -> bool {
        ctx.daq_id == DaqId::Hm1Abm
            && ctx.daq_version == DAQ_VERSION_20080507
            && ctx.user_header_size > HM1_ABM_OVERSIZED_USER_HEADER
    }
}
