use std::io::{Read, Seek, Write};

use crate::constants::*;
use crate::cursor::ByteCursor;
use crate::daq::{DaqCommon, DecodeContext, EncodeContext, LimitWidth};
use crate::error::LmfError;

/// User header of data relayed by the TCP/IP bridge
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TcpipHeader {
    pub common: DaqCommon,
    pub system_timeout: i32,
    pub common_mode: i32,
}

impl TcpipHeader {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
    ) -> Result<Self, LmfError> {
        let mut common = DaqCommon::read_prefix(cursor)?;
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            common.lmf_version = cursor.read_i32()?;
        }
        common.read_source_strings(cursor, ctx, ctx.daq_version >= DAQ_VERSION_20110208)?;
        let system_timeout = cursor.read_i32()?;
        common.time_reference = cursor.read_i32()?;
        let common_mode = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            common.tdc_data_type = cursor.read_i32()?;
        }
        common.read_limits(cursor, ctx, LimitWidth::for_lmf_version(common.lmf_version))?;
        common.data_format = cursor.read_i32()?;
        Ok(Self {
            common,
            system_timeout,
            common_mode,
        })
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
        cursor.write_i32(self.common_mode)?;
        cursor.write_f64(common.resolution)?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            cursor.write_i32(common.tdc_data_type)?;
        }
        common.write_limits(cursor, LimitWidth::for_lmf_version(common.lmf_version))?;
        cursor.write_i32(common.data_format)?;
        Ok(())
    }
}
