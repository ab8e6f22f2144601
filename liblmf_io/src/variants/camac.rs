use std::io::{Read, Seek, Write};

use crate::constants::*;
use crate::cursor::ByteCursor;
use crate::daq::{DaqCommon, DecodeContext, EncodeContext};
use crate::error::LmfError;

/// User header of CAMAC based acquisition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CamacHeader {
    pub common: DaqCommon,
    pub system_timeout: i32,
    pub camac_cif_version: i32,
}

impl CamacHeader {
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
        let camac_cif_version = cursor.read_i32()?;
        common.data_format = cursor.read_i32()?;
        if common.data_format != LM_CAMAC {
            return Err(LmfError::HeaderRead(format!(
                "CAMAC header with data format {}",
                common.data_format
            )));
        }
        Ok(Self {
            common,
            system_timeout,
            camac_cif_version,
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
        cursor.write_i32(self.camac_cif_version)?;
        cursor.write_i32(LM_CAMAC)?;
        Ok(())
    }
}
