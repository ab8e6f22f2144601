use std::io::{Read, Seek, Write};

use super::Layout;
use crate::constants::*;
use crate::cursor::ByteCursor;
use crate::daq::{CardSettings, DaqCommon, DaqId, DecodeContext, EncodeContext, LimitWidth};
use crate::error::LmfError;

/// User header of the TDC8PCI2 family (single card `TDC8` and dual card `2TDC8`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tdc8Pci2Header {
    pub common: DaqCommon,
    pub system_timeout: i32,
    pub common_mode: i32,
    pub module_2nd: i32,
    pub cards: [CardSettings; 2],
    pub sync_test_on_off: i32,
    pub io_address_2nd: i32,
    pub use_normal_method: i32,
    pub use_normal_method_2nd: i32,
}

impl Tdc8Pci2Header {
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
        header.common_mode = cursor.read_i32()?;
        common.resolution = cursor.read_f64()?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            common.tdc_data_type = cursor.read_i32()?;
        }
        common.read_limits(cursor, ctx, LimitWidth::for_lmf_version(common.lmf_version))?;
        common.data_format = cursor.read_i32()?;
        header.module_2nd = cursor.read_i32()?;

        let dual = ctx.daq_id == DaqId::DualTdc8;
        let card_blocks = ctx.daq_version >= DAQ_VERSION_2002 && layout != Layout::NoCardBlock;
        if card_blocks {
            header.cards[0] = CardSettings::read(cursor)?;
            if dual && layout != Layout::FirstCardOnly {
                header.sync_test_on_off = cursor.read_i32()?;
                header.io_address_2nd = cursor.read_i32()?;
                header.cards[1] = CardSettings::read(cursor)?;
            }
        }
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            header.use_normal_method = cursor.read_i32()?;
            if dual && layout == Layout::Standard {
                header.use_normal_method_2nd = cursor.read_i32()?;
            }
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
        cursor.write_i32(self.common_mode)?;
        cursor.write_f64(common.resolution)?;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            cursor.write_i32(common.tdc_data_type)?;
        }
        common.write_limits(cursor, LimitWidth::for_lmf_version(common.lmf_version))?;
        cursor.write_i32(common.data_format)?;
        cursor.write_i32(self.module_2nd)?;

        let dual = ctx.daq_id == DaqId::DualTdc8;
        if ctx.daq_version >= DAQ_VERSION_2002 {
            self.cards[0].write(cursor)?;
            if dual {
                cursor.write_i32(self.sync_test_on_off)?;
                cursor.write_i32(self.io_address_2nd)?;
                self.cards[1].write(cursor)?;
            }
        }
        if ctx.daq_version >= DAQ_VERSION_20080507 {
            cursor.write_i32(self.use_normal_method)?;
            if dual {
                cursor.write_i32(self.use_normal_method_2nd)?;
            }
        }
        if common.lmf_version >= 9 {
            cursor.write_i32(common.variable_event_length)?;
        }
        Ok(())
    }

    /// Old acquisition software wrote LMF version 8 single card headers with a size that
    /// does not match their content.
    pub fn is_known_exception(&self, ctx: &DecodeContext) -> bool {
        ctx.daq_id == DaqId::Tdc8 && self.common.lmf_version == TDC8_TOLERATED_LMF_VERSION
    }
}
