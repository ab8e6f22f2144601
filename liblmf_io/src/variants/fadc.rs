//! Headers of the fADC4 and fADC8 waveform digitizers. Both are read only.
use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::daq::{read_bool, read_i32_array, DaqCommon, DecodeContext, LimitWidth};
use crate::error::LmfError;

pub const MAX_FADC4_MODULES: i32 = 2;
pub const MAX_FADC8_MODULES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fadc4Module {
    pub serial_number: i32,
    pub sample_bits: i32,
    pub sample_rate: f64,
    pub trigger_mode: i32,
    pub thresholds: [i32; 4],
    pub dc_offsets: [i32; 4],
    pub presamples: i32,
    pub packet_length: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fadc4Header {
    pub common: DaqCommon,
    pub driver_version: i32,
    pub modules: Vec<Fadc4Module>,
}

/// Shared start of both fADC headers, up to the data format
fn read_adc_common<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    ctx: &DecodeContext,
) -> Result<DaqCommon, LmfError> {
    let mut common = DaqCommon::read_prefix(cursor)?;
    common.lmf_version = cursor.read_i32()?;
    common.read_source_strings(cursor, ctx, true)?;
    common.time_reference = cursor.read_i32()?;
    common.resolution = cursor.read_f64()?;
    common.tdc_data_type = cursor.read_i32()?;
    common.read_limits(cursor, ctx, LimitWidth::U64)?;
    common.data_format = cursor.read_i32()?;
    // Waveform records always carry their own length
    common.variable_event_length = 1;
    Ok(common)
}

fn read_module_count<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    max: i32,
) -> Result<i32, LmfError> {
    let count = cursor.read_i32()?;
    if !(0..=max).contains(&count) {
        return Err(LmfError::HeaderRead(format!(
            "invalid number of ADC modules {count}"
        )));
    }
    Ok(count)
}

impl Fadc4Header {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
    ) -> Result<Self, LmfError> {
        let common = read_adc_common(cursor, ctx)?;
        let driver_version = cursor.read_i32()?;
        let count = read_module_count(cursor, MAX_FADC4_MODULES)?;
        let mut modules = Vec::new();
        for _ in 0..count {
            modules.push(Fadc4Module {
                serial_number: cursor.read_i32()?,
                sample_bits: cursor.read_i32()?,
                sample_rate: cursor.read_f64()?,
                trigger_mode: cursor.read_i32()?,
                thresholds: read_i32_array(cursor)?,
                dc_offsets: read_i32_array(cursor)?,
                presamples: cursor.read_i32()?,
                packet_length: cursor.read_i32()?,
            });
        }
        Ok(Self {
            common,
            driver_version,
            modules,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fadc8Module {
    pub serial_number: i32,
    pub trigger_channel: i32,
    pub presamples: i32,
    pub postsamples: i32,
    pub group_mode_enable: i32,
    pub group_range_start: f64,
    pub group_range_end: f64,
    pub threshold_greater_than: [i32; 8],
    pub threshold_less_than: [i32; 8],
    pub dc_offsets: [i32; 8],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fadc8Header {
    pub common: DaqCommon,
    pub driver_version: i32,
    pub number_of_daq_loops: i32,
    pub bool_parameters: Vec<bool>,
    pub i32_parameters: Vec<i32>,
    pub u32_parameters: Vec<u32>,
    pub f64_parameters: Vec<f64>,
    pub modules: Vec<Fadc8Module>,
}

/// Upper bound on the self-describing parameter arrays of an fADC8 header
const MAX_FADC8_PARAMETERS: u32 = 100_000;

fn read_parameter_count<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> Result<u32, LmfError> {
    let count = cursor.read_u32()?;
    if count > MAX_FADC8_PARAMETERS {
        return Err(LmfError::HeaderRead(format!(
            "implausible fADC8 parameter count {count}"
        )));
    }
    Ok(count)
}

impl Fadc8Header {
    pub fn read<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
    ) -> Result<Self, LmfError> {
        let common = read_adc_common(cursor, ctx)?;
        let mut header = Self {
            driver_version: cursor.read_i32()?,
            number_of_daq_loops: cursor.read_i32()?,
            ..Default::default()
        };
        for _ in 0..read_parameter_count(cursor)? {
            header.bool_parameters.push(read_bool(cursor)?);
        }
        for _ in 0..read_parameter_count(cursor)? {
            header.i32_parameters.push(cursor.read_i32()?);
        }
        for _ in 0..read_parameter_count(cursor)? {
            header.u32_parameters.push(cursor.read_u32()?);
        }
        for _ in 0..read_parameter_count(cursor)? {
            header.f64_parameters.push(cursor.read_f64()?);
        }
        let count = read_module_count(cursor, MAX_FADC8_MODULES)?;
        for _ in 0..count {
            header.modules.push(Fadc8Module {
                serial_number: cursor.read_i32()?,
                trigger_channel: cursor.read_i32()?,
                presamples: cursor.read_i32()?,
                postsamples: cursor.read_i32()?,
                group_mode_enable: cursor.read_i32()?,
                group_range_start: cursor.read_f64()?,
                group_range_end: cursor.read_f64()?,
                threshold_greater_than: read_i32_array(cursor)?,
                threshold_less_than: read_i32_array(cursor)?,
                dc_offsets: read_i32_array(cursor)?,
            });
        }
        header.common = common;
        Ok(header)
    }
}
