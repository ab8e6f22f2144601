use std::io::{Read, Seek, Write};

use super::constants::CALIBRATION_TABLE_SIZE;
use super::cursor::ByteCursor;

/// Per-TDC calibration data stored in TDC8HP and TDC8HQ headers
#[derive(Debug, Clone, PartialEq)]
pub struct TdcCalibration {
    pub index: i32,
    pub channel_count: i32,
    pub channel_start: i32,
    pub high_res_channel_count: i32,
    pub high_res_channel_start: i32,
    pub low_res_channel_count: i32,
    pub low_res_channel_start: i32,
    pub resolution: f64,
    pub serial_number: i32,
    pub version: i32,
    pub fifo_size: i32,
    pub inl_correction: Vec<i32>,
    pub dnl_data: Vec<u16>,
    pub flash_valid: bool,
}

impl Default for TdcCalibration {
    fn default() -> Self {
        Self {
            index: 0,
            channel_count: 0,
            channel_start: 0,
            high_res_channel_count: 0,
            high_res_channel_start: 0,
            low_res_channel_count: 0,
            low_res_channel_start: 0,
            resolution: 0.0,
            serial_number: 0,
            version: 0,
            fifo_size: 0,
            inl_correction: vec![0; CALIBRATION_TABLE_SIZE],
            dnl_data: vec![0; CALIBRATION_TABLE_SIZE],
            flash_valid: false,
        }
    }
}

impl TdcCalibration {
    /// Encoded size of one block in bytes
    pub const SIZE: u64 = 7 * 4 + 8 + 3 * 4 + CALIBRATION_TABLE_SIZE as u64 * 6 + 1;

    pub fn read<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<Self> {
        let mut block = Self {
            index: cursor.read_i32()?,
            channel_count: cursor.read_i32()?,
            channel_start: cursor.read_i32()?,
            high_res_channel_count: cursor.read_i32()?,
            high_res_channel_start: cursor.read_i32()?,
            low_res_channel_count: cursor.read_i32()?,
            low_res_channel_start: cursor.read_i32()?,
            resolution: cursor.read_f64()?,
            serial_number: cursor.read_i32()?,
            version: cursor.read_i32()?,
            fifo_size: cursor.read_i32()?,
            ..Default::default()
        };
        for value in block.inl_correction.iter_mut() {
            *value = cursor.read_i32()?;
        }
        for value in block.dnl_data.iter_mut() {
            *value = cursor.read_u16()?;
        }
        block.flash_valid = cursor.read_u8()? != 0;
        Ok(block)
    }

    pub fn write<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>) -> std::io::Result<()> {
        cursor.write_i32(self.index)?;
        cursor.write_i32(self.channel_count)?;
        cursor.write_i32(self.channel_start)?;
        cursor.write_i32(self.high_res_channel_count)?;
        cursor.write_i32(self.high_res_channel_start)?;
        cursor.write_i32(self.low_res_channel_count)?;
        cursor.write_i32(self.low_res_channel_start)?;
        cursor.write_f64(self.resolution)?;
        cursor.write_i32(self.serial_number)?;
        cursor.write_i32(self.version)?;
        cursor.write_i32(self.fifo_size)?;
        // Tables always hold exactly CALIBRATION_TABLE_SIZE entries on disk
        for idx in 0..CALIBRATION_TABLE_SIZE {
            cursor.write_i32(self.inl_correction.get(idx).copied().unwrap_or(0))?;
        }
        for idx in 0..CALIBRATION_TABLE_SIZE {
            cursor.write_u16(self.dnl_data.get(idx).copied().unwrap_or(0))?;
        }
        cursor.write_u8(self.flash_valid as u8)
    }
}
