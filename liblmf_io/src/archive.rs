use std::io::{Read, Seek, Write};

use super::constants::*;
use super::cstring::{read_cstring, read_string_array, write_cstring, write_string_array};
use super::cursor::ByteCursor;
use super::daq::{bytes_per_datum, ArchiveEra, DaqId};
use super::error::LmfError;

/// The outer (archive) header of a Cobold list mode file plus the fixed user header
/// preamble that names the acquisition system.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub era: ArchiveEra,
    pub daq_source_flag: bool,
    pub dan_source_flag: bool,
    pub ccf_history_flag: bool,
    pub data_format: i32,
    pub number_of_coordinates: u64,
    pub header_size: u64,
    pub user_header_size: u64,
    pub number_of_events: u64,
    /// Unix seconds
    pub start_time: i64,
    pub stop_time: i64,
    pub version_string: String,
    pub file_path: String,
    pub comment: String,
    pub ccf_history_strings: Vec<String>,
    pub dan_source_strings: Vec<String>,
    pub lmf_header_version: u32,
    pub daq_version: i32,
    pub daq_id: DaqId,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            era: ArchiveEra::Era2008,
            daq_source_flag: false,
            dan_source_flag: false,
            ccf_history_flag: false,
            data_format: LM_SLONG,
            number_of_coordinates: 0,
            header_size: 0,
            user_header_size: 0,
            number_of_events: 0,
            start_time: 0,
            stop_time: 0,
            version_string: String::new(),
            file_path: String::new(),
            comment: String::new(),
            ccf_history_strings: Vec::new(),
            dan_source_strings: Vec::new(),
            lmf_header_version: ARCHIVE_MARKER_2008,
            daq_version: DAQ_VERSION_2008,
            daq_id: DaqId::Tdc8,
        }
    }
}

impl FileHeader {
    /// First archive word: era marker OR'd with the string-block flags
    pub fn archive_flag(&self) -> u32 {
        let mut flag = self.era.marker();
        if self.daq_source_flag {
            flag |= DAQ_SOURCE_CODE;
        }
        if self.dan_source_flag {
            flag |= DAN_SOURCE_CODE;
        }
        if self.ccf_history_flag {
            flag |= CCF_HISTORY_CODE;
        }
        flag
    }

    /// Offset of the first event record
    pub fn events_start(&self) -> u64 {
        self.header_size + self.user_header_size
    }

    /// Read the archive part of the header.
    ///
    /// Returns `Ok(None)` with the cursor rewound to the start when the first word is not a
    /// Cobold archive marker.
    pub fn read_archive<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
    ) -> Result<Option<Self>, LmfError> {
        let flag = cursor.read_u32()?;
        let era = match ArchiveEra::from_marker(flag & ARCHIVE_MARKER_MASK) {
            Some(era) => era,
            None => {
                cursor.seek(0)?;
                return Ok(None);
            }
        };
        let wide = era.wide();
        let mut header = Self {
            era,
            daq_source_flag: flag & DAQ_SOURCE_CODE != 0,
            dan_source_flag: flag & DAN_SOURCE_CODE != 0,
            ccf_history_flag: flag & CCF_HISTORY_CODE != 0,
            ..Default::default()
        };
        header.data_format = cursor.read_i32()?;
        if bytes_per_datum(header.data_format).is_none() {
            return Err(LmfError::UnsupportedSource(format!(
                "data format {}",
                header.data_format
            )));
        }
        header.number_of_coordinates = cursor.read_size(wide)?;
        header.header_size = cursor.read_size(wide)?;
        header.user_header_size = cursor.read_size(wide)?;
        header.number_of_events = cursor.read_size(wide)?;
        (header.start_time, header.stop_time) = read_time_pair(cursor)?;
        header.version_string = read_cstring(cursor)?;
        header.file_path = read_cstring(cursor)?;
        header.comment = read_cstring(cursor)?;
        if header.ccf_history_flag {
            header.ccf_history_strings = read_string_array(cursor)?;
        }
        if header.dan_source_flag {
            header.dan_source_strings = read_string_array(cursor)?;
        }
        if cursor.tell() != header.header_size {
            return Err(LmfError::HeaderRead(format!(
                "archive header ends at {} but declares {} bytes",
                cursor.tell(),
                header.header_size
            )));
        }
        Ok(Some(header))
    }

    /// Read the fields at the start of the user header. The cursor must be at `header_size`.
    pub fn read_user_preamble<T: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<T>,
    ) -> Result<(), LmfError> {
        if self.era.wide() {
            self.lmf_header_version = cursor.read_u32()?;
        }
        let repeated = cursor.read_size(self.era.wide())?;
        if repeated != self.user_header_size {
            return Err(LmfError::HeaderRead(format!(
                "user header size {repeated} does not match declared {}",
                self.user_header_size
            )));
        }
        self.daq_version = cursor.read_i32()?;
        self.daq_id = DaqId::try_from(cursor.read_i32()?)?;
        if self.daq_id.is_non_cobold() {
            return Err(LmfError::UnsupportedSource(format!(
                "{} inside a Cobold archive",
                self.daq_id
            )));
        }
        Ok(())
    }

    pub fn write_archive<T: Write + Seek>(&self, cursor: &mut ByteCursor<T>) -> std::io::Result<()> {
        let wide = self.era.wide();
        cursor.write_u32(self.archive_flag())?;
        cursor.write_i32(self.data_format)?;
        cursor.write_size(self.number_of_coordinates, wide)?;
        cursor.write_size(self.header_size, wide)?;
        cursor.write_size(self.user_header_size, wide)?;
        cursor.write_size(self.number_of_events, wide)?;
        write_time_pair(cursor, self.start_time, self.stop_time, wide)?;
        write_cstring(cursor, &self.version_string)?;
        write_cstring(cursor, &self.file_path)?;
        write_cstring(cursor, &self.comment)?;
        if self.ccf_history_flag {
            write_string_array(cursor, &self.ccf_history_strings)?;
        }
        if self.dan_source_flag {
            write_string_array(cursor, &self.dan_source_strings)?;
        }
        Ok(())
    }

    pub fn write_user_preamble<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
    ) -> std::io::Result<()> {
        if self.era.wide() {
            cursor.write_u32(self.lmf_header_version)?;
        }
        cursor.write_size(self.user_header_size, self.era.wide())?;
        cursor.write_i32(self.daq_version)?;
        cursor.write_i32(self.daq_id.code())
    }
}

/// Start and stop time. A leading CTime sentinel selects the 64-bit layout, anything
/// else is rewound and read as two plain u32 second counts.
fn read_time_pair<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<(i64, i64)> {
    let time_position = cursor.tell();
    let first_word = cursor.read_u32()?;
    if first_word == CTIME_SENTINEL {
        let start = read_ctime_body(cursor)?;
        cursor.read_u32()?;
        let stop = read_ctime_body(cursor)?;
        Ok((start, stop))
    } else {
        cursor.seek(time_position)?;
        let start = cursor.read_u32()? as i64;
        let stop = cursor.read_u32()? as i64;
        Ok((start, stop))
    }
}

fn read_ctime_body<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<i64> {
    let low = cursor.read_u32()? as u64;
    let high = cursor.read_u32()? as u64;
    Ok(((high << 32) | low) as i64)
}

fn write_time_pair<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    start: i64,
    stop: i64,
    ctime: bool,
) -> std::io::Result<()> {
    if ctime {
        for time in [start, stop] {
            let bits = time as u64;
            cursor.write_u32(CTIME_SENTINEL)?;
            cursor.write_u32(bits as u32)?;
            cursor.write_u32((bits >> 32) as u32)?;
        }
        Ok(())
    } else {
        cursor.write_u32(start as u32)?;
        cursor.write_u32(stop as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(header: &FileHeader) -> Vec<u8> {
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        header.write_archive(&mut cursor).unwrap();
        cursor.into_inner().into_inner()
    }

    #[test]
    fn test_archive_both_eras() {
        for era in [ArchiveEra::Era2002, ArchiveEra::Era2008] {
            let mut header = FileHeader {
                era,
                ccf_history_flag: true,
                number_of_coordinates: 12,
                number_of_events: 3,
                start_time: 1_200_000_000,
                stop_time: 1_200_000_060,
                comment: String::from("calibration run"),
                ccf_history_strings: vec![String::from("a"), String::from("bc")],
                ..Default::default()
            };
            header.header_size = encode(&header).len() as u64;
            let bytes = encode(&header);
            let mut cursor = ByteCursor::new(Cursor::new(bytes));
            let decoded = FileHeader::read_archive(&mut cursor).unwrap().unwrap();
            assert_eq!(decoded.era, era);
            assert_eq!(decoded.start_time, header.start_time);
            assert_eq!(decoded.stop_time, header.stop_time);
            assert_eq!(decoded.comment, header.comment);
            assert_eq!(decoded.ccf_history_strings, header.ccf_history_strings);
            assert!(!decoded.dan_source_flag);
        }
    }

    #[test]
    fn test_non_cobold_rewinds() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&101i32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        assert!(FileHeader::read_archive(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.tell(), 0);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let header = FileHeader {
            data_format: 7,
            ..Default::default()
        };
        let mut cursor = ByteCursor::new(Cursor::new(encode(&header)));
        assert_eq!(
            FileHeader::read_archive(&mut cursor).unwrap_err().code(),
            6
        );
    }

    #[test]
    fn test_wrong_header_size() {
        let header = FileHeader {
            era: ArchiveEra::Era2002,
            header_size: 3,
            ..Default::default()
        };
        let mut cursor = ByteCursor::new(Cursor::new(encode(&header)));
        assert_eq!(
            FileHeader::read_archive(&mut cursor).unwrap_err().code(),
            5
        );
    }
}
