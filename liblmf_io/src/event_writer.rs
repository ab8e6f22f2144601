use std::io::{Cursor, Seek, Write};

use super::constants::*;
use super::cursor::ByteCursor;
use super::error::LmfError;
use super::parameters::ParameterTable;
use super::record::{EventLayout, RecordFormat, ValueWidth};

/// Hit values handed to a typed write call, laid out as `channel * stride + hit`
#[derive(Debug, Clone, Copy)]
pub enum TdcValues<'a> {
    I32(&'a [i32]),
    I64(&'a [i64]),
    F64(&'a [f64]),
    U16(&'a [u16]),
}

impl TdcValues<'_> {
    /// Integer and double rendition of one slot, zero past the end of the slice
    fn get(&self, index: usize) -> (i64, f64) {
        match self {
            Self::I32(v) => v.get(index).map_or((0, 0.0), |x| (*x as i64, *x as f64)),
            Self::I64(v) => v.get(index).map_or((0, 0.0), |x| (*x, *x as f64)),
            Self::F64(v) => v.get(index).map_or((0, 0.0), |x| (*x as i64, *x)),
            Self::U16(v) => v.get(index).map_or((0, 0.0), |x| (*x as i64, *x as f64)),
        }
    }
}

/// One event as handed to the session by the typed write calls
#[derive(Debug, Clone, Copy)]
pub struct TdcEvent<'a> {
    pub timestamp: u64,
    pub counts: &'a [u32],
    pub values: TdcValues<'a>,
    /// Hits per channel in `values`, the session capacity
    pub stride: usize,
}

impl TdcEvent<'_> {
    /// Hits of a channel clipped to what the record and the value array can hold
    fn count(&self, channel: usize, max_hits: usize) -> usize {
        let count = self.counts.get(channel).copied().unwrap_or(0) as usize;
        count.min(max_hits).min(self.stride)
    }

    fn value(&self, channel: usize, hit: usize) -> (i64, f64) {
        self.values.get(channel * self.stride + hit)
    }
}

fn write_value<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    width: ValueWidth,
    (int, double): (i64, f64),
) -> std::io::Result<()> {
    match width {
        ValueWidth::U16 => cursor.write_u16(int as u16),
        ValueWidth::U32 => cursor.write_u32(int as u32),
        ValueWidth::I32 => cursor.write_i32(int as i32),
        ValueWidth::I64 => cursor.write_i64(int),
        ValueWidth::F64 => cursor.write_f64(double),
    }
}

fn write_timestamp<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    words: u32,
    timestamp: u64,
) -> std::io::Result<()> {
    match words {
        0 => Ok(()),
        1 => cursor.write_u32(timestamp as u32),
        _ => cursor.write_u64(timestamp),
    }
}

fn write_trailer<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    parameters: &mut ParameterTable,
    post_event: &[u8],
) -> std::io::Result<()> {
    if format.changed_mask {
        parameters.write_changes(cursor)?;
    }
    if format.post_event {
        cursor.write_u32(post_event.len() as u32)?;
        cursor.write_bytes(post_event)?;
    }
    Ok(())
}

/// Encode a TDC event as a fixed or a variable length record
pub fn write_tdc_event<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    event_counter: u64,
    event: &TdcEvent,
    parameters: &mut ParameterTable,
    post_event: &[u8],
) -> Result<(), LmfError> {
    match format.layout {
        EventLayout::Fixed(width) => {
            write_timestamp(cursor, format.timestamp_words, event.timestamp)?;
            for channel in 0..format.number_of_channels {
                let count = event.count(channel, format.max_hits);
                write_value(cursor, width, (count as i64, count as f64))?;
                for hit in 0..format.max_hits {
                    let value = if hit < count {
                        event.value(channel, hit)
                    } else {
                        (0, 0.0)
                    };
                    write_value(cursor, width, value)?;
                }
            }
            Ok(())
        }
        EventLayout::Variable { count, value } => {
            let mut record = ByteCursor::new(Cursor::new(Vec::new()));
            record.write_u64(EVENT_MARKER)?;
            record.write_u64(event_counter)?;
            write_timestamp(&mut record, format.timestamp_words, event.timestamp)?;
            for channel in 0..format.number_of_channels {
                let hits = event.count(channel, format.max_hits);
                write_value(&mut record, count, (hits as i64, hits as f64))?;
                for hit in 0..hits {
                    write_value(&mut record, value, event.value(channel, hit))?;
                }
            }
            write_trailer(&mut record, format, parameters, post_event)?;
            let length = record.tell();
            record.seek(0)?;
            record.write_u64(EVENT_MARKER | (length & EVENT_LENGTH_MASK))?;
            cursor.write_bytes(record.get_ref().get_ref())?;
            Ok(())
        }
        EventLayout::Camac => Err(LmfError::WrongReadFunctionForCamac),
        layout => Err(LmfError::UnsupportedSource(format!(
            "TDC events cannot be written as {layout:?} records"
        ))),
    }
}

/// Encode a CAMAC record: timestamp and exactly `number_of_coordinates` values
pub fn write_camac_record<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    timestamp: u64,
    values: &[u32],
) -> Result<(), LmfError> {
    if format.layout != EventLayout::Camac {
        return Err(LmfError::WrongReadFunctionForCamac);
    }
    write_timestamp(cursor, format.timestamp_words, timestamp)?;
    for index in 0..format.number_of_coordinates as usize {
        cursor.write_u32(values.get(index).copied().unwrap_or(0))?;
    }
    Ok(())
}

/// Encode a RAW32BIT record
pub fn write_raw32_record<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    words: &[u32],
) -> Result<(), LmfError> {
    if format.layout != EventLayout::Raw32 {
        return Err(LmfError::UnsupportedSource(format!(
            "raw words cannot be written as {:?} records",
            format.layout
        )));
    }
    cursor.write_u32(words.len() as u32)?;
    for word in words {
        cursor.write_u32(*word)?;
    }
    Ok(())
}

/// Encode a TDC8HP group mode record
pub fn write_raw_group_record<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    words: &[u32],
    parameters: &mut ParameterTable,
    post_event: &[u8],
) -> Result<(), LmfError> {
    if format.layout != EventLayout::RawGroup {
        return Err(LmfError::UnsupportedSource(format!(
            "group mode words cannot be written as {:?} records",
            format.layout
        )));
    }
    cursor.write_u32(words.len() as u32)?;
    for word in words {
        cursor.write_u32(*word)?;
    }
    write_trailer(cursor, format, parameters, post_event)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventData;
    use crate::event_reader::read_event;
    use crate::group_mode::GroupDecoder;

    fn format(layout: EventLayout, channels: usize, hits: usize) -> RecordFormat {
        RecordFormat {
            layout,
            timestamp_words: 2,
            number_of_channels: channels,
            max_hits: hits,
            number_of_coordinates: (channels * (1 + hits)) as u64,
            changed_mask: false,
            post_event: false,
        }
    }

    #[test]
    fn test_fixed_record_clips_and_pads() {
        let format = format(EventLayout::Fixed(ValueWidth::U16), 2, 2);
        let counts = [3u32, 1];
        let values = [1i32, 2, 3, 9, 4, 0, 0, 0];
        let event = TdcEvent {
            timestamp: 7,
            counts: &counts,
            values: TdcValues::I32(&values),
            stride: 4,
        };
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        let mut parameters = ParameterTable::default();
        write_tdc_event(&mut cursor, &format, 0, &event, &mut parameters, &[]).unwrap();
        assert_eq!(cursor.tell(), format.fixed_record_size().unwrap());
        let bytes = cursor.into_inner().into_inner();
        let words: Vec<u16> = bytes[8..]
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(words, vec![2, 1, 2, 1, 4, 0]);
    }

    #[test]
    fn test_variable_record_is_read_back() {
        let mut format = format(
            EventLayout::Variable {
                count: ValueWidth::U16,
                value: ValueWidth::F64,
            },
            2,
            4,
        );
        format.changed_mask = true;
        format.post_event = true;
        let counts = [1u32, 2];
        let values = [0.5f64, 0.0, 1.5, 2.5];
        let event = TdcEvent {
            timestamp: 99,
            counts: &counts,
            values: TdcValues::F64(&values),
            stride: 2,
        };
        let mut parameters = ParameterTable::default();
        parameters.set(905, 3.0);
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        write_tdc_event(&mut cursor, &format, 11, &event, &mut parameters, b"tail").unwrap();
        let bytes = cursor.into_inner().into_inner();
        let length = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        assert_eq!(length, EVENT_MARKER | bytes.len() as u64);

        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let mut read_back = EventData::new(2, 4);
        let mut read_parameters = ParameterTable::default();
        read_event(
            &mut cursor,
            &format,
            0,
            &mut read_back,
            &mut read_parameters,
            &mut GroupDecoder::default(),
        )
        .unwrap();
        assert_eq!(read_back.event_counter, 11);
        assert_eq!(read_back.timestamp, 99);
        assert_eq!(read_back.hits.doubles(1).to_vec(), vec![1.5, 2.5]);
        assert_eq!(read_back.post_event_data, b"tail".to_vec());
        assert_eq!(read_parameters.get(905), Some(3.0));
    }

    #[test]
    fn test_wrong_write_function() {
        let camac = format(EventLayout::Camac, 0, 0);
        let event = TdcEvent {
            timestamp: 0,
            counts: &[],
            values: TdcValues::I32(&[]),
            stride: 1,
        };
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        let mut parameters = ParameterTable::default();
        let result = write_tdc_event(&mut cursor, &camac, 0, &event, &mut parameters, &[]);
        assert!(matches!(result, Err(LmfError::WrongReadFunctionForCamac)));
        let fixed = format(EventLayout::Fixed(ValueWidth::I32), 1, 1);
        let result = write_camac_record(&mut cursor, &fixed, 0, &[1]);
        assert_eq!(result.unwrap_err().code(), 12);
        let result = write_raw32_record(&mut cursor, &fixed, &[1]);
        assert_eq!(result.unwrap_err().code(), 6);
    }
}
