//! Decoding of single event records.
//!
//! Every reader distinguishes a clean end of storage (nothing left before the first byte of
//! a record, reported as [`LmfError::EndOfFile`]) from a record that stops part way
//! (reported as a timestamp or data read error).
use std::io::{Read, Seek};

use super::adc::AdcPacket;
use super::constants::*;
use super::cursor::ByteCursor;
use super::error::LmfError;
use super::event::{EventData, Truncation};
use super::group_mode::GroupDecoder;
use super::hit_array::{HitArray, HitPush};
use super::parameters::ParameterTable;
use super::record::{EventLayout, RecordFormat, ValueWidth};

/// Upper bound on word and packet counts of one record, guards against corrupt counts
const MAX_RECORD_ITEMS: u32 = 1 << 24;

/// A decoded count or hit value
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Int(i64),
    Double(f64),
}

impl Value {
    fn as_count(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Double(v) => v as i64,
        }
    }
}

fn read_value<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    width: ValueWidth,
) -> std::io::Result<Value> {
    Ok(match width {
        ValueWidth::U16 => Value::Int(cursor.read_u16()? as i64),
        ValueWidth::U32 => Value::Int(cursor.read_u32()? as i64),
        ValueWidth::I32 => Value::Int(cursor.read_i32()? as i64),
        ValueWidth::I64 => Value::Int(cursor.read_i64()?),
        ValueWidth::F64 => Value::Double(cursor.read_f64()?),
    })
}

/// Like [`read_value`] for the first field of a record. `Ok(None)` is a clean end.
fn read_leading_value<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    width: ValueWidth,
) -> std::io::Result<Option<Value>> {
    Ok(match width {
        ValueWidth::U16 => cursor
            .read_leading::<2>()?
            .map(|b| Value::Int(u16::from_le_bytes(b) as i64)),
        ValueWidth::U32 => cursor
            .read_leading::<4>()?
            .map(|b| Value::Int(u32::from_le_bytes(b) as i64)),
        ValueWidth::I32 => cursor
            .read_leading::<4>()?
            .map(|b| Value::Int(i32::from_le_bytes(b) as i64)),
        ValueWidth::I64 => cursor
            .read_leading::<8>()?
            .map(|b| Value::Int(i64::from_le_bytes(b))),
        ValueWidth::F64 => cursor
            .read_leading::<8>()?
            .map(|b| Value::Double(f64::from_le_bytes(b))),
    })
}

fn read_leading_u32<T: Read + Seek>(cursor: &mut ByteCursor<T>) -> std::io::Result<Option<u32>> {
    Ok(cursor.read_leading::<4>()?.map(u32::from_le_bytes))
}

fn read_timestamp<T: Read + Seek>(cursor: &mut ByteCursor<T>, words: u32) -> std::io::Result<u64> {
    match words {
        0 => Ok(0),
        1 => cursor.read_u32().map(u64::from),
        _ => cursor.read_u64(),
    }
}

fn read_leading_timestamp<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    words: u32,
) -> std::io::Result<Option<u64>> {
    Ok(match words {
        1 => read_leading_u32(cursor)?.map(u64::from),
        _ => cursor.read_leading::<8>()?.map(u64::from_le_bytes),
    })
}

fn data_error(event_number: u64) -> impl Fn(std::io::Error) -> LmfError {
    move |e| LmfError::DataRead(event_number, e.to_string())
}

fn push_value(hits: &mut HitArray, channel: usize, value: Value) -> HitPush {
    match value {
        Value::Int(v) => hits.push_int(channel, v),
        Value::Double(v) => hits.push_double(channel, v),
    }
}

/// Decode the next record into `event`.
///
/// Hits that do not fit the session capacity are dropped and reported in the returned
/// [`Truncation`]; the read itself still succeeds.
pub fn read_event<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    event_number: u64,
    event: &mut EventData,
    parameters: &mut ParameterTable,
    group: &mut GroupDecoder,
) -> Result<Truncation, LmfError> {
    event.clear();
    match format.layout {
        EventLayout::Fixed(width) => read_fixed(cursor, format, width, event_number, event),
        EventLayout::Variable { count, value } => read_variable(
            cursor,
            format,
            (count, value),
            event_number,
            event,
            parameters,
        ),
        EventLayout::RawGroup => {
            read_raw_group(cursor, format, event_number, event, parameters, group)
        }
        EventLayout::Adc4 => read_adc(cursor, format, 4, event_number, event, parameters),
        EventLayout::Adc8 => read_adc(cursor, format, 8, event_number, event, parameters),
        EventLayout::Camac => read_camac(cursor, format, event_number, event),
        EventLayout::Raw32 => read_raw32(cursor, event_number, event),
    }
}

fn read_fixed<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    width: ValueWidth,
    event_number: u64,
    event: &mut EventData,
) -> Result<Truncation, LmfError> {
    let mut truncation = Truncation::default();
    let mut at_record_start = true;
    if format.timestamp_words > 0 {
        event.timestamp = read_leading_timestamp(cursor, format.timestamp_words)
            .map_err(|_| LmfError::TimestampRead(event_number))?
            .ok_or(LmfError::EndOfFile)?;
        at_record_start = false;
    } else if format.number_of_channels == 0 {
        // Zero sized records
        return Err(LmfError::EndOfFile);
    }

    for channel in 0..format.number_of_channels {
        let count = if at_record_start {
            at_record_start = false;
            read_leading_value(cursor, width)
                .map_err(data_error(event_number))?
                .ok_or(LmfError::EndOfFile)?
        } else {
            read_value(cursor, width).map_err(data_error(event_number))?
        };
        let count = count.as_count().clamp(0, format.max_hits as i64) as usize;
        for hit in 0..format.max_hits {
            let value = read_value(cursor, width).map_err(data_error(event_number))?;
            if hit < count {
                truncation.note(push_value(&mut event.hits, channel, value));
            }
        }
    }
    Ok(truncation)
}

/// Read the record marker word. Returns the record start offset and declared length.
fn read_record_marker<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    event_number: u64,
) -> Result<(u64, u64), LmfError> {
    let start = cursor.tell();
    let word = cursor
        .read_leading::<8>()
        .map_err(data_error(event_number))?
        .map(u64::from_le_bytes)
        .ok_or(LmfError::EndOfFile)?;
    if word & !EVENT_LENGTH_MASK != EVENT_MARKER {
        return Err(LmfError::DataRead(
            event_number,
            format!("bad record marker {word:#018x} at byte {start}"),
        ));
    }
    Ok((start, word & EVENT_LENGTH_MASK))
}

fn check_record_length<T>(
    cursor: &ByteCursor<T>,
    start: u64,
    length: u64,
    event_number: u64,
) -> Result<(), LmfError> {
    let consumed = cursor.tell() - start;
    if consumed != length {
        return Err(LmfError::DataRead(
            event_number,
            format!("record consumed {consumed} bytes but declares {length}"),
        ));
    }
    Ok(())
}

/// The changed-parameter and post-event blocks closing a record
fn read_trailer<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    event_number: u64,
    event: &mut EventData,
    parameters: &mut ParameterTable,
) -> Result<(), LmfError> {
    if format.changed_mask {
        parameters
            .read_changes(cursor)
            .map_err(data_error(event_number))?;
    }
    if format.post_event {
        let size = cursor.read_u32().map_err(data_error(event_number))? as usize;
        if size > MAX_POST_EVENT_DATA {
            return Err(LmfError::PostEventDataTooLarge {
                size,
                max: MAX_POST_EVENT_DATA,
            });
        }
        event.post_event_data = cursor
            .read_vec(size as u64)
            .map_err(data_error(event_number))?;
    }
    Ok(())
}

fn read_variable<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    (count_width, value_width): (ValueWidth, ValueWidth),
    event_number: u64,
    event: &mut EventData,
    parameters: &mut ParameterTable,
) -> Result<Truncation, LmfError> {
    let (start, length) = read_record_marker(cursor, event_number)?;
    event.event_counter = cursor.read_u64().map_err(data_error(event_number))?;
    event.timestamp = read_timestamp(cursor, format.timestamp_words)
        .map_err(|_| LmfError::TimestampRead(event_number))?;

    let mut truncation = Truncation::default();
    for channel in 0..format.number_of_channels {
        let count = read_value(cursor, count_width)
            .map_err(data_error(event_number))?
            .as_count()
            .max(0) as u64;
        let remaining = length.saturating_sub(cursor.tell() - start);
        if count.saturating_mul(value_width.size()) > remaining {
            return Err(LmfError::DataRead(
                event_number,
                format!("{count} hits on channel {channel} overrun the record"),
            ));
        }
        for _ in 0..count {
            let value = read_value(cursor, value_width).map_err(data_error(event_number))?;
            truncation.note(push_value(&mut event.hits, channel, value));
        }
    }
    read_trailer(cursor, format, event_number, event, parameters)?;
    check_record_length(cursor, start, length, event_number)?;
    Ok(truncation)
}

fn read_raw_group<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    event_number: u64,
    event: &mut EventData,
    parameters: &mut ParameterTable,
    group: &mut GroupDecoder,
) -> Result<Truncation, LmfError> {
    let count = read_leading_u32(cursor)
        .map_err(data_error(event_number))?
        .ok_or(LmfError::EndOfFile)?;
    if count > MAX_RECORD_ITEMS {
        return Err(LmfError::DataRead(
            event_number,
            format!("group of {count} words"),
        ));
    }
    for _ in 0..count {
        let word = cursor.read_u32().map_err(data_error(event_number))?;
        event.raw_words.push(word);
    }
    let summary = group.decode(&event.raw_words, &mut event.hits);
    event.timestamp = group.absolute_timestamp();
    read_trailer(cursor, format, event_number, event, parameters)?;
    Ok(Truncation {
        hits_dropped: summary.hits_dropped,
        channels_dropped: summary.channels_dropped,
    })
}

fn read_adc<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    channels_per_card: i32,
    event_number: u64,
    event: &mut EventData,
    parameters: &mut ParameterTable,
) -> Result<Truncation, LmfError> {
    let (start, length) = read_record_marker(cursor, event_number)?;
    event.event_counter = cursor.read_u64().map_err(data_error(event_number))?;
    let packets = cursor.read_u32().map_err(data_error(event_number))?;
    if packets > MAX_RECORD_ITEMS {
        return Err(LmfError::DataRead(
            event_number,
            format!("{packets} ADC packets"),
        ));
    }

    let mut truncation = Truncation::default();
    for _ in 0..packets {
        let packet = match format.layout {
            EventLayout::Adc4 => AdcPacket::read_fadc4(cursor),
            _ => AdcPacket::read_fadc8(cursor),
        }
        .map_err(data_error(event_number))?;
        let push = match usize::try_from(packet.logical_channel(channels_per_card)) {
            Ok(channel) => event.hits.push_int(channel, packet.timestamp as i64),
            Err(_) => HitPush::ChannelDropped,
        };
        truncation.note(push);
        event.adc_packets.push(packet);
    }
    if let Some(first) = event.adc_packets.first() {
        event.timestamp = first.timestamp;
    }
    read_trailer(cursor, format, event_number, event, parameters)?;
    check_record_length(cursor, start, length, event_number)?;
    Ok(truncation)
}

fn read_camac<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    format: &RecordFormat,
    event_number: u64,
    event: &mut EventData,
) -> Result<Truncation, LmfError> {
    let mut remaining = format.number_of_coordinates;
    if format.timestamp_words > 0 {
        event.timestamp = read_leading_timestamp(cursor, format.timestamp_words)
            .map_err(|_| LmfError::TimestampRead(event_number))?
            .ok_or(LmfError::EndOfFile)?;
    } else {
        if remaining == 0 {
            return Err(LmfError::EndOfFile);
        }
        let first = read_leading_u32(cursor)
            .map_err(data_error(event_number))?
            .ok_or(LmfError::EndOfFile)?;
        event.camac.push(first);
        remaining -= 1;
    }
    for _ in 0..remaining {
        let value = cursor.read_u32().map_err(data_error(event_number))?;
        event.camac.push(value);
    }
    Ok(Truncation::default())
}

fn read_raw32<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    event_number: u64,
    event: &mut EventData,
) -> Result<Truncation, LmfError> {
    let count = read_leading_u32(cursor)
        .map_err(data_error(event_number))?
        .ok_or(LmfError::EndOfFile)?;
    if count > MAX_RECORD_ITEMS {
        return Err(LmfError::DataRead(
            event_number,
            format!("raw record of {count} words"),
        ));
    }
    for _ in 0..count {
        let word = cursor.read_u32().map_err(data_error(event_number))?;
        event.raw_words.push(word);
    }
    Ok(Truncation::default())
}
