use super::error::LmfError;
use super::record::RecordFormat;
use super::session::LmfIo;

/// Byte offset of an event in a file with constant size records.
///
/// An offset beyond the range of `u64` is reported as the end of the file.
pub fn event_offset(
    format: &RecordFormat,
    events_start: u64,
    event_number: u64,
) -> Result<u64, LmfError> {
    let size = format
        .fixed_record_size()
        .ok_or(LmfError::SeekUnsupported)?;
    event_number
        .checked_mul(size)
        .and_then(|bytes| bytes.checked_add(events_start))
        .ok_or(LmfError::EndOfFile)
}

impl LmfIo {
    /// Position the input so that the next read returns event `event_number` (zero based).
    ///
    /// Only files with constant size records can be seeked.
    pub fn seek_to_event_number(&mut self, event_number: u64) -> Result<(), LmfError> {
        let declared = self.number_of_events();
        let Some(input) = self.input.as_mut() else {
            return self.fail(LmfError::InputNotOpen);
        };
        if input.format.fixed_record_size().is_none() {
            return self.fail(LmfError::SeekUnsupported);
        }
        if declared > 0 && event_number >= declared {
            return self.fail(LmfError::EndOfFile);
        }
        let offset = match event_offset(&input.format, input.events_start, event_number) {
            Ok(offset) => offset,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = input.cursor.seek(offset) {
            return self.fail(e.into());
        }
        input.events_read = event_number;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventLayout, ValueWidth};

    #[test]
    fn test_event_offset() {
        let mut format = RecordFormat {
            layout: EventLayout::Fixed(ValueWidth::I32),
            timestamp_words: 1,
            number_of_channels: 2,
            max_hits: 3,
            number_of_coordinates: 8,
            changed_mask: false,
            post_event: false,
        };
        assert_eq!(event_offset(&format, 100, 2).unwrap(), 100 + 2 * (4 + 2 * 4 * 4));
        format.layout = EventLayout::Variable {
            count: ValueWidth::U16,
            value: ValueWidth::I32,
        };
        assert_eq!(event_offset(&format, 100, 2).unwrap_err().code(), 13);
    }

    #[test]
    fn test_event_offset_overflow() {
        let format = RecordFormat {
            layout: EventLayout::Fixed(ValueWidth::I32),
            timestamp_words: 1,
            number_of_channels: 2,
            max_hits: 3,
            number_of_coordinates: 8,
            changed_mask: false,
            post_event: false,
        };
        assert_eq!(event_offset(&format, 100, u64::MAX / 2).unwrap_err().code(), 15);
        assert_eq!(event_offset(&format, u64::MAX, 0).unwrap(), u64::MAX);
        assert_eq!(event_offset(&format, u64::MAX, 1).unwrap_err().code(), 15);
    }
}
