use log::{debug, info, warn};
use ndarray::ArrayView1;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use super::adc::AdcPacket;
use super::archive::FileHeader;
use super::config::OutputConfig;
use super::constants::*;
use super::cursor::{ByteCursor, ReadSeek, WriteSeek};
use super::daq::{DaqId, DecodeContext, EncodeContext};
use super::error::{error_text, LmfError};
use super::event::EventData;
use super::event_reader::read_event;
use super::event_writer::{
    write_camac_record, write_raw32_record, write_raw_group_record, write_tdc_event, TdcEvent,
    TdcValues,
};
use super::group_mode::GroupDecoder;
use super::hit_array::HitArray;
use super::output::OutputSettings;
use super::parameters::ParameterTable;
use super::record::RecordFormat;
use super::variants::VariantHeader;

/// The decoded headers of the last opened input. They outlive the input file itself, so
/// an output can be opened after the input was closed or on a cloned session.
#[derive(Debug, Clone, PartialEq)]
pub struct InputHeaders {
    pub file: FileHeader,
    pub variant: VariantHeader,
}

pub(crate) struct InputFile {
    pub(crate) cursor: ByteCursor<Box<dyn ReadSeek>>,
    pub(crate) format: RecordFormat,
    pub(crate) events_start: u64,
    pub(crate) events_read: u64,
    truncation_reported: bool,
}

struct OutputFile {
    path: PathBuf,
    cursor: ByteCursor<Box<dyn WriteSeek>>,
    header: FileHeader,
    variant: VariantHeader,
    format: RecordFormat,
    events_written: u64,
}

/// One list mode file session: at most one input and one output file.
///
/// The capacity given at construction bounds every hit array. Files declaring more
/// channels or hits than that are refused at open time, hits beyond it in a variable
/// length record are dropped and flagged.
///
/// Every fallible call returns a `Result` and also records the error code in a sticky
/// status, kept until the next successful open or [`LmfIo::clear_error`].
pub struct LmfIo {
    max_channels: usize,
    max_hits: usize,
    headers: Option<InputHeaders>,
    pub(crate) input: Option<InputFile>,
    output: Option<OutputFile>,
    output_settings: OutputSettings,
    event: EventData,
    parameters: ParameterTable,
    group: GroupDecoder,
    post_event_out: Vec<u8>,
    error_status: i32,
}

/// I/O failures while decoding headers are header read errors
fn header_error(error: LmfError) -> LmfError {
    match error {
        LmfError::Io(e) => LmfError::HeaderRead(e.to_string()),
        other => other,
    }
}

fn decode_headers<T: Read + Seek>(
    cursor: &mut ByteCursor<T>,
    max_channels: usize,
    max_hits: usize,
) -> Result<InputHeaders, LmfError> {
    let Some(mut file) = FileHeader::read_archive(cursor)? else {
        let (daq_id, variant) = VariantHeader::read_non_cobold(cursor, max_channels, max_hits)?;
        let file = FileHeader {
            daq_id,
            daq_version: 0,
            data_format: LM_SLONG,
            header_size: NON_COBOLD_HEADER_SIZE,
            user_header_size: 0,
            number_of_events: 0,
            number_of_coordinates: variant.common().tdc_coordinates(),
            ..Default::default()
        };
        return Ok(InputHeaders { file, variant });
    };
    file.read_user_preamble(cursor)?;
    let ctx = DecodeContext {
        daq_version: file.daq_version,
        daq_id: file.daq_id,
        era: file.era,
        daq_source_flag: file.daq_source_flag,
        header_size: file.header_size,
        user_header_size: file.user_header_size,
        max_channels,
        max_hits,
    };
    let variant = VariantHeader::decode(cursor, &ctx)?;
    if variant.common().data_format != file.data_format {
        return Err(LmfError::HeaderRead(format!(
            "user header data format {} differs from file data format {}",
            variant.common().data_format,
            file.data_format
        )));
    }
    Ok(InputHeaders { file, variant })
}

/// Rewrite the archive header and the user header preamble in place, then move back to
/// the end of the file
fn patch_headers<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    header: &FileHeader,
) -> std::io::Result<()> {
    cursor.seek(0)?;
    header.write_archive(cursor)?;
    header.write_user_preamble(cursor)?;
    cursor.seek_to_end()?;
    Ok(())
}

fn write_headers<T: Write + Seek>(
    cursor: &mut ByteCursor<T>,
    header: &mut FileHeader,
    variant: &VariantHeader,
) -> Result<(), LmfError> {
    let ctx = EncodeContext {
        daq_version: header.daq_version,
        daq_id: header.daq_id,
        era: header.era,
        daq_source_flag: header.daq_source_flag,
    };
    if header.daq_id.is_non_cobold() {
        return variant.write(cursor, &ctx);
    }
    // Sizes are only known once everything is written
    header.header_size = 0;
    header.user_header_size = 0;
    header.write_archive(cursor)?;
    header.header_size = cursor.tell();
    header.write_user_preamble(cursor)?;
    variant.write(cursor, &ctx)?;
    header.user_header_size = cursor.tell() - header.header_size;
    patch_headers(cursor, header)?;
    Ok(())
}

impl LmfIo {
    /// Create a session able to hold `max_channels` channels of `max_hits` hits each
    pub fn new(max_channels: usize, max_hits: usize) -> Self {
        Self {
            max_channels,
            max_hits,
            headers: None,
            input: None,
            output: None,
            output_settings: OutputSettings::default(),
            event: EventData::new(max_channels, max_hits),
            parameters: ParameterTable::default(),
            group: GroupDecoder::default(),
            post_event_out: Vec::new(),
            error_status: 0,
        }
    }

    pub(crate) fn fail<T>(&mut self, error: LmfError) -> Result<T, LmfError> {
        self.error_status = error.code();
        Err(error)
    }

    /// Open a list mode file for reading and decode its headers
    pub fn open_input_lmf(&mut self, path: &Path) -> Result<(), LmfError> {
        if self.input.is_some() {
            return self.fail(LmfError::InputAlreadyOpen);
        }
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => return self.fail(LmfError::InputOpen(path.to_path_buf(), e)),
        };
        info!("Opening input file {}", path.display());
        self.open_input_reader(BufReader::new(file))
    }

    /// Decode the headers of an already opened list mode stream and use it as input
    pub fn open_input_reader<R: Read + Seek + 'static>(&mut self, reader: R) -> Result<(), LmfError> {
        if self.input.is_some() {
            return self.fail(LmfError::InputAlreadyOpen);
        }
        let mut cursor: ByteCursor<Box<dyn ReadSeek>> = ByteCursor::new(Box::new(reader));
        let decoded = decode_headers(&mut cursor, self.max_channels, self.max_hits)
            .map_err(header_error)
            .and_then(|headers| {
                let format = RecordFormat::new(headers.file.daq_id, &headers.file, &headers.variant)?;
                Ok((headers, format))
            });
        let (headers, format) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => return self.fail(e),
        };
        let events_start = headers.file.events_start();
        if let Err(e) = cursor.seek(events_start) {
            return self.fail(header_error(e.into()));
        }

        let common = headers.variant.common();
        info!(
            "Input is {} data (DAQ version {}, LMF version {}): {} channels x {} hits, {} events declared",
            headers.file.daq_id,
            headers.file.daq_version,
            common.lmf_version,
            common.number_of_channels,
            common.max_number_of_hits,
            headers.file.number_of_events
        );
        debug!("Input record format: {:?}", format);

        self.group.reset();
        self.event.clear();
        self.headers = Some(headers);
        self.input = Some(InputFile {
            cursor,
            format,
            events_start,
            events_read: 0,
            truncation_reported: false,
        });
        self.error_status = 0;
        Ok(())
    }

    /// Close the input file. The decoded headers stay available.
    pub fn close_input_lmf(&mut self) -> Result<(), LmfError> {
        match self.input.take() {
            Some(input) => {
                info!("Closed input file after {} events", input.events_read);
                Ok(())
            }
            None => self.fail(LmfError::InputNotOpen),
        }
    }

    /// Read the next event record.
    ///
    /// Returns `Ok(false)` at the end of the input (and records code 15), `Ok(true)` after
    /// a successful read. Hits dropped for lack of capacity are recorded as codes 16/17
    /// without failing the read.
    pub fn read_next_event(&mut self) -> Result<bool, LmfError> {
        let declared = self.number_of_events();
        let Some(input) = self.input.as_mut() else {
            return self.fail(LmfError::InputNotOpen);
        };
        if declared > 0 && input.events_read >= declared {
            self.error_status = LmfError::EndOfFile.code();
            return Ok(false);
        }
        let result = read_event(
            &mut input.cursor,
            &input.format,
            input.events_read,
            &mut self.event,
            &mut self.parameters,
            &mut self.group,
        );
        match result {
            Ok(truncation) => {
                input.events_read += 1;
                if truncation.any() {
                    let error = if truncation.channels_dropped > 0 {
                        LmfError::TooManyChannels {
                            found: truncation.channels_dropped as u64,
                            max: self.max_channels,
                        }
                    } else {
                        LmfError::TooManyHits {
                            found: truncation.hits_dropped as u64,
                            max: self.max_hits,
                        }
                    };
                    if !input.truncation_reported {
                        warn!("Event {} truncated: {}", input.events_read - 1, error);
                        input.truncation_reported = true;
                    }
                    self.error_status = error.code();
                }
                Ok(true)
            }
            Err(LmfError::EndOfFile) => {
                debug!("End of input after {} events", input.events_read);
                self.error_status = LmfError::EndOfFile.code();
                Ok(false)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Open a list mode file for writing.
    ///
    /// The headers are resolved from the output overrides and the input headers and
    /// written right away; sizes and the event count are patched in when the output is
    /// closed.
    pub fn open_output_lmf(&mut self, path: &Path) -> Result<(), LmfError> {
        if self.output.is_some() {
            return self.fail(LmfError::OutputAlreadyOpen);
        }
        let resolved = self
            .output_settings
            .resolve(self.headers.as_ref(), &path.to_string_lossy());
        let (mut header, variant) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(e),
        };
        let file = match File::create(path) {
            Ok(file) => file,
            Err(e) => return self.fail(LmfError::OutputOpen(path.to_path_buf(), e)),
        };
        let mut cursor: ByteCursor<Box<dyn WriteSeek>> =
            ByteCursor::new(Box::new(BufWriter::new(file)));
        let started = write_headers(&mut cursor, &mut header, &variant)
            .and_then(|_| RecordFormat::new(header.daq_id, &header, &variant));
        let format = match started {
            Ok(format) => format,
            Err(e) => return self.fail(e),
        };
        info!(
            "Opened output file {} for {} data (DAQ version {}, LMF version {})",
            path.display(),
            header.daq_id,
            header.daq_version,
            variant.common().lmf_version
        );
        self.parameters.reset_written();
        self.post_event_out.clear();
        self.output = Some(OutputFile {
            path: path.to_path_buf(),
            cursor,
            header,
            variant,
            format,
            events_written: 0,
        });
        self.error_status = 0;
        Ok(())
    }

    /// Patch the event count and header sizes into the output file and close it
    pub fn close_output_lmf(&mut self) -> Result<(), LmfError> {
        let Some(mut output) = self.output.take() else {
            return self.fail(LmfError::OutputNotOpen);
        };
        output.header.number_of_events = output.events_written;
        let mut finish = || -> Result<(), LmfError> {
            if !output.header.daq_id.is_non_cobold() {
                patch_headers(&mut output.cursor, &output.header)?;
            }
            output.cursor.flush()?;
            Ok(())
        };
        match finish() {
            Ok(()) => {
                info!(
                    "Closed output file {} with {} events",
                    output.path.display(),
                    output.events_written
                );
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// A new session with the same capacity, headers, output overrides, parameters and
    /// current event, but without any open file
    pub fn clone_session(&self) -> Self {
        Self {
            max_channels: self.max_channels,
            max_hits: self.max_hits,
            headers: self.headers.clone(),
            input: None,
            output: None,
            output_settings: self.output_settings.clone(),
            event: self.event.clone(),
            parameters: self.parameters.clone(),
            group: self.group.clone(),
            post_event_out: Vec::new(),
            error_status: 0,
        }
    }

    pub fn error_status(&self) -> i32 {
        self.error_status
    }

    pub fn clear_error(&mut self) {
        self.error_status = 0;
    }

    /// Fixed message of an error code
    pub fn error_text(code: i32) -> &'static str {
        error_text(code)
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    pub fn input_headers(&self) -> Option<&InputHeaders> {
        self.headers.as_ref()
    }

    pub fn daq_id(&self) -> Option<DaqId> {
        self.headers.as_ref().map(|h| h.file.daq_id)
    }

    pub fn daq_version(&self) -> i32 {
        self.headers.as_ref().map_or(0, |h| h.file.daq_version)
    }

    pub fn lmf_version(&self) -> i32 {
        self.headers.as_ref().map_or(0, |h| h.variant.common().lmf_version)
    }

    pub fn number_of_channels(&self) -> u64 {
        self.headers
            .as_ref()
            .map_or(0, |h| h.variant.common().number_of_channels)
    }

    pub fn max_number_of_hits(&self) -> u64 {
        self.headers
            .as_ref()
            .map_or(0, |h| h.variant.common().max_number_of_hits)
    }

    /// Declared number of events, zero when unknown
    pub fn number_of_events(&self) -> u64 {
        self.headers.as_ref().map_or(0, |h| h.file.number_of_events)
    }

    pub fn events_read(&self) -> u64 {
        self.input.as_ref().map_or(0, |i| i.events_read)
    }

    /// Timestamp clock frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.headers.as_ref().map_or(0.0, |h| h.variant.common().frequency)
    }

    /// TDC bin size in ns
    pub fn tdc_resolution(&self) -> f64 {
        self.headers.as_ref().map_or(0.0, |h| h.variant.common().resolution)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        let header = self.headers.as_ref()?;
        OffsetDateTime::from_unix_timestamp(header.file.start_time).ok()
    }

    pub fn stop_time(&self) -> Option<OffsetDateTime> {
        let header = self.headers.as_ref()?;
        OffsetDateTime::from_unix_timestamp(header.file.stop_time).ok()
    }

    /// Raw timestamp of the current event in clock ticks
    pub fn u64_timestamp(&self) -> u64 {
        self.event.timestamp
    }

    /// Timestamp of the current event in seconds. Ticks when the frequency is unknown.
    pub fn double_timestamp(&self) -> f64 {
        let frequency = self.frequency();
        if frequency > 0.0 {
            self.event.timestamp as f64 / frequency
        } else {
            self.event.timestamp as f64
        }
    }

    /// Counter stored in variable length records
    pub fn event_counter(&self) -> u64 {
        self.event.event_counter
    }

    fn is_camac(&self) -> bool {
        self.daq_id() == Some(DaqId::Camac)
    }

    fn copy_tdc_data<T: Copy + Default>(
        &mut self,
        target: &mut [T],
        convert: impl Fn(i64, f64) -> T,
    ) -> Result<(), LmfError> {
        if self.is_camac() {
            return self.fail(LmfError::WrongReadFunctionForCamac);
        }
        self.event.hits.copy_flat(target, self.max_hits, convert);
        Ok(())
    }

    /// Copy the hits of the current event into `target`, laid out as
    /// `channel * max_hits + hit` with the capacity given at construction
    pub fn tdc_data_i32(&mut self, target: &mut [i32]) -> Result<(), LmfError> {
        self.copy_tdc_data(target, |int, _| int as i32)
    }

    pub fn tdc_data_i64(&mut self, target: &mut [i64]) -> Result<(), LmfError> {
        self.copy_tdc_data(target, |int, _| int)
    }

    pub fn tdc_data_f64(&mut self, target: &mut [f64]) -> Result<(), LmfError> {
        self.copy_tdc_data(target, |_, double| double)
    }

    pub fn tdc_data_u16(&mut self, target: &mut [u16]) -> Result<(), LmfError> {
        self.copy_tdc_data(target, |int, _| int as u16)
    }

    /// Hits per channel of the current event
    pub fn number_of_hits_array(&self, target: &mut [u32]) {
        for (channel, slot) in target.iter_mut().enumerate() {
            *slot = self.event.hits.count(channel);
        }
    }

    /// Integer hit values of one channel of the current event
    pub fn hits(&self, channel: usize) -> ArrayView1<'_, i64> {
        self.event.hits.ints(channel)
    }

    pub fn hit_doubles(&self, channel: usize) -> ArrayView1<'_, f64> {
        self.event.hits.doubles(channel)
    }

    /// Edge polarity of a group mode hit
    pub fn is_falling(&self, channel: usize, hit: usize) -> Option<bool> {
        self.event.hits.is_falling(channel, hit)
    }

    pub fn hit_array(&self) -> &HitArray {
        &self.event.hits
    }

    pub fn camac_array(&mut self) -> Result<&[u32], LmfError> {
        if !self.is_camac() {
            return self.fail(LmfError::WrongReadFunctionForCamac);
        }
        Ok(&self.event.camac)
    }

    /// Words of the current RAW32BIT or TDC8HP group mode record
    pub fn raw32_words(&self) -> &[u32] {
        &self.event.raw_words
    }

    pub fn adc_packets(&self) -> &[AdcPacket] {
        &self.event.adc_packets
    }

    /// Post-event data of the current event
    pub fn post_event_data(&self) -> &[u8] {
        &self.event.post_event_data
    }

    /// Bit field collected from the TDC8HP level info words
    pub fn level_info(&self) -> u64 {
        self.group.level_info
    }

    /// Channel shift applied to rising edges of group mode hits
    pub fn set_channel_offset_for_rising_transitions(&mut self, offset: i32) {
        self.group.channel_offset_for_rising_transitions = offset;
    }

    pub fn parameter(&self, index: usize) -> Option<f64> {
        self.parameters.get(index)
    }

    /// Set a parameter slot. Returns false for an index outside the table.
    pub fn set_parameter(&mut self, index: usize, value: f64) -> bool {
        self.parameters.set(index, value)
    }

    /// Post-event data attached to the next written event
    pub fn set_post_event_data(&mut self, data: &[u8]) -> Result<(), LmfError> {
        if data.len() > MAX_POST_EVENT_DATA {
            return self.fail(LmfError::PostEventDataTooLarge {
                size: data.len(),
                max: MAX_POST_EVENT_DATA,
            });
        }
        self.post_event_out = data.to_vec();
        Ok(())
    }

    /// Overrides for the headers of the next output file
    pub fn output_mut(&mut self) -> &mut OutputSettings {
        &mut self.output_settings
    }

    /// Copy the fields set in a YAML output config into the output overrides
    pub fn apply_output_config(&mut self, config: &OutputConfig) {
        config.apply(&mut self.output_settings);
    }

    pub fn output_settings(&self) -> &OutputSettings {
        &self.output_settings
    }

    /// Headers of the open output file
    pub fn output_headers(&self) -> Option<(&FileHeader, &VariantHeader)> {
        self.output.as_ref().map(|o| (&o.header, &o.variant))
    }

    pub fn events_written(&self) -> u64 {
        self.output.as_ref().map_or(0, |o| o.events_written)
    }

    fn finish_write(&mut self, result: Result<(), LmfError>) -> Result<(), LmfError> {
        match result {
            Ok(()) => {
                if let Some(output) = self.output.as_mut() {
                    output.events_written += 1;
                }
                self.post_event_out.clear();
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn write_tdc(
        &mut self,
        timestamp: u64,
        counts: &[u32],
        values: TdcValues,
    ) -> Result<(), LmfError> {
        let event = TdcEvent {
            timestamp,
            counts,
            values,
            stride: self.max_hits,
        };
        let Some(output) = self.output.as_mut() else {
            return self.fail(LmfError::OutputNotOpen);
        };
        let result = write_tdc_event(
            &mut output.cursor,
            &output.format,
            output.events_written,
            &event,
            &mut self.parameters,
            &self.post_event_out,
        );
        self.finish_write(result)
    }

    /// Write one TDC event. `data` is laid out as `channel * max_hits + hit` with the
    /// capacity given at construction; counts are clipped to the output's hit limit.
    pub fn write_tdc_data_i32(
        &mut self,
        timestamp: u64,
        counts: &[u32],
        data: &[i32],
    ) -> Result<(), LmfError> {
        self.write_tdc(timestamp, counts, TdcValues::I32(data))
    }

    pub fn write_tdc_data_i64(
        &mut self,
        timestamp: u64,
        counts: &[u32],
        data: &[i64],
    ) -> Result<(), LmfError> {
        self.write_tdc(timestamp, counts, TdcValues::I64(data))
    }

    pub fn write_tdc_data_f64(
        &mut self,
        timestamp: u64,
        counts: &[u32],
        data: &[f64],
    ) -> Result<(), LmfError> {
        self.write_tdc(timestamp, counts, TdcValues::F64(data))
    }

    pub fn write_tdc_data_u16(
        &mut self,
        timestamp: u64,
        counts: &[u32],
        data: &[u16],
    ) -> Result<(), LmfError> {
        self.write_tdc(timestamp, counts, TdcValues::U16(data))
    }

    pub fn write_camac_array(&mut self, timestamp: u64, values: &[u32]) -> Result<(), LmfError> {
        let Some(output) = self.output.as_mut() else {
            return self.fail(LmfError::OutputNotOpen);
        };
        let result = write_camac_record(&mut output.cursor, &output.format, timestamp, values);
        self.finish_write(result)
    }

    pub fn write_raw32_words(&mut self, words: &[u32]) -> Result<(), LmfError> {
        let Some(output) = self.output.as_mut() else {
            return self.fail(LmfError::OutputNotOpen);
        };
        let result = write_raw32_record(&mut output.cursor, &output.format, words);
        self.finish_write(result)
    }

    pub fn write_raw_group_words(&mut self, words: &[u32]) -> Result<(), LmfError> {
        let Some(output) = self.output.as_mut() else {
            return self.fail(LmfError::OutputNotOpen);
        };
        let result = write_raw_group_record(
            &mut output.cursor,
            &output.format,
            words,
            &mut self.parameters,
            &self.post_event_out,
        );
        self.finish_write(result)
    }
}

impl Drop for LmfIo {
    fn drop(&mut self) {
        if self.output.is_some() {
            if let Err(e) = self.close_output_lmf() {
                warn!("Failed to finish output file: {e}");
            }
        }
    }
}
