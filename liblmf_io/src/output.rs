//! The output mirror: header fields of a file about to be written.
//!
//! Every field of [`OutputSettings`] is an optional override. Whatever is left unset is
//! taken from the headers of the input file at the time the output is opened.
use std::io::Cursor;

use super::archive::FileHeader;
use super::constants::*;
use super::cursor::ByteCursor;
use super::daq::{ArchiveEra, DaqId, DecodeContext, EncodeContext};
use super::error::LmfError;
use super::session::InputHeaders;
use super::variants::VariantHeader;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputSettings {
    pub daq_id: Option<DaqId>,
    pub daq_version: Option<i32>,
    pub lmf_version: Option<i32>,
    pub era: Option<ArchiveEra>,
    pub data_format: Option<i32>,
    pub timestamp_format: Option<i32>,
    pub number_of_channels: Option<u64>,
    pub max_number_of_hits: Option<u64>,
    pub frequency: Option<f64>,
    pub resolution: Option<f64>,
    pub tdc_data_type: Option<i32>,
    pub variable_event_length: Option<i32>,
    pub daq_info: Option<String>,
    pub comment: Option<String>,
    /// Unix seconds
    pub start_time: Option<i64>,
    pub stop_time: Option<i64>,
    /// A complete variant header replacing the one of the input
    pub variant: Option<VariantHeader>,
}

impl OutputSettings {
    /// Resolve the headers of an output file from the overrides and the input headers
    pub fn resolve(
        &self,
        input: Option<&InputHeaders>,
        file_path: &str,
    ) -> Result<(FileHeader, VariantHeader), LmfError> {
        let daq_id = self
            .daq_id
            .or(input.map(|i| i.file.daq_id))
            .ok_or(LmfError::UninitializedParameters("DAQ id"))?;
        let daq_version = match self.daq_version.or(input.map(|i| i.file.daq_version)) {
            Some(version) => version,
            None if daq_id.is_non_cobold() => 0,
            None => return Err(LmfError::UninitializedParameters("DAQ version")),
        };

        let (mut variant, seeded) = match (&self.variant, input) {
            (Some(variant), _) => (variant.clone(), true),
            (None, Some(i)) if i.variant.fits(daq_id) => (i.variant.clone(), true),
            // Another acquisition system: keep what both header kinds have in common
            (None, Some(i)) => {
                let mut variant = VariantHeader::default_for(daq_id);
                *variant.common_mut() = i.variant.common().clone();
                (variant, true)
            }
            (None, None) => (VariantHeader::default_for(daq_id), false),
        };
        if !variant.fits(daq_id) {
            return Err(LmfError::UnsupportedSource(format!(
                "variant header does not describe {daq_id} files"
            )));
        }
        if !seeded {
            self.check_fresh_header(daq_id)?;
        }

        let data_format = self
            .data_format
            .or(input.filter(|_| seeded).map(|i| i.file.data_format))
            .unwrap_or(if daq_id == DaqId::Camac { LM_CAMAC } else { LM_SLONG });
        if (data_format == LM_CAMAC) != (daq_id == DaqId::Camac) {
            return Err(LmfError::UnsupportedSource(format!(
                "data format {data_format} for {daq_id} output"
            )));
        }
        self.apply_to(&mut variant, data_format);

        let mut header = match input {
            Some(i) if !i.file.daq_id.is_non_cobold() => FileHeader {
                number_of_events: 0,
                ..i.file.clone()
            },
            _ => FileHeader {
                version_string: format!("liblmf_io {}", env!("CARGO_PKG_VERSION")),
                ..Default::default()
            },
        };
        header.daq_id = daq_id;
        header.daq_version = daq_version;
        header.data_format = data_format;
        header.file_path = file_path.to_string();
        if let Some(era) = self.era {
            header.era = era;
        }
        header.lmf_header_version = header.era.marker();
        if let Some(comment) = &self.comment {
            header.comment = comment.clone();
        }
        if let Some(start) = self.start_time {
            header.start_time = start;
        }
        if let Some(stop) = self.stop_time {
            header.stop_time = stop;
        }
        header.daq_source_flag = !variant.common().daq_source_strings.is_empty();
        header.dan_source_flag = !header.dan_source_strings.is_empty();
        header.ccf_history_flag = !header.ccf_history_strings.is_empty();

        if daq_id.is_non_cobold() {
            header.header_size = NON_COBOLD_HEADER_SIZE;
            header.user_header_size = 0;
            header.number_of_coordinates = variant.common().tdc_coordinates();
            return Ok((header, variant));
        }

        let ctx = EncodeContext {
            daq_version,
            daq_id,
            era: header.era,
            daq_source_flag: header.daq_source_flag,
        };
        variant.check_writable(&ctx)?;
        let mut variant = normalize(&variant, &ctx)?;
        variant.common_mut().data_format = data_format;
        header.number_of_coordinates = match daq_id {
            DaqId::Camac => self
                .number_of_channels
                .or(input.map(|i| i.file.number_of_coordinates))
                .ok_or(LmfError::UninitializedParameters("number of CAMAC channels"))?,
            _ => variant.common().tdc_coordinates(),
        };
        Ok((header, variant))
    }

    /// A header built from scratch needs its limits and time base spelled out
    fn check_fresh_header(&self, daq_id: DaqId) -> Result<(), LmfError> {
        if daq_id == DaqId::Camac {
            return Ok(());
        }
        if self.number_of_channels.is_none() {
            return Err(LmfError::UninitializedParameters("number of channels"));
        }
        if self.max_number_of_hits.is_none() {
            return Err(LmfError::UninitializedParameters("max number of hits"));
        }
        if self.resolution.is_none() && !daq_id.is_non_cobold() {
            return Err(LmfError::UninitializedParameters("TDC resolution"));
        }
        Ok(())
    }

    fn apply_to(&self, variant: &mut VariantHeader, data_format: i32) {
        let common = variant.common_mut();
        common.data_format = data_format;
        if let Some(v) = self.lmf_version {
            common.lmf_version = v;
        }
        if let Some(v) = self.timestamp_format {
            common.timestamp_format = v.clamp(0, 2);
        }
        if let Some(v) = self.number_of_channels {
            common.number_of_channels = v;
        }
        if let Some(v) = self.max_number_of_hits {
            common.max_number_of_hits = v;
        }
        if let Some(v) = self.frequency {
            common.frequency = v;
        }
        if let Some(v) = self.resolution {
            common.resolution = v;
        }
        if let Some(v) = self.tdc_data_type {
            common.tdc_data_type = v;
        }
        if let Some(v) = self.variable_event_length {
            common.variable_event_length = v;
        }
        if let Some(v) = &self.daq_info {
            common.daq_info = v.clone();
        }
    }
}

/// Encode the variant body and decode it again, so the output mirror holds exactly the
/// fields a reader of the new file will see. Fields the target version cannot store fall
/// back to their defaults.
fn normalize(variant: &VariantHeader, ctx: &EncodeContext) -> Result<VariantHeader, LmfError> {
    let preamble = ctx.era.preamble();
    let mut encoder = ByteCursor::new(Cursor::new(vec![0u8; preamble as usize]));
    encoder.seek(preamble)?;
    variant.write(&mut encoder, ctx)?;
    let decode_ctx = DecodeContext {
        daq_version: ctx.daq_version,
        daq_id: ctx.daq_id,
        era: ctx.era,
        daq_source_flag: ctx.daq_source_flag,
        header_size: 0,
        user_header_size: encoder.tell(),
        max_channels: usize::MAX,
        max_hits: usize::MAX,
    };
    let mut decoder = ByteCursor::new(encoder.into_inner());
    decoder.seek(preamble)?;
    VariantHeader::decode(&mut decoder, &decode_ctx)
}
