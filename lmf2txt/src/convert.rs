use log::info;
use std::path::Path;
use std::sync::mpsc::Sender;

use liblmf_io::config::OutputConfig;
use liblmf_io::daq::DaqId;
use liblmf_io::error::LmfError;
use liblmf_io::session::LmfIo;

use super::error::ConvertError;
use super::export::{TOOL_CHANNELS, TOOL_HITS};

/// Re-encode a list mode file, optionally with header overrides. Returns the number of
/// events written.
///
/// Parameters and post-event data are carried over event by event.
pub fn convert(
    input: &Path,
    output: &Path,
    config: Option<&OutputConfig>,
    tx: &Sender<f32>,
) -> Result<u64, ConvertError> {
    let mut lmf = LmfIo::new(TOOL_CHANNELS, TOOL_HITS);
    lmf.open_input_lmf(input)?;
    if let Some(config) = config {
        lmf.apply_output_config(config);
    }
    lmf.open_output_lmf(output)?;
    let output_daq = lmf
        .output_headers()
        .map(|(header, _)| header.daq_id)
        .ok_or(LmfError::OutputNotOpen)?;
    if let Some(input_daq) = lmf.daq_id() {
        info!("Converting {input_daq} data to {output_daq}");
    }

    let declared = lmf.number_of_events();
    let report_every = (declared / 100).max(1);
    let mut counts = vec![0u32; TOOL_CHANNELS];
    let mut data = vec![0i64; TOOL_CHANNELS * TOOL_HITS];
    while lmf.read_next_event()? {
        let post_event = lmf.post_event_data().to_vec();
        lmf.set_post_event_data(&post_event)?;
        let timestamp = lmf.u64_timestamp();
        match output_daq {
            DaqId::Camac => {
                let values = lmf.camac_array()?.to_vec();
                lmf.write_camac_array(timestamp, &values)?;
            }
            DaqId::Raw32Bit => {
                let words = lmf.raw32_words().to_vec();
                lmf.write_raw32_words(&words)?;
            }
            DaqId::Tdc8hpRaw => {
                let words = lmf.raw32_words().to_vec();
                lmf.write_raw_group_words(&words)?;
            }
            _ => {
                lmf.number_of_hits_array(&mut counts);
                lmf.tdc_data_i64(&mut data)?;
                lmf.write_tdc_data_i64(timestamp, &counts, &data)?;
            }
        }
        let written = lmf.events_written();
        if declared > 0 && written % report_every == 0 {
            tx.send(written as f32 / declared as f32)?;
        }
    }
    let written = lmf.events_written();
    lmf.close_output_lmf()?;
    info!("Wrote {written} events to {}", output.display());
    Ok(written)
}
