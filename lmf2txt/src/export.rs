//! Text export of list mode files: one line per hit, or a histogram of hit times over the
//! TDC8HP group range.
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use time::macros::format_description;
use time::OffsetDateTime;

use liblmf_io::session::LmfIo;
use liblmf_io::variants::VariantHeader;

use super::error::ExportError;

/// Session capacity used by the tools
pub const TOOL_CHANNELS: usize = 80;
pub const TOOL_HITS: usize = 100;

const TEXT_EXTENSION: &str = "lmftxt";
const HISTOGRAM_EXTENSION: &str = "cod2";

/// How the exported events are distributed over output files
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Split {
    #[default]
    None,
    /// Roughly equal numbers of events per file
    Parts(u64),
    /// One file per time slice of this many seconds
    Seconds(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportOptions {
    pub output: Option<PathBuf>,
    pub histogram: bool,
    /// Time window in seconds relative to the first event
    pub window: Option<(f64, f64)>,
    pub split: Split,
    pub keep_trigger_channel: bool,
    /// Count rising edges in histograms
    pub rising_edges: bool,
    /// Falling to rising edge distance of each rising hit
    pub amplitude: bool,
}

impl ExportOptions {
    fn validate(&self) -> Result<(), ExportError> {
        if let Some((start, end)) = self.window {
            if end <= start {
                return Err(ExportError::BadWindow { start, end });
            }
        }
        match self.split {
            Split::Parts(0) => Err(ExportError::BadSplit(String::from(
                "cannot split into zero parts",
            ))),
            Split::Seconds(seconds) if !(seconds > 0.0) => Err(ExportError::BadSplit(format!(
                "time slices of {seconds} s"
            ))),
            _ => Ok(()),
        }
    }

    fn window_start(&self) -> f64 {
        self.window.map_or(0.0, |(start, _)| start)
    }

    /// Output path without extension, and the extension
    fn output_base(&self, input: &Path) -> (PathBuf, String) {
        match &self.output {
            Some(path) => (
                path.with_extension(""),
                path.extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            None if self.histogram => (input.with_extension(""), HISTOGRAM_EXTENSION.to_string()),
            None => (input.with_extension(""), TEXT_EXTENSION.to_string()),
        }
    }

    fn part_suffix(&self, part: u64) -> String {
        match self.split {
            Split::None => String::new(),
            Split::Parts(_) => format!("_{}", part + 1),
            Split::Seconds(seconds) => {
                let start = self.window_start() + seconds * part as f64;
                format!("_{}s-{}s", start as i64, (start + seconds) as i64)
            }
        }
    }
}

fn part_path(base: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    if !extension.is_empty() {
        name.push(".");
        name.push(extension);
    }
    PathBuf::from(name)
}

fn format_time(time: Option<OffsetDateTime>) -> String {
    let format = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [year]"
    );
    time.and_then(|t| t.format(format).ok())
        .unwrap_or_else(|| String::from("unknown"))
}

/// Values of the input header printed on top of every text export
#[derive(Debug, Clone, PartialEq)]
struct ExportHeader {
    /// ns per TDC bin
    resolution: f64,
    number_of_channels: usize,
    group_range_start: f64,
    group_range_end: f64,
    number_of_bins: usize,
    /// One based, 0 when there is none
    trigger_channel: i32,
    start_time: Option<OffsetDateTime>,
    stop_time: Option<OffsetDateTime>,
}

impl ExportHeader {
    fn new(lmf: &LmfIo) -> Self {
        let (trigger_channel, group_range_start, group_range_end) =
            match lmf.input_headers().map(|h| &h.variant) {
                Some(VariantHeader::Tdc8hp(tdc)) => (
                    tdc.trigger_channel,
                    tdc.group_range_start,
                    tdc.group_range_end,
                ),
                _ => (0, 0.0, 0.0),
            };
        let resolution = lmf.tdc_resolution();
        let number_of_bins = if resolution > 0.0 {
            ((group_range_end - group_range_start) / resolution).max(0.0) as usize
        } else {
            0
        };
        Self {
            resolution,
            number_of_channels: (lmf.number_of_channels() as usize).min(lmf.max_channels()),
            group_range_start,
            group_range_end,
            number_of_bins,
            trigger_channel,
            start_time: lmf.start_time(),
            stop_time: lmf.stop_time(),
        }
    }

    /// Histogram bin of a TDC value
    fn bin(&self, value: i64) -> Option<usize> {
        let bin = ((value as f64 * self.resolution - self.group_range_start) / self.resolution) as i64;
        usize::try_from(bin).ok().filter(|bin| *bin < self.number_of_bins)
    }

    fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "TDC resolution = {:.6} ps", self.resolution * 1.0e3)?;
        writeln!(out, "Number of channels = {}", self.number_of_channels)?;
        writeln!(out, "Group range start = {:.6} ns", self.group_range_start)?;
        writeln!(out, "Group range end = {:.6} ns", self.group_range_end)?;
        writeln!(out, "Number of max bins = {}", self.number_of_bins)?;
        writeln!(out, "Trigger channel = {}", self.trigger_channel)?;
        writeln!(out, "Start time = {}", format_time(self.start_time))?;
        writeln!(out, "Stop time = {}", format_time(self.stop_time))?;
        writeln!(out)?;
        writeln!(
            out,
            "Eventnumber\tChannelnumber\tStarttime[ms]\tTOF[ns]\tIsFalling\tAmplitude[ns]"
        )
    }
}

/// One output file of the export
struct PartWriter {
    path: PathBuf,
    out: BufWriter<File>,
    histogram: Option<Vec<u32>>,
    out_of_range: u64,
}

impl PartWriter {
    fn create(path: PathBuf, header: &ExportHeader, histogram: bool) -> Result<Self, ExportError> {
        info!("Writing {}", path.display());
        let mut out = BufWriter::new(File::create(&path)?);
        let histogram = if histogram {
            Some(vec![0; header.number_of_bins])
        } else {
            header.write(&mut out)?;
            None
        };
        Ok(Self {
            path,
            out,
            histogram,
            out_of_range: 0,
        })
    }

    fn write_event(
        &mut self,
        lmf: &LmfIo,
        event_number: u64,
        time: f64,
        header: &ExportHeader,
        options: &ExportOptions,
    ) -> std::io::Result<()> {
        let mut last_falling = false;
        let mut last_value = 0;
        let mut amplitude = -1.0;
        for channel in 0..header.number_of_channels {
            if !options.keep_trigger_channel && channel as i64 + 1 == header.trigger_channel as i64
            {
                continue;
            }
            for (hit, value) in lmf.hits(channel).iter().enumerate() {
                let falling = lmf.is_falling(channel, hit).unwrap_or(false);
                if let Some(histogram) = self.histogram.as_mut() {
                    if !falling && !options.rising_edges {
                        continue;
                    }
                    match header.bin(*value) {
                        Some(bin) => histogram[bin] += 1,
                        None => self.out_of_range += 1,
                    }
                    continue;
                }
                if options.amplitude {
                    amplitude = if falling || !last_falling {
                        -1.0
                    } else {
                        (value - last_value) as f64 * header.resolution
                    };
                    last_falling = falling;
                    last_value = *value;
                }
                writeln!(
                    self.out,
                    "{}\t{}\t{:.3}\t{:.3}\t{}\t{:.3}",
                    event_number,
                    channel + 1,
                    time * 1.0e3,
                    *value as f64 * header.resolution,
                    falling as u8,
                    amplitude
                )?;
            }
        }
        Ok(())
    }

    fn finish(mut self, header: &ExportHeader) -> std::io::Result<PathBuf> {
        if let Some(histogram) = &self.histogram {
            for (bin, count) in histogram.iter().enumerate() {
                let start = header.group_range_start + bin as f64 * header.resolution;
                writeln!(self.out, "{start:.6e},{count}")?;
            }
        }
        if self.out_of_range > 0 {
            warn!(
                "{} hits outside of the group range were left out of {}",
                self.out_of_range,
                self.path.display()
            );
        }
        self.out.flush()?;
        Ok(self.path)
    }
}

/// Export a list mode file to text. Returns the written files.
///
/// Progress is reported through `tx` as the fraction of declared events read.
pub fn export(
    input: &Path,
    options: &ExportOptions,
    tx: &Sender<f32>,
) -> Result<Vec<PathBuf>, ExportError> {
    options.validate()?;
    let mut lmf = LmfIo::new(TOOL_CHANNELS, TOOL_HITS);
    lmf.open_input_lmf(input)?;
    let header = ExportHeader::new(&lmf);
    if options.histogram && header.number_of_bins == 0 {
        return Err(ExportError::NoGroupRange);
    }

    let declared = lmf.number_of_events();
    let events_per_part = match options.split {
        Split::Parts(_) if declared == 0 => return Err(ExportError::UnknownEventCount),
        Split::Parts(parts) => declared / parts + 1,
        _ => 0,
    };
    let report_every = (declared / 100).max(1);
    let (base, extension) = options.output_base(input);

    let mut written = Vec::new();
    let mut part: Option<(u64, PartWriter)> = None;
    let mut first_timestamp = None;
    let mut event_number = 0;
    let mut exported = 0;
    while lmf.read_next_event()? {
        event_number += 1;
        if declared > 0 && event_number % report_every == 0 {
            tx.send(event_number as f32 / declared as f32)?;
        }
        let timestamp = lmf.double_timestamp();
        let time = timestamp - *first_timestamp.get_or_insert(timestamp);
        if let Some((start, end)) = options.window {
            if time < start {
                continue;
            }
            if time > end {
                debug!("Event {event_number} is past the end of the time window");
                break;
            }
        }

        let index = match options.split {
            Split::None => 0,
            Split::Parts(_) => exported / events_per_part,
            Split::Seconds(seconds) => ((time - options.window_start()) / seconds) as u64,
        };
        exported += 1;
        // Parts are opened in order, empty ones included
        while part.as_ref().map_or(true, |(current, _)| *current < index) {
            let next = part.as_ref().map_or(0, |(current, _)| current + 1);
            if let Some((_, writer)) = part.take() {
                written.push(writer.finish(&header)?);
            }
            let path = part_path(&base, &options.part_suffix(next), &extension);
            part = Some((next, PartWriter::create(path, &header, options.histogram)?));
        }
        if let Some((_, writer)) = part.as_mut() {
            writer.write_event(&lmf, event_number, time, &header, options)?;
        }
    }

    let writer = match part {
        Some((_, writer)) => writer,
        None => {
            warn!("No events to export");
            let path = part_path(&base, &options.part_suffix(0), &extension);
            PartWriter::create(path, &header, options.histogram)?
        }
    };
    written.push(writer.finish(&header)?);
    info!("Exported {exported} of {event_number} events");
    Ok(written)
}
