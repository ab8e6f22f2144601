mod convert;
mod error;
mod export;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread::JoinHandle;

use liblmf_io::config::OutputConfig;
use liblmf_io::error::LmfError;
use liblmf_io::session::LmfIo;

use convert::convert;
use export::{export, ExportOptions, Split, TOOL_CHANNELS, TOOL_HITS};

fn make_template_config(path: &Path) -> std::io::Result<()> {
    let config = OutputConfig::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(std::io::Error::other)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())
}

fn log_header(path: &Path) -> Result<(), LmfError> {
    let mut lmf = LmfIo::new(TOOL_CHANNELS, TOOL_HITS);
    lmf.open_input_lmf(path)?;
    let size = path.metadata().map(|m| m.len()).unwrap_or(0);
    log::info!("File: {} ({})", path.display(), human_bytes::human_bytes(size as f64));
    if let Some(headers) = lmf.input_headers() {
        log::info!(
            "DAQ: {} (DAQ version {}, LMF version {})",
            headers.file.daq_id,
            headers.file.daq_version,
            lmf.lmf_version()
        );
        log::info!(
            "Channels: {} Max hits: {}",
            lmf.number_of_channels(),
            lmf.max_number_of_hits()
        );
        log::info!(
            "TDC resolution: {} ns Frequency: {} Hz",
            lmf.tdc_resolution(),
            lmf.frequency()
        );
        log::info!("Events: {}", lmf.number_of_events());
        if let (Some(start), Some(stop)) = (lmf.start_time(), lmf.stop_time()) {
            log::info!("Start: {start} Stop: {stop}");
        }
        if !headers.file.comment.is_empty() {
            log::info!("Comment: {}", headers.file.comment);
        }
        log::debug!("{:#?}", headers.variant);
    }
    Ok(())
}

fn export_options(matches: &ArgMatches) -> ExportOptions {
    let window = match (
        matches.get_one::<f64>("start"),
        matches.get_one::<f64>("end"),
    ) {
        (Some(start), Some(end)) => Some((*start, *end)),
        _ => None,
    };
    let split = if let Some(parts) = matches.get_one::<u64>("split") {
        Split::Parts(*parts)
    } else if let Some(seconds) = matches.get_one::<f64>("split-seconds") {
        Split::Seconds(*seconds)
    } else {
        Split::None
    };
    ExportOptions {
        output: matches.get_one::<String>("output").map(PathBuf::from),
        histogram: matches.get_flag("histogram"),
        window,
        split,
        keep_trigger_channel: matches.get_flag("trigger"),
        rising_edges: matches.get_flag("rising"),
        amplitude: matches.get_flag("amplitude"),
    }
}

/// Show the progress of a task until it finishes
fn track<T, E: std::fmt::Display>(
    pb_manager: &MultiProgress,
    rx: std::sync::mpsc::Receiver<f32>,
    handle: JoinHandle<Result<T, E>>,
) -> Option<T> {
    let pb = pb_manager.add(ProgressBar::new(100));
    // Ends once the task drops its sender
    for progress in rx.iter() {
        pb.set_position((progress * 100.0) as u64);
    }
    pb.finish();
    match handle.join() {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => {
            log::error!("{e}");
            None
        }
        Err(_) => {
            log::error!("Failed to join worker task!");
            None
        }
    }
}

fn input_arg() -> Arg {
    Arg::new("input").required(true).help("Path to the list mode file")
}

fn main() {
    // Create a cli
    let matches = Command::new("lmf2txt")
        .about("Export, convert and inspect list mode files")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("new")
                .about("Make a template output configuration yaml file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("info")
                .about("Log the decoded header of a list mode file")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("convert")
                .about("Re-encode a list mode file")
                .arg(input_arg())
                .arg(Arg::new("output").required(true))
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Yaml file with header overrides"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Write the events as tab separated text or a histogram")
                .arg(input_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Name of output file"),
                )
                .arg(
                    Arg::new("histogram")
                        .short('H')
                        .long("histogram")
                        .action(ArgAction::SetTrue)
                        .help("Histogram with TDC bin width"),
                )
                .arg(
                    Arg::new("start")
                        .short('a')
                        .long("start")
                        .value_parser(value_parser!(f64))
                        .requires("end")
                        .help("Limiting start time in [s]"),
                )
                .arg(
                    Arg::new("end")
                        .short('b')
                        .long("end")
                        .value_parser(value_parser!(f64))
                        .requires("start")
                        .help("Limiting end time in [s]"),
                )
                .arg(
                    Arg::new("split")
                        .short('s')
                        .long("split")
                        .value_parser(value_parser!(u64))
                        .conflicts_with("split-seconds")
                        .help("Split into this many parts"),
                )
                .arg(
                    Arg::new("split-seconds")
                        .short('S')
                        .long("split-seconds")
                        .value_parser(value_parser!(f64))
                        .help("Split every this many seconds"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("trigger")
                        .short('t')
                        .long("trigger")
                        .action(ArgAction::SetTrue)
                        .help("Include trigger channel"),
                )
                .arg(
                    Arg::new("rising")
                        .short('r')
                        .long("rising")
                        .action(ArgAction::SetTrue)
                        .help("Include rising edges in histograms"),
                )
                .arg(
                    Arg::new("amplitude")
                        .short('m')
                        .long("amplitude")
                        .action(ArgAction::SetTrue)
                        .help("Output amplitude"),
                ),
        )
        .get_matches();

    let verbose = matches
        .subcommand_matches("export")
        .is_some_and(|m| m.get_flag("verbose"));

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        if verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    match matches.subcommand() {
        Some(("new", sub)) => {
            let Some(path) = sub.get_one::<String>("path").map(PathBuf::from) else {
                return;
            };
            log::info!("Making a template config at {}...", path.to_string_lossy());
            match make_template_config(&path) {
                Ok(()) => log::info!("Done."),
                Err(e) => log::error!("Could not write template config: {e}"),
            }
        }
        Some(("info", sub)) => {
            let Some(input) = sub.get_one::<String>("input").map(PathBuf::from) else {
                return;
            };
            if let Err(e) = log_header(&input) {
                log::error!("{e}");
            }
        }
        Some(("convert", sub)) => {
            let (Some(input), Some(output)) = (
                sub.get_one::<String>("input").map(PathBuf::from),
                sub.get_one::<String>("output").map(PathBuf::from),
            ) else {
                return;
            };
            let config = match sub.get_one::<String>("config") {
                Some(path) => {
                    log::info!("Loading config from {path}...");
                    match OutputConfig::read_config_file(Path::new(path)) {
                        Ok(c) => Some(c),
                        Err(e) => {
                            log::error!("{e}");
                            return;
                        }
                    }
                }
                None => None,
            };
            let (tx, rx) = channel();
            let handle = std::thread::spawn(move || {
                let tx: Sender<f32> = tx;
                convert(&input, &output, config.as_ref(), &tx)
            });
            if let Some(events) = track(&pb_manager, rx, handle) {
                log::info!("Successfully converted {events} events!");
            }
        }
        Some(("export", sub)) => {
            let Some(input) = sub.get_one::<String>("input").map(PathBuf::from) else {
                return;
            };
            let options = export_options(sub);
            log::debug!("Export options: {options:?}");
            let (tx, rx) = channel();
            let handle = std::thread::spawn(move || {
                let tx: Sender<f32> = tx;
                export(&input, &options, &tx)
            });
            if let Some(paths) = track(&pb_manager, rx, handle) {
                for path in paths {
                    log::info!("Wrote {}", path.display());
                }
            }
        }
        _ => (),
    }

    log::info!("Done.");
}
