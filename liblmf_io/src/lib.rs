//! # liblmf_io
//!
//! liblmf_io reads and writes list mode files (LMF), the binary event stream format
//! written by the Cobold acquisition software and its predecessors for TDC and ADC based
//! detector readout. A file consists of a self-describing, versioned header followed by
//! event records holding per-channel hit times (or ADC waveform packets, CAMAC words,
//! raw TDC words).
//!
//! ## Supported acquisition systems
//!
//! | DAQ | read | write |
//! |---|---|---|
//! | TDC8, 2TDC8 (TDC8PCI2) | yes | yes |
//! | HM1, HM1_ABM, 2HM1 | yes | yes |
//! | TDC8HP, TDC8HPRAW (group mode) | yes | yes (DAQ version 20080000 and later) |
//! | TDC8HQRAW, TDC4HM | yes | no |
//! | fADC4, fADC8 | yes | no |
//! | CAMAC | yes | yes |
//! | TCP/IP | yes | yes |
//! | SIMPLE, RAW32BIT (no Cobold header) | yes | yes |
//!
//! Headers written by two decades of software versions do not always agree with their
//! own declared sizes. The decoder validates every header against the declared user header
//! size and retries alternative field layouts before giving up.
//!
//! ## Usage
//!
//! ```no_run
//! use liblmf_io::session::LmfIo;
//! use std::path::Path;
//!
//! let mut lmf = LmfIo::new(32, 16);
//! lmf.open_input_lmf(Path::new("run_0001.lmf")).unwrap();
//! let mut counts = vec![0u32; 32];
//! while lmf.read_next_event().unwrap() {
//!     lmf.number_of_hits_array(&mut counts);
//!     let first_channel = lmf.hits(0);
//!     println!("{} {:?}", lmf.double_timestamp(), first_channel);
//! }
//! ```
//!
//! Errors are returned as [`error::LmfError`]. The session additionally keeps the integer
//! code of the last error (see [`session::LmfIo::error_status`]) until the next
//! successful open.
//!
//! ## Converting
//!
//! An output file takes its headers from the input unless overridden through
//! [`session::LmfIo::output_mut`] or an [`config::OutputConfig`] YAML file:
//!
//! ```yml
//! daq_id: Tdc8hp
//! daq_version: null
//! lmf_version: 10
//! era: null
//! data_format: null
//! timestamp_format: null
//! number_of_channels: null
//! max_number_of_hits: null
//! frequency: null
//! resolution: null
//! tdc_data_type: null
//! variable_event_length: 1
//! daq_info: null
//! comment: converted
//! ```
pub mod adc;
pub mod archive;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod cstring;
pub mod cursor;
pub mod daq;
pub mod error;
pub mod event;
pub mod event_reader;
pub mod event_writer;
pub mod group_mode;
pub mod hit_array;
pub mod output;
pub mod parameters;
pub mod record;
pub mod seek;
pub mod session;
pub mod variants;
