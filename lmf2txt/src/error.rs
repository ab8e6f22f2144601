use liblmf_io::error::{ConfigError, LmfError};
use std::sync::mpsc::SendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export failed due to LMF error: {0}")]
    LmfError(#[from] LmfError),
    #[error("Export failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("End time {end} s is not after start time {start} s")]
    BadWindow { start: f64, end: f64 },
    #[error("Invalid split: {0}")]
    BadSplit(String),
    #[error("Splitting into parts requires a file which declares its number of events")]
    UnknownEventCount,
    #[error("Histograms need a TDC8HP group range, the input has none")]
    NoGroupRange,
    #[error("Export failed to report progress: {0}")]
    SendError(#[from] SendError<f32>),
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Conversion failed due to LMF error: {0}")]
    LmfError(#[from] LmfError),
    #[error("Conversion failed due to config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Conversion failed to report progress: {0}")]
    SendError(#[from] SendError<f32>),
}
