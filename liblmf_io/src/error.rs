use std::path::PathBuf;
use thiserror::Error;

/// Fixed message for every error code, indexed by [`LmfError::code`].
pub const ERROR_TEXT: [&str; 20] = [
    "no error",
    "error reading timestamp",
    "error reading data",
    "input file is already open",
    "could not open input file",
    "error reading header",
    "LMF data source or data format is not supported",
    "no input file open",
    "no output file open",
    "could not open output file",
    "output file is already open",
    "tried to use uninitialized parameters",
    "reading CAMAC-data with wrong function",
    "seek does not work with variable event lengths",
    "write function not implemented for this DAQ version",
    "end of file",
    "more channels in file than specified at construction",
    "more hits per channel in file than specified at construction",
    "post-event data exceeds reserved size",
    "I/O operation failed",
];

/// Get the fixed message belonging to an error code. Unknown codes get an empty string.
pub fn error_text(code: i32) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|idx| ERROR_TEXT.get(idx))
        .copied()
        .unwrap_or("")
}

#[derive(Debug, Error)]
pub enum LmfError {
    #[error("Error reading timestamp of event {0}")]
    TimestampRead(u64),
    #[error("Error reading data of event {0}: {1}")]
    DataRead(u64, String),
    #[error("Input file is already open")]
    InputAlreadyOpen,
    #[error("Could not open input file {0:?}: {1}")]
    InputOpen(PathBuf, std::io::Error),
    #[error("Error reading header: {0}")]
    HeaderRead(String),
    #[error("LMF data source or format not supported: {0}")]
    UnsupportedSource(String),
    #[error("No input file open")]
    InputNotOpen,
    #[error("No output file open")]
    OutputNotOpen,
    #[error("Could not open output file {0:?}: {1}")]
    OutputOpen(PathBuf, std::io::Error),
    #[error("Output file is already open")]
    OutputAlreadyOpen,
    #[error("Tried to use uninitialized parameter: {0}")]
    UninitializedParameters(&'static str),
    #[error("Reading CAMAC data with wrong function")]
    WrongReadFunctionForCamac,
    #[error("Seek does not work with variable event lengths")]
    SeekUnsupported,
    #[error("Write function not implemented for DAQ version {0}")]
    WriteUnsupportedForDaqVersion(i32),
    #[error("Reached end of file")]
    EndOfFile,
    #[error("More channels in file ({found}) than specified at construction ({max})")]
    TooManyChannels { found: u64, max: usize },
    #[error("More hits per channel in file ({found}) than specified at construction ({max})")]
    TooManyHits { found: u64, max: usize },
    #[error("Post-event data of {size} bytes exceeds reserved size of {max} bytes")]
    PostEventDataTooLarge { size: usize, max: usize },
    #[error("LMF I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LmfError {
    /// The stable integer code of this error, used as the sticky session status.
    pub fn code(&self) -> i32 {
        match self {
            Self::TimestampRead(_) => 1,
            Self::DataRead(..) => 2,
            Self::InputAlreadyOpen => 3,
            Self::InputOpen(..) => 4,
            Self::HeaderRead(_) => 5,
            Self::UnsupportedSource(_) => 6,
            Self::InputNotOpen => 7,
            Self::OutputNotOpen => 8,
            Self::OutputOpen(..) => 9,
            Self::OutputAlreadyOpen => 10,
            Self::UninitializedParameters(_) => 11,
            Self::WrongReadFunctionForCamac => 12,
            Self::SeekUnsupported => 13,
            Self::WriteUnsupportedForDaqVersion(_) => 14,
            Self::EndOfFile => 15,
            Self::TooManyChannels { .. } => 16,
            Self::TooManyHits { .. } => 17,
            Self::PostEventDataTooLarge { .. } => 18,
            Self::Io(_) => 19,
        }
    }

    /// Capacity errors abort a header decode without trying another layout.
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::TooManyChannels { .. } | Self::TooManyHits { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}
