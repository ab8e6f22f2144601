//! Wire-format literals of the list mode file format.
//!
//! None of these are tunable. They are compared bit-for-bit against values found in
//! files written by the acquisition software over two decades.

// Archive markers found in the first word of a Cobold list mode file
pub const ARCHIVE_MARKER_2002: u32 = 476758;
pub const ARCHIVE_MARKER_2008: u32 = 476759;
pub const ARCHIVE_MARKER_MASK: u32 = 0x1FFF_FFFF;

// Optional string-array blocks announced in the archive flag
pub const DAQ_SOURCE_CODE: u32 = 0x8000_0000;
pub const DAN_SOURCE_CODE: u32 = 0x4000_0000;
pub const CCF_HISTORY_CODE: u32 = 0x2000_0000;

// Data formats
pub const LM_USERDEF: i32 = -1;
pub const LM_SHORT: i32 = 2;
pub const LM_DOUBLE: i32 = 5;
pub const LM_CAMAC: i32 = 6;
pub const LM_SLONG: i32 = 10;

// DAQ version thresholds gating optional header fields
pub const DAQ_VERSION_2002: i32 = 20020408;
pub const DAQ_VERSION_2006: i32 = 20060000;
pub const DAQ_VERSION_2007: i32 = 20070000;
pub const DAQ_VERSION_2008: i32 = 20080000;
pub const DAQ_VERSION_20080507: i32 = 20080507;
pub const DAQ_VERSION_20110208: i32 = 20110208;

/// First word of a 64-bit CTime start/stop time triple.
pub const CTIME_SENTINEL: u32 = 8;

/// Size of the user header fields preceding the variant body (size, DAQ version, DAQ id).
pub const USER_HEADER_PREAMBLE_2002: u64 = 12;
/// Same as [`USER_HEADER_PREAMBLE_2002`] plus the repeated LMF header version word and
/// the 64-bit size field.
pub const USER_HEADER_PREAMBLE_2008: u64 = 20;

/// Header size of a non-Cobold file: DAQ id, channels, hits.
pub const NON_COBOLD_HEADER_SIZE: u64 = 12;

// Variable length event records
pub const EVENT_MARKER: u64 = 0xFF00_0000_0000_0000;
pub const EVENT_LENGTH_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;
pub const MAX_POST_EVENT_DATA: usize = 20_000;

// Parameter table and the per-event changed mask
pub const NUMBER_OF_PARAMETERS: usize = 10_000;
pub const CHANGED_MASK_FIRST_PARAMETER: usize = 901;
pub const CHANGED_MASK_PARAMETERS: usize = 32;

// TDC calibration tables
pub const CALIBRATION_TABLE_SIZE: usize = 8 * 1024;
pub const MAX_CALIBRATION_BLOCKS: usize = 3;

// Known-exception thresholds
pub const HM1_ABM_OVERSIZED_USER_HEADER: u64 = 100_000;
pub const TDC8_TOLERATED_LMF_VERSION: i32 = 0x8;

// TDC8HP group mode words
pub const GROUP_FRAGMENT_MASK: u32 = 0x00FF_FFFF;
pub const ROLLOVER_PERIOD: u64 = 1 << 24;
