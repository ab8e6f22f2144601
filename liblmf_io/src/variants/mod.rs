//! User header decoders and encoders, one per acquisition system.
//!
//! A decoder may not get the layout right on the first try: files from some software
//! releases omit optional blocks without saying so. [`VariantHeader::decode`] therefore
//! tries an ordered list of [`Layout`] hypotheses, rewinding between attempts, and accepts
//! the first one whose size matches the declared user header size.
pub mod camac;
pub mod fadc;
pub mod hm1;
pub mod tcpip;
pub mod tdc4hm;
pub mod tdc8hp;
pub mod tdc8hq;
pub mod tdc8pci2;

use log::{debug, warn};
use std::io::{Read, Seek, Write};

use super::constants::*;
use super::cursor::ByteCursor;
use super::daq::{check_channels, check_hits, DaqCommon, DaqId, DecodeContext, EncodeContext};
use super::error::LmfError;

use camac::CamacHeader;
use fadc::{Fadc4Header, Fadc8Header};
use hm1::Hm1Header;
use tcpip::TcpipHeader;
use tdc4hm::Tdc4hmHeader;
use tdc8hp::{user_header_version, Tdc8hpHeader};
use tdc8hq::Tdc8hqHeader;
use tdc8pci2::Tdc8Pci2Header;

/// Field-presence hypothesis used while decoding a user header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Standard,
    /// TDC8PCI2 header without the per-card parameter blocks
    NoCardBlock,
    /// 2TDC8 header carrying only the first card's parameters
    FirstCardOnly,
    /// HM1 header without the use-normal-method word
    NoNormalMethod,
    /// Old TDC8HP header without the three file names
    NoFileNames,
    /// New TDC8HP header without calibration blocks
    NoCalibration,
}

/// Ordered decode hypotheses per acquisition system
fn hypotheses(ctx: &DecodeContext) -> &'static [Layout] {
    match ctx.daq_id {
        DaqId::Tdc8 => &[Layout::Standard, Layout::NoCardBlock],
        DaqId::DualTdc8 => &[Layout::Standard, Layout::NoCardBlock, Layout::FirstCardOnly],
        DaqId::Hm1 | DaqId::Hm1Abm | DaqId::DualHm1 => &[Layout::Standard, Layout::NoNormalMethod],
        DaqId::Tdc8hp | DaqId::Tdc8hpRaw => {
            // The LMF version is not known yet, so the base ladder decides
            if ctx.daq_version >= DAQ_VERSION_2008 {
                &[Layout::Standard, Layout::NoCalibration, Layout::NoFileNames]
            } else {
                &[Layout::Standard, Layout::NoFileNames]
            }
        }
        _ => &[Layout::Standard],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantHeader {
    Tdc8Pci2(Tdc8Pci2Header),
    Hm1(Hm1Header),
    Tdc8hp(Tdc8hpHeader),
    Tdc8hq(Tdc8hqHeader),
    Tdc4hm(Tdc4hmHeader),
    Fadc4(Fadc4Header),
    Fadc8(Fadc8Header),
    Camac(CamacHeader),
    Tcpip(TcpipHeader),
    /// Three-field header of SIMPLE and RAW32BIT files
    NonCobold(DaqCommon),
}

impl VariantHeader {
    /// An empty header of the kind used by the given acquisition system
    pub fn default_for(daq_id: DaqId) -> Self {
        match daq_id {
            DaqId::Tdc8 | DaqId::DualTdc8 => Self::Tdc8Pci2(Tdc8Pci2Header::default()),
            DaqId::Hm1 | DaqId::Hm1Abm | DaqId::DualHm1 => Self::Hm1(Hm1Header::default()),
            DaqId::Tdc8hp | DaqId::Tdc8hpRaw => Self::Tdc8hp(Tdc8hpHeader::default()),
            DaqId::Tdc8hqRaw => Self::Tdc8hq(Tdc8hqHeader::default()),
            DaqId::Tdc4hm => Self::Tdc4hm(Tdc4hmHeader::default()),
            DaqId::Fadc4 => Self::Fadc4(Fadc4Header::default()),
            DaqId::Fadc8 => Self::Fadc8(Fadc8Header::default()),
            DaqId::Camac => Self::Camac(CamacHeader {
                common: DaqCommon {
                    data_format: LM_CAMAC,
                    ..Default::default()
                },
                ..Default::default()
            }),
            DaqId::Tcpip => Self::Tcpip(TcpipHeader::default()),
            DaqId::Raw32Bit | DaqId::Simple => Self::NonCobold(DaqCommon {
                data_format: LM_SLONG,
                ..Default::default()
            }),
        }
    }

    /// Whether this header kind can describe files of the given acquisition system
    pub fn fits(&self, daq_id: DaqId) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&Self::default_for(daq_id))
    }

    pub fn common(&self) -> &DaqCommon {
        match self {
            Self::Tdc8Pci2(h) => &h.common,
            Self::Hm1(h) => &h.common,
            Self::Tdc8hp(h) => &h.common,
            Self::Tdc8hq(h) => &h.common,
            Self::Tdc4hm(h) => &h.common,
            Self::Fadc4(h) => &h.common,
            Self::Fadc8(h) => &h.common,
            Self::Camac(h) => &h.common,
            Self::Tcpip(h) => &h.common,
            Self::NonCobold(common) => common,
        }
    }

    pub fn common_mut(&mut self) -> &mut DaqCommon {
        match self {
            Self::Tdc8Pci2(h) => &mut h.common,
            Self::Hm1(h) => &mut h.common,
            Self::Tdc8hp(h) => &mut h.common,
            Self::Tdc8hq(h) => &mut h.common,
            Self::Tdc4hm(h) => &mut h.common,
            Self::Fadc4(h) => &mut h.common,
            Self::Fadc8(h) => &mut h.common,
            Self::Camac(h) => &mut h.common,
            Self::Tcpip(h) => &mut h.common,
            Self::NonCobold(common) => common,
        }
    }

    /// Decode the variant body. The cursor must sit right after the user header preamble.
    ///
    /// Capacity errors abort immediately. Any other failure or a size mismatch moves on to
    /// the next layout hypothesis; a mismatch on a known-exception version combination is
    /// accepted and the cursor is moved to the end of the declared user header.
    pub fn decode<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
    ) -> Result<Self, LmfError> {
        let start = cursor.tell();
        let expected = ctx.expected_body_size();
        let mut last_problem = String::new();
        for (attempt, layout) in hypotheses(ctx).iter().enumerate() {
            if attempt > 0 {
                cursor.seek(start)?;
            }
            debug!("Decoding {} user header as {:?}", ctx.daq_id, layout);
            let header = match Self::read_body(cursor, ctx, *layout) {
                Ok(header) => header,
                Err(e) if e.is_capacity_error() => return Err(e),
                Err(e @ LmfError::UnsupportedSource(_)) => return Err(e),
                Err(e) => {
                    debug!("{} user header as {:?} failed: {}", ctx.daq_id, layout, e);
                    last_problem = e.to_string();
                    continue;
                }
            };
            if !header.layout_applies(*layout) {
                debug!(
                    "{:?} does not apply to this {} user header generation",
                    layout, ctx.daq_id
                );
                continue;
            }
            let consumed = cursor.tell() - start;
            let padded = header.needs_defensive_skip() && consumed < expected;
            if consumed == expected || padded {
                if attempt > 0 {
                    warn!(
                        "{} user header only matched its declared size as {:?}",
                        ctx.daq_id, layout
                    );
                }
                if padded {
                    debug!(
                        "Skipping {} bytes after the {} user header",
                        expected - consumed,
                        ctx.daq_id
                    );
                    cursor.seek(ctx.header_size + ctx.user_header_size)?;
                }
                return Ok(header);
            }
            if attempt == 0 && header.is_known_exception(ctx) {
                warn!(
                    "Accepting {} user header of {} bytes declared as {} bytes (DAQ version {})",
                    ctx.daq_id, consumed, expected, ctx.daq_version
                );
                cursor.seek(ctx.header_size + ctx.user_header_size)?;
                return Ok(header);
            }
            warn!(
                "{} user header as {:?} consumed {} bytes, expected {}",
                ctx.daq_id, layout, consumed, expected
            );
            last_problem = format!("consumed {consumed} bytes, expected {expected}");
        }
        Err(LmfError::HeaderRead(format!(
            "no layout of the {} user header fits: {}",
            ctx.daq_id, last_problem
        )))
    }

    fn read_body<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        ctx: &DecodeContext,
        layout: Layout,
    ) -> Result<Self, LmfError> {
        Ok(match ctx.daq_id {
            DaqId::Tdc8 | DaqId::DualTdc8 => {
                Self::Tdc8Pci2(Tdc8Pci2Header::read(cursor, ctx, layout)?)
            }
            DaqId::Hm1 | DaqId::Hm1Abm | DaqId::DualHm1 => {
                Self::Hm1(Hm1Header::read(cursor, ctx, layout)?)
            }
            DaqId::Tdc8hp | DaqId::Tdc8hpRaw => {
                Self::Tdc8hp(Tdc8hpHeader::read(cursor, ctx, layout)?)
            }
            DaqId::Tdc8hqRaw => Self::Tdc8hq(Tdc8hqHeader::read(cursor, ctx)?),
            DaqId::Tdc4hm => Self::Tdc4hm(Tdc4hmHeader::read(cursor, ctx)?),
            DaqId::Fadc4 => Self::Fadc4(Fadc4Header::read(cursor, ctx)?),
            DaqId::Fadc8 => Self::Fadc8(Fadc8Header::read(cursor, ctx)?),
            DaqId::Camac => Self::Camac(CamacHeader::read(cursor, ctx)?),
            DaqId::Tcpip => Self::Tcpip(TcpipHeader::read(cursor, ctx)?),
            DaqId::Raw32Bit | DaqId::Simple => {
                return Err(LmfError::UnsupportedSource(format!(
                    "{} has no Cobold user header",
                    ctx.daq_id
                )))
            }
        })
    }

    fn is_known_exception(&self, ctx: &DecodeContext) -> bool {
        match self {
            Self::Tdc8Pci2(h) => h.is_known_exception(ctx),
            Self::Hm1(h) => h.is_known_exception(ctx),
            _ => false,
        }
    }

    /// TDC8HP hypotheses belong to one header generation each
    fn layout_applies(&self, layout: Layout) -> bool {
        match self {
            Self::Tdc8hp(h) => {
                let new_layout = h.user_header_version >= 5;
                !(new_layout && layout == Layout::NoFileNames
                    || !new_layout && layout == Layout::NoCalibration)
            }
            _ => true,
        }
    }

    /// New style TDC8HP headers may be followed by padding up to the declared size
    fn needs_defensive_skip(&self) -> bool {
        matches!(self, Self::Tdc8hp(h) if h.user_header_version >= 5)
    }

    /// Encode the variant body
    pub fn write<T: Write + Seek>(
        &self,
        cursor: &mut ByteCursor<T>,
        ctx: &EncodeContext,
    ) -> Result<(), LmfError> {
        match self {
            Self::Tdc8Pci2(h) => h.write(cursor, ctx),
            Self::Hm1(h) => h.write(cursor, ctx),
            Self::Tdc8hp(h) => h.write(cursor, ctx),
            Self::Camac(h) => h.write(cursor, ctx),
            Self::Tcpip(h) => h.write(cursor, ctx),
            Self::Tdc8hq(_) | Self::Tdc4hm(_) | Self::Fadc4(_) | Self::Fadc8(_) => {
                Err(LmfError::UnsupportedSource(format!(
                    "writing {} headers is not implemented",
                    ctx.daq_id
                )))
            }
            Self::NonCobold(common) => {
                cursor.write_i32(ctx.daq_id.code())?;
                cursor.write_i32(common.number_of_channels as i32)?;
                cursor.write_i32(common.max_number_of_hits as i32)?;
                Ok(())
            }
        }
    }

    /// Writing the header requires a writable kind and, for TDC8HP, a recent DAQ version
    pub fn check_writable(&self, ctx: &EncodeContext) -> Result<(), LmfError> {
        match self {
            Self::Tdc8hq(_) | Self::Tdc4hm(_) | Self::Fadc4(_) | Self::Fadc8(_) => Err(
                LmfError::UnsupportedSource(format!("writing {} files is not implemented", ctx.daq_id)),
            ),
            Self::Tdc8hp(_) if ctx.daq_version < DAQ_VERSION_2008 => {
                Err(LmfError::WriteUnsupportedForDaqVersion(ctx.daq_version))
            }
            _ => Ok(()),
        }
    }

    /// Read the header of a SIMPLE or RAW32BIT file from the start of the file
    pub fn read_non_cobold<T: Read + Seek>(
        cursor: &mut ByteCursor<T>,
        max_channels: usize,
        max_hits: usize,
    ) -> Result<(DaqId, Self), LmfError> {
        let code = cursor.read_i32()?;
        let daq_id = match DaqId::from_code(code) {
            Some(id) if id.is_non_cobold() => id,
            _ => {
                return Err(LmfError::UnsupportedSource(format!(
                    "first word {code:#x} is neither an archive marker nor a known DAQ id"
                )))
            }
        };
        let channels = cursor.read_i32()?;
        let hits = cursor.read_i32()?;
        if channels < 0 || hits < 0 {
            return Err(LmfError::HeaderRead(format!(
                "negative channel ({channels}) or hit ({hits}) count"
            )));
        }
        check_channels(channels as u64, max_channels)?;
        check_hits(hits as u64, max_hits)?;
        Ok((
            daq_id,
            Self::NonCobold(DaqCommon {
                number_of_channels: channels as u64,
                max_number_of_hits: hits as u64,
                data_format: LM_SLONG,
                ..Default::default()
            }),
        ))
    }

    pub fn as_tdc8hp(&self) -> Option<&Tdc8hpHeader> {
        match self {
            Self::Tdc8hp(h) => Some(h),
            _ => None,
        }
    }

    /// TDC8HP user header version, used by the TDC8HP specific accessors
    pub fn tdc8hp_user_header_version(&self, daq_version: i32) -> Option<i32> {
        self.as_tdc8hp()
            .map(|h| user_header_version(daq_version, h.common.lmf_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daq::{ArchiveEra, CardSettings, LimitWidth};
    use super::hm1::ABM_BLOCK_WORDS;
    use std::io::Cursor;

    fn encode(header: &VariantHeader, ctx: &EncodeContext) -> Vec<u8> {
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        header.write(&mut cursor, ctx).unwrap();
        cursor.into_inner().into_inner()
    }

    fn decode_ctx(ctx: &EncodeContext, body_len: usize) -> DecodeContext {
        DecodeContext {
            daq_version: ctx.daq_version,
            daq_id: ctx.daq_id,
            era: ctx.era,
            daq_source_flag: ctx.daq_source_flag,
            header_size: 0,
            user_header_size: body_len as u64 + ctx.era.preamble(),
            max_channels: 64,
            max_hits: 64,
        }
    }

    /// Place the body behind a zeroed preamble, as it sits in a file
    pub(super) fn body_cursor(bytes: &[u8], ctx: &DecodeContext) -> ByteCursor<Cursor<Vec<u8>>> {
        let mut padded = vec![0u8; ctx.era.preamble() as usize];
        padded.extend_from_slice(bytes);
        let mut cursor = ByteCursor::new(Cursor::new(padded));
        cursor.seek(ctx.era.preamble()).unwrap();
        cursor
    }

    /// Context of a 2011 file without DAQ source strings
    pub(super) fn read_only_ctx(daq_id: DaqId, body_len: usize) -> DecodeContext {
        let context = EncodeContext {
            daq_version: DAQ_VERSION_20110208,
            daq_id,
            era: ArchiveEra::Era2008,
            daq_source_flag: false,
        };
        decode_ctx(&context, body_len)
    }

    /// Start of the TDC8HQ, TDC4HM and fADC headers, up to the data format
    pub(super) fn write_read_only_common(
        cursor: &mut ByteCursor<Cursor<Vec<u8>>>,
        common: &DaqCommon,
    ) {
        common.write_prefix(cursor).unwrap();
        cursor.write_i32(common.lmf_version).unwrap();
        cursor.write_i32(common.time_reference).unwrap();
        cursor.write_f64(common.resolution).unwrap();
        cursor.write_i32(common.tdc_data_type).unwrap();
        common.write_limits(cursor, LimitWidth::U64).unwrap();
        cursor.write_i32(common.data_format).unwrap();
    }

    fn tdc_common(lmf_version: i32) -> DaqCommon {
        DaqCommon {
            frequency: 1.0e6,
            timestamp_format: 2,
            daq_info: String::from("test rig"),
            lmf_version,
            daq_source_strings: vec![String::from("main.cpp")],
            resolution: 0.5,
            tdc_data_type: 1,
            number_of_channels: 8,
            max_number_of_hits: 16,
            data_format: LM_SLONG,
            ..Default::default()
        }
    }

    /// Every writable header must decode to itself and consume exactly its declared size
    fn check_exact(header: VariantHeader, ctx: EncodeContext) {
        let bytes = encode(&header, &ctx);
        let dctx = decode_ctx(&ctx, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        let decoded = VariantHeader::decode(&mut cursor, &dctx).unwrap();
        assert_eq!(cursor.tell(), dctx.user_header_size);
        assert_eq!(decoded.common(), header.common());
    }

    fn ctx(daq_id: DaqId, daq_version: i32) -> EncodeContext {
        EncodeContext {
            daq_version,
            daq_id,
            era: ArchiveEra::Era2008,
            daq_source_flag: true,
        }
    }

    #[test]
    fn test_byte_count_invariant() {
        for (daq_version, lmf) in [(DAQ_VERSION_2002, 0), (DAQ_VERSION_20080507, 8), (DAQ_VERSION_20110208, 10)] {
            let mut common = tdc_common(lmf);
            if daq_version < DAQ_VERSION_20110208 {
                common.daq_source_strings.clear();
            }
            if daq_version < DAQ_VERSION_20080507 {
                common.lmf_version = 0;
            }
            if lmf >= 9 {
                common.variable_event_length = 1;
            }
            let header = Tdc8Pci2Header {
                common: common.clone(),
                cards: [CardSettings { gate_delay: 3, ..Default::default() }; 2],
                use_normal_method: if daq_version >= DAQ_VERSION_20080507 { 1 } else { 0 },
                ..Default::default()
            };
            check_exact(VariantHeader::Tdc8Pci2(header.clone()), ctx(DaqId::DualTdc8, daq_version));
            check_exact(VariantHeader::Tdc8Pci2(header), ctx(DaqId::Tdc8, daq_version));
            for id in [DaqId::Hm1, DaqId::Hm1Abm, DaqId::DualHm1] {
                let hm1 = Hm1Header {
                    common: common.clone(),
                    ..Default::default()
                };
                check_exact(VariantHeader::Hm1(hm1), ctx(id, daq_version));
            }
            let mut tcpip = common.clone();
            tcpip.variable_event_length = 0;
            check_exact(
                VariantHeader::Tcpip(TcpipHeader { common: tcpip, ..Default::default() }),
                ctx(DaqId::Tcpip, daq_version),
            );
            let mut camac = common.clone();
            camac.data_format = LM_CAMAC;
            camac.number_of_channels = 0;
            camac.max_number_of_hits = 0;
            camac.resolution = 0.0;
            camac.tdc_data_type = 0;
            camac.variable_event_length = 0;
            check_exact(
                VariantHeader::Camac(CamacHeader { common: camac, ..Default::default() }),
                ctx(DaqId::Camac, daq_version),
            );
        }
        for lmf in [7, 8, 9, 10] {
            let mut common = tdc_common(lmf);
            if lmf < 10 {
                common.daq_source_strings.clear();
            }
            let header = Tdc8hpHeader {
                common,
                user_header_version: user_header_version(DAQ_VERSION_20110208, lmf),
                calibrations: vec![Default::default()],
                ..Default::default()
            };
            let mut header = header;
            if header.user_header_version < 5 {
                header.calibrations.clear();
            }
            check_exact(VariantHeader::Tdc8hp(header), ctx(DaqId::Tdc8hp, DAQ_VERSION_20110208));
        }
    }

    #[test]
    fn test_size_mismatch_retries_then_fails() {
        let context = ctx(DaqId::Hm1, DAQ_VERSION_20080507);
        let header = VariantHeader::Hm1(Hm1Header {
            common: tdc_common(8),
            ..Default::default()
        });
        let bytes = encode(&header, &context);
        // One byte too many declared: no hypothesis fits
        let dctx = decode_ctx(&context, bytes.len() + 1);
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 5);

        // Four bytes too few declared: the header without use-normal-method fits
        let dctx = decode_ctx(&context, bytes.len() - 4);
        let mut cursor = body_cursor(&bytes, &dctx);
        let decoded = VariantHeader::decode(&mut cursor, &dctx).unwrap();
        assert_eq!(decoded.common().number_of_channels, 8);
    }

    #[test]
    fn test_tdc8_lmf8_exception() {
        let context = ctx(DaqId::Tdc8, DAQ_VERSION_20080507);
        let header = VariantHeader::Tdc8Pci2(Tdc8Pci2Header {
            common: tdc_common(8),
            ..Default::default()
        });
        let mut bytes = encode(&header, &context);
        bytes.extend_from_slice(&[0u8; 6]);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        let decoded = VariantHeader::decode(&mut cursor, &dctx).unwrap();
        assert_eq!(decoded.common().lmf_version, 8);
        assert_eq!(cursor.tell(), dctx.header_size + dctx.user_header_size);

        // The same mismatch for 2TDC8 is fatal
        let context = ctx(DaqId::DualTdc8, DAQ_VERSION_20080507);
        let mut bytes = encode(&header, &context);
        bytes.extend_from_slice(&[0u8; 6]);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 5);
    }

    #[test]
    fn test_capacity_aborts_without_retry() {
        let context = ctx(DaqId::Tdc8, DAQ_VERSION_20080507);
        let header = VariantHeader::Tdc8Pci2(Tdc8Pci2Header {
            common: tdc_common(8),
            ..Default::default()
        });
        let bytes = encode(&header, &context);
        let mut dctx = decode_ctx(&context, bytes.len());
        dctx.max_channels = 4;
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 16);
        dctx.max_channels = 8;
        dctx.max_hits = 15;
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 17);
    }

    #[test]
    fn test_read_only_headers_refuse_to_write() {
        let context = ctx(DaqId::Tdc8hqRaw, DAQ_VERSION_20110208);
        let header = VariantHeader::default_for(DaqId::Tdc8hqRaw);
        assert_eq!(header.check_writable(&context).unwrap_err().code(), 6);
        let mut cursor = ByteCursor::new(Cursor::new(Vec::new()));
        assert_eq!(header.write(&mut cursor, &context).unwrap_err().code(), 6);

        let old = ctx(DaqId::Tdc8hp, DAQ_VERSION_2007);
        let header = VariantHeader::default_for(DaqId::Tdc8hp);
        assert_eq!(header.check_writable(&old).unwrap_err().code(), 14);
    }

    #[test]
    fn test_hm1_abm_oversized_exception() {
        let header = VariantHeader::Hm1(Hm1Header {
            common: tdc_common(8),
            abm: [2; ABM_BLOCK_WORDS],
            ..Default::default()
        });
        let context = ctx(DaqId::Hm1Abm, DAQ_VERSION_20080507);
        let bytes = encode(&header, &context);
        let mut dctx = decode_ctx(&context, bytes.len());
        dctx.user_header_size = HM1_ABM_OVERSIZED_USER_HEADER + 1;
        let mut cursor = body_cursor(&bytes, &dctx);
        let VariantHeader::Hm1(decoded) = VariantHeader::decode(&mut cursor, &dctx).unwrap() else {
            panic!("not an HM1 header");
        };
        assert_eq!(decoded.abm, [2; ABM_BLOCK_WORDS]);
        assert_eq!(decoded.common.number_of_channels, 8);
        assert_eq!(cursor.tell(), dctx.header_size + dctx.user_header_size);

        // Only HM1_ABM files of that DAQ version get the allowance
        let context = ctx(DaqId::Hm1, DAQ_VERSION_20080507);
        let bytes = encode(&header, &context);
        let mut dctx = decode_ctx(&context, bytes.len());
        dctx.user_header_size = HM1_ABM_OVERSIZED_USER_HEADER + 1;
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 5);

        let context = ctx(DaqId::Hm1Abm, DAQ_VERSION_20110208);
        let bytes = encode(&header, &context);
        let mut dctx = decode_ctx(&context, bytes.len());
        dctx.user_header_size = HM1_ABM_OVERSIZED_USER_HEADER + 1;
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 5);
    }

    #[test]
    fn test_dual_tdc8_first_card_only() {
        // Laid out like a single card header, but declared as 2TDC8
        let header = VariantHeader::Tdc8Pci2(Tdc8Pci2Header {
            common: tdc_common(8),
            cards: [
                CardSettings {
                    gate_delay: 3,
                    open_time: 40,
                    ..Default::default()
                },
                CardSettings::default(),
            ],
            use_normal_method: 1,
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8, DAQ_VERSION_20080507);
        let bytes = encode(&header, &context);
        let mut dctx = decode_ctx(&context, bytes.len());
        dctx.daq_id = DaqId::DualTdc8;
        let mut cursor = body_cursor(&bytes, &dctx);
        let VariantHeader::Tdc8Pci2(decoded) = VariantHeader::decode(&mut cursor, &dctx).unwrap()
        else {
            panic!("not a TDC8PCI2 header");
        };
        assert_eq!(decoded.cards[0].gate_delay, 3);
        assert_eq!(decoded.cards[0].open_time, 40);
        assert_eq!(decoded.cards[1], CardSettings::default());
        assert_eq!(decoded.use_normal_method, 1);
        assert_eq!(decoded.use_normal_method_2nd, 0);
        assert_eq!(cursor.tell(), dctx.user_header_size);
    }

    #[test]
    fn test_tdc8hp_missing_calibration_count() {
        let header = VariantHeader::Tdc8hp(Tdc8hpHeader {
            common: tdc_common(10),
            trigger_channel: 7,
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8hp, DAQ_VERSION_20110208);
        let mut bytes = encode(&header, &context);
        bytes.truncate(bytes.len() - 4);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        let VariantHeader::Tdc8hp(decoded) = VariantHeader::decode(&mut cursor, &dctx).unwrap()
        else {
            panic!("not a TDC8HP header");
        };
        assert_eq!(decoded.user_header_version, 7);
        assert_eq!(decoded.trigger_channel, 7);
        assert!(decoded.calibrations.is_empty());
        assert_eq!(cursor.tell(), dctx.user_header_size);
    }

    #[test]
    fn test_tdc8hp_missing_file_names() {
        let header = VariantHeader::Tdc8hp(Tdc8hpHeader {
            common: tdc_common(7),
            trigger_channel: 5,
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8hp, DAQ_VERSION_2008);
        let mut bytes = encode(&header, &context);
        // Three empty names sit in front of the sync channel and the 25 ps flag
        let names = bytes.len() - 8 - 12;
        bytes.drain(names..names + 12);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        let VariantHeader::Tdc8hp(decoded) = VariantHeader::decode(&mut cursor, &dctx).unwrap()
        else {
            panic!("not a TDC8HP header");
        };
        assert_eq!(decoded.user_header_version, 4);
        assert_eq!(decoded.trigger_channel, 5);
        assert_eq!(decoded.common.number_of_channels, 8);
        assert_eq!(cursor.tell(), dctx.user_header_size);
    }

    #[test]
    fn test_tdc8hp_padding_is_skipped() {
        let header = VariantHeader::Tdc8hp(Tdc8hpHeader {
            common: tdc_common(10),
            trigger_channel: 7,
            calibrations: vec![Default::default()],
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8hp, DAQ_VERSION_20110208);
        let mut bytes = encode(&header, &context);
        bytes.extend_from_slice(&[0u8; 16]);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        let VariantHeader::Tdc8hp(decoded) = VariantHeader::decode(&mut cursor, &dctx).unwrap()
        else {
            panic!("not a TDC8HP header");
        };
        assert_eq!(decoded.trigger_channel, 7);
        assert_eq!(decoded.calibrations.len(), 1);
        assert_eq!(&decoded.common, header.common());
        assert_eq!(cursor.tell(), dctx.header_size + dctx.user_header_size);

        // Old style headers must still match their size exactly
        let header = VariantHeader::Tdc8hp(Tdc8hpHeader {
            common: tdc_common(7),
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8hp, DAQ_VERSION_2008);
        let mut bytes = encode(&header, &context);
        bytes.extend_from_slice(&[0u8; 16]);
        let dctx = decode_ctx(&context, bytes.len());
        let mut cursor = body_cursor(&bytes, &dctx);
        assert_eq!(VariantHeader::decode(&mut cursor, &dctx).unwrap_err().code(), 5);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let header = VariantHeader::Tdc8hp(Tdc8hpHeader {
            common: tdc_common(10),
            ..Default::default()
        });
        let context = ctx(DaqId::Tdc8hp, DAQ_VERSION_20110208);
        let bytes = encode(&header, &context);
        // Too small even without the calibration block count
        let dctx = decode_ctx(&context, bytes.len() - 8);
        let mut cursor = body_cursor(&bytes, &dctx);
        match VariantHeader::decode(&mut cursor, &dctx) {
            Err(LmfError::HeaderRead(message)) => {
                assert!(message.contains("consumed"), "{message}");
                assert!(!message.contains("does not apply"), "{message}");
            }
            other => panic!("unexpected decode result {other:?}"),
        }
    }

    #[test]
    fn test_fits() {
        assert!(VariantHeader::default_for(DaqId::Tdc8).fits(DaqId::DualTdc8));
        assert!(!VariantHeader::default_for(DaqId::Tdc8).fits(DaqId::Hm1));
    }
}
