//! Data extension segment (DES) subheader
//!
//! A DES either carries arbitrary user data or, when its identifier names a TRE overflow,
//! holds the TREs that did not fit in the extension block of the header or of another
//! segment. Overflow DES data is decoded into the segment's [`TreCollection`] and re-encoded
//! from it on write.

use std::{
    borrow::Cow,
    io::{Read, Write},
};

use bon::Builder;

use super::{ReadContext, Segment, SegmentData};
use crate::{
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    tre::{codec::read_tres, TreCollection, TreSource},
    Error,
};

/// `DESID` of the bookkeeping DES written by streaming producers
pub const STREAMING_FILE_HEADER: &str = "STREAMING_FILE_HEADER";

/// Where the TREs of an overflow DES belong (`DESOFLW`, `DESITEM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesOverflow {
    /// Extension block the TREs overflowed from
    pub source: TreSource,
    /// 1-based index of the overflowing segment among those of its kind, 0 for the file header
    pub item: u16,
}

impl DesOverflow {
    fn source_from_code(code: &str, dialect: Dialect) -> Option<TreSource> {
        Some(match code {
            "UDHD" => TreSource::UserDefinedHeaderData,
            "XHD" => TreSource::ExtendedHeaderData,
            "UDID" => TreSource::UserDefinedImageData,
            "IXSHD" => TreSource::ImageExtendedSubheaderData,
            "SXSHD" if dialect.is_legacy() => TreSource::SymbolExtendedSubheaderData,
            "SXSHD" => TreSource::GraphicExtendedSubheaderData,
            "LXSHD" if dialect.is_legacy() => TreSource::LabelExtendedSubheaderData,
            "TXSHD" => TreSource::TextExtendedSubheaderData,
            _ => return None,
        })
    }
}

/// A data extension segment
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct DataExtensionSegment {
    /// `DESID`
    #[builder(into)]
    pub identifier: String,
    /// `DESVER`
    #[builder(default = 1)]
    pub version: u8,
    #[builder(default)]
    pub security: SecurityMetadata,
    /// Present exactly when [`Self::identifier`] names a TRE overflow DES
    pub overflow: Option<DesOverflow>,
    /// `DESSHF`, user-defined subheader fields
    #[builder(default)]
    pub user_subheader: Vec<u8>,
    /// TREs of an overflow DES
    #[builder(default)]
    pub tres: TreCollection,
    #[builder(default)]
    pub data: SegmentData,
}

impl DataExtensionSegment {
    /// Creates an overflow DES holding TREs for `source` of segment `item`
    #[must_use]
    pub fn tre_overflow(dialect: Dialect, source: TreSource, item: u16) -> Self {
        let identifier = dialect.layout().overflow_des_ids.first().copied().unwrap_or_default();
        Self::builder()
            .identifier(identifier)
            .security(SecurityMetadata::unclassified(dialect))
            .overflow(DesOverflow { source, item })
            .build()
    }

    /// Returns `true` if the identifier marks a TRE overflow DES in `dialect`
    #[must_use]
    pub fn is_tre_overflow(&self, dialect: Dialect) -> bool {
        is_overflow_id(&self.identifier, dialect)
    }

    /// Returns `true` for the bookkeeping DES of a streamed file, which is never written back
    #[must_use]
    pub fn is_streaming_file_header(&self) -> bool {
        self.identifier == STREAMING_FILE_HEADER
    }

    /// User data, if loaded
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.bytes()
    }
}

fn is_overflow_id(identifier: &str, dialect: Dialect) -> bool {
    dialect.layout().overflow_des_ids.contains(&identifier)
}

impl Segment for DataExtensionSegment {
    const KIND: SegmentKind = SegmentKind::DataExtension;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        r.expect_marker("DE", "DE")?;
        let identifier = r.read_string(25, "DESID")?;
        let version = r.read_uint(2, "DESVER")?;
        let security = SecurityMetadata::read(r, ctx.dialect)?;
        let overflow = if is_overflow_id(&identifier, ctx.dialect) {
            let offset = r.offset();
            let code = r.read_string(6, "DESOFLW")?;
            let source = DesOverflow::source_from_code(&code, ctx.dialect).ok_or(
                ParseError::InvalidValue {
                    offset,
                    field: "DESOFLW",
                    value: code,
                },
            )?;
            let item = r.read_uint(3, "DESITEM")?;
            Some(DesOverflow { source, item })
        } else {
            None
        };
        let user_subheader_length = r.read_uint(4, "DESSHL")?;
        let user_subheader = r.read_bytes(user_subheader_length, "DESSHF")?;
        Ok(Self {
            identifier,
            version,
            security,
            overflow,
            user_subheader,
            tres: TreCollection::new(),
            data: SegmentData::default(),
        })
    }

    fn write_subheader<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
    ) -> Result<(), Error> {
        w.write_bytes(b"DE")?;
        w.write_string(&self.identifier, 25, "DESID")?;
        w.write_uint(self.version, 2, "DESVER")?;
        self.security.write(w, dialect)?;
        match (self.is_tre_overflow(dialect), &self.overflow) {
            (true, Some(overflow)) => {
                let code = overflow.source.overflow_code().ok_or_else(|| {
                    Error::Build("an overflow DES cannot overflow into another DES".to_owned())
                })?;
                w.write_string(code, 6, "DESOFLW")?;
                w.write_uint(overflow.item, 3, "DESITEM")?;
            }
            (true, None) => {
                return Err(Error::Build(format!(
                    "DES {:?} needs DESOFLW and DESITEM",
                    self.identifier
                )))
            }
            (false, Some(_)) => {
                return Err(Error::Build(format!(
                    "DES {:?} is not a TRE overflow DES in {dialect}",
                    self.identifier
                )))
            }
            (false, None) => {}
        }
        w.write_uint(self.user_subheader.len() as u64, 4, "DESSHL")?;
        w.write_bytes(&self.user_subheader)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }

    fn load_data(
        &mut self,
        bytes: Vec<u8>,
        offset: u64,
        ctx: &ReadContext,
    ) -> Result<(), ParseError> {
        if self.overflow.is_some() {
            self.tres
                .extend(read_tres(&bytes, TreSource::TreOverflow, ctx.decode_tres, offset)?);
            self.data = SegmentData::Loaded(Vec::new());
        } else {
            self.data = SegmentData::Loaded(bytes);
        }
        Ok(())
    }

    fn encoded_data(&self) -> Result<Cow<'_, [u8]>, Error> {
        if self.overflow.is_none() {
            return self.data.require_loaded(Self::KIND).map(Cow::Borrowed);
        }
        self.data.require_loaded(Self::KIND)?;
        self.tres.encode(TreSource::TreOverflow).map(Cow::Owned)
    }
}
