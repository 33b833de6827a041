//! Segment subheader codecs
//!
//! Every segment kind follows the same linear shape: kind marker, identifier, descriptive
//! fields, security metadata, encryption flag, kind-specific remainder and one or two
//! extension blocks. Each kind implements [`Segment`]; the document drives them through
//! that trait in both directions.

pub mod des;
pub mod graphic;
pub mod image;
pub mod label;
pub mod reserved;
pub mod symbol;
pub mod text;

use std::{
    borrow::Cow,
    fmt::Display,
    io::{Read, Write},
};

use tracing::warn;

use crate::{
    dialect::{Dialect, SegmentKind},
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    tre::{codec::read_tres, Tre, TreCollection, TreSource},
    Error,
};

/// Position of a segment relative to its attachment point, in pixels
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub row: i32,
    pub column: i32,
}

impl Location {
    #[must_use]
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    pub(crate) fn read<R: Read>(
        r: &mut FieldReader<R>,
        field: &'static str,
    ) -> Result<Self, ParseError> {
        let (row, column) = r.read_int_pair(10, field)?;
        Ok(Self { row, column })
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        field: &'static str,
    ) -> Result<(), Error> {
        w.write_int(self.row.into(), 5, field)?;
        w.write_int(self.column.into(), 5, field)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Data payload of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentData {
    /// Bytes held in memory
    Loaded(Vec<u8>),
    /// Bytes left in the source file, see [`crate::Document::read_segment_data`]
    Deferred {
        /// absolute offset of the first data byte
        offset: u64,
        /// data length
        length: u64,
    },
}

impl Default for SegmentData {
    fn default() -> Self {
        Self::Loaded(Vec::new())
    }
}

impl SegmentData {
    /// Length in bytes, whether loaded or not
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Loaded(bytes) => bytes.len() as u64,
            Self::Deferred { length, .. } => *length,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes, if they are in memory
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Loaded(bytes) => Some(bytes),
            Self::Deferred { .. } => None,
        }
    }

    pub(crate) fn require_loaded(&self, kind: SegmentKind) -> Result<&[u8], Error> {
        self.bytes().ok_or_else(|| {
            Error::Build(format!(
                "{kind} segment data was not loaded; parse with ParseStrategy::Full or load it first"
            ))
        })
    }
}

/// Per-call parsing state handed to each subheader codec
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadContext {
    pub dialect: Dialect,
    pub decode_tres: bool,
    /// Subheader length announced by the file header
    pub subheader_length: u64,
}

/// Subheader codec and payload access shared by every segment kind
pub(crate) trait Segment: Sized {
    const KIND: SegmentKind;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError>;

    fn write_subheader<W: Write>(&self, w: &mut FieldWriter<W>, dialect: Dialect)
        -> Result<(), Error>;

    fn data(&self) -> &SegmentData;

    fn set_data(&mut self, data: SegmentData);

    /// Installs data read from the file
    fn load_data(
        &mut self,
        bytes: Vec<u8>,
        _offset: u64,
        _ctx: &ReadContext,
    ) -> Result<(), ParseError> {
        self.set_data(SegmentData::Loaded(bytes));
        Ok(())
    }

    /// Bytes written after the subheader
    fn encoded_data(&self) -> Result<Cow<'_, [u8]>, Error> {
        self.data().require_loaded(Self::KIND).map(Cow::Borrowed)
    }

    /// Overflow indicators of the extension blocks, paired with their attachment points
    fn overflow_pointers(&self) -> Vec<(TreSource, u16)> {
        Vec::new()
    }

    /// Serialized subheader
    fn encode_subheader(&self, dialect: Dialect) -> Result<Vec<u8>, Error> {
        let mut w = FieldWriter::new(Vec::new());
        self.write_subheader(&mut w, dialect)?;
        Ok(w.into_inner())
    }
}

/// Reads the encryption flag. Only `0` is defined; anything else is logged and ignored.
pub(crate) fn read_encryption<R: Read>(r: &mut FieldReader<R>) -> Result<(), ParseError> {
    let offset = r.offset();
    let flag = r.read_raw_string(1, "ENCRYP")?;
    if flag != "0" {
        warn!("encryption flag {flag:?} at byte {offset}, content is read as plain");
    }
    Ok(())
}

pub(crate) fn write_encryption<W: Write>(w: &mut FieldWriter<W>) -> Result<(), Error> {
    w.write_bytes(b"0")
}

/// Field names and attachment point of one extension block
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExtensionBlock {
    pub length_field: &'static str,
    pub overflow_field: &'static str,
    pub data_field: &'static str,
    pub source: TreSource,
}

/// Contents of an extension block as read
#[derive(Debug, Default)]
pub(crate) struct ExtensionContents {
    pub overflow: u16,
    pub tres: Vec<Tre>,
}

pub(crate) const UDHD: ExtensionBlock = ExtensionBlock {
    length_field: "UDHDL",
    overflow_field: "UDHOFL",
    data_field: "UDHD",
    source: TreSource::UserDefinedHeaderData,
};

pub(crate) const XHD: ExtensionBlock = ExtensionBlock {
    length_field: "XHDL",
    overflow_field: "XHDLOFL",
    data_field: "XHD",
    source: TreSource::ExtendedHeaderData,
};

const OVERFLOW_WIDTH: u64 = 3;
const MAX_BLOCK_LENGTH: u64 = 99_999;

impl ExtensionBlock {
    pub(crate) fn read<R: Read>(
        &self,
        r: &mut FieldReader<R>,
        decode: bool,
    ) -> Result<ExtensionContents, ParseError> {
        let offset = r.offset();
        let length: u64 = r.read_uint(5, self.length_field)?;
        if length == 0 {
            return Ok(ExtensionContents::default());
        }
        if length < OVERFLOW_WIDTH {
            return Err(ParseError::InvalidValue {
                offset,
                field: self.length_field,
                value: format!("{length:05}"),
            });
        }
        let overflow = r.read_uint(3, self.overflow_field)?;
        let data_offset = r.offset();
        let data_length = usize::try_from(length - OVERFLOW_WIDTH).map_err(|_| {
            ParseError::InvalidValue {
                offset,
                field: self.length_field,
                value: length.to_string(),
            }
        })?;
        let data = r.read_bytes(data_length, self.data_field)?;
        let tres = read_tres(&data, self.source, decode, data_offset)?;
        Ok(ExtensionContents { overflow, tres })
    }

    fn encode(&self, tres: &TreCollection, overflow: u16) -> Result<Option<Vec<u8>>, Error> {
        let payload = tres.encode(self.source)?;
        if payload.is_empty() && overflow == 0 {
            return Ok(None);
        }
        Ok(Some(payload))
    }

    /// Bytes taken by the block including its length field
    pub(crate) fn encoded_len(&self, tres: &TreCollection, overflow: u16) -> Result<u64, Error> {
        Ok(5 + self
            .encode(tres, overflow)?
            .map_or(0, |payload| OVERFLOW_WIDTH + payload.len() as u64))
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        tres: &TreCollection,
        overflow: u16,
    ) -> Result<(), Error> {
        let Some(payload) = self.encode(tres, overflow)? else {
            return w.write_uint(0u8, 5, self.length_field);
        };
        let length = OVERFLOW_WIDTH + payload.len() as u64;
        if length > MAX_BLOCK_LENGTH {
            return Err(Error::FormatConstraint {
                field: self.length_field.to_owned(),
                reason: format!(
                    "{length} bytes of TREs do not fit; move them to an overflow data extension segment"
                ),
            });
        }
        w.write_uint(length, 5, self.length_field)?;
        w.write_uint(overflow, 3, self.overflow_field)?;
        w.write_bytes(&payload)
    }
}

/// Reads a count field and rejects values above `max`
pub(crate) fn read_bounded<R: Read>(
    r: &mut FieldReader<R>,
    width: usize,
    max: u64,
    field: &'static str,
) -> Result<u64, ParseError> {
    let offset = r.offset();
    let value: u64 = r.read_uint(width, field)?;
    if value > max {
        return Err(ParseError::InvalidValue {
            offset,
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Parses a code-table field, turning an unknown code into an error at the field's offset
pub(crate) fn read_code<R: Read, T: std::str::FromStr>(
    r: &mut FieldReader<R>,
    width: usize,
    field: &'static str,
) -> Result<T, ParseError> {
    let offset = r.offset();
    let value = r.read_string(width, field)?;
    value
        .parse()
        .map_err(|_| ParseError::InvalidValue { offset, field, value })
}
