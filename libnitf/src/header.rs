//! File header

use std::{
    collections::HashMap,
    fmt::Display,
    io::{Read, Write},
};

use bon::Builder;
use tracing::debug;

use crate::{
    datetime::FieldDateTime,
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    segment::{read_encryption, write_encryption, UDHD, XHD},
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    tre::{TreCollection, TreSource},
    Error,
};

/// `FL` value announcing a file whose length was unknown when the header was written
pub const STREAMING_FILE_LENGTH: u64 = 999_999_999_999;

const MAX_COMPLEXITY_LEVEL: u8 = 99;
const MAX_SEGMENTS: usize = 999;

/// Subheader and data length of one segment as announced by the file header
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLength {
    pub subheader: u64,
    pub data: u64,
}

/// Names of the count field and of the two length fields for each header slot
const fn slot_fields(kind: Option<SegmentKind>) -> (&'static str, &'static str, &'static str) {
    match kind {
        Some(SegmentKind::Image) => ("NUMI", "LISH", "LI"),
        Some(SegmentKind::Graphic | SegmentKind::Symbol) => ("NUMS", "LSSH", "LS"),
        Some(SegmentKind::Label) => ("NUML", "LLSH", "LL"),
        Some(SegmentKind::Text) => ("NUMT", "LTSH", "LT"),
        Some(SegmentKind::DataExtension) => ("NUMDES", "LDSH", "LD"),
        Some(SegmentKind::ReservedExtension) => ("NUMRES", "LRESH", "LRE"),
        None => ("NUMX", "", ""),
    }
}

/// The file header
///
/// Length fields (`FL`, `HL` and the per-segment length tables) are filled in on parse and
/// recomputed from the document on every write; they cannot be set by hand.
///
/// An unset [`Self::security`] compares equal to the unclassified metadata it is written as.
#[derive(Builder, Debug, Clone)]
pub struct Header {
    #[builder(default)]
    pub dialect: Dialect,
    /// `CLEVEL`, 0 to 99
    #[builder(default = 3)]
    pub complexity_level: u8,
    /// `STYPE`
    #[builder(default = "BF01".to_owned(), into)]
    pub standard_type: String,
    /// `OSTAID`
    #[builder(default, into)]
    pub station: String,
    /// `FDT`
    #[builder(default)]
    pub date_time: FieldDateTime,
    /// `FTITLE`
    #[builder(default, into)]
    pub title: String,
    /// Defaults to unclassified metadata for [`Self::dialect`]
    pub security: Option<SecurityMetadata>,
    /// `FSCOP`
    #[builder(default)]
    pub copy_number: u32,
    /// `FSCPYS`
    #[builder(default)]
    pub number_of_copies: u32,
    /// `FBKGC`, current dialects only
    #[builder(default)]
    pub background_color: [u8; 3],
    /// `ONAME`
    #[builder(default, into)]
    pub originator_name: String,
    /// `OPHONE`
    #[builder(default, into)]
    pub originator_phone: String,
    /// TREs from `UDHD` and `XHD`
    #[builder(default)]
    pub tres: TreCollection,
    /// `UDHOFL`
    #[builder(default)]
    pub user_defined_overflow: u16,
    /// `XHDLOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(skip)]
    file_length: u64,
    #[builder(skip)]
    header_length: u64,
    #[builder(skip)]
    segment_lengths: HashMap<SegmentKind, Vec<SegmentLength>>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        let Self {
            dialect,
            complexity_level,
            standard_type,
            station,
            date_time,
            title,
            security: _,
            copy_number,
            number_of_copies,
            background_color,
            originator_name,
            originator_phone,
            tres,
            user_defined_overflow,
            extended_overflow,
            file_length,
            header_length,
            segment_lengths,
        } = self;
        *dialect == other.dialect
            && *complexity_level == other.complexity_level
            && *standard_type == other.standard_type
            && *station == other.station
            && *date_time == other.date_time
            && *title == other.title
            && self.security() == other.security()
            && *copy_number == other.copy_number
            && *number_of_copies == other.number_of_copies
            && *background_color == other.background_color
            && *originator_name == other.originator_name
            && *originator_phone == other.originator_phone
            && *tres == other.tres
            && *user_defined_overflow == other.user_defined_overflow
            && *extended_overflow == other.extended_overflow
            && *file_length == other.file_length
            && *header_length == other.header_length
            && *segment_lengths == other.segment_lengths
    }
}

impl Eq for Header {}

impl Default for Header {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Header {
    /// An empty header for `dialect`
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self::builder().dialect(dialect).build()
    }

    /// Security metadata, unclassified in the header's dialect unless set
    #[must_use]
    pub fn security(&self) -> SecurityMetadata {
        self.security
            .clone()
            .unwrap_or_else(|| SecurityMetadata::unclassified(self.dialect))
    }

    /// `FL` as last read or written
    #[must_use]
    pub const fn file_length(&self) -> u64 {
        self.file_length
    }

    /// `HL` as last read or written
    #[must_use]
    pub const fn header_length(&self) -> u64 {
        self.header_length
    }

    /// Returns `true` if the file was produced in streaming mode
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.file_length == STREAMING_FILE_LENGTH
    }

    /// Length table entries for `kind`, index-aligned with the document's segments
    #[must_use]
    pub fn segment_lengths(&self, kind: SegmentKind) -> &[SegmentLength] {
        self.segment_lengths.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn set_lengths(
        &mut self,
        file_length: u64,
        header_length: u64,
        segment_lengths: HashMap<SegmentKind, Vec<SegmentLength>>,
    ) {
        self.file_length = file_length;
        self.header_length = header_length;
        self.segment_lengths = segment_lengths;
    }

    /// Checks values whose range is narrower than their field
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.complexity_level > MAX_COMPLEXITY_LEVEL {
            return Err(Error::FormatConstraint {
                field: "CLEVEL".to_owned(),
                reason: format!(
                    "{} is outside 0..={MAX_COMPLEXITY_LEVEL}",
                    self.complexity_level
                ),
            });
        }
        if !self.dialect.layout().has_background_color && self.background_color != [0; 3] {
            return Err(Error::FormatConstraint {
                field: "FBKGC".to_owned(),
                reason: format!("{} has no background colour", self.dialect),
            });
        }
        self.security().check_dialect(self.dialect)
    }

    /// Header length for the given segment counts
    pub(crate) fn encoded_len(&self, counts: &HashMap<SegmentKind, usize>) -> Result<u64, Error> {
        let layout = self.dialect.layout();
        let tables: u64 = layout
            .header_slots
            .iter()
            .flatten()
            .map(|kind| {
                let (subheader, data) = kind.length_field_widths();
                counts.get(kind).copied().unwrap_or_default() as u64 * (subheader + data) as u64
            })
            .sum();
        // the fixed part already holds the two 5-digit block lengths
        let blocks = UDHD.encoded_len(&self.tres, self.user_defined_overflow)?
            + XHD.encoded_len(&self.tres, self.extended_overflow)?
            - 10;
        Ok(layout.header_fixed_length + self.security().encoded_len() + tables + blocks)
    }

    pub(crate) fn read<R: Read>(
        r: &mut FieldReader<R>,
        decode_tres: bool,
    ) -> Result<Self, ParseError> {
        let start = r.offset();
        let profile = r.read_raw_string(4, "FHDR")?;
        let version = r.read_raw_string(5, "FVER")?;
        let dialect = Dialect::from_markers(&profile, &version).ok_or_else(|| {
            ParseError::MarkerMismatch {
                offset: start,
                expected: "NITF02.00, NITF02.10 or NSIF01.00",
                found: format!("{profile}{version}"),
            }
        })?;
        debug!("reading {dialect} file header");
        let layout = dialect.layout();

        let complexity_level = r.read_uint(2, "CLEVEL")?;
        let standard_type = r.read_string(4, "STYPE")?;
        let station = r.read_string(10, "OSTAID")?;
        let date_time = FieldDateTime::read(r, dialect, "FDT")?;
        let title = r.read_string(80, "FTITLE")?;
        let security = SecurityMetadata::read(r, dialect)?;
        let copy_number = r.read_uint(5, "FSCOP")?;
        let number_of_copies = r.read_uint(5, "FSCPYS")?;
        read_encryption(r)?;
        let background_color = if layout.has_background_color {
            r.read_array::<3>("FBKGC")?
        } else {
            [0; 3]
        };
        let originator_name = r.read_string(layout.originator_name_width, "ONAME")?;
        let originator_phone = r.read_string(18, "OPHONE")?;
        let file_length = r.read_uint(12, "FL")?;
        let header_length_offset = r.offset();
        let header_length = r.read_uint(6, "HL")?;

        let mut segment_lengths = HashMap::new();
        for slot in layout.header_slots {
            let (count_field, subheader_field, data_field) = slot_fields(slot);
            let offset = r.offset();
            let count: usize = r.read_uint(3, count_field)?;
            let Some(kind) = slot else {
                if count != 0 {
                    return Err(ParseError::InvalidValue {
                        offset,
                        field: count_field,
                        value: count.to_string(),
                    });
                }
                continue;
            };
            let (subheader_width, data_width) = kind.length_field_widths();
            let lengths = (0..count)
                .map(|_| {
                    Ok(SegmentLength {
                        subheader: r.read_uint(subheader_width, subheader_field)?,
                        data: r.read_uint(data_width, data_field)?,
                    })
                })
                .collect::<Result<Vec<_>, ParseError>>()?;
            if !lengths.is_empty() {
                segment_lengths.insert(kind, lengths);
            }
        }

        let user_defined = UDHD.read(r, decode_tres)?;
        let extended = XHD.read(r, decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(user_defined.tres);
        tres.extend(extended.tres);

        let consumed = r.offset() - start;
        if consumed != header_length {
            return Err(ParseError::InvalidValue {
                offset: header_length_offset,
                field: "HL",
                value: format!("{header_length} (header is {consumed} bytes)"),
            });
        }

        Ok(Self {
            dialect,
            complexity_level,
            standard_type,
            station,
            date_time,
            title,
            security: Some(security),
            copy_number,
            number_of_copies,
            background_color,
            originator_name,
            originator_phone,
            tres,
            user_defined_overflow: user_defined.overflow,
            extended_overflow: extended.overflow,
            file_length,
            header_length,
            segment_lengths,
        })
    }

    /// Writes the header with the given length values
    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        file_length: u64,
        header_length: u64,
        segment_lengths: &HashMap<SegmentKind, Vec<SegmentLength>>,
    ) -> Result<(), Error> {
        self.validate()?;
        let dialect = self.dialect;
        let layout = dialect.layout();
        w.write_bytes(dialect.profile().as_bytes())?;
        w.write_bytes(dialect.version().as_bytes())?;
        w.write_uint(self.complexity_level, 2, "CLEVEL")?;
        w.write_string(&self.standard_type, 4, "STYPE")?;
        w.write_string(&self.station, 10, "OSTAID")?;
        self.date_time.write(w, dialect, "FDT")?;
        w.write_string(&self.title, 80, "FTITLE")?;
        self.security().write(w, dialect)?;
        w.write_uint(self.copy_number, 5, "FSCOP")?;
        w.write_uint(self.number_of_copies, 5, "FSCPYS")?;
        write_encryption(w)?;
        if layout.has_background_color {
            w.write_bytes(&self.background_color)?;
        }
        w.write_string(&self.originator_name, layout.originator_name_width, "ONAME")?;
        w.write_string(&self.originator_phone, 18, "OPHONE")?;
        w.write_uint(file_length, 12, "FL")?;
        w.write_uint(header_length, 6, "HL")?;

        for slot in layout.header_slots {
            let (count_field, subheader_field, data_field) = slot_fields(slot);
            let lengths = slot
                .and_then(|kind| segment_lengths.get(&kind))
                .map_or(&[][..], Vec::as_slice);
            if lengths.len() > MAX_SEGMENTS {
                return Err(Error::FormatConstraint {
                    field: count_field.to_owned(),
                    reason: format!("{} segments, at most {MAX_SEGMENTS}", lengths.len()),
                });
            }
            w.write_uint(lengths.len() as u64, 3, count_field)?;
            let Some(kind) = slot else { continue };
            let (subheader_width, data_width) = kind.length_field_widths();
            for length in lengths {
                w.write_uint(length.subheader, subheader_width, subheader_field)?;
                w.write_uint(length.data, data_width, data_field)?;
            }
        }

        UDHD.write(w, &self.tres, self.user_defined_overflow)?;
        XHD.write(w, &self.tres, self.extended_overflow)
    }

    /// Overflow indicators of the header's extension blocks
    pub(crate) fn overflow_pointers(&self) -> [(TreSource, u16); 2] {
        [
            (UDHD.source, self.user_defined_overflow),
            (XHD.source, self.extended_overflow),
        ]
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} (CLEVEL {:02}, {})",
            self.dialect, self.complexity_level, self.standard_type
        )?;
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Station: {}", self.station)?;
        writeln!(f, "Classification: {}", self.security().classification())?;
        writeln!(f, "Originator: {} {}", self.originator_name, self.originator_phone)?;
        write!(f, "File length: {}, header length: {}", self.file_length, self.header_length)
    }
}
