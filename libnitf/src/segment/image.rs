//! Image segment subheader

use std::{
    fmt::Display,
    io::{Read, Write},
};

use bon::Builder;
use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};
use tracing::debug;

use super::{
    read_bounded, read_code, read_encryption, write_encryption, ExtensionBlock, Location,
    ReadContext, Segment, SegmentData,
};
use crate::{
    datetime::FieldDateTime,
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    serde::{error::Error as ParseError, utils::latin1_to_string, FieldReader, FieldWriter},
    tre::{TreCollection, TreSource},
    Error,
};

const UDID: ExtensionBlock = ExtensionBlock {
    length_field: "UDIDL",
    overflow_field: "UDOFL",
    data_field: "UDID",
    source: TreSource::UserDefinedImageData,
};

const IXSHD: ExtensionBlock = ExtensionBlock {
    length_field: "IXSHDL",
    overflow_field: "IXSOFL",
    data_field: "IXSHD",
    source: TreSource::ImageExtendedSubheaderData,
};

const MAX_COMMENTS: usize = 9;
const MAX_LUTS: usize = 4;

/// Computer representation of each pixel (`PVTYPE`)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, StrumDisplay)]
pub enum PixelValueType {
    /// Unsigned integer
    #[default]
    #[strum(serialize = "INT")]
    Integer,
    /// Bi-level, one bit per pixel
    #[strum(serialize = "B")]
    Bilevel,
    /// Two's complement signed integer
    #[strum(serialize = "SI")]
    SignedInteger,
    /// IEEE 754 floating point
    #[strum(serialize = "R")]
    Real,
    /// Complex, two IEEE 754 values
    #[strum(serialize = "C")]
    Complex,
}

/// Processing required to display the image (`IREP`)
#[derive(Default, Debug, Clone, PartialEq, Eq, EnumString)]
pub enum ImageRepresentation {
    #[default]
    #[strum(serialize = "MONO")]
    Monochrome,
    #[strum(serialize = "RGB")]
    Rgb,
    #[strum(serialize = "RGB/LUT")]
    RgbLut,
    #[strum(serialize = "MULTI")]
    Multiband,
    #[strum(serialize = "NODISPLY")]
    NoDisplay,
    #[strum(serialize = "NVECTOR")]
    CartesianVector,
    #[strum(serialize = "POLAR")]
    PolarVector,
    #[strum(serialize = "VPH")]
    PhaseHistory,
    #[strum(serialize = "YCbCr601")]
    YCbCr601,
    /// Any code outside the list above, kept as read
    #[strum(default)]
    Other(String),
}

impl ImageRepresentation {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Monochrome => "MONO",
            Self::Rgb => "RGB",
            Self::RgbLut => "RGB/LUT",
            Self::Multiband => "MULTI",
            Self::NoDisplay => "NODISPLY",
            Self::CartesianVector => "NVECTOR",
            Self::PolarVector => "POLAR",
            Self::PhaseHistory => "VPH",
            Self::YCbCr601 => "YCbCr601",
            Self::Other(code) => code,
        }
    }
}

/// Specific category of the source sensor (`ICAT`)
#[derive(Default, Debug, Clone, PartialEq, Eq, EnumString)]
pub enum ImageCategory {
    #[default]
    #[strum(serialize = "VIS")]
    Visible,
    #[strum(serialize = "MS")]
    Multispectral,
    #[strum(serialize = "HS")]
    Hyperspectral,
    #[strum(serialize = "IR")]
    Infrared,
    #[strum(serialize = "SAR")]
    Radar,
    #[strum(serialize = "SARIQ")]
    RadarIq,
    #[strum(serialize = "MAP")]
    Map,
    #[strum(serialize = "CLOUD")]
    CloudMask,
    #[strum(serialize = "DTEM")]
    Elevation,
    /// Any code outside the list above, kept as read
    #[strum(default)]
    Other(String),
}

impl ImageCategory {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Visible => "VIS",
            Self::Multispectral => "MS",
            Self::Hyperspectral => "HS",
            Self::Infrared => "IR",
            Self::Radar => "SAR",
            Self::RadarIq => "SARIQ",
            Self::Map => "MAP",
            Self::CloudMask => "CLOUD",
            Self::Elevation => "DTEM",
            Self::Other(code) => code,
        }
    }
}

/// Compression applied to the image data (`IC`)
#[derive(Default, Debug, Clone, PartialEq, Eq, EnumString)]
pub enum ImageCompression {
    /// Not compressed
    #[default]
    #[strum(serialize = "NC")]
    Uncompressed,
    /// Not compressed, with a block mask
    #[strum(serialize = "NM")]
    UncompressedMasked,
    #[strum(serialize = "C1")]
    BiLevel,
    #[strum(serialize = "C3")]
    Jpeg,
    #[strum(serialize = "M3")]
    JpegMasked,
    #[strum(serialize = "C4")]
    VectorQuantization,
    #[strum(serialize = "C5")]
    LosslessJpeg,
    #[strum(serialize = "C8")]
    Jpeg2000,
    #[strum(serialize = "M8")]
    Jpeg2000Masked,
    /// Any code outside the list above, kept as read
    #[strum(default)]
    Other(String),
}

impl ImageCompression {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uncompressed => "NC",
            Self::UncompressedMasked => "NM",
            Self::BiLevel => "C1",
            Self::Jpeg => "C3",
            Self::JpegMasked => "M3",
            Self::VectorQuantization => "C4",
            Self::LosslessJpeg => "C5",
            Self::Jpeg2000 => "C8",
            Self::Jpeg2000Masked => "M8",
            Self::Other(code) => code,
        }
    }

    /// `COMRAT` follows `IC` for every compressed image
    #[must_use]
    pub fn has_rate(&self) -> bool {
        !matches!(self, Self::Uncompressed | Self::UncompressedMasked)
    }

    /// Data starts with a block mask table
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.as_str().starts_with('M') || matches!(self, Self::UncompressedMasked)
    }
}

macro_rules! code_display {
    ($($ty:ty),*) => {
        $(impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

code_display!(ImageRepresentation, ImageCategory, ImageCompression);

/// Band interleave (`IMODE`)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, StrumDisplay)]
pub enum ImageMode {
    /// Band interleaved by block
    #[default]
    #[strum(serialize = "B")]
    BlockInterleaved,
    /// Band interleaved by pixel
    #[strum(serialize = "P")]
    PixelInterleaved,
    /// Band interleaved by row
    #[strum(serialize = "R")]
    RowInterleaved,
    /// Band sequential
    #[strum(serialize = "S")]
    Sequential,
}

/// Alignment of `ABPP` significant bits inside an `NBPP` wide sample (`PJUST`)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, StrumDisplay)]
pub enum PixelJustification {
    #[default]
    #[strum(serialize = "R")]
    Right,
    #[strum(serialize = "L")]
    Left,
}

/// Coordinate system of the corner coordinates (`ICORDS`)
///
/// The code table differs between dialects: the legacy dialect writes `N` for no coordinates
/// and knows geocentric coordinates, the current dialects write a space and know UTM
/// hemispheres and decimal degrees.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// `IGEOLO` is absent
    #[default]
    None,
    /// UTM expressed in MGRS
    Mgrs,
    /// UTM, northern hemisphere
    UtmNorth,
    /// UTM, southern hemisphere
    UtmSouth,
    /// Degrees, minutes, seconds
    Geographic,
    /// Decimal degrees
    DecimalDegrees,
    /// Geocentric
    Geocentric,
}

const LEGACY_COORDINATE_CODES: &[(u8, CoordinateSystem)] = &[
    (b'N', CoordinateSystem::None),
    (b'U', CoordinateSystem::Mgrs),
    (b'G', CoordinateSystem::Geographic),
    (b'C', CoordinateSystem::Geocentric),
];

const CURRENT_COORDINATE_CODES: &[(u8, CoordinateSystem)] = &[
    (b' ', CoordinateSystem::None),
    (b'U', CoordinateSystem::Mgrs),
    (b'N', CoordinateSystem::UtmNorth),
    (b'S', CoordinateSystem::UtmSouth),
    (b'G', CoordinateSystem::Geographic),
    (b'D', CoordinateSystem::DecimalDegrees),
];

impl CoordinateSystem {
    fn codes(dialect: Dialect) -> &'static [(u8, Self)] {
        if dialect.is_legacy() {
            LEGACY_COORDINATE_CODES
        } else {
            CURRENT_COORDINATE_CODES
        }
    }

    /// The `ICORDS` code of this system in `dialect`, if it has one
    #[must_use]
    pub fn code(self, dialect: Dialect) -> Option<u8> {
        Self::codes(dialect)
            .iter()
            .find(|(_, system)| *system == self)
            .map(|(code, _)| *code)
    }

    fn read<R: Read>(r: &mut FieldReader<R>, dialect: Dialect) -> Result<Self, ParseError> {
        let offset = r.offset();
        let [code] = r.read_array::<1>("ICORDS")?;
        Self::codes(dialect)
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, system)| *system)
            .ok_or_else(|| ParseError::InvalidValue {
                offset,
                field: "ICORDS",
                value: latin1_to_string(&[code]),
            })
    }

    fn write<W: Write>(self, w: &mut FieldWriter<W>, dialect: Dialect) -> Result<(), Error> {
        let code = self.code(dialect).ok_or_else(|| Error::FormatConstraint {
            field: "ICORDS".to_owned(),
            reason: format!("{self:?} coordinates cannot be expressed in {dialect}"),
        })?;
        w.write_bytes(&[code])
    }
}

/// One band of an image segment
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ImageBand {
    /// `IREPBAND`, e.g. `M`, `R`, `G`, `B`, `LU`
    #[builder(default, into)]
    pub representation: String,
    /// `ISUBCAT`
    #[builder(default, into)]
    pub subcategory: String,
    /// `IFC`
    #[builder(default = "N".to_owned(), into)]
    pub filter_condition: String,
    /// `IMFLT`
    #[builder(default, into)]
    pub filter_code: String,
    /// Lookup tables, all of the same length (`NLUTS`, `NELUT`, `LUTD`)
    #[builder(default)]
    pub luts: Vec<Vec<u8>>,
}

impl ImageBand {
    fn read<R: Read>(r: &mut FieldReader<R>) -> Result<Self, ParseError> {
        let representation = r.read_string(2, "IREPBAND")?;
        let subcategory = r.read_string(6, "ISUBCAT")?;
        let filter_condition = r.read_string(1, "IFC")?;
        let filter_code = r.read_string(3, "IMFLT")?;
        let lut_count = read_bounded(r, 1, MAX_LUTS as u64, "NLUTS")?;
        let luts = if lut_count > 0 {
            let entries: usize = r.read_uint(5, "NELUT")?;
            (0..lut_count)
                .map(|_| r.read_bytes(entries, "LUTD"))
                .collect::<Result<_, _>>()?
        } else {
            Vec::new()
        };
        Ok(Self {
            representation,
            subcategory,
            filter_condition,
            filter_code,
            luts,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>) -> Result<(), Error> {
        w.write_string(&self.representation, 2, "IREPBAND")?;
        w.write_string(&self.subcategory, 6, "ISUBCAT")?;
        w.write_string(&self.filter_condition, 1, "IFC")?;
        w.write_string(&self.filter_code, 3, "IMFLT")?;
        if self.luts.len() > MAX_LUTS {
            return Err(Error::FormatConstraint {
                field: "NLUTS".to_owned(),
                reason: format!("{} lookup tables, at most {MAX_LUTS} allowed", self.luts.len()),
            });
        }
        w.write_uint(self.luts.len() as u64, 1, "NLUTS")?;
        let Some(first) = self.luts.first() else {
            return Ok(());
        };
        if self.luts.iter().any(|lut| lut.len() != first.len()) {
            return Err(Error::Build(
                "lookup tables of one band must have the same number of entries".to_owned(),
            ));
        }
        w.write_uint(first.len() as u64, 5, "NELUT")?;
        self.luts.iter().try_for_each(|lut| w.write_bytes(lut))
    }
}

/// An image segment: subheader fields, TREs and pixel data
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ImageSegment {
    /// `IID1`
    #[builder(default, into)]
    pub identifier: String,
    /// `IDATIM`
    #[builder(default)]
    pub date_time: FieldDateTime,
    /// `TGTID`
    #[builder(default, into)]
    pub target_id: String,
    /// `IID2` (`ITITLE` in the legacy dialect)
    #[builder(default, into)]
    pub title: String,
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `ISORCE`
    #[builder(default, into)]
    pub source: String,
    /// `NROWS`
    pub rows: u32,
    /// `NCOLS`
    pub columns: u32,
    #[builder(default)]
    pub pixel_value_type: PixelValueType,
    #[builder(default)]
    pub representation: ImageRepresentation,
    #[builder(default)]
    pub category: ImageCategory,
    /// `ABPP`, significant bits per sample
    pub actual_bits_per_pixel: u8,
    #[builder(default)]
    pub justification: PixelJustification,
    #[builder(default)]
    pub coordinate_system: CoordinateSystem,
    /// `IGEOLO`, only written when a coordinate system is set
    #[builder(default, into)]
    pub corner_coordinates: String,
    /// `ICOMn`, at most nine
    #[builder(default)]
    pub comments: Vec<String>,
    #[builder(default)]
    pub compression: ImageCompression,
    /// `COMRAT`, only written for compressed data
    #[builder(default, into)]
    pub compression_rate: String,
    pub bands: Vec<ImageBand>,
    #[builder(default)]
    pub mode: ImageMode,
    /// `NBPR`
    #[builder(default = 1)]
    pub blocks_per_row: u16,
    /// `NBPC`
    #[builder(default = 1)]
    pub blocks_per_column: u16,
    /// `NPPBH`
    pub pixels_per_block_horizontal: u16,
    /// `NPPBV`
    pub pixels_per_block_vertical: u16,
    /// `NBPP`, bits per sample as stored
    pub bits_per_pixel: u8,
    /// `IDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `IALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `ILOC`
    #[builder(default)]
    pub location: Location,
    /// `IMAG`
    #[builder(default = "1.0".to_owned(), into)]
    pub magnification: String,
    /// TREs from `UDID` and `IXSHD`
    #[builder(default)]
    pub tres: TreCollection,
    /// `UDOFL`
    #[builder(default)]
    pub user_data_overflow: u16,
    /// `IXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(default)]
    pub data: SegmentData,
}

impl ImageSegment {
    /// Number of samples per pixel
    #[must_use]
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Pixel data, if it is loaded
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.bytes()
    }

    /// Number of blocks in the image
    #[must_use]
    pub fn block_count(&self) -> usize {
        usize::from(self.blocks_per_row) * usize::from(self.blocks_per_column)
    }

    fn write_band_count<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
    ) -> Result<(), Error> {
        let count = self.bands.len() as u64;
        match count {
            0 => Err(Error::Build("an image segment needs at least one band".to_owned())),
            1..=9 => w.write_uint(count, 1, "NBANDS"),
            _ if dialect.layout().has_extended_band_count => {
                w.write_uint(0u8, 1, "NBANDS")?;
                w.write_uint(count, 5, "XBANDS")
            }
            _ => Err(Error::FormatConstraint {
                field: "NBANDS".to_owned(),
                reason: format!("{count} bands, {dialect} allows at most 9"),
            }),
        }
    }
}

impl Segment for ImageSegment {
    const KIND: SegmentKind = SegmentKind::Image;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        let dialect = ctx.dialect;
        r.expect_marker("IM", "IM")?;
        let identifier = r.read_string(10, "IID1")?;
        let date_time = FieldDateTime::read(r, dialect, "IDATIM")?;
        let target_id = r.read_string(17, "TGTID")?;
        let title = r.read_string(80, "IID2")?;
        let security = SecurityMetadata::read(r, dialect)?;
        read_encryption(r)?;
        let source = r.read_string(42, "ISORCE")?;
        let rows = r.read_uint(8, "NROWS")?;
        let columns = r.read_uint(8, "NCOLS")?;
        let pixel_value_type = read_code(r, 3, "PVTYPE")?;
        let representation = read_code(r, 8, "IREP")?;
        let category = read_code(r, 8, "ICAT")?;
        let actual_bits_per_pixel = r.read_uint(2, "ABPP")?;
        let justification = read_code(r, 1, "PJUST")?;
        let coordinate_system = CoordinateSystem::read(r, dialect)?;
        let corner_coordinates = if coordinate_system == CoordinateSystem::None {
            String::new()
        } else {
            r.read_string(60, "IGEOLO")?
        };
        let comment_count = read_bounded(r, 1, MAX_COMMENTS as u64, "NICOM")?;
        let comments = (0..comment_count)
            .map(|_| r.read_string(80, "ICOM"))
            .collect::<Result<_, _>>()?;
        let compression: ImageCompression = read_code(r, 2, "IC")?;
        let compression_rate = if compression.has_rate() {
            r.read_string(4, "COMRAT")?
        } else {
            String::new()
        };
        let mut band_count: usize = r.read_uint(1, "NBANDS")?;
        if band_count == 0 && dialect.layout().has_extended_band_count {
            band_count = r.read_uint(5, "XBANDS")?;
        }
        debug!("image {identifier:?}: {rows}x{columns}, {band_count} bands, {compression}");
        let bands = (0..band_count)
            .map(|_| ImageBand::read(r))
            .collect::<Result<_, _>>()?;
        let _sync: u8 = r.read_uint(1, "ISYNC")?;
        let mode = read_code(r, 1, "IMODE")?;
        let blocks_per_row = r.read_uint(4, "NBPR")?;
        let blocks_per_column = r.read_uint(4, "NBPC")?;
        let pixels_per_block_horizontal = r.read_uint(4, "NPPBH")?;
        let pixels_per_block_vertical = r.read_uint(4, "NPPBV")?;
        let bits_per_pixel = r.read_uint(2, "NBPP")?;
        let display_level = r.read_uint(3, "IDLVL")?;
        let attachment_level = r.read_uint(3, "IALVL")?;
        let location = Location::read(r, "ILOC")?;
        let magnification = r.read_string(4, "IMAG")?;
        let user_data = UDID.read(r, ctx.decode_tres)?;
        let extended = IXSHD.read(r, ctx.decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(user_data.tres);
        tres.extend(extended.tres);

        Ok(Self {
            identifier,
            date_time,
            target_id,
            title,
            security,
            source,
            rows,
            columns,
            pixel_value_type,
            representation,
            category,
            actual_bits_per_pixel,
            justification,
            coordinate_system,
            corner_coordinates,
            comments,
            compression,
            compression_rate,
            bands,
            mode,
            blocks_per_row,
            blocks_per_column,
            pixels_per_block_horizontal,
            pixels_per_block_vertical,
            bits_per_pixel,
            display_level,
            attachment_level,
            location,
            magnification,
            tres,
            user_data_overflow: user_data.overflow,
            extended_overflow: extended.overflow,
            data: SegmentData::default(),
        })
    }

    fn write_subheader<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
    ) -> Result<(), Error> {
        w.write_bytes(b"IM")?;
        w.write_string(&self.identifier, 10, "IID1")?;
        self.date_time.write(w, dialect, "IDATIM")?;
        w.write_string(&self.target_id, 17, "TGTID")?;
        w.write_string(&self.title, 80, "IID2")?;
        self.security.write(w, dialect)?;
        write_encryption(w)?;
        w.write_string(&self.source, 42, "ISORCE")?;
        w.write_uint(self.rows, 8, "NROWS")?;
        w.write_uint(self.columns, 8, "NCOLS")?;
        w.write_string(self.pixel_value_type.into(), 3, "PVTYPE")?;
        w.write_string(self.representation.as_str(), 8, "IREP")?;
        w.write_string(self.category.as_str(), 8, "ICAT")?;
        w.write_uint(self.actual_bits_per_pixel, 2, "ABPP")?;
        w.write_string(self.justification.into(), 1, "PJUST")?;
        self.coordinate_system.write(w, dialect)?;
        if self.coordinate_system != CoordinateSystem::None {
            w.write_string(&self.corner_coordinates, 60, "IGEOLO")?;
        }
        if self.comments.len() > MAX_COMMENTS {
            return Err(Error::FormatConstraint {
                field: "NICOM".to_owned(),
                reason: format!("{} comments, at most {MAX_COMMENTS}", self.comments.len()),
            });
        }
        w.write_uint(self.comments.len() as u64, 1, "NICOM")?;
        for comment in &self.comments {
            w.write_string(comment, 80, "ICOM")?;
        }
        w.write_string(self.compression.as_str(), 2, "IC")?;
        if self.compression.has_rate() {
            w.write_string(&self.compression_rate, 4, "COMRAT")?;
        }
        self.write_band_count(w, dialect)?;
        for band in &self.bands {
            band.write(w)?;
        }
        w.write_uint(0u8, 1, "ISYNC")?;
        w.write_string(self.mode.into(), 1, "IMODE")?;
        w.write_uint(self.blocks_per_row, 4, "NBPR")?;
        w.write_uint(self.blocks_per_column, 4, "NBPC")?;
        w.write_uint(self.pixels_per_block_horizontal, 4, "NPPBH")?;
        w.write_uint(self.pixels_per_block_vertical, 4, "NPPBV")?;
        w.write_uint(self.bits_per_pixel, 2, "NBPP")?;
        w.write_uint(self.display_level, 3, "IDLVL")?;
        w.write_uint(self.attachment_level, 3, "IALVL")?;
        self.location.write(w, "ILOC")?;
        w.write_string(&self.magnification, 4, "IMAG")?;
        UDID.write(w, &self.tres, self.user_data_overflow)?;
        IXSHD.write(w, &self.tres, self.extended_overflow)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }

    fn overflow_pointers(&self) -> Vec<(TreSource, u16)> {
        vec![
            (UDID.source, self.user_data_overflow),
            (IXSHD.source, self.extended_overflow),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        security::{LegacySecurity, SecurityMetadata},
        tre::Tre,
    };

    fn sample(dialect: Dialect) -> ImageSegment {
        ImageSegment::builder()
            .identifier("IMG1")
            .security(SecurityMetadata::unclassified(dialect))
            .rows(2)
            .columns(3)
            .actual_bits_per_pixel(8)
            .bits_per_pixel(8)
            .pixels_per_block_horizontal(3)
            .pixels_per_block_vertical(2)
            .bands(vec![ImageBand::builder().representation("M").build()])
            .comments(vec!["first".to_owned()])
            .data(SegmentData::Loaded(vec![1, 2, 3, 4, 5, 6]))
            .build()
    }

    fn round_trip(segment: &ImageSegment, dialect: Dialect) -> ImageSegment {
        let bytes = segment.encode_subheader(dialect).unwrap();
        let ctx = ReadContext {
            dialect,
            decode_tres: true,
            subheader_length: bytes.len() as u64,
        };
        let mut r = FieldReader::new(&bytes[..]);
        let mut parsed = ImageSegment::read_subheader(&mut r, &ctx).unwrap();
        assert_eq!(r.offset(), bytes.len() as u64);
        parsed.set_data(segment.data.clone());
        parsed
    }

    #[test]
    fn subheader_round_trips_in_every_dialect() {
        for dialect in [Dialect::Nitf20, Dialect::Nitf21, Dialect::Nsif10] {
            let segment = sample(dialect);
            assert_eq!(round_trip(&segment, dialect), segment);
        }
    }

    #[test]
    fn luts_and_tres_round_trip() {
        let mut segment = sample(Dialect::Nitf21);
        segment.representation = ImageRepresentation::RgbLut;
        segment.bands[0].representation = "LU".to_owned();
        segment.bands[0].luts = vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]];
        segment.coordinate_system = CoordinateSystem::Geographic;
        segment.corner_coordinates = "1".repeat(60);
        segment.tres.add(Tre::opaque(
            "XXXXXX",
            TreSource::ImageExtendedSubheaderData,
            b"opaque".to_vec(),
        ));
        assert_eq!(round_trip(&segment, Dialect::Nitf21), segment);
    }

    #[test]
    fn extended_band_count_is_current_only() {
        let mut segment = sample(Dialect::Nitf21);
        segment.bands = vec![ImageBand::builder().build(); 12];
        assert_eq!(round_trip(&segment, Dialect::Nitf21).bands.len(), 12);

        let mut legacy = sample(Dialect::Nitf20);
        legacy.bands = segment.bands.clone();
        assert!(matches!(
            legacy.encode_subheader(Dialect::Nitf20),
            Err(Error::FormatConstraint { .. })
        ));
    }

    #[test]
    fn coordinate_codes_follow_dialect() {
        assert_eq!(CoordinateSystem::None.code(Dialect::Nitf20), Some(b'N'));
        assert_eq!(CoordinateSystem::None.code(Dialect::Nitf21), Some(b' '));
        assert_eq!(CoordinateSystem::Geocentric.code(Dialect::Nsif10), None);

        let mut segment = sample(Dialect::Nitf21);
        segment.coordinate_system = CoordinateSystem::Geocentric;
        assert!(segment.encode_subheader(Dialect::Nitf21).is_err());
    }

    #[test]
    fn legacy_security_is_refused_in_current_documents() {
        let mut segment = sample(Dialect::Nitf21);
        segment.security = SecurityMetadata::Legacy(LegacySecurity::default());
        assert!(matches!(
            segment.encode_subheader(Dialect::Nitf21),
            Err(Error::Build(_))
        ));
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let mut segment = sample(Dialect::Nitf21);
        segment.category = ImageCategory::Other("XRAY".to_owned());
        segment.compression = ImageCompression::Other("I1".to_owned());
        segment.compression_rate = "00.0".to_owned();
        let parsed = round_trip(&segment, Dialect::Nitf21);
        assert_eq!(parsed.category.as_str(), "XRAY");
        assert_eq!(parsed.compression.to_string(), "I1");
        assert_eq!(parsed.compression_rate, "00.0");
    }
}
