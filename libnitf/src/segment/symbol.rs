use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};

use super::{
    read_code, read_encryption, write_encryption, ExtensionBlock, Location, ReadContext, Segment,
    SegmentData,
};
use crate::{
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    tre::{TreCollection, TreSource},
    Error,
};

const SXSHD: ExtensionBlock = ExtensionBlock {
    length_field: "SXSHDL",
    overflow_field: "SXSOFL",
    data_field: "SXSHD",
    source: TreSource::SymbolExtendedSubheaderData,
};

const MAX_LUT_ENTRIES: usize = 999;

/// `STYPE`
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum SymbolType {
    #[default]
    #[strum(serialize = "B")]
    Bitmap,
    #[strum(serialize = "C")]
    Cgm,
    #[strum(serialize = "O")]
    Object,
}

/// A symbol segment (legacy dialect)
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct SymbolSegment {
    /// `SID`
    #[builder(default, into)]
    pub identifier: String,
    /// `SNAME`
    #[builder(default, into)]
    pub name: String,
    pub security: SecurityMetadata,
    #[builder(default)]
    pub symbol_type: SymbolType,
    /// `NLIPS`, bitmap rows
    #[builder(default)]
    pub lines: u16,
    /// `NPIXPL`, bitmap columns
    #[builder(default)]
    pub pixels_per_line: u16,
    /// `NWDTH`, line width
    #[builder(default)]
    pub line_width: u16,
    /// `NBPP`
    #[builder(default)]
    pub bits_per_pixel: u8,
    /// `SDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `SALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `SLOC`
    #[builder(default)]
    pub location: Location,
    /// `SLOC2`
    #[builder(default)]
    pub second_location: Location,
    /// `SCOLOR`
    #[builder(default, into)]
    pub color: String,
    /// `SNUM`, object number for object symbols
    #[builder(default, into)]
    pub number: String,
    /// `SROT`, rotation in degrees
    #[builder(default)]
    pub rotation: u16,
    /// Colour lookup table, one RGB triple per entry (`NELUT`, `DLUT`)
    #[builder(default)]
    pub lut: Vec<[u8; 3]>,
    #[builder(default)]
    pub tres: TreCollection,
    /// `SXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(default)]
    pub data: SegmentData,
}

impl Segment for SymbolSegment {
    const KIND: SegmentKind = SegmentKind::Symbol;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        r.expect_marker("SY", "SY")?;
        let identifier = r.read_string(10, "SID")?;
        let name = r.read_string(20, "SNAME")?;
        let security = SecurityMetadata::read(r, ctx.dialect)?;
        read_encryption(r)?;
        let symbol_type = read_code(r, 1, "STYPE")?;
        let lines = r.read_uint(4, "NLIPS")?;
        let pixels_per_line = r.read_uint(4, "NPIXPL")?;
        let line_width = r.read_uint(4, "NWDTH")?;
        let bits_per_pixel = r.read_uint(1, "NBPP")?;
        let display_level = r.read_uint(3, "SDLVL")?;
        let attachment_level = r.read_uint(3, "SALVL")?;
        let location = Location::read(r, "SLOC")?;
        let second_location = Location::read(r, "SLOC2")?;
        let color = r.read_string(1, "SCOLOR")?;
        let number = r.read_string(6, "SNUM")?;
        let rotation = r.read_uint(3, "SROT")?;
        let entries: usize = r.read_uint(3, "NELUT")?;
        let lut = (0..entries)
            .map(|_| r.read_array::<3>("DLUT"))
            .collect::<Result<_, _>>()?;
        let extended = SXSHD.read(r, ctx.decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(extended.tres);
        Ok(Self {
            identifier,
            name,
            security,
            symbol_type,
            lines,
            pixels_per_line,
            line_width,
            bits_per_pixel,
            display_level,
            attachment_level,
            location,
            second_location,
            color,
            number,
            rotation,
            lut,
            tres,
            extended_overflow: extended.overflow,
            data: SegmentData::default(),
        })
    }

    fn write_subheader<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
    ) -> Result<(), Error> {
        w.write_bytes(b"SY")?;
        w.write_string(&self.identifier, 10, "SID")?;
        w.write_string(&self.name, 20, "SNAME")?;
        self.security.write(w, dialect)?;
        write_encryption(w)?;
        w.write_string(self.symbol_type.into(), 1, "STYPE")?;
        w.write_uint(self.lines, 4, "NLIPS")?;
        w.write_uint(self.pixels_per_line, 4, "NPIXPL")?;
        w.write_uint(self.line_width, 4, "NWDTH")?;
        w.write_uint(self.bits_per_pixel, 1, "NBPP")?;
        w.write_uint(self.display_level, 3, "SDLVL")?;
        w.write_uint(self.attachment_level, 3, "SALVL")?;
        self.location.write(w, "SLOC")?;
        self.second_location.write(w, "SLOC2")?;
        w.write_string(&self.color, 1, "SCOLOR")?;
        w.write_string(&self.number, 6, "SNUM")?;
        w.write_uint(self.rotation, 3, "SROT")?;
        if self.lut.len() > MAX_LUT_ENTRIES {
            return Err(Error::FormatConstraint {
                field: "NELUT".to_owned(),
                reason: format!("{} entries, at most {MAX_LUT_ENTRIES}", self.lut.len()),
            });
        }
        w.write_uint(self.lut.len() as u64, 3, "NELUT")?;
        for entry in &self.lut {
            w.write_bytes(entry)?;
        }
        SXSHD.write(w, &self.tres, self.extended_overflow)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }

    fn overflow_pointers(&self) -> Vec<(TreSource, u16)> {
        vec![(SXSHD.source, self.extended_overflow)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_symbol_with_lut_round_trips() {
        let symbol = SymbolSegment::builder()
            .identifier("SYM")
            .security(SecurityMetadata::unclassified(Dialect::Nitf20))
            .lines(4)
            .pixels_per_line(4)
            .bits_per_pixel(1)
            .color("C")
            .lut(vec![[0, 0, 0], [255, 255, 255]])
            .build();
        let bytes = symbol.encode_subheader(Dialect::Nitf20).unwrap();
        let ctx = ReadContext {
            dialect: Dialect::Nitf20,
            decode_tres: true,
            subheader_length: bytes.len() as u64,
        };
        let mut r = FieldReader::new(&bytes[..]);
        let parsed = SymbolSegment::read_subheader(&mut r, &ctx).unwrap();
        assert_eq!(r.offset(), bytes.len() as u64);
        assert_eq!(parsed, symbol);
    }
}
