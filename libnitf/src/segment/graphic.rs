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
    source: TreSource::GraphicExtendedSubheaderData,
};

/// Colour usage of a graphic (`SCOLOR`)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
pub enum GraphicColor {
    #[default]
    #[strum(serialize = "M")]
    Monochrome,
    #[strum(serialize = "C")]
    Color,
}

/// A graphic segment (current dialects), carrying CGM data
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct GraphicSegment {
    /// `SID`
    #[builder(default, into)]
    pub identifier: String,
    /// `SNAME`
    #[builder(default, into)]
    pub name: String,
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `SDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `SALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `SLOC`
    #[builder(default)]
    pub location: Location,
    /// `SBND1`, first corner of the bounding box
    #[builder(default)]
    pub bound_first: Location,
    #[builder(default)]
    pub color: GraphicColor,
    /// `SBND2`, second corner of the bounding box
    #[builder(default)]
    pub bound_second: Location,
    #[builder(default)]
    pub tres: TreCollection,
    /// `SXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(default)]
    pub data: SegmentData,
}

impl Segment for GraphicSegment {
    const KIND: SegmentKind = SegmentKind::Graphic;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        r.expect_marker("SY", "SY")?;
        let identifier = r.read_string(10, "SID")?;
        let name = r.read_string(20, "SNAME")?;
        let security = SecurityMetadata::read(r, ctx.dialect)?;
        read_encryption(r)?;
        r.expect_marker("C", "SFMT")?;
        r.skip(13, "SSTRUCT")?;
        let display_level = r.read_uint(3, "SDLVL")?;
        let attachment_level = r.read_uint(3, "SALVL")?;
        let location = Location::read(r, "SLOC")?;
        let bound_first = Location::read(r, "SBND1")?;
        let color = read_code(r, 1, "SCOLOR")?;
        let bound_second = Location::read(r, "SBND2")?;
        r.skip(2, "SRES")?;
        let extended = SXSHD.read(r, ctx.decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(extended.tres);
        Ok(Self {
            identifier,
            name,
            security,
            display_level,
            attachment_level,
            location,
            bound_first,
            color,
            bound_second,
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
        w.write_bytes(b"C")?;
        w.write_uint(0u8, 13, "SSTRUCT")?;
        w.write_uint(self.display_level, 3, "SDLVL")?;
        w.write_uint(self.attachment_level, 3, "SALVL")?;
        self.location.write(w, "SLOC")?;
        self.bound_first.write(w, "SBND1")?;
        w.write_string(self.color.into(), 1, "SCOLOR")?;
        self.bound_second.write(w, "SBND2")?;
        w.write_uint(0u8, 2, "SRES")?;
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
    fn subheader_has_fixed_length() {
        let graphic = GraphicSegment::builder()
            .identifier("G1")
            .color(GraphicColor::Color)
            .bound_second(Location::new(10, 20))
            .build();
        let bytes = graphic.encode_subheader(Dialect::Nitf21).unwrap();
        assert_eq!(bytes.len(), 258);

        let ctx = ReadContext {
            dialect: Dialect::Nitf21,
            decode_tres: true,
            subheader_length: 258,
        };
        let parsed =
            GraphicSegment::read_subheader(&mut FieldReader::new(&bytes[..]), &ctx).unwrap();
        assert_eq!(parsed, graphic);
    }
}
