use std::io::{Read, Write};

use bon::Builder;

use super::{
    read_encryption, write_encryption, ExtensionBlock, Location, ReadContext, Segment, SegmentData,
};
use crate::{
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    serde::{error::Error as ParseError, utils::latin1_to_string, FieldReader, FieldWriter},
    tre::{TreCollection, TreSource},
    Error,
};

const LXSHD: ExtensionBlock = ExtensionBlock {
    length_field: "LXSHDL",
    overflow_field: "LXSOFL",
    data_field: "LXSHD",
    source: TreSource::LabelExtendedSubheaderData,
};

/// A label segment (legacy dialect): a short text drawn over the imagery
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct LabelSegment {
    /// `LID`
    #[builder(default, into)]
    pub identifier: String,
    pub security: SecurityMetadata,
    /// `LFS`, font style
    #[builder(default, into)]
    pub font_style: String,
    /// `LCW`, cell width
    #[builder(default)]
    pub cell_width: u8,
    /// `LCH`, cell height
    #[builder(default)]
    pub cell_height: u8,
    /// `LDLVL`
    #[builder(default = 1)]
    pub display_level: u16,
    /// `LALVL`
    #[builder(default)]
    pub attachment_level: u16,
    /// `LLOC`
    #[builder(default)]
    pub location: Location,
    /// `LTC`, RGB text colour
    #[builder(default)]
    pub text_color: [u8; 3],
    /// `LBC`, RGB background colour
    #[builder(default = [255, 255, 255])]
    pub background_color: [u8; 3],
    #[builder(default)]
    pub tres: TreCollection,
    /// `LXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(default)]
    pub data: SegmentData,
}

impl LabelSegment {
    /// The label text, decoded as ISO-8859-1
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.data.bytes().map(latin1_to_string)
    }
}

impl Segment for LabelSegment {
    const KIND: SegmentKind = SegmentKind::Label;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        r.expect_marker("LA", "LA")?;
        let identifier = r.read_string(10, "LID")?;
        let security = SecurityMetadata::read(r, ctx.dialect)?;
        read_encryption(r)?;
        let font_style = r.read_string(1, "LFS")?;
        let cell_width = r.read_uint(2, "LCW")?;
        let cell_height = r.read_uint(2, "LCH")?;
        let display_level = r.read_uint(3, "LDLVL")?;
        let attachment_level = r.read_uint(3, "LALVL")?;
        let location = Location::read(r, "LLOC")?;
        let text_color = r.read_array::<3>("LTC")?;
        let background_color = r.read_array::<3>("LBC")?;
        let extended = LXSHD.read(r, ctx.decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(extended.tres);
        Ok(Self {
            identifier,
            security,
            font_style,
            cell_width,
            cell_height,
            display_level,
            attachment_level,
            location,
            text_color,
            background_color,
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
        w.write_bytes(b"LA")?;
        w.write_string(&self.identifier, 10, "LID")?;
        self.security.write(w, dialect)?;
        write_encryption(w)?;
        w.write_string(&self.font_style, 1, "LFS")?;
        w.write_uint(self.cell_width, 2, "LCW")?;
        w.write_uint(self.cell_height, 2, "LCH")?;
        w.write_uint(self.display_level, 3, "LDLVL")?;
        w.write_uint(self.attachment_level, 3, "LALVL")?;
        self.location.write(w, "LLOC")?;
        w.write_bytes(&self.text_color)?;
        w.write_bytes(&self.background_color)?;
        LXSHD.write(w, &self.tres, self.extended_overflow)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }

    fn overflow_pointers(&self) -> Vec<(TreSource, u16)> {
        vec![(LXSHD.source, self.extended_overflow)]
    }
}
