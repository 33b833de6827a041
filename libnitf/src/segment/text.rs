use std::{
    fmt::Display,
    io::{Read, Write},
};

use bon::Builder;
use strum::EnumString;

use super::{
    read_code, read_encryption, write_encryption, ExtensionBlock, ReadContext, Segment,
    SegmentData,
};
use crate::{
    datetime::FieldDateTime,
    dialect::{Dialect, SegmentKind},
    security::SecurityMetadata,
    serde::{
        error::Error as ParseError,
        utils::{latin1_to_string, string_to_latin1},
        FieldReader, FieldWriter,
    },
    tre::{TreCollection, TreSource},
    Error,
};

const TXSHD: ExtensionBlock = ExtensionBlock {
    length_field: "TXSHDL",
    overflow_field: "TXSOFL",
    data_field: "TXSHD",
    source: TreSource::TextExtendedSubheaderData,
};

/// Character set and syntax of a text segment body (`TXTFMT`)
#[derive(Default, Debug, Clone, PartialEq, Eq, EnumString)]
pub enum TextFormat {
    /// Basic character set
    #[default]
    #[strum(serialize = "STA")]
    Standard,
    /// US message text format
    #[strum(serialize = "MTF")]
    MessageText,
    /// Extended character set (ISO-8859-1)
    #[strum(serialize = "UT1")]
    Extended,
    /// UTF-8 subset
    #[strum(serialize = "U8S")]
    Utf8,
    /// Any other code, kept as read
    #[strum(default)]
    Other(String),
}

impl TextFormat {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard => "STA",
            Self::MessageText => "MTF",
            Self::Extended => "UT1",
            Self::Utf8 => "U8S",
            Self::Other(code) => code,
        }
    }
}

impl Display for TextFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text segment
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// `TEXTID`
    #[builder(default, into)]
    pub identifier: String,
    /// `TXTALVL`, current dialects only
    #[builder(default)]
    pub attachment_level: u16,
    /// `TXTDT`
    #[builder(default)]
    pub date_time: FieldDateTime,
    /// `TXTITL`
    #[builder(default, into)]
    pub title: String,
    #[builder(default)]
    pub security: SecurityMetadata,
    #[builder(default)]
    pub format: TextFormat,
    #[builder(default)]
    pub tres: TreCollection,
    /// `TXSOFL`
    #[builder(default)]
    pub extended_overflow: u16,
    #[builder(default)]
    pub data: SegmentData,
}

impl TextSegment {
    /// The body decoded according to [`Self::format`]
    ///
    /// Returns [`None`] if the data is not loaded or a `U8S` body is not valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let bytes = self.data.bytes()?;
        match self.format {
            TextFormat::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            _ => Some(latin1_to_string(bytes)),
        }
    }

    /// Replaces the body, encoding it according to [`Self::format`]
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FormatConstraint`] if a character cannot be represented in the
    /// segment's format.
    pub fn set_text(&mut self, text: &str) -> Result<(), Error> {
        let bytes = match self.format {
            TextFormat::Utf8 => text.as_bytes().to_vec(),
            _ => string_to_latin1(text).ok_or_else(|| Error::FormatConstraint {
                field: "TXTFMT".to_owned(),
                reason: format!("text holds characters outside {}", self.format),
            })?,
        };
        self.data = SegmentData::Loaded(bytes);
        Ok(())
    }
}

impl Segment for TextSegment {
    const KIND: SegmentKind = SegmentKind::Text;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        let layout = ctx.dialect.layout();
        r.expect_marker("TE", "TE")?;
        let identifier = r.read_string(layout.text_identifier_width, "TEXTID")?;
        let attachment_level = if layout.has_text_attachment_level {
            r.read_uint(3, "TXTALVL")?
        } else {
            0
        };
        let date_time = FieldDateTime::read(r, ctx.dialect, "TXTDT")?;
        let title = r.read_string(80, "TXTITL")?;
        let security = SecurityMetadata::read(r, ctx.dialect)?;
        read_encryption(r)?;
        let format = read_code(r, 3, "TXTFMT")?;
        let extended = TXSHD.read(r, ctx.decode_tres)?;
        let mut tres = TreCollection::new();
        tres.extend(extended.tres);
        Ok(Self {
            identifier,
            attachment_level,
            date_time,
            title,
            security,
            format,
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
        let layout = dialect.layout();
        w.write_bytes(b"TE")?;
        w.write_string(&self.identifier, layout.text_identifier_width, "TEXTID")?;
        if layout.has_text_attachment_level {
            w.write_uint(self.attachment_level, 3, "TXTALVL")?;
        } else if self.attachment_level != 0 {
            return Err(Error::FormatConstraint {
                field: "TXTALVL".to_owned(),
                reason: format!("{dialect} text segments have no attachment level"),
            });
        }
        self.date_time.write(w, dialect, "TXTDT")?;
        w.write_string(&self.title, 80, "TXTITL")?;
        self.security.write(w, dialect)?;
        write_encryption(w)?;
        w.write_string(self.format.as_str(), 3, "TXTFMT")?;
        TXSHD.write(w, &self.tres, self.extended_overflow)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }

    fn overflow_pointers(&self) -> Vec<(TreSource, u16)> {
        vec![(TXSHD.source, self.extended_overflow)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8], dialect: Dialect) -> TextSegment {
        let ctx = ReadContext {
            dialect,
            decode_tres: true,
            subheader_length: bytes.len() as u64,
        };
        TextSegment::read_subheader(&mut FieldReader::new(bytes), &ctx).unwrap()
    }

    #[test]
    fn identifier_width_follows_dialect() {
        let current = TextSegment::builder().identifier("ABCDEFG").build();
        let bytes = current.encode_subheader(Dialect::Nitf21).unwrap();
        assert_eq!(bytes.len(), 2 + 7 + 3 + 14 + 80 + 167 + 1 + 3 + 5);
        assert_eq!(parse(&bytes, Dialect::Nitf21), current);
        assert!(TextSegment::builder()
            .identifier("ABCDEFGHIJ")
            .build()
            .encode_subheader(Dialect::Nitf21)
            .is_err());

        let legacy = TextSegment::builder()
            .identifier("ABCDEFGHIJ")
            .security(SecurityMetadata::unclassified(Dialect::Nitf20))
            .build();
        let bytes = legacy.encode_subheader(Dialect::Nitf20).unwrap();
        assert_eq!(bytes.len(), 2 + 10 + 14 + 80 + 167 + 1 + 3 + 5);
        assert_eq!(parse(&bytes, Dialect::Nitf20), legacy);
    }

    #[test]
    fn body_encoding_follows_format() {
        let mut text = TextSegment::builder().format(TextFormat::Utf8).build();
        text.set_text("café").unwrap();
        assert_eq!(text.data.len(), 5);
        assert_eq!(text.text().as_deref(), Some("café"));

        let mut text = TextSegment::builder().format(TextFormat::Extended).build();
        text.set_text("café").unwrap();
        assert_eq!(text.data.len(), 4);
        assert!(text.set_text("\u{2603}").is_err());
    }
}
