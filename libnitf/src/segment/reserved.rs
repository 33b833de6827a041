use std::io::{Read, Write};

use super::{ReadContext, Segment, SegmentData};
use crate::{
    dialect::{Dialect, SegmentKind},
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    Error,
};

/// A reserved extension segment, kept byte for byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedExtensionSegment {
    /// Complete subheader, starting with `RE`
    pub subheader: Vec<u8>,
    pub data: SegmentData,
}

impl ReservedExtensionSegment {
    /// `RESID`, read from the stored subheader
    #[must_use]
    pub fn identifier(&self) -> String {
        let end = self.subheader.len().min(27);
        let id = self.subheader.get(2..end).unwrap_or_default();
        String::from_utf8_lossy(id).trim_end().to_owned()
    }
}

impl Segment for ReservedExtensionSegment {
    const KIND: SegmentKind = SegmentKind::ReservedExtension;

    fn read_subheader<R: Read>(
        r: &mut FieldReader<R>,
        ctx: &ReadContext,
    ) -> Result<Self, ParseError> {
        let offset = r.offset();
        let length = usize::try_from(ctx.subheader_length).map_err(|_| ParseError::Unsupported {
            offset,
            reason: format!("reserved subheader of {} bytes", ctx.subheader_length),
        })?;
        if length < 2 {
            return Err(ParseError::InvalidValue {
                offset,
                field: "LRESH",
                value: length.to_string(),
            });
        }
        r.expect_marker("RE", "RE")?;
        let mut subheader = b"RE".to_vec();
        subheader.extend(r.read_bytes(length - 2, "RESH")?);
        Ok(Self {
            subheader,
            data: SegmentData::default(),
        })
    }

    fn write_subheader<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        _dialect: Dialect,
    ) -> Result<(), Error> {
        if !self.subheader.starts_with(b"RE") {
            return Err(Error::Build(
                "reserved extension subheader must start with RE".to_owned(),
            ));
        }
        w.write_bytes(&self.subheader)
    }

    fn data(&self) -> &SegmentData {
        &self.data
    }

    fn set_data(&mut self, data: SegmentData) {
        self.data = data;
    }
}
