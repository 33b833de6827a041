use std::io::Write;

use crate::Error;

use super::utils::string_to_latin1;

/// Sequential writer of fixed-width NITF fields
///
/// Values that do not fit their field are rejected rather than truncated.
pub struct FieldWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> FieldWriter<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Number of bytes emitted so far
    pub const fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Writes a zero-padded unsigned decimal of exactly `width` digits
    pub fn write_uint(
        &mut self,
        value: impl Into<u64>,
        width: usize,
        field: &'static str,
    ) -> Result<(), Error> {
        let value = value.into();
        let formatted = format!("{value:0width$}");
        if formatted.len() > width {
            return Err(Error::FormatConstraint {
                field: field.to_owned(),
                reason: format!("{value} does not fit in {width} digits"),
            });
        }
        self.write_bytes(formatted.as_bytes())
    }

    /// Writes a signed decimal, zero-padded after an optional leading `-`
    pub fn write_int(
        &mut self,
        value: i64,
        width: usize,
        field: &'static str,
    ) -> Result<(), Error> {
        let formatted = if value < 0 {
            format!("-{:0w$}", value.unsigned_abs(), w = width.saturating_sub(1))
        } else {
            format!("{value:0width$}")
        };
        if formatted.len() > width {
            return Err(Error::FormatConstraint {
                field: field.to_owned(),
                reason: format!("{value} does not fit in {width} characters"),
            });
        }
        self.write_bytes(formatted.as_bytes())
    }

    /// Writes a left-justified, space-padded text field
    pub fn write_string(
        &mut self,
        value: &str,
        width: usize,
        field: &'static str,
    ) -> Result<(), Error> {
        let bytes = encode_text(value, width, field)?;
        self.write_bytes(&bytes)?;
        self.write_padding(width - bytes.len())
    }

    fn write_padding(&mut self, len: usize) -> Result<(), Error> {
        const SPACES: [u8; 80] = [b' '; 80];
        let mut left = len;
        while left > 0 {
            let n = left.min(SPACES.len());
            self.write_bytes(&SPACES[..n])?;
            left -= n;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()?;
        Ok(())
    }
}

fn encode_text(value: &str, width: usize, field: &'static str) -> Result<Vec<u8>, Error> {
    let bytes = string_to_latin1(value).ok_or_else(|| Error::FormatConstraint {
        field: field.to_owned(),
        reason: format!("{value:?} holds characters outside the field character set"),
    })?;
    if bytes.len() > width {
        return Err(Error::FormatConstraint {
            field: field.to_owned(),
            reason: format!("{value:?} is longer than {width} characters"),
        });
    }
    Ok(bytes)
}
