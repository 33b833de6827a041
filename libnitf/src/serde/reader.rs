use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

use super::{
    error::Error,
    utils::{latin1_to_string, parse_int_pair_field, parse_uint_field},
};

/// Largest buffer allocated before any of its bytes have been read
const PREALLOCATION_LIMIT: usize = 1 << 20;

/// Forward-only cursor over a byte source, reading fixed-width NITF fields
///
/// Every read advances [`FieldReader::offset`]; the offset is attached to all errors.
pub struct FieldReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> FieldReader<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    fn fill(&mut self, buf: &mut [u8], field: &'static str) -> Result<(), Error> {
        let offset = self.offset;
        let wanted = buf.len();
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::UnexpectedEof {
                offset,
                field,
                wanted,
            },
            _ => Error::Io { offset, source: e },
        })?;
        self.offset += wanted as u64;
        Ok(())
    }

    /// Reads exactly `len` raw bytes
    ///
    /// `len` usually comes from the file itself, so at most [`PREALLOCATION_LIMIT`] bytes are
    /// reserved up front and the buffer only grows with bytes actually read.
    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, Error> {
        if len <= PREALLOCATION_LIMIT {
            let mut buf = vec![0; len];
            self.fill(&mut buf, field)?;
            return Ok(buf);
        }
        let offset = self.offset;
        let mut buf = Vec::with_capacity(PREALLOCATION_LIMIT);
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|source| Error::Io { offset, source })?;
        self.offset += read as u64;
        if read != len {
            return Err(Error::UnexpectedEof {
                offset,
                field,
                wanted: len,
            });
        }
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], Error> {
        let mut buf = [0; N];
        self.fill(&mut buf, field)?;
        Ok(buf)
    }

    /// Reads a fixed-width text field verbatim (no trimming)
    pub fn read_raw_string(&mut self, width: usize, field: &'static str) -> Result<String, Error> {
        let bytes = self.read_bytes(width, field)?;
        let value = latin1_to_string(&bytes);
        trace!("{field}: {value:?}");
        Ok(value)
    }

    /// Reads a fixed-width, space-padded text field and trims the padding
    pub fn read_string(&mut self, width: usize, field: &'static str) -> Result<String, Error> {
        let mut value = self.read_raw_string(width, field)?;
        value.truncate(value.trim_end_matches(' ').len());
        Ok(value)
    }

    /// Reads a fixed-width ASCII-decimal field into any unsigned integer type
    pub fn read_uint<T: TryFrom<u64>>(
        &mut self,
        width: usize,
        field: &'static str,
    ) -> Result<T, Error> {
        let offset = self.offset;
        let bytes = self.read_bytes(width, field)?;
        let invalid = || Error::InvalidNumber {
            offset,
            field,
            value: latin1_to_string(&bytes),
        };
        let value = parse_uint_field(&bytes).ok_or_else(invalid)?;
        trace!("{field}: {value}");
        T::try_from(value).map_err(|_| invalid())
    }

    /// Reads a field holding two signed halves, e.g. a `RRRRRCCCCC` location
    pub fn read_int_pair(
        &mut self,
        width: usize,
        field: &'static str,
    ) -> Result<(i32, i32), Error> {
        let offset = self.offset;
        let bytes = self.read_bytes(width, field)?;
        parse_int_pair_field(&bytes)
            .and_then(|(a, b)| Some((i32::try_from(a).ok()?, i32::try_from(b).ok()?)))
            .ok_or_else(|| Error::InvalidNumber {
                offset,
                field,
                value: latin1_to_string(&bytes),
            })
    }

    /// Verifies a literal marker at the current position
    ///
    /// A mismatch is fatal since the format has no resynchronisation point.
    pub fn expect_marker(
        &mut self,
        marker: &'static str,
        field: &'static str,
    ) -> Result<(), Error> {
        let offset = self.offset;
        let found = self.read_bytes(marker.len(), field)?;
        if found != marker.as_bytes() {
            return Err(Error::MarkerMismatch {
                offset,
                expected: marker,
                found: latin1_to_string(&found),
            });
        }
        Ok(())
    }

    /// Discards `len` bytes without buffering them
    pub fn skip(&mut self, len: u64, field: &'static str) -> Result<(), Error> {
        let offset = self.offset;
        let copied = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())
            .map_err(|source| Error::Io { offset, source })?;
        self.offset += copied;
        if copied != len {
            return Err(Error::UnexpectedEof {
                offset,
                field,
                wanted: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }
        Ok(())
    }

    /// Reads everything left in the source
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let offset = self.offset;
        let mut buf = Vec::new();
        let read = self
            .inner
            .read_to_end(&mut buf)
            .map_err(|source| Error::Io { offset, source })?;
        self.offset += read as u64;
        Ok(buf)
    }
}

impl<R: Read + Seek> FieldReader<R> {
    /// Repositions the cursor for random access to a segment's data
    pub fn seek_to(&mut self, offset: u64) -> Result<(), Error> {
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|source| Error::Io {
                offset: self.offset,
                source,
            })?;
        self.offset = offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_and_tracks_offset() {
        let mut r = FieldReader::new(&b"NITF02.1003TITLE     -0001+0002"[..]);
        r.expect_marker("NITF", "FHDR").unwrap();
        assert_eq!(r.read_string(5, "FVER").unwrap(), "02.10");
        assert_eq!(r.read_uint::<u8>(2, "CLEVEL").unwrap(), 3);
        assert_eq!(r.read_string(10, "FTITLE").unwrap(), "TITLE");
        assert_eq!(r.read_int_pair(10, "ILOC").unwrap(), (-1, 2));
        assert_eq!(r.offset(), 31);
    }

    #[test]
    fn errors_carry_offsets() {
        let mut r = FieldReader::new(&b"NSIFxx"[..]);
        let err = r.expect_marker("NITF", "FHDR").unwrap_err();
        assert_eq!(err.offset(), 0);
        let err = r.read_uint::<u8>(2, "CLEVEL").unwrap_err();
        assert!(matches!(err, Error::InvalidNumber { offset: 4, .. }));
        let err = r.read_bytes(1, "STYPE").unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { offset: 6, .. }));
    }

    #[test]
    fn oversized_length_fails_without_allocating_it() {
        let mut r = FieldReader::new(&b"0123456789"[..]);
        r.skip(4, "LISH").unwrap();
        let err = r.read_bytes(usize::MAX, "segment data").unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                offset: 4,
                wanted: usize::MAX,
                ..
            }
        ));
    }

    #[test]
    fn skip_reports_truncation() {
        let mut r = FieldReader::new(&b"abc"[..]);
        r.skip(2, "data").unwrap();
        assert_eq!(r.offset(), 2);
        assert!(r.skip(5, "data").is_err());
    }
}
