use std::io::{Read, Write};

use chrono::{NaiveDateTime, Timelike, Utc};
use tracing::debug;

use crate::{
    dialect::Dialect,
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    Error,
};

/// A 14-character date/time field (`FDT`, `IDATIM`, `TXTDT`)
///
/// The field is parsed with the dialect's format (`CCYYMMDDhhmmss` for the current dialects,
/// `DDhhmmssZMONYY` for the legacy one). Values that do not parse, e.g. partially unknown
/// dates written with `-` placeholders, are kept verbatim so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDateTime {
    /// A complete date and time
    Parsed(NaiveDateTime),
    /// Raw field text
    Verbatim(String),
}

impl Default for FieldDateTime {
    fn default() -> Self {
        Self::now()
    }
}

impl From<NaiveDateTime> for FieldDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::Parsed(value)
    }
}

impl FieldDateTime {
    /// The current UTC time, truncated to whole seconds
    #[must_use]
    pub fn now() -> Self {
        let now = Utc::now().naive_utc();
        Self::Parsed(now.with_nanosecond(0).unwrap_or(now))
    }

    pub(crate) fn read<R: Read>(
        r: &mut FieldReader<R>,
        dialect: Dialect,
        field: &'static str,
    ) -> Result<Self, ParseError> {
        let raw = r.read_raw_string(14, field)?;
        let format = dialect.layout().date_time_format;
        Ok(NaiveDateTime::parse_from_str(&raw, format).map_or_else(
            |e| {
                debug!("keeping {field} {raw:?} verbatim: {e}");
                Self::Verbatim(raw)
            },
            Self::Parsed,
        ))
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
        field: &'static str,
    ) -> Result<(), Error> {
        match self {
            Self::Parsed(dt) => {
                // legacy month abbreviations are upper case (e.g. `JAN`)
                let formatted = dt
                    .format(dialect.layout().date_time_format)
                    .to_string()
                    .to_uppercase();
                w.write_string(&formatted, 14, field)
            }
            Self::Verbatim(raw) => w.write_string(raw, 14, field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> FieldDateTime {
        NaiveDate::from_ymd_opt(1999, 1, 21)
            .and_then(|d| d.and_hms_opt(12, 34, 56))
            .map(FieldDateTime::from)
            .unwrap()
    }

    fn encode(value: &FieldDateTime, dialect: Dialect) -> String {
        let mut w = FieldWriter::new(Vec::new());
        value.write(&mut w, dialect, "FDT").unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn formats_per_dialect() {
        assert_eq!(encode(&sample(), Dialect::Nitf21), "19990121123456");
        assert_eq!(encode(&sample(), Dialect::Nitf20), "21123456ZJAN99");
    }

    #[test]
    fn parses_both_formats() {
        for (text, dialect) in [
            ("19990121123456", Dialect::Nsif10),
            ("21123456ZJAN99", Dialect::Nitf20),
        ] {
            let parsed =
                FieldDateTime::read(&mut FieldReader::new(text.as_bytes()), dialect, "FDT")
                    .unwrap();
            assert_eq!(parsed, sample());
        }
    }

    #[test]
    fn keeps_partial_dates_verbatim() {
        let text = "199901--------";
        let parsed =
            FieldDateTime::read(&mut FieldReader::new(text.as_bytes()), Dialect::Nitf21, "FDT")
                .unwrap();
        assert_eq!(parsed, FieldDateTime::Verbatim(text.to_owned()));
        assert_eq!(encode(&parsed, Dialect::Nitf21), text);
    }
}
