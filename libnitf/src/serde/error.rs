use thiserror::Error;

/// Low-level codec failure, always carrying the byte offset it was detected at
///
/// There is no resynchronisation point in the format, so every variant is fatal for the
/// segment (and therefore the file) being parsed.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The stream ended inside a field
    #[error(
        "unexpected end of stream at byte {offset} while reading {field} ({wanted} bytes wanted)"
    )]
    UnexpectedEof {
        /// offset of the field start
        offset: u64,
        /// field name
        field: &'static str,
        /// field width
        wanted: usize,
    },
    /// A literal marker (segment kind, file profile) did not match
    #[error("expected marker {expected:?} at byte {offset}, found {found:?}")]
    MarkerMismatch {
        /// offset of the marker
        offset: u64,
        /// expected marker text
        expected: &'static str,
        /// bytes actually found
        found: String,
    },
    /// A fixed-width numeric field did not hold a number
    #[error("invalid numeric value {value:?} for {field} at byte {offset}")]
    InvalidNumber {
        /// offset of the field start
        offset: u64,
        /// field name
        field: &'static str,
        /// raw field text
        value: String,
    },
    /// A field held a value outside its code table
    #[error("invalid value {value:?} for {field} at byte {offset}")]
    InvalidValue {
        /// offset of the field start
        offset: u64,
        /// field name
        field: &'static str,
        /// raw field text
        value: String,
    },
    /// A text field held bytes that are not valid for it
    #[error("invalid text bytes in {field} at byte {offset}")]
    InvalidText {
        /// offset of the field start
        offset: u64,
        /// field name
        field: &'static str,
    },
    /// Structurally valid content that this codec does not handle
    #[error("unsupported content at byte {offset}: {reason}")]
    Unsupported {
        /// offset where the content starts
        offset: u64,
        /// description
        reason: String,
    },
    /// The underlying source failed
    #[error("i/o error at byte {offset}")]
    Io {
        /// offset of the failed read
        offset: u64,
        /// underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Byte offset in the source stream where the error was detected
    #[must_use]
    pub const fn offset(&self) -> u64 {
        match self {
            Self::UnexpectedEof { offset, .. }
            | Self::MarkerMismatch { offset, .. }
            | Self::InvalidNumber { offset, .. }
            | Self::InvalidValue { offset, .. }
            | Self::InvalidText { offset, .. }
            | Self::Unsupported { offset, .. }
            | Self::Io { offset, .. } => *offset,
        }
    }
}
