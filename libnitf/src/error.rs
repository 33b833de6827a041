use crate::serde;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libnitf` errors
pub enum Error {
    /// Error returned if the byte stream is malformed, truncated, or carries an unexpected
    /// marker. Always fatal for the segment and file being parsed.
    #[error("parse error: {0}")]
    ParseError(#[from] serde::error::Error),
    /// Error returned if a value lies outside the legal range of its field
    #[error("format constraint violated by {field}: {reason}")]
    FormatConstraint {
        /// field (or TRE entry) name
        field: String,
        /// description of the violation
        reason: String,
    },
    /// Error returned if the document cannot be assembled for writing. Raised before any
    /// byte is emitted.
    #[error("cannot build document: {0}")]
    Build(String),
    /// Error returned if pixel data uses a compression or layout that cannot be decoded
    #[error("unsupported image data: {0}")]
    UnsupportedImage(String),
    /// Error returned by the underlying output stream
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}
