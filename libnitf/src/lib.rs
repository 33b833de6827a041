//! # libnitf
//!
//! A reader and writer for the NITF family of imagery container files: NITF 02.00
//! (MIL-STD-2500A), NITF 02.10 (MIL-STD-2500C) and NSIF 01.00 (STANAG 4545).
//!
//! A file is a fixed-layout header followed by segments of several kinds (images, graphics,
//! text, data extensions, ...), each with its own subheader and payload. Headers and
//! subheaders may carry tagged record extensions (TREs): small typed records whose layout is
//! described by a registry of descriptors. TREs without a descriptor, or whose payload does
//! not fit theirs, are kept as opaque bytes so that a parsed file is written back unchanged.
//!
//! This crate is still very much a work-in-progress. Compressed image data is carried
//! through untouched but not decoded.
//!
//! ## Usage
//!
//! #### Reading a file
//!
//! ```no_run
//! use libnitf::{Document, tre::TreSource};
//!
//! fn main() -> Result<(), libnitf::Error> {
//!     let doc = Document::from_file("scene.ntf")?;
//!     println!("{}", doc.header());
//!     for image in doc.images() {
//!         for tre in image.tres.from_source(TreSource::ImageExtendedSubheaderData) {
//!             println!("{tre}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! #### Building a file
//!
//! Length fields are never set by hand: [`Document::write_to`] computes every length before the
//! first byte is written.
//!
//! ```
//! use libnitf::{Dialect, Document, segment::text::TextSegment};
//!
//! fn main() -> Result<(), libnitf::Error> {
//!     let mut doc = Document::new(Dialect::Nitf21);
//!     let mut text = TextSegment::builder().identifier("NOTE1").build();
//!     text.set_text("hello")?;
//!     doc.add_text(text)?;
//!
//!     let mut bytes = Vec::new();
//!     doc.write_to(&mut bytes)?;
//!
//!     let parsed = Document::from_reader(bytes.as_slice())?;
//!     assert_eq!(parsed.texts()[0].text().as_deref(), Some("hello"));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links
)]

/// Dialects and their field-width tables
pub mod dialect;
/// Document model, parsing and writing
pub mod document;
mod error;
/// Segment subheaders of every kind
pub mod segment;
/// Tagged record extensions
pub mod tre;

pub mod datetime;
pub mod header;
pub mod raster;
pub mod security;
mod serde;

pub use dialect::{Dialect, SegmentKind};
pub use document::{Document, ParseOptions, ParseStrategy, WritePlan};
pub use error::Error;
pub use header::Header;
pub use raster::Raster;
pub use security::SecurityMetadata;
pub use serde::error::Error as ParseError;
