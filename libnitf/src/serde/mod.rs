//! Primitive field codec shared by every header and segment codec

pub(crate) mod bits;
pub mod error;
pub(crate) mod reader;
pub(crate) mod utils;
pub(crate) mod writer;

pub(crate) use bits::BitReader;
pub(crate) use reader::FieldReader;
pub(crate) use writer::FieldWriter;
