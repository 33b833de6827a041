//! In-memory document: one file header plus the segments of every kind, in file order

mod layout;

use std::{
    collections::HashMap,
    ffi::OsString,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
};

use bon::Builder;
use tracing::{debug, info, instrument, warn};

pub use layout::WritePlan;

use crate::{
    dialect::{Dialect, SegmentKind},
    header::{Header, SegmentLength},
    segment::{
        des::DataExtensionSegment, graphic::GraphicSegment, image::ImageSegment,
        label::LabelSegment, reserved::ReservedExtensionSegment, symbol::SymbolSegment,
        text::TextSegment, ReadContext, Segment, SegmentData,
    },
    serde::{error::Error as ParseError, FieldReader},
    Error,
};

/// How much of a file is read up front
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Headers, subheaders and all segment data
    #[default]
    Full,
    /// Headers and subheaders only. Segment data is left as [`SegmentData::Deferred`] and can
    /// be fetched later with [`Document::read_segment_data`].
    HeadersOnly,
}

/// Parsing configuration
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    #[builder(default)]
    pub strategy: ParseStrategy,
    /// Decode TREs with a registered descriptor; with `false` every TRE stays opaque
    #[builder(default = true)]
    pub decode_tres: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A NITF / NSIF document
///
/// Equality covers content only, not the [`ParseOptions`] a document was read with.
#[derive(Debug, Clone)]
pub struct Document {
    options: ParseOptions,
    header: Header,
    images: Vec<ImageSegment>,
    graphics: Vec<GraphicSegment>,
    symbols: Vec<SymbolSegment>,
    labels: Vec<LabelSegment>,
    texts: Vec<TextSegment>,
    data_extensions: Vec<DataExtensionSegment>,
    reserved_extensions: Vec<ReservedExtensionSegment>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.images == other.images
            && self.graphics == other.graphics
            && self.symbols == other.symbols
            && self.labels == other.labels
            && self.texts == other.texts
            && self.data_extensions == other.data_extensions
            && self.reserved_extensions == other.reserved_extensions
    }
}

impl Eq for Document {}

impl Default for Document {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl Document {
    /// An empty document in `dialect`
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self::with_header(Header::new(dialect))
    }

    /// An empty document with a prepared header
    #[must_use]
    pub fn with_header(header: Header) -> Self {
        Self {
            options: ParseOptions::default(),
            header,
            images: Vec::new(),
            graphics: Vec::new(),
            symbols: Vec::new(),
            labels: Vec::new(),
            texts: Vec::new(),
            data_extensions: Vec::new(),
            reserved_extensions: Vec::new(),
        }
    }

    /// Parses a complete document
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ParseError`] on malformed or truncated input
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Self::from_reader_with(reader, &ParseOptions::default())
    }

    /// Parses a document with explicit [`ParseOptions`]
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ParseError`] on malformed or truncated input
    #[instrument(skip(reader))]
    pub fn from_reader_with<R: Read>(reader: R, options: &ParseOptions) -> Result<Self, Error> {
        let mut r = FieldReader::new(reader);
        let header = Header::read(&mut r, options.decode_tres)?;
        let dialect = header.dialect;
        debug!("header: {} bytes, file: {} bytes", header.header_length(), header.file_length());

        let slots: Vec<(SegmentKind, Vec<SegmentLength>)> = dialect
            .layout()
            .header_slots
            .iter()
            .flatten()
            .map(|kind| (*kind, header.segment_lengths(*kind).to_vec()))
            .collect();
        let total: usize = slots.iter().map(|(_, lengths)| lengths.len()).sum();
        let mut reader = SegmentReader {
            r: &mut r,
            dialect,
            options,
            streaming: header.is_streaming(),
            remaining: total,
        };

        let mut doc = Self::with_header(header);
        doc.options = *options;
        for (kind, lengths) in slots {
            for length in lengths {
                match kind {
                    SegmentKind::Image => doc.images.push(reader.read(length)?),
                    SegmentKind::Graphic => doc.graphics.push(reader.read(length)?),
                    SegmentKind::Symbol => doc.symbols.push(reader.read(length)?),
                    SegmentKind::Label => doc.labels.push(reader.read(length)?),
                    SegmentKind::Text => doc.texts.push(reader.read(length)?),
                    SegmentKind::DataExtension => doc.data_extensions.push(reader.read(length)?),
                    SegmentKind::ReservedExtension => {
                        doc.reserved_extensions.push(reader.read(length)?);
                    }
                }
            }
        }

        if !doc.header.is_streaming()
            && options.strategy == ParseStrategy::Full
            && r.offset() != doc.header.file_length()
        {
            warn!(
                "FL announces {} bytes but segments end at byte {}",
                doc.header.file_length(),
                r.offset()
            );
        }
        Ok(doc)
    }

    /// Parses the file at `path`
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is malformed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_file_with(path, &ParseOptions::default())
    }

    /// Parses the file at `path` with explicit [`ParseOptions`]
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is malformed
    pub fn from_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        Self::from_reader_with(BufReader::new(file), options)
    }

    /// Computes every length field, then writes the document
    ///
    /// Nothing is written if the document cannot be assembled. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// - [`Error::Build`] or [`Error::FormatConstraint`] if the document cannot be assembled
    /// - [`Error::Io`] if the output fails
    pub fn write_to<W: Write>(&self, writer: W) -> Result<u64, Error> {
        self.plan()?.emit(writer)
    }

    /// Writes the document to `path`
    ///
    /// The bytes go to a sibling `.partial` file that replaces `path` only once it is
    /// complete, so an interrupted write never leaves a truncated file under `path`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_to`]
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let plan = self.plan()?;
        let partial = partial_path(path);
        let written = File::create(&partial)
            .map_err(Error::from)
            .and_then(|file| {
                let mut out = BufWriter::new(file);
                let written = plan.emit(&mut out)?;
                out.into_inner()
                    .map_err(|e| Error::Io(e.into_error()))?
                    .sync_all()?;
                Ok(written)
            })
            .and_then(|written| {
                fs::rename(&partial, path)?;
                Ok(written)
            });
        match written {
            Ok(written) => {
                info!("wrote {written} bytes to {}", path.display());
                Ok(())
            }
            Err(e) => {
                // the partial file may not exist if creation failed
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    /// Lengths, serialized headers and emission order of the document
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Build`] or [`Error::FormatConstraint`] if the document cannot be
    /// assembled
    pub fn plan(&self) -> Result<WritePlan<'_>, Error> {
        WritePlan::compute(self)
    }

    /// Recomputes the length fields held by the header from the current content
    ///
    /// # Errors
    ///
    /// Same as [`Self::plan`]
    pub fn update_lengths(&mut self) -> Result<(), Error> {
        let (file_length, header_length, segment_lengths) = {
            let plan = self.plan()?;
            (
                plan.file_length(),
                plan.header_length(),
                plan.segment_lengths().clone(),
            )
        };
        self.header
            .set_lengths(file_length, header_length, segment_lengths);
        Ok(())
    }

    /// Data of segment `index` of `kind`, read from `source` if it was deferred
    ///
    /// `source` must be the stream the document was parsed from.
    ///
    /// # Errors
    ///
    /// - [`Error::Build`] if there is no such segment
    /// - [`Error::ParseError`] if the source ends before the data does
    pub fn read_segment_data<R: Read + Seek>(
        &self,
        source: R,
        kind: SegmentKind,
        index: usize,
    ) -> Result<Vec<u8>, Error> {
        let data = self
            .segment_data(kind, index)
            .ok_or_else(|| Error::Build(format!("no {kind} segment at index {index}")))?;
        match data {
            SegmentData::Loaded(bytes) => Ok(bytes.clone()),
            SegmentData::Deferred { offset, length } => {
                let mut r = FieldReader::new(source);
                r.seek_to(*offset)?;
                let length = usize::try_from(*length).map_err(|_| ParseError::Unsupported {
                    offset: *offset,
                    reason: format!("{length} bytes of segment data"),
                })?;
                Ok(r.read_bytes(length, "segment data")?)
            }
        }
    }

    /// Reads every deferred segment payload from `source`
    ///
    /// Payloads are interpreted with the [`ParseOptions`] the document was parsed with, so
    /// overflow DES TREs stay opaque after a parse with `decode_tres(false)`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_segment_data`]
    pub fn load_deferred_data<R: Read + Seek>(&mut self, mut source: R) -> Result<(), Error> {
        let ctx = ReadContext {
            dialect: self.dialect(),
            decode_tres: self.options.decode_tres,
            subheader_length: 0,
        };
        let deferred = self.deferred_locations();
        for (kind, index, offset) in deferred {
            let bytes = self.read_segment_data(&mut source, kind, index)?;
            match kind {
                SegmentKind::Image => self.images[index].load_data(bytes, offset, &ctx),
                SegmentKind::Graphic => self.graphics[index].load_data(bytes, offset, &ctx),
                SegmentKind::Symbol => self.symbols[index].load_data(bytes, offset, &ctx),
                SegmentKind::Label => self.labels[index].load_data(bytes, offset, &ctx),
                SegmentKind::Text => self.texts[index].load_data(bytes, offset, &ctx),
                SegmentKind::DataExtension => {
                    self.data_extensions[index].load_data(bytes, offset, &ctx)
                }
                SegmentKind::ReservedExtension => {
                    self.reserved_extensions[index].load_data(bytes, offset, &ctx)
                }
            }?;
        }
        Ok(())
    }

    fn deferred_locations(&self) -> Vec<(SegmentKind, usize, u64)> {
        fn collect<S: Segment>(segments: &[S], out: &mut Vec<(SegmentKind, usize, u64)>) {
            for (index, segment) in segments.iter().enumerate() {
                if let SegmentData::Deferred { offset, .. } = Segment::data(segment) {
                    out.push((S::KIND, index, *offset));
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.images, &mut out);
        collect(&self.graphics, &mut out);
        collect(&self.symbols, &mut out);
        collect(&self.labels, &mut out);
        collect(&self.texts, &mut out);
        collect(&self.data_extensions, &mut out);
        collect(&self.reserved_extensions, &mut out);
        out
    }

    fn segment_data(&self, kind: SegmentKind, index: usize) -> Option<&SegmentData> {
        match kind {
            SegmentKind::Image => self.images.get(index).map(Segment::data),
            SegmentKind::Graphic => self.graphics.get(index).map(Segment::data),
            SegmentKind::Symbol => self.symbols.get(index).map(Segment::data),
            SegmentKind::Label => self.labels.get(index).map(Segment::data),
            SegmentKind::Text => self.texts.get(index).map(Segment::data),
            SegmentKind::DataExtension => self.data_extensions.get(index).map(Segment::data),
            SegmentKind::ReservedExtension => {
                self.reserved_extensions.get(index).map(Segment::data)
            }
        }
    }

    fn check_supported(&self, kind: SegmentKind) -> Result<(), Error> {
        let dialect = self.dialect();
        if dialect.supports(kind) {
            Ok(())
        } else {
            Err(Error::FormatConstraint {
                field: kind.marker().to_owned(),
                reason: format!("{dialect} documents cannot hold {kind} segments"),
            })
        }
    }

    /// Options the document was parsed with; the defaults for a built document
    #[must_use]
    pub const fn parse_options(&self) -> &ParseOptions {
        &self.options
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.header.dialect
    }

    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Number of segments of `kind`
    #[must_use]
    pub fn segment_count(&self, kind: SegmentKind) -> usize {
        match kind {
            SegmentKind::Image => self.images.len(),
            SegmentKind::Graphic => self.graphics.len(),
            SegmentKind::Symbol => self.symbols.len(),
            SegmentKind::Label => self.labels.len(),
            SegmentKind::Text => self.texts.len(),
            SegmentKind::DataExtension => self.data_extensions.len(),
            SegmentKind::ReservedExtension => self.reserved_extensions.len(),
        }
    }

    /// Appends an image segment and returns its index
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other `add_*` methods
    pub fn add_image(&mut self, segment: ImageSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::Image)?;
        self.images.push(segment);
        Ok(self.images.len() - 1)
    }

    /// Appends a graphic segment and returns its index
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FormatConstraint`] in a legacy document
    pub fn add_graphic(&mut self, segment: GraphicSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::Graphic)?;
        self.graphics.push(segment);
        Ok(self.graphics.len() - 1)
    }

    /// Appends a symbol segment and returns its index
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FormatConstraint`] unless the document is legacy
    pub fn add_symbol(&mut self, segment: SymbolSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::Symbol)?;
        self.symbols.push(segment);
        Ok(self.symbols.len() - 1)
    }

    /// Appends a label segment and returns its index
    ///
    /// # Errors
    ///
    /// Fails with [`Error::FormatConstraint`] unless the document is legacy
    pub fn add_label(&mut self, segment: LabelSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::Label)?;
        self.labels.push(segment);
        Ok(self.labels.len() - 1)
    }

    /// Appends a text segment and returns its index
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other `add_*` methods
    pub fn add_text(&mut self, segment: TextSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::Text)?;
        self.texts.push(segment);
        Ok(self.texts.len() - 1)
    }

    /// Appends a data extension segment and returns its index
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other `add_*` methods
    pub fn add_data_extension(&mut self, segment: DataExtensionSegment) -> Result<usize, Error> {
        self.check_supported(SegmentKind::DataExtension)?;
        self.data_extensions.push(segment);
        Ok(self.data_extensions.len() - 1)
    }

    /// Appends a reserved extension segment and returns its index
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other `add_*` methods
    pub fn add_reserved_extension(
        &mut self,
        segment: ReservedExtensionSegment,
    ) -> Result<usize, Error> {
        self.check_supported(SegmentKind::ReservedExtension)?;
        self.reserved_extensions.push(segment);
        Ok(self.reserved_extensions.len() - 1)
    }

    #[must_use]
    pub fn images(&self) -> &[ImageSegment] {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut [ImageSegment] {
        &mut self.images
    }

    #[must_use]
    pub fn graphics(&self) -> &[GraphicSegment] {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut [GraphicSegment] {
        &mut self.graphics
    }

    #[must_use]
    pub fn symbols(&self) -> &[SymbolSegment] {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut [SymbolSegment] {
        &mut self.symbols
    }

    #[must_use]
    pub fn labels(&self) -> &[LabelSegment] {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut [LabelSegment] {
        &mut self.labels
    }

    #[must_use]
    pub fn texts(&self) -> &[TextSegment] {
        &self.texts
    }

    pub fn texts_mut(&mut self) -> &mut [TextSegment] {
        &mut self.texts
    }

    #[must_use]
    pub fn data_extensions(&self) -> &[DataExtensionSegment] {
        &self.data_extensions
    }

    pub fn data_extensions_mut(&mut self) -> &mut [DataExtensionSegment] {
        &mut self.data_extensions
    }

    #[must_use]
    pub fn reserved_extensions(&self) -> &[ReservedExtensionSegment] {
        &self.reserved_extensions
    }

    /// Segment counts per kind, for the kinds present in the document
    #[must_use]
    pub fn segment_counts(&self) -> HashMap<SegmentKind, usize> {
        self.dialect()
            .layout()
            .header_slots
            .iter()
            .flatten()
            .map(|kind| (*kind, self.segment_count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Sequential segment reader used while parsing
struct SegmentReader<'a, R> {
    r: &'a mut FieldReader<R>,
    dialect: Dialect,
    options: &'a ParseOptions,
    streaming: bool,
    remaining: usize,
}

impl<R: Read> SegmentReader<'_, R> {
    fn read<S: Segment>(&mut self, length: SegmentLength) -> Result<S, ParseError> {
        self.remaining -= 1;
        let ctx = ReadContext {
            dialect: self.dialect,
            decode_tres: self.options.decode_tres,
            subheader_length: length.subheader,
        };
        let start = self.r.offset();
        let mut segment = S::read_subheader(self.r, &ctx)?;
        let consumed = self.r.offset() - start;
        if consumed != length.subheader {
            return Err(ParseError::InvalidValue {
                offset: start,
                field: "subheader length",
                value: format!(
                    "{} announced for {}, {consumed} read",
                    length.subheader,
                    S::KIND
                ),
            });
        }

        let offset = self.r.offset();
        let (_, data_width) = S::KIND.length_field_widths();
        let unknown_length = 10u64.pow(data_width as u32) - 1;
        if self.streaming && length.data == unknown_length {
            if self.remaining > 0 {
                return Err(ParseError::Unsupported {
                    offset,
                    reason: format!(
                        "streamed {} segment of unknown length is not the last segment",
                        S::KIND
                    ),
                });
            }
            debug!("reading streamed {} data to the end of the input", S::KIND);
            let bytes = self.r.read_to_end()?;
            segment.load_data(bytes, offset, &ctx)?;
            return Ok(segment);
        }

        match self.options.strategy {
            ParseStrategy::Full => {
                let len = usize::try_from(length.data).map_err(|_| ParseError::Unsupported {
                    offset,
                    reason: format!("{} bytes of {} data", length.data, S::KIND),
                })?;
                let bytes = self.r.read_bytes(len, "segment data")?;
                segment.load_data(bytes, offset, &ctx)?;
            }
            ParseStrategy::HeadersOnly => {
                self.r.skip(length.data, "segment data")?;
                segment.set_data(SegmentData::Deferred {
                    offset,
                    length: length.data,
                });
            }
        }
        Ok(segment)
    }
}
