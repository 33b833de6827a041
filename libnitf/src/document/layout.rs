//! Two-pass write: every length is computed and every header serialized before the first byte
//! reaches the output

use std::{borrow::Cow, collections::HashMap, io::Write};

use tracing::{debug, info};

use super::Document;
use crate::{
    dialect::{Dialect, SegmentKind},
    header::SegmentLength,
    segment::{des::DataExtensionSegment, Segment},
    serde::FieldWriter,
    tre::TreSource,
    Error,
};

struct PlannedSegment<'a> {
    kind: SegmentKind,
    subheader: Vec<u8>,
    data: Cow<'a, [u8]>,
}

/// Everything needed to emit a document, computed up front
///
/// Holds the serialized file header and segment subheaders, borrowing the segment data from
/// the document.
pub struct WritePlan<'a> {
    header: Vec<u8>,
    file_length: u64,
    header_length: u64,
    segment_lengths: HashMap<SegmentKind, Vec<SegmentLength>>,
    segments: Vec<PlannedSegment<'a>>,
}

impl<'a> WritePlan<'a> {
    pub(crate) fn compute(doc: &'a Document) -> Result<Self, Error> {
        let dialect = doc.dialect();
        doc.header.validate()?;

        let data_extensions: Vec<&DataExtensionSegment> = doc
            .data_extensions
            .iter()
            .filter(|des| {
                let streaming = des.is_streaming_file_header();
                if streaming {
                    debug!("dropping {} DES", des.identifier);
                }
                !streaming
            })
            .collect();
        check_overflow_pointers(doc, &data_extensions)?;

        let mut plan = Planner {
            dialect,
            segments: Vec::new(),
            lengths: HashMap::new(),
        };
        plan.add(&doc.images)?;
        plan.add(&doc.graphics)?;
        plan.add(&doc.symbols)?;
        plan.add(&doc.labels)?;
        plan.add(&doc.texts)?;
        plan.add(data_extensions)?;
        plan.add(&doc.reserved_extensions)?;
        let Planner {
            segments, lengths, ..
        } = plan;

        let counts = lengths
            .iter()
            .map(|(kind, lengths)| (*kind, lengths.len()))
            .collect();
        let header_length = doc.header.encoded_len(&counts)?;
        let file_length = header_length
            + segments
                .iter()
                .map(|s| (s.subheader.len() + s.data.len()) as u64)
                .sum::<u64>();

        let mut w = FieldWriter::new(Vec::with_capacity(header_length as usize));
        doc.header
            .write(&mut w, file_length, header_length, &lengths)?;
        let header = w.into_inner();
        if header.len() as u64 != header_length {
            return Err(Error::Build(format!(
                "file header serialized to {} bytes, {header_length} expected",
                header.len()
            )));
        }

        debug!(
            "planned {} segments, HL {header_length}, FL {file_length}",
            segments.len()
        );
        Ok(Self {
            header,
            file_length,
            header_length,
            segment_lengths: lengths,
            segments,
        })
    }

    /// `FL` of the planned file
    #[must_use]
    pub const fn file_length(&self) -> u64 {
        self.file_length
    }

    /// `HL` of the planned file
    #[must_use]
    pub const fn header_length(&self) -> u64 {
        self.header_length
    }

    /// Length table entries per segment kind
    #[must_use]
    pub const fn segment_lengths(&self) -> &HashMap<SegmentKind, Vec<SegmentLength>> {
        &self.segment_lengths
    }

    /// Writes the planned bytes and returns their count
    ///
    /// # Errors
    ///
    /// Fails only if `writer` does
    pub fn emit<W: Write>(&self, writer: W) -> Result<u64, Error> {
        let mut w = FieldWriter::new(writer);
        w.write_bytes(&self.header)?;
        for segment in &self.segments {
            debug!(
                "{} segment at byte {}: {} + {} bytes",
                segment.kind,
                w.written(),
                segment.subheader.len(),
                segment.data.len()
            );
            w.write_bytes(&segment.subheader)?;
            w.write_bytes(&segment.data)?;
        }
        w.flush()?;
        info!("wrote {} bytes", w.written());
        Ok(w.written())
    }
}

struct Planner<'a> {
    dialect: Dialect,
    segments: Vec<PlannedSegment<'a>>,
    lengths: HashMap<SegmentKind, Vec<SegmentLength>>,
}

impl<'a> Planner<'a> {
    fn add<S: Segment + 'a>(
        &mut self,
        segments: impl IntoIterator<Item = &'a S>,
    ) -> Result<(), Error> {
        let mut segments = segments.into_iter().peekable();
        if segments.peek().is_none() {
            return Ok(());
        }
        if !self.dialect.supports(S::KIND) {
            return Err(Error::Build(format!(
                "{} documents cannot hold {} segments",
                self.dialect,
                S::KIND
            )));
        }
        let lengths = self.lengths.entry(S::KIND).or_default();
        for segment in segments {
            let subheader = segment.encode_subheader(self.dialect)?;
            let data = segment.encoded_data()?;
            lengths.push(SegmentLength {
                subheader: subheader.len() as u64,
                data: data.len() as u64,
            });
            self.segments.push(PlannedSegment {
                kind: S::KIND,
                subheader,
                data,
            });
        }
        Ok(())
    }
}

/// A nonzero overflow indicator must name an overflow DES for the same extension block
fn check_overflow_pointers(
    doc: &Document,
    data_extensions: &[&DataExtensionSegment],
) -> Result<(), Error> {
    let dialect = doc.dialect();
    let mut pointers: Vec<(TreSource, u16)> = doc.header.overflow_pointers().to_vec();
    pointers.extend(doc.images.iter().flat_map(Segment::overflow_pointers));
    pointers.extend(doc.graphics.iter().flat_map(Segment::overflow_pointers));
    pointers.extend(doc.symbols.iter().flat_map(Segment::overflow_pointers));
    pointers.extend(doc.labels.iter().flat_map(Segment::overflow_pointers));
    pointers.extend(doc.texts.iter().flat_map(Segment::overflow_pointers));

    for (source, pointer) in pointers.into_iter().filter(|(_, p)| *p != 0) {
        let target = data_extensions
            .get(usize::from(pointer) - 1)
            .ok_or_else(|| {
                Error::Build(format!(
                    "{source:?} overflows into DES {pointer}, but only {} are written",
                    data_extensions.len()
                ))
            })?;
        match &target.overflow {
            Some(overflow) if overflow.source == source && target.is_tre_overflow(dialect) => {}
            _ => {
                return Err(Error::Build(format!(
                    "{source:?} overflows into DES {pointer} ({:?}), which does not hold its TREs",
                    target.identifier
                )))
            }
        }
    }
    Ok(())
}
