#![allow(dead_code)]

use std::path::Path;

use libnitf::{
    segment::{
        des::DataExtensionSegment,
        image::{ImageBand, ImageSegment},
        label::LabelSegment,
        symbol::SymbolSegment,
        text::TextSegment,
        SegmentData,
    },
    tre::{decode_tre, Tre, TreSource},
    Dialect, Document, SecurityMetadata,
};
use mktemp::Temp;

pub const CCLSTA_PAYLOAD: &[u8] =
    b"014ISO3166-1:2013040ISO 3166 Maintenance Agency (ISO3166/MA)A525D54C-1858-4BC0-A5F2-57BB92F947E7000";

pub const TEXT_TITLE: &str = "Some Title";
pub const TEXT_BODY: &str = "This is the body.\r\nIt has two lines.";

/// Offset of `FL` in the file header, identical in every dialect
pub const FL_OFFSET: usize = 342;

/// A 4x3 single band image with one decoded and one unknown TRE
pub fn sample_image(dialect: Dialect) -> ImageSegment {
    let mut image = ImageSegment::builder()
        .identifier("SAMPLE")
        .title("sample image")
        .security(SecurityMetadata::unclassified(dialect))
        .rows(3)
        .columns(4)
        .actual_bits_per_pixel(8)
        .bits_per_pixel(8)
        .pixels_per_block_horizontal(4)
        .pixels_per_block_vertical(3)
        .bands(vec![ImageBand::builder().representation("M").build()])
        .data(SegmentData::Loaded((0..12).collect()))
        .build();
    image.tres.add(decode_tre(
        "CCLSTA",
        TreSource::ImageExtendedSubheaderData,
        CCLSTA_PAYLOAD,
    ));
    image.tres.add(Tre::opaque(
        "XYZABC",
        TreSource::UserDefinedImageData,
        b"vendor bytes".to_vec(),
    ));
    image
}

pub fn sample_text(dialect: Dialect) -> TextSegment {
    let mut text = TextSegment::builder()
        .identifier("TXT1")
        .title(TEXT_TITLE)
        .security(SecurityMetadata::unclassified(dialect))
        .build();
    text.set_text(TEXT_BODY).expect("body is latin-1");
    text
}

/// One segment of every kind the dialect supports, plus header TREs
pub fn sample_document(dialect: Dialect) -> Document {
    let mut doc = Document::new(dialect);
    doc.header_mut().title = format!("{dialect} sample");
    doc.header_mut().originator_name = "libnitf".to_owned();
    doc.header_mut().tres.add(Tre::opaque(
        "ZZZZZZ",
        TreSource::UserDefinedHeaderData,
        b"header bytes".to_vec(),
    ));

    doc.add_image(sample_image(dialect)).expect("images are always allowed");
    if dialect.is_legacy() {
        doc.add_symbol(
            SymbolSegment::builder()
                .identifier("SYM1")
                .security(SecurityMetadata::unclassified(dialect))
                .data(SegmentData::Loaded(b"symbol".to_vec()))
                .build(),
        )
        .expect("legacy documents hold symbols");
        let mut label = LabelSegment::builder()
            .identifier("LBL1")
            .security(SecurityMetadata::unclassified(dialect))
            .build();
        label.data = SegmentData::Loaded(b"a label".to_vec());
        doc.add_label(label).expect("legacy documents hold labels");
    } else {
        doc.add_graphic(
            libnitf::segment::graphic::GraphicSegment::builder()
                .identifier("GRA1")
                .data(SegmentData::Loaded(b"cgm bytes".to_vec()))
                .build(),
        )
        .expect("current documents hold graphics");
    }
    doc.add_text(sample_text(dialect)).expect("texts are always allowed");
    doc.add_data_extension(
        DataExtensionSegment::builder()
            .identifier("USER_DATA")
            .security(SecurityMetadata::unclassified(dialect))
            .data(SegmentData::Loaded(b"user payload".to_vec()))
            .build(),
    )
    .expect("data extensions are always allowed");
    doc
}

/// Writes `doc` to a fresh temporary file
pub fn write_temp(doc: &Document) -> anyhow::Result<Temp> {
    let file = Temp::new_file()?;
    doc.to_file(&file)?;
    Ok(file)
}

pub fn digest(path: impl AsRef<Path>) -> anyhow::Result<String> {
    Ok(sha256::try_digest(path.as_ref())?)
}
