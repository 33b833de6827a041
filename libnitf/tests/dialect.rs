mod common;
use common::{sample_document, sample_text};
use libnitf::{
    segment::{graphic::GraphicSegment, label::LabelSegment, symbol::SymbolSegment},
    Dialect, Document, Error, ParseError, SecurityMetadata,
};

fn written(doc: &Document) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;
    Ok(bytes)
}

#[test]
fn markers_select_the_dialect() -> anyhow::Result<()> {
    for (dialect, marker) in [
        (Dialect::Nitf20, b"NITF02.00"),
        (Dialect::Nitf21, b"NITF02.10"),
        (Dialect::Nsif10, b"NSIF01.00"),
    ] {
        let bytes = written(&sample_document(dialect))?;
        assert_eq!(&bytes[..9], marker);
        assert_eq!(Document::from_reader(bytes.as_slice())?.dialect(), dialect);
    }
    Ok(())
}

#[test]
fn unknown_marker_is_fatal_at_offset_zero() -> anyhow::Result<()> {
    let mut bytes = written(&Document::new(Dialect::Nitf21))?;
    bytes[..9].copy_from_slice(b"NITF03.00");
    match Document::from_reader(bytes.as_slice()) {
        Err(Error::ParseError(err @ ParseError::MarkerMismatch { .. })) => {
            assert_eq!(err.offset(), 0);
        }
        other => panic!("expected a marker mismatch, got {other:?}"),
    }
    Ok(())
}

#[test]
fn originator_name_moves_with_background_colour() -> anyhow::Result<()> {
    for (dialect, offset) in [
        (Dialect::Nitf20, 297),
        (Dialect::Nitf21, 300),
        (Dialect::Nsif10, 300),
    ] {
        let mut doc = Document::new(dialect);
        doc.header_mut().originator_name = "ORIGINATOR".to_owned();
        let bytes = written(&doc)?;
        assert_eq!(&bytes[offset..offset + 10], b"ORIGINATOR", "{dialect}");
    }
    Ok(())
}

#[test]
fn segment_kinds_follow_the_dialect() {
    let mut legacy = Document::new(Dialect::Nitf20);
    assert!(matches!(
        legacy.add_graphic(GraphicSegment::builder().build()),
        Err(Error::FormatConstraint { .. })
    ));
    assert!(legacy
        .add_symbol(
            SymbolSegment::builder()
                .security(SecurityMetadata::unclassified(Dialect::Nitf20))
                .build()
        )
        .is_ok());

    let mut current = Document::new(Dialect::Nsif10);
    assert!(matches!(
        current.add_label(
            LabelSegment::builder()
                .security(SecurityMetadata::unclassified(Dialect::Nsif10))
                .build()
        ),
        Err(Error::FormatConstraint { .. })
    ));
    assert!(current.add_graphic(GraphicSegment::builder().build()).is_ok());
}

#[test]
fn legacy_documents_keep_their_segments() -> anyhow::Result<()> {
    let doc = sample_document(Dialect::Nitf20);
    let parsed = Document::from_reader(written(&doc)?.as_slice())?;
    assert_eq!(parsed.symbols().len(), 1);
    assert_eq!(parsed.symbols()[0].identifier, "SYM1");
    assert_eq!(parsed.labels().len(), 1);
    assert_eq!(parsed.labels()[0].data.bytes(), Some(&b"a label"[..]));
    assert!(parsed.graphics().is_empty());
    Ok(())
}

#[test]
fn fields_missing_from_a_dialect_are_refused() {
    let mut doc = Document::new(Dialect::Nitf20);
    doc.header_mut().background_color = [10, 20, 30];
    assert!(matches!(
        written(&doc).map_err(|e| e.downcast::<Error>()),
        Err(Ok(Error::FormatConstraint { .. }))
    ));

    let mut doc = Document::new(Dialect::Nitf20);
    let mut text = sample_text(Dialect::Nitf20);
    text.attachment_level = 2;
    doc.add_text(text).expect("texts are always allowed");
    assert!(matches!(
        doc.write_to(Vec::new()),
        Err(Error::FormatConstraint { .. })
    ));
}

#[test]
fn security_schema_must_match_the_dialect() {
    let mut doc = Document::new(Dialect::Nitf21);
    doc.add_text(sample_text(Dialect::Nitf20))
        .expect("texts are always allowed");
    assert!(matches!(doc.write_to(Vec::new()), Err(Error::Build(_))));

    let mut doc = Document::new(Dialect::Nitf21);
    doc.header_mut().security = Some(SecurityMetadata::unclassified(Dialect::Nitf20));
    assert!(matches!(doc.plan(), Err(Error::Build(_))));
}
