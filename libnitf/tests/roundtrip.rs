use std::fs;

mod common;
use common::{
    digest, sample_document, sample_image, sample_text, write_temp, CCLSTA_PAYLOAD, FL_OFFSET,
    TEXT_BODY, TEXT_TITLE,
};
use libnitf::{
    segment::{des::DataExtensionSegment, text::TextFormat, SegmentData},
    tre::{decode_tre, Tre, TreEntry, TreSource},
    Dialect, Document, Error, ParseError, ParseOptions, ParseStrategy, SegmentKind,
};

const DIALECTS: [Dialect; 3] = [Dialect::Nitf20, Dialect::Nitf21, Dialect::Nsif10];

#[test]
fn text_segment_survives_write_and_parse() -> anyhow::Result<()> {
    let mut doc = Document::new(Dialect::Nitf21);
    doc.add_text(sample_text(Dialect::Nitf21))?;
    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;

    let parsed = Document::from_reader(bytes.as_slice())?;
    assert_eq!(parsed.texts().len(), 1);
    let text = &parsed.texts()[0];
    assert_eq!(text.title, TEXT_TITLE);
    assert_eq!(text.text().as_deref(), Some(TEXT_BODY));
    assert_eq!(text.format, TextFormat::Standard);
    Ok(())
}

#[test]
fn written_files_are_stable_in_every_dialect() -> anyhow::Result<()> {
    for dialect in DIALECTS {
        let first = write_temp(&sample_document(dialect))?;
        let parsed = Document::from_file(&first)?;
        assert_eq!(parsed.dialect(), dialect);
        assert_eq!(parsed.images().len(), 1);
        assert_eq!(parsed.texts()[0].text().as_deref(), Some(TEXT_BODY));

        let second = write_temp(&parsed)?;
        assert_eq!(digest(&first)?, digest(&second)?, "{dialect}");
        assert_eq!(Document::from_file(&second)?, parsed, "{dialect}");
    }
    Ok(())
}

/// CCLSTA as a caller would build it, without the zero padding of the count fields
fn built_country_codes(source: TreSource) -> anyhow::Result<Tre> {
    let mut tre = Tre::new("CCLSTA", source);
    for (name, value) in [
        ("CC_STD_LEN", "14"),
        ("CC_STD", "ISO3166-1:2013"),
        ("CC_ORG_LEN", "40"),
        ("CC_ORG", "ISO 3166 Maintenance Agency (ISO3166/MA)"),
        ("CC_UUID", "A525D54C-1858-4BC0-A5F2-57BB92F947E7"),
        ("NUM_SUPPLEMENTAL_IDENTIFIERS", "0"),
    ] {
        tre.add_entry(TreEntry::field(name, value))?;
    }
    tre.add_entry(TreEntry::groups_of("SUPPLEMENTAL_IDENTIFIERS", Vec::new()))?;
    Ok(tre)
}

#[test]
fn documents_read_back_equal_to_what_was_built() -> anyhow::Result<()> {
    for dialect in DIALECTS {
        let mut doc = sample_document(dialect);
        doc.header_mut()
            .tres
            .add(built_country_codes(TreSource::ExtendedHeaderData)?);
        let mut bytes = Vec::new();
        doc.write_to(&mut bytes)?;

        let parsed = Document::from_reader(bytes.as_slice())?;
        let cclsta = parsed
            .header()
            .tres
            .with_tag("CCLSTA")
            .next()
            .expect("CCLSTA survives");
        assert_eq!(cclsta.field_value("CC_STD_LEN"), Some("014"));

        doc.update_lengths()?;
        assert_eq!(parsed.header(), doc.header(), "{dialect}");
        assert_eq!(parsed.images(), doc.images(), "{dialect}");
        assert_eq!(parsed, doc, "{dialect}");
    }
    Ok(())
}

#[test]
fn oversized_segment_length_is_a_parse_error() -> anyhow::Result<()> {
    let mut doc = Document::new(Dialect::Nitf21);
    doc.add_image(sample_image(Dialect::Nitf21))?;
    let plan = doc.plan()?;
    let data_start =
        plan.header_length() + plan.segment_lengths()[&SegmentKind::Image][0].subheader;
    let mut bytes = Vec::new();
    plan.emit(&mut bytes)?;

    // NUMI and LISH follow HL, then the 10-digit LI
    let li = FL_OFFSET + 12 + 6 + 3 + 6;
    assert_eq!(&bytes[li..li + 10], b"0000000012");
    bytes[li..li + 10].copy_from_slice(b"9999999999");
    match Document::from_reader(bytes.as_slice()) {
        Err(Error::ParseError(err @ ParseError::UnexpectedEof { .. })) => {
            assert_eq!(err.offset(), data_start);
        }
        other => panic!("expected a truncation error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn length_fields_describe_the_file() -> anyhow::Result<()> {
    for dialect in DIALECTS {
        let doc = sample_document(dialect);
        let plan = doc.plan()?;
        let file = write_temp(&doc)?;
        let bytes = fs::read(&file)?;
        assert_eq!(plan.file_length(), bytes.len() as u64);
        assert_eq!(
            &bytes[FL_OFFSET..FL_OFFSET + 12],
            format!("{:012}", bytes.len()).as_bytes()
        );

        let parsed = Document::from_reader(bytes.as_slice())?;
        let header = parsed.header();
        assert_eq!(header.file_length(), bytes.len() as u64);
        assert_eq!(header.header_length(), plan.header_length());
        let segments: u64 = [
            SegmentKind::Image,
            SegmentKind::Graphic,
            SegmentKind::Symbol,
            SegmentKind::Label,
            SegmentKind::Text,
            SegmentKind::DataExtension,
        ]
        .into_iter()
        .flat_map(|kind| header.segment_lengths(kind).iter())
        .map(|length| length.subheader + length.data)
        .sum();
        assert_eq!(header.header_length() + segments, header.file_length());
        assert_eq!(
            header.segment_lengths(SegmentKind::Image)[0].data,
            12,
            "{dialect}"
        );
    }
    Ok(())
}

#[test]
fn opaque_tres_are_written_back_unchanged() -> anyhow::Result<()> {
    let mut doc = sample_document(Dialect::Nitf21);
    // registered tag whose payload does not match its descriptor
    doc.header_mut().tres.add(Tre::opaque(
        "BLOCKA",
        TreSource::ExtendedHeaderData,
        b"too short".to_vec(),
    ));
    let original = write_temp(&doc)?;

    let decoded = Document::from_file(&original)?;
    let blocka = decoded.header().tres.with_tag("BLOCKA").next().expect("BLOCKA kept");
    assert!(blocka.is_opaque());
    assert_eq!(blocka.raw_payload(), Some(&b"too short"[..]));
    assert_eq!(digest(&original)?, digest(&write_temp(&decoded)?)?);

    let options = ParseOptions::builder().decode_tres(false).build();
    let raw = Document::from_file_with(&original, &options)?;
    assert!(raw.images()[0].tres.iter().all(Tre::is_opaque));
    assert_eq!(digest(&original)?, digest(&write_temp(&raw)?)?);
    Ok(())
}

#[test]
fn deferred_data_is_read_on_demand() -> anyhow::Result<()> {
    let doc = sample_document(Dialect::Nitf21);
    let file = write_temp(&doc)?;
    let options = ParseOptions::builder()
        .strategy(ParseStrategy::HeadersOnly)
        .build();
    let mut deferred = Document::from_file_with(&file, &options)?;
    assert!(matches!(
        deferred.images()[0].data,
        SegmentData::Deferred { length: 12, .. }
    ));
    assert_eq!(
        deferred.read_segment_data(fs::File::open(&file)?, SegmentKind::Image, 0)?,
        (0..12).collect::<Vec<u8>>()
    );
    assert!(matches!(
        deferred.write_to(Vec::new()),
        Err(Error::Build(_))
    ));

    deferred.load_deferred_data(fs::File::open(&file)?)?;
    assert_eq!(digest(&file)?, digest(&write_temp(&deferred)?)?);
    Ok(())
}

#[test]
fn deferred_overflow_tres_keep_the_parse_options() -> anyhow::Result<()> {
    let mut doc = sample_document(Dialect::Nitf21);
    let mut overflow =
        DataExtensionSegment::tre_overflow(Dialect::Nitf21, TreSource::ExtendedHeaderData, 0);
    overflow
        .tres
        .add(decode_tre("CCLSTA", TreSource::TreOverflow, CCLSTA_PAYLOAD));
    overflow.data = SegmentData::Loaded(Vec::new());
    let index = doc.add_data_extension(overflow)?;
    doc.header_mut().extended_overflow = u16::try_from(index + 1)?;
    let file = write_temp(&doc)?;

    for decode_tres in [false, true] {
        let options = ParseOptions::builder()
            .strategy(ParseStrategy::HeadersOnly)
            .decode_tres(decode_tres)
            .build();
        let mut deferred = Document::from_file_with(&file, &options)?;
        assert_eq!(deferred.parse_options().decode_tres, decode_tres);
        deferred.load_deferred_data(fs::File::open(&file)?)?;
        let tre = deferred.data_extensions()[index]
            .tres
            .iter()
            .next()
            .expect("overflow DES holds CCLSTA");
        assert_eq!(tre.is_opaque(), !decode_tres);
        assert_eq!(digest(&file)?, digest(&write_temp(&deferred)?)?);
    }
    Ok(())
}

#[test]
fn overflowing_tres_live_in_their_des() -> anyhow::Result<()> {
    let mut doc = sample_document(Dialect::Nitf21);
    let mut overflow =
        DataExtensionSegment::tre_overflow(Dialect::Nitf21, TreSource::ExtendedHeaderData, 0);
    overflow.tres.add(Tre::opaque(
        "OVFLOW",
        TreSource::TreOverflow,
        b"moved out".to_vec(),
    ));
    overflow.data = SegmentData::Loaded(Vec::new());
    let index = doc.add_data_extension(overflow)?;
    doc.header_mut().extended_overflow = u16::try_from(index + 1)?;

    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;
    let parsed = Document::from_reader(bytes.as_slice())?;
    assert_eq!(parsed.header().extended_overflow, 2);
    let des = &parsed.data_extensions()[1];
    assert!(des.is_tre_overflow(Dialect::Nitf21));
    assert_eq!(des.tres.len(), 1);
    let tre = des.tres.iter().next().expect("one TRE");
    assert_eq!(tre.tag(), "OVFLOW");
    assert_eq!(tre.source(), TreSource::TreOverflow);
    Ok(())
}

#[test]
fn dangling_overflow_pointer_writes_nothing() {
    let mut doc = sample_document(Dialect::Nitf21);
    doc.header_mut().user_defined_overflow = 1;
    let mut bytes = Vec::new();
    assert!(matches!(doc.write_to(&mut bytes), Err(Error::Build(_))));
    assert!(bytes.is_empty());

    doc.header_mut().user_defined_overflow = 5;
    assert!(matches!(doc.plan(), Err(Error::Build(_))));
}

/// Writes a document whose DESes carry `payloads`, then patches `FL` and the data length of
/// DES `streamed` to the unknown-length sentinels
fn streamed_file(payloads: &[&[u8]], streamed: usize) -> anyhow::Result<Vec<u8>> {
    let mut doc = Document::new(Dialect::Nitf21);
    for payload in payloads {
        doc.add_data_extension(
            DataExtensionSegment::builder()
                .identifier("USER_DATA")
                .data(SegmentData::Loaded(payload.to_vec()))
                .build(),
        )?;
    }
    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;
    bytes[FL_OFFSET..FL_OFFSET + 12].copy_from_slice(b"999999999999");
    // NUMI, NUMS, NUMX, NUMT then NUMDES follow HL
    let table = FL_OFFSET + 12 + 6 + 4 * 3 + 3;
    let ld = table + streamed * 13 + 4;
    bytes[ld..ld + 9].copy_from_slice(b"999999999");
    Ok(bytes)
}

#[test]
fn streamed_last_segment_reads_to_end() -> anyhow::Result<()> {
    let bytes = streamed_file(&[b"first", b"streamed payload"], 1)?;
    let doc = Document::from_reader(bytes.as_slice())?;
    assert!(doc.header().is_streaming());
    assert_eq!(
        doc.data_extensions()[1].data(),
        Some(&b"streamed payload"[..])
    );

    let mut rewritten = Vec::new();
    doc.write_to(&mut rewritten)?;
    let reparsed = Document::from_reader(rewritten.as_slice())?;
    assert!(!reparsed.header().is_streaming());
    assert_eq!(reparsed.header().file_length(), rewritten.len() as u64);
    Ok(())
}

#[test]
fn streamed_segment_must_be_last() -> anyhow::Result<()> {
    let bytes = streamed_file(&[b"first", b"second"], 0)?;
    let err = Document::from_reader(bytes.as_slice()).expect_err("not the last segment");
    assert!(matches!(
        err,
        Error::ParseError(ParseError::Unsupported { .. })
    ));
    Ok(())
}

#[test]
fn streaming_bookkeeping_des_is_not_written() -> anyhow::Result<()> {
    let mut doc = Document::new(Dialect::Nitf21);
    doc.add_data_extension(
        DataExtensionSegment::builder()
            .identifier(libnitf::segment::des::STREAMING_FILE_HEADER)
            .data(SegmentData::Loaded(b"bookkeeping".to_vec()))
            .build(),
    )?;
    doc.add_data_extension(
        DataExtensionSegment::builder()
            .identifier("USER_DATA")
            .data(SegmentData::Loaded(b"kept".to_vec()))
            .build(),
    )?;
    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;
    let parsed = Document::from_reader(bytes.as_slice())?;
    assert_eq!(parsed.data_extensions().len(), 1);
    assert_eq!(parsed.data_extensions()[0].identifier, "USER_DATA");
    Ok(())
}

#[test]
fn truncated_files_report_where_they_end() -> anyhow::Result<()> {
    let mut bytes = Vec::new();
    sample_document(Dialect::Nitf21).write_to(&mut bytes)?;
    bytes.truncate(bytes.len() - 3);
    match Document::from_reader(bytes.as_slice()) {
        Err(Error::ParseError(err @ ParseError::UnexpectedEof { .. })) => {
            assert!(err.offset() < bytes.len() as u64);
        }
        other => panic!("expected a truncation error, got {other:?}"),
    }
    Ok(())
}
